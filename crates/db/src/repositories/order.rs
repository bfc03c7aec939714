use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use sofra_core::domain::catalog::{ItemId, RestaurantId};
use sofra_core::domain::customer::CustomerId;
use sofra_core::domain::order::{DeliveryAddress, NewOrder, NewOrderLine, Order, OrderId, OrderStatus};

use super::{parse_decimal, parse_quantity, parse_timestamp, OrderRepository, RepositoryError};
use crate::DbPool;

pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn lines_for_order(&self, order_id: i64) -> Result<Vec<NewOrderLine>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT item_id, description, quantity, unit_price, line_total
             FROM order_line
             WHERE order_id = ?
             ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_line_from_row).collect()
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        let (address, lat, lng) = encode_address(&order.address);
        let created_at = Utc::now();

        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO customer_order (
                restaurant_id,
                customer_id,
                customer_name,
                status,
                address,
                lat,
                lng,
                subtotal,
                delivery_fee,
                total,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.restaurant_id.0)
        .bind(order.customer_id.as_str())
        .bind(&order.customer_name)
        .bind(OrderStatus::New.as_str())
        .bind(address)
        .bind(lat)
        .bind(lng)
        .bind(order.subtotal.to_string())
        .bind(order.delivery_fee.to_string())
        .bind(order.total.to_string())
        .bind(created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let order_id = inserted.last_insert_rowid();

        for line in &order.lines {
            sqlx::query(
                "INSERT INTO order_line (
                    order_id,
                    item_id,
                    description,
                    quantity,
                    unit_price,
                    line_total
                 ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(order_id)
            .bind(line.item_id.0)
            .bind(&line.description)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .bind(line.line_total.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(OrderId(order_id))
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, restaurant_id, customer_id, customer_name, status,
                    address, lat, lng, subtotal, delivery_fee, total, created_at
             FROM customer_order
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let lines = self.lines_for_order(id.0).await?;
        order_from_row(row, lines).map(Some)
    }

    async fn list_recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, restaurant_id, customer_id, customer_name, status,
                    address, lat, lng, subtotal, delivery_fee, total, created_at
             FROM customer_order
             WHERE customer_id = ?
             ORDER BY created_at DESC, id DESC
             LIMIT ?",
        )
        .bind(customer_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let order_id: i64 = row.try_get("id")?;
            let lines = self.lines_for_order(order_id).await?;
            orders.push(order_from_row(row, lines)?);
        }
        Ok(orders)
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let updated = sqlx::query("UPDATE customer_order SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        Ok(updated.rows_affected() > 0)
    }
}

fn encode_address(address: &DeliveryAddress) -> (Option<String>, Option<f64>, Option<f64>) {
    match address {
        DeliveryAddress::Text { value } => (Some(value.clone()), None, None),
        DeliveryAddress::Pin { lat, lng, label } => (label.clone(), Some(*lat), Some(*lng)),
    }
}

fn decode_address(
    address: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> Result<DeliveryAddress, RepositoryError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Ok(DeliveryAddress::Pin { lat, lng, label: address }),
        (None, None) => address
            .map(|value| DeliveryAddress::Text { value })
            .ok_or_else(|| {
                RepositoryError::Decode(
                    "order row has neither address text nor coordinates".to_string(),
                )
            }),
        _ => Err(RepositoryError::Decode(
            "order row has only one of lat/lng set".to_string(),
        )),
    }
}

fn order_from_row(row: SqliteRow, lines: Vec<NewOrderLine>) -> Result<Order, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;
    let address =
        decode_address(row.try_get("address")?, row.try_get("lat")?, row.try_get("lng")?)?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        customer_name: row.try_get("customer_name")?,
        status,
        address,
        subtotal: parse_decimal("subtotal", &row.try_get::<String, _>("subtotal")?)?,
        delivery_fee: parse_decimal("delivery_fee", &row.try_get::<String, _>("delivery_fee")?)?,
        total: parse_decimal("total", &row.try_get::<String, _>("total")?)?,
        lines,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn order_line_from_row(row: SqliteRow) -> Result<NewOrderLine, RepositoryError> {
    Ok(NewOrderLine {
        item_id: ItemId(row.try_get("item_id")?),
        description: row.try_get("description")?,
        quantity: parse_quantity("quantity", row.try_get("quantity")?)?,
        unit_price: parse_decimal("unit_price", &row.try_get::<String, _>("unit_price")?)?,
        line_total: parse_decimal("line_total", &row.try_get::<String, _>("line_total")?)?,
    })
}
