use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use sofra_core::domain::customer::{CustomerId, CustomerProfile};

use super::{parse_timestamp, CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT customer_id, display_name, default_address, loyalty_points, updated_at
             FROM customer_profile
             WHERE customer_id = ?",
        )
        .bind(customer_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(profile_from_row).transpose()
    }

    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer_profile (
                customer_id,
                display_name,
                default_address,
                loyalty_points,
                updated_at
             ) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(customer_id) DO UPDATE SET
                display_name = excluded.display_name,
                default_address = excluded.default_address,
                loyalty_points = excluded.loyalty_points,
                updated_at = excluded.updated_at",
        )
        .bind(profile.customer_id.as_str())
        .bind(profile.display_name.as_deref())
        .bind(profile.default_address.as_deref())
        .bind(profile.loyalty_points)
        .bind(profile.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn add_loyalty_points(
        &self,
        customer_id: &CustomerId,
        delta: i64,
    ) -> Result<i64, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO customer_profile (
                customer_id,
                display_name,
                default_address,
                loyalty_points,
                updated_at
             ) VALUES (?, NULL, NULL, ?, ?)
             ON CONFLICT(customer_id) DO UPDATE SET
                loyalty_points = customer_profile.loyalty_points + excluded.loyalty_points,
                updated_at = excluded.updated_at",
        )
        .bind(customer_id.as_str())
        .bind(delta)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let balance: i64 = sqlx::query_scalar(
            "SELECT loyalty_points FROM customer_profile WHERE customer_id = ?",
        )
        .bind(customer_id.as_str())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(balance)
    }
}

fn profile_from_row(row: SqliteRow) -> Result<CustomerProfile, RepositoryError> {
    Ok(CustomerProfile {
        customer_id: CustomerId(row.try_get("customer_id")?),
        display_name: row.try_get("display_name")?,
        default_address: row.try_get("default_address")?,
        loyalty_points: row.try_get("loyalty_points")?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
