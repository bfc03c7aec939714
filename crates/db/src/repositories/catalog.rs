use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use sofra_core::domain::catalog::{
    ItemContext, ItemDetails, ItemId, ItemSummary, ItemVariant, MenuCategory, MenuCategoryId,
    MenuItem, Restaurant, RestaurantCategory, RestaurantCategoryId, RestaurantId, VariantId,
};

use super::{parse_decimal, parse_optional_decimal, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn cheapest_variant_prices(
        &self,
        restaurant_id: RestaurantId,
        category_id: Option<MenuCategoryId>,
    ) -> Result<HashMap<i64, Decimal>, RepositoryError> {
        let rows = if let Some(category_id) = category_id {
            sqlx::query(
                "SELECT iv.item_id, iv.price
                 FROM item_variant iv
                 JOIN menu_item mi ON mi.id = iv.item_id
                 WHERE mi.restaurant_id = ? AND mi.category_id = ? AND mi.available = 1",
            )
            .bind(restaurant_id.0)
            .bind(category_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT iv.item_id, iv.price
                 FROM item_variant iv
                 JOIN menu_item mi ON mi.id = iv.item_id
                 WHERE mi.restaurant_id = ? AND mi.available = 1",
            )
            .bind(restaurant_id.0)
            .fetch_all(&self.pool)
            .await?
        };

        let mut cheapest: HashMap<i64, Decimal> = HashMap::new();
        for row in rows {
            let item_id: i64 = row.try_get("item_id")?;
            let price = parse_decimal("price", &row.try_get::<String, _>("price")?)?;
            cheapest
                .entry(item_id)
                .and_modify(|current| {
                    if price < *current {
                        *current = price;
                    }
                })
                .or_insert(price);
        }
        Ok(cheapest)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_restaurant_categories(
        &self,
    ) -> Result<Vec<RestaurantCategory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, name, position
             FROM restaurant_category
             ORDER BY position ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(restaurant_category_from_row).collect()
    }

    async fn list_restaurants(
        &self,
        category_id: Option<RestaurantCategoryId>,
    ) -> Result<Vec<Restaurant>, RepositoryError> {
        let rows = if let Some(category_id) = category_id {
            sqlx::query(
                "SELECT id, category_id, name, description, delivery_fee, active
                 FROM restaurant
                 WHERE active = 1 AND category_id = ?
                 ORDER BY id ASC",
            )
            .bind(category_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, category_id, name, description, delivery_fee, active
                 FROM restaurant
                 WHERE active = 1
                 ORDER BY id ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        rows.into_iter().map(restaurant_from_row).collect()
    }

    async fn find_restaurant(
        &self,
        id: RestaurantId,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, category_id, name, description, delivery_fee, active
             FROM restaurant
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(restaurant_from_row).transpose()
    }

    async fn list_menu_categories(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<MenuCategory>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, restaurant_id, name, position
             FROM menu_category
             WHERE restaurant_id = ?
             ORDER BY position ASC, id ASC",
        )
        .bind(restaurant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(menu_category_from_row).collect()
    }

    async fn list_items(
        &self,
        restaurant_id: RestaurantId,
        category_id: Option<MenuCategoryId>,
    ) -> Result<Vec<ItemSummary>, RepositoryError> {
        let rows = if let Some(category_id) = category_id {
            sqlx::query(
                "SELECT id, name, price
                 FROM menu_item
                 WHERE restaurant_id = ? AND category_id = ? AND available = 1
                 ORDER BY id ASC",
            )
            .bind(restaurant_id.0)
            .bind(category_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT id, name, price
                 FROM menu_item
                 WHERE restaurant_id = ? AND available = 1
                 ORDER BY id ASC",
            )
            .bind(restaurant_id.0)
            .fetch_all(&self.pool)
            .await?
        };

        let cheapest = self.cheapest_variant_prices(restaurant_id, category_id).await?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let base = parse_optional_decimal("price", row.try_get("price")?)?;
            summaries.push(ItemSummary {
                id: ItemId(id),
                name: row.try_get("name")?,
                price_from: base.or_else(|| cheapest.get(&id).copied()),
                has_variants: cheapest.contains_key(&id),
            });
        }
        Ok(summaries)
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<ItemDetails>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, restaurant_id, category_id, name, description, price, available
             FROM menu_item
             WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let item = menu_item_from_row(row)?;

        let variants = sqlx::query(
            "SELECT id, item_id, name, price
             FROM item_variant
             WHERE item_id = ?
             ORDER BY id ASC",
        )
        .bind(id.0)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(item_variant_from_row)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(ItemDetails { item, variants }))
    }

    async fn item_contexts(
        &self,
        restaurant_id: Option<RestaurantId>,
    ) -> Result<Vec<ItemContext>, RepositoryError> {
        let item_rows = if let Some(restaurant_id) = restaurant_id {
            sqlx::query(
                "SELECT mi.id, mi.name, mi.description, mi.price, mi.restaurant_id,
                        r.name AS restaurant_name
                 FROM menu_item mi
                 JOIN restaurant r ON r.id = mi.restaurant_id
                 WHERE mi.available = 1 AND r.active = 1 AND mi.restaurant_id = ?
                 ORDER BY mi.id ASC",
            )
            .bind(restaurant_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT mi.id, mi.name, mi.description, mi.price, mi.restaurant_id,
                        r.name AS restaurant_name
                 FROM menu_item mi
                 JOIN restaurant r ON r.id = mi.restaurant_id
                 WHERE mi.available = 1 AND r.active = 1
                 ORDER BY mi.restaurant_id ASC, mi.id ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        let variant_rows = if let Some(restaurant_id) = restaurant_id {
            sqlx::query(
                "SELECT iv.id, iv.item_id, iv.name, iv.price
                 FROM item_variant iv
                 JOIN menu_item mi ON mi.id = iv.item_id
                 JOIN restaurant r ON r.id = mi.restaurant_id
                 WHERE mi.available = 1 AND r.active = 1 AND mi.restaurant_id = ?
                 ORDER BY iv.item_id ASC, iv.id ASC",
            )
            .bind(restaurant_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT iv.id, iv.item_id, iv.name, iv.price
                 FROM item_variant iv
                 JOIN menu_item mi ON mi.id = iv.item_id
                 JOIN restaurant r ON r.id = mi.restaurant_id
                 WHERE mi.available = 1 AND r.active = 1
                 ORDER BY iv.item_id ASC, iv.id ASC",
            )
            .fetch_all(&self.pool)
            .await?
        };

        let mut variants_by_item: HashMap<i64, Vec<ItemVariant>> = HashMap::new();
        for row in variant_rows {
            let variant = item_variant_from_row(row)?;
            variants_by_item.entry(variant.item_id.0).or_default().push(variant);
        }

        let mut contexts = Vec::with_capacity(item_rows.len());
        for row in item_rows {
            let id: i64 = row.try_get("id")?;
            contexts.push(ItemContext {
                item_id: ItemId(id),
                name: row.try_get("name")?,
                description: row.try_get("description")?,
                price: parse_optional_decimal("price", row.try_get("price")?)?,
                variants: variants_by_item.remove(&id).unwrap_or_default(),
                restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
                restaurant_name: row.try_get("restaurant_name")?,
            });
        }
        Ok(contexts)
    }
}

fn restaurant_category_from_row(row: SqliteRow) -> Result<RestaurantCategory, RepositoryError> {
    Ok(RestaurantCategory {
        id: RestaurantCategoryId(row.try_get("id")?),
        name: row.try_get("name")?,
        position: row.try_get("position")?,
    })
}

fn restaurant_from_row(row: SqliteRow) -> Result<Restaurant, RepositoryError> {
    Ok(Restaurant {
        id: RestaurantId(row.try_get("id")?),
        category_id: RestaurantCategoryId(row.try_get("category_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        delivery_fee: parse_decimal("delivery_fee", &row.try_get::<String, _>("delivery_fee")?)?,
        active: row.try_get::<i64, _>("active")? != 0,
    })
}

fn menu_category_from_row(row: SqliteRow) -> Result<MenuCategory, RepositoryError> {
    Ok(MenuCategory {
        id: MenuCategoryId(row.try_get("id")?),
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        name: row.try_get("name")?,
        position: row.try_get("position")?,
    })
}

fn menu_item_from_row(row: SqliteRow) -> Result<MenuItem, RepositoryError> {
    Ok(MenuItem {
        id: ItemId(row.try_get("id")?),
        restaurant_id: RestaurantId(row.try_get("restaurant_id")?),
        category_id: MenuCategoryId(row.try_get("category_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: parse_optional_decimal("price", row.try_get("price")?)?,
        available: row.try_get::<i64, _>("available")? != 0,
    })
}

fn item_variant_from_row(row: SqliteRow) -> Result<ItemVariant, RepositoryError> {
    Ok(ItemVariant {
        id: VariantId(row.try_get("id")?),
        item_id: ItemId(row.try_get("item_id")?),
        name: row.try_get("name")?,
        price: parse_decimal("price", &row.try_get::<String, _>("price")?)?,
    })
}
