use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Per-restaurant contract for the demo seed. `available_items` counts rows
/// with `available = 1` regardless of the restaurant's own active flag.
const SEED_RESTAURANTS: &[SeedRestaurant] = &[
    SeedRestaurant {
        id: 1,
        name: "شاورما الريم",
        category: "مشاوي وشاورما",
        available_items: 5,
        active: true,
    },
    SeedRestaurant {
        id: 2,
        name: "مشاوي الأصيل",
        category: "مشاوي وشاورما",
        available_items: 3,
        active: true,
    },
    SeedRestaurant {
        id: 3,
        name: "بيتزا روما",
        category: "بيتزا ومعجنات",
        available_items: 4,
        active: true,
    },
    SeedRestaurant {
        id: 4,
        name: "البيت الشامي",
        category: "وجبات شعبية",
        available_items: 5,
        active: true,
    },
    SeedRestaurant {
        id: 5,
        name: "مطعم الزاوية",
        category: "وجبات شعبية",
        available_items: 1,
        active: false,
    },
];

/// Items that must carry variants, with the expected variant count. The
/// matcher tests lean on these staying stable.
const SEED_SIZED_ITEMS: &[(&str, i64)] = &[
    ("شاورما دجاج", 3),
    ("شاورما لحمة", 2),
    ("مشاوي مشكل", 2),
    ("بيتزا مارجريتا", 4),
    ("بيتزا خضار", 2),
    ("كنافة نابلسية", 2),
];

const SEED_CATEGORY_COUNT: i64 = 3;
const SEED_ITEM_COUNT: i64 = 19;
const SEED_VARIANT_COUNT: i64 = 15;

/// Demo catalog used by `sofra seed` and the end-to-end flow tests.
pub struct DemoCatalog;

impl DemoCatalog {
    /// SQL fixture content for the demo catalog.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_catalog.sql");

    /// Load the demo catalog. Safe to run against a database that already
    /// holds it.
    pub async fn load(pool: &DbPool) -> Result<SeedSummary, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedSummary {
            restaurant_categories: SEED_CATEGORY_COUNT as usize,
            restaurants: SEED_RESTAURANTS.len(),
            items: SEED_ITEM_COUNT as usize,
            variants: SEED_VARIANT_COUNT as usize,
        })
    }

    /// Verify that the seeded rows match the contract above.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let category_count: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM restaurant_category")
                .fetch_one(pool)
                .await?;
        checks.push(("restaurant-categories", category_count == SEED_CATEGORY_COUNT));

        for restaurant in SEED_RESTAURANTS {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM restaurant r
                 JOIN restaurant_category rc ON rc.id = r.category_id
                 WHERE r.id = ?1 AND r.name = ?2 AND rc.name = ?3 AND r.active = ?4)",
            )
            .bind(restaurant.id)
            .bind(restaurant.name)
            .bind(restaurant.category)
            .bind(i64::from(restaurant.active))
            .fetch_one(pool)
            .await?;
            checks.push((restaurant.name, exists == 1));

            let item_count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM menu_item WHERE restaurant_id = ?1 AND available = 1",
            )
            .bind(restaurant.id)
            .fetch_one(pool)
            .await?;
            checks.push((restaurant.name, item_count == restaurant.available_items));
        }

        for (item_name, variant_count) in SEED_SIZED_ITEMS {
            let count: i64 = sqlx::query_scalar(
                "SELECT COUNT(1) FROM item_variant iv
                 JOIN menu_item mi ON mi.id = iv.item_id
                 WHERE mi.name = ?1",
            )
            .bind(item_name)
            .fetch_one(pool)
            .await?;
            checks.push((*item_name, count == *variant_count));
        }

        let variant_total: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM item_variant").fetch_one(pool).await?;
        checks.push(("variant-total", variant_total == SEED_VARIANT_COUNT));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedRestaurant {
    id: i64,
    name: &'static str,
    category: &'static str,
    available_items: i64,
    active: bool,
}

#[derive(Debug)]
pub struct SeedSummary {
    pub restaurant_categories: usize,
    pub restaurants: usize,
    pub items: usize,
    pub variants: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{connect_with_settings, migrations};

    #[test]
    fn sql_fixture_is_valid() {
        assert!(!DemoCatalog::SQL.is_empty());
    }

    #[tokio::test]
    async fn verify_seed_catalog_and_idempotency() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect to test database");

        migrations::run_pending(&pool).await.expect("run migrations");

        let first = DemoCatalog::load(&pool).await.expect("load seed fixtures");
        let first_verification = DemoCatalog::verify(&pool).await.expect("verify seed fixtures");
        assert!(first_verification.all_present, "checks: {:?}", first_verification.checks);
        assert_eq!(first.restaurants, 5);

        let second = DemoCatalog::load(&pool).await.expect("reload seed fixtures");
        let second_verification =
            DemoCatalog::verify(&pool).await.expect("re-verify seed fixtures");
        assert!(second_verification.all_present);
        assert_eq!(second.restaurants, 5);
        assert_eq!(first_verification.checks, second_verification.checks);
    }
}
