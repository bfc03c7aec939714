use rust_decimal::Decimal;

use sofra_core::domain::catalog::RestaurantId;
use sofra_db::repositories::{CatalogRepository, SqlCatalogRepository};
use sofra_db::{connect_with_settings, migrations, DemoCatalog};

#[tokio::test]
async fn demo_catalog_serves_browse_and_matching_surfaces() {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("run migrations");
    DemoCatalog::load(&pool).await.expect("load demo catalog");

    let repo = SqlCatalogRepository::new(pool.clone());

    let restaurants = repo.list_restaurants(None).await.expect("list restaurants");
    assert_eq!(restaurants.len(), 4, "inactive restaurants stay hidden");
    assert!(restaurants.iter().all(|restaurant| restaurant.active));

    let contexts = repo.item_contexts(None).await.expect("item contexts");
    assert_eq!(contexts.len(), 17, "hidden and unavailable items stay out of matching");
    assert!(contexts.iter().all(|context| context.restaurant_id != RestaurantId(5)));

    let shawarma = contexts
        .iter()
        .find(|context| context.name == "شاورما دجاج")
        .expect("demo catalog carries chicken shawarma");
    assert_eq!(shawarma.variants.len(), 3);
    assert_eq!(shawarma.price, None, "sized items price through variants");

    let daily_special = contexts
        .iter()
        .find(|context| context.name == "طبق اليوم")
        .expect("demo catalog carries the unpriced daily special");
    assert_eq!(daily_special.price, None);
    assert!(daily_special.variants.is_empty());

    let grill_menu = repo.list_items(RestaurantId(2), None).await.expect("grill items");
    let mixed_grill =
        grill_menu.iter().find(|item| item.name == "مشاوي مشكل").expect("mixed grill row");
    assert_eq!(mixed_grill.price_from, Some(Decimal::new(900, 2)));
    assert!(mixed_grill.has_variants);

    pool.close().await;
}
