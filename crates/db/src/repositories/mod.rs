use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use sofra_core::domain::catalog::{
    ItemContext, ItemDetails, ItemId, ItemSummary, MenuCategory, MenuCategoryId, Restaurant,
    RestaurantCategory, RestaurantCategoryId, RestaurantId,
};
use sofra_core::domain::customer::{CustomerId, CustomerProfile};
use sofra_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};

pub mod catalog;
pub mod customer;
pub mod memory;
pub mod order;

pub use catalog::SqlCatalogRepository;
pub use customer::SqlCustomerRepository;
pub use memory::{InMemoryCatalogRepository, InMemoryCustomerRepository, InMemoryOrderRepository};
pub use order::SqlOrderRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read surface over the restaurant directory and menus. Browse screens and
/// the resolver both go through this trait, so the same availability rules
/// apply to buttons and free text.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_restaurant_categories(&self)
        -> Result<Vec<RestaurantCategory>, RepositoryError>;

    async fn list_restaurants(
        &self,
        category_id: Option<RestaurantCategoryId>,
    ) -> Result<Vec<Restaurant>, RepositoryError>;

    async fn find_restaurant(
        &self,
        id: RestaurantId,
    ) -> Result<Option<Restaurant>, RepositoryError>;

    async fn list_menu_categories(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<MenuCategory>, RepositoryError>;

    async fn list_items(
        &self,
        restaurant_id: RestaurantId,
        category_id: Option<MenuCategoryId>,
    ) -> Result<Vec<ItemSummary>, RepositoryError>;

    async fn find_item(&self, id: ItemId) -> Result<Option<ItemDetails>, RepositoryError>;

    /// Catalog slice for matching: available items of active restaurants,
    /// optionally narrowed to one restaurant.
    async fn item_contexts(
        &self,
        restaurant_id: Option<RestaurantId>,
    ) -> Result<Vec<ItemContext>, RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists the order header and all lines in one transaction.
    async fn create(&self, order: NewOrder) -> Result<OrderId, RepositoryError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn list_recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError>;

    /// Returns `false` when no order with that id exists.
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError>;

    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<(), RepositoryError>;

    /// Adds `delta` to the customer's balance, creating the profile row if
    /// missing, and returns the new balance.
    async fn add_loyalty_points(
        &self,
        customer_id: &CustomerId,
        delta: i64,
    ) -> Result<i64, RepositoryError>;
}

pub(crate) fn parse_decimal(column: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

pub(crate) fn parse_optional_decimal(
    column: &str,
    value: Option<String>,
) -> Result<Option<Decimal>, RepositoryError> {
    value.map(|text| parse_decimal(column, &text)).transpose()
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_quantity(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}
