use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;

use sofra_core::domain::catalog::{
    ItemContext, ItemDetails, ItemId, ItemSummary, ItemVariant, MenuCategory, MenuCategoryId,
    MenuItem, Restaurant, RestaurantCategory, RestaurantCategoryId, RestaurantId,
};
use sofra_core::domain::customer::{CustomerId, CustomerProfile};
use sofra_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};

use super::{CatalogRepository, CustomerRepository, OrderRepository, RepositoryError};

/// Catalog fixture for tests. Fields are filled at construction and read
/// through the same trait the SQL repository implements.
#[derive(Default)]
pub struct InMemoryCatalogRepository {
    pub categories: Vec<RestaurantCategory>,
    pub restaurants: Vec<Restaurant>,
    pub menu_categories: Vec<MenuCategory>,
    pub items: Vec<MenuItem>,
    pub variants: Vec<ItemVariant>,
}

impl InMemoryCatalogRepository {
    fn variants_for(&self, item_id: ItemId) -> Vec<ItemVariant> {
        self.variants.iter().filter(|variant| variant.item_id == item_id).cloned().collect()
    }

    fn summary_for(&self, item: &MenuItem) -> ItemSummary {
        let cheapest = self
            .variants
            .iter()
            .filter(|variant| variant.item_id == item.id)
            .map(|variant| variant.price)
            .min();
        ItemSummary {
            id: item.id,
            name: item.name.clone(),
            price_from: item.price.or(cheapest),
            has_variants: cheapest.is_some(),
        }
    }

    fn restaurant_is_active(&self, restaurant_id: RestaurantId) -> bool {
        self.restaurants
            .iter()
            .any(|restaurant| restaurant.id == restaurant_id && restaurant.active)
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn list_restaurant_categories(
        &self,
    ) -> Result<Vec<RestaurantCategory>, RepositoryError> {
        let mut categories = self.categories.clone();
        categories.sort_by_key(|category| (category.position, category.id.0));
        Ok(categories)
    }

    async fn list_restaurants(
        &self,
        category_id: Option<RestaurantCategoryId>,
    ) -> Result<Vec<Restaurant>, RepositoryError> {
        Ok(self
            .restaurants
            .iter()
            .filter(|restaurant| restaurant.active)
            .filter(|restaurant| category_id.map_or(true, |id| restaurant.category_id == id))
            .cloned()
            .collect())
    }

    async fn find_restaurant(
        &self,
        id: RestaurantId,
    ) -> Result<Option<Restaurant>, RepositoryError> {
        Ok(self.restaurants.iter().find(|restaurant| restaurant.id == id).cloned())
    }

    async fn list_menu_categories(
        &self,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<MenuCategory>, RepositoryError> {
        let mut categories: Vec<MenuCategory> = self
            .menu_categories
            .iter()
            .filter(|category| category.restaurant_id == restaurant_id)
            .cloned()
            .collect();
        categories.sort_by_key(|category| (category.position, category.id.0));
        Ok(categories)
    }

    async fn list_items(
        &self,
        restaurant_id: RestaurantId,
        category_id: Option<MenuCategoryId>,
    ) -> Result<Vec<ItemSummary>, RepositoryError> {
        Ok(self
            .items
            .iter()
            .filter(|item| item.restaurant_id == restaurant_id && item.available)
            .filter(|item| category_id.map_or(true, |id| item.category_id == id))
            .map(|item| self.summary_for(item))
            .collect())
    }

    async fn find_item(&self, id: ItemId) -> Result<Option<ItemDetails>, RepositoryError> {
        Ok(self.items.iter().find(|item| item.id == id).map(|item| ItemDetails {
            item: item.clone(),
            variants: self.variants_for(item.id),
        }))
    }

    async fn item_contexts(
        &self,
        restaurant_id: Option<RestaurantId>,
    ) -> Result<Vec<ItemContext>, RepositoryError> {
        let mut contexts = Vec::new();
        for item in &self.items {
            if !item.available || !self.restaurant_is_active(item.restaurant_id) {
                continue;
            }
            if restaurant_id.is_some_and(|id| item.restaurant_id != id) {
                continue;
            }
            let Some(restaurant) =
                self.restaurants.iter().find(|restaurant| restaurant.id == item.restaurant_id)
            else {
                continue;
            };
            contexts.push(ItemContext {
                item_id: item.id,
                name: item.name.clone(),
                description: item.description.clone(),
                price: item.price,
                variants: self.variants_for(item.id),
                restaurant_id: item.restaurant_id,
                restaurant_name: restaurant.name.clone(),
            });
        }
        Ok(contexts)
    }
}

pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<i64, Order>>,
    next_id: AtomicI64,
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self { orders: RwLock::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: NewOrder) -> Result<OrderId, RepositoryError> {
        let id = OrderId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut orders = self.orders.write().await;
        orders.insert(
            id.0,
            Order {
                id,
                restaurant_id: order.restaurant_id,
                customer_id: order.customer_id,
                customer_name: order.customer_name,
                status: OrderStatus::New,
                address: order.address,
                subtotal: order.subtotal,
                delivery_fee: order.delivery_fee,
                total: order.total,
                lines: order.lines,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }

    async fn list_recent_for_customer(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut recent: Vec<Order> =
            orders.values().filter(|order| &order.customer_id == customer_id).cloned().collect();
        recent.sort_by_key(|order| std::cmp::Reverse((order.created_at, order.id.0)));
        recent.truncate(limit as usize);
        Ok(recent)
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&id.0) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    profiles: RwLock<HashMap<String, CustomerProfile>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_profile(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Option<CustomerProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(customer_id.as_str()).cloned())
    }

    async fn upsert_profile(&self, profile: CustomerProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.customer_id.0.clone(), profile);
        Ok(())
    }

    async fn add_loyalty_points(
        &self,
        customer_id: &CustomerId,
        delta: i64,
    ) -> Result<i64, RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .entry(customer_id.0.clone())
            .or_insert_with(|| CustomerProfile::new(customer_id.clone()));
        profile.loyalty_points += delta;
        profile.updated_at = Utc::now();
        Ok(profile.loyalty_points)
    }
}
