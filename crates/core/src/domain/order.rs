use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::{ItemId, RestaurantId};
use crate::domain::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub i64);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeliveryAddress {
    Text { value: String },
    Pin { lat: f64, lng: f64, label: Option<String> },
}

impl DeliveryAddress {
    pub fn as_text(&self) -> String {
        match self {
            Self::Text { value } => value.clone(),
            Self::Pin { label: Some(label), .. } => label.clone(),
            Self::Pin { lat, lng, label: None } => format!("({lat:.5}, {lng:.5})"),
        }
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match self {
            Self::Pin { lat, lng, .. } => Some((*lat, *lng)),
            Self::Text { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Confirmed,
    Preparing,
    Delivering,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Delivering => "delivering",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "confirmed" => Some(Self::Confirmed),
            "preparing" => Some(Self::Preparing),
            "delivering" => Some(Self::Delivering),
            "delivered" => Some(Self::Delivered),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub item_id: ItemId,
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub restaurant_id: RestaurantId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub address: DeliveryAddress,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub lines: Vec<NewOrderLine>,
}

/// Checkout summary held by the confirmation screen. Built once when the
/// customer reaches confirmation and consumed exactly once at commit, so a
/// replayed confirm finds no draft to re-submit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftOrder {
    pub restaurant_id: RestaurantId,
    pub customer_name: String,
    pub address: DeliveryAddress,
    pub cart_snapshot: crate::cart::Cart,
    pub delivery_fee: Decimal,
}

impl DraftOrder {
    pub fn subtotal(&self) -> Decimal {
        self.cart_snapshot.total()
    }

    pub fn total(&self) -> Decimal {
        self.subtotal() + self.delivery_fee
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub restaurant_id: RestaurantId,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub status: OrderStatus,
    pub address: DeliveryAddress,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
    pub lines: Vec<NewOrderLine>,
    pub created_at: DateTime<Utc>,
}
