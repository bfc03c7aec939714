use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat-transport identity of a customer (the sender id on inbound events).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Profile remembered across orders so repeat checkouts skip the prompts
/// the customer already answered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CustomerProfile {
    pub customer_id: CustomerId,
    pub display_name: Option<String>,
    pub default_address: Option<String>,
    pub loyalty_points: i64,
    pub updated_at: DateTime<Utc>,
}

impl CustomerProfile {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            display_name: None,
            default_address: None,
            loyalty_points: 0,
            updated_at: Utc::now(),
        }
    }
}
