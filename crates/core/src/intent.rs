use serde::{Deserialize, Serialize};

use crate::cart::MAX_LINE_QUANTITY;

pub const MAX_INTENT_ITEMS: usize = 10;

/// What the language model decided the customer wants. Unknown kinds
/// deserialize to `Error` so a drifting model can never inject a new
/// branch into the router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Order,
    CartUpdate,
    Browse,
    Reference,
    Checkout,
    ViewCart,
    Support,
    SmallTalk,
    #[serde(other)]
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Add,
    Remove,
    SetQuantity,
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentItem {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub action: Option<ItemAction>,
}

/// Structured NLU output. Every field except `kind` is optional so a
/// minimal model reply still deserializes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    #[serde(default)]
    pub items: Vec<IntentItem>,
    #[serde(default)]
    pub restaurant_name: Option<String>,
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub reference_position: Option<i64>,
    #[serde(default)]
    pub upsell_suggestions: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Intent {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Error,
            items: Vec::new(),
            restaurant_name: None,
            delivery_address: None,
            reference_position: None,
            upsell_suggestions: Vec::new(),
            message: Some(message.into()),
        }
    }

    /// Clamps model output into the ranges the engine accepts: item names
    /// non-empty, at most `MAX_INTENT_ITEMS` items, quantities in
    /// 1..=`MAX_LINE_QUANTITY`, unknown actions dropped.
    pub fn validated(mut self) -> Self {
        self.items.retain(|item| !item.name.trim().is_empty());
        self.items.truncate(MAX_INTENT_ITEMS);
        for item in &mut self.items {
            item.name = item.name.trim().to_string();
            if let Some(quantity) = item.quantity {
                item.quantity = Some(quantity.clamp(1, i64::from(MAX_LINE_QUANTITY)));
            }
            if item.action == Some(ItemAction::Unknown) {
                item.action = None;
            }
            if let Some(size) = &item.size {
                if size.trim().is_empty() {
                    item.size = None;
                }
            }
        }

        self.restaurant_name = trimmed_or_none(self.restaurant_name);
        self.delivery_address = trimmed_or_none(self.delivery_address);
        self.reference_position =
            self.reference_position.filter(|position| (1..=50).contains(position));
        self.upsell_suggestions.retain(|suggestion| !suggestion.trim().is_empty());
        self.upsell_suggestions.truncate(3);
        self
    }
}

fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value.map(|inner| inner.trim().to_string()).filter(|inner| !inner.is_empty())
}
