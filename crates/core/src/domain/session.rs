use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::{Cart, CartKey};
use crate::domain::catalog::{
    ItemId, MenuCategoryId, ResolvedItem, RestaurantCategoryId, RestaurantId, VariantId,
};
use crate::domain::customer::CustomerId;
use crate::domain::order::{DraftOrder, OrderId};

/// Rolling history turns kept on the session for NLU context.
pub const HISTORY_LIMIT: usize = 12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    #[default]
    Ar,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ar => "ar",
            Self::En => "en",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ar" => Some(Self::Ar),
            "en" => Some(Self::En),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Customer,
    Bot,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Where the conversation stands. Each variant carries only the context
/// that state needs, so a session deserialized mid-flow cannot hold fields
/// from a different screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    Init,
    AwaitingLanguage,
    MainMenu,
    BrowsingRestaurantCategories,
    BrowsingRestaurants {
        category_id: Option<RestaurantCategoryId>,
        keyword: Option<String>,
    },
    BrowsingCategories {
        restaurant_id: RestaurantId,
    },
    BrowsingItems {
        restaurant_id: RestaurantId,
        category_id: MenuCategoryId,
    },
    ViewingItem {
        restaurant_id: RestaurantId,
        item_id: ItemId,
    },
    AwaitingQuantity {
        restaurant_id: RestaurantId,
        item_id: ItemId,
        variant_id: Option<VariantId>,
    },
    ViewingCart,
    EditingCart,
    AwaitingLocation,
    AwaitingName {
        address: crate::domain::order::DeliveryAddress,
    },
    ConfirmingInfo {
        draft: DraftOrder,
    },
    AwaitingReview {
        order_id: OrderId,
    },
    SupportChat,
    OrderPlaced {
        order_id: OrderId,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub customer_id: CustomerId,
    pub language: Language,
    pub state: ConversationState,
    pub cart: Cart,
    /// Most recent resolver output, overwritten by each search. Position
    /// references ("the second one") index into this list.
    pub search_results: Vec<ResolvedItem>,
    pub last_added: Option<CartKey>,
    pub history: Vec<HistoryTurn>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            language: Language::Ar,
            state: ConversationState::Init,
            cart: Cart::default(),
            search_results: Vec::new(),
            last_added: None,
            history: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn record_customer_turn(&mut self, text: &str) {
        self.push_turn(TurnRole::Customer, text);
    }

    pub fn record_bot_turn(&mut self, text: &str) {
        self.push_turn(TurnRole::Bot, text);
    }

    fn push_turn(&mut self, role: TurnRole, text: &str) {
        self.history.push(HistoryTurn { role, text: text.to_string(), at: Utc::now() });
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }
}
