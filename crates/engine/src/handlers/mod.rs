//! Screen handlers for the conversation router, one module per flow.
//!
//! Each handler mutates the session in place and returns the replies for
//! the turn; the router persists and delivers afterwards. Shared helpers
//! for repository error mapping, state introspection, and the standard
//! button sets live here.

pub mod browse;
pub mod cart;
pub mod checkout;
pub mod freetext;

use sofra_chat::{ButtonPrompt, OutboundMessage};
use sofra_core::{
    ApplicationError, ChoiceId, ConversationState, ItemDetails, Language, OrderId, ResolvedItem,
    RestaurantId, VariantId,
};
use sofra_db::repositories::RepositoryError;

use crate::replies;

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

/// Restaurant the customer is currently inside, when the state carries one.
pub(crate) fn session_restaurant(state: &ConversationState) -> Option<RestaurantId> {
    match state {
        ConversationState::BrowsingCategories { restaurant_id }
        | ConversationState::BrowsingItems { restaurant_id, .. }
        | ConversationState::ViewingItem { restaurant_id, .. }
        | ConversationState::AwaitingQuantity { restaurant_id, .. } => Some(*restaurant_id),
        _ => None,
    }
}

/// Parses a typed quantity, Arabic-Indic digits included. Word numbers are
/// the extractor's job; a typed quantity is digits or nothing.
pub(crate) fn parse_quantity_text(text: &str) -> Option<i64> {
    let folded: String = text
        .trim()
        .chars()
        .map(|ch| match ch {
            '٠'..='٩' => char::from(b'0' + (ch as u32 - '٠' as u32) as u8),
            '۰'..='۹' => char::from(b'0' + (ch as u32 - '۰' as u32) as u8),
            other => other,
        })
        .collect();
    folded.parse::<i64>().ok().filter(|quantity| *quantity > 0)
}

/// Builds a [`ResolvedItem`] off the full item record, optionally pinned to
/// one of its variants. `None` when the variant id does not belong to the
/// item, which happens on stale buttons after a menu change.
pub(crate) fn resolve_details(
    details: &ItemDetails,
    variant_id: Option<VariantId>,
    restaurant_name: &str,
) -> Option<ResolvedItem> {
    match variant_id {
        Some(variant_id) => {
            let variant = details.variants.iter().find(|variant| variant.id == variant_id)?;
            Some(ResolvedItem {
                item_id: details.item.id,
                variant_id: Some(variant.id),
                name: format!("{} ({})", details.item.name, variant.name),
                price: Some(variant.price),
                restaurant_id: details.item.restaurant_id,
                restaurant_name: restaurant_name.to_string(),
            })
        }
        None => Some(ResolvedItem {
            item_id: details.item.id,
            variant_id: None,
            name: details.item.name.clone(),
            price: details.item.price,
            restaurant_id: details.item.restaurant_id,
            restaurant_name: restaurant_name.to_string(),
        }),
    }
}

/// Main menu with the standard three actions.
pub(crate) fn main_menu(language: Language, body: String) -> OutboundMessage {
    ButtonPrompt::new(body)
        .button(ChoiceId::OrderFood.as_id(), replies::btn_order_food(language))
        .button(ChoiceId::ViewCart.as_id(), replies::btn_view_cart(language))
        .button(ChoiceId::Support.as_id(), replies::btn_support(language))
        .build()
}

/// Language picker, shown before a language is known so the copy is
/// bilingual.
pub(crate) fn language_prompt() -> OutboundMessage {
    ButtonPrompt::new(replies::language_prompt_body())
        .button(ChoiceId::LangAr.as_id(), replies::language_button_ar())
        .button(ChoiceId::LangEn.as_id(), replies::language_button_en())
        .build()
}

/// Cart summary with the standard cart actions.
pub(crate) fn cart_actions(language: Language, body: String) -> OutboundMessage {
    ButtonPrompt::new(body)
        .button(ChoiceId::Checkout.as_id(), replies::btn_checkout(language))
        .button(ChoiceId::EditCart.as_id(), replies::btn_edit_cart(language))
        .button(ChoiceId::MainMenu.as_id(), replies::btn_main_menu(language))
        .build()
}

/// Post-add nudge: keep shopping in the same restaurant, check the cart,
/// or go straight to checkout.
pub(crate) fn after_add(
    language: Language,
    body: String,
    restaurant_id: RestaurantId,
) -> OutboundMessage {
    ButtonPrompt::new(body)
        .button(ChoiceId::Restaurant { restaurant_id }.as_id(), replies::btn_continue(language))
        .button(ChoiceId::ViewCart.as_id(), replies::btn_view_cart(language))
        .button(ChoiceId::Checkout.as_id(), replies::btn_checkout(language))
        .build()
}

/// Post-order actions: reorder, rate, or reach support.
pub(crate) fn post_order(language: Language, body: String, order_id: OrderId) -> OutboundMessage {
    ButtonPrompt::new(body)
        .button(ChoiceId::NewOrder.as_id(), replies::btn_new_order(language))
        .button(ChoiceId::RateOrder { order_id }.as_id(), replies::btn_rate_order(language))
        .button(ChoiceId::Support.as_id(), replies::btn_support(language))
        .build()
}
