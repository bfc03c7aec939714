//! Per-customer turn loop: load session, dispatch, persist, reply.
//!
//! Dispatch is two-layered. Structured choices decode into [`ChoiceId`] and
//! map straight onto handlers; free text first runs through the state hooks
//! (language pick, typed quantity, address, confirm words) and only reaches
//! the NLU pipeline when no hook claims it. A turn that fails still answers
//! the customer; the error is logged under the inbound message id.

use std::sync::Arc;
use std::time::Duration;

use sofra_agent::{NluGateway, RecoveryExtractor, RequestBudget};
use sofra_chat::{InboundEvent, InboundPayload, NotificationGateway, OutboundMessage};
use sofra_core::{
    normalize, ApplicationError, ChoiceId, ConversationState, DeliveryAddress, Language, Session,
};
use sofra_db::repositories::{CatalogRepository, CustomerRepository, OrderRepository};

use crate::handlers::cart::EditAction;
use crate::handlers::{language_prompt, main_menu, parse_quantity_text, session_restaurant};
use crate::loyalty::LoyaltyGateway;
use crate::replies;
use crate::store::SessionStore;
use crate::turn::CustomerGates;

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(1800);

/// Words that reset any conversation back to the language prompt. Stored in
/// their normalized spellings; the cart survives a reset.
const RESTART_PHRASES: &[&str] = &[
    "مرحبا",
    "هلا",
    "اهلا",
    "اهلين",
    "هاي",
    "سلام",
    "السلام عليكم",
    "صباح الخير",
    "مساء الخير",
    "منيو",
    "مينيو",
    "قائمه",
    "القائمه",
    "ابدا",
    "بدايه",
    "start",
    "hi",
    "hello",
    "hey",
    "menu",
];

const CONFIRM_WORDS: &[&str] = &[
    "نعم", "اه", "ايوه", "ايوا", "اكيد", "تمام", "يلا", "موافق", "تاكيد", "اوكي", "ok", "okay",
    "yes", "confirm", "sure",
];
const CANCEL_WORDS: &[&str] = &["الغاء", "الغي", "كنسل", "بطلت", "cancel", "stop"];
const DECLINE_WORDS: &[&str] = &["لا", "مش", "اعدل", "عدل", "no", "edit", "change"];

const ARABIC_WORDS: &[&str] = &["عربي", "عربيه", "العربيه", "ع", "1", "arabic"];
const ENGLISH_WORDS: &[&str] = &["انجليزي", "انكليزي", "الانجليزيه", "english", "e", "2"];

#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Idle window after which the session (and its cart) lapses.
    pub session_ttl: Duration,
    /// Notification channel for order, support, and review cards. `None`
    /// drops the cards, which is what demos and tests want.
    pub operator_channel: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { session_ttl: DEFAULT_SESSION_TTL, operator_channel: None }
    }
}

/// Everything the router talks to, as shared trait objects so the whole
/// engine runs against in-memory doubles in tests.
pub struct RouterDeps {
    pub store: Arc<dyn SessionStore>,
    pub catalog: Arc<dyn CatalogRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub customers: Arc<dyn CustomerRepository>,
    pub notifier: Arc<dyn NotificationGateway>,
    pub nlu: Arc<NluGateway>,
    pub budget: Arc<RequestBudget>,
    pub loyalty: Arc<dyn LoyaltyGateway>,
}

pub struct ConversationRouter {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) catalog: Arc<dyn CatalogRepository>,
    pub(crate) orders: Arc<dyn OrderRepository>,
    pub(crate) customers: Arc<dyn CustomerRepository>,
    pub(crate) notifier: Arc<dyn NotificationGateway>,
    pub(crate) nlu: Arc<NluGateway>,
    pub(crate) budget: Arc<RequestBudget>,
    pub(crate) loyalty: Arc<dyn LoyaltyGateway>,
    pub(crate) recovery: RecoveryExtractor,
    pub(crate) config: EngineConfig,
    gates: CustomerGates,
}

enum TurnInput {
    Text(String),
    Choice(ChoiceId),
    Location(DeliveryAddress),
}

impl ConversationRouter {
    pub fn new(deps: RouterDeps, config: EngineConfig) -> Self {
        Self {
            store: deps.store,
            catalog: deps.catalog,
            orders: deps.orders,
            customers: deps.customers,
            notifier: deps.notifier,
            nlu: deps.nlu,
            budget: deps.budget,
            loyalty: deps.loyalty,
            recovery: RecoveryExtractor::new(),
            config,
            gates: CustomerGates::new(),
        }
    }

    /// Runs one inbound event end to end. Turns of the same customer are
    /// serialized on a per-customer gate; different customers run freely in
    /// parallel. Never returns an error: every failure is logged and turned
    /// into a customer-facing reply where one makes sense.
    pub async fn handle_event(&self, event: InboundEvent) {
        let _turn = self.gates.acquire(&event.customer_id).await;
        let correlation_id = event.message_id;

        let mut session = match self.store.get(&event.customer_id).await {
            Ok(Some(session)) => session,
            Ok(None) => Session::new(event.customer_id.clone()),
            Err(error) => {
                tracing::warn!(
                    customer = %event.customer_id.as_str(),
                    error = %error,
                    "session read failed, starting fresh"
                );
                Session::new(event.customer_id.clone())
            }
        };
        let language = session.language;

        let input = match event.payload {
            InboundPayload::Text { body } => {
                session.record_customer_turn(&body);
                TurnInput::Text(body)
            }
            InboundPayload::Choice { id, title } => match ChoiceId::parse(&id) {
                Some(choice) => {
                    session.record_customer_turn(&title);
                    TurnInput::Choice(choice)
                }
                None => {
                    tracing::warn!(
                        customer = %event.customer_id.as_str(),
                        message_id = %correlation_id,
                        id = %id,
                        "dropping malformed choice id"
                    );
                    return;
                }
            },
            InboundPayload::Location { lat, lng, label } => {
                session.record_customer_turn(label.as_deref().unwrap_or("(موقع)"));
                TurnInput::Location(DeliveryAddress::Pin { lat, lng, label })
            }
            InboundPayload::Unsupported { kind } => {
                tracing::debug!(
                    customer = %event.customer_id.as_str(),
                    kind = %kind,
                    "unsupported message kind"
                );
                let notice = vec![OutboundMessage::text(replies::unsupported_kind(language))];
                self.finish_turn(session, notice).await;
                return;
            }
        };

        let replies = match self.dispatch(&mut session, input).await {
            Ok(replies) => replies,
            Err(error) => {
                let retryable = error.is_retryable();
                let interface = error.into_interface(correlation_id.clone());
                tracing::error!(
                    customer = %session.customer_id.as_str(),
                    message_id = %correlation_id,
                    error = %interface,
                    "turn failed"
                );
                let body = if retryable {
                    replies::service_trouble(session.language)
                } else {
                    replies::didnt_understand(session.language)
                };
                vec![OutboundMessage::text(body)]
            }
        };
        self.finish_turn(session, replies).await;
    }

    /// Persists the session, then delivers the replies. A failed write is
    /// logged and delivery still happens; losing one turn of state beats
    /// leaving the customer unanswered.
    async fn finish_turn(&self, mut session: Session, replies: Vec<OutboundMessage>) {
        for reply in &replies {
            session.record_bot_turn(reply.body());
        }
        session.updated_at = chrono::Utc::now();

        let customer_id = session.customer_id.clone();
        if let Err(error) = self.store.put(session, self.config.session_ttl).await {
            tracing::warn!(
                customer = %customer_id.as_str(),
                error = %error,
                "session write failed, this turn's state is lost"
            );
        }

        for reply in replies {
            if let Err(error) = self.notifier.send(&customer_id, reply).await {
                tracing::warn!(
                    customer = %customer_id.as_str(),
                    error = %error,
                    "reply delivery failed"
                );
            }
        }
    }

    async fn dispatch(
        &self,
        session: &mut Session,
        input: TurnInput,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        match input {
            TurnInput::Choice(choice) => self.dispatch_choice(session, choice).await,
            TurnInput::Text(text) => self.dispatch_text(session, &text).await,
            TurnInput::Location(address) => self.dispatch_location(session, address).await,
        }
    }

    async fn dispatch_choice(
        &self,
        session: &mut Session,
        choice: ChoiceId,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        match choice {
            ChoiceId::LangAr => Ok(self.set_language(session, Language::Ar)),
            ChoiceId::LangEn => Ok(self.set_language(session, Language::En)),
            ChoiceId::ChangeLanguage => {
                session.state = ConversationState::AwaitingLanguage;
                Ok(vec![language_prompt()])
            }
            ChoiceId::MainMenu => {
                session.state = ConversationState::MainMenu;
                let language = session.language;
                Ok(vec![main_menu(language, replies::main_menu_body(language))])
            }
            ChoiceId::OrderFood | ChoiceId::NewOrder => {
                self.show_restaurant_categories(session).await
            }
            ChoiceId::AllRestaurants => self.show_restaurants(session, None, None, 0).await,
            ChoiceId::AllRestaurantsPage { page } => {
                self.show_restaurants(session, None, None, page).await
            }
            ChoiceId::RestaurantCategory { category_id } => {
                self.show_restaurants(session, Some(category_id), None, 0).await
            }
            ChoiceId::RestaurantCategoryPage { category_id, page } => {
                self.show_restaurants(session, Some(category_id), None, page).await
            }
            ChoiceId::Restaurant { restaurant_id } => {
                self.open_restaurant(session, restaurant_id).await
            }
            // Menu category ids carry no restaurant; it rides on the state.
            ChoiceId::MenuCategory { category_id } => match session_restaurant(&session.state) {
                Some(restaurant_id) => {
                    self.show_items(session, restaurant_id, category_id, 0).await
                }
                None => Ok(vec![self.stale_choice(session)]),
            },
            ChoiceId::MenuCategoryPage { category_id, page } => {
                match session_restaurant(&session.state) {
                    Some(restaurant_id) => {
                        self.show_items(session, restaurant_id, category_id, page).await
                    }
                    None => Ok(vec![self.stale_choice(session)]),
                }
            }
            ChoiceId::Item { item_id } => self.show_item(session, item_id).await,
            ChoiceId::Variant { item_id, variant_id } => {
                self.choose_variant(session, item_id, variant_id).await
            }
            ChoiceId::Quantity { item_id, quantity } => {
                self.add_quantity(session, item_id, i64::from(quantity)).await
            }
            ChoiceId::ViewCart => Ok(self.show_cart(session)),
            ChoiceId::EditCart => Ok(self.show_cart_editor(session)),
            ChoiceId::CartIncrement { item_id, variant_id } => {
                self.apply_cart_edit(session, EditAction::Increment, item_id, variant_id)
            }
            ChoiceId::CartDecrement { item_id, variant_id } => {
                self.apply_cart_edit(session, EditAction::Decrement, item_id, variant_id)
            }
            ChoiceId::CartRemove { item_id, variant_id } => {
                self.apply_cart_edit(session, EditAction::Remove, item_id, variant_id)
            }
            ChoiceId::CartClear => Ok(self.clear_cart(session)),
            ChoiceId::Checkout => self.begin_checkout(session).await,
            ChoiceId::ConfirmOrder => self.confirm_order(session).await,
            ChoiceId::ModifyOrder => self.modify_order(session).await,
            ChoiceId::CancelOrder => Ok(self.cancel_order(session)),
            ChoiceId::Support => Ok(self.enter_support(session)),
            ChoiceId::EndSupport => Ok(self.end_support(session)),
            ChoiceId::RateOrder { order_id } => self.start_review(session, order_id).await,
        }
    }

    async fn dispatch_text(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(vec![OutboundMessage::text(replies::didnt_understand(language))]);
        }

        let normalized = normalize(trimmed);
        if RESTART_PHRASES.contains(&normalized.as_str()) {
            session.state = ConversationState::AwaitingLanguage;
            return Ok(vec![language_prompt()]);
        }

        match session.state.clone() {
            ConversationState::Init | ConversationState::AwaitingLanguage => {
                match detect_language(&normalized) {
                    Some(chosen) => Ok(self.set_language(session, chosen)),
                    None => Ok(vec![language_prompt()]),
                }
            }
            ConversationState::AwaitingQuantity { item_id, .. } => {
                match parse_quantity_text(trimmed) {
                    Some(quantity) => self.add_quantity(session, item_id, quantity).await,
                    None => self.free_text_turn(session, trimmed).await,
                }
            }
            ConversationState::AwaitingLocation => {
                let address = DeliveryAddress::Text { value: trimmed.to_string() };
                self.address_received(session, address).await
            }
            ConversationState::AwaitingName { address } => {
                self.name_received(session, address, trimmed).await
            }
            ConversationState::ConfirmingInfo { .. } => {
                // Cancellation and decline outrank confirmation so "لا مش
                // تمام" never places the order.
                if contains_word(&normalized, CANCEL_WORDS) {
                    Ok(self.cancel_order(session))
                } else if contains_word(&normalized, DECLINE_WORDS) {
                    self.modify_order(session).await
                } else if contains_word(&normalized, CONFIRM_WORDS) {
                    self.confirm_order(session).await
                } else {
                    Ok(vec![OutboundMessage::text(replies::confirm_hint(language))])
                }
            }
            ConversationState::AwaitingReview { order_id } => {
                self.record_review(session, order_id, trimmed).await
            }
            ConversationState::SupportChat => self.forward_support(session, trimmed).await,
            _ => self.free_text_turn(session, trimmed).await,
        }
    }

    async fn dispatch_location(
        &self,
        session: &mut Session,
        address: DeliveryAddress,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        match session.state {
            // A re-pin while asked for the name replaces the address.
            ConversationState::AwaitingLocation | ConversationState::AwaitingName { .. } => {
                self.address_received(session, address).await
            }
            _ => Ok(vec![OutboundMessage::text(replies::location_out_of_context(
                session.language,
            ))]),
        }
    }

    fn set_language(&self, session: &mut Session, language: Language) -> Vec<OutboundMessage> {
        session.language = language;
        session.state = ConversationState::MainMenu;
        vec![main_menu(language, replies::welcome_body(language))]
    }
}

fn contains_word(normalized: &str, words: &[&str]) -> bool {
    normalized.split_whitespace().any(|word| words.contains(&word))
        || words.contains(&normalized)
}

fn detect_language(normalized: &str) -> Option<Language> {
    if let Some(language) = Language::parse(normalized) {
        return Some(language);
    }
    if ARABIC_WORDS.contains(&normalized) {
        return Some(Language::Ar);
    }
    if ENGLISH_WORDS.contains(&normalized) {
        return Some(Language::En);
    }
    None
}
