//! Checkout pipeline: address, name, confirmation, commit, and the
//! post-order flows (review, support chat).
//!
//! The confirmation screen holds a [`DraftOrder`] that is consumed exactly
//! once at commit. A replayed confirm tap finds the session already in
//! `OrderPlaced` and gets a notice instead of a second order. Everything
//! after the order row is written is best-effort: loyalty, profile, and
//! operator pushes log failures and never roll the order back.

use rust_decimal::Decimal;
use sofra_chat::{ButtonPrompt, OutboundMessage};
use sofra_core::{
    ApplicationError, ChoiceId, ConversationState, CustomerProfile, DeliveryAddress, DraftOrder,
    NewOrder, NewOrderLine, OrderId, Session,
};

use crate::handlers::{main_menu, persistence, post_order};
use crate::loyalty::points_for;
use crate::replies;
use crate::router::ConversationRouter;

const NAME_CHARS: usize = 60;

impl ConversationRouter {
    /// Entry into checkout from the cart button, a checkout intent, or a
    /// confirm replay that needs redirecting.
    pub(crate) async fn begin_checkout(
        &self,
        session: &mut Session,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        if session.cart.is_empty() {
            session.state = ConversationState::MainMenu;
            return Ok(vec![main_menu(language, replies::empty_cart_checkout(language))]);
        }
        if session.cart.mixed_restaurants() {
            tracing::warn!(
                customer = %session.customer_id.as_str(),
                "cart spans multiple restaurants, checkout binds to the first line"
            );
        }

        session.state = ConversationState::AwaitingLocation;
        match self.load_profile(session).await.and_then(|profile| profile.default_address) {
            Some(address) => {
                let prompt =
                    ButtonPrompt::new(replies::checkout_saved_address_body(language, &address))
                        .button(ChoiceId::ConfirmOrder.as_id(), replies::btn_saved_address(language))
                        .build();
                Ok(vec![prompt])
            }
            None => Ok(vec![OutboundMessage::text(replies::checkout_location_body(language))]),
        }
    }

    /// Address arrived, as a location pin or typed text.
    pub(crate) async fn address_received(
        &self,
        session: &mut Session,
        address: DeliveryAddress,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        if session.cart.is_empty() {
            session.state = ConversationState::MainMenu;
            return Ok(vec![main_menu(language, replies::empty_cart_checkout(language))]);
        }

        match self.load_profile(session).await.and_then(|profile| profile.display_name) {
            Some(name) => self.present_confirmation(session, name, address).await,
            None => {
                session.state = ConversationState::AwaitingName { address };
                Ok(vec![OutboundMessage::text(replies::checkout_name_body(language))])
            }
        }
    }

    /// The saved-address button on the location prompt rides the confirm id;
    /// in `AwaitingLocation` a confirm means "deliver to the stored address".
    pub(crate) async fn use_saved_address(
        &self,
        session: &mut Session,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        match self.load_profile(session).await.and_then(|profile| profile.default_address) {
            Some(saved) => {
                self.address_received(session, DeliveryAddress::Text { value: saved }).await
            }
            None => Ok(vec![OutboundMessage::text(replies::checkout_location_body(language))]),
        }
    }

    pub(crate) async fn name_received(
        &self,
        session: &mut Session,
        address: DeliveryAddress,
        name: &str,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let name: String = name.trim().chars().take(NAME_CHARS).collect();
        if name.is_empty() {
            return Ok(vec![OutboundMessage::text(replies::checkout_name_body(language))]);
        }
        self.present_confirmation(session, name, address).await
    }

    /// Builds the draft and shows the confirmation summary.
    async fn present_confirmation(
        &self,
        session: &mut Session,
        customer_name: String,
        address: DeliveryAddress,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let Some(restaurant_id) = session.cart.first_restaurant() else {
            session.state = ConversationState::MainMenu;
            return Ok(vec![main_menu(language, replies::empty_cart_checkout(language))]);
        };

        let restaurant =
            self.catalog.find_restaurant(restaurant_id).await.map_err(persistence)?;
        let (restaurant_name, delivery_fee) = match restaurant {
            Some(restaurant) => (restaurant.name, restaurant.delivery_fee),
            None => {
                tracing::warn!(
                    restaurant = restaurant_id.0,
                    "restaurant of the cart no longer exists, delivery fee defaults to zero"
                );
                (String::new(), Decimal::ZERO)
            }
        };

        let draft = DraftOrder {
            restaurant_id,
            customer_name,
            address,
            cart_snapshot: session.cart.clone(),
            delivery_fee,
        };
        let summary = replies::confirm_summary(language, &restaurant_name, &draft);
        session.state = ConversationState::ConfirmingInfo { draft };

        let prompt = ButtonPrompt::new(summary)
            .button(ChoiceId::ConfirmOrder.as_id(), replies::btn_confirm(language))
            .button(ChoiceId::ModifyOrder.as_id(), replies::btn_modify(language))
            .button(ChoiceId::CancelOrder.as_id(), replies::btn_cancel(language))
            .build();
        Ok(vec![prompt])
    }

    /// Confirm tapped (or typed). Where it lands depends on how far checkout
    /// got; a replay after commit is answered without a second order.
    pub(crate) async fn confirm_order(
        &self,
        session: &mut Session,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        match session.state.clone() {
            ConversationState::ConfirmingInfo { draft } => self.commit_draft(session, draft).await,
            ConversationState::OrderPlaced { order_id } => Ok(vec![post_order(
                language,
                replies::order_already_placed(language, order_id),
                order_id,
            )]),
            ConversationState::AwaitingLocation => self.use_saved_address(session).await,
            _ if !session.cart.is_empty() => self.begin_checkout(session).await,
            _ => Ok(vec![self.stale_choice(session)]),
        }
    }

    /// Writes the order, then runs the best-effort tail: profile upsert,
    /// loyalty, operator card. The session only mutates after the write
    /// succeeds, so a failed write leaves the confirmation screen intact
    /// and the customer can simply confirm again.
    async fn commit_draft(
        &self,
        session: &mut Session,
        draft: DraftOrder,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        if draft.cart_snapshot.is_empty() {
            session.state = ConversationState::MainMenu;
            return Ok(vec![main_menu(language, replies::empty_cart_checkout(language))]);
        }

        let lines: Vec<NewOrderLine> = draft
            .cart_snapshot
            .lines()
            .iter()
            .map(|line| NewOrderLine {
                item_id: line.item_id,
                description: line.display_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
                line_total: line.line_total(),
            })
            .collect();
        let order = NewOrder {
            restaurant_id: draft.restaurant_id,
            customer_id: session.customer_id.clone(),
            customer_name: draft.customer_name.clone(),
            address: draft.address.clone(),
            subtotal: draft.subtotal(),
            delivery_fee: draft.delivery_fee,
            total: draft.total(),
            lines,
        };

        let order_id = self.orders.create(order.clone()).await.map_err(persistence)?;
        tracing::info!(
            customer = %session.customer_id.as_str(),
            order = order_id.0,
            total = %order.total,
            "order committed"
        );

        session.cart.clear();
        session.last_added = None;
        session.search_results.clear();
        session.state = ConversationState::OrderPlaced { order_id };

        self.remember_customer(session, &draft).await;
        let mut body = replies::order_placed(language, order_id);
        if let Some(points_line) = self.award_loyalty(session, order_id, order.total).await {
            body.push('\n');
            body.push_str(&points_line);
        }
        if let Some(nudge) = self.favorite_nudge(session).await {
            body.push('\n');
            body.push_str(&nudge);
        }

        let restaurant_name = self
            .catalog
            .find_restaurant(draft.restaurant_id)
            .await
            .ok()
            .flatten()
            .map(|restaurant| restaurant.name)
            .unwrap_or_default();
        self.push_operator_card(&replies::operator_order_card(order_id, &restaurant_name, &order))
            .await;

        Ok(vec![post_order(language, body, order_id)])
    }

    pub(crate) async fn modify_order(
        &self,
        session: &mut Session,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        match session.state {
            ConversationState::ConfirmingInfo { .. }
            | ConversationState::AwaitingLocation
            | ConversationState::AwaitingName { .. } => Ok(self.show_cart(session)),
            _ => Ok(vec![self.stale_choice(session)]),
        }
    }

    pub(crate) fn cancel_order(&self, session: &mut Session) -> Vec<OutboundMessage> {
        let language = session.language;
        match session.state {
            ConversationState::ConfirmingInfo { .. }
            | ConversationState::AwaitingLocation
            | ConversationState::AwaitingName { .. } => {
                session.cart.clear();
                session.last_added = None;
                session.state = ConversationState::MainMenu;
                vec![main_menu(language, replies::order_cancelled(language))]
            }
            ConversationState::OrderPlaced { order_id } => vec![post_order(
                language,
                replies::order_already_placed(language, order_id),
                order_id,
            )],
            _ => vec![self.stale_choice(session)],
        }
    }

    // -- post-order ---------------------------------------------------------

    pub(crate) async fn start_review(
        &self,
        session: &mut Session,
        order_id: OrderId,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let order = self.orders.find_by_id(order_id).await.map_err(persistence)?;
        let owns_order =
            order.is_some_and(|order| order.customer_id == session.customer_id);
        if !owns_order {
            return Ok(vec![self.stale_choice(session)]);
        }

        session.state = ConversationState::AwaitingReview { order_id };
        Ok(vec![OutboundMessage::text(replies::review_prompt(language, order_id))])
    }

    pub(crate) async fn record_review(
        &self,
        session: &mut Session,
        order_id: OrderId,
        text: &str,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        self.push_operator_card(&replies::operator_review_card(
            order_id,
            &session.customer_id,
            text,
        ))
        .await;

        session.state = ConversationState::MainMenu;
        Ok(vec![main_menu(language, replies::review_thanks(language))])
    }

    pub(crate) fn enter_support(&self, session: &mut Session) -> Vec<OutboundMessage> {
        let language = session.language;
        session.state = ConversationState::SupportChat;
        vec![ButtonPrompt::new(replies::support_intro(language))
            .button(ChoiceId::EndSupport.as_id(), replies::btn_end_support(language))
            .build()]
    }

    /// Every message while in support chat is relayed to the operator
    /// channel and acknowledged.
    pub(crate) async fn forward_support(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let profile_name = self.load_profile(session).await.and_then(|profile| profile.display_name);
        self.push_operator_card(&replies::operator_support_card(
            &session.customer_id,
            profile_name.as_deref(),
            text,
        ))
        .await;
        Ok(vec![OutboundMessage::text(replies::support_ack(language))])
    }

    pub(crate) fn end_support(&self, session: &mut Session) -> Vec<OutboundMessage> {
        let language = session.language;
        session.state = ConversationState::MainMenu;
        vec![main_menu(language, replies::support_closed(language))]
    }

    // -- best-effort tail ---------------------------------------------------

    /// Profile read that degrades to `None`; checkout works for brand-new
    /// customers and when the customer table is unreachable.
    async fn load_profile(&self, session: &Session) -> Option<CustomerProfile> {
        match self.customers.find_profile(&session.customer_id).await {
            Ok(profile) => profile,
            Err(error) => {
                tracing::warn!(
                    customer = %session.customer_id.as_str(),
                    error = %error,
                    "profile read failed, continuing without it"
                );
                None
            }
        }
    }

    /// Saves name and address for the next checkout.
    async fn remember_customer(&self, session: &Session, draft: &DraftOrder) {
        let mut profile = self
            .load_profile(session)
            .await
            .unwrap_or_else(|| CustomerProfile::new(session.customer_id.clone()));
        profile.display_name = Some(draft.customer_name.clone());
        profile.default_address = Some(draft.address.as_text());
        profile.updated_at = chrono::Utc::now();

        if let Err(error) = self.customers.upsert_profile(profile).await {
            tracing::warn!(
                customer = %session.customer_id.as_str(),
                error = %error,
                "profile upsert failed"
            );
        }
    }

    /// Mirrors points onto the customer row and notifies the loyalty
    /// program. Returns the reply line when anything was credited.
    async fn award_loyalty(
        &self,
        session: &Session,
        order_id: OrderId,
        total: Decimal,
    ) -> Option<String> {
        let language = session.language;
        let points = points_for(total);
        if points == 0 {
            return None;
        }

        let balance = match self.customers.add_loyalty_points(&session.customer_id, points).await
        {
            Ok(balance) => Some(balance),
            Err(error) => {
                tracing::warn!(
                    customer = %session.customer_id.as_str(),
                    error = %error,
                    "loyalty balance mirror failed"
                );
                None
            }
        };
        if let Err(error) =
            self.loyalty.award_points(&session.customer_id, order_id, points).await
        {
            tracing::warn!(
                customer = %session.customer_id.as_str(),
                order = order_id.0,
                error = %error,
                "loyalty award failed"
            );
        }

        Some(replies::order_points(language, points, balance))
    }

    async fn favorite_nudge(&self, session: &Session) -> Option<String> {
        let language = session.language;
        match self.loyalty.suggest_favorite(&session.customer_id).await {
            Ok(Some(name)) => Some(replies::favorite_nudge(language, &name)),
            Ok(None) => None,
            Err(error) => {
                tracing::warn!(
                    customer = %session.customer_id.as_str(),
                    error = %error,
                    "favorite suggestion failed"
                );
                None
            }
        }
    }

    /// Plain-text card to the configured operator channel. Silently skipped
    /// when no channel is configured.
    pub(crate) async fn push_operator_card(&self, card: &str) {
        let Some(channel) = &self.config.operator_channel else {
            tracing::debug!("operator channel not configured, card dropped");
            return;
        };
        if let Err(error) = self.notifier.push_operator(channel, card).await {
            tracing::warn!(channel = %channel, error = %error, "operator push failed");
        }
    }
}
