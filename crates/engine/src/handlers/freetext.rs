//! Free-text turns: the deterministic pre-checks, the model call, and the
//! mapping from a validated [`Intent`] onto cart and browse actions.
//!
//! The model never touches the cart. It only names things; every name is
//! re-resolved against the catalog here, so a hallucinated item can at
//! worst produce a "not found" reply.

use sofra_agent::NluRequest;
use sofra_chat::{ListPrompt, OutboundMessage};
use sofra_core::{
    normalize, resolve_restaurant, strip_size, ApplicationError, CartKey, CatalogIndex, ChoiceId,
    ConversationState, Intent, IntentItem, IntentKind, ItemAction, ItemContext, Language,
    ResolvedItem, Restaurant, Session, SizeHint, MAX_LINE_QUANTITY, PAGE_SIZE,
};

use crate::handlers::{after_add, main_menu, persistence, session_restaurant};
use crate::replies;
use crate::router::ConversationRouter;

const UPSELL_SUGGESTIONS: usize = 2;

impl ConversationRouter {
    /// A text turn that no earlier state hook claimed. Bare size words
    /// retarget the last add without spending a model call; everything else
    /// goes through the budget gate and the NLU gateway.
    pub(crate) async fn free_text_turn(
        &self,
        session: &mut Session,
        text: &str,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;

        let (stripped, size) = strip_size(text);
        if stripped.is_empty() {
            if let Some(size) = size {
                return self.retarget_last_size(session, size).await;
            }
            return Ok(vec![OutboundMessage::text(replies::didnt_understand(language))]);
        }

        if !self.budget.try_acquire(&session.customer_id) {
            tracing::debug!(
                customer = %session.customer_id.as_str(),
                "nlu budget exhausted, answering without the model"
            );
            return Ok(vec![OutboundMessage::text(replies::slow_down(language))]);
        }

        let scope = session_restaurant(&session.state).or_else(|| session.cart.first_restaurant());
        let contexts = self.catalog.item_contexts(scope).await.map_err(persistence)?;

        let mut intent = {
            let request = NluRequest {
                text,
                language,
                restaurant_scoped: scope.is_some(),
                catalog: &contexts,
                cart: &session.cart,
                history: &session.history,
            };
            self.nlu.resolve(&request).await
        };

        if intent.kind == IntentKind::Error {
            match self.recovery.recover(text, &contexts) {
                Some(recovered) => {
                    tracing::debug!(
                        customer = %session.customer_id.as_str(),
                        "keyword recovery salvaged the turn"
                    );
                    intent = recovered;
                }
                None => {
                    let body = intent
                        .message
                        .unwrap_or_else(|| replies::didnt_understand(language));
                    return Ok(vec![OutboundMessage::text(body)]);
                }
            }
        }

        self.apply_intent(session, intent, contexts).await
    }

    /// "كبيرة" right after an add means the last line in its large size.
    async fn retarget_last_size(
        &self,
        session: &mut Session,
        size: SizeHint,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let fallback =
            || Ok(vec![OutboundMessage::text(replies::didnt_understand(language))]);

        let Some(last) = session.last_added else {
            return fallback();
        };
        let Some(restaurant_id) = session.cart.get(&last).map(|line| line.restaurant_id) else {
            session.last_added = None;
            return fallback();
        };

        let contexts =
            self.catalog.item_contexts(Some(restaurant_id)).await.map_err(persistence)?;
        let index = CatalogIndex::new(contexts);
        let Some(resolved) = index.resolve_size_for_item(last.item_id, size) else {
            return fallback();
        };

        match session.cart.replace(&last, &resolved) {
            Ok(key) => {
                session.last_added = Some(key);
                let quantity = session.cart.get(&key).map(|line| line.quantity).unwrap_or(1);
                let body = format!(
                    "{}\n\n{}",
                    replies::line_updated(language, quantity, &resolved.name),
                    replies::cart_summary(language, &session.cart),
                );
                Ok(vec![after_add(language, body, restaurant_id)])
            }
            Err(_) => fallback(),
        }
    }

    async fn apply_intent(
        &self,
        session: &mut Session,
        intent: Intent,
        contexts: Vec<ItemContext>,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        match intent.kind {
            IntentKind::Order | IntentKind::CartUpdate => {
                self.apply_item_intent(session, intent, contexts).await
            }
            IntentKind::Browse => self.apply_browse_intent(session, intent).await,
            IntentKind::Reference => self.apply_reference(session, intent).await,
            IntentKind::Checkout => self.begin_checkout(session).await,
            IntentKind::ViewCart => Ok(self.show_cart(session)),
            IntentKind::Support => Ok(self.enter_support(session)),
            IntentKind::SmallTalk => {
                let body =
                    intent.message.unwrap_or_else(|| replies::smalltalk_fallback(language));
                Ok(vec![main_menu(language, body)])
            }
            IntentKind::Error => {
                Ok(vec![OutboundMessage::text(replies::didnt_understand(language))])
            }
        }
    }

    /// Walks the intent items in order. Adds and removals accumulate into
    /// one ack; the first item that needs a decision (size choice,
    /// did-you-mean) appends its prompt and stops the walk.
    async fn apply_item_intent(
        &self,
        session: &mut Session,
        intent: Intent,
        mut contexts: Vec<ItemContext>,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;

        // A one-shot order may name its restaurant. A resolved name
        // re-scopes the item walk; an unresolvable one gets a candidate
        // list, never items matched out of another restaurant's menu.
        if intent.kind == IntentKind::Order {
            if let Some(name) = intent.restaurant_name.as_deref() {
                let restaurants =
                    self.catalog.list_restaurants(None).await.map_err(persistence)?;
                match resolve_restaurant(name, &restaurants) {
                    Some(restaurant_id) => {
                        let scope = session_restaurant(&session.state)
                            .or_else(|| session.cart.first_restaurant());
                        if scope != Some(restaurant_id) {
                            contexts = self
                                .catalog
                                .item_contexts(Some(restaurant_id))
                                .await
                                .map_err(persistence)?;
                        }
                    }
                    None => {
                        return Ok(self.offer_restaurant_candidates(session, name, restaurants))
                    }
                }
            }
        }

        let index = CatalogIndex::new(contexts);

        let mut notes: Vec<String> = Vec::new();
        let mut touched = false;
        let mut added = false;
        let mut tail: Vec<OutboundMessage> = Vec::new();

        for item in &intent.items {
            match item.action.unwrap_or(ItemAction::Add) {
                ItemAction::Remove => {
                    notes.push(self.remove_by_name(session, &item.name, &index, &mut touched));
                }
                ItemAction::SetQuantity => {
                    notes.push(self.set_quantity_by_name(session, item, &index, &mut touched));
                }
                ItemAction::Add | ItemAction::Unknown => {
                    match index.resolve(&item.name, size_hint(item)) {
                        Some(resolved) if resolved.price.is_some() => {
                            let quantity = item.quantity.unwrap_or(1).max(1) as u32;
                            self.note_cross_restaurant(session, &resolved);
                            match session.cart.add(&resolved, quantity) {
                                Ok(key) => {
                                    session.last_added = Some(key);
                                    touched = true;
                                    added = true;
                                    notes.push(replies::added_to_cart(
                                        language,
                                        quantity,
                                        &resolved.name,
                                    ));
                                }
                                Err(error) => {
                                    tracing::debug!(error = %error, "intent add rejected");
                                    notes.push(replies::didnt_understand(language));
                                }
                            }
                        }
                        Some(resolved) => {
                            // needs a size before it can be priced
                            tail = self.show_item(session, resolved.item_id).await?;
                            break;
                        }
                        None => {
                            let candidates = index.candidates(&item.name, 3);
                            if candidates.is_empty() {
                                notes.push(replies::not_found(language, &item.name));
                            } else {
                                session.search_results = candidates.clone();
                                tail = vec![did_you_mean_prompt(language, &item.name, &candidates)];
                                break;
                            }
                        }
                    }
                }
            }
        }

        let stale_last =
            session.last_added.is_some_and(|key| session.cart.get(&key).is_none());
        if stale_last {
            session.last_added = None;
        }

        let mut out = Vec::new();
        if touched {
            let mut body = notes.join("\n");
            if !session.cart.is_empty() {
                body.push_str("\n\n");
                body.push_str(&replies::cart_summary(language, &session.cart));
            }
            out.push(match session.cart.first_restaurant() {
                Some(restaurant_id) => after_add(language, body, restaurant_id),
                None => main_menu(language, body),
            });
        } else if !notes.is_empty() {
            out.push(OutboundMessage::text(notes.join("\n")));
        }
        out.extend(tail);

        if added && out.len() == 1 && !intent.upsell_suggestions.is_empty() {
            let joined = intent
                .upsell_suggestions
                .iter()
                .take(UPSELL_SUGGESTIONS)
                .cloned()
                .collect::<Vec<_>>()
                .join("، ");
            out.push(OutboundMessage::text(replies::upsell(language, &joined)));
        }

        if out.is_empty() {
            out.push(OutboundMessage::text(replies::didnt_understand(language)));
        }
        Ok(out)
    }

    fn remove_by_name(
        &self,
        session: &mut Session,
        name: &str,
        index: &CatalogIndex,
        touched: &mut bool,
    ) -> String {
        let language = session.language;
        let key = cart_key_by_name(session, name).or_else(|| {
            index
                .resolve(name, None)
                .and_then(|resolved| session.cart.key_for_item(resolved.item_id))
        });

        match key {
            Some(key) => {
                let line_name = session
                    .cart
                    .get(&key)
                    .map(|line| line.display_name.clone())
                    .unwrap_or_else(|| name.to_string());
                if session.cart.remove(&key) {
                    *touched = true;
                    replies::removed_from_cart(language, &line_name)
                } else {
                    replies::line_missing(language)
                }
            }
            None => replies::line_missing(language),
        }
    }

    fn set_quantity_by_name(
        &self,
        session: &mut Session,
        item: &IntentItem,
        index: &CatalogIndex,
        touched: &mut bool,
    ) -> String {
        let language = session.language;
        let Some(quantity) = item.quantity else {
            return replies::didnt_understand(language);
        };
        let key = cart_key_by_name(session, &item.name).or_else(|| {
            index
                .resolve(&item.name, None)
                .and_then(|resolved| session.cart.key_for_item(resolved.item_id))
        });
        let Some(key) = key else {
            return replies::line_missing(language);
        };

        match session.cart.set_quantity(&key, quantity) {
            Ok(true) => {
                *touched = true;
                let name = session
                    .cart
                    .get(&key)
                    .map(|line| line.display_name.clone())
                    .unwrap_or_else(|| item.name.clone());
                replies::line_updated(language, quantity as u32, &name)
            }
            Ok(false) => replies::line_missing(language),
            Err(error) => {
                tracing::debug!(error = %error, "intent quantity rejected");
                replies::quantity_range(language, MAX_LINE_QUANTITY)
            }
        }
    }

    async fn apply_browse_intent(
        &self,
        session: &mut Session,
        intent: Intent,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let Some(name) = intent.restaurant_name else {
            return self.show_restaurant_categories(session).await;
        };

        let restaurants = self.catalog.list_restaurants(None).await.map_err(persistence)?;
        match resolve_restaurant(&name, &restaurants) {
            Some(restaurant_id) => self.open_restaurant(session, restaurant_id).await,
            None => self.show_restaurants(session, None, Some(name), 0).await,
        }
    }

    /// The customer named a restaurant the directory cannot match. Word
    /// overlap picks the closest names; with no overlap the whole directory
    /// head stands in, so the reply always carries something tappable.
    fn offer_restaurant_candidates(
        &self,
        session: &mut Session,
        name: &str,
        restaurants: Vec<Restaurant>,
    ) -> Vec<OutboundMessage> {
        let language = session.language;
        if restaurants.is_empty() {
            session.state = ConversationState::MainMenu;
            return vec![main_menu(language, replies::restaurants_empty(language))];
        }

        let needle = normalize(name);
        let mut candidates: Vec<&Restaurant> = restaurants
            .iter()
            .filter(|restaurant| {
                let restaurant_name = normalize(&restaurant.name);
                needle
                    .split_whitespace()
                    .any(|word| restaurant_name.contains(word))
            })
            .collect();
        if candidates.is_empty() {
            candidates = restaurants.iter().collect();
        }

        let prompt = ListPrompt::new(
            replies::which_restaurant_body(language, name),
            replies::list_open_button(language),
        )
        .section(replies::restaurants_section(language), |rows| {
            for restaurant in candidates.iter().take(PAGE_SIZE) {
                rows.row_with_description(
                    ChoiceId::Restaurant { restaurant_id: restaurant.id }.as_id(),
                    &restaurant.name,
                    replies::delivery_fee_note(language, restaurant.delivery_fee),
                );
            }
        })
        .build();

        session.state = ConversationState::BrowsingRestaurants {
            category_id: None,
            keyword: Some(name.to_string()),
        };
        vec![prompt]
    }

    /// "الأول" or "رقم ٢" against the last did-you-mean list.
    async fn apply_reference(
        &self,
        session: &mut Session,
        intent: Intent,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let resolved = intent
            .reference_position
            .and_then(|position| usize::try_from(position - 1).ok())
            .and_then(|position| session.search_results.get(position).cloned());
        let Some(resolved) = resolved else {
            return Ok(vec![OutboundMessage::text(replies::didnt_understand(language))]);
        };

        if resolved.price.is_none() {
            return self.show_item(session, resolved.item_id).await;
        }

        let quantity =
            intent.items.first().and_then(|item| item.quantity).unwrap_or(1).max(1) as u32;
        self.note_cross_restaurant(session, &resolved);
        match session.cart.add(&resolved, quantity) {
            Ok(key) => {
                session.last_added = Some(key);
                let body = format!(
                    "{}\n\n{}",
                    replies::added_to_cart(language, quantity, &resolved.name),
                    replies::cart_summary(language, &session.cart),
                );
                Ok(vec![after_add(language, body, resolved.restaurant_id)])
            }
            Err(error) => {
                tracing::debug!(error = %error, "reference add rejected");
                Ok(vec![OutboundMessage::text(replies::didnt_understand(language))])
            }
        }
    }

    fn note_cross_restaurant(&self, session: &Session, resolved: &ResolvedItem) {
        if let Some(first) = session.cart.first_restaurant() {
            if first != resolved.restaurant_id {
                tracing::warn!(
                    customer = %session.customer_id.as_str(),
                    cart_restaurant = first.0,
                    added_restaurant = resolved.restaurant_id.0,
                    "cart now spans restaurants"
                );
            }
        }
    }
}

/// Cart lines match on their display name, so a removal phrased the way
/// the summary printed it always lands, scoped catalog or not.
fn cart_key_by_name(session: &Session, name: &str) -> Option<CartKey> {
    let needle = normalize(name);
    if needle.is_empty() {
        return None;
    }
    session
        .cart
        .lines()
        .iter()
        .find(|line| {
            let line_name = normalize(&line.display_name);
            line_name.contains(&needle) || needle.contains(&line_name)
        })
        .map(|line| line.key())
}

fn size_hint(item: &IntentItem) -> Option<SizeHint> {
    item.size.as_deref().and_then(SizeHint::parse)
}

fn did_you_mean_prompt(
    language: Language,
    name: &str,
    candidates: &[ResolvedItem],
) -> OutboundMessage {
    ListPrompt::new(replies::did_you_mean(language, name), replies::list_open_button(language))
        .section(replies::items_section(language), |rows| {
            for candidate in candidates {
                rows.row_with_description(
                    ChoiceId::Item { item_id: candidate.item_id }.as_id(),
                    &candidate.name,
                    candidate.restaurant_name.clone(),
                );
            }
        })
        .build()
}
