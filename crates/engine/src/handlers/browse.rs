//! Browse screens: cuisines, restaurants, menu sections, items, variants,
//! and the quantity step that ends with a cart line.

use sofra_chat::{ButtonPrompt, ListPrompt, OutboundMessage};
use sofra_core::{
    normalize, page_slice, ApplicationError, ChoiceId, ConversationState, DomainError, ItemId,
    Language, MenuCategoryId, Restaurant, RestaurantCategoryId, RestaurantId, Session, VariantId,
    MAX_LINE_QUANTITY, PAGE_SIZE,
};

use crate::handlers::{after_add, main_menu, persistence, resolve_details};
use crate::replies;
use crate::router::ConversationRouter;

impl ConversationRouter {
    /// First browse screen: cuisine groupings plus the all-restaurants row.
    pub(crate) async fn show_restaurant_categories(
        &self,
        session: &mut Session,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let categories =
            self.catalog.list_restaurant_categories().await.map_err(persistence)?;
        if categories.is_empty() {
            return self.show_restaurants(session, None, None, 0).await;
        }

        let prompt = ListPrompt::new(
            replies::pick_cuisine_body(language),
            replies::list_open_button(language),
        )
        .section(replies::cuisine_section(language), |rows| {
            for category in categories.iter().take(PAGE_SIZE + 1) {
                rows.row(
                    ChoiceId::RestaurantCategory { category_id: category.id }.as_id(),
                    &category.name,
                );
            }
            rows.row(ChoiceId::AllRestaurants.as_id(), replies::all_restaurants_row(language));
        })
        .build();

        session.state = ConversationState::BrowsingRestaurantCategories;
        Ok(vec![prompt])
    }

    /// One page of the restaurant directory, optionally narrowed to a
    /// cuisine or filtered by a free-text keyword held on the session.
    pub(crate) async fn show_restaurants(
        &self,
        session: &mut Session,
        category_id: Option<RestaurantCategoryId>,
        keyword: Option<String>,
        page: u32,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let mut restaurants =
            self.catalog.list_restaurants(category_id).await.map_err(persistence)?;
        if let Some(keyword) = &keyword {
            restaurants = self.filter_by_keyword(restaurants, keyword).await?;
        }

        if restaurants.is_empty() {
            session.state = ConversationState::MainMenu;
            return Ok(vec![main_menu(language, replies::restaurants_empty(language))]);
        }

        let paged = page_slice(restaurants.len(), page);
        if paged.start == paged.end {
            return Ok(vec![OutboundMessage::text(replies::no_more_pages(language))]);
        }

        let body = match &keyword {
            Some(keyword) => replies::keyword_results_body(language, keyword),
            None => replies::restaurants_body(language),
        };
        let page_id = |page: u32| match category_id {
            Some(category_id) => ChoiceId::RestaurantCategoryPage { category_id, page }.as_id(),
            None => ChoiceId::AllRestaurantsPage { page }.as_id(),
        };

        let mut prompt = ListPrompt::new(body, replies::list_open_button(language)).section(
            replies::restaurants_section(language),
            |rows| {
                for restaurant in &restaurants[paged.start..paged.end] {
                    rows.row_with_description(
                        ChoiceId::Restaurant { restaurant_id: restaurant.id }.as_id(),
                        &restaurant.name,
                        replies::delivery_fee_note(language, restaurant.delivery_fee),
                    );
                }
            },
        );
        if paged.has_prev || paged.has_next {
            prompt = prompt.section(replies::page_label(language, page as usize), |rows| {
                if paged.has_prev {
                    rows.row(page_id(page - 1), replies::nav_prev(language));
                }
                if paged.has_next {
                    rows.row(page_id(page + 1), replies::nav_next(language));
                }
            });
        }

        session.state = ConversationState::BrowsingRestaurants { category_id, keyword };
        Ok(vec![prompt.build()])
    }

    /// Keyword search over restaurant names, widened to restaurants serving
    /// a matching item when no name matches.
    async fn filter_by_keyword(
        &self,
        restaurants: Vec<Restaurant>,
        keyword: &str,
    ) -> Result<Vec<Restaurant>, ApplicationError> {
        let needle = normalize(keyword);
        if needle.is_empty() {
            return Ok(restaurants);
        }

        let by_name: Vec<Restaurant> = restaurants
            .iter()
            .filter(|restaurant| normalize(&restaurant.name).contains(&needle))
            .cloned()
            .collect();
        if !by_name.is_empty() {
            return Ok(by_name);
        }

        let contexts = self.catalog.item_contexts(None).await.map_err(persistence)?;
        let serving: Vec<RestaurantId> = contexts
            .iter()
            .filter(|context| normalize(&context.name).contains(&needle))
            .map(|context| context.restaurant_id)
            .collect();
        Ok(restaurants
            .into_iter()
            .filter(|restaurant| serving.contains(&restaurant.id))
            .collect())
    }

    /// Menu sections of one restaurant; restaurants without sections list
    /// their items directly.
    pub(crate) async fn open_restaurant(
        &self,
        session: &mut Session,
        restaurant_id: RestaurantId,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let Some(restaurant) =
            self.catalog.find_restaurant(restaurant_id).await.map_err(persistence)?
        else {
            return Ok(vec![self.stale_choice(session)]);
        };
        if !restaurant.active {
            return Ok(vec![self.stale_choice(session)]);
        }

        let categories =
            self.catalog.list_menu_categories(restaurant_id).await.map_err(persistence)?;
        session.state = ConversationState::BrowsingCategories { restaurant_id };

        if categories.is_empty() {
            let items =
                self.catalog.list_items(restaurant_id, None).await.map_err(persistence)?;
            let prompt = ListPrompt::new(
                replies::items_body(language, &restaurant.name),
                replies::list_open_button(language),
            )
            .section(replies::items_section(language), |rows| {
                for item in &items {
                    item_row(rows, language, &item.name, item.id, item.price_from, item.has_variants);
                }
            })
            .build();
            return Ok(vec![prompt]);
        }

        let prompt = ListPrompt::new(
            replies::menu_body(language, &restaurant.name),
            replies::list_open_button(language),
        )
        .section(replies::menu_section(language), |rows| {
            for category in &categories {
                rows.row(ChoiceId::MenuCategory { category_id: category.id }.as_id(), &category.name);
            }
        })
        .build();
        Ok(vec![prompt])
    }

    /// One page of a menu section.
    pub(crate) async fn show_items(
        &self,
        session: &mut Session,
        restaurant_id: RestaurantId,
        category_id: MenuCategoryId,
        page: u32,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let Some(restaurant) =
            self.catalog.find_restaurant(restaurant_id).await.map_err(persistence)?
        else {
            return Ok(vec![self.stale_choice(session)]);
        };
        let items = self
            .catalog
            .list_items(restaurant_id, Some(category_id))
            .await
            .map_err(persistence)?;

        if items.is_empty() {
            return self.open_restaurant(session, restaurant_id).await;
        }
        let paged = page_slice(items.len(), page);
        if paged.start == paged.end {
            return Ok(vec![OutboundMessage::text(replies::no_more_pages(language))]);
        }

        let mut prompt = ListPrompt::new(
            replies::items_body(language, &restaurant.name),
            replies::list_open_button(language),
        )
        .section(replies::items_section(language), |rows| {
            for item in &items[paged.start..paged.end] {
                item_row(rows, language, &item.name, item.id, item.price_from, item.has_variants);
            }
        });
        if paged.has_prev || paged.has_next {
            prompt = prompt.section(replies::page_label(language, page as usize), |rows| {
                if paged.has_prev {
                    rows.row(
                        ChoiceId::MenuCategoryPage { category_id, page: page - 1 }.as_id(),
                        replies::nav_prev(language),
                    );
                }
                if paged.has_next {
                    rows.row(
                        ChoiceId::MenuCategoryPage { category_id, page: page + 1 }.as_id(),
                        replies::nav_next(language),
                    );
                }
            });
        }

        session.state = ConversationState::BrowsingItems { restaurant_id, category_id };
        Ok(vec![prompt.build()])
    }

    /// Item screen: size choice when the item has variants, otherwise
    /// straight to the quantity step.
    pub(crate) async fn show_item(
        &self,
        session: &mut Session,
        item_id: ItemId,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let Some(details) = self.catalog.find_item(item_id).await.map_err(persistence)? else {
            return Ok(vec![self.stale_choice(session)]);
        };
        if !details.item.available {
            return Ok(vec![OutboundMessage::text(replies::unavailable_item(language))]);
        }
        let restaurant_id = details.item.restaurant_id;

        if details.variants.is_empty() {
            if details.item.price.is_none() {
                return Ok(vec![OutboundMessage::text(replies::unavailable_item(language))]);
            }
            session.state =
                ConversationState::AwaitingQuantity { restaurant_id, item_id, variant_id: None };
            return Ok(vec![quantity_prompt(language, item_id, &details.item.name)]);
        }

        let caption =
            replies::item_caption(language, &details.item.name, details.item.description.as_deref());
        let message = if details.variants.len() <= 3 {
            let mut prompt = ButtonPrompt::new(caption);
            for variant in &details.variants {
                prompt = prompt.button(
                    ChoiceId::Variant { item_id, variant_id: variant.id }.as_id(),
                    format!("{} · {}", variant.name, variant.price),
                );
            }
            prompt.build()
        } else {
            ListPrompt::new(caption, replies::list_open_button(language))
                .section("", |rows| {
                    for variant in &details.variants {
                        rows.row_with_description(
                            ChoiceId::Variant { item_id, variant_id: variant.id }.as_id(),
                            &variant.name,
                            replies::money(language, variant.price),
                        );
                    }
                })
                .build()
        };

        session.state = ConversationState::ViewingItem { restaurant_id, item_id };
        Ok(vec![message])
    }

    pub(crate) async fn choose_variant(
        &self,
        session: &mut Session,
        item_id: ItemId,
        variant_id: VariantId,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let Some(details) = self.catalog.find_item(item_id).await.map_err(persistence)? else {
            return Ok(vec![self.stale_choice(session)]);
        };
        let Some(resolved) = resolve_details(&details, Some(variant_id), "") else {
            return Ok(vec![self.stale_choice(session)]);
        };

        session.state = ConversationState::AwaitingQuantity {
            restaurant_id: details.item.restaurant_id,
            item_id,
            variant_id: Some(variant_id),
        };
        Ok(vec![quantity_prompt(language, item_id, &resolved.name)])
    }

    /// Quantity arrived, either a `qty_` button or typed digits. The chosen
    /// variant rides on the session state, the wire id only carries the item.
    pub(crate) async fn add_quantity(
        &self,
        session: &mut Session,
        item_id: ItemId,
        quantity: i64,
    ) -> Result<Vec<OutboundMessage>, ApplicationError> {
        let language = session.language;
        let ConversationState::AwaitingQuantity { item_id: expected, variant_id, .. } =
            session.state
        else {
            return Ok(vec![self.stale_choice(session)]);
        };
        if expected != item_id {
            return Ok(vec![self.stale_choice(session)]);
        }

        if quantity < 1 || quantity > i64::from(MAX_LINE_QUANTITY) {
            return Ok(vec![OutboundMessage::text(replies::quantity_range(
                language,
                MAX_LINE_QUANTITY,
            ))]);
        }

        let Some(details) = self.catalog.find_item(item_id).await.map_err(persistence)? else {
            return Ok(vec![self.stale_choice(session)]);
        };
        let restaurant_name = self
            .catalog
            .find_restaurant(details.item.restaurant_id)
            .await
            .map_err(persistence)?
            .map(|restaurant| restaurant.name)
            .unwrap_or_default();
        let Some(resolved) = resolve_details(&details, variant_id, &restaurant_name) else {
            return Ok(vec![self.stale_choice(session)]);
        };

        match session.cart.add(&resolved, quantity as u32) {
            Ok(key) => {
                session.last_added = Some(key);
                let restaurant_id = resolved.restaurant_id;
                session.state = ConversationState::BrowsingCategories { restaurant_id };
                let mut body = replies::added_to_cart(language, quantity as u32, &resolved.name);
                body.push('\n');
                body.push('\n');
                body.push_str(&replies::cart_summary(language, &session.cart));
                Ok(vec![after_add(language, body, restaurant_id)])
            }
            Err(DomainError::QuantityOutOfRange { max, .. }) => {
                Ok(vec![OutboundMessage::text(replies::quantity_range(language, max))])
            }
            Err(DomainError::UnpricedItem { .. }) => self.show_item(session, item_id).await,
            Err(error) => Err(ApplicationError::Domain(error)),
        }
    }

    /// Expired or fabricated structured choice: reset to the main menu.
    pub(crate) fn stale_choice(&self, session: &mut Session) -> OutboundMessage {
        let language = session.language;
        session.state = ConversationState::MainMenu;
        main_menu(language, replies::stale_choice_body(language))
    }
}

fn quantity_prompt(language: Language, item_id: ItemId, name: &str) -> OutboundMessage {
    let mut prompt = ButtonPrompt::new(replies::quantity_body(language, name));
    for quantity in 1..=3u32 {
        prompt = prompt.button(ChoiceId::Quantity { item_id, quantity }.as_id(), quantity.to_string());
    }
    prompt.build()
}

fn item_row(
    rows: &mut sofra_chat::SectionRows,
    language: Language,
    name: &str,
    item_id: ItemId,
    price_from: Option<rust_decimal::Decimal>,
    has_variants: bool,
) {
    let id = ChoiceId::Item { item_id }.as_id();
    match price_from {
        Some(price) if has_variants => {
            rows.row_with_description(id, name, replies::price_from(language, price));
        }
        Some(price) => {
            rows.row_with_description(id, name, replies::money(language, price));
        }
        None => {
            rows.row(id, name);
        }
    }
}
