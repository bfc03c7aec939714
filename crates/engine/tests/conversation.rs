//! End-to-end conversation tests. Inbound events run through the full
//! router against in-memory repositories, a recording gateway, and a
//! scripted model client; assertions read the stored session, the replies,
//! and the operator pushes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use sofra_agent::{LlmError, NluGateway, RequestBudget, ScriptedLlmClient};
use sofra_chat::{InboundEvent, InboundPayload, OutboundMessage, RecordingGateway};
use sofra_core::{
    ConversationState, CustomerId, CustomerProfile, ItemId, ItemVariant, Language, MenuCategory,
    MenuCategoryId, MenuItem, NewOrder, Order, OrderId, OrderStatus, Restaurant,
    RestaurantCategory, RestaurantCategoryId, RestaurantId, Session, VariantId,
};
use sofra_db::repositories::{
    CustomerRepository, InMemoryCatalogRepository, InMemoryCustomerRepository,
    InMemoryOrderRepository, OrderRepository, RepositoryError,
};
use sofra_engine::{
    replies, ConversationRouter, EngineConfig, InMemorySessionStore, RecordingLoyaltyGateway,
    RouterDeps, SessionStore,
};

const OPERATOR_CHANNEL: &str = "962795550000";

static NEXT_MESSAGE: AtomicU64 = AtomicU64::new(1);

fn message_id() -> String {
    format!("wamid.{}", NEXT_MESSAGE.fetch_add(1, Ordering::Relaxed))
}

fn price(value: &str) -> Decimal {
    value.parse().expect("decimal literal")
}

// -- catalog fixture --------------------------------------------------------

fn category(id: i64, name: &str, position: i64) -> RestaurantCategory {
    RestaurantCategory { id: RestaurantCategoryId(id), name: name.to_string(), position }
}

fn restaurant(id: i64, category: i64, name: &str, fee: &str) -> Restaurant {
    Restaurant {
        id: RestaurantId(id),
        category_id: RestaurantCategoryId(category),
        name: name.to_string(),
        description: None,
        delivery_fee: price(fee),
        active: true,
    }
}

fn menu_category(id: i64, restaurant: i64, name: &str, position: i64) -> MenuCategory {
    MenuCategory {
        id: MenuCategoryId(id),
        restaurant_id: RestaurantId(restaurant),
        name: name.to_string(),
        position,
    }
}

fn item(id: i64, restaurant: i64, section: i64, name: &str, base: Option<&str>) -> MenuItem {
    MenuItem {
        id: ItemId(id),
        restaurant_id: RestaurantId(restaurant),
        category_id: MenuCategoryId(section),
        name: name.to_string(),
        description: None,
        price: base.map(price),
        available: true,
    }
}

fn variant(id: i64, item: i64, name: &str, amount: &str) -> ItemVariant {
    ItemVariant {
        id: VariantId(id),
        item_id: ItemId(item),
        name: name.to_string(),
        price: price(amount),
    }
}

/// Two restaurants: a shawarma place with a variant-priced sandwich and a
/// flat-priced cola, and a pizza place that stays untouched in most tests.
fn demo_catalog() -> InMemoryCatalogRepository {
    InMemoryCatalogRepository {
        categories: vec![category(1, "شاورما وسناك", 1), category(2, "بيتزا", 2)],
        restaurants: vec![
            restaurant(1, 1, "شاورما الريم", "1.00"),
            restaurant(2, 2, "بيتزا روما", "1.50"),
        ],
        menu_categories: vec![
            menu_category(10, 1, "ساندويشات", 1),
            menu_category(20, 2, "بيتزا", 1),
        ],
        items: vec![
            item(1, 1, 10, "شاورما دجاج", None),
            item(2, 1, 10, "كولا", Some("0.75")),
            item(3, 2, 20, "بيتزا مارجريتا", None),
        ],
        variants: vec![
            variant(11, 1, "صغير", "2.50"),
            variant(12, 1, "كبير", "3.50"),
            variant(31, 3, "وسط", "6.00"),
            variant(32, 3, "عائلي", "9.00"),
        ],
    }
}

// -- order repository double ------------------------------------------------

struct FailingOrderRepo;

#[async_trait]
impl OrderRepository for FailingOrderRepo {
    async fn create(&self, _order: NewOrder) -> Result<OrderId, RepositoryError> {
        Err(RepositoryError::Decode("orders table rejected the write".to_string()))
    }

    async fn find_by_id(&self, _id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(None)
    }

    async fn list_recent_for_customer(
        &self,
        _customer_id: &CustomerId,
        _limit: u32,
    ) -> Result<Vec<Order>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn update_status(
        &self,
        _id: OrderId,
        _status: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        Ok(false)
    }
}

// -- harness ----------------------------------------------------------------

struct Harness {
    router: ConversationRouter,
    store: Arc<InMemorySessionStore>,
    orders: Arc<InMemoryOrderRepository>,
    customers: Arc<InMemoryCustomerRepository>,
    gateway: Arc<RecordingGateway>,
    llm: Arc<ScriptedLlmClient>,
    loyalty: Arc<RecordingLoyaltyGateway>,
}

impl Harness {
    fn new(llm: ScriptedLlmClient) -> Self {
        Self::build(
            demo_catalog(),
            llm,
            RequestBudget::new(30, Duration::from_secs(60)),
            RecordingLoyaltyGateway::new(),
            None,
        )
    }

    fn build(
        catalog: InMemoryCatalogRepository,
        llm: ScriptedLlmClient,
        budget: RequestBudget,
        loyalty: RecordingLoyaltyGateway,
        orders_override: Option<Arc<dyn OrderRepository>>,
    ) -> Self {
        let store = Arc::new(InMemorySessionStore::new());
        let orders = Arc::new(InMemoryOrderRepository::default());
        let customers = Arc::new(InMemoryCustomerRepository::default());
        let gateway = Arc::new(RecordingGateway::new());
        let llm = Arc::new(llm);
        let loyalty = Arc::new(loyalty);

        let order_repo: Arc<dyn OrderRepository> = match orders_override {
            Some(repo) => repo,
            None => orders.clone(),
        };
        let deps = RouterDeps {
            store: store.clone(),
            catalog: Arc::new(catalog),
            orders: order_repo,
            customers: customers.clone(),
            notifier: gateway.clone(),
            nlu: Arc::new(NluGateway::new(llm.clone(), Duration::from_secs(5), 0)),
            budget: Arc::new(budget),
            loyalty: loyalty.clone(),
        };
        let config = EngineConfig {
            session_ttl: Duration::from_secs(1800),
            operator_channel: Some(OPERATOR_CHANNEL.to_string()),
        };

        Self {
            router: ConversationRouter::new(deps, config),
            store,
            orders,
            customers,
            gateway,
            llm,
            loyalty,
        }
    }

    async fn deliver(&self, customer: &str, payload: InboundPayload) {
        let event = InboundEvent {
            customer_id: CustomerId(customer.to_string()),
            message_id: message_id(),
            profile_name: None,
            payload,
        };
        self.router.handle_event(event).await;
    }

    async fn text(&self, customer: &str, body: &str) {
        self.deliver(customer, InboundPayload::Text { body: body.to_string() }).await;
    }

    async fn tap(&self, customer: &str, id: &str) {
        self.deliver(
            customer,
            InboundPayload::Choice { id: id.to_string(), title: id.to_string() },
        )
        .await;
    }

    async fn pin(&self, customer: &str, lat: f64, lng: f64, label: Option<&str>) {
        self.deliver(
            customer,
            InboundPayload::Location { lat, lng, label: label.map(str::to_string) },
        )
        .await;
    }

    async fn session(&self, customer: &str) -> Session {
        self.store
            .get(&CustomerId(customer.to_string()))
            .await
            .expect("session store read")
            .expect("session should exist")
    }

    fn last_message(&self) -> OutboundMessage {
        self.gateway.sent().last().expect("at least one reply").message.clone()
    }

    fn last_body(&self) -> String {
        self.last_message().body().to_string()
    }

    /// Greeting plus the Arabic language tap; ends on the main menu.
    async fn boot(&self, customer: &str) {
        self.text(customer, "مرحبا").await;
        self.tap(customer, "lang_ar").await;
    }

    /// Button path to two large chicken shawarmas in the cart.
    async fn add_large_shawarma(&self, customer: &str) {
        self.tap(customer, "order_food").await;
        self.tap(customer, "rest_cat_1").await;
        self.tap(customer, "rest_1").await;
        self.tap(customer, "menu_cat_10").await;
        self.tap(customer, "item_1").await;
        self.tap(customer, "variant_1_12").await;
        self.tap(customer, "qty_1_2").await;
    }

    /// Runs checkout up to the confirmation screen for a new customer.
    async fn to_confirmation(&self, customer: &str) {
        self.boot(customer).await;
        self.add_large_shawarma(customer).await;
        self.tap(customer, "checkout").await;
        self.pin(customer, 31.9539, 35.9106, Some("دوار الواحة")).await;
        self.text(customer, "أبو أحمد").await;
    }
}

fn button_ids(message: &OutboundMessage) -> Vec<String> {
    match message {
        OutboundMessage::Buttons { buttons, .. } => {
            buttons.iter().map(|button| button.id.clone()).collect()
        }
        _ => Vec::new(),
    }
}

fn row_ids(message: &OutboundMessage) -> Vec<String> {
    match message {
        OutboundMessage::List { sections, .. } => sections
            .iter()
            .flat_map(|section| section.rows.iter().map(|row| row.id.clone()))
            .collect(),
        _ => Vec::new(),
    }
}

// -- onboarding and browsing ------------------------------------------------

#[tokio::test]
async fn first_contact_asks_for_language_then_greets() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000001";

    harness.text(customer, "مرحبا").await;

    let prompt = harness.last_message();
    assert_eq!(prompt.body(), replies::language_prompt_body());
    assert_eq!(button_ids(&prompt), vec!["lang_ar", "lang_en"]);
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::AwaitingLanguage));

    harness.tap(customer, "lang_ar").await;

    let welcome = harness.last_message();
    assert_eq!(welcome.body(), replies::welcome_body(Language::Ar));
    assert_eq!(button_ids(&welcome), vec!["order_food", "view_cart", "support"]);
    let session = harness.session(customer).await;
    assert_eq!(session.language, Language::Ar);
    assert!(matches!(session.state, ConversationState::MainMenu));
}

#[tokio::test]
async fn button_browse_path_builds_the_cart() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000002";
    harness.boot(customer).await;

    harness.tap(customer, "order_food").await;
    let cuisines = row_ids(&harness.last_message());
    assert!(cuisines.contains(&"rest_cat_1".to_string()));
    assert!(cuisines.contains(&"all_rest".to_string()));

    harness.tap(customer, "rest_cat_1").await;
    assert!(row_ids(&harness.last_message()).contains(&"rest_1".to_string()));

    harness.tap(customer, "rest_1").await;
    assert!(row_ids(&harness.last_message()).contains(&"menu_cat_10".to_string()));

    harness.tap(customer, "menu_cat_10").await;
    let items = row_ids(&harness.last_message());
    assert!(items.contains(&"item_1".to_string()));
    assert!(items.contains(&"item_2".to_string()));

    harness.tap(customer, "item_1").await;
    assert_eq!(button_ids(&harness.last_message()), vec!["variant_1_11", "variant_1_12"]);

    harness.tap(customer, "variant_1_12").await;
    assert_eq!(button_ids(&harness.last_message()), vec!["qty_1_1", "qty_1_2", "qty_1_3"]);

    harness.tap(customer, "qty_1_2").await;
    let summary = harness.last_message();
    assert!(summary.body().contains("شاورما دجاج (كبير)"));
    assert!(summary.body().contains("7.00"));
    assert_eq!(button_ids(&summary), vec!["rest_1", "view_cart", "checkout"]);

    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 2);
    assert_eq!(session.cart.total(), price("7.00"));
    assert!(matches!(session.state, ConversationState::BrowsingCategories { .. }));
}

#[tokio::test]
async fn restaurant_lists_paginate_with_nav_rows() {
    let mut catalog = demo_catalog();
    catalog.categories = vec![category(1, "مطاعم", 1)];
    catalog.restaurants =
        (1..=24).map(|n| restaurant(n, 1, &format!("مطعم {n}"), "1.00")).collect();
    catalog.menu_categories.clear();
    catalog.items.clear();
    catalog.variants.clear();

    let harness = Harness::build(
        catalog,
        ScriptedLlmClient::new(),
        RequestBudget::new(30, Duration::from_secs(60)),
        RecordingLoyaltyGateway::new(),
        None,
    );
    let customer = "962790000003";
    harness.boot(customer).await;

    harness.tap(customer, "order_food").await;
    harness.tap(customer, "rest_cat_1").await;
    let first_page = row_ids(&harness.last_message());
    assert!(first_page.contains(&"rest_1".to_string()));
    assert!(first_page.contains(&"rest_8".to_string()));
    assert!(!first_page.contains(&"rest_9".to_string()));
    assert!(first_page.contains(&"rest_cat_page_1_1".to_string()));
    assert!(!first_page.contains(&"rest_cat_page_1_0".to_string()));

    harness.tap(customer, "rest_cat_page_1_2").await;
    let last_page = row_ids(&harness.last_message());
    assert!(last_page.contains(&"rest_17".to_string()));
    assert!(last_page.contains(&"rest_24".to_string()));
    assert!(last_page.contains(&"rest_cat_page_1_1".to_string()));
    assert!(!last_page.contains(&"rest_cat_page_1_3".to_string()));
}

// -- free text through the model --------------------------------------------

#[tokio::test]
async fn free_text_order_resolves_through_the_model() {
    let llm = ScriptedLlmClient::new().reply(
        r#"{"kind": "order",
            "items": [{"name": "شاورما دجاج", "quantity": 2, "size": "كبير"}],
            "upsell_suggestions": ["كولا"]}"#,
    );
    let harness = Harness::new(llm);
    let customer = "962790000004";
    harness.boot(customer).await;

    harness.text(customer, "بدي اثنين شاورما دجاج كبير").await;

    assert_eq!(harness.llm.requests().len(), 1);
    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 2);
    assert_eq!(session.cart.lines()[0].variant_id, Some(VariantId(12)));
    assert_eq!(session.cart.total(), price("7.00"));

    let bodies = harness.gateway.bodies();
    let ack = &bodies[bodies.len() - 2];
    assert!(ack.contains("شاورما دجاج (كبير)"));
    assert!(ack.contains("7.00"));
    assert_eq!(bodies.last().map(String::as_str), Some(replies::upsell(Language::Ar, "كولا").as_str()));
}

#[tokio::test]
async fn one_shot_order_rescopes_to_the_named_restaurant() {
    let llm = ScriptedLlmClient::new().reply(
        r#"{"kind": "order",
            "items": [{"name": "بيتزا مارجريتا", "quantity": 1, "size": "عائلي"}],
            "restaurant_name": "بيتزا روما"}"#,
    );
    let harness = Harness::new(llm);
    let customer = "962790000030";
    harness.boot(customer).await;
    // browsing the shawarma place scopes the session away from the pizza place
    harness.add_large_shawarma(customer).await;

    harness.text(customer, "وبدي كمان بيتزا مارجريتا عائلية من بيتزا روما").await;

    let session = harness.session(customer).await;
    assert_eq!(session.cart.lines().len(), 2);
    assert_eq!(session.cart.lines()[1].item_id, ItemId(3));
    assert_eq!(session.cart.lines()[1].variant_id, Some(VariantId(32)));
    assert_eq!(session.cart.total(), price("16.00"));
    assert!(harness.last_body().contains("بيتزا مارجريتا (عائلي)"));
}

#[tokio::test]
async fn unknown_restaurant_in_an_order_offers_candidates() {
    let llm = ScriptedLlmClient::new().reply(
        r#"{"kind": "order",
            "items": [{"name": "شاورما"}],
            "restaurant_name": "مطعم الشرق"}"#,
    );
    let harness = Harness::new(llm);
    let customer = "962790000031";
    harness.boot(customer).await;

    harness.text(customer, "بدي شاورما من مطعم الشرق").await;

    let offer = harness.last_message();
    assert_eq!(offer.body(), replies::which_restaurant_body(Language::Ar, "مطعم الشرق"));
    assert_eq!(row_ids(&offer), vec!["rest_1", "rest_2"]);
    let session = harness.session(customer).await;
    assert!(session.cart.is_empty());
    assert!(matches!(
        session.state,
        ConversationState::BrowsingRestaurants { category_id: None, .. }
    ));
}

#[tokio::test]
async fn model_failure_falls_back_to_keyword_recovery() {
    let llm = ScriptedLlmClient::new()
        .fail(LlmError::Response("not json".to_string()));
    let harness = Harness::new(llm);
    let customer = "962790000005";
    harness.boot(customer).await;

    harness.text(customer, "بدي كولا").await;

    assert_eq!(harness.llm.requests().len(), 1);
    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 1);
    assert_eq!(session.cart.lines()[0].item_id, ItemId(2));
    assert_eq!(session.cart.total(), price("0.75"));
    assert!(harness.last_body().contains("كولا"));
}

#[tokio::test]
async fn request_budget_limits_model_calls() {
    let llm = ScriptedLlmClient::new()
        .reply(r#"{"kind": "small_talk", "message": "تمام الحمدلله"}"#);
    let harness = Harness::build(
        demo_catalog(),
        llm,
        RequestBudget::new(1, Duration::from_secs(60)),
        RecordingLoyaltyGateway::new(),
        None,
    );
    let customer = "962790000006";
    harness.boot(customer).await;

    harness.text(customer, "كيفك يا زلمة").await;
    assert_eq!(harness.last_body(), "تمام الحمدلله");

    harness.text(customer, "شو في عندكم اليوم").await;
    assert_eq!(harness.last_body(), replies::slow_down(Language::Ar));
    assert_eq!(harness.llm.requests().len(), 1);
}

#[tokio::test]
async fn bare_size_retargets_the_last_add_without_the_model() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000007";
    harness.boot(customer).await;
    harness.tap(customer, "order_food").await;
    harness.tap(customer, "rest_cat_1").await;
    harness.tap(customer, "rest_1").await;
    harness.tap(customer, "menu_cat_10").await;
    harness.tap(customer, "item_1").await;
    harness.tap(customer, "variant_1_11").await;
    harness.tap(customer, "qty_1_1").await;

    harness.text(customer, "كبيرة").await;

    assert!(harness.llm.requests().is_empty());
    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 1);
    assert_eq!(session.cart.lines()[0].variant_id, Some(VariantId(12)));
    assert_eq!(session.cart.total(), price("3.50"));
    assert!(harness.last_body().contains("شاورما دجاج (كبير)"));
}

#[tokio::test]
async fn unmatched_item_offers_candidates_then_reference_picks_one() {
    let llm = ScriptedLlmClient::new()
        .reply(r#"{"kind": "order", "items": [{"name": "شاورما مع ثوم"}]}"#)
        .reply(r#"{"kind": "reference", "reference_position": 1}"#);
    let harness = Harness::new(llm);
    let customer = "962790000008";
    harness.boot(customer).await;

    harness.text(customer, "بدي شاورما مع ثوم زيادة").await;
    let suggestions = harness.last_message();
    assert_eq!(row_ids(&suggestions), vec!["item_1"]);
    let session = harness.session(customer).await;
    assert_eq!(session.search_results.len(), 1);

    // the referenced item is variant-priced, so the size screen follows
    harness.text(customer, "الأول").await;
    assert_eq!(button_ids(&harness.last_message()), vec!["variant_1_11", "variant_1_12"]);

    harness.tap(customer, "variant_1_12").await;
    harness.tap(customer, "qty_1_1").await;
    let session = harness.session(customer).await;
    assert_eq!(session.cart.total(), price("3.50"));
}

#[tokio::test]
async fn text_removal_empties_the_cart() {
    let llm = ScriptedLlmClient::new()
        .reply(r#"{"kind": "cart_update", "items": [{"name": "كولا", "action": "remove"}]}"#);
    let harness = Harness::new(llm);
    let customer = "962790000009";
    harness.boot(customer).await;
    harness.tap(customer, "order_food").await;
    harness.tap(customer, "rest_cat_1").await;
    harness.tap(customer, "rest_1").await;
    harness.tap(customer, "menu_cat_10").await;
    harness.tap(customer, "item_2").await;
    harness.tap(customer, "qty_2_2").await;

    harness.text(customer, "شيل الكولا").await;

    let session = harness.session(customer).await;
    assert!(session.cart.is_empty());
    assert!(session.last_added.is_none());
    assert!(harness.last_body().contains("كولا"));
}

#[tokio::test]
async fn text_quantity_update_rewrites_the_line() {
    let llm = ScriptedLlmClient::new().reply(
        r#"{"kind": "cart_update",
            "items": [{"name": "شاورما", "action": "set_quantity", "quantity": 5}]}"#,
    );
    let harness = Harness::new(llm);
    let customer = "962790000010";
    harness.boot(customer).await;
    harness.add_large_shawarma(customer).await;

    harness.text(customer, "خليهم خمسة").await;

    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 5);
    assert_eq!(session.cart.total(), price("17.50"));
    assert!(harness.last_body().contains("5 × شاورما دجاج (كبير)"));
}

// -- cart editor ------------------------------------------------------------

#[tokio::test]
async fn cart_editor_decrements_and_removes_lines() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000011";
    harness.boot(customer).await;
    harness.add_large_shawarma(customer).await;

    harness.tap(customer, "view_cart").await;
    let cart = harness.last_message();
    assert!(cart.body().contains("7.00"));
    assert_eq!(button_ids(&cart), vec!["checkout", "edit_cart", "main_menu"]);

    harness.tap(customer, "edit_cart").await;
    let editor = row_ids(&harness.last_message());
    assert!(editor.contains(&"cart_inc_1_12".to_string()));
    assert!(editor.contains(&"cart_dec_1_12".to_string()));
    assert!(editor.contains(&"cart_rm_1_12".to_string()));
    assert!(editor.contains(&"cart_clear".to_string()));

    harness.tap(customer, "cart_dec_1_12").await;
    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 1);
    assert!(harness.last_body().contains("3.50"));

    harness.tap(customer, "cart_rm_1_12").await;
    let session = harness.session(customer).await;
    assert!(session.cart.is_empty());
    assert_eq!(harness.last_body(), replies::cart_empty(Language::Ar));
}

#[tokio::test]
async fn typed_quantity_completes_the_quantity_step() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000012";
    harness.boot(customer).await;
    harness.tap(customer, "order_food").await;
    harness.tap(customer, "rest_cat_1").await;
    harness.tap(customer, "rest_1").await;
    harness.tap(customer, "menu_cat_10").await;
    harness.tap(customer, "item_1").await;
    harness.tap(customer, "variant_1_12").await;

    harness.text(customer, "٣").await;

    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 3);
    assert_eq!(session.cart.total(), price("10.50"));
}

// -- checkout ---------------------------------------------------------------

#[tokio::test]
async fn checkout_collects_address_then_name_then_commits() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000013";
    harness.boot(customer).await;
    harness.add_large_shawarma(customer).await;

    harness.tap(customer, "checkout").await;
    assert_eq!(harness.last_body(), replies::checkout_location_body(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::AwaitingLocation));

    harness.pin(customer, 31.9539, 35.9106, Some("دوار الواحة")).await;
    assert_eq!(harness.last_body(), replies::checkout_name_body(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::AwaitingName { .. }));

    harness.text(customer, "أبو أحمد").await;
    let summary = harness.last_message();
    assert!(summary.body().contains("شاورما الريم"));
    assert!(summary.body().contains("2 × شاورما دجاج (كبير)"));
    assert!(summary.body().contains("8.00"));
    assert!(summary.body().contains("أبو أحمد"));
    assert!(summary.body().contains("دوار الواحة"));
    assert_eq!(button_ids(&summary), vec!["confirm_order", "modify_order", "cancel_order"]);

    harness.tap(customer, "confirm_order").await;

    let order = harness
        .orders
        .find_by_id(OrderId(1))
        .await
        .expect("order read")
        .expect("order committed");
    assert_eq!(order.customer_id, CustomerId(customer.to_string()));
    assert_eq!(order.customer_name, "أبو أحمد");
    assert_eq!(order.address.as_text(), "دوار الواحة");
    assert_eq!(order.subtotal, price("7.00"));
    assert_eq!(order.delivery_fee, price("1.00"));
    assert_eq!(order.total, price("8.00"));
    assert_eq!(order.lines.len(), 1);
    assert_eq!(order.lines[0].description, "شاورما دجاج (كبير)");
    assert_eq!(order.lines[0].quantity, 2);

    let session = harness.session(customer).await;
    assert!(session.cart.is_empty());
    assert!(session.last_added.is_none());
    assert!(matches!(session.state, ConversationState::OrderPlaced { .. }));

    let done = harness.last_message();
    assert!(done.body().contains("#1"));
    assert!(done.body().contains("كسبت 8 نقطة"));
    assert_eq!(button_ids(&done), vec!["new_order", "rate_order_1", "support"]);

    assert_eq!(harness.loyalty.awards(), vec![(CustomerId(customer.to_string()), OrderId(1), 8)]);
    let profile = harness
        .customers
        .find_profile(&CustomerId(customer.to_string()))
        .await
        .expect("profile read")
        .expect("profile saved");
    assert_eq!(profile.display_name.as_deref(), Some("أبو أحمد"));
    assert_eq!(profile.default_address.as_deref(), Some("دوار الواحة"));
    assert_eq!(profile.loyalty_points, 8);

    let pushes = harness.gateway.operator_pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].channel, OPERATOR_CHANNEL);
    assert!(pushes[0].text.contains("شاورما الريم"));
    assert!(pushes[0].text.contains("#1"));
    assert!(pushes[0].text.contains("أبو أحمد"));
}

#[tokio::test]
async fn replayed_confirm_does_not_place_a_second_order() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000014";
    harness.to_confirmation(customer).await;
    harness.tap(customer, "confirm_order").await;

    harness.tap(customer, "confirm_order").await;

    let orders = harness
        .orders
        .list_recent_for_customer(&CustomerId(customer.to_string()), 10)
        .await
        .expect("orders read");
    assert_eq!(orders.len(), 1);
    assert_eq!(harness.last_body(), replies::order_already_placed(Language::Ar, OrderId(1)));
}

#[tokio::test]
async fn empty_cart_checkout_redirects_to_the_menu() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000015";
    harness.boot(customer).await;

    harness.tap(customer, "checkout").await;

    assert_eq!(harness.last_body(), replies::empty_cart_checkout(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::MainMenu));
}

#[tokio::test]
async fn saved_profile_skips_address_and_name_prompts() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000016";
    let mut profile = CustomerProfile::new(CustomerId(customer.to_string()));
    profile.display_name = Some("أم علي".to_string());
    profile.default_address = Some("الصويفية، شارع الوكالات".to_string());
    harness.customers.upsert_profile(profile).await.expect("seed profile");

    harness.boot(customer).await;
    harness.add_large_shawarma(customer).await;

    harness.tap(customer, "checkout").await;
    let prompt = harness.last_message();
    assert_eq!(
        prompt.body(),
        replies::checkout_saved_address_body(Language::Ar, "الصويفية، شارع الوكالات")
    );
    assert_eq!(button_ids(&prompt), vec!["confirm_order"]);

    harness.tap(customer, "confirm_order").await;
    let summary = harness.last_body();
    assert!(summary.contains("أم علي"));
    assert!(summary.contains("الصويفية"));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::ConfirmingInfo { .. }));

    harness.tap(customer, "confirm_order").await;
    let order = harness
        .orders
        .find_by_id(OrderId(1))
        .await
        .expect("order read")
        .expect("order committed");
    assert_eq!(order.customer_name, "أم علي");
    assert_eq!(order.address.as_text(), "الصويفية، شارع الوكالات");
}

#[tokio::test]
async fn order_write_failure_keeps_the_confirmation_screen() {
    let harness = Harness::build(
        demo_catalog(),
        ScriptedLlmClient::new(),
        RequestBudget::new(30, Duration::from_secs(60)),
        RecordingLoyaltyGateway::new(),
        Some(Arc::new(FailingOrderRepo)),
    );
    let customer = "962790000017";
    harness.to_confirmation(customer).await;

    harness.tap(customer, "confirm_order").await;

    assert_eq!(harness.last_body(), replies::service_trouble(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::ConfirmingInfo { .. }));
    assert_eq!(session.cart.count(), 2);
    assert!(harness.loyalty.awards().is_empty());
    assert!(harness.gateway.operator_pushes().is_empty());
}

#[tokio::test]
async fn cancel_at_confirmation_empties_the_cart() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000018";
    harness.to_confirmation(customer).await;

    harness.tap(customer, "cancel_order").await;

    assert_eq!(harness.last_body(), replies::order_cancelled(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::MainMenu));
    assert!(session.cart.is_empty());
    let orders = harness
        .orders
        .list_recent_for_customer(&CustomerId(customer.to_string()), 10)
        .await
        .expect("orders read");
    assert!(orders.is_empty());
}

#[tokio::test]
async fn typed_refusal_wins_over_a_confirm_word() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000019";
    harness.to_confirmation(customer).await;

    harness.text(customer, "لا مش تمام بدي اعدل").await;

    let orders = harness
        .orders
        .list_recent_for_customer(&CustomerId(customer.to_string()), 10)
        .await
        .expect("orders read");
    assert!(orders.is_empty());
    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 2);
}

#[tokio::test]
async fn favorite_suggestion_rides_the_order_confirmation() {
    let harness = Harness::build(
        demo_catalog(),
        ScriptedLlmClient::new(),
        RequestBudget::new(30, Duration::from_secs(60)),
        RecordingLoyaltyGateway::new().with_favorite("بيتزا روما"),
        None,
    );
    let customer = "962790000020";
    harness.to_confirmation(customer).await;

    harness.tap(customer, "confirm_order").await;

    assert!(harness.last_body().contains("بيتزا روما"));
}

// -- support and reviews ----------------------------------------------------

#[tokio::test]
async fn support_chat_relays_to_the_operator() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000021";
    harness.boot(customer).await;

    harness.tap(customer, "support").await;
    let intro = harness.last_message();
    assert_eq!(intro.body(), replies::support_intro(Language::Ar));
    assert_eq!(button_ids(&intro), vec!["end_support"]);
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::SupportChat));

    harness.text(customer, "وين طلبي صرله ساعة").await;
    let pushes = harness.gateway.operator_pushes();
    assert_eq!(pushes.len(), 1);
    assert_eq!(pushes[0].channel, OPERATOR_CHANNEL);
    assert!(pushes[0].text.contains("وين طلبي صرله ساعة"));
    assert!(pushes[0].text.contains(customer));
    assert_eq!(harness.last_body(), replies::support_ack(Language::Ar));

    harness.tap(customer, "end_support").await;
    assert_eq!(harness.last_body(), replies::support_closed(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::MainMenu));
}

#[tokio::test]
async fn order_review_reaches_the_operator() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000022";
    harness.to_confirmation(customer).await;
    harness.tap(customer, "confirm_order").await;
    assert_eq!(harness.gateway.operator_pushes().len(), 1);

    harness.tap(customer, "rate_order_1").await;
    assert_eq!(harness.last_body(), replies::review_prompt(Language::Ar, OrderId(1)));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::AwaitingReview { .. }));

    harness.text(customer, "الأكل ممتاز والتوصيل سريع").await;
    let pushes = harness.gateway.operator_pushes();
    assert_eq!(pushes.len(), 2);
    assert!(pushes[1].text.contains("الأكل ممتاز والتوصيل سريع"));
    assert_eq!(harness.last_body(), replies::review_thanks(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::MainMenu));
}

#[tokio::test]
async fn rating_an_unknown_order_is_refused() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000023";
    harness.boot(customer).await;

    harness.tap(customer, "rate_order_7").await;

    assert_eq!(harness.last_body(), replies::stale_choice_body(Language::Ar));
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::MainMenu));
}

// -- guards and edges -------------------------------------------------------

#[tokio::test]
async fn malformed_choice_ids_are_dropped_without_a_reply() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000024";
    harness.boot(customer).await;
    assert_eq!(harness.gateway.sent().len(), 2);

    harness.tap(customer, "item_abc").await;
    harness.tap(customer, "qty_1_0").await;
    harness.tap(customer, "rest_").await;

    assert_eq!(harness.gateway.sent().len(), 2);
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::MainMenu));
}

#[tokio::test]
async fn greeting_restarts_language_but_keeps_the_cart() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000025";
    harness.boot(customer).await;
    harness.add_large_shawarma(customer).await;

    harness.text(customer, "مرحبا").await;

    assert_eq!(harness.last_body(), replies::language_prompt_body());
    let session = harness.session(customer).await;
    assert!(matches!(session.state, ConversationState::AwaitingLanguage));
    assert_eq!(session.cart.count(), 2);

    harness.tap(customer, "lang_ar").await;
    let session = harness.session(customer).await;
    assert_eq!(session.cart.count(), 2);
}

#[tokio::test]
async fn location_outside_checkout_is_explained() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000026";
    harness.boot(customer).await;

    harness.pin(customer, 31.9539, 35.9106, None).await;

    assert_eq!(harness.last_body(), replies::location_out_of_context(Language::Ar));
}

#[tokio::test]
async fn unsupported_payloads_get_a_notice() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let customer = "962790000027";
    harness.boot(customer).await;

    harness.deliver(customer, InboundPayload::Unsupported { kind: "audio".to_string() }).await;

    assert_eq!(harness.last_body(), replies::unsupported_kind(Language::Ar));
}

#[tokio::test]
async fn customers_do_not_share_sessions() {
    let harness = Harness::new(ScriptedLlmClient::new());
    let first = "962790000028";
    let second = "962790000029";

    harness.boot(first).await;
    harness.add_large_shawarma(first).await;

    harness.text(second, "hello").await;
    harness.tap(second, "lang_en").await;
    assert_eq!(harness.last_body(), replies::welcome_body(Language::En));

    let first_session = harness.session(first).await;
    assert_eq!(first_session.language, Language::Ar);
    assert_eq!(first_session.cart.count(), 2);

    let second_session = harness.session(second).await;
    assert_eq!(second_session.language, Language::En);
    assert!(second_session.cart.is_empty());
}
