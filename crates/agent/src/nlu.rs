use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sofra_core::{normalize, Cart, CustomerId, HistoryTurn, Intent, ItemContext, Language, TurnRole};
use tokio::time::Instant;

use crate::llm::{CompletionRequest, LlmClient, LlmError};

/// Context bounds: a scoped restaurant sends its menu head, otherwise
/// keyword hits across restaurants, otherwise the catalog head.
pub const SCOPED_CONTEXT_ITEMS: usize = 40;
pub const KEYWORD_CONTEXT_ITEMS: usize = 25;
pub const DEFAULT_CONTEXT_ITEMS: usize = 20;

const HISTORY_TURNS_IN_PROMPT: usize = 6;
const DESCRIPTION_CHARS: usize = 60;
const HISTORY_TEXT_CHARS: usize = 120;

/// One free-text turn handed to the language model, with everything the
/// prompt may draw on. `restaurant_scoped` marks `catalog` as a single
/// restaurant's items rather than a cross-restaurant slice.
pub struct NluRequest<'a> {
    pub text: &'a str,
    pub language: Language,
    pub restaurant_scoped: bool,
    pub catalog: &'a [ItemContext],
    pub cart: &'a Cart,
    pub history: &'a [HistoryTurn],
}

/// Turns free text into a validated [`Intent`]. Every failure mode
/// (transport, timeout, malformed JSON) degrades to an error intent with a
/// localized message; nothing propagates to the caller.
pub struct NluGateway {
    client: Arc<dyn LlmClient>,
    timeout: Duration,
    max_retries: u32,
}

impl NluGateway {
    pub fn new(client: Arc<dyn LlmClient>, timeout: Duration, max_retries: u32) -> Self {
        Self { client, timeout, max_retries }
    }

    pub async fn resolve(&self, request: &NluRequest<'_>) -> Intent {
        let context = bounded_context(request.text, request.catalog, request.restaurant_scoped);
        let completion = CompletionRequest {
            system: system_prompt(request.language),
            user: user_prompt(request, &context),
        };

        let raw = match self.complete_with_retry(&completion).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(model = %self.client.model(), error = %error, "nlu call failed");
                return Intent::error(fallback_message(request.language));
            }
        };

        match serde_json::from_str::<Intent>(extract_json(&raw)) {
            Ok(intent) => intent.validated(),
            Err(error) => {
                tracing::warn!(
                    model = %self.client.model(),
                    error = %error,
                    reply = %clip(&raw, HISTORY_TEXT_CHARS),
                    "nlu reply did not parse as an intent"
                );
                Intent::error(fallback_message(request.language))
            }
        }
    }

    /// Transport errors retry up to the configured count. Timeouts already
    /// burned the latency budget and response errors repeat, so neither
    /// retries.
    async fn complete_with_retry(
        &self,
        completion: &CompletionRequest,
    ) -> Result<String, LlmError> {
        let mut attempt = 0u32;
        loop {
            let outcome =
                tokio::time::timeout(self.timeout, self.client.complete(completion)).await;
            let error = match outcome {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(error)) => error,
                Err(_) => LlmError::Timeout(self.timeout),
            };

            if !matches!(error, LlmError::Request(_)) || attempt >= self.max_retries {
                return Err(error);
            }
            attempt += 1;
            tracing::debug!(attempt, error = %error, "retrying nlu call");
        }
    }
}

/// Sliding per-customer call window. The router checks this before paying
/// for a model call and answers with a localized slow-down when exhausted.
pub struct RequestBudget {
    max_calls: usize,
    window: Duration,
    calls: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RequestBudget {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self { max_calls: max_calls as usize, window, calls: Mutex::new(HashMap::new()) }
    }

    /// Records a call for the customer unless the window is already full.
    pub fn try_acquire(&self, customer_id: &CustomerId) -> bool {
        let now = Instant::now();
        let mut calls = self.calls.lock().unwrap_or_else(PoisonError::into_inner);

        calls.retain(|_, stamps| {
            while stamps
                .front()
                .is_some_and(|stamp| now.duration_since(*stamp) >= self.window)
            {
                stamps.pop_front();
            }
            !stamps.is_empty()
        });

        let stamps = calls.entry(customer_id.as_str().to_string()).or_default();
        if stamps.len() >= self.max_calls {
            return false;
        }
        stamps.push_back(now);
        true
    }
}

fn bounded_context<'a>(
    text: &str,
    catalog: &'a [ItemContext],
    restaurant_scoped: bool,
) -> Vec<&'a ItemContext> {
    if restaurant_scoped {
        return catalog.iter().take(SCOPED_CONTEXT_ITEMS).collect();
    }

    let needle = normalize(text);
    let words: Vec<&str> =
        needle.split_whitespace().filter(|word| word.chars().count() >= 3).collect();
    if !words.is_empty() {
        let hits: Vec<&ItemContext> = catalog
            .iter()
            .filter(|item| {
                let name = normalize(&item.name);
                words.iter().any(|word| name.contains(*word))
            })
            .take(KEYWORD_CONTEXT_ITEMS)
            .collect();
        if !hits.is_empty() {
            return hits;
        }
    }

    catalog.iter().take(DEFAULT_CONTEXT_ITEMS).collect()
}

fn system_prompt(language: Language) -> String {
    let reply_language = match language {
        Language::Ar => "Arabic",
        Language::En => "English",
    };
    format!(
        "You translate food-ordering chat messages into one JSON object. \
Output only JSON, no prose, no code fences.\n\
Schema: {{\"kind\": \"order|cart_update|browse|reference|checkout|view_cart|support|small_talk|error\", \
\"items\": [{{\"name\": string, \"quantity\": integer?, \"size\": string?, \
\"action\": \"add|remove|set_quantity\"?}}], \"restaurant_name\": string?, \
\"delivery_address\": string?, \"reference_position\": integer?, \
\"upsell_suggestions\": [string], \"message\": string?}}\n\
Copy item names from the menu context verbatim when they match. \
Use \"reference_position\" (1-based) when the customer points at a listed result. \
Never invent menu items or prices. \
Any customer-facing sentence goes in \"message\", written in {reply_language}."
    )
}

fn user_prompt(request: &NluRequest<'_>, context: &[&ItemContext]) -> String {
    let mut prompt = String::new();

    if request.restaurant_scoped {
        match context.first() {
            Some(first) => prompt.push_str(&format!("Menu of {}:\n", first.restaurant_name)),
            None => prompt.push_str("Menu:\n"),
        }
    } else {
        prompt.push_str("Menu across restaurants:\n");
    }
    for item in context {
        prompt.push_str(&menu_line(item, request.restaurant_scoped));
        prompt.push('\n');
    }

    if !request.cart.is_empty() {
        prompt.push_str("\nCart:\n");
        for line in request.cart.lines() {
            prompt.push_str(&format!("- {} x {}\n", line.quantity, line.display_name));
        }
    }

    let skip = request.history.len().saturating_sub(HISTORY_TURNS_IN_PROMPT);
    let recent = &request.history[skip..];
    if !recent.is_empty() {
        prompt.push_str("\nRecent turns:\n");
        for turn in recent {
            let role = match turn.role {
                TurnRole::Customer => "customer",
                TurnRole::Bot => "bot",
            };
            prompt.push_str(&format!("{role}: {}\n", clip(&turn.text, HISTORY_TEXT_CHARS)));
        }
    }

    prompt.push_str("\nCustomer message:\n");
    prompt.push_str(request.text);
    prompt
}

fn menu_line(item: &ItemContext, restaurant_scoped: bool) -> String {
    let mut line = format!("- {}", item.name);
    if !restaurant_scoped {
        line.push_str(&format!(" @ {}", item.restaurant_name));
    }
    if let Some(description) = &item.description {
        let short = clip(description, DESCRIPTION_CHARS);
        if !short.is_empty() {
            line.push_str(&format!(" ({short})"));
        }
    }
    if item.variants.is_empty() {
        if let Some(price) = item.price {
            line.push_str(&format!(" | {price}"));
        }
    } else {
        let sizes = item
            .variants
            .iter()
            .map(|variant| format!("{} {}", variant.name, variant.price))
            .collect::<Vec<_>>()
            .join(" / ");
        line.push_str(&format!(" | {sizes}"));
    }
    line
}

/// Models wrap JSON in fences or prose despite instructions. Takes the
/// fenced block when present, otherwise the outermost brace span.
fn extract_json(raw: &str) -> &str {
    let mut body = raw.trim();
    if let Some(rest) = body.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        body = match rest.rfind("```") {
            Some(end) => &rest[..end],
            None => rest,
        };
    }
    let body = body.trim();
    match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => body,
    }
}

fn fallback_message(language: Language) -> &'static str {
    match language {
        Language::Ar => "ما فهمت طلبك، ممكن تعيد صياغته؟",
        Language::En => "I could not understand that, could you rephrase it?",
    }
}

fn clip(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use sofra_core::{
        Cart, CustomerId, Intent, IntentKind, ItemContext, ItemId, ItemVariant, Language,
        ResolvedItem, RestaurantId, VariantId,
    };

    use crate::llm::{CompletionRequest, LlmClient, LlmError, ScriptedLlmClient};

    use super::{
        bounded_context, extract_json, NluGateway, NluRequest, RequestBudget,
        DEFAULT_CONTEXT_ITEMS, KEYWORD_CONTEXT_ITEMS, SCOPED_CONTEXT_ITEMS,
    };

    struct PendingClient;

    #[async_trait]
    impl LlmClient for PendingClient {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
            std::future::pending().await
        }

        fn model(&self) -> &str {
            "pending"
        }
    }

    fn price(value: &str) -> Decimal {
        value.parse().expect("decimal literal")
    }

    fn item(id: i64, name: &str, restaurant: &str, base: Option<&str>) -> ItemContext {
        ItemContext {
            item_id: ItemId(id),
            name: name.to_string(),
            description: None,
            price: base.map(price),
            variants: Vec::new(),
            restaurant_id: RestaurantId(1),
            restaurant_name: restaurant.to_string(),
        }
    }

    fn request<'a>(
        text: &'a str,
        catalog: &'a [ItemContext],
        cart: &'a Cart,
    ) -> NluRequest<'a> {
        NluRequest {
            text,
            language: Language::Ar,
            restaurant_scoped: false,
            catalog,
            cart,
            history: &[],
        }
    }

    #[test]
    fn scoped_context_takes_the_menu_head() {
        let catalog: Vec<ItemContext> =
            (0..50).map(|index| item(index, &format!("صنف {index}"), "مطعم", Some("1.00"))).collect();
        let bounded = bounded_context("بدي أطلب", &catalog, true);
        assert_eq!(bounded.len(), SCOPED_CONTEXT_ITEMS);
    }

    #[test]
    fn keyword_hits_bound_the_cross_restaurant_context() {
        let mut catalog = Vec::new();
        for index in 0..30 {
            catalog.push(item(index, &format!("بيتزا {index}"), "روما", Some("4.00")));
        }
        catalog.push(item(100, "شاورما دجاج", "الريم", None));

        let bounded = bounded_context("بدي شاورما", &catalog, false);
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].item_id, ItemId(100));

        let pizza = bounded_context("بدي بيتزا", &catalog, false);
        assert_eq!(pizza.len(), KEYWORD_CONTEXT_ITEMS);
    }

    #[test]
    fn no_keyword_hits_fall_back_to_the_catalog_head() {
        let catalog: Vec<ItemContext> =
            (0..30).map(|index| item(index, &format!("صنف {index}"), "مطعم", Some("1.00"))).collect();
        let bounded = bounded_context("مرحبا", &catalog, false);
        assert_eq!(bounded.len(), DEFAULT_CONTEXT_ITEMS);
        assert_eq!(bounded[0].item_id, ItemId(0));
    }

    #[test]
    fn fenced_and_prosey_replies_reduce_to_json() {
        assert_eq!(extract_json("```json\n{\"kind\": \"order\"}\n```"), "{\"kind\": \"order\"}");
        assert_eq!(extract_json("```\n{\"kind\": \"order\"}\n```"), "{\"kind\": \"order\"}");
        assert_eq!(
            extract_json("Sure! Here is the JSON: {\"kind\": \"order\"} as requested."),
            "{\"kind\": \"order\"}"
        );
        assert_eq!(extract_json("no json here"), "no json here");
    }

    #[tokio::test]
    async fn gateway_parses_a_fenced_reply_into_a_validated_intent() {
        let client = Arc::new(ScriptedLlmClient::new().reply(
            "```json\n{\"kind\": \"order\", \"items\": [{\"name\": \"شاورما دجاج\", \"quantity\": 250}]}\n```",
        ));
        let gateway = NluGateway::new(client, Duration::from_secs(5), 0);

        let catalog = vec![item(1, "شاورما دجاج", "الريم", None)];
        let cart = Cart::default();
        let intent = gateway.resolve(&request("بدي شاورما", &catalog, &cart)).await;

        assert_eq!(intent.kind, IntentKind::Order);
        assert_eq!(intent.items.len(), 1);
        // validated() clamps the quantity into the cart range.
        assert_eq!(intent.items[0].quantity, Some(99));
    }

    #[tokio::test]
    async fn transport_failure_degrades_to_a_localized_error_intent() {
        let client =
            Arc::new(ScriptedLlmClient::new().fail(LlmError::Request("connection reset".into())));
        let gateway = NluGateway::new(client, Duration::from_secs(5), 0);

        let catalog = vec![item(1, "شاورما دجاج", "الريم", None)];
        let cart = Cart::default();
        let intent = gateway.resolve(&request("بدي شاورما", &catalog, &cart)).await;

        assert_eq!(intent.kind, IntentKind::Error);
        assert_eq!(intent.message.as_deref(), Some("ما فهمت طلبك، ممكن تعيد صياغته؟"));
    }

    #[tokio::test]
    async fn unparseable_reply_degrades_to_an_error_intent() {
        let client = Arc::new(ScriptedLlmClient::new().reply("they probably want shawarma"));
        let gateway = NluGateway::new(client, Duration::from_secs(5), 0);

        let catalog = vec![item(1, "شاورما دجاج", "الريم", None)];
        let cart = Cart::default();
        let intent = gateway.resolve(&request("بدي شاورما", &catalog, &cart)).await;

        assert_eq!(intent.kind, IntentKind::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_times_out_into_an_error_intent() {
        let gateway = NluGateway::new(Arc::new(PendingClient), Duration::from_secs(20), 2);

        let catalog = vec![item(1, "شاورما دجاج", "الريم", None)];
        let cart = Cart::default();
        let intent = gateway.resolve(&request("بدي شاورما", &catalog, &cart)).await;

        assert_eq!(intent.kind, IntentKind::Error);
    }

    #[tokio::test]
    async fn transport_errors_retry_then_succeed() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .fail(LlmError::Request("connection reset".into()))
                .reply("{\"kind\": \"view_cart\"}"),
        );
        let gateway = NluGateway::new(client.clone(), Duration::from_secs(5), 1);

        let catalog = vec![item(1, "شاورما دجاج", "الريم", None)];
        let cart = Cart::default();
        let intent = gateway.resolve(&request("شو في بسلتي", &catalog, &cart)).await;

        assert_eq!(intent.kind, IntentKind::ViewCart);
        assert_eq!(client.requests().len(), 2);
    }

    #[tokio::test]
    async fn response_errors_do_not_retry() {
        let client = Arc::new(
            ScriptedLlmClient::new()
                .fail(LlmError::Response("empty".into()))
                .reply("{\"kind\": \"view_cart\"}"),
        );
        let gateway = NluGateway::new(client.clone(), Duration::from_secs(5), 3);

        let catalog = vec![item(1, "شاورما دجاج", "الريم", None)];
        let cart = Cart::default();
        let intent = gateway.resolve(&request("شو في بسلتي", &catalog, &cart)).await;

        assert_eq!(intent.kind, IntentKind::Error);
        assert_eq!(client.requests().len(), 1);
    }

    #[tokio::test]
    async fn prompt_carries_menu_cart_history_and_message() {
        let client = Arc::new(ScriptedLlmClient::new().reply("{\"kind\": \"small_talk\"}"));
        let gateway = NluGateway::new(client.clone(), Duration::from_secs(5), 0);

        let mut sized = item(1, "شاورما دجاج", "الريم", None);
        sized.variants = vec![ItemVariant {
            id: VariantId(11),
            item_id: ItemId(1),
            name: "كبير".to_string(),
            price: price("3.50"),
        }];
        let catalog = vec![sized];

        let mut cart = Cart::default();
        cart.add(
            &ResolvedItem {
                item_id: ItemId(2),
                variant_id: None,
                name: "كولا".to_string(),
                price: Some(price("0.75")),
                restaurant_id: RestaurantId(1),
                restaurant_name: "الريم".to_string(),
            },
            2,
        )
        .expect("cart add");

        let nlu_request = NluRequest {
            text: "وضيفلي شاورما كمان",
            language: Language::En,
            restaurant_scoped: true,
            catalog: &catalog,
            cart: &cart,
            history: &[],
        };
        let _ = gateway.resolve(&nlu_request).await;

        let seen = client.requests();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].user.contains("Menu of الريم"));
        assert!(seen[0].user.contains("شاورما دجاج"));
        assert!(seen[0].user.contains("كبير 3.50"));
        assert!(seen[0].user.contains("2 x كولا"));
        assert!(seen[0].user.contains("وضيفلي شاورما كمان"));
        assert!(seen[0].system.contains("English"));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_window_slides() {
        let budget = RequestBudget::new(2, Duration::from_secs(60));
        let customer = CustomerId("962790001122".to_string());

        assert!(budget.try_acquire(&customer));
        assert!(budget.try_acquire(&customer));
        assert!(!budget.try_acquire(&customer));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(budget.try_acquire(&customer));
    }

    #[tokio::test(start_paused = true)]
    async fn budget_tracks_customers_independently() {
        let budget = RequestBudget::new(1, Duration::from_secs(60));
        let first = CustomerId("962790000001".to_string());
        let second = CustomerId("962790000002".to_string());

        assert!(budget.try_acquire(&first));
        assert!(budget.try_acquire(&second));
        assert!(!budget.try_acquire(&first));
        assert!(!budget.try_acquire(&second));
    }

    #[test]
    fn error_intents_from_the_schema_stay_errors() {
        let intent: Intent =
            serde_json::from_str("{\"kind\": \"directions\"}").expect("parse unknown kind");
        assert_eq!(intent.kind, IntentKind::Error);
    }
}
