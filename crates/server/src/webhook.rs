//! WhatsApp webhook ingress.
//!
//! Two routes on one path, the way the Cloud API expects them:
//! - `GET /webhook` answers the subscription handshake by echoing the
//!   challenge when the verify token matches
//! - `POST /webhook` authenticates each delivery against its
//!   `X-Hub-Signature-256` header, acks immediately, and hands the parsed
//!   events to the conversation router on background tasks
//!
//! The transport never waits for the conversation: Meta retries deliveries
//! that do not get a fast 2xx, and a retried delivery would replay customer
//! messages. Slow work (model calls, outbound sends) happens after the ack.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sofra_chat::{parse_events, verify_signature, InboundError, SIGNATURE_HEADER};
use sofra_engine::ConversationRouter;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct WebhookState {
    conversation: Arc<ConversationRouter>,
    verify_token: SecretString,
    app_secret: SecretString,
}

impl WebhookState {
    pub fn new(
        conversation: Arc<ConversationRouter>,
        verify_token: SecretString,
        app_secret: SecretString,
    ) -> Self {
        Self { conversation, verify_token, app_secret }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new().route("/webhook", get(verify).post(ingest)).with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IngestAck {
    pub status: &'static str,
    pub events: usize,
}

async fn verify(
    State(state): State<WebhookState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, StatusCode> {
    let subscribe = query.mode.as_deref() == Some("subscribe");
    let token_matches = query
        .verify_token
        .as_deref()
        .map(|token| token == state.verify_token.expose_secret())
        .unwrap_or(false);

    if subscribe && token_matches {
        info!("webhook subscription handshake accepted");
        return Ok(query.challenge.unwrap_or_default());
    }

    warn!(subscribe, token_matches, "webhook subscription handshake rejected");
    Err(StatusCode::FORBIDDEN)
}

async fn ingest(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IngestAck>), StatusCode> {
    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok())
    else {
        warn!("webhook delivery is missing its signature header");
        return Err(StatusCode::UNAUTHORIZED);
    };
    if !verify_signature(&state.app_secret, &body, signature) {
        warn!("webhook delivery failed signature verification");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let events = match parse_events(&body) {
        Ok(events) => events,
        Err(InboundError::WrongObject(object)) => {
            debug!(%object, "ignoring webhook delivery for another object");
            return Ok((StatusCode::OK, Json(IngestAck { status: "ignored", events: 0 })));
        }
        Err(InboundError::Json(error)) => {
            warn!(error = %error, "signed webhook body did not parse");
            return Err(StatusCode::BAD_REQUEST);
        }
    };

    let accepted = events.len();
    for event in events {
        let conversation = state.conversation.clone();
        tokio::spawn(async move {
            conversation.handle_event(event).await;
        });
    }

    Ok((StatusCode::OK, Json(IngestAck { status: "accepted", events: accepted })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use sofra_agent::{NluGateway, RequestBudget, ScriptedLlmClient};
    use sofra_chat::{sign_payload, RecordingGateway, SIGNATURE_HEADER};
    use sofra_db::repositories::{
        InMemoryCatalogRepository, InMemoryCustomerRepository, InMemoryOrderRepository,
    };
    use sofra_engine::{
        ConversationRouter, EngineConfig, InMemorySessionStore, NoopLoyaltyGateway, RouterDeps,
    };
    use tower::ServiceExt;

    use crate::webhook::{router, WebhookState};

    const VERIFY_TOKEN: &str = "verify-test";
    const APP_SECRET: &str = "app-secret-test";

    fn secret(value: &str) -> SecretString {
        SecretString::from(value.to_string())
    }

    fn test_state() -> (WebhookState, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::new());
        let llm = Arc::new(ScriptedLlmClient::new());
        let conversation = ConversationRouter::new(
            RouterDeps {
                store: Arc::new(InMemorySessionStore::new()),
                catalog: Arc::new(InMemoryCatalogRepository::default()),
                orders: Arc::new(InMemoryOrderRepository::default()),
                customers: Arc::new(InMemoryCustomerRepository::default()),
                notifier: gateway.clone(),
                nlu: Arc::new(NluGateway::new(llm, Duration::from_secs(5), 0)),
                budget: Arc::new(RequestBudget::new(10, Duration::from_secs(60))),
                loyalty: Arc::new(NoopLoyaltyGateway),
            },
            EngineConfig { session_ttl: Duration::from_secs(1800), operator_channel: None },
        );
        let state = WebhookState::new(
            Arc::new(conversation),
            secret(VERIFY_TOKEN),
            secret(APP_SECRET),
        );
        (state, gateway)
    }

    fn text_delivery(from: &str, body: &str) -> Vec<u8> {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "entry-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "contacts": [{"profile": {"name": "زبون تجريبي"}, "wa_id": from}],
                        "messages": [{
                            "from": from,
                            "id": "wamid.test-delivery-1",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {"body": body}
                        }]
                    }
                }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    fn signed_post(body: Vec<u8>) -> Request<Body> {
        let header = sign_payload(&secret(APP_SECRET), &body);
        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, header)
            .body(Body::from(body))
            .expect("request should build")
    }

    async fn response_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should collect");
        serde_json::from_slice(&bytes).expect("response body should be json")
    }

    async fn wait_for_sends(gateway: &RecordingGateway, minimum: usize) {
        for _ in 0..200 {
            if gateway.sent().len() >= minimum {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected at least {minimum} sends, saw {}", gateway.sent().len());
    }

    #[tokio::test]
    async fn handshake_echoes_the_challenge_for_the_right_token() {
        let (state, _gateway) = test_state();
        let request = Request::builder()
            .method("GET")
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=verify-test&hub.challenge=4242")
            .body(Body::empty())
            .expect("request should build");

        let response = router(state).oneshot(request).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body should collect");
        assert_eq!(&bytes[..], b"4242");
    }

    #[tokio::test]
    async fn handshake_rejects_a_wrong_token() {
        let (state, _gateway) = test_state();
        let request = Request::builder()
            .method("GET")
            .uri("/webhook?hub.mode=subscribe&hub.verify_token=guessed&hub.challenge=4242")
            .body(Body::empty())
            .expect("request should build");

        let response = router(state).oneshot(request).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn handshake_rejects_missing_parameters() {
        let (state, _gateway) = test_state();
        let request = Request::builder()
            .method("GET")
            .uri("/webhook")
            .body(Body::empty())
            .expect("request should build");

        let response = router(state).oneshot(request).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn signed_deliveries_are_acked_and_dispatched() {
        let (state, gateway) = test_state();
        let request = signed_post(text_delivery("962790001111", "مرحبا"));

        let response = router(state).oneshot(request).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::OK);
        let ack = response_json(response).await;
        assert_eq!(ack["status"], "accepted");
        assert_eq!(ack["events"], 1);

        // Dispatch runs after the ack; the greeting reply proves the event
        // reached the conversation router.
        wait_for_sends(&gateway, 1).await;
        let sent = gateway.sent();
        assert_eq!(sent[0].customer_id.as_str(), "962790001111");
    }

    #[tokio::test]
    async fn tampered_deliveries_are_rejected_without_dispatch() {
        let (state, gateway) = test_state();
        let mut body = text_delivery("962790001111", "مرحبا");
        let header = sign_payload(&secret(APP_SECRET), &body);
        body.extend_from_slice(b" ");
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header(SIGNATURE_HEADER, header)
            .body(Body::from(body))
            .expect("request should build");

        let response = router(state).oneshot(request).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gateway.sent().is_empty(), "tampered deliveries must not reach the router");
    }

    #[tokio::test]
    async fn unsigned_deliveries_are_rejected() {
        let (state, _gateway) = test_state();
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .body(Body::from(text_delivery("962790001111", "مرحبا")))
            .expect("request should build");

        let response = router(state).oneshot(request).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn status_only_deliveries_ack_with_zero_events() {
        let (state, gateway) = test_state();
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "entry-1",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "statuses": [{"id": "wamid.prior", "status": "delivered"}]
                    }
                }]
            }]
        })
        .to_string()
        .into_bytes();

        let response =
            router(state).oneshot(signed_post(body)).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::OK);
        let ack = response_json(response).await;
        assert_eq!(ack["status"], "accepted");
        assert_eq!(ack["events"], 0);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn deliveries_for_another_object_are_ignored() {
        let (state, _gateway) = test_state();
        let body = json!({"object": "instagram", "entry": []}).to_string().into_bytes();

        let response =
            router(state).oneshot(signed_post(body)).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::OK);
        let ack = response_json(response).await;
        assert_eq!(ack["status"], "ignored");
    }

    #[tokio::test]
    async fn signed_garbage_is_a_bad_request() {
        let (state, _gateway) = test_state();
        let body = b"not json at all".to_vec();

        let response =
            router(state).oneshot(signed_post(body)).await.expect("handler should answer");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
