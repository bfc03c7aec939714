use serde::Deserialize;
use sofra_core::CustomerId;
use thiserror::Error;

/// Object name Meta stamps on WhatsApp Business webhook deliveries.
const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

#[derive(Debug, Error)]
pub enum InboundError {
    #[error("webhook payload was not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("webhook payload carries object `{0}`, not a whatsapp delivery")]
    WrongObject(String),
}

/// One customer message, lifted out of the webhook envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct InboundEvent {
    pub customer_id: CustomerId,
    pub message_id: String,
    /// Display name from the delivery's contact block, when present.
    pub profile_name: Option<String>,
    pub payload: InboundPayload,
}

/// The event classes the router dispatches on, plus a tolerated bucket for
/// everything else the transport can carry (audio, stickers, reactions).
#[derive(Clone, Debug, PartialEq)]
pub enum InboundPayload {
    Text { body: String },
    Choice { id: String, title: String },
    Location { lat: f64, lng: f64, label: Option<String> },
    Unsupported { kind: String },
}

// Wire shape of the Cloud API webhook. Fields are defaulted so status-only
// batches and new vendor fields parse instead of failing the delivery.
#[derive(Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    object: String,
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Deserialize)]
struct Change {
    #[serde(default)]
    field: String,
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    contacts: Vec<Contact>,
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct Contact {
    #[serde(default)]
    wa_id: String,
    profile: Option<ContactProfile>,
}

#[derive(Deserialize)]
struct ContactProfile {
    name: Option<String>,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(default)]
    from: String,
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<TextBody>,
    interactive: Option<WireInteractive>,
    location: Option<WireLocation>,
}

#[derive(Deserialize)]
struct TextBody {
    #[serde(default)]
    body: String,
}

#[derive(Deserialize)]
struct WireInteractive {
    #[serde(rename = "type", default)]
    kind: String,
    button_reply: Option<WireReply>,
    list_reply: Option<WireReply>,
}

#[derive(Deserialize)]
struct WireReply {
    #[serde(default)]
    id: String,
    #[serde(default)]
    title: String,
}

#[derive(Deserialize)]
struct WireLocation {
    latitude: f64,
    longitude: f64,
    name: Option<String>,
    address: Option<String>,
}

/// Parses a raw webhook body into the customer events it carries, in
/// delivery order. Status-only deliveries parse to an empty list.
pub fn parse_events(body: &[u8]) -> Result<Vec<InboundEvent>, InboundError> {
    let payload: WebhookPayload = serde_json::from_slice(body)?;
    if payload.object != WHATSAPP_OBJECT {
        return Err(InboundError::WrongObject(payload.object));
    }

    let mut events = Vec::new();
    for entry in payload.entry {
        for change in entry.changes {
            if change.field != "messages" {
                tracing::debug!(field = %change.field, "skipping non-message webhook change");
                continue;
            }
            for message in &change.value.messages {
                if message.from.is_empty() {
                    tracing::warn!(message_id = %message.id, "dropping message without a sender");
                    continue;
                }
                events.push(InboundEvent {
                    customer_id: CustomerId(message.from.clone()),
                    message_id: message.id.clone(),
                    profile_name: profile_name(&change.value.contacts, &message.from),
                    payload: classify(message),
                });
            }
        }
    }
    Ok(events)
}

fn classify(message: &WireMessage) -> InboundPayload {
    match message.kind.as_str() {
        "text" => match &message.text {
            Some(text) => InboundPayload::Text { body: text.body.clone() },
            None => InboundPayload::Unsupported { kind: "text".to_string() },
        },
        "interactive" => match &message.interactive {
            Some(interactive) => classify_interactive(interactive),
            None => InboundPayload::Unsupported { kind: "interactive".to_string() },
        },
        "location" => match &message.location {
            Some(location) => InboundPayload::Location {
                lat: location.latitude,
                lng: location.longitude,
                label: location_label(location),
            },
            None => InboundPayload::Unsupported { kind: "location".to_string() },
        },
        other => InboundPayload::Unsupported { kind: other.to_string() },
    }
}

fn classify_interactive(interactive: &WireInteractive) -> InboundPayload {
    let reply = interactive.button_reply.as_ref().or(interactive.list_reply.as_ref());
    match reply {
        Some(reply) => InboundPayload::Choice { id: reply.id.clone(), title: reply.title.clone() },
        None => InboundPayload::Unsupported { kind: format!("interactive.{}", interactive.kind) },
    }
}

fn profile_name(contacts: &[Contact], wa_id: &str) -> Option<String> {
    contacts
        .iter()
        .find(|contact| contact.wa_id == wa_id)
        .and_then(|contact| contact.profile.as_ref())
        .and_then(|profile| profile.name.clone())
        .filter(|name| !name.trim().is_empty())
}

fn location_label(location: &WireLocation) -> Option<String> {
    location
        .name
        .clone()
        .or_else(|| location.address.clone())
        .filter(|label| !label.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{parse_events, InboundError, InboundPayload};

    fn delivery(contacts: Value, messages: Value) -> Vec<u8> {
        json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {
                            "display_phone_number": "96265554444",
                            "phone_number_id": "131110432"
                        },
                        "contacts": contacts,
                        "messages": messages
                    }
                }]
            }]
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn text_message_parses_with_the_contact_name() {
        let body = delivery(
            json!([{"profile": {"name": "أحمد"}, "wa_id": "962790001122"}]),
            json!([{
                "from": "962790001122",
                "id": "wamid.text-1",
                "timestamp": "1724580000",
                "type": "text",
                "text": {"body": "بدي شاورما"}
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].customer_id.as_str(), "962790001122");
        assert_eq!(events[0].message_id, "wamid.text-1");
        assert_eq!(events[0].profile_name.as_deref(), Some("أحمد"));
        assert_eq!(
            events[0].payload,
            InboundPayload::Text { body: "بدي شاورما".to_string() }
        );
    }

    #[test]
    fn button_reply_parses_to_a_choice() {
        let body = delivery(
            json!([]),
            json!([{
                "from": "962790001122",
                "id": "wamid.btn-1",
                "type": "interactive",
                "interactive": {
                    "type": "button_reply",
                    "button_reply": {"id": "confirm_order", "title": "تأكيد"}
                }
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(
            events[0].payload,
            InboundPayload::Choice { id: "confirm_order".to_string(), title: "تأكيد".to_string() }
        );
        assert_eq!(events[0].profile_name, None);
    }

    #[test]
    fn list_reply_parses_to_a_choice() {
        let body = delivery(
            json!([]),
            json!([{
                "from": "962790001122",
                "id": "wamid.list-1",
                "type": "interactive",
                "interactive": {
                    "type": "list_reply",
                    "list_reply": {"id": "rest_12", "title": "مطعم الريم", "description": "توصيل 1.00"}
                }
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(
            events[0].payload,
            InboundPayload::Choice { id: "rest_12".to_string(), title: "مطعم الريم".to_string() }
        );
    }

    #[test]
    fn location_ping_parses_with_a_label() {
        let body = delivery(
            json!([]),
            json!([{
                "from": "962790001122",
                "id": "wamid.loc-1",
                "type": "location",
                "location": {"latitude": 31.9539, "longitude": 35.9106, "name": "دوار الواحة"}
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(
            events[0].payload,
            InboundPayload::Location {
                lat: 31.9539,
                lng: 35.9106,
                label: Some("دوار الواحة".to_string())
            }
        );
    }

    #[test]
    fn bare_location_falls_back_to_the_address_field() {
        let body = delivery(
            json!([]),
            json!([{
                "from": "962790001122",
                "id": "wamid.loc-2",
                "type": "location",
                "location": {"latitude": 31.9539, "longitude": 35.9106, "address": "شارع المدينة"}
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(
            events[0].payload,
            InboundPayload::Location {
                lat: 31.9539,
                lng: 35.9106,
                label: Some("شارع المدينة".to_string())
            }
        );
    }

    #[test]
    fn status_only_delivery_yields_no_events() {
        let body = json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "102290129340398",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "statuses": [{"id": "wamid.sent-1", "status": "delivered"}]
                    }
                }]
            }]
        })
        .to_string()
        .into_bytes();

        let events = parse_events(&body).expect("valid delivery");
        assert!(events.is_empty());
    }

    #[test]
    fn unknown_message_kinds_are_tolerated_as_unsupported() {
        let body = delivery(
            json!([]),
            json!([{
                "from": "962790001122",
                "id": "wamid.audio-1",
                "type": "audio",
                "audio": {"id": "media-9", "mime_type": "audio/ogg"}
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(events[0].payload, InboundPayload::Unsupported { kind: "audio".to_string() });
    }

    #[test]
    fn interactive_without_a_reply_is_unsupported() {
        let body = delivery(
            json!([]),
            json!([{
                "from": "962790001122",
                "id": "wamid.nfm-1",
                "type": "interactive",
                "interactive": {"type": "nfm_reply"}
            }]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(
            events[0].payload,
            InboundPayload::Unsupported { kind: "interactive.nfm_reply".to_string() }
        );
    }

    #[test]
    fn messages_without_a_sender_are_dropped() {
        let body = delivery(
            json!([]),
            json!([
                {"id": "wamid.ghost", "type": "text", "text": {"body": "؟"}},
                {
                    "from": "962790001122",
                    "id": "wamid.real",
                    "type": "text",
                    "text": {"body": "مرحبا"}
                }
            ]),
        );

        let events = parse_events(&body).expect("valid delivery");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message_id, "wamid.real");
    }

    #[test]
    fn batched_messages_keep_delivery_order() {
        let body = delivery(
            json!([]),
            json!([
                {"from": "1", "id": "wamid.a", "type": "text", "text": {"body": "أول"}},
                {"from": "2", "id": "wamid.b", "type": "text", "text": {"body": "ثاني"}}
            ]),
        );

        let events = parse_events(&body).expect("valid delivery");
        let ids: Vec<&str> = events.iter().map(|event| event.message_id.as_str()).collect();
        assert_eq!(ids, vec!["wamid.a", "wamid.b"]);
    }

    #[test]
    fn foreign_objects_are_rejected() {
        let body = json!({"object": "instagram", "entry": []}).to_string().into_bytes();
        let error = parse_events(&body).expect_err("instagram deliveries are not ours");
        assert!(matches!(error, InboundError::WrongObject(object) if object == "instagram"));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let error = parse_events(b"{not json").expect_err("truncated body");
        assert!(matches!(error, InboundError::Json(_)));
    }
}
