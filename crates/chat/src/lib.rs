//! WhatsApp Cloud API integration - webhook ingress and outbound delivery
//!
//! This crate is the chat-transport boundary for sofra:
//! - **Inbound** (`inbound`) - webhook payloads parsed into typed customer events
//! - **Outbound** (`outbound`) - reply models: text, button prompts, list prompts
//! - **Notify** (`notify`) - delivery gateway trait + Graph API sender
//! - **Signature** (`signature`) - `X-Hub-Signature-256` verification
//!
//! # Getting Started
//!
//! 1. Create a Meta app with the WhatsApp product and a phone number id
//! 2. Point the webhook at the server's `/webhook` route and subscribe to
//!    `messages`
//! 3. Set env vars: `SOFRA_WHATSAPP_ACCESS_TOKEN`, `SOFRA_WHATSAPP_VERIFY_TOKEN`,
//!    `SOFRA_WHATSAPP_APP_SECRET`, `SOFRA_WHATSAPP_PHONE_NUMBER_ID`
//!
//! # Architecture
//!
//! ```text
//! Cloud API webhook → InboundEvent → ConversationRouter → OutboundMessage
//!                                          ↓
//!                            NotificationGateway → /{phone_number_id}/messages
//! ```
//!
//! # Key Types
//!
//! - `InboundEvent` - one customer message (text, choice reply, or location)
//! - `OutboundMessage` - free text / button prompt (≤3) / sectioned list prompt
//! - `NotificationGateway` - delivery contract, implemented by `CloudApiGateway`
//!   and the `RecordingGateway` test double

pub mod inbound;
pub mod notify;
pub mod outbound;
pub mod signature;

pub use inbound::{parse_events, InboundError, InboundEvent, InboundPayload};
pub use notify::{
    CloudApiGateway, NotificationGateway, NotifyError, OperatorPush, RecordingGateway, SentMessage,
};
pub use outbound::{
    Button, ButtonPrompt, ListPrompt, ListRow, ListSection, MessagePayload, OutboundMessage,
    SectionRows, MAX_BUTTONS, MAX_LIST_ROWS,
};
pub use signature::{sign_payload, verify_signature, SIGNATURE_HEADER};
