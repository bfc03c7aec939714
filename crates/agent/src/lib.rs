//! Language understanding for the ordering conversation.
//!
//! This crate turns free-text customer messages into the structured
//! [`sofra_core::Intent`] the conversation engine dispatches on:
//! - `llm` holds the provider client trait with OpenAI-compatible and
//!   Anthropic implementations plus a scripted test double
//! - `nlu` builds the bounded catalog prompt, calls the model under a hard
//!   timeout, validates the JSON reply, and meters calls per customer
//! - `recovery` is the deterministic keyword extractor that runs when the
//!   model fails, so common order phrases still land in the cart
//!
//! # Safety principle
//!
//! The model is strictly a translator. It never selects prices, mutates the
//! cart, or places orders; those are deterministic decisions made by the
//! engine against the catalog. Any model failure degrades to an error
//! intent with a localized message, never into the webhook path.

pub mod llm;
pub mod nlu;
pub mod recovery;

pub use llm::{
    client_from_config, AnthropicClient, CompletionRequest, LlmClient, LlmError,
    OpenAiCompatibleClient, ScriptedLlmClient,
};
pub use nlu::{NluGateway, NluRequest, RequestBudget};
pub use recovery::RecoveryExtractor;
