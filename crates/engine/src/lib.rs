//! Conversation engine for the ordering chat.
//!
//! The engine owns everything between an inbound chat event and the replies
//! that answer it:
//! - `router` loads the session, serializes turns per customer, and
//!   dispatches structured choices and free text onto the handlers
//! - `handlers` are the screens: browsing, cart, checkout, and the NLU
//!   pipeline for free text
//! - `store` is the TTL session store behind the router
//! - `replies` holds the bilingual copy deck, so wording lives in one place
//! - `loyalty` is the post-order points hook
//!
//! Nothing here touches the transport wire format; the chat crate parses
//! events and renders messages, this crate only decides what to say.

pub mod handlers;
pub mod loyalty;
pub mod replies;
pub mod router;
pub mod store;
pub mod turn;

pub use loyalty::{
    points_for, LoyaltyError, LoyaltyGateway, NoopLoyaltyGateway, RecordingLoyaltyGateway,
};
pub use router::{ConversationRouter, EngineConfig, RouterDeps};
pub use store::{InMemorySessionStore, SessionStore, SessionStoreError};
pub use turn::CustomerGates;
