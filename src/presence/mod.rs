//! Presence publishing — credential shape checks, the publish cooldown
//! policy, and the HTTP client for the chat service's settings resource.

pub mod publisher;
pub mod token;

pub use publisher::{
    decide, PresenceClient, PresenceError, PublishDecision, PublishState, SkipReason,
    PUBLISH_COOLDOWN_MS,
};
pub use token::TokenVerdict;
