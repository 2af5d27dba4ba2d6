//! Chat error taxonomy.
//!
//! Classification happens where the HTTP status is visible (the transport
//! layer); the controller only matches on the closed taxonomy. Each
//! variant carries distinct recovery semantics:
//!
//! - `RateLimited` -- the turn was never accepted; the optimistic user
//!   message is rolled back and a dedicated handler fires.
//! - `InsufficientSparks` -- the user's utterance is kept for resend and a
//!   dedicated handler fires.
//! - `EpisodeConflict` -- recoverable; absorbed by the episode resolver
//!   and never surfaced to callers.
//! - `Transport` / `Unclassified` -- generic handler, message kept.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured rate-limit descriptor parsed from a 429 body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Seconds until the next send will be accepted.
    #[serde(default)]
    pub retry_after: u64,
    /// Requests allowed per window, when the server reports it.
    pub limit: Option<u32>,
    /// Window length in seconds, when the server reports it.
    pub window: Option<u64>,
}

/// Structured spark (credit) balance parsed from a 402 body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SparkBalance {
    #[serde(default)]
    pub required: u32,
    #[serde(default)]
    pub available: u32,
}

/// Errors from episode backend operations.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("rate limited (retry after {}s)", .0.retry_after)]
    RateLimited(RateLimitInfo),

    #[error("insufficient sparks: need {}, have {}", .0.required, .0.available)]
    InsufficientSparks(SparkBalance),

    #[error("an episode already exists for this persona")]
    EpisodeConflict,

    #[error("no episode is bound to this controller")]
    NoEpisode,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed stream event: {0}")]
    Deserialization(String),

    #[error("unexpected response: {0}")]
    Unclassified(String),
}

impl ChatError {
    /// Whether the resolver may recover from this error by re-fetching
    /// the active episode.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ChatError::EpisodeConflict)
    }
}
