//! ChatEvents handler trait.
//!
//! The controller reports send-path outcomes through this interface
//! instead of late-bound callback cells: the handler is passed once at
//! construction and every method has an empty default body, so callers
//! implement only what they render.

use reverie_types::error::{ChatError, RateLimitInfo, SparkBalance};
use reverie_types::stream::Evaluation;

/// Receiver for controller events.
///
/// Methods take `&self`; implementations that record state use interior
/// mutability. Classified failures fire exactly one method each.
pub trait ChatEvents: Send + Sync {
    /// A fragment of assistant text arrived mid-turn.
    fn on_streaming(&self, _delta: &str) {}

    /// The send was rejected with a rate limit; the optimistic user
    /// message has already been rolled back.
    fn on_rate_limited(&self, _info: &RateLimitInfo) {}

    /// The send needs more sparks than the account holds. The user
    /// message is kept for resend after a top-up.
    fn on_insufficient_sparks(&self, _balance: &SparkBalance) {}

    /// The director ended the episode.
    fn on_episode_complete(&self, _turn_count: u32, _evaluation: Option<&Evaluation>) {}

    /// Any other failure. The user message is kept.
    fn on_error(&self, _error: &ChatError) {}
}

/// Handler that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEvents;

impl ChatEvents for NullEvents {}

impl<T: ChatEvents + ?Sized> ChatEvents for std::sync::Arc<T> {
    fn on_streaming(&self, delta: &str) {
        (**self).on_streaming(delta);
    }

    fn on_rate_limited(&self, info: &RateLimitInfo) {
        (**self).on_rate_limited(info);
    }

    fn on_insufficient_sparks(&self, balance: &SparkBalance) {
        (**self).on_insufficient_sparks(balance);
    }

    fn on_episode_complete(&self, turn_count: u32, evaluation: Option<&Evaluation>) {
        (**self).on_episode_complete(turn_count, evaluation);
    }

    fn on_error(&self, error: &ChatError) {
        (**self).on_error(error);
    }
}
