//! HTTP status classification into the chat error taxonomy.
//!
//! This is the single place where raw HTTP failures become the closed
//! [`ChatError`] taxonomy the controller matches on:
//!
//! - 429 -> `RateLimited`, body parsed as a rate-limit descriptor
//! - 402 -> `InsufficientSparks`, body parsed as a spark balance
//! - 409 -> `EpisodeConflict` (recoverable; absorbed by the resolver)
//! - anything else -> `Unclassified` with the raw status and body
//!
//! Malformed 429/402 bodies degrade to default payloads rather than
//! obscuring the classification.

use tracing::debug;

use reverie_types::error::{ChatError, RateLimitInfo, SparkBalance};

/// Classify a non-success HTTP response.
pub fn classify_status(status: u16, body: &str) -> ChatError {
    match status {
        429 => {
            let info: RateLimitInfo = serde_json::from_str(body).unwrap_or_else(|e| {
                debug!(error = %e, "Unparseable rate-limit body, using defaults");
                RateLimitInfo::default()
            });
            ChatError::RateLimited(info)
        }
        402 => {
            let balance: SparkBalance = serde_json::from_str(body).unwrap_or_else(|e| {
                debug!(error = %e, "Unparseable spark-balance body, using defaults");
                SparkBalance::default()
            });
            ChatError::InsufficientSparks(balance)
        }
        409 => ChatError::EpisodeConflict,
        _ => ChatError::Unclassified(format!("HTTP {status}: {body}")),
    }
}
