//! Message types for Reverie.
//!
//! Messages are ordered by send order within an episode. User messages are
//! inserted optimistically with a locally generated v7 id and a `pending`
//! marker, then confirmed or rolled back once the server round-trip
//! resolves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Role of a message within an episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message within an episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub episode_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Model that produced this message (assistant messages only).
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
    /// True for optimistic local messages not yet confirmed by the server.
    #[serde(default)]
    pub pending: bool,
}

impl Message {
    /// Build an optimistic user message with a locally generated id.
    ///
    /// The id is a v7 UUID so optimistic messages stay time-sortable next
    /// to server-assigned ids.
    pub fn optimistic_user(episode_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            episode_id,
            role: MessageRole::User,
            content: content.into(),
            model: None,
            created_at: Utc::now(),
            pending: true,
        }
    }

    /// Build a committed assistant message.
    pub fn assistant(episode_id: Uuid, content: impl Into<String>, model: Option<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            episode_id,
            role: MessageRole::Assistant,
            content: content.into(),
            model,
            created_at: Utc::now(),
            pending: false,
        }
    }
}
