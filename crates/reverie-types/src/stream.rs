//! Stream event types for the episode send stream.
//!
//! A send opens a server-sent event stream whose `data:` payloads are JSON
//! objects tagged by `type`. The protocol per send is: zero or more `chunk`
//! events, then at most one terminal event (`done` or `episode_complete`).
//! A stream may also close with no terminal event at all; consumers must
//! tolerate that and finalize from the accumulated chunks.

use serde::{Deserialize, Serialize};

/// Director snapshot embedded in a `done` event.
///
/// The director is a backend-side evaluator that tracks the turn budget
/// independently of message content and can end the episode mid-stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorSnapshot {
    pub turn_count: u32,
    pub turns_remaining: Option<u32>,
    #[serde(default)]
    pub is_complete: bool,
}

/// Evaluation payload produced when the director completes an episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: Option<f32>,
    pub summary: Option<String>,
}

/// Events emitted by the episode send stream.
///
/// Closed union: exhaustive matching is required so a new event kind is a
/// compile error, not a silently skipped `else` branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A partial fragment of assistant text; the turn is unfinished.
    Chunk { content: String },

    /// The turn finished. `content` carries the full assistant text when
    /// the server provides it; otherwise the accumulated chunks govern.
    Done {
        content: Option<String>,
        director: Option<DirectorSnapshot>,
        #[serde(default)]
        suggest_scene: bool,
    },

    /// The director terminated the episode.
    EpisodeComplete {
        turn_count: u32,
        evaluation: Option<Evaluation>,
        next_suggestion: Option<String>,
    },
}

impl StreamEvent {
    /// Whether this event terminates the turn.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Chunk { .. })
    }
}
