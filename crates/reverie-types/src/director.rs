//! Director sub-state machine.
//!
//! The director tracks a turn budget embedded in stream events,
//! independent of message content. States move `Inactive -> Active ->
//! Complete`; `Complete` is terminal until an explicit clear resets to
//! `Inactive`. Clearing does not end the underlying episode.

use serde::{Deserialize, Serialize};

use crate::stream::{DirectorSnapshot, Evaluation};

/// Local view of the backend director.
///
/// Transitions happen only through [`DirectorState::apply_snapshot`] (from
/// `done` events) and [`DirectorState::complete`] (from `episode_complete`
/// events). Never cleared implicitly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DirectorState {
    #[default]
    Inactive,
    Active {
        turn_count: u32,
        turns_remaining: Option<u32>,
    },
    Complete {
        turn_count: u32,
        evaluation: Option<Evaluation>,
        next_suggestion: Option<String>,
    },
}

impl DirectorState {
    /// Apply a snapshot from a `done` event.
    ///
    /// A snapshot flagged complete moves straight to `Complete` (with no
    /// evaluation payload; a later `episode_complete` event supplies one).
    /// Snapshots never demote a `Complete` state.
    pub fn apply_snapshot(&mut self, snapshot: &DirectorSnapshot) {
        if matches!(self, DirectorState::Complete { .. }) {
            return;
        }
        *self = if snapshot.is_complete {
            DirectorState::Complete {
                turn_count: snapshot.turn_count,
                evaluation: None,
                next_suggestion: None,
            }
        } else {
            DirectorState::Active {
                turn_count: snapshot.turn_count,
                turns_remaining: snapshot.turns_remaining,
            }
        };
    }

    /// Mark the episode complete from an `episode_complete` event.
    ///
    /// Always wins: `episode_complete` carries the authoritative payload,
    /// including over a snapshot-driven `Complete` with no evaluation.
    pub fn complete(
        &mut self,
        turn_count: u32,
        evaluation: Option<Evaluation>,
        next_suggestion: Option<String>,
    ) {
        *self = DirectorState::Complete {
            turn_count,
            evaluation,
            next_suggestion,
        };
    }

    /// Explicit clear back to `Inactive`.
    pub fn clear(&mut self) {
        *self = DirectorState::Inactive;
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, DirectorState::Complete { .. })
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            DirectorState::Complete { evaluation, .. } => evaluation.as_ref(),
            _ => None,
        }
    }

    pub fn next_suggestion(&self) -> Option<&str> {
        match self {
            DirectorState::Complete {
                next_suggestion, ..
            } => next_suggestion.as_deref(),
            _ => None,
        }
    }

    pub fn turn_count(&self) -> Option<u32> {
        match self {
            DirectorState::Inactive => None,
            DirectorState::Active { turn_count, .. }
            | DirectorState::Complete { turn_count, .. } => Some(*turn_count),
        }
    }
}
