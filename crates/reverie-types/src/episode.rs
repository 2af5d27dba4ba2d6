//! Episode types for Reverie.
//!
//! An episode is a bounded or open-ended conversation instance between a
//! user and a persona. Episodes optionally bind to a template (a scenario
//! definition that scopes which episode a persona conversation targets).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A conversation episode between a user and a persona.
///
/// Episodes are created by the resolver, read (never mutated) by the
/// message reconciler, and become inactive when explicitly ended or when
/// the director marks the episode complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: Uuid,
    pub persona_id: Uuid,
    /// Template this episode is scoped to; `None` for open-ended chat.
    pub template_id: Option<Uuid>,
    pub is_active: bool,
    /// Completed user+assistant exchanges.
    pub turn_count: u32,
    pub message_count: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Episode {
    /// Whether this episode matches a requested template scope.
    ///
    /// Matching is strict: an open-ended request (`None`) does not reuse
    /// a templated episode, and vice versa.
    pub fn matches_template(&self, template_id: Option<Uuid>) -> bool {
        self.template_id == template_id
    }

    /// Mark the episode as ended locally.
    pub fn mark_ended(&mut self) {
        self.is_active = false;
        self.ended_at = Some(Utc::now());
    }
}
