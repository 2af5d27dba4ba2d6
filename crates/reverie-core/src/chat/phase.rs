//! Controller phase machine and load-key memo.
//!
//! The source system encoded "has loaded for this key" and "send in
//! flight" as ad-hoc mutable flags; here both are named states with a
//! single source of truth for the current `(persona, template)` key.

use uuid::Uuid;

/// What the controller is currently doing.
///
/// `Sending` enforces the single-flight rule: a send while one is in
/// flight is a rejected no-op, with no queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatPhase {
    #[default]
    Idle,
    Loading,
    Sending,
    /// The last action failed; cleared by the next action.
    Failed,
}

impl ChatPhase {
    pub fn is_busy(self) -> bool {
        matches!(self, ChatPhase::Loading | ChatPhase::Sending)
    }
}

/// Composite key the initial load is memoized by.
///
/// `load_messages` runs at most once per distinct key for the lifetime of
/// the controller instance; changing the key invalidates the memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadKey {
    pub persona_id: Uuid,
    pub template_id: Option<Uuid>,
}

impl LoadKey {
    pub fn new(persona_id: Uuid, template_id: Option<Uuid>) -> Self {
        Self {
            persona_id,
            template_id,
        }
    }
}
