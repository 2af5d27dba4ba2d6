//! Controller configuration.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for a chat controller instance.
///
/// `persona_id` is required; `episode_template_id` changes which episode a
/// send targets; `enabled` gates the initial message load (a disabled
/// controller loads nothing until re-enabled).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    pub persona_id: Uuid,
    pub episode_template_id: Option<Uuid>,
    pub enabled: bool,
}

impl ChatConfig {
    pub fn new(persona_id: Uuid) -> Self {
        Self {
            persona_id,
            episode_template_id: None,
            enabled: true,
        }
    }

    pub fn with_template(mut self, template_id: Uuid) -> Self {
        self.episode_template_id = Some(template_id);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
