//! Episode resolver: idempotent get-or-create.
//!
//! Resolution rules:
//! 1. An active episode matching the requested template scope is reused.
//! 2. No active episode, or a template mismatch, starts a new one scoped
//!    to the requested template.
//! 3. A start conflict (concurrent creation) is recovered by re-fetching
//!    the active episode; only a failed recovery surfaces an error.
//!
//! [`ChatError::EpisodeConflict`] is fully absorbed here and never
//! reaches the caller.

use tracing::{debug, info};
use uuid::Uuid;

use reverie_types::episode::Episode;
use reverie_types::error::ChatError;

use super::backend::EpisodeBackend;

/// Resolve the episode a send for `(persona_id, template_id)` binds to.
pub async fn resolve_episode<B: EpisodeBackend>(
    backend: &B,
    persona_id: Uuid,
    template_id: Option<Uuid>,
) -> Result<Episode, ChatError> {
    if let Some(episode) = backend.active_episode(persona_id).await? {
        if episode.matches_template(template_id) {
            debug!(episode_id = %episode.id, "Reusing active episode");
            return Ok(episode);
        }
        info!(
            episode_id = %episode.id,
            active_template = ?episode.template_id,
            requested_template = ?template_id,
            "Active episode template mismatch, starting a new episode"
        );
    }

    match backend.start_episode(persona_id, template_id).await {
        Ok(episode) => {
            info!(episode_id = %episode.id, "Episode started");
            Ok(episode)
        }
        Err(err) if err.is_conflict() => {
            // A concurrent creation won the race; the episode it made is
            // the one we want.
            debug!(persona_id = %persona_id, "Episode start conflicted, re-fetching active");
            backend
                .active_episode(persona_id)
                .await?
                .ok_or(ChatError::EpisodeConflict)
        }
        Err(err) => Err(err),
    }
}
