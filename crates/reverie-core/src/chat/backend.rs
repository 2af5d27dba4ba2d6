//! EpisodeBackend trait definition.
//!
//! The REST/SSE backend is an external collaborator; this trait is its
//! full local contract. Implementations live in `reverie-infra`
//! (`ReverieClient`). Uses native async fn in traits (RPITIT, Rust 2024
//! edition); the send stream is boxed because it outlives the call.

use std::pin::Pin;

use futures_util::Stream;
use uuid::Uuid;

use reverie_types::episode::Episode;
use reverie_types::error::ChatError;
use reverie_types::message::Message;
use reverie_types::stream::StreamEvent;

/// Boxed stream of send events, as produced by one `send` call.
///
/// Yields zero or more `Chunk`s, then at most one terminal event, then
/// ends. May also end with no terminal event (network truncation) or yield
/// a single `Err` carrying the classified failure.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ChatError>> + Send + 'static>>;

/// Backend contract for episode lifecycle, message history, and sends.
pub trait EpisodeBackend: Send + Sync {
    /// Fetch the currently active episode for a persona, if any.
    fn active_episode(
        &self,
        persona_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Episode>, ChatError>> + Send;

    /// Start a new episode, optionally scoped to a template.
    ///
    /// May fail with [`ChatError::EpisodeConflict`] when a concurrent
    /// creation won; callers recover by re-fetching the active episode.
    fn start_episode(
        &self,
        persona_id: Uuid,
        template_id: Option<Uuid>,
    ) -> impl std::future::Future<Output = Result<Episode, ChatError>> + Send;

    /// End the active episode, returning its now-inactive representation.
    fn end_episode(
        &self,
        persona_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Episode, ChatError>> + Send;

    /// Fetch the persisted messages of an episode, ordered by send order.
    fn messages(
        &self,
        episode_id: Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, ChatError>> + Send;

    /// Send a user message and stream the assistant's turn.
    fn send(&self, persona_id: Uuid, text: &str, template_id: Option<Uuid>) -> EventStream;
}
