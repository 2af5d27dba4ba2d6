//! Episode chat controller.
//!
//! Owns the ordered message list, the streaming buffer, the director
//! sub-state, and the phase machine for one persona conversation. All
//! mutation flows through the action methods; no external writer touches
//! the message list.
//!
//! The send path is the message reconciler: optimistic insertion of the
//! user's message, live accumulation of streamed assistant text, a final
//! swap-in of the committed assistant message, and classified failure
//! dispatch with per-classification rollback policy.

use tokio_util::sync::CancellationToken;

use futures_util::StreamExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use reverie_types::config::ChatConfig;
use reverie_types::director::DirectorState;
use reverie_types::episode::Episode;
use reverie_types::error::ChatError;
use reverie_types::message::Message;
use reverie_types::stream::{Evaluation, StreamEvent};

use super::backend::EpisodeBackend;
use super::events::ChatEvents;
use super::phase::{ChatPhase, LoadKey};
use super::resolver::resolve_episode;

/// Drives a live episode conversation against an [`EpisodeBackend`].
///
/// Single-threaded ownership model: one controller instance per persona
/// conversation, mutated only through `&mut self` actions. Overlapping
/// async operations are governed by the phase machine (single-flight
/// sends) and the load-key memo (at-most-once initial load per key).
pub struct ChatController<B: EpisodeBackend, H: ChatEvents> {
    backend: B,
    events: H,
    config: ChatConfig,
    phase: ChatPhase,
    loaded_key: Option<LoadKey>,
    episode: Option<Episode>,
    messages: Vec<Message>,
    streaming: String,
    director: DirectorState,
    suggest_scene: bool,
    cancel: CancellationToken,
}

impl<B: EpisodeBackend, H: ChatEvents> ChatController<B, H> {
    pub fn new(backend: B, config: ChatConfig, events: H) -> Self {
        Self {
            backend,
            events,
            config,
            phase: ChatPhase::Idle,
            loaded_key: None,
            episode: None,
            messages: Vec::new(),
            streaming: String::new(),
            director: DirectorState::Inactive,
            suggest_scene: false,
            cancel: CancellationToken::new(),
        }
    }

    // --- Observable state ---

    /// Messages in send order: optimistic user messages interleave with
    /// committed assistant output exactly as they were sent.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.phase == ChatPhase::Loading
    }

    pub fn is_sending(&self) -> bool {
        self.phase == ChatPhase::Sending
    }

    /// Assistant text accumulated so far for the in-flight turn. Empty
    /// outside of an active send.
    pub fn streaming_content(&self) -> &str {
        &self.streaming
    }

    pub fn director_state(&self) -> &DirectorState {
        &self.director
    }

    pub fn is_episode_complete(&self) -> bool {
        self.director.is_complete()
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        self.director.evaluation()
    }

    pub fn next_suggestion(&self) -> Option<&str> {
        self.director.next_suggestion()
    }

    /// One-shot "a visual would suit this moment" flag raised by `done`
    /// events; consumed via [`ChatController::clear_scene_suggestion`].
    pub fn suggest_scene(&self) -> bool {
        self.suggest_scene
    }

    /// Token tied to this controller's lifetime. Cancel it on teardown:
    /// in-flight streams stop mutating local state (server-side
    /// processing is not guaranteed to stop).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    // --- Actions ---

    /// Load the persisted conversation for the configured
    /// `(persona, template)` key.
    ///
    /// Runs at most once per distinct key for the lifetime of this
    /// instance; repeat calls with the same key are no-ops. Gated by
    /// `config.enabled`. Binds the active episode only when its template
    /// scope matches; a mismatched episode is left for the first send to
    /// replace.
    pub async fn load_messages(&mut self) -> Result<(), ChatError> {
        if !self.config.enabled {
            return Ok(());
        }
        let key = LoadKey::new(self.config.persona_id, self.config.episode_template_id);
        if self.loaded_key == Some(key) {
            debug!(persona_id = %key.persona_id, "Load already performed for this key");
            return Ok(());
        }
        // Memo recorded before the first await so a re-render style
        // repeat call never refetches, even if this load later fails.
        self.loaded_key = Some(key);
        self.phase = ChatPhase::Loading;

        match self.load_inner().await {
            Ok(()) => {
                self.phase = ChatPhase::Idle;
                Ok(())
            }
            Err(err) => {
                self.phase = ChatPhase::Failed;
                self.events.on_error(&err);
                Err(err)
            }
        }
    }

    async fn load_inner(&mut self) -> Result<(), ChatError> {
        let persona_id = self.config.persona_id;
        let template_id = self.config.episode_template_id;

        if let Some(episode) = self.backend.active_episode(persona_id).await? {
            if episode.matches_template(template_id) {
                let messages = self.backend.messages(episode.id).await?;
                info!(
                    episode_id = %episode.id,
                    count = messages.len(),
                    "Loaded episode messages"
                );
                self.messages = messages;
                self.episode = Some(episode);
            } else {
                debug!(
                    episode_id = %episode.id,
                    "Active episode template mismatch; new episode deferred to first send"
                );
            }
        }
        Ok(())
    }

    /// Invalidate the load memo and load again (explicit escape hatch;
    /// the memo itself never expires).
    pub async fn reload(&mut self) -> Result<(), ChatError> {
        self.loaded_key = None;
        self.load_messages().await
    }

    /// Send a user message and reconcile the streamed assistant turn.
    ///
    /// A send while one is in flight is a rejected no-op. All failures
    /// are classified and dispatched through the [`ChatEvents`] handler;
    /// only a rate-limit classification rolls the optimistic user
    /// message back.
    pub async fn send_message(&mut self, text: &str) {
        if self.phase == ChatPhase::Sending {
            warn!("Send rejected: another send is in flight");
            return;
        }
        self.phase = ChatPhase::Sending;
        self.streaming.clear();

        // Optimistic insert precedes all I/O. When no episode is bound
        // yet the placeholder episode id is patched after resolution.
        let optimistic = Message::optimistic_user(
            self.episode.as_ref().map(|e| e.id).unwrap_or(Uuid::nil()),
            text,
        );
        let optimistic_id = optimistic.id;
        self.messages.push(optimistic);

        let outcome = self.send_inner(text, optimistic_id).await;

        match outcome {
            SendOutcome::Committed | SendOutcome::Cancelled => {
                if let Some(msg) = self.messages.iter_mut().find(|m| m.id == optimistic_id) {
                    msg.pending = false;
                }
                self.phase = ChatPhase::Idle;
            }
            SendOutcome::Failed(err) => {
                self.dispatch_failure(err, optimistic_id);
                self.phase = ChatPhase::Failed;
            }
        }
        // Final step on every path: the streaming buffer never outlives
        // the send that produced it.
        self.streaming.clear();
    }

    async fn send_inner(&mut self, text: &str, optimistic_id: Uuid) -> SendOutcome {
        let persona_id = self.config.persona_id;
        let template_id = self.config.episode_template_id;

        // Bind an episode, creating one when none matches.
        let bound = self
            .episode
            .as_ref()
            .filter(|ep| ep.is_active && ep.matches_template(template_id))
            .cloned();
        let episode = match bound {
            Some(ep) => ep,
            None => match resolve_episode(&self.backend, persona_id, template_id).await {
                Ok(ep) => {
                    if let Some(msg) = self.messages.iter_mut().find(|m| m.id == optimistic_id) {
                        msg.episode_id = ep.id;
                    }
                    self.episode = Some(ep.clone());
                    ep
                }
                Err(err) => return SendOutcome::Failed(err),
            },
        };

        let mut stream = self.backend.send(persona_id, text, template_id);
        let mut buffer = String::new();
        let mut committed = false;
        let mut saw_terminal = false;

        while let Some(item) = stream.next().await {
            // A cancelled controller stops applying events from what is
            // now a stale stream.
            if self.cancel.is_cancelled() {
                debug!("Controller cancelled mid-stream; dropping remaining events");
                return SendOutcome::Cancelled;
            }
            match item {
                Ok(StreamEvent::Chunk { content }) => {
                    buffer.push_str(&content);
                    self.streaming = buffer.clone();
                    self.events.on_streaming(&content);
                }
                Ok(StreamEvent::Done {
                    content,
                    director,
                    suggest_scene,
                }) => {
                    saw_terminal = true;
                    // The event's full content governs; the accumulated
                    // buffer is the fallback when the server omits it.
                    let final_text = content.unwrap_or_else(|| buffer.clone());
                    self.messages
                        .push(Message::assistant(episode.id, final_text, None));
                    committed = true;
                    self.streaming.clear();
                    if let Some(snapshot) = &director {
                        self.director.apply_snapshot(snapshot);
                        if self.director.is_complete() {
                            self.mark_episode_inactive();
                        }
                    }
                    if suggest_scene {
                        self.suggest_scene = true;
                    }
                }
                Ok(StreamEvent::EpisodeComplete {
                    turn_count,
                    evaluation,
                    next_suggestion,
                }) => {
                    saw_terminal = true;
                    info!(turn_count, "Director completed the episode");
                    self.director
                        .complete(turn_count, evaluation.clone(), next_suggestion);
                    self.mark_episode_inactive();
                    if let Some(ep) = &mut self.episode {
                        ep.turn_count = turn_count;
                    }
                    self.events.on_episode_complete(turn_count, evaluation.as_ref());
                }
                Err(err) => return SendOutcome::Failed(err),
            }
        }

        if !committed && !buffer.is_empty() {
            // Streams over real networks truncate: chunks arrived but no
            // terminal event followed. The accumulated text is committed
            // rather than silently dropped.
            if !saw_terminal {
                warn!(
                    chars = buffer.len(),
                    "Stream ended without a terminal event; committing accumulated chunks"
                );
            }
            self.messages
                .push(Message::assistant(episode.id, buffer, None));
        }
        SendOutcome::Committed
    }

    /// Classified failure dispatch. The rollback policy is deliberately
    /// asymmetric and lives in this one match: rate-limited turns were
    /// never accepted so the optimistic message goes; every other
    /// classification keeps the user's utterance for resend.
    fn dispatch_failure(&mut self, err: ChatError, optimistic_id: Uuid) {
        match &err {
            ChatError::RateLimited(info) => {
                self.messages.retain(|m| m.id != optimistic_id);
                warn!(retry_after = info.retry_after, "Send rate limited");
                self.events.on_rate_limited(info);
            }
            ChatError::InsufficientSparks(balance) => {
                warn!(
                    required = balance.required,
                    available = balance.available,
                    "Send needs more sparks"
                );
                self.events.on_insufficient_sparks(balance);
            }
            _ => {
                warn!(error = %err, "Send failed");
                self.events.on_error(&err);
            }
        }
    }

    fn mark_episode_inactive(&mut self) {
        if let Some(ep) = &mut self.episode {
            if ep.is_active {
                ep.mark_ended();
            }
        }
    }

    /// End the current episode (when active) and start a fresh one.
    ///
    /// Clears the message list and the director state, which belong to
    /// the old episode. After this call no send targets the old episode.
    pub async fn start_new_episode(&mut self) -> Result<(), ChatError> {
        if let Some(ep) = &self.episode {
            if ep.is_active {
                self.backend.end_episode(self.config.persona_id).await?;
            }
        }
        let episode = resolve_episode(
            &self.backend,
            self.config.persona_id,
            self.config.episode_template_id,
        )
        .await?;
        info!(episode_id = %episode.id, "New episode started");

        self.messages.clear();
        self.streaming.clear();
        self.director.clear();
        self.suggest_scene = false;
        self.phase = ChatPhase::Idle;
        self.episode = Some(episode);
        Ok(())
    }

    /// End the current episode. No-op when none is active; otherwise the
    /// local episode is replaced with the server's now-inactive
    /// representation.
    pub async fn end_episode(&mut self) -> Result<(), ChatError> {
        match &self.episode {
            Some(ep) if ep.is_active => {
                let ended = self.backend.end_episode(self.config.persona_id).await?;
                info!(episode_id = %ended.id, "Episode ended");
                self.episode = Some(ended);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Consume the one-shot scene suggestion flag.
    pub fn clear_scene_suggestion(&mut self) {
        self.suggest_scene = false;
    }

    /// Reset the director to `Inactive`. Does not end the underlying
    /// episode; that is a separate action.
    pub fn clear_completion(&mut self) {
        self.director.clear();
    }

    #[cfg(test)]
    pub(crate) fn set_phase_for_tests(&mut self, phase: ChatPhase) {
        self.phase = phase;
    }
}

/// Internal result of one send attempt.
enum SendOutcome {
    Committed,
    Cancelled,
    Failed(ChatError),
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chat::events::NullEvents;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use futures_util::stream;

    use reverie_types::error::{RateLimitInfo, SparkBalance};
    use reverie_types::message::MessageRole;
    use reverie_types::stream::DirectorSnapshot;

    /// Scripted in-memory backend with call counters.
    #[derive(Default)]
    pub(crate) struct MockBackend {
        active: Mutex<Option<Episode>>,
        active_after_conflict: Mutex<Option<Episode>>,
        start_error: Mutex<Option<ChatError>>,
        history: Mutex<Vec<Message>>,
        scripts: Mutex<VecDeque<Vec<Result<StreamEvent, ChatError>>>>,
        active_calls: Mutex<usize>,
        start_calls: Mutex<usize>,
        end_calls: Mutex<usize>,
        send_calls: Mutex<usize>,
    }

    impl MockBackend {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        pub(crate) fn with_active(self, episode: Episode) -> Self {
            *self.active.lock().unwrap() = Some(episode);
            self
        }

        pub(crate) fn failing_start(self, err: ChatError) -> Self {
            *self.start_error.lock().unwrap() = Some(err);
            self
        }

        /// Episode that becomes active only after a start conflict, as if
        /// a concurrent creation won the race.
        pub(crate) fn with_active_after_conflict(self, episode: Episode) -> Self {
            *self.active_after_conflict.lock().unwrap() = Some(episode);
            self
        }

        pub(crate) fn with_history(self, messages: Vec<Message>) -> Self {
            *self.history.lock().unwrap() = messages;
            self
        }

        pub(crate) fn script(self, events: Vec<Result<StreamEvent, ChatError>>) -> Self {
            self.scripts.lock().unwrap().push_back(events);
            self
        }

        pub(crate) fn active_calls(&self) -> usize {
            *self.active_calls.lock().unwrap()
        }

        pub(crate) fn start_calls(&self) -> usize {
            *self.start_calls.lock().unwrap()
        }

        pub(crate) fn end_calls(&self) -> usize {
            *self.end_calls.lock().unwrap()
        }

        pub(crate) fn send_calls(&self) -> usize {
            *self.send_calls.lock().unwrap()
        }
    }

    impl EpisodeBackend for MockBackend {
        async fn active_episode(&self, _persona_id: Uuid) -> Result<Option<Episode>, ChatError> {
            *self.active_calls.lock().unwrap() += 1;
            Ok(self.active.lock().unwrap().clone())
        }

        async fn start_episode(
            &self,
            persona_id: Uuid,
            template_id: Option<Uuid>,
        ) -> Result<Episode, ChatError> {
            *self.start_calls.lock().unwrap() += 1;
            if let Some(err) = self.start_error.lock().unwrap().clone() {
                if err.is_conflict() {
                    if let Some(winner) = self.active_after_conflict.lock().unwrap().take() {
                        *self.active.lock().unwrap() = Some(winner);
                    }
                }
                return Err(err);
            }
            let episode = Episode {
                id: Uuid::now_v7(),
                persona_id,
                template_id,
                is_active: true,
                turn_count: 0,
                message_count: 0,
                started_at: Utc::now(),
                ended_at: None,
            };
            *self.active.lock().unwrap() = Some(episode.clone());
            Ok(episode)
        }

        async fn end_episode(&self, _persona_id: Uuid) -> Result<Episode, ChatError> {
            *self.end_calls.lock().unwrap() += 1;
            let mut episode = self
                .active
                .lock()
                .unwrap()
                .take()
                .ok_or(ChatError::NoEpisode)?;
            episode.mark_ended();
            Ok(episode)
        }

        async fn messages(&self, _episode_id: Uuid) -> Result<Vec<Message>, ChatError> {
            Ok(self.history.lock().unwrap().clone())
        }

        fn send(
            &self,
            _persona_id: Uuid,
            _text: &str,
            _template_id: Option<Uuid>,
        ) -> crate::chat::backend::EventStream {
            *self.send_calls.lock().unwrap() += 1;
            let events = self.scripts.lock().unwrap().pop_front().unwrap_or_else(|| {
                vec![Ok(StreamEvent::Done {
                    content: Some("Hello!".to_string()),
                    director: None,
                    suggest_scene: false,
                })]
            });
            Box::pin(stream::iter(events))
        }
    }

    /// Handler that records every event for assertions.
    #[derive(Default)]
    pub(crate) struct RecordingEvents {
        pub rate_limited: Mutex<Vec<RateLimitInfo>>,
        pub sparks: Mutex<Vec<SparkBalance>>,
        pub errors: Mutex<Vec<String>>,
        pub completions: Mutex<Vec<u32>>,
        pub deltas: Mutex<Vec<String>>,
    }

    impl ChatEvents for RecordingEvents {
        fn on_streaming(&self, delta: &str) {
            self.deltas.lock().unwrap().push(delta.to_string());
        }

        fn on_rate_limited(&self, info: &RateLimitInfo) {
            self.rate_limited.lock().unwrap().push(info.clone());
        }

        fn on_insufficient_sparks(&self, balance: &SparkBalance) {
            self.sparks.lock().unwrap().push(balance.clone());
        }

        fn on_episode_complete(&self, turn_count: u32, _evaluation: Option<&Evaluation>) {
            self.completions.lock().unwrap().push(turn_count);
        }

        fn on_error(&self, error: &ChatError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
    }

    fn chunk(text: &str) -> Result<StreamEvent, ChatError> {
        Ok(StreamEvent::Chunk {
            content: text.to_string(),
        })
    }

    fn done(content: Option<&str>) -> Result<StreamEvent, ChatError> {
        Ok(StreamEvent::Done {
            content: content.map(str::to_string),
            director: None,
            suggest_scene: false,
        })
    }

    fn controller(
        backend: MockBackend,
        persona_id: Uuid,
    ) -> ChatController<MockBackend, NullEvents> {
        ChatController::new(backend, ChatConfig::new(persona_id), NullEvents)
    }

    fn recording_controller(
        backend: MockBackend,
        persona_id: Uuid,
    ) -> (
        ChatController<MockBackend, Arc<RecordingEvents>>,
        Arc<RecordingEvents>,
    ) {
        let events = Arc::new(RecordingEvents::default());
        let ctrl = ChatController::new(backend, ChatConfig::new(persona_id), Arc::clone(&events));
        (ctrl, events)
    }

    // --- Send path ---

    #[tokio::test]
    async fn test_first_send_creates_episode_and_commits_turn() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![
            chunk("Hi"),
            done(Some("Hi there.")),
        ]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hi").await;

        assert_eq!(ctrl.backend.start_calls(), 1);
        let messages = ctrl.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[0].content, "hi");
        assert!(!messages[0].pending);
        assert_eq!(messages[0].episode_id, ctrl.episode().unwrap().id);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].content, "Hi there.");
        assert!(!ctrl.is_sending());
        assert!(ctrl.streaming_content().is_empty());
    }

    #[tokio::test]
    async fn test_done_content_governs_over_chunks() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![
            chunk("draft "),
            chunk("text"),
            done(Some("polished text")),
        ]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hello").await;
        assert_eq!(ctrl.messages()[1].content, "polished text");
    }

    #[tokio::test]
    async fn test_done_without_content_falls_back_to_chunks() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![chunk("A"), chunk("B"), done(None)]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hello").await;
        assert_eq!(ctrl.messages()[1].content, "AB");
    }

    #[tokio::test]
    async fn test_truncated_stream_commits_accumulated_chunks() {
        // Three chunks, no terminal event: defensive finalization.
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![chunk("A"), chunk("B"), chunk("C")]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hello").await;

        let messages = ctrl.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "ABC");
        assert!(!ctrl.is_sending());
    }

    #[tokio::test]
    async fn test_empty_stream_commits_nothing() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hello").await;
        // Only the user message; nothing to finalize.
        assert_eq!(ctrl.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_streaming_content_published_then_cleared() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![chunk("He"), chunk("llo"), done(None)]);
        let (mut ctrl, events) = recording_controller(backend, persona);

        ctrl.send_message("hi").await;

        assert_eq!(
            *events.deltas.lock().unwrap(),
            vec!["He".to_string(), "llo".to_string()]
        );
        assert!(ctrl.streaming_content().is_empty());
    }

    #[tokio::test]
    async fn test_send_while_sending_is_a_noop() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new();
        let mut ctrl = controller(backend, persona);
        ctrl.set_phase_for_tests(ChatPhase::Sending);

        ctrl.send_message("hello").await;

        assert!(ctrl.messages().is_empty());
        assert_eq!(ctrl.backend.send_calls(), 0);
        assert!(ctrl.is_sending());
    }

    #[tokio::test]
    async fn test_second_send_reuses_bound_episode() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new()
            .script(vec![done(Some("one"))])
            .script(vec![done(Some("two"))]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("first").await;
        ctrl.send_message("second").await;

        assert_eq!(ctrl.backend.start_calls(), 1);
        assert_eq!(ctrl.backend.send_calls(), 2);
        assert_eq!(ctrl.messages().len(), 4);
    }

    // --- Error classification ---

    #[tokio::test]
    async fn test_rate_limit_rolls_back_user_message() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![Err(ChatError::RateLimited(
            RateLimitInfo {
                retry_after: 30,
                limit: None,
                window: None,
            },
        ))]);
        let (mut ctrl, events) = recording_controller(backend, persona);

        ctrl.send_message("too fast").await;

        assert!(ctrl.messages().is_empty(), "rate-limited turn never counted");
        let fired = events.rate_limited.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].retry_after, 30);
        assert!(events.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_sparks_keeps_user_message() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![Err(ChatError::InsufficientSparks(
            SparkBalance {
                required: 5,
                available: 2,
            },
        ))]);
        let (mut ctrl, events) = recording_controller(backend, persona);

        ctrl.send_message("one more").await;

        assert_eq!(ctrl.messages().len(), 1, "utterance kept for resend");
        assert_eq!(ctrl.messages()[0].content, "one more");
        let fired = events.sparks.lock().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].required, 5);
        assert!(events.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generic_failure_keeps_message_and_fires_on_error() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new()
            .script(vec![Err(ChatError::Transport("connection reset".to_string()))]);
        let (mut ctrl, events) = recording_controller(backend, persona);

        ctrl.send_message("hello?").await;

        assert_eq!(ctrl.messages().len(), 1);
        assert_eq!(events.errors.lock().unwrap().len(), 1);
        assert!(events.rate_limited.lock().unwrap().is_empty());
        assert!(!ctrl.is_sending());
    }

    #[tokio::test]
    async fn test_chunks_before_failure_do_not_commit() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![
            chunk("partial"),
            Err(ChatError::Transport("reset".to_string())),
        ]);
        let (mut ctrl, events) = recording_controller(backend, persona);

        ctrl.send_message("hi").await;

        assert_eq!(ctrl.messages().len(), 1);
        assert!(ctrl.streaming_content().is_empty());
        assert_eq!(events.errors.lock().unwrap().len(), 1);
    }

    // --- Director ---

    #[tokio::test]
    async fn test_done_director_snapshot_activates() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![Ok(StreamEvent::Done {
            content: Some("turn 3".to_string()),
            director: Some(DirectorSnapshot {
                turn_count: 3,
                turns_remaining: Some(7),
                is_complete: false,
            }),
            suggest_scene: false,
        })]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hello").await;

        assert_eq!(
            *ctrl.director_state(),
            DirectorState::Active {
                turn_count: 3,
                turns_remaining: Some(7)
            }
        );
        assert!(!ctrl.is_episode_complete());
        assert!(ctrl.episode().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_episode_complete_marks_director_and_episode() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![
            done(Some("The end.")),
            Ok(StreamEvent::EpisodeComplete {
                turn_count: 10,
                evaluation: Some(Evaluation {
                    score: Some(0.9),
                    summary: Some("Lovely arc.".to_string()),
                }),
                next_suggestion: Some("a sequel".to_string()),
            }),
        ]);
        let (mut ctrl, events) = recording_controller(backend, persona);

        ctrl.send_message("goodbye").await;

        assert!(ctrl.is_episode_complete());
        assert_eq!(ctrl.next_suggestion(), Some("a sequel"));
        assert_eq!(
            ctrl.evaluation().and_then(|e| e.summary.as_deref()),
            Some("Lovely arc.")
        );
        // The done event still governed message commitment.
        assert_eq!(ctrl.messages()[1].content, "The end.");
        let episode = ctrl.episode().unwrap();
        assert!(!episode.is_active);
        assert_eq!(episode.turn_count, 10);
        assert_eq!(*events.completions.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn test_clear_completion_resets_director_only() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![Ok(StreamEvent::EpisodeComplete {
            turn_count: 10,
            evaluation: None,
            next_suggestion: None,
        })]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("bye").await;
        assert!(ctrl.is_episode_complete());

        ctrl.clear_completion();
        assert!(!ctrl.is_episode_complete());
        assert_eq!(*ctrl.director_state(), DirectorState::Inactive);
        // Clearing does not end or replace the episode.
        assert!(ctrl.episode().is_some());
    }

    #[tokio::test]
    async fn test_suggest_scene_is_one_shot() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![Ok(StreamEvent::Done {
            content: Some("A moonlit pier.".to_string()),
            director: None,
            suggest_scene: true,
        })]);
        let mut ctrl = controller(backend, persona);

        assert!(!ctrl.suggest_scene());
        ctrl.send_message("where are we?").await;
        assert!(ctrl.suggest_scene());

        ctrl.clear_scene_suggestion();
        assert!(!ctrl.suggest_scene());
    }

    // --- Loading ---

    #[tokio::test]
    async fn test_load_messages_fetches_once_per_key() {
        let persona = Uuid::now_v7();
        let episode = Episode {
            id: Uuid::now_v7(),
            persona_id: persona,
            template_id: None,
            is_active: true,
            turn_count: 1,
            message_count: 2,
            started_at: Utc::now(),
            ended_at: None,
        };
        let history = vec![
            Message::optimistic_user(episode.id, "old question"),
            Message::assistant(episode.id, "old answer", None),
        ];
        let backend = MockBackend::new()
            .with_active(episode.clone())
            .with_history(history);
        let mut ctrl = controller(backend, persona);

        ctrl.load_messages().await.unwrap();
        ctrl.load_messages().await.unwrap();

        assert_eq!(ctrl.backend.active_calls(), 1);
        assert_eq!(ctrl.messages().len(), 2);
        assert_eq!(ctrl.episode().unwrap().id, episode.id);
    }

    #[tokio::test]
    async fn test_load_messages_disabled_is_noop() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new();
        let mut ctrl = ChatController::new(
            backend,
            ChatConfig::new(persona).disabled(),
            NullEvents,
        );

        ctrl.load_messages().await.unwrap();
        assert_eq!(ctrl.backend.active_calls(), 0);
    }

    #[tokio::test]
    async fn test_load_skips_template_mismatched_episode() {
        let persona = Uuid::now_v7();
        let t1 = Uuid::now_v7();
        let t2 = Uuid::now_v7();
        let episode = Episode {
            id: Uuid::now_v7(),
            persona_id: persona,
            template_id: Some(t1),
            is_active: true,
            turn_count: 0,
            message_count: 0,
            started_at: Utc::now(),
            ended_at: None,
        };
        let backend = MockBackend::new()
            .with_active(episode)
            .script(vec![done(Some("fresh start"))]);
        let mut ctrl = ChatController::new(
            backend,
            ChatConfig::new(persona).with_template(t2),
            NullEvents,
        );

        ctrl.load_messages().await.unwrap();
        assert!(ctrl.episode().is_none(), "mismatched episode not bound");

        // First send replaces the T1 episode with one scoped to T2.
        ctrl.send_message("hello").await;
        assert_eq!(ctrl.backend.start_calls(), 1);
        assert_eq!(ctrl.episode().unwrap().template_id, Some(t2));
    }

    #[tokio::test]
    async fn test_reload_invalidates_memo() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new();
        let mut ctrl = controller(backend, persona);

        ctrl.load_messages().await.unwrap();
        ctrl.reload().await.unwrap();
        assert_eq!(ctrl.backend.active_calls(), 2);
    }

    // --- Lifecycle actions ---

    #[tokio::test]
    async fn test_start_new_episode_replaces_session_and_clears_state() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new()
            .script(vec![Ok(StreamEvent::Done {
                content: Some("hello".to_string()),
                director: Some(DirectorSnapshot {
                    turn_count: 1,
                    turns_remaining: Some(9),
                    is_complete: false,
                }),
                suggest_scene: true,
            })]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hi").await;
        let old_id = ctrl.episode().unwrap().id;
        assert!(!ctrl.messages().is_empty());
        assert!(ctrl.suggest_scene());

        ctrl.start_new_episode().await.unwrap();

        assert_eq!(ctrl.backend.end_calls(), 1);
        assert!(ctrl.messages().is_empty());
        assert!(!ctrl.suggest_scene());
        assert_eq!(*ctrl.director_state(), DirectorState::Inactive);
        let new_id = ctrl.episode().unwrap().id;
        assert_ne!(new_id, old_id);
        assert!(ctrl.episode().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_start_new_episode_without_prior_session() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new();
        let mut ctrl = controller(backend, persona);

        ctrl.start_new_episode().await.unwrap();

        assert_eq!(ctrl.backend.end_calls(), 0);
        assert!(ctrl.messages().is_empty());
        assert!(ctrl.episode().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_end_episode_replaces_with_inactive_representation() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![done(Some("hi"))]);
        let mut ctrl = controller(backend, persona);

        ctrl.send_message("hi").await;
        assert!(ctrl.episode().unwrap().is_active);

        ctrl.end_episode().await.unwrap();

        let episode = ctrl.episode().unwrap();
        assert!(!episode.is_active);
        assert!(episode.ended_at.is_some());
        // Messages are kept; only the episode state changes.
        assert_eq!(ctrl.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_end_episode_noop_without_active_session() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new();
        let mut ctrl = controller(backend, persona);

        ctrl.end_episode().await.unwrap();
        assert_eq!(ctrl.backend.end_calls(), 0);
    }

    // --- Cancellation ---

    #[tokio::test]
    async fn test_cancelled_controller_stops_applying_stream_events() {
        let persona = Uuid::now_v7();
        let backend = MockBackend::new().script(vec![chunk("A"), chunk("B"), done(None)]);
        let mut ctrl = controller(backend, persona);

        ctrl.cancellation_token().cancel();
        ctrl.send_message("hi").await;

        // The optimistic message stays (local, pre-I/O) but no stream
        // event mutated state.
        assert_eq!(ctrl.messages().len(), 1);
        assert!(ctrl.streaming_content().is_empty());
        assert!(!ctrl.is_sending());
    }
}
