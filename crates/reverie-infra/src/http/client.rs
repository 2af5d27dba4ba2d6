//! ReverieClient -- HTTP implementation of [`EpisodeBackend`].
//!
//! Talks to the episode REST endpoints and the streaming chat endpoint.
//! The bearer token is wrapped in [`secrecy::SecretString`] and is only
//! exposed when constructing request headers; it never appears in Debug
//! output or tracing logs.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use uuid::Uuid;

use reverie_core::chat::backend::{EpisodeBackend, EventStream};
use reverie_types::episode::Episode;
use reverie_types::error::ChatError;
use reverie_types::message::Message;

use super::error::classify_status;
use super::streaming::sse_stream;
use super::types::{SendBody, StartEpisodeBody};

/// HTTP client for the Reverie episode backend.
pub struct ReverieClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
}

impl ReverieClient {
    /// Create a client against the given backend origin.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            // Long-lived streaming reads; generous ceiling.
            .timeout(Duration::from_secs(300))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            base_url: base_url.into(),
            token: None,
        }
    }

    /// Attach a bearer token sent on every request.
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Override the base URL (useful for tests or proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Pass a successful response through; classify everything else.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }

    fn transport(err: reqwest::Error) -> ChatError {
        ChatError::Transport(err.to_string())
    }
}

impl EpisodeBackend for ReverieClient {
    async fn active_episode(&self, persona_id: Uuid) -> Result<Option<Episode>, ChatError> {
        let url = self.url(&format!("/personas/{persona_id}/episodes/active"));
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(Self::transport)?;

        // A persona with no active episode answers 200 null or 404.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        response
            .json::<Option<Episode>>()
            .await
            .map_err(|e| ChatError::Deserialization(e.to_string()))
    }

    async fn start_episode(
        &self,
        persona_id: Uuid,
        template_id: Option<Uuid>,
    ) -> Result<Episode, ChatError> {
        let url = self.url(&format!("/personas/{persona_id}/episodes"));
        debug!(persona_id = %persona_id, template_id = ?template_id, "Starting episode");
        let response = self
            .authed(self.client.post(&url))
            .json(&StartEpisodeBody { template_id })
            .send()
            .await
            .map_err(Self::transport)?;
        let response = Self::check(response).await?;
        response
            .json::<Episode>()
            .await
            .map_err(|e| ChatError::Deserialization(e.to_string()))
    }

    async fn end_episode(&self, persona_id: Uuid) -> Result<Episode, ChatError> {
        let url = self.url(&format!("/personas/{persona_id}/episodes/end"));
        let response = self
            .authed(self.client.post(&url))
            .send()
            .await
            .map_err(Self::transport)?;
        let response = Self::check(response).await?;
        response
            .json::<Episode>()
            .await
            .map_err(|e| ChatError::Deserialization(e.to_string()))
    }

    async fn messages(&self, episode_id: Uuid) -> Result<Vec<Message>, ChatError> {
        let url = self.url(&format!("/episodes/{episode_id}/messages"));
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(Self::transport)?;
        let response = Self::check(response).await?;
        response
            .json::<Vec<Message>>()
            .await
            .map_err(|e| ChatError::Deserialization(e.to_string()))
    }

    fn send(&self, persona_id: Uuid, text: &str, template_id: Option<Uuid>) -> EventStream {
        let request = self.authed(
            self.client
                .post(self.url(&format!("/personas/{persona_id}/chat"))),
        );
        let body = SendBody {
            text: text.to_string(),
            template_id,
        };

        Box::pin(async_stream::try_stream! {
            let response = request
                .json(&body)
                .send()
                .await
                .map_err(Self::transport)?;
            let response = Self::check(response).await?;

            let mut events = sse_stream(response.bytes_stream());
            while let Some(event) = futures_util::StreamExt::next(&mut events).await {
                yield event?;
            }
        })
    }
}
