//! Request bodies for the episode REST endpoints.

use serde::Serialize;
use uuid::Uuid;

/// Body of `POST /personas/{id}/episodes`.
#[derive(Debug, Clone, Serialize)]
pub struct StartEpisodeBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
}

/// Body of `POST /personas/{id}/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct SendBody {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_id: Option<Uuid>,
}
