//! Infrastructure layer for Reverie.
//!
//! Contains the HTTP implementation of the [`reverie_core::chat::backend::EpisodeBackend`]
//! trait: a reqwest client for the episode REST endpoints and an SSE
//! adapter for the send stream.

pub mod http;
