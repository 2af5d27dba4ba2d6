//! Shared domain types for Reverie.
//!
//! This crate contains the core domain types used across the Reverie
//! episode-conversation stack: Episode, Message, the stream event union,
//! director state, and the chat error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod director;
pub mod episode;
pub mod error;
pub mod message;
pub mod stream;
