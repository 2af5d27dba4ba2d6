//! Episode conversation controller for Reverie.
//!
//! This crate defines the "port" (the [`chat::backend::EpisodeBackend`]
//! trait) that the infrastructure layer implements, and the controller
//! that drives a live episode: optimistic message reconciliation over the
//! send stream, the director sub-state machine, and classified failure
//! dispatch. It depends only on `reverie-types` -- never on
//! `reverie-infra` or any HTTP crate.

pub mod chat;
