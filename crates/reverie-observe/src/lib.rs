//! Observability setup for Reverie.

pub mod tracing_setup;
