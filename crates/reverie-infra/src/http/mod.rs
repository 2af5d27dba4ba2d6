//! HTTP binding of the episode backend contract.

pub mod client;
pub mod error;
pub mod streaming;
pub mod types;

pub use client::ReverieClient;
