//! Episode chat controller and its collaborators.

pub mod backend;
pub mod controller;
pub mod events;
pub mod phase;
pub mod resolver;
