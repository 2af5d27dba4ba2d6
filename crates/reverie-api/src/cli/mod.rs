//! CLI argument definitions and command handlers.

pub mod chat;
pub mod commands;

use clap::{ArgAction, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "reverie", about = "Streaming persona episode chat", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v info, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with a persona in a live episode.
    Chat {
        /// Persona to talk to.
        #[arg(long)]
        persona: Uuid,

        /// Episode template to scope the conversation to.
        #[arg(long)]
        template: Option<Uuid>,

        /// Backend origin.
        #[arg(long, env = "REVERIE_API_URL", default_value = "http://localhost:8787")]
        base_url: String,

        /// Bearer token for the backend.
        #[arg(long, env = "REVERIE_API_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
}
