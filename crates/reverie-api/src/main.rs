//! Reverie CLI entry point.
//!
//! Binary name: `reverie`
//!
//! Parses CLI arguments, initializes tracing, and dispatches to the
//! interactive chat loop.

mod cli;

use clap::Parser;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,reverie=debug",
        _ => "trace",
    };
    reverie_observe::tracing_setup::init_tracing(filter)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    match cli.command {
        Commands::Chat {
            persona,
            template,
            base_url,
            token,
        } => cli::chat::run_chat(persona, template, &base_url, token).await,
    }
}
