//! Interactive chat loop.
//!
//! Drives a [`ChatController`] against the HTTP backend: loads the
//! persisted conversation, reads stdin lines, streams assistant output
//! token by token, and renders classified failures distinctly ("wait a
//! moment" vs "top up sparks").

use std::io::Write;
use std::sync::{Arc, Mutex};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use reverie_core::chat::controller::ChatController;
use reverie_core::chat::events::ChatEvents;
use reverie_infra::http::ReverieClient;
use reverie_types::config::ChatConfig;
use reverie_types::error::{ChatError, RateLimitInfo, SparkBalance};
use reverie_types::message::MessageRole;
use reverie_types::stream::Evaluation;

use super::commands::{self, ChatCommand};

/// Renders controller events to the terminal.
///
/// Holds the thinking spinner so the first streamed token can clear it.
struct ConsoleEvents {
    spinner: Mutex<Option<ProgressBar>>,
}

impl ConsoleEvents {
    fn new() -> Self {
        Self {
            spinner: Mutex::new(None),
        }
    }

    fn arm(&self, spinner: ProgressBar) {
        *self.spinner.lock().unwrap() = Some(spinner);
    }

    /// Clear the spinner if it is still running; true if it was.
    fn disarm(&self) -> bool {
        if let Some(spinner) = self.spinner.lock().unwrap().take() {
            spinner.finish_and_clear();
            true
        } else {
            false
        }
    }
}

impl ChatEvents for ConsoleEvents {
    fn on_streaming(&self, delta: &str) {
        if self.disarm() {
            print!("\n  {} ", style(">").cyan().bold());
        }
        print!("{delta}");
        let _ = std::io::stdout().flush();
    }

    fn on_rate_limited(&self, info: &RateLimitInfo) {
        self.disarm();
        eprintln!(
            "\n  {} Easy there -- try again in {}s. Your message was not sent.",
            style("!").yellow().bold(),
            info.retry_after
        );
    }

    fn on_insufficient_sparks(&self, balance: &SparkBalance) {
        self.disarm();
        eprintln!(
            "\n  {} Not enough sparks (need {}, have {}). Your message is kept; top up and resend.",
            style("!").yellow().bold(),
            balance.required,
            balance.available
        );
    }

    fn on_episode_complete(&self, turn_count: u32, evaluation: Option<&Evaluation>) {
        self.disarm();
        println!(
            "\n  {} Episode complete after {turn_count} turns.",
            style("*").magenta().bold()
        );
        if let Some(summary) = evaluation.and_then(|e| e.summary.as_deref()) {
            println!("  {}", style(summary).dim());
        }
    }

    fn on_error(&self, error: &ChatError) {
        self.disarm();
        eprintln!("\n  {} {error}", style("!").red().bold());
    }
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap(),
    );
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

fn print_history(messages: &[reverie_types::message::Message]) {
    println!();
    for msg in messages {
        let label = match msg.role {
            MessageRole::User => style("You").green().bold(),
            MessageRole::Assistant => style(">").cyan().bold(),
        };
        println!("  {} {}", label, msg.content);
    }
    println!();
}

/// Run the interactive chat loop for a persona.
pub async fn run_chat(
    persona: Uuid,
    template: Option<Uuid>,
    base_url: &str,
    token: Option<String>,
) -> anyhow::Result<()> {
    let mut client = ReverieClient::new(base_url);
    if let Some(token) = token {
        client = client.with_bearer_token(SecretString::from(token));
    }

    let mut config = ChatConfig::new(persona);
    if let Some(template) = template {
        config = config.with_template(template);
    }

    let events = Arc::new(ConsoleEvents::new());
    let mut ctrl = ChatController::new(client, config, Arc::clone(&events));

    println!();
    println!("  {} persona {}", style("reverie").magenta().bold(), persona);
    println!("  {}", style("Type /help for commands, /exit to leave.").dim());

    if let Err(e) = ctrl.load_messages().await {
        // Already rendered via on_error; keep the loop usable.
        eprintln!("  {}", style(format!("(history unavailable: {e})")).dim());
    }
    if !ctrl.messages().is_empty() {
        print_history(ctrl.messages());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  {} ", style("You >").green().bold());
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            println!("\n  {}", style("Goodbye.").dim());
            break;
        };
        let text = line.trim().to_string();
        if text.is_empty() {
            continue;
        }

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => commands::print_help(),
                ChatCommand::Exit => {
                    println!("\n  {}", style("Goodbye.").dim());
                    break;
                }
                ChatCommand::New => {
                    match ctrl.start_new_episode().await {
                        Ok(()) => println!("\n  {} Fresh episode started.\n", style("*").cyan().bold()),
                        Err(e) => eprintln!("\n  {} {e}\n", style("!").red().bold()),
                    }
                }
                ChatCommand::End => {
                    match ctrl.end_episode().await {
                        Ok(()) => println!("\n  {} Episode ended.\n", style("*").cyan().bold()),
                        Err(e) => eprintln!("\n  {} {e}\n", style("!").red().bold()),
                    }
                }
                ChatCommand::History => print_history(ctrl.messages()),
                ChatCommand::Unknown(name) => println!(
                    "\n  {} Unknown command: {}. Type /help for available commands.\n",
                    style("?").yellow().bold(),
                    style(name).dim()
                ),
            }
            continue;
        }

        if ctrl.is_episode_complete() {
            println!(
                "\n  {} This episode is complete. Use {} to keep chatting.\n",
                style("*").magenta().bold(),
                style("/new").cyan()
            );
            continue;
        }

        events.arm(thinking_spinner());
        ctrl.send_message(&text).await;

        // No token ever arrived (content-only done, or a failure already
        // rendered by the handler): print the committed turn, if any.
        if events.disarm() {
            if let Some(msg) = ctrl
                .messages()
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::Assistant)
            {
                println!("\n  {} {}", style(">").cyan().bold(), msg.content);
            }
        }
        println!();

        if ctrl.suggest_scene() {
            println!(
                "  {}",
                style("(this moment could make a scene -- imagine it illustrated)").dim()
            );
            ctrl.clear_scene_suggestion();
        }

        if ctrl.is_episode_complete() {
            if let Some(suggestion) = ctrl.next_suggestion() {
                println!("  {} Next time: {}", style("*").magenta(), suggestion);
            }
            println!(
                "  {}",
                style("Use /new to start another episode.").dim()
            );
        }
    }

    Ok(())
}
