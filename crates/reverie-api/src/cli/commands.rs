//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and provide in-chat controls for episode
//! lifecycle and help.

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Exit the chat loop.
    Exit,
    /// End the current episode and start a fresh one.
    New,
    /// End the current episode without starting another.
    End,
    /// Show the conversation so far.
    History,
    /// Unknown command.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    match trimmed.to_lowercase().as_str() {
        "/help" | "/h" | "/?" => Some(ChatCommand::Help),
        "/exit" | "/quit" | "/q" => Some(ChatCommand::Exit),
        "/new" => Some(ChatCommand::New),
        "/end" => Some(ChatCommand::End),
        "/history" => Some(ChatCommand::History),
        other => Some(ChatCommand::Unknown(other.to_string())),
    }
}

/// Print the help text listing all available commands.
pub fn print_help() {
    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    println!("  {}    {}", style("/help").cyan(), "Show this help message");
    println!("  {}     {}", style("/new").cyan(), "Start a new episode");
    println!("  {}     {}", style("/end").cyan(), "End the current episode");
    println!("  {} {}", style("/history").cyan(), "Show the conversation so far");
    println!("  {}    {}", style("/exit").cyan(), "Leave the chat");
    println!();
}
