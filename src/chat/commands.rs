//! Slash command parsing for the chat application.
//!
//! Input starting with `/` controls the front end and is never sent to the
//! backend as a question.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Start a new, empty session.
    New,

    /// List stored sessions.
    History,

    /// Switch to a stored session.
    Open(String),

    /// Delete a stored session.
    Delete(String),

    /// Delete every stored session.
    ClearHistory,

    /// List the embedded documents.
    Documents,

    /// Start a new session scoped to a document.
    Document(String),

    /// Show the current session.
    Session,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.
///
/// # Examples
///
/// ```
/// # use ragchat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert_eq!(parse_command("/open 42"), Some(ChatCommand::Open("42".to_string())));
/// assert!(parse_command("What does chapter 3 say?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "new" => ChatCommand::New,
        "history" | "sessions" => ChatCommand::History,
        "open" => required(argument, ChatCommand::Open, "/open requires a session id"),
        "delete" => required(argument, ChatCommand::Delete, "/delete requires a session id"),
        "clear-history" => ChatCommand::ClearHistory,
        "documents" | "docs" => ChatCommand::Documents,
        "doc" => required(argument, ChatCommand::Document, "/doc requires a document name"),
        "session" => ChatCommand::Session,
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn required(
    argument: Option<&str>,
    constructor: impl Fn(String) -> ChatCommand,
    message: &str,
) -> ChatCommand {
    match argument {
        Some(arg) => constructor(arg.to_string()),
        None => ChatCommand::Invalid(message.to_string()),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new session
  /history               List saved sessions
  /open <id>             Switch to a saved session
  /delete <id>           Delete a saved session
  /clear-history         Delete every saved session
  /documents             List embedded documents
  /doc <name>            Start a session about a document
  /session               Show the current session
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while an answer streams to stop it."#
}
