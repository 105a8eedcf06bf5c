//! Interactive chat front end.
//!
//! This module provides the pieces of the `ragchat-chat` REPL that are worth
//! testing on their own:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer, StreamPrinter};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{API_URL_ENV, ChatArgs, ChatConfig, DATA_DIR_ENV, StoreKind, TOKEN_ENV};
