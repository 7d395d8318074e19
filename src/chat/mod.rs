//! Terminal front end for the chat application.
//!
//! The binary reads lines with `rustyline`, treats `/`-prefixed lines as
//! commands and everything else as a message to the active chat.
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`commands`]: Slash command parsing

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, ChatRef, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig};
