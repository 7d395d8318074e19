//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` control the session; every other line is sent to
//! the active chat as a message.

use crate::types::{ChatSessionSummary, SupportedModel};

/// A reference to a chat: its 1-based position in `/chats` or its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatRef {
    /// Position in the history list, starting at 1.
    Index(usize),
    /// Chat id.
    Id(String),
}

impl ChatRef {
    /// Resolves the reference against the history list.
    pub fn resolve<'a>(&'a self, summaries: &'a [ChatSessionSummary]) -> Option<&'a str> {
        match self {
            ChatRef::Index(n) => n
                .checked_sub(1)
                .and_then(|i| summaries.get(i))
                .map(|s| s.id.as_str()),
            ChatRef::Id(id) => summaries
                .iter()
                .find(|s| s.id == *id)
                .map(|s| s.id.as_str())
                .or(Some(id.as_str())),
        }
    }

    fn parse(argument: &str) -> Self {
        match argument.parse::<usize>() {
            Ok(n) => ChatRef::Index(n),
            Err(_) => ChatRef::Id(argument.to_string()),
        }
    }
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Create an account; the password is prompted for.
    SignUp {
        /// Display name.
        name: String,
        /// Email address.
        email: String,
    },

    /// Sign in; the password is prompted for.
    SignIn(String),

    /// Sign out.
    SignOut,

    /// Show the signed-in user.
    WhoAmI,

    /// Start a new chat.
    New,

    /// List chats.
    Chats,

    /// Switch to a chat.
    Select(ChatRef),

    /// Delete a chat.
    Delete(ChatRef),

    /// Change the active chat's model.
    Model(SupportedModel),

    /// Stage a file for the next message.
    Attach(String),

    /// Drop staged files.
    Detach,

    /// Toggle the sidebar preference.
    Sidebar,

    /// Reprint the active chat.
    History,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

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
/// # use densechat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/model chat").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "signup" => parse_sign_up(argument),
        "signin" | "login" => match argument {
            Some(email) => ChatCommand::SignIn(email.to_string()),
            None => ChatCommand::Invalid("/signin requires an email".to_string()),
        },
        "signout" | "logout" => ChatCommand::SignOut,
        "whoami" => ChatCommand::WhoAmI,
        "new" => ChatCommand::New,
        "chats" | "list" => ChatCommand::Chats,
        "select" => match argument {
            Some(arg) => ChatCommand::Select(ChatRef::parse(arg)),
            None => ChatCommand::Invalid("/select requires a chat number or id".to_string()),
        },
        "delete" => match argument {
            Some(arg) => ChatCommand::Delete(ChatRef::parse(arg)),
            None => ChatCommand::Invalid("/delete requires a chat number or id".to_string()),
        },
        "model" => match argument.map(str::parse::<SupportedModel>) {
            Some(Ok(model)) => ChatCommand::Model(model),
            Some(Err(err)) => ChatCommand::Invalid(format!("/model {err}")),
            None => ChatCommand::Invalid("/model requires 'reasoner' or 'chat'".to_string()),
        },
        "attach" => match argument {
            Some(path) => ChatCommand::Attach(path.to_string()),
            None => ChatCommand::Invalid("/attach requires a file path".to_string()),
        },
        "detach" => ChatCommand::Detach,
        "sidebar" => ChatCommand::Sidebar,
        "history" => ChatCommand::History,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_sign_up(argument: Option<&str>) -> ChatCommand {
    let usage = || ChatCommand::Invalid("/signup requires <name> <email>".to_string());
    let Some(arg) = argument else {
        return usage();
    };
    // The email is the last word; everything before it is the name.
    match arg.rsplit_once(' ') {
        Some((name, email)) if !name.trim().is_empty() => ChatCommand::SignUp {
            name: name.trim().to_string(),
            email: email.to_string(),
        },
        _ => usage(),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /signup <name> <email> Create an account (password is prompted)
  /signin <email>        Sign in (password is prompted)
  /signout               Sign out
  /whoami                Show the signed-in user
  /new                   Start a new chat
  /chats                 List your chats, most recent first
  /select <n|id>         Switch to a chat
  /delete <n|id>         Delete a chat
  /model reasoner|chat   Change the active chat's model
  /attach <path>         Attach a file to the next message
  /detach                Drop attached files
  /sidebar               Toggle the chat list after each change
  /history               Show the active chat
  /help                  Show this help message
  /quit                  Exit the chat"#
}
