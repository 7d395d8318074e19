//! The application controller and the state it renders from.

mod controller;
mod state;

pub use controller::{ChatController, EMPTY_REPLY_FALLBACK, NEW_CHAT_GREETING};
pub use state::{AppState, ChatSnapshot, Page, TurnState};
