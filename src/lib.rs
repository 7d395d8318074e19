// Public modules
pub mod app;
pub mod attachment;
pub mod auth;
pub mod chat;
pub mod chat_api;
pub mod conversation;
pub mod error;
pub mod gemini;
pub mod render;
pub mod storage;
pub mod transport;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use app::{AppState, ChatController, Page, TurnState};
pub use conversation::{Conversation, ConversationConfig, ConversationFactory, TextStream};
pub use error::{Error, Result};
pub use gemini::{Gemini, GeminiFactory};
pub use observability::register_biometrics;
pub use storage::LocalStorage;
pub use transport::{ApiClient, MockConfig, MockTransport};
pub use types::*;
