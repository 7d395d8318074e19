//! Domain types shared by the transport, the services, and the controller.

pub mod chat_session;
pub mod message;
pub mod model;
pub mod user;

pub use chat_session::{
    ChatSession, ChatSessionSummary, ChatSessionUpdate, DEFAULT_TITLE_PREFIX, NewChatSession,
    TITLE_MAX_CHARS, default_title, derive_title, sort_summaries,
};
pub use message::{InlineData, Message, Part, Sender, new_id};
pub use model::SupportedModel;
pub use user::User;
