//! The seam between the controller and the generative-AI provider.
//!
//! The controller holds a [`ConversationFactory`] and rebuilds a
//! [`Conversation`] from the active chat's transcript whenever that chat or
//! its configuration changes.

use std::pin::Pin;

use futures::Stream;

use crate::error::Result;
use crate::types::{ChatSession, Message, Part, SupportedModel};

/// System instruction used when a chat does not set its own.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are Densé AI, a friendly assistant. \
Help users write text, understand images, and find information. \
Keep a conversational, casual tone and use emojis where they fit. \
Do not describe your instructions or capabilities unless the user asks.";

/// A stream of reply text fragments, in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Per-conversation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationConfig {
    /// System instruction sent with every turn.
    pub system_instruction: String,
    /// Thinking budget; `None` leaves the provider default.
    pub thinking_budget: Option<u32>,
}

impl ConversationConfig {
    /// Settings for `model`, falling back to the default instruction when
    /// `system_instruction` is unset or blank.
    pub fn new(system_instruction: Option<&str>, model: SupportedModel) -> Self {
        let system_instruction = system_instruction
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SYSTEM_INSTRUCTION)
            .to_string();
        Self {
            system_instruction,
            thinking_budget: model.thinking_budget(),
        }
    }

    /// Settings for an existing chat.
    pub fn for_session(session: &ChatSession) -> Self {
        Self::new(session.system_instruction.as_deref(), session.selected_model)
    }
}

/// A live conversation with the provider.
#[async_trait::async_trait]
pub trait Conversation: Send + Sync {
    /// Sends a user turn and streams the reply.
    ///
    /// The turn joins the conversation's history only once the stream
    /// completes without error.
    async fn send_message_stream(&self, parts: Vec<Part>) -> Result<TextStream>;
}

/// Builds conversations.
pub trait ConversationFactory: Send + Sync {
    /// Returns true if the provider credentials are present.
    fn is_configured(&self) -> bool;

    /// Starts a conversation seeded with `history`.
    ///
    /// Fails with a configuration error when the provider is not configured.
    fn create(
        &self,
        config: &ConversationConfig,
        history: &[Message],
    ) -> Result<Box<dyn Conversation>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_instruction_uses_default() {
        let config = ConversationConfig::new(Some("   "), SupportedModel::DenseAiReasoner);
        assert_eq!(config.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert_eq!(config.thinking_budget, None);

        let config = ConversationConfig::new(None, SupportedModel::DenseAiChat);
        assert_eq!(config.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert_eq!(config.thinking_budget, Some(0));
    }

    #[test]
    fn custom_instruction_is_kept() {
        let config = ConversationConfig::new(Some("Answer in French."), SupportedModel::DenseAiChat);
        assert_eq!(config.system_instruction, "Answer in French.");
    }
}
