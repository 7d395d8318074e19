use std::sync::{Arc, Mutex};

use super::accumulating_stream::AccumulatingStream;
use super::client::Gemini;
use super::types::{Content, GenerateContentRequest, GenerationConfig, Part};
use crate::conversation::{Conversation, ConversationConfig, ConversationFactory, TextStream};
use crate::error::{Error, Result};
use crate::types::{Message, Part as AppPart};

/// A multi-turn conversation that keeps its history client-side.
pub struct GeminiChat {
    client: Gemini,
    system_instruction: Content,
    generation_config: GenerationConfig,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiChat {
    /// Starts a conversation seeded with `history`.
    pub fn new(client: Gemini, config: &ConversationConfig, history: Vec<Content>) -> Self {
        Self {
            client,
            system_instruction: Content::system(config.system_instruction.clone()),
            generation_config: GenerationConfig::with_thinking_budget(config.thinking_budget),
            history: Arc::new(Mutex::new(history)),
        }
    }

    /// A snapshot of the recorded history.
    pub fn history(&self) -> Vec<Content> {
        match self.history.lock() {
            Ok(history) => history.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// The request that sending `user_turn` would produce.
    pub fn build_request(&self, user_turn: &Content) -> GenerateContentRequest {
        let mut contents = self.history();
        contents.push(user_turn.clone());
        GenerateContentRequest {
            contents,
            system_instruction: Some(self.system_instruction.clone()),
            generation_config: if self.generation_config.is_empty() {
                None
            } else {
                Some(self.generation_config.clone())
            },
        }
    }

    /// Sends a user turn and streams the reply text.
    pub async fn send_message_stream(&self, parts: Vec<Part>) -> Result<AccumulatingStream> {
        if parts.is_empty() {
            return Err(Error::validation("Cannot send an empty message.", None));
        }
        let user_turn = Content::user(parts);
        let request = self.build_request(&user_turn);
        let inner = self.client.stream_generate_content(&request).await?;
        Ok(AccumulatingStream::new(
            inner,
            Arc::clone(&self.history),
            user_turn,
        ))
    }
}

#[async_trait::async_trait]
impl Conversation for GeminiChat {
    async fn send_message_stream(&self, parts: Vec<AppPart>) -> Result<TextStream> {
        let parts = parts.iter().map(Part::from).collect();
        let stream = GeminiChat::send_message_stream(self, parts).await?;
        Ok(Box::pin(stream))
    }
}

/// Builds [`GeminiChat`] conversations.  Without a client every `create` fails.
#[derive(Debug, Clone, Default)]
pub struct GeminiFactory {
    client: Option<Gemini>,
}

impl GeminiFactory {
    /// A factory over `client`.
    pub fn new(client: Gemini) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// A factory with no credentials.
    pub fn unconfigured() -> Self {
        Self { client: None }
    }

    /// A factory keyed from `api_key` or the environment.  A missing key
    /// yields an unconfigured factory.
    pub fn from_key(api_key: Option<String>, model: Option<String>) -> Self {
        match Gemini::new(api_key) {
            Ok(client) => match model {
                Some(model) => Self::new(client.with_model(model)),
                None => Self::new(client),
            },
            Err(err) => {
                tracing::error!(error = %err, "Gemini API key is not configured");
                Self::unconfigured()
            }
        }
    }
}

impl ConversationFactory for GeminiFactory {
    fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    fn create(
        &self,
        config: &ConversationConfig,
        history: &[Message],
    ) -> Result<Box<dyn Conversation>> {
        let client = self.client.clone().ok_or_else(|| {
            Error::configuration("Gemini AI client is not initialized. API key might be missing.")
        })?;
        let history = history.iter().map(Content::from).collect();
        Ok(Box::new(GeminiChat::new(client, config, history)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::types::Role;
    use crate::types::SupportedModel;

    fn chat(model: SupportedModel, history: &[Message]) -> GeminiChat {
        let client = Gemini::new(Some("test-key".to_string())).unwrap();
        let config = ConversationConfig::new(None, model);
        GeminiChat::new(client, &config, history.iter().map(Content::from).collect())
    }

    #[test]
    fn request_includes_history_and_thinking() {
        let history = vec![
            Message::ai_text("ai", "Hello!"),
            Message::user(vec![AppPart::text("Hi")]),
        ];
        let chat = chat(SupportedModel::DenseAiChat, &history);
        let request = chat.build_request(&Content::user(vec![Part::text("Next")]));
        assert_eq!(request.contents.len(), 3);
        assert_eq!(request.contents[0].role, Some(Role::Model));
        assert_eq!(request.contents[2], Content::user(vec![Part::text("Next")]));
        assert_eq!(
            request
                .generation_config
                .and_then(|c| c.thinking_config)
                .map(|t| t.thinking_budget),
            Some(0)
        );
        assert!(request.system_instruction.is_some());
    }

    #[test]
    fn reasoner_omits_generation_config() {
        let chat = chat(SupportedModel::DenseAiReasoner, &[]);
        let request = chat.build_request(&Content::user(vec![Part::text("Hi")]));
        assert!(request.generation_config.is_none());
    }

    #[test]
    fn unconfigured_factory_fails() {
        let factory = GeminiFactory::unconfigured();
        assert!(!factory.is_configured());
        let config = ConversationConfig::new(None, SupportedModel::default());
        let err = factory.create(&config, &[]).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn configured_factory_builds_chat() {
        let factory = GeminiFactory::new(Gemini::new(Some("k".to_string())).unwrap());
        assert!(factory.is_configured());
        let config = ConversationConfig::new(None, SupportedModel::default());
        assert!(factory.create(&config, &[]).is_ok());
    }
}
