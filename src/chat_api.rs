//! Typed access to the chat-session routes.

use serde::Deserialize;

use crate::error::Result;
use crate::transport::{ApiClient, Method};
use crate::types::{ChatSession, ChatSessionSummary, ChatSessionUpdate, NewChatSession};

#[derive(Debug, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

/// Chat-session CRUD for the signed-in user.  Every call requires a token.
#[derive(Clone)]
pub struct ChatApiService {
    api: ApiClient,
}

impl ChatApiService {
    /// Creates a service over `api`.
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Summaries of the user's chats, most recently updated first.
    pub async fn fetch_summaries(&self) -> Result<Vec<ChatSessionSummary>> {
        self.api
            .request("/api/chats", Method::Get, None::<&()>, true)
            .await
    }

    /// A single chat with its transcript.
    pub async fn fetch_by_id(&self, chat_id: &str) -> Result<ChatSession> {
        self.api
            .request(&chat_path(chat_id), Method::Get, None::<&()>, true)
            .await
    }

    /// Creates a chat.
    pub async fn create(&self, request: &NewChatSession) -> Result<ChatSession> {
        self.api
            .request("/api/chats", Method::Post, Some(request), true)
            .await
    }

    /// Applies a partial update and returns the stored chat.
    pub async fn update(&self, chat_id: &str, update: &ChatSessionUpdate) -> Result<ChatSession> {
        self.api
            .request(&chat_path(chat_id), Method::Put, Some(update), true)
            .await
    }

    /// Deletes a chat, returning the server's confirmation.
    pub async fn delete(&self, chat_id: &str) -> Result<String> {
        let response: MessageResponse = self
            .api
            .request(&chat_path(chat_id), Method::Delete, None::<&()>, true)
            .await?;
        Ok(response.message)
    }
}

fn chat_path(chat_id: &str) -> String {
    format!("/api/chats/{chat_id}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::AuthService;
    use crate::storage::LocalStorage;
    use crate::transport::MockTransport;
    use crate::types::{Message, Part, SupportedModel};

    async fn signed_in() -> ChatApiService {
        let api = ApiClient::new(
            Arc::new(MockTransport::instant()),
            LocalStorage::in_memory(),
        );
        let auth = AuthService::new(api.clone());
        auth.sign_up("Ada", "ada@example.com", "password123").await;
        assert!(auth.sign_in("ada@example.com", "password123").await.success);
        ChatApiService::new(api)
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let chats = signed_in().await;
        assert!(chats.fetch_summaries().await.unwrap().is_empty());

        let created = chats
            .create(&NewChatSession {
                title: Some("Chat - 10:00:00".to_string()),
                system_instruction: Some("Be brief.".to_string()),
                selected_model: None,
            })
            .await
            .unwrap();
        assert_eq!(created.selected_model, SupportedModel::DenseAiReasoner);
        assert_eq!(created.system_instruction.as_deref(), Some("Be brief."));

        let mut messages = created.messages.clone();
        messages.push(Message::user(vec![Part::text("hello")]));
        let updated = chats
            .update(
                &created.id,
                &ChatSessionUpdate {
                    messages: Some(messages),
                    title: Some("hello".to_string()),
                    selected_model: Some(SupportedModel::DenseAiChat),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.messages.len(), 2);
        assert!(updated.last_updated_at >= created.created_at);

        let fetched = chats.fetch_by_id(&created.id).await.unwrap();
        assert_eq!(fetched, updated);

        assert_eq!(
            chats.delete(&created.id).await.unwrap(),
            "Chat deleted successfully."
        );
        assert!(chats.fetch_by_id(&created.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn requires_sign_in() {
        let api = ApiClient::new(
            Arc::new(MockTransport::instant()),
            LocalStorage::in_memory(),
        );
        let err = ChatApiService::new(api).fetch_summaries().await.unwrap_err();
        assert!(err.is_authentication());
    }
}
