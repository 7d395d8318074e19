//! Wire types for the Gemini `generateContent` family of endpoints.

use serde::{Deserialize, Serialize};

use crate::types::{Message, Part as AppPart, Sender};

/// Author of a [`Content`] turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The model.
    Model,
}

/// Inline bytes sent to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    /// MIME type of the payload.
    pub mime_type: String,
    /// Base64-encoded payload.
    pub data: String,
}

/// One piece of request content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    /// Text.
    Text {
        /// The text.
        text: String,
    },
    /// Inline file data.
    InlineData {
        /// The payload.
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }
}

impl From<&AppPart> for Part {
    /// Drops the local display filename, which the provider does not accept.
    fn from(part: &AppPart) -> Self {
        match part {
            AppPart::Text { text } => Part::Text { text: text.clone() },
            AppPart::InlineData { inline_data } => Part::InlineData {
                inline_data: Blob {
                    mime_type: inline_data.mime_type.clone(),
                    data: inline_data.data.clone(),
                },
            },
        }
    }
}

/// A conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Content {
    /// Author; omitted for system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Ordered content.
    pub parts: Vec<Part>,
}

impl Content {
    /// A user turn.
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some(Role::User),
            parts,
        }
    }

    /// A model turn holding a single text part.
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Some(Role::Model),
            parts: vec![Part::text(text)],
        }
    }

    /// A role-less system instruction.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

impl From<&Message> for Content {
    fn from(message: &Message) -> Self {
        let role = match message.sender {
            Sender::User => Role::User,
            Sender::Ai => Role::Model,
        };
        Self {
            role: Some(role),
            parts: message.parts.iter().map(Part::from).collect(),
        }
    }
}

/// Controls the model's thinking phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    /// Token budget for thinking; zero disables it.
    pub thinking_budget: u32,
}

/// Generation parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Thinking configuration; the provider default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
}

impl GenerationConfig {
    /// A config that sets only the thinking budget.  `None` yields an empty config.
    pub fn with_thinking_budget(budget: Option<u32>) -> Self {
        Self {
            thinking_config: budget.map(|thinking_budget| ThinkingConfig { thinking_budget }),
        }
    }

    /// Returns true if no parameter is set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Body of a `generateContent` or `streamGenerateContent` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation so far, ending with the new user turn.
    pub contents: Vec<Content>,
    /// System instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Generation parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// A part of a response candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ResponsePart {
    /// Text, when this is a text part.
    #[serde(default)]
    pub text: Option<String>,
    /// Set on thought-summary parts.
    #[serde(default)]
    pub thought: Option<bool>,
}

/// Content of a response candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CandidateContent {
    /// Ordered parts.
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
    /// Author, normally `model`.
    #[serde(default)]
    pub role: Option<String>,
}

/// One response candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated content.
    #[serde(default)]
    pub content: Option<CandidateContent>,
    /// Why generation stopped, on the last chunk.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Tokens across candidates.
    #[serde(default)]
    pub candidates_token_count: u64,
    /// Tokens spent thinking.
    #[serde(default)]
    pub thoughts_token_count: u64,
    /// Total tokens billed.
    #[serde(default)]
    pub total_token_count: u64,
}

/// A full response, or one chunk of a streamed response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Candidates; streaming calls return one.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Token accounting, usually on the last chunk.
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    /// Model version that served the request.
    #[serde(default)]
    pub model_version: Option<String>,
}

impl GenerateContentResponse {
    /// The non-thought text of the first candidate.
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The body of a Gemini error response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    /// HTTP status code.
    #[serde(default)]
    pub code: Option<u16>,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Canonical status such as `INVALID_ARGUMENT`.
    #[serde(default)]
    pub status: Option<String>,
}

/// Envelope around [`ErrorDetail`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErrorResponse {
    /// The error.
    pub error: ErrorDetail,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_wire_format() {
        let request = GenerateContentRequest {
            contents: vec![Content::user(vec![Part::text("hi")])],
            system_instruction: Some(Content::system("be nice")),
            generation_config: Some(GenerationConfig::with_thinking_budget(Some(0))),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{"role": "user", "parts": [{"text": "hi"}]}],
                "systemInstruction": {"parts": [{"text": "be nice"}]},
                "generationConfig": {"thinkingConfig": {"thinkingBudget": 0}}
            })
        );
    }

    #[test]
    fn unset_thinking_budget_is_empty() {
        let config = GenerationConfig::with_thinking_budget(None);
        assert!(config.is_empty());
        assert_eq!(serde_json::to_value(&config).unwrap(), json!({}));
    }

    #[test]
    fn message_translation_drops_file_name() {
        let message = Message::user(vec![
            AppPart::text("look"),
            AppPart::inline_data("image/png", "AAAA", "cat.png"),
        ]);
        let content = Content::from(&message);
        assert_eq!(
            serde_json::to_value(&content).unwrap(),
            json!({
                "role": "user",
                "parts": [
                    {"text": "look"},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]
            })
        );
        let reply = Message::ai_text("ai", "hello");
        assert_eq!(Content::from(&reply).role, Some(Role::Model));
    }

    #[test]
    fn response_text_skips_thoughts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        {"text": "pondering", "thought": true},
                        {"text": "Hello"},
                        {"text": ", world"}
                    ]
                }
            }],
            "usageMetadata": {"promptTokenCount": 3, "totalTokenCount": 9}
        }))
        .unwrap();
        assert_eq!(response.text(), "Hello, world");
        assert_eq!(response.usage_metadata.unwrap().total_token_count, 9);
    }

    #[test]
    fn empty_response_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.text(), "");
    }
}
