use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The signed-in user.
    User,

    /// The assistant.
    Ai,
}

/// Inline file data attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the payload.
    pub mime_type: String,

    /// Base64-encoded payload.
    pub data: String,

    /// Display filename; local only, never sent to the provider.
    pub file_name: String,
}

/// One piece of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Part {
    /// A text fragment.
    Text {
        /// The text.
        text: String,
    },

    /// An inline file.
    InlineData {
        /// The file payload.
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    /// Create an inline-data part.
    pub fn inline_data(
        mime_type: impl Into<String>,
        data: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
                file_name: file_name.into(),
            },
        }
    }

    /// The text of a text part.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }

    /// The payload of an inline-data part.
    pub fn as_inline_data(&self) -> Option<&InlineData> {
        match self {
            Part::Text { .. } => None,
            Part::InlineData { inline_data } => Some(inline_data),
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Unique message identifier.
    pub id: String,

    /// The author.
    pub sender: Sender,

    /// Ordered content.
    pub parts: Vec<Part>,

    /// When the message was sent, or last updated while streaming.
    #[serde(with = "crate::utils::time")]
    pub timestamp: OffsetDateTime,
}

impl Message {
    /// Create a message with a fresh id of the form `{prefix}-{uuid}`.
    pub fn new(prefix: &str, sender: Sender, parts: Vec<Part>) -> Self {
        Self {
            id: new_id(prefix),
            sender,
            parts,
            timestamp: crate::utils::time::now(),
        }
    }

    /// Create a user message.
    pub fn user(parts: Vec<Part>) -> Self {
        Self::new("user", Sender::User, parts)
    }

    /// Create an assistant message with a single text part.
    pub fn ai_text(prefix: &str, text: impl Into<String>) -> Self {
        Self::new(prefix, Sender::Ai, vec![Part::text(text)])
    }

    /// Returns true if the message was authored by the user.
    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }

    /// All text parts joined together.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(Part::as_text).collect()
    }

    /// The first text part, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(Part::as_text)
    }

    /// The display filename of the first attachment, if any.
    pub fn first_file_name(&self) -> Option<&str> {
        self.parts
            .iter()
            .find_map(Part::as_inline_data)
            .map(|data| data.file_name.as_str())
    }
}

/// Generates an identifier of the form `{prefix}-{uuid}`.
pub fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn text_part_wire_format() {
        assert_eq!(to_value(Part::text("hi")).unwrap(), json!({"text": "hi"}));
    }

    #[test]
    fn inline_part_wire_format() {
        let part = Part::inline_data("image/png", "AAAA", "cat.png");
        assert_eq!(
            to_value(&part).unwrap(),
            json!({"inlineData": {"mimeType": "image/png", "data": "AAAA", "fileName": "cat.png"}})
        );
        let back: Part = serde_json::from_value(to_value(&part).unwrap()).unwrap();
        assert_eq!(back, part);
    }

    #[test]
    fn sender_is_lowercase() {
        assert_eq!(to_value(Sender::Ai).unwrap(), json!("ai"));
        assert_eq!(to_value(Sender::User).unwrap(), json!("user"));
    }

    #[test]
    fn message_helpers() {
        let message = Message::user(vec![
            Part::inline_data("text/plain", "aGk=", "notes.txt"),
            Part::text("hello"),
        ]);
        assert!(message.id.starts_with("user-"));
        assert!(message.is_user());
        assert_eq!(message.first_text(), Some("hello"));
        assert_eq!(message.first_file_name(), Some("notes.txt"));
        assert_eq!(message.text(), "hello");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_id("chat"), new_id("chat"));
    }
}
