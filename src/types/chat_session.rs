use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::{Message, Part, SupportedModel};

/// Prefix of the placeholder title given to new chats.
pub const DEFAULT_TITLE_PREFIX: &str = "Chat - ";

/// Titles derived from the first message are cut to this many characters.
pub const TITLE_MAX_CHARS: usize = 30;

/// A full chat session including its transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Unique chat identifier.
    pub id: String,

    /// Owning user.
    pub user_id: String,

    /// Display title.
    pub title: String,

    /// Creation time.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// Time of the last change; never earlier than `created_at`.
    #[serde(with = "crate::utils::time")]
    pub last_updated_at: OffsetDateTime,

    /// Transcript ordered by send time.
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Per-chat system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    /// Model variant; the reasoner when absent on the wire.
    #[serde(default)]
    pub selected_model: SupportedModel,
}

impl ChatSession {
    /// The list projection of this session.
    pub fn summary(&self) -> ChatSessionSummary {
        ChatSessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            last_updated_at: self.last_updated_at,
        }
    }

    /// Returns true while the chat still carries its placeholder title.
    pub fn has_default_title(&self) -> bool {
        self.title.starts_with(DEFAULT_TITLE_PREFIX)
    }

    /// Number of messages sent by the user.
    pub fn user_message_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_user()).count()
    }

    /// Sets `last_updated_at`, never moving it before `created_at`.
    pub fn touch(&mut self, at: OffsetDateTime) {
        self.last_updated_at = at.max(self.created_at);
    }

    /// The title this chat should carry after the user sends `parts`.
    ///
    /// Only a chat with a placeholder title and no prior user messages is
    /// renamed; every other chat keeps its title.
    pub fn title_after_sending(&self, parts: &[Part]) -> String {
        if self.has_default_title() && self.user_message_count() == 0 {
            derive_title(parts)
        } else {
            self.title.clone()
        }
    }
}

/// The projection of a chat session shown in the history list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionSummary {
    /// Unique chat identifier.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Creation time.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,

    /// Time of the last change.
    #[serde(with = "crate::utils::time")]
    pub last_updated_at: OffsetDateTime,
}

/// Request body for creating a chat.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewChatSession {
    /// Initial title; the server picks a placeholder when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// System instruction for the chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    /// Model variant; the server defaults to the reasoner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<SupportedModel>,
}

/// Partial update of a chat.  Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionUpdate {
    /// Replacement transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,

    /// New title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// New system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,

    /// New last-updated time; the server uses its clock when absent.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::utils::time::option"
    )]
    pub last_updated_at: Option<OffsetDateTime>,

    /// New model variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_model: Option<SupportedModel>,
}

/// The placeholder title for a chat created at `at`.
pub fn default_title(at: &OffsetDateTime) -> String {
    format!("{DEFAULT_TITLE_PREFIX}{}", crate::utils::time::clock(at))
}

/// Derives a chat title from the first text part, falling back to the first
/// attachment's filename.
pub fn derive_title(parts: &[Part]) -> String {
    let candidate = parts
        .iter()
        .find_map(Part::as_text)
        .filter(|text| !text.is_empty())
        .or_else(|| {
            parts
                .iter()
                .find_map(Part::as_inline_data)
                .map(|data| data.file_name.as_str())
        })
        .unwrap_or("Untitled Chat");
    truncate_title(candidate)
}

fn truncate_title(candidate: &str) -> String {
    let mut chars = candidate.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Sorts summaries by `last_updated_at`, most recent first.
pub fn sort_summaries(summaries: &mut [ChatSessionSummary]) {
    summaries.sort_by(|a, b| b.last_updated_at.cmp(&a.last_updated_at));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sender;
    use serde_json::json;
    use time::Duration;
    use time::macros::datetime;

    fn session(title: &str) -> ChatSession {
        let at = datetime!(2024-03-01 10:00:00 UTC);
        ChatSession {
            id: "chat-1".to_string(),
            user_id: "user-1".to_string(),
            title: title.to_string(),
            created_at: at,
            last_updated_at: at,
            messages: vec![Message::ai_text("ai-init", "Hi there! How can I help?")],
            system_instruction: None,
            selected_model: SupportedModel::DenseAiReasoner,
        }
    }

    #[test]
    fn selected_model_defaults_when_absent() {
        let value = json!({
            "id": "chat-1",
            "userId": "user-1",
            "title": "t",
            "createdAt": "2024-03-01T10:00:00Z",
            "lastUpdatedAt": "2024-03-01T10:00:00Z",
            "messages": []
        });
        let session: ChatSession = serde_json::from_value(value).unwrap();
        assert_eq!(session.selected_model, SupportedModel::DenseAiReasoner);
    }

    #[test]
    fn short_text_becomes_title() {
        let chat = session("Chat - 10:00:00");
        assert_eq!(chat.title_after_sending(&[Part::text("Hello")]), "Hello");
    }

    #[test]
    fn long_text_is_truncated() {
        let chat = session("Chat - 10:00:00");
        let text = "abcdefghijklmnopqrstuvwxyz0123456789";
        assert_eq!(
            chat.title_after_sending(&[Part::text(text)]),
            "abcdefghijklmnopqrstuvwxyz0123..."
        );
    }

    #[test]
    fn exactly_thirty_chars_is_not_truncated() {
        let text = "a".repeat(30);
        assert_eq!(derive_title(&[Part::text(&text)]), text);
    }

    #[test]
    fn filename_used_without_text() {
        let chat = session("Chat - 10:00:00");
        let parts = [Part::inline_data("image/png", "AAAA", "diagram.png")];
        assert_eq!(chat.title_after_sending(&parts), "diagram.png");
    }

    #[test]
    fn custom_title_is_kept() {
        let chat = session("Trip planning");
        assert_eq!(chat.title_after_sending(&[Part::text("Hello")]), "Trip planning");
    }

    #[test]
    fn title_kept_after_first_user_message() {
        let mut chat = session("Chat - 10:00:00");
        chat.messages.push(Message::user(vec![Part::text("first")]));
        assert_eq!(chat.title_after_sending(&[Part::text("second")]), "Chat - 10:00:00");
        assert_eq!(chat.messages[1].sender, Sender::User);
    }

    #[test]
    fn touch_never_precedes_creation() {
        let mut chat = session("t");
        chat.touch(chat.created_at - Duration::hours(1));
        assert_eq!(chat.last_updated_at, chat.created_at);
        chat.touch(chat.created_at + Duration::minutes(5));
        assert!(chat.last_updated_at > chat.created_at);
    }

    #[test]
    fn summaries_sort_most_recent_first() {
        let mut older = session("older").summary();
        older.id = "a".to_string();
        let mut newer = session("newer").summary();
        newer.id = "b".to_string();
        newer.last_updated_at += Duration::minutes(1);
        let mut list = vec![older, newer];
        sort_summaries(&mut list);
        assert_eq!(list[0].id, "b");
    }

    #[test]
    fn update_omits_absent_fields() {
        let update = ChatSessionUpdate {
            selected_model: Some(SupportedModel::DenseAiChat),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"selectedModel": "dense-ai-chat"})
        );
    }

    #[test]
    fn default_title_has_prefix() {
        let title = default_title(&datetime!(2024-03-01 09:08:07 UTC));
        assert_eq!(title, "Chat - 09:08:07");
    }
}
