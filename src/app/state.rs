use std::collections::HashMap;

use time::OffsetDateTime;

use crate::types::{ChatSession, ChatSessionSummary, Message, Part, Sender, User, sort_summaries};

/// Which screen the application shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    /// Resolving the stored session.
    Loading,
    /// The sign-in form.
    SignIn,
    /// The sign-up form.
    SignUp,
    /// The chat view.
    Chat,
}

/// Progress of the assistant reply to the most recent send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Sent; nothing received yet.
    AwaitingFirstChunk,
    /// At least one fragment received.
    Streaming,
    /// Finished without error.
    Settled,
    /// Finished with an error.
    SettledError,
}

/// The chat collections as they were before an optimistic change.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatSnapshot {
    summaries: Vec<ChatSessionSummary>,
    sessions: HashMap<String, ChatSession>,
    active_chat_id: Option<String>,
}

/// Everything the interface renders.
///
/// Mutated only by the controller, through the operations below.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Current screen.
    pub page: Page,
    /// The signed-in user.
    pub current_user: Option<User>,
    /// Fully loaded sessions by id.
    pub sessions: HashMap<String, ChatSession>,
    /// Every chat of the user, most recently updated first.
    pub summaries: Vec<ChatSessionSummary>,
    /// The selected chat.
    pub active_chat_id: Option<String>,
    /// Whether the history sidebar is shown.
    pub sidebar_open: bool,
    /// A chat operation or reply is in flight.
    pub is_loading: bool,
    /// An auth operation is in flight.
    pub is_auth_loading: bool,
    /// State of the latest reply.
    pub turn: Option<TurnState>,
    /// Banner on the auth pages.
    pub auth_error: Option<String>,
    /// Banner on the chat page.
    pub chat_error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            page: Page::Loading,
            current_user: None,
            sessions: HashMap::new(),
            summaries: Vec::new(),
            active_chat_id: None,
            sidebar_open: true,
            is_loading: false,
            is_auth_loading: false,
            turn: None,
            auth_error: None,
            chat_error: None,
        }
    }
}

impl AppState {
    /// The selected chat, if it is loaded.
    pub fn active_session(&self) -> Option<&ChatSession> {
        self.active_chat_id
            .as_deref()
            .and_then(|id| self.sessions.get(id))
    }

    /// Messages of the selected chat.
    pub fn active_messages(&self) -> &[Message] {
        self.active_session()
            .map(|session| session.messages.as_slice())
            .unwrap_or_default()
    }

    /// Returns true while waiting for the first fragment of a reply.
    pub fn is_awaiting_reply(&self) -> bool {
        self.turn == Some(TurnState::AwaitingFirstChunk)
    }

    /// Returns true if `chat_id` is the selected chat and is loaded.
    pub fn is_active_and_loaded(&self, chat_id: &str) -> bool {
        self.active_chat_id.as_deref() == Some(chat_id) && self.sessions.contains_key(chat_id)
    }

    /// Adds a newly created chat to both collections.
    pub fn insert_new_session(&mut self, session: ChatSession) {
        self.summaries.retain(|s| s.id != session.id);
        self.summaries.push(session.summary());
        sort_summaries(&mut self.summaries);
        self.sessions.insert(session.id.clone(), session);
    }

    /// Copies a loaded chat's title and timestamp into its summary and
    /// restores the ordering.
    fn sync_summary(&mut self, chat_id: &str) {
        let Some(session) = self.sessions.get(chat_id) else {
            return;
        };
        let (title, at) = (session.title.clone(), session.last_updated_at);
        if let Some(summary) = self.summaries.iter_mut().find(|s| s.id == chat_id) {
            summary.title = title;
            summary.last_updated_at = at;
        }
        sort_summaries(&mut self.summaries);
    }

    /// Renames a loaded chat, keeping its summary in step.
    pub fn rename_session(&mut self, chat_id: &str, title: &str) {
        if let Some(session) = self.sessions.get_mut(chat_id) {
            session.title = title.to_string();
        }
        self.sync_summary(chat_id);
    }

    /// Moves a loaded chat's `last_updated_at` to `at`, keeping its summary
    /// in step.
    pub fn touch_session(&mut self, chat_id: &str, at: OffsetDateTime) {
        if let Some(session) = self.sessions.get_mut(chat_id) {
            session.touch(at);
        }
        self.sync_summary(chat_id);
    }

    /// Appends a message to a loaded chat.
    pub fn append_message(&mut self, chat_id: &str, message: Message) {
        let at = message.timestamp;
        if let Some(session) = self.sessions.get_mut(chat_id) {
            session.messages.push(message);
        }
        self.touch_session(chat_id, at);
    }

    /// Writes the accumulated reply into the chat.
    ///
    /// The first call appends an AI message with id `reply_id`; later calls
    /// replace that message's text with `accumulated`.  Returns the message as
    /// it now stands.
    pub fn apply_fragment(
        &mut self,
        chat_id: &str,
        reply_id: &str,
        accumulated: &str,
        at: OffsetDateTime,
    ) -> Option<Message> {
        let session = self.sessions.get_mut(chat_id)?;
        match session.messages.last_mut() {
            Some(last) if last.id == reply_id => {
                last.parts = vec![Part::text(accumulated)];
                last.timestamp = at;
            }
            _ => session.messages.push(Message {
                id: reply_id.to_string(),
                sender: Sender::Ai,
                parts: vec![Part::text(accumulated)],
                timestamp: at,
            }),
        }
        let reply = session.messages.last().cloned();
        self.touch_session(chat_id, at);
        reply
    }

    /// Removes a chat from both collections, deselecting it if active.
    ///
    /// Returns the prior state for [`AppState::restore`].
    pub fn remove_chat(&mut self, chat_id: &str) -> ChatSnapshot {
        let snapshot = ChatSnapshot {
            summaries: self.summaries.clone(),
            sessions: self.sessions.clone(),
            active_chat_id: self.active_chat_id.clone(),
        };
        self.summaries.retain(|s| s.id != chat_id);
        self.sessions.remove(chat_id);
        if self.active_chat_id.as_deref() == Some(chat_id) {
            self.active_chat_id = None;
        }
        snapshot
    }

    /// Puts back the collections captured by [`AppState::remove_chat`].
    pub fn restore(&mut self, snapshot: ChatSnapshot) {
        self.summaries = snapshot.summaries;
        self.sessions = snapshot.sessions;
        self.active_chat_id = snapshot.active_chat_id;
    }

    /// Drops every loaded chat and the selection.
    pub fn clear_chat_data(&mut self) {
        self.sessions.clear();
        self.summaries.clear();
        self.active_chat_id = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-06-01 08:00:00 UTC);

    fn session(id: &str, at: OffsetDateTime) -> ChatSession {
        ChatSession {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            title: format!("Chat {id}"),
            created_at: at,
            last_updated_at: at,
            messages: Vec::new(),
            system_instruction: None,
            selected_model: Default::default(),
        }
    }

    #[test]
    fn summaries_stay_sorted() {
        let mut state = AppState::default();
        state.insert_new_session(session("a", T0));
        state.insert_new_session(session("b", T0 + Duration::minutes(1)));
        assert_eq!(state.summaries[0].id, "b");
        state.rename_session("a", "Renamed");
        state.touch_session("a", T0 + Duration::minutes(2));
        assert_eq!(state.summaries[0].id, "a");
        assert_eq!(state.summaries[0], state.sessions["a"].summary());
    }

    #[test]
    fn every_mutation_keeps_the_summary_in_step() {
        let mut state = AppState::default();
        state.insert_new_session(session("a", T0));
        let later = T0 + Duration::seconds(5);

        let mut message = Message::ai_text("ai", "hi");
        message.timestamp = later;
        state.append_message("a", message);
        assert_eq!(state.summaries[0], state.sessions["a"].summary());

        state.apply_fragment("a", "ai-2", "partial", later + Duration::seconds(1));
        assert_eq!(state.summaries[0], state.sessions["a"].summary());
        assert_eq!(state.summaries[0].last_updated_at, later + Duration::seconds(1));
    }

    #[test]
    fn fragments_accumulate_into_one_message() {
        let mut state = AppState::default();
        state.insert_new_session(session("a", T0));
        let first = state.apply_fragment("a", "ai-1", "Hel", T0).unwrap();
        assert_eq!(first.text(), "Hel");
        let later = T0 + Duration::seconds(1);
        let second = state.apply_fragment("a", "ai-1", "Hello", later).unwrap();
        assert_eq!(second.text(), "Hello");
        assert_eq!(second.timestamp, later);
        let session = &state.sessions["a"];
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.last_updated_at, later);
    }

    #[test]
    fn fragment_for_unloaded_chat_is_ignored() {
        let mut state = AppState::default();
        assert!(state.apply_fragment("missing", "ai-1", "x", T0).is_none());
    }

    #[test]
    fn remove_and_restore() {
        let mut state = AppState::default();
        state.insert_new_session(session("a", T0));
        state.insert_new_session(session("b", T0));
        state.active_chat_id = Some("a".to_string());
        let before = state.clone();

        let snapshot = state.remove_chat("a");
        assert!(state.active_chat_id.is_none());
        assert!(!state.sessions.contains_key("a"));
        assert!(state.summaries.iter().all(|s| s.id != "a"));

        state.restore(snapshot);
        assert_eq!(state, before);
    }

    #[test]
    fn active_messages_default_to_empty() {
        let mut state = AppState::default();
        assert!(state.active_messages().is_empty());
        state.active_chat_id = Some("ghost".to_string());
        assert!(state.active_session().is_none());
        assert!(!state.is_active_and_loaded("ghost"));
    }
}
