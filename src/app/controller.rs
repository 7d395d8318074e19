use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;

use crate::attachment::{Attachment, MAX_FILES};
use crate::auth::{AuthService, validate_sign_in, validate_sign_up};
use crate::chat_api::ChatApiService;
use crate::conversation::{
    Conversation, ConversationConfig, ConversationFactory, DEFAULT_SYSTEM_INSTRUCTION,
};
use crate::error::{Error, Result};
use crate::gemini::API_KEY_ENV;
use crate::observability::{CHAT_TURN_DURATION, CHAT_TURN_ERRORS, CHAT_TURNS};
use crate::render::Renderer;
use crate::storage::LocalStorage;
use crate::transport::ApiClient;
use crate::types::{
    ChatSessionUpdate, Message, NewChatSession, Part, SupportedModel, User, default_title, new_id,
};
use crate::utils::time::now;

use super::state::{AppState, Page, TurnState};

/// Greeting inserted into a new chat when the server returns no messages.
pub const NEW_CHAT_GREETING: &str = "Hello! I'm Densé AI. How can I assist you today?";

/// Reply shown when the provider streams no text.
pub const EMPTY_REPLY_FALLBACK: &str = "I received that, but I don't have a further text response.";

/// Drives the application: auth, chat CRUD, and streaming replies.
///
/// Every mutating operation takes `&mut self`; one controller handles one
/// operation at a time.  Operations that fail also record a banner message in
/// [`AppState::chat_error`] or [`AppState::auth_error`].
///
/// ```
/// # use std::sync::Arc;
/// # use densechat::{ApiClient, ChatController, GeminiFactory, LocalStorage, MockTransport, Page};
/// # tokio_test::block_on(async {
/// let api = ApiClient::new(Arc::new(MockTransport::instant()), LocalStorage::in_memory());
/// let mut controller = ChatController::new(api, Arc::new(GeminiFactory::unconfigured()));
/// controller.initialize().await.unwrap();
/// assert_eq!(controller.state().page, Page::SignIn);
/// # });
/// ```
pub struct ChatController {
    auth: AuthService,
    chats: ChatApiService,
    storage: LocalStorage,
    factory: Arc<dyn ConversationFactory>,
    conversation: Option<Box<dyn Conversation>>,
    state: AppState,
}

impl ChatController {
    /// Creates a controller over `api`, building conversations with `factory`.
    pub fn new(api: ApiClient, factory: Arc<dyn ConversationFactory>) -> Self {
        Self {
            auth: AuthService::new(api.clone()),
            chats: ChatApiService::new(api.clone()),
            storage: api.storage().clone(),
            factory,
            conversation: None,
            state: AppState::default(),
        }
    }

    /// The current state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Returns true if a conversation is ready for the active chat.
    pub fn has_conversation(&self) -> bool {
        self.conversation.is_some()
    }

    /// Resolves the stored session and loads the user's chats.
    pub async fn initialize(&mut self) -> Result<()> {
        self.state.page = Page::Loading;
        self.state.is_auth_loading = true;
        let user = self.auth.current_user().await;
        self.state.is_auth_loading = false;
        match user {
            Some(user) => {
                tracing::info!(user_id = %user.id, "restored session");
                self.enter_chat(user);
                self.load_chat_data().await
            }
            None => {
                self.state.page = Page::SignIn;
                self.sync_conversation();
                Ok(())
            }
        }
    }

    /// Fetches the chat summaries and clears the loaded sessions.
    pub async fn load_chat_data(&mut self) -> Result<()> {
        if self.state.current_user.is_none() || self.state.page != Page::Chat {
            return Ok(());
        }
        self.state.is_loading = true;
        self.state.chat_error = None;
        let result = self.chats.fetch_summaries().await;
        self.state.is_loading = false;
        let result = match result {
            Ok(summaries) => {
                self.state.summaries = summaries;
                self.state.sessions.clear();
                self.state.active_chat_id = None;
                Ok(())
            }
            Err(err) => {
                let message = match err.user_message() {
                    "" => "Failed to load chat sessions.".to_string(),
                    message => message.to_string(),
                };
                tracing::error!(error = %err, "error loading chat sessions");
                self.state.chat_error = Some(message);
                Err(err)
            }
        };
        self.sync_conversation();
        result
    }

    /// Signs in and loads the user's chats.
    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<()> {
        if let Err(err) = validate_sign_in(email, password) {
            self.state.auth_error = Some(err.user_message().to_string());
            return Err(err);
        }
        self.state.is_auth_loading = true;
        self.state.auth_error = None;
        let outcome = self.auth.sign_in(email, password).await;
        self.state.is_auth_loading = false;
        match outcome.user {
            Some(user) if outcome.success => {
                self.enter_chat(user);
                self.load_chat_data().await
            }
            _ => {
                self.state.auth_error = Some(outcome.message.clone());
                Err(Error::authentication(outcome.message))
            }
        }
    }

    /// Registers an account and moves to the sign-in page.
    pub async fn sign_up(&mut self, name: &str, email: &str, password: &str) -> Result<()> {
        if let Err(err) = validate_sign_up(name, email, password) {
            self.state.auth_error = Some(err.user_message().to_string());
            return Err(err);
        }
        self.state.is_auth_loading = true;
        self.state.auth_error = None;
        let outcome = self.auth.sign_up(name, email, password).await;
        self.state.is_auth_loading = false;
        if outcome.success {
            self.state.page = Page::SignIn;
            Ok(())
        } else {
            self.state.auth_error = Some(outcome.message.clone());
            Err(Error::bad_request(outcome.message, None))
        }
    }

    /// Signs out and forgets every loaded chat.
    pub async fn sign_out(&mut self) {
        self.auth.sign_out().await;
        self.state.current_user = None;
        self.state.clear_chat_data();
        self.state.turn = None;
        self.state.is_loading = false;
        self.state.auth_error = None;
        self.state.chat_error = None;
        self.state.page = Page::SignIn;
        self.conversation = None;
    }

    /// Shows or hides the sidebar and remembers the choice for the user.
    pub fn toggle_sidebar(&mut self) {
        self.set_sidebar_open(!self.state.sidebar_open);
    }

    /// Switches to the sign-in page.
    pub fn navigate_to_sign_in(&mut self) {
        self.state.page = Page::SignIn;
        self.state.auth_error = None;
    }

    /// Switches to the sign-up page.
    pub fn navigate_to_sign_up(&mut self) {
        self.state.page = Page::SignUp;
        self.state.auth_error = None;
    }

    /// Creates a chat and makes it active.
    pub async fn new_chat(&mut self) -> Result<()> {
        if self.state.current_user.is_none() {
            return self.fail(Error::authentication(
                "Cannot create new chat: No user logged in.",
            ));
        }
        if !self.factory.is_configured() {
            return self.fail(Error::configuration(
                "Cannot create new chat: API key is not configured.",
            ));
        }
        self.state.is_loading = true;
        self.state.chat_error = None;
        let request = NewChatSession {
            title: Some(default_title(&now())),
            system_instruction: Some(DEFAULT_SYSTEM_INSTRUCTION.to_string()),
            selected_model: Some(SupportedModel::default()),
        };
        let result = self.chats.create(&request).await;
        self.state.is_loading = false;
        let mut session = match result {
            Ok(session) => session,
            Err(err) => {
                tracing::error!(error = %err, "error creating chat");
                return self.fail(err);
            }
        };
        if session.messages.is_empty() {
            session
                .messages
                .push(Message::ai_text("ai-init", NEW_CHAT_GREETING));
        }
        tracing::info!(chat_id = %session.id, "created chat");
        self.state.active_chat_id = Some(session.id.clone());
        self.state.insert_new_session(session);
        if !self.state.sidebar_open {
            self.set_sidebar_open(true);
        }
        self.sync_conversation();
        Ok(())
    }

    /// Makes `chat_id` active, fetching it if it is not loaded.
    pub async fn select_chat(&mut self, chat_id: &str) -> Result<()> {
        if self.state.current_user.is_none() || self.state.is_active_and_loaded(chat_id) {
            return Ok(());
        }
        self.state.chat_error = None;
        self.state.active_chat_id = Some(chat_id.to_string());
        if !self.state.sessions.contains_key(chat_id) {
            self.state.is_loading = true;
            let result = self.chats.fetch_by_id(chat_id).await;
            self.state.is_loading = false;
            match result {
                Ok(session) => {
                    self.state.sessions.insert(session.id.clone(), session);
                }
                Err(err) => {
                    tracing::error!(error = %err, chat_id, "error loading chat");
                    self.state.active_chat_id = None;
                    self.sync_conversation();
                    return self.fail(err);
                }
            }
        }
        self.sync_conversation();
        Ok(())
    }

    /// Deletes a chat.
    ///
    /// The chat disappears from the state at once and comes back if the server
    /// refuses.  Deleting the active chat selects the most recently updated one
    /// left.
    pub async fn delete_chat(&mut self, chat_id: &str) -> Result<()> {
        if self.state.current_user.is_none() {
            return Ok(());
        }
        let was_active = self.state.active_chat_id.as_deref() == Some(chat_id);
        let snapshot = self.state.remove_chat(chat_id);
        self.state.chat_error = None;
        match self.chats.delete(chat_id).await {
            Ok(_) => {
                tracing::info!(chat_id, "deleted chat");
                if was_active {
                    self.conversation = None;
                    if let Some(next) = self.state.summaries.first().map(|s| s.id.clone()) {
                        return self.select_chat(&next).await;
                    }
                }
                self.sync_conversation();
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, chat_id, "error deleting chat");
                self.state.restore(snapshot);
                self.sync_conversation();
                self.fail(err)
            }
        }
    }

    /// Sends a user turn to the active chat and streams the reply through
    /// `renderer`.
    ///
    /// The user message stays in the transcript whatever happens next.  The
    /// transcript is saved once the stream ends, even when it ends in error.
    pub async fn send_message(
        &mut self,
        text: &str,
        files: &[PathBuf],
        renderer: &mut dyn Renderer,
    ) -> Result<()> {
        let chat_id = self.check_can_send()?;
        if files.len() > MAX_FILES {
            return self.fail(Error::validation(
                format!("You can select up to {MAX_FILES} files."),
                Some("file".to_string()),
            ));
        }

        let mut file_parts = Vec::with_capacity(files.len());
        for path in files {
            match Attachment::from_path(path).await {
                Ok(attachment) => file_parts.push(attachment.into_part()),
                Err(err) => {
                    let err =
                        Error::io_message(format!("Error reading files: {}", err.user_message()));
                    self.record_turn_failure(&chat_id, &err, renderer);
                    return Err(err);
                }
            }
        }

        let mut parts = Vec::with_capacity(file_parts.len() + 1);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            parts.push(Part::text(trimmed));
        }
        parts.extend(file_parts);
        if parts.is_empty() {
            return self.fail(Error::validation("Cannot send an empty message.", None));
        }

        let started = std::time::Instant::now();
        CHAT_TURNS.click();
        let user_message = Message::user(parts.clone());
        let title = self
            .state
            .sessions
            .get(&chat_id)
            .map(|s| s.title_after_sending(&parts));
        if let Some(title) = title {
            self.state.rename_session(&chat_id, &title);
        }
        self.state.append_message(&chat_id, user_message.clone());
        renderer.print_message(&user_message);

        self.state.is_loading = true;
        self.state.chat_error = None;
        self.state.turn = Some(TurnState::AwaitingFirstChunk);
        renderer.start_reply();

        let streamed = self.stream_reply(&chat_id, parts, renderer).await;
        let mut failure = None;
        match streamed {
            Ok(true) => {}
            Ok(false) => {
                let fallback = Message::ai_text("ai", EMPTY_REPLY_FALLBACK);
                renderer.update_reply(&fallback);
                self.state.append_message(&chat_id, fallback);
            }
            Err(err) => {
                tracing::error!(error = %err, chat_id = %chat_id, "error streaming reply");
                failure = Some(err);
            }
        }
        renderer.finish_reply();
        if let Some(err) = &failure {
            self.record_turn_failure(&chat_id, err, renderer);
        }

        if let Err(err) = self.persist_session(&chat_id).await {
            tracing::error!(error = %err, chat_id = %chat_id, "error saving chat");
            self.record_turn_failure(&chat_id, &err, renderer);
            failure.get_or_insert(err);
        }

        self.state.is_loading = false;
        CHAT_TURN_DURATION.add(started.elapsed().as_secs_f64());
        let result = match failure {
            None => {
                self.state.turn = Some(TurnState::Settled);
                Ok(())
            }
            Some(err) => {
                CHAT_TURN_ERRORS.click();
                self.state.turn = Some(TurnState::SettledError);
                Err(err)
            }
        };
        self.sync_conversation();
        result
    }

    /// Switches the active chat to `model`.
    ///
    /// The change applies locally first and is reverted if it cannot be saved.
    pub async fn change_model(&mut self, model: SupportedModel) -> Result<()> {
        let Some(chat_id) = self.state.active_chat_id.clone() else {
            return Ok(());
        };
        let at = now();
        let previous = match self.state.sessions.get_mut(&chat_id) {
            Some(session) if session.selected_model != model => {
                let previous = session.selected_model;
                session.selected_model = model;
                previous
            }
            _ => return Ok(()),
        };
        self.state.touch_session(&chat_id, at);
        self.state.is_loading = true;
        self.state.chat_error = None;
        let update = ChatSessionUpdate {
            selected_model: Some(model),
            last_updated_at: Some(at),
            ..Default::default()
        };
        let result = self.chats.update(&chat_id, &update).await;
        self.state.is_loading = false;
        let result = match result {
            Ok(_) => {
                tracing::info!(chat_id = %chat_id, model = %model, "changed model");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, chat_id = %chat_id, "error changing model");
                if let Some(session) = self.state.sessions.get_mut(&chat_id) {
                    session.selected_model = previous;
                }
                let message = match err.user_message() {
                    "" => "Failed to update model selection.".to_string(),
                    message => message.to_string(),
                };
                self.state.chat_error = Some(message);
                Err(err)
            }
        };
        self.sync_conversation();
        result
    }

    fn enter_chat(&mut self, user: User) {
        self.state.sidebar_open = self.storage.load_sidebar_open_for_user(Some(&user.id));
        self.state.current_user = Some(user);
        self.state.auth_error = None;
        self.state.page = Page::Chat;
    }

    fn set_sidebar_open(&mut self, is_open: bool) {
        self.state.sidebar_open = is_open;
        let user_id = self.state.current_user.as_ref().map(|u| u.id.as_str());
        self.storage.save_sidebar_open_for_user(is_open, user_id);
    }

    fn check_can_send(&mut self) -> Result<String> {
        let checked = self.send_precondition();
        if let Err(err) = &checked {
            self.state.chat_error = Some(err.user_message().to_string());
        }
        checked
    }

    fn send_precondition(&self) -> Result<String> {
        if !self.factory.is_configured() {
            return Err(Error::configuration("Cannot send: API key missing."));
        }
        if self.state.current_user.is_none() {
            return Err(Error::authentication("Cannot send: No user."));
        }
        let Some(chat_id) = self.state.active_chat_id.clone() else {
            return Err(Error::validation("Cannot send: No active chat.", None));
        };
        if !self.state.sessions.contains_key(&chat_id) {
            return Err(Error::validation(
                "Cannot send: Chat session data missing.",
                None,
            ));
        }
        if self.conversation.is_none() {
            return Err(Error::configuration("Cannot send: Chat not initialized."));
        }
        Ok(chat_id)
    }

    /// Streams the reply into the chat.  Returns whether any text arrived.
    async fn stream_reply(
        &mut self,
        chat_id: &str,
        parts: Vec<Part>,
        renderer: &mut dyn Renderer,
    ) -> Result<bool> {
        let Some(conversation) = self.conversation.as_ref() else {
            return Err(Error::configuration("Cannot send: Chat not initialized."));
        };
        let mut stream = conversation.send_message_stream(parts).await?;
        let reply_id = new_id("ai");
        let mut accumulated = String::new();
        let mut received = false;
        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }
            accumulated.push_str(&fragment);
            received = true;
            self.state.turn = Some(TurnState::Streaming);
            if let Some(reply) = self
                .state
                .apply_fragment(chat_id, &reply_id, &accumulated, now())
            {
                renderer.update_reply(&reply);
            }
        }
        Ok(received)
    }

    async fn persist_session(&mut self, chat_id: &str) -> Result<()> {
        let Some(session) = self.state.sessions.get(chat_id) else {
            return Ok(());
        };
        let at = now();
        let update = ChatSessionUpdate {
            messages: Some(session.messages.clone()),
            title: Some(session.title.clone()),
            system_instruction: session.system_instruction.clone(),
            last_updated_at: Some(at),
            selected_model: Some(session.selected_model),
        };
        self.chats.update(chat_id, &update).await?;
        self.state.touch_session(chat_id, at);
        Ok(())
    }

    fn record_turn_failure(&mut self, chat_id: &str, err: &Error, renderer: &mut dyn Renderer) {
        let message = err.user_message().to_string();
        let reply = Message::ai_text("err", format!("Sorry, error: {message}"));
        renderer.print_message(&reply);
        self.state.append_message(chat_id, reply);
        self.state.chat_error = Some(message);
    }

    /// Rebuilds the conversation for the active chat, or drops it when there
    /// is none.
    fn sync_conversation(&mut self) {
        self.conversation = None;
        if self.state.current_user.is_none() {
            return;
        }
        if !self.factory.is_configured() {
            self.state.chat_error = Some(format!(
                "API key is not configured. Please set the {API_KEY_ENV} environment variable and restart."
            ));
            return;
        }
        let Some(session) = self.state.active_session() else {
            return;
        };
        let config = ConversationConfig::for_session(session);
        match self.factory.create(&config, &session.messages) {
            Ok(conversation) => self.conversation = Some(conversation),
            Err(err) => {
                tracing::error!(error = %err, "error initializing conversation");
                self.state.chat_error = Some(format!(
                    "Failed to initialize chat session: {}.",
                    err.user_message()
                ));
            }
        }
    }

    fn fail(&mut self, err: Error) -> Result<()> {
        self.state.chat_error = Some(err.user_message().to_string());
        Err(err)
    }
}
