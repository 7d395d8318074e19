//! Tables behind the mock transport.

use std::collections::HashMap;

use rand::Rng;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::types::{
    ChatSession, ChatSessionSummary, ChatSessionUpdate, Message, NewChatSession, User,
    default_title, new_id, sort_summaries,
};

const TOKEN_LENGTH: usize = 64;
const SALT_LENGTH: usize = 16;
const TOKEN_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

pub(crate) const SERVER_GREETING: &str = "Hi there! How can I help?";
pub(crate) const CHAT_ACCESS_DENIED: &str = "Chat not found or access denied.";
pub(crate) const INVALID_TOKEN: &str = "Session expired or token is invalid. Please sign in again.";

struct UserRecord {
    user: User,
    salt: String,
    password_hash: String,
}

struct TokenRecord {
    user_id: String,
    expires_at: OffsetDateTime,
}

#[derive(Default)]
pub(crate) struct Database {
    users: Vec<UserRecord>,
    chats: HashMap<String, ChatSession>,
    user_chats: HashMap<String, Vec<String>>,
    tokens: HashMap<String, TokenRecord>,
}

impl Database {
    pub(crate) fn sign_up(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<User> {
        let email = email.to_lowercase();
        if self.find_by_email(&email).is_some() {
            return Err(Error::bad_request(
                "Email already exists.",
                Some("email".to_string()),
            ));
        }
        let salt = random_string(SALT_LENGTH);
        let password_hash = hash_password(&salt, password);
        let user = User {
            id: new_id("user"),
            name: name.to_string(),
            email,
            created_at: now,
        };
        self.user_chats.insert(user.id.clone(), Vec::new());
        self.users.push(UserRecord {
            user: user.clone(),
            salt,
            password_hash,
        });
        Ok(user)
    }

    /// Verifies credentials and issues a token valid for `ttl`.
    pub(crate) fn sign_in(
        &mut self,
        email: &str,
        password: &str,
        now: OffsetDateTime,
        ttl: time::Duration,
    ) -> Result<(User, String)> {
        let email = email.to_lowercase();
        let user = match self.find_by_email(&email) {
            Some(record) if hash_password(&record.salt, password) == record.password_hash => {
                record.user.clone()
            }
            _ => return Err(Error::authentication("Invalid email or password.")),
        };
        self.tokens.retain(|_, record| record.expires_at > now);
        let token = random_string(TOKEN_LENGTH);
        self.tokens.insert(
            token.clone(),
            TokenRecord {
                user_id: user.id.clone(),
                expires_at: now + ttl,
            },
        );
        Ok((user, token))
    }

    /// Resolves a token to its user id.  Expired tokens are dropped.
    pub(crate) fn resolve_token(&mut self, token: &str, now: OffsetDateTime) -> Result<String> {
        let Some(record) = self.tokens.get(token) else {
            return Err(Error::authentication(INVALID_TOKEN));
        };
        if record.expires_at <= now {
            self.tokens.remove(token);
            return Err(Error::authentication(INVALID_TOKEN));
        }
        if !self.users.iter().any(|r| r.user.id == record.user_id) {
            return Err(Error::authentication(INVALID_TOKEN));
        }
        Ok(record.user_id.clone())
    }

    pub(crate) fn revoke_token(&mut self, token: &str) {
        self.tokens.remove(token);
    }

    pub(crate) fn user(&self, user_id: &str) -> Result<User> {
        self.users
            .iter()
            .find(|r| r.user.id == user_id)
            .map(|r| r.user.clone())
            .ok_or_else(|| {
                Error::not_found(
                    "User not found for token.",
                    Some("user".to_string()),
                    Some(user_id.to_string()),
                )
            })
    }

    pub(crate) fn summaries(&self, user_id: &str) -> Vec<ChatSessionSummary> {
        let mut summaries: Vec<ChatSessionSummary> = self
            .user_chats
            .get(user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.chats.get(id))
            .map(ChatSession::summary)
            .collect();
        sort_summaries(&mut summaries);
        summaries
    }

    pub(crate) fn create_chat(
        &mut self,
        user_id: &str,
        request: NewChatSession,
        now: OffsetDateTime,
    ) -> ChatSession {
        let title = request
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title(&now));
        let mut greeting = Message::ai_text("ai-init", SERVER_GREETING);
        greeting.timestamp = now;
        let chat = ChatSession {
            id: new_id("chat"),
            user_id: user_id.to_string(),
            title,
            created_at: now,
            last_updated_at: now,
            messages: vec![greeting],
            system_instruction: request.system_instruction.filter(|s| !s.is_empty()),
            selected_model: request.selected_model.unwrap_or_default(),
        };
        self.chats.insert(chat.id.clone(), chat.clone());
        self.user_chats
            .entry(user_id.to_string())
            .or_default()
            .push(chat.id.clone());
        chat
    }

    pub(crate) fn chat(&self, user_id: &str, chat_id: &str) -> Result<&ChatSession> {
        match self.chats.get(chat_id) {
            Some(chat) if chat.user_id == user_id => Ok(chat),
            Some(_) => Err(Error::permission(CHAT_ACCESS_DENIED)),
            None => Err(Error::not_found(
                CHAT_ACCESS_DENIED,
                Some("chat".to_string()),
                Some(chat_id.to_string()),
            )),
        }
    }

    pub(crate) fn update_chat(
        &mut self,
        user_id: &str,
        chat_id: &str,
        update: ChatSessionUpdate,
        now: OffsetDateTime,
    ) -> Result<ChatSession> {
        self.chat(user_id, chat_id)?;
        if update.messages.iter().flatten().any(|m| m.parts.is_empty()) {
            return Err(Error::bad_request(
                "Messages must have at least one part.",
                Some("messages".to_string()),
            ));
        }
        let Some(chat) = self.chats.get_mut(chat_id) else {
            return Err(Error::not_found(CHAT_ACCESS_DENIED, None, None));
        };
        if let Some(title) = update.title {
            chat.title = title;
        }
        if let Some(messages) = update.messages {
            chat.messages = messages;
        }
        if let Some(system_instruction) = update.system_instruction {
            chat.system_instruction = Some(system_instruction);
        }
        if let Some(model) = update.selected_model {
            chat.selected_model = model;
        }
        chat.touch(update.last_updated_at.unwrap_or(now));
        Ok(chat.clone())
    }

    pub(crate) fn delete_chat(&mut self, user_id: &str, chat_id: &str) -> Result<()> {
        self.chat(user_id, chat_id)?;
        self.chats.remove(chat_id);
        if let Some(ids) = self.user_chats.get_mut(user_id) {
            ids.retain(|id| id != chat_id);
        }
        Ok(())
    }

    fn find_by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users
            .iter()
            .find(|r| r.user.email.eq_ignore_ascii_case(email))
    }
}

fn random_string(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..TOKEN_CHARSET.len());
            TOKEN_CHARSET[idx] as char
        })
        .collect()
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Part, SupportedModel};
    use time::macros::datetime;

    const T0: OffsetDateTime = datetime!(2024-05-01 12:00:00 UTC);
    const HOUR: time::Duration = time::Duration::hours(1);

    fn signed_up(db: &mut Database, email: &str) -> User {
        db.sign_up("Ada", email, "password123", T0).unwrap()
    }

    #[test]
    fn duplicate_email_is_case_insensitive() {
        let mut db = Database::default();
        let user = signed_up(&mut db, "Ada@Example.com");
        assert_eq!(user.email, "ada@example.com");
        let err = db
            .sign_up("Other", "ADA@example.COM", "password123", T0)
            .unwrap_err();
        assert_eq!(err.user_message(), "Email already exists.");
    }

    #[test]
    fn passwords_are_not_stored_in_clear() {
        let mut db = Database::default();
        signed_up(&mut db, "ada@example.com");
        let record = &db.users[0];
        assert_ne!(record.password_hash, "password123");
        assert_eq!(record.password_hash.len(), 64);
    }

    #[test]
    fn sign_in_checks_password() {
        let mut db = Database::default();
        signed_up(&mut db, "ada@example.com");
        let err = db
            .sign_in("ada@example.com", "wrong-password", T0, HOUR)
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password.");
        let err = db
            .sign_in("nobody@example.com", "password123", T0, HOUR)
            .unwrap_err();
        assert_eq!(err.user_message(), "Invalid email or password.");
    }

    #[test]
    fn tokens_are_opaque_and_expire() {
        let mut db = Database::default();
        let user = signed_up(&mut db, "ada@example.com");
        let (_, token) = db
            .sign_in("ADA@example.com", "password123", T0, HOUR)
            .unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(!token.contains(&user.id));
        assert_eq!(db.resolve_token(&token, T0).unwrap(), user.id);
        let err = db.resolve_token(&token, T0 + HOUR).unwrap_err();
        assert!(err.is_authentication());
        assert!(db.tokens.is_empty());
    }

    #[test]
    fn sign_in_prunes_expired_tokens() {
        let mut db = Database::default();
        let user = signed_up(&mut db, "ada@example.com");
        let (_, stale) = db
            .sign_in("ada@example.com", "password123", T0, HOUR)
            .unwrap();
        let (_, live) = db
            .sign_in("ada@example.com", "password123", T0 + HOUR, HOUR)
            .unwrap();
        assert_eq!(db.tokens.len(), 1);
        assert!(!db.tokens.contains_key(&stale));
        assert_eq!(db.resolve_token(&live, T0 + HOUR).unwrap(), user.id);
    }

    #[test]
    fn revoked_token_is_rejected() {
        let mut db = Database::default();
        signed_up(&mut db, "ada@example.com");
        let (_, token) = db
            .sign_in("ada@example.com", "password123", T0, HOUR)
            .unwrap();
        db.revoke_token(&token);
        assert_eq!(
            db.resolve_token(&token, T0).unwrap_err().user_message(),
            INVALID_TOKEN
        );
    }

    #[test]
    fn create_chat_defaults() {
        let mut db = Database::default();
        let user = signed_up(&mut db, "ada@example.com");
        let chat = db.create_chat(&user.id, NewChatSession::default(), T0);
        assert_eq!(chat.title, "Chat - 12:00:00");
        assert_eq!(chat.selected_model, SupportedModel::DenseAiReasoner);
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].parts, vec![Part::text(SERVER_GREETING)]);
        assert_eq!(db.summaries(&user.id).len(), 1);
    }

    #[test]
    fn summaries_are_scoped_and_sorted() {
        let mut db = Database::default();
        let ada = signed_up(&mut db, "ada@example.com");
        let bob = signed_up(&mut db, "bob@example.com");
        let older = db.create_chat(&ada.id, NewChatSession::default(), T0);
        let newer = db.create_chat(&ada.id, NewChatSession::default(), T0 + HOUR);
        db.create_chat(&bob.id, NewChatSession::default(), T0);
        let ids: Vec<_> = db.summaries(&ada.id).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[test]
    fn foreign_chat_is_denied_with_same_message() {
        let mut db = Database::default();
        let ada = signed_up(&mut db, "ada@example.com");
        let bob = signed_up(&mut db, "bob@example.com");
        let chat = db.create_chat(&ada.id, NewChatSession::default(), T0);
        let denied = db.chat(&bob.id, &chat.id).unwrap_err();
        assert!(denied.is_permission());
        let missing = db.chat(&ada.id, "chat-missing").unwrap_err();
        assert!(missing.is_not_found());
        assert_eq!(denied.user_message(), missing.user_message());
        assert!(db.delete_chat(&bob.id, &chat.id).is_err());
        assert!(db.chat(&ada.id, &chat.id).is_ok());
    }

    #[test]
    fn update_is_partial() {
        let mut db = Database::default();
        let ada = signed_up(&mut db, "ada@example.com");
        let chat = db.create_chat(
            &ada.id,
            NewChatSession {
                selected_model: Some(SupportedModel::DenseAiChat),
                ..Default::default()
            },
            T0,
        );
        let later = T0 + time::Duration::minutes(5);
        let updated = db
            .update_chat(
                &ada.id,
                &chat.id,
                ChatSessionUpdate {
                    title: Some("Renamed".to_string()),
                    ..Default::default()
                },
                later,
            )
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.selected_model, SupportedModel::DenseAiChat);
        assert_eq!(updated.messages, chat.messages);
        assert_eq!(updated.last_updated_at, later);
    }

    #[test]
    fn update_rejects_messages_without_parts() {
        let mut db = Database::default();
        let ada = signed_up(&mut db, "ada@example.com");
        let chat = db.create_chat(&ada.id, NewChatSession::default(), T0);
        let mut empty = Message::user(Vec::new());
        empty.timestamp = T0;
        let err = db
            .update_chat(
                &ada.id,
                &chat.id,
                ChatSessionUpdate {
                    title: Some("Renamed".to_string()),
                    messages: Some(vec![chat.messages[0].clone(), empty]),
                    ..Default::default()
                },
                T0 + HOUR,
            )
            .unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
        assert_eq!(err.user_message(), "Messages must have at least one part.");
        assert_eq!(db.chat(&ada.id, &chat.id).unwrap(), &chat);
    }

    #[test]
    fn delete_removes_from_index() {
        let mut db = Database::default();
        let ada = signed_up(&mut db, "ada@example.com");
        let chat = db.create_chat(&ada.id, NewChatSession::default(), T0);
        db.delete_chat(&ada.id, &chat.id).unwrap();
        assert!(db.summaries(&ada.id).is_empty());
        assert!(db.chat(&ada.id, &chat.id).unwrap_err().is_not_found());
    }
}
