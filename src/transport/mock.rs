use std::sync::Mutex;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::database::Database;
use super::{ApiRequest, Method, Transport};
use crate::error::{Error, Result};
use crate::observability::{MOCK_REQUEST_ERRORS, MOCK_REQUESTS, MOCK_TOKENS_ISSUED};
use crate::types::{ChatSessionUpdate, NewChatSession};

/// Tunables for [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockConfig {
    /// Lower bound of the simulated network latency.
    pub latency_min: Duration,
    /// Upper bound of the simulated network latency.
    pub latency_max: Duration,
    /// Lifetime of issued tokens.
    pub token_ttl: time::Duration,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_min: Duration::from_millis(200),
            latency_max: Duration::from_millis(700),
            token_ttl: time::Duration::hours(1),
        }
    }
}

impl MockConfig {
    /// A configuration with no simulated latency.
    pub fn instant() -> Self {
        Self {
            latency_min: Duration::ZERO,
            latency_max: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Use a fixed latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency_min = latency;
        self.latency_max = latency;
        self
    }

    /// Set the token lifetime.
    pub fn with_token_ttl(mut self, ttl: time::Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn latency(&self) -> Duration {
        if self.latency_max <= self.latency_min {
            return self.latency_min;
        }
        rand::thread_rng().gen_range(self.latency_min..=self.latency_max)
    }
}

/// An in-process stand-in for the chat backend.
///
/// All state lives in memory and is lost when the transport is dropped.
///
/// ```
/// # use std::sync::Arc;
/// # use densechat::{ApiClient, LocalStorage, MockTransport};
/// # use densechat::transport::Method;
/// # tokio_test::block_on(async {
/// let api = ApiClient::new(Arc::new(MockTransport::instant()), LocalStorage::in_memory());
/// let err = api
///     .request::<serde_json::Value, ()>("/api/chats", Method::Get, None, true)
///     .await
///     .unwrap_err();
/// assert!(err.is_authentication());
/// # });
/// ```
pub struct MockTransport {
    config: MockConfig,
    database: Mutex<Database>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new(MockConfig::default())
    }
}

impl MockTransport {
    /// Creates an empty backend.
    pub fn new(config: MockConfig) -> Self {
        Self {
            config,
            database: Mutex::new(Database::default()),
        }
    }

    /// Creates an empty backend that answers immediately.
    pub fn instant() -> Self {
        Self::new(MockConfig::instant())
    }

    /// The active configuration.
    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    fn dispatch(&self, request: ApiRequest) -> Result<Value> {
        let route = Route::parse(request.method, &request.endpoint).ok_or_else(|| {
            Error::not_found(
                format!(
                    "Endpoint {} {} not found or method not allowed.",
                    request.method, request.endpoint
                ),
                Some("endpoint".to_string()),
                Some(request.endpoint.clone()),
            )
        })?;
        let now = crate::utils::time::now();
        let mut db = self
            .database
            .lock()
            .map_err(|_| Error::internal_server("mock database lock poisoned"))?;

        let user_id = if route.requires_auth() {
            let token = request.token.as_deref().ok_or_else(|| {
                Error::authentication("Authentication token is missing. Please sign in.")
            })?;
            Some(db.resolve_token(token, now)?)
        } else {
            None
        };
        let user_id = user_id.as_deref().unwrap_or_default();

        match route {
            Route::SignUp => {
                let body: SignUpBody = parse_body(request.body)?;
                let user = db.sign_up(&body.name, &body.email, &body.password, now)?;
                Ok(json!({"user": user, "message": "Signup successful. Please sign in."}))
            }
            Route::SignIn => {
                let body: SignInBody = parse_body(request.body)?;
                let (user, token) =
                    db.sign_in(&body.email, &body.password, now, self.config.token_ttl)?;
                MOCK_TOKENS_ISSUED.click();
                Ok(json!({"user": user, "token": token, "message": "Sign in successful!"}))
            }
            Route::SignOut => {
                if let Some(token) = request.token.as_deref() {
                    db.revoke_token(token);
                }
                Ok(json!({"message": "Signed out successfully."}))
            }
            Route::Me => Ok(json!({"user": db.user(user_id)?})),
            Route::ListChats => Ok(serde_json::to_value(db.summaries(user_id))?),
            Route::CreateChat => {
                let body: NewChatSession = match request.body {
                    Some(_) => parse_body(request.body)?,
                    None => NewChatSession::default(),
                };
                Ok(serde_json::to_value(db.create_chat(user_id, body, now))?)
            }
            Route::GetChat(id) => Ok(serde_json::to_value(db.chat(user_id, id)?)?),
            Route::UpdateChat(id) => {
                let update: ChatSessionUpdate = parse_body(request.body)?;
                Ok(serde_json::to_value(
                    db.update_chat(user_id, id, update, now)?,
                )?)
            }
            Route::DeleteChat(id) => {
                db.delete_chat(user_id, id)?;
                Ok(json!({"message": "Chat deleted successfully."}))
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for MockTransport {
    async fn handle(&self, request: ApiRequest) -> Result<Value> {
        MOCK_REQUESTS.click();
        let latency = self.config.latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        tracing::debug!(method = %request.method, endpoint = %request.endpoint, "mock api request");
        let method = request.method;
        let endpoint = request.endpoint.clone();
        let result = self.dispatch(request);
        if let Err(err) = &result {
            MOCK_REQUEST_ERRORS.click();
            tracing::warn!(%method, endpoint = %endpoint, error = %err, "mock api request failed");
        }
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    SignUp,
    SignIn,
    SignOut,
    Me,
    ListChats,
    CreateChat,
    GetChat(&'a str),
    UpdateChat(&'a str),
    DeleteChat(&'a str),
}

impl<'a> Route<'a> {
    fn parse(method: Method, endpoint: &'a str) -> Option<Self> {
        match (method, endpoint) {
            (Method::Post, "/api/auth/signup") => Some(Route::SignUp),
            (Method::Post, "/api/auth/signin") => Some(Route::SignIn),
            (Method::Post, "/api/auth/signout") => Some(Route::SignOut),
            (Method::Get, "/api/auth/me") => Some(Route::Me),
            (Method::Get, "/api/chats") => Some(Route::ListChats),
            (Method::Post, "/api/chats") => Some(Route::CreateChat),
            _ => {
                let id = endpoint
                    .strip_prefix("/api/chats/")
                    .filter(|id| !id.is_empty() && !id.contains('/'))?;
                match method {
                    Method::Get => Some(Route::GetChat(id)),
                    Method::Put => Some(Route::UpdateChat(id)),
                    Method::Delete => Some(Route::DeleteChat(id)),
                    Method::Post => None,
                }
            }
        }
    }

    fn requires_auth(&self) -> bool {
        !matches!(self, Route::SignUp | Route::SignIn)
    }
}

#[derive(Deserialize)]
struct SignUpBody {
    name: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct SignInBody {
    email: String,
    password: String,
}

fn parse_body<T: DeserializeOwned>(body: Option<Value>) -> Result<T> {
    let body = body.ok_or_else(|| Error::bad_request("Request body is required.", None))?;
    serde_json::from_value(body)
        .map_err(|err| Error::bad_request(format!("Malformed request body: {err}"), None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(endpoint: &str, body: Value) -> ApiRequest {
        ApiRequest::new(Method::Post, endpoint).with_body(body)
    }

    async fn signed_in(transport: &MockTransport) -> String {
        transport
            .handle(post(
                "/api/auth/signup",
                json!({"name": "Ada", "email": "ada@example.com", "password": "password123"}),
            ))
            .await
            .unwrap();
        let response = transport
            .handle(post(
                "/api/auth/signin",
                json!({"email": "ada@example.com", "password": "password123"}),
            ))
            .await
            .unwrap();
        response["token"].as_str().unwrap().to_string()
    }

    #[test]
    fn routes() {
        assert_eq!(
            Route::parse(Method::Get, "/api/chats/chat-1"),
            Some(Route::GetChat("chat-1"))
        );
        assert_eq!(
            Route::parse(Method::Delete, "/api/chats/chat-1"),
            Some(Route::DeleteChat("chat-1"))
        );
        assert_eq!(Route::parse(Method::Get, "/api/chats/"), None);
        assert_eq!(Route::parse(Method::Get, "/api/chats/a/b"), None);
        assert_eq!(Route::parse(Method::Post, "/api/chats/chat-1"), None);
        assert_eq!(Route::parse(Method::Delete, "/api/auth/me"), None);
    }

    #[tokio::test]
    async fn signup_response_carries_no_token() {
        let transport = MockTransport::instant();
        let response = transport
            .handle(post(
                "/api/auth/signup",
                json!({"name": "Ada", "email": "Ada@Example.com", "password": "password123"}),
            ))
            .await
            .unwrap();
        assert!(response.get("token").is_none());
        assert_eq!(response["user"]["email"], "ada@example.com");
        assert_eq!(response["message"], "Signup successful. Please sign in.");
    }

    #[tokio::test]
    async fn unknown_endpoint() {
        let transport = MockTransport::instant();
        let err = transport
            .handle(ApiRequest::new(Method::Put, "/api/nowhere"))
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Endpoint PUT /api/nowhere not found or method not allowed."
        );
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let transport = MockTransport::instant();
        let err = transport
            .handle(ApiRequest::new(Method::Get, "/api/chats"))
            .await
            .unwrap_err();
        assert_eq!(
            err.user_message(),
            "Authentication token is missing. Please sign in."
        );
        let err = transport
            .handle(ApiRequest::new(Method::Get, "/api/chats").with_token("mocktoken_user-1"))
            .await
            .unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(
            err.user_message(),
            "Session expired or token is invalid. Please sign in again."
        );
    }

    #[tokio::test]
    async fn signout_revokes_token() {
        let transport = MockTransport::instant();
        let token = signed_in(&transport).await;
        transport
            .handle(ApiRequest::new(Method::Get, "/api/auth/me").with_token(&token))
            .await
            .unwrap();
        let response = transport
            .handle(ApiRequest::new(Method::Post, "/api/auth/signout").with_token(&token))
            .await
            .unwrap();
        assert_eq!(response["message"], "Signed out successfully.");
        let err = transport
            .handle(ApiRequest::new(Method::Get, "/api/auth/me").with_token(&token))
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let transport =
            MockTransport::new(MockConfig::instant().with_token_ttl(time::Duration::ZERO));
        let token = signed_in(&transport).await;
        let err = transport
            .handle(ApiRequest::new(Method::Get, "/api/auth/me").with_token(&token))
            .await
            .unwrap_err();
        assert!(err.is_authentication());
    }

    #[tokio::test]
    async fn chat_lifecycle() {
        let transport = MockTransport::instant();
        let token = signed_in(&transport).await;
        let created = transport
            .handle(post("/api/chats", json!({"title": "Plans"})).with_token(&token))
            .await
            .unwrap();
        assert_eq!(created["title"], "Plans");
        assert_eq!(created["selectedModel"], "dense-ai-reasoner");
        assert_eq!(created["messages"][0]["parts"][0]["text"], "Hi there! How can I help?");
        let id = created["id"].as_str().unwrap().to_string();
        let path = format!("/api/chats/{id}");

        let updated = transport
            .handle(
                ApiRequest::new(Method::Put, &path)
                    .with_body(json!({"selectedModel": "dense-ai-chat"}))
                    .with_token(&token),
            )
            .await
            .unwrap();
        assert_eq!(updated["selectedModel"], "dense-ai-chat");
        assert_eq!(updated["title"], "Plans");

        let listed = transport
            .handle(ApiRequest::new(Method::Get, "/api/chats").with_token(&token))
            .await
            .unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert!(listed[0].get("messages").is_none());

        let deleted = transport
            .handle(ApiRequest::new(Method::Delete, &path).with_token(&token))
            .await
            .unwrap();
        assert_eq!(deleted["message"], "Chat deleted successfully.");
        let err = transport
            .handle(ApiRequest::new(Method::Get, &path).with_token(&token))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Chat not found or access denied.");
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_simulated() {
        let transport = MockTransport::new(
            MockConfig::instant().with_latency(Duration::from_millis(300)),
        );
        let start = tokio::time::Instant::now();
        let _ = transport
            .handle(ApiRequest::new(Method::Get, "/api/nowhere"))
            .await;
        assert!(start.elapsed() >= Duration::from_millis(300));
    }
}
