//! Request/response plumbing between the services and the API.
//!
//! A [`Transport`] answers HTTP-like requests with JSON bodies.  The only
//! implementation is the in-process [`MockTransport`]; [`ApiClient`] sits in
//! front of it, attaching the stored bearer token and decoding responses.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::observability::{API_AUTH_REJECTIONS, API_REQUESTS, API_REQUEST_ERRORS};
use crate::storage::LocalStorage;

mod database;
mod mock;

pub use mock::{MockConfig, MockTransport};

/// HTTP method of an API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        write!(f, "{name}")
    }
}

/// A single API request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// Path such as `/api/chats/chat-1`.
    pub endpoint: String,
    /// HTTP method.
    pub method: Method,
    /// JSON body, if any.
    pub body: Option<Value>,
    /// Bearer token; `None` for public routes.
    pub token: Option<String>,
}

impl ApiRequest {
    /// Creates a request without body or token.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            body: None,
            token: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attaches a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Something that can answer API requests.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Handles a request, returning the JSON response body.
    async fn handle(&self, request: ApiRequest) -> Result<Value>;
}

/// Client-side entry point for API calls.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    storage: LocalStorage,
}

impl ApiClient {
    /// Creates a client over `transport`, reading the token from `storage`.
    pub fn new(transport: Arc<dyn Transport>, storage: LocalStorage) -> Self {
        Self { transport, storage }
    }

    /// The storage holding the auth token.
    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Sends a request and decodes the response.
    ///
    /// When `requires_auth` is set the stored token is attached; a missing token
    /// fails before anything is sent, and a token the server rejects is removed
    /// from storage.
    pub async fn request<T, B>(
        &self,
        endpoint: &str,
        method: Method,
        body: Option<&B>,
        requires_auth: bool,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        API_REQUESTS.click();
        let mut request = ApiRequest::new(method, endpoint);
        if let Some(body) = body {
            request = request.with_body(serde_json::to_value(body)?);
        }
        if requires_auth {
            let Some(token) = self.storage.load_auth_token() else {
                API_REQUEST_ERRORS.click();
                tracing::warn!(%method, endpoint, "auth token required but not found");
                return Err(Error::authentication(
                    "Authentication token is missing. Please sign in.",
                ));
            };
            request = request.with_token(token);
        }

        let response = match self.transport.handle(request).await {
            Ok(response) => response,
            Err(err) => {
                API_REQUEST_ERRORS.click();
                if requires_auth && err.is_authentication() {
                    API_AUTH_REJECTIONS.click();
                    self.storage.remove_auth_token();
                }
                return Err(err);
            }
        };
        serde_json::from_value(response).map_err(|err| {
            Error::serialization(
                format!("Failed to parse response from {method} {endpoint}: {err}"),
                Some(Box::new(err)),
            )
        })
    }
}
