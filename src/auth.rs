//! Sign-up, sign-in, sign-out, and session validation.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{Error, Result};
use crate::transport::{ApiClient, Method};
use crate::types::User;

/// Minimum password length accepted by the sign-up form.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Result of a sign-up or sign-in attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthOutcome {
    /// Whether the attempt succeeded.
    pub success: bool,
    /// Message to show the user.
    pub message: String,
    /// The user, on success.
    pub user: Option<User>,
}

impl AuthOutcome {
    fn succeeded(message: impl Into<String>, user: User) -> Self {
        Self {
            success: true,
            message: message.into(),
            user: Some(user),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            user: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    user: Option<User>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MeResponse {
    user: User,
}

#[derive(Serialize)]
struct SignUpRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Client-side authentication flows.
#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
}

impl AuthService {
    /// Creates a service over `api`.
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Registers a new account.  The server does not sign the user in.
    pub async fn sign_up(&self, name: &str, email: &str, password: &str) -> AuthOutcome {
        let body = SignUpRequest {
            name,
            email,
            password,
        };
        let response: AuthResponse = match self
            .api
            .request("/api/auth/signup", Method::Post, Some(&body), false)
            .await
        {
            Ok(response) => response,
            Err(err) => return AuthOutcome::failed(err.user_message()),
        };
        if let Some(token) = response.token.as_deref() {
            self.api.storage().save_auth_token(Some(token));
        }
        match response.user {
            Some(user) => {
                tracing::info!(user_id = %user.id, "signed up");
                AuthOutcome::succeeded("Sign up successful! Please sign in.", user)
            }
            None => AuthOutcome::failed(response.message.unwrap_or_else(|| {
                "Sign up failed due to an unexpected response from the server.".to_string()
            })),
        }
    }

    /// Signs in and stores the issued token.
    pub async fn sign_in(&self, email: &str, password: &str) -> AuthOutcome {
        let body = SignInRequest { email, password };
        let response: AuthResponse = match self
            .api
            .request("/api/auth/signin", Method::Post, Some(&body), false)
            .await
        {
            Ok(response) => response,
            Err(err) => return AuthOutcome::failed(err.user_message()),
        };
        match (response.token, response.user) {
            (Some(token), Some(user)) => {
                self.api.storage().save_auth_token(Some(&token));
                tracing::info!(user_id = %user.id, "signed in");
                AuthOutcome::succeeded("Sign in successful!", user)
            }
            _ => AuthOutcome::failed(response.message.unwrap_or_else(|| {
                "Sign in failed due to an unexpected server response.".to_string()
            })),
        }
    }

    /// Signs out.  The server is notified on a best-effort basis; the local
    /// token is always cleared.
    pub async fn sign_out(&self) {
        if self.api.storage().load_auth_token().is_some() {
            let result: Result<serde_json::Value> = self
                .api
                .request("/api/auth/signout", Method::Post, Some(&json!({})), true)
                .await;
            if let Err(err) = result {
                tracing::error!(error = %err, "error notifying server of sign out");
            }
        }
        self.api.storage().remove_auth_token();
    }

    /// The user owning the stored token, validated with the server.
    ///
    /// A token the server does not accept is removed.
    pub async fn current_user(&self) -> Option<User> {
        self.api.storage().load_auth_token()?;
        let result: Result<MeResponse> = self
            .api
            .request("/api/auth/me", Method::Get, None::<&()>, true)
            .await;
        match result {
            Ok(response) => Some(response.user),
            Err(err) => {
                tracing::warn!(error = %err, "session validation failed");
                self.api.storage().remove_auth_token();
                None
            }
        }
    }
}

/// Checks the sign-in form.
pub fn validate_sign_in(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.trim().is_empty() {
        return Err(Error::validation("Email and password are required.", None));
    }
    Ok(())
}

/// Checks the sign-up form.
pub fn validate_sign_up(name: &str, email: &str, password: &str) -> Result<()> {
    if name.trim().is_empty() || email.trim().is_empty() || password.trim().is_empty() {
        return Err(Error::validation("All fields are required.", None));
    }
    if !is_plausible_email(email) {
        return Err(Error::validation(
            "Please enter a valid email address.",
            Some("email".to_string()),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(Error::validation(
            "Password must be at least 8 characters long.",
            Some("password".to_string()),
        ));
    }
    Ok(())
}

/// Accepts `local@domain.tld` shapes: no whitespace, exactly one `@`, and a
/// dot inside the domain with text on both sides.
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let clean = |s: &str| !s.is_empty() && !s.contains('@') && !s.chars().any(char::is_whitespace);
    if !clean(local) || !clean(domain) {
        return false;
    }
    domain
        .char_indices()
        .any(|(idx, c)| c == '.' && idx > 0 && idx + 1 < domain.len())
}
