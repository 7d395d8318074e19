use std::env;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response, header};

use super::sse::process_sse;
use super::types::{ErrorResponse, GenerateContentRequest, GenerateContentResponse};
use crate::error::{Error, Result};
use crate::observability::{GEMINI_REQUESTS, GEMINI_REQUEST_DURATION, GEMINI_REQUEST_ERRORS};

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Environment variable consulted when no API key is passed explicitly.
pub const API_KEY_ENV: &str = "DENSECHAT_API_KEY";

/// Provider model used by both selectable variants.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// A boxed stream of response chunks.
pub type ResponseStream = Pin<Box<dyn Stream<Item = Result<GenerateContentResponse>> + Send>>;

/// Client for the Gemini API.
#[derive(Debug, Clone)]
pub struct Gemini {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
    model: String,
}

impl Gemini {
    /// Create a new Gemini client.
    ///
    /// The API key can be provided directly or read from the DENSECHAT_API_KEY
    /// environment variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => key,
            None => env::var(API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .ok_or_else(|| {
                    Error::configuration(format!(
                        "API key not provided and {API_KEY_ENV} environment variable not set"
                    ))
                })?,
        };

        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("Failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Use a different provider model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The provider model requests are sent to.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn stream_url(&self) -> Result<url::Url> {
        let url = format!(
            "{}models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        );
        url::Url::parse(&url)
            .map_err(|e| Error::url(format!("Invalid Gemini endpoint '{url}': {e}"), Some(e)))
    }

    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| Error::configuration("API key contains characters not allowed in a header"))?;
        headers.insert("x-goog-api-key", key);
        Ok(headers)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|val| val.to_str().ok())
            .and_then(|val| val.parse::<u64>().ok());
        match response.text().await {
            Ok(body) => error_from_body(status_code, &body, retry_after),
            Err(e) => Error::http_client(
                format!("Failed to read error response: {e}"),
                Some(Box::new(e)),
            ),
        }
    }

    /// Stream a response for `request`.
    ///
    /// Each item is one chunk of the reply; the stream ends when the provider
    /// closes the connection.
    pub async fn stream_generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<ResponseStream> {
        GEMINI_REQUESTS.click();
        let start = Instant::now();
        let url = self.stream_url()?;
        tracing::debug!(model = %self.model, turns = request.contents.len(), "streaming generate content");

        let response = self
            .client
            .post(url)
            .headers(self.default_headers()?)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                GEMINI_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else if e.is_connect() {
                    Error::connection(format!("Connection error: {e}"), Some(Box::new(e)))
                } else {
                    Error::http_client(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        GEMINI_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        if !response.status().is_success() {
            GEMINI_REQUEST_ERRORS.click();
            let err = Self::process_error_response(response).await;
            tracing::warn!(error = %err, "gemini request failed");
            return Err(err);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}

/// Maps an HTTP error status and Gemini error body onto the crate's error taxonomy.
fn error_from_body(status_code: u16, body: &str, retry_after: Option<u64>) -> Error {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .map(|response| response.error);
    let error_type = detail.as_ref().and_then(|d| d.status.clone());
    let message = detail
        .and_then(|d| d.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status_code {
        400 => Error::bad_request(message, None),
        401 => Error::authentication(message),
        403 => Error::permission(message),
        404 => Error::not_found(message, Some("model".to_string()), None),
        408 => Error::timeout(message, None),
        429 => Error::rate_limit(message, retry_after),
        500 => Error::internal_server(message),
        502..=504 => Error::service_unavailable(message, retry_after),
        _ => Error::api(status_code, error_type, message),
    }
}
