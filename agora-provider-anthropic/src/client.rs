//! Anthropic API client struct and builder.

use agora_types::{ByokProvider, GenerationRequest, ModelClient, ModelError, ModelStream, SecretString};
use async_trait::async_trait;

use crate::error::{map_http_status, map_reqwest_error};
use crate::streaming::stream_generation;
use crate::types::MessagesRequest;

/// Default model used when the request carries an empty model id.
const DEFAULT_MODEL: &str = "claude-haiku-4-5-20251001";

/// Default Anthropic API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic Messages API.
///
/// Implements [`ModelClient`] for use anywhere the engine accepts one.
/// The platform key lives in a [`SecretString`] and is only read at the
/// moment the request header is built; per-call BYOK credentials replace
/// it for that call.
///
/// # Example
///
/// ```no_run
/// use agora_provider_anthropic::Anthropic;
///
/// let client = Anthropic::new("sk-ant-...")
///     .base_url("https://api.anthropic.com");
/// ```
pub struct Anthropic {
    /// Platform API key (`ANTHROPIC_API_KEY`).
    pub(crate) api_key: SecretString,
    /// Fallback model identifier for requests with an empty model id.
    pub(crate) model: String,
    /// API base URL (override for testing or proxies).
    pub(crate) base_url: String,
    /// Whether system blocks carry an ephemeral cache marker.
    pub(crate) cache_system_prefix: bool,
    /// Shared HTTP client.
    pub(crate) client: reqwest::Client,
}

impl Anthropic {
    /// Create a new client with the given API key and sensible defaults.
    ///
    /// Default model: `claude-haiku-4-5-20251001`.
    /// Default base URL: `https://api.anthropic.com`.
    /// System-prefix caching: on.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            cache_system_prefix: true,
            client: reqwest::Client::new(),
        }
    }

    /// Override the fallback model.
    ///
    /// This is used when [`GenerationRequest::model`] is empty.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL.
    ///
    /// Useful for testing with a local mock server or an API proxy.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Toggle the ephemeral `cache_control` marker on system blocks.
    ///
    /// Every turn of a bout resends the same system prompt, so caching
    /// the prefix is on by default.
    #[must_use]
    pub fn cache_system_prefix(mut self, enabled: bool) -> Self {
        self.cache_system_prefix = enabled;
        self
    }

    /// Build the messages endpoint URL.
    pub(crate) fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

#[async_trait]
impl ModelClient for Anthropic {
    /// Start a streaming generation against the Messages API.
    ///
    /// The request body always sets `stream: true`; HTTP-level failures
    /// map to [`ModelError`] here, mid-stream failures arrive as events
    /// on the returned [`ModelStream`].
    async fn stream(&self, request: GenerationRequest<'_>) -> Result<ModelStream, ModelError> {
        if let Some(credentials) = request.byok {
            // This client only speaks to Anthropic. Keys for other
            // upstreams belong to a different ModelClient.
            if credentials.provider != ByokProvider::Anthropic {
                return Err(ModelError::InvalidRequest(
                    "caller key is not an Anthropic key".into(),
                ));
            }
        }

        let model = if request.model.is_empty() {
            self.model.as_str()
        } else {
            request.model
        };
        let body = MessagesRequest::build(
            model,
            request.system,
            request.user,
            request.max_output_tokens,
            self.cache_system_prefix,
        );
        let url = self.messages_url();

        tracing::debug!(
            url = %url,
            model = %model,
            byok = request.byok.is_some(),
            "sending streaming generation request"
        );

        let builder = self
            .client
            .post(&url)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);
        // From here the key exists only inside the request headers.
        let builder = match request.byok {
            Some(credentials) => credentials
                .key
                .expose(|key| builder.header("x-api-key", key)),
            None => self.api_key.expose(|key| builder.header("x-api-key", key)),
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok());
            let body_text = response.text().await.map_err(map_reqwest_error)?;
            return Err(map_http_status(status, retry_after_secs, &body_text));
        }

        Ok(stream_generation(response))
    }
}
