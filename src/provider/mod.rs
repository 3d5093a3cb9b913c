//! LLM provider selection and chat adapters.
//!
//! Each supported vendor gets an adapter implementing [`ChatModel`]. The
//! adapters translate the provider-neutral [`Conversation`] into the
//! vendor's wire format and parse replies back into a [`ModelTurn`].

pub mod anthropic;
pub mod gemini;
pub mod openai;

use crate::agent::tools::ToolDefinition;
use crate::error::DispatchError;
use crate::models::{Conversation, ModelTurn};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// A supported LLM vendor. Closed set, checked at the CLI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAI,
    Anthropic,
    Gemini,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::OpenAI, Provider::Anthropic, Provider::Gemini];

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
        }
    }

    /// Model used when no override is given.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAI => "gpt-5.2",
            Provider::Anthropic => "claude-4.5-sonnet",
            Provider::Gemini => "gemini-3.0-pro",
        }
    }

    /// Environment variables holding the API key, in lookup order.
    pub fn key_vars(&self) -> &'static [&'static str] {
        match self {
            Provider::OpenAI => &["OPENAI_API_KEY"],
            Provider::Anthropic => &["ANTHROPIC_API_KEY"],
            Provider::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }

    /// Environment variable overriding the API base URL.
    pub fn base_url_var(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_BASE_URL",
            Provider::Anthropic => "ANTHROPIC_BASE_URL",
            Provider::Gemini => "GEMINI_BASE_URL",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Provider {
    type Err = DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "anthropic" => Ok(Provider::Anthropic),
            "gemini" => Ok(Provider::Gemini),
            other => Err(DispatchError::Configuration(format!(
                "unknown provider '{}' (expected one of: openai, anthropic, gemini)",
                other
            ))),
        }
    }
}

/// API keys found in the environment, read once at startup.
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<Provider, String>,
}

impl Credentials {
    /// Read every provider's key from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read keys through an arbitrary lookup. Empty values count as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = HashMap::new();
        for provider in Provider::ALL {
            let found = provider
                .key_vars()
                .iter()
                .filter_map(|&var| lookup(var))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty());

            if let Some(key) = found {
                keys.insert(provider, key);
            }
        }
        Self { keys }
    }

    pub fn with_key(mut self, provider: Provider, key: impl Into<String>) -> Self {
        self.keys.insert(provider, key.into());
        self
    }

    /// The key for `provider`, or a configuration error naming the variables.
    pub fn api_key(&self, provider: Provider) -> Result<&str, DispatchError> {
        self.keys.get(&provider).map(String::as_str).ok_or_else(|| {
            DispatchError::Configuration(format!(
                "{} not found in environment (required for provider '{}')",
                provider.key_vars().join(" or "),
                provider
            ))
        })
    }

    /// Providers that have a key available.
    pub fn available(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.keys.contains_key(p))
            .collect()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("available", &self.available())
            .finish()
    }
}

/// Errors from a provider adapter.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Cannot connect to {0}")]
    Connect(String),

    #[error("Unauthorized: check {0}")]
    Unauthorized(String),

    #[error("Rate limited by provider")]
    RateLimited,

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// A chat-completion backend that supports tool calling.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send the conversation and return the model's next turn.
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError>;

    fn provider(&self) -> Provider;

    fn model_name(&self) -> &str;
}

/// Everything needed to construct a provider client.
#[derive(Clone)]
pub struct ClientSettings {
    pub provider: Provider,
    pub model: String,
    pub api_key: String,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    pub timeout_seconds: u64,
    /// Sent only when set; some models reject non-default values.
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

/// Builds the chat client for a run. Tests substitute a stub.
pub trait ModelFactory {
    fn create(&self, settings: &ClientSettings) -> Result<Box<dyn ChatModel>, ProviderError>;
}

/// Factory for the real HTTP adapters.
pub struct HttpModelFactory;

impl ModelFactory for HttpModelFactory {
    fn create(&self, settings: &ClientSettings) -> Result<Box<dyn ChatModel>, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to create HTTP client: {}", e)))?;

        let model: Box<dyn ChatModel> = match settings.provider {
            Provider::OpenAI => Box::new(openai::OpenAIModel::new(client, settings)),
            Provider::Anthropic => Box::new(anthropic::AnthropicModel::new(client, settings)),
            Provider::Gemini => Box::new(gemini::GeminiModel::new(client, settings)),
        };
        Ok(model)
    }
}

/// Send a prepared request and decode the JSON body, mapping HTTP failures.
pub(crate) async fn send_json(
    request: reqwest::RequestBuilder,
    provider: Provider,
    base_url: &str,
    timeout_seconds: u64,
) -> Result<Value, ProviderError> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProviderError::Timeout(timeout_seconds)
        } else if e.is_connect() {
            ProviderError::Connect(base_url.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    })?;

    let status = response.status();
    debug!("{} responded with {}", provider, status);

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(status, provider, body));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("failed to parse JSON: {}", e)))
}

/// Map a non-success HTTP status to the matching error.
fn status_error(status: reqwest::StatusCode, provider: Provider, body: String) -> ProviderError {
    match status {
        reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
            ProviderError::Unauthorized(provider.key_vars().join(" or "))
        }
        reqwest::StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        _ => ProviderError::Api {
            status: status.as_u16(),
            body,
        },
    }
}

/// Parse a JSON-encoded tool argument string, treating blanks as `{}`.
pub(crate) fn parse_arguments(raw: &str) -> Result<Value, ProviderError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw).map_err(|e| {
        ProviderError::InvalidResponse(format!("failed to parse tool arguments: {}", e))
    })
}
