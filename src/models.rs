//! Data models for a single question-answering run.
//!
//! This module contains the invocation request, the provider-neutral
//! conversation passed between the agent and the chat adapters, and the
//! final answer.

use crate::error::DispatchError;
use crate::provider::Provider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated request to answer one query.
///
/// Fields are private so that a request can only exist with a non-empty
/// query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    query: String,
    provider: Provider,
    model: Option<String>,
}

impl InvocationRequest {
    /// Build a request, rejecting empty or whitespace-only queries.
    ///
    /// An empty model name is treated as "use the provider default".
    pub fn new(
        query: impl Into<String>,
        provider: Provider,
        model: Option<String>,
    ) -> Result<Self, DispatchError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(DispatchError::Input("query must not be empty".to_string()));
        }

        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        Ok(Self {
            query,
            provider,
            model,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// The model that will actually be used.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id (synthesized for providers that have none).
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// One entry in the conversation history.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(String),
    Assistant {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

/// The full conversation sent to a provider on each turn.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    pub system: String,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

/// A parsed reply from the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl ModelTurn {
    /// A reply with text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            tool_calls: Vec::new(),
        }
    }

    /// True when the model asked for no tools, which ends the session.
    pub fn is_final(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

/// The final answer of a run, with metadata for JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub provider: Provider,
    pub model: String,
    pub duration_seconds: f64,
    pub answered_at: DateTime<Utc>,
}
