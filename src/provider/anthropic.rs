//! Anthropic Messages API adapter.

use super::{send_json, ChatModel, ClientSettings, Provider, ProviderError};
use crate::agent::tools::ToolDefinition;
use crate::models::{Conversation, Message, ModelTurn, ToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Calls `/v1/messages` with tool definitions and maps `tool_use` blocks
/// back into [`ToolCall`]s.
pub struct AnthropicModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
    timeout_seconds: u64,
}

impl AnthropicModel {
    pub fn new(client: reqwest::Client, settings: &ClientSettings) -> Self {
        Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            model: settings.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            timeout_seconds: settings.timeout_seconds,
        }
    }

    /// Build the JSON request body for the Messages API.
    pub fn build_request_body(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> Value {
        let mut messages: Vec<Value> = Vec::new();

        for message in &conversation.messages {
            match message {
                Message::User(text) => messages.push(json!({
                    "role": "user",
                    "content": text
                })),
                Message::Assistant { text, tool_calls } => {
                    let mut blocks = Vec::new();
                    if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                        blocks.push(json!({ "type": "text", "text": text }));
                    }
                    for call in tool_calls {
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.id,
                            "name": call.name,
                            "input": call.arguments
                        }));
                    }
                    messages.push(json!({ "role": "assistant", "content": blocks }));
                }
                Message::Tool {
                    call_id, content, ..
                } => push_tool_result(&mut messages, call_id, content),
            }
        }

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": conversation.system,
            "messages": messages,
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "input_schema": tool.parameters
                    })
                })
                .collect();
        }

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Parse a Messages API response.
    pub fn parse_response(response_body: &Value) -> Result<ModelTurn, ProviderError> {
        let blocks = response_body
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing content array in response".to_string())
            })?;

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for block in blocks {
            match block.get("type").and_then(|t| t.as_str()) {
                Some("text") => {
                    if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                        texts.push(text);
                    }
                }
                Some("tool_use") => {
                    let name = block
                        .get("name")
                        .and_then(|n| n.as_str())
                        .ok_or_else(|| {
                            ProviderError::InvalidResponse("tool_use missing name".to_string())
                        })?;
                    tool_calls.push(ToolCall {
                        id: block
                            .get("id")
                            .and_then(|i| i.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        name: name.to_string(),
                        arguments: block.get("input").cloned().unwrap_or_else(|| json!({})),
                    });
                }
                _ => {}
            }
        }

        let text = Some(texts.join("")).filter(|t| !t.is_empty());
        Ok(ModelTurn { text, tool_calls })
    }
}

/// Append a `tool_result` block, merging consecutive results into one user
/// message as the API requires.
fn push_tool_result(messages: &mut Vec<Value>, call_id: &str, content: &str) {
    let block = json!({
        "type": "tool_result",
        "tool_use_id": call_id,
        "content": content
    });

    if let Some(last) = messages.last_mut() {
        let is_result_turn = last.get("role").and_then(|r| r.as_str()) == Some("user")
            && last
                .get("content")
                .and_then(|c| c.as_array())
                .and_then(|blocks| blocks.first())
                .and_then(|b| b.get("type"))
                .and_then(|t| t.as_str())
                == Some("tool_result");

        if is_result_turn {
            if let Some(blocks) = last.get_mut("content").and_then(|c| c.as_array_mut()) {
                blocks.push(block);
                return;
            }
        }
    }

    messages.push(json!({ "role": "user", "content": [block] }));
}

#[async_trait]
impl ChatModel for AnthropicModel {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError> {
        let body = self.build_request_body(conversation, tools);
        let url = format!("{}/v1/messages", self.base_url);

        let request = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body);

        let response =
            send_json(request, Provider::Anthropic, &self.base_url, self.timeout_seconds).await?;
        Self::parse_response(&response)
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
