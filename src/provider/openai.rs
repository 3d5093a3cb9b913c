//! OpenAI Chat Completions adapter.

use super::{parse_arguments, send_json, ChatModel, ClientSettings, Provider, ProviderError};
use crate::agent::tools::ToolDefinition;
use crate::models::{Conversation, Message, ModelTurn, ToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Calls `/v1/chat/completions` with function definitions and maps
/// `tool_calls` back into [`ToolCall`]s.
pub struct OpenAIModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
    timeout_seconds: u64,
}

impl OpenAIModel {
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

    /// Build the JSON request body for the Chat Completions API.
    pub fn build_request_body(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> Value {
        let mut messages = vec![json!({
            "role": "system",
            "content": conversation.system
        })];

        for message in &conversation.messages {
            messages.push(match message {
                Message::User(text) => json!({ "role": "user", "content": text }),
                Message::Assistant { text, tool_calls } => {
                    let mut entry = json!({
                        "role": "assistant",
                        "content": text
                    });
                    if !tool_calls.is_empty() {
                        entry["tool_calls"] = tool_calls
                            .iter()
                            .map(|call| {
                                json!({
                                    "id": call.id,
                                    "type": "function",
                                    "function": {
                                        "name": call.name,
                                        "arguments": call.arguments.to_string()
                                    }
                                })
                            })
                            .collect();
                    }
                    entry
                }
                Message::Tool {
                    call_id, content, ..
                } => json!({
                    "role": "tool",
                    "tool_call_id": call_id,
                    "content": content
                }),
            });
        }

        let mut body = json!({
            "model": self.model,
            "max_completion_tokens": self.max_tokens,
            "messages": messages,
        });

        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|tool| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters
                        }
                    })
                })
                .collect();
            body["tool_choice"] = json!("auto");
        }

        if let Some(temperature) = self.temperature {
            body["temperature"] = json!(temperature);
        }

        body
    }

    /// Parse a Chat Completions response.
    pub fn parse_response(response_body: &Value) -> Result<ModelTurn, ProviderError> {
        let choice = response_body
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|choices| choices.first())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing choices in response".to_string())
            })?;

        let message = choice.get("message").ok_or_else(|| {
            ProviderError::InvalidResponse("missing message in choice".to_string())
        })?;

        let mut tool_calls = Vec::new();
        if let Some(calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
            for call in calls {
                tool_calls.push(parse_tool_call(call)?);
            }
        }

        let text = message
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(String::from);

        Ok(ModelTurn { text, tool_calls })
    }
}

fn parse_tool_call(call: &Value) -> Result<ToolCall, ProviderError> {
    let id = call
        .get("id")
        .and_then(|i| i.as_str())
        .unwrap_or_default()
        .to_string();

    let function = call
        .get("function")
        .ok_or_else(|| ProviderError::InvalidResponse("tool_call missing function".to_string()))?;

    let name = function
        .get("name")
        .and_then(|n| n.as_str())
        .ok_or_else(|| ProviderError::InvalidResponse("function missing name".to_string()))?
        .to_string();

    let arguments = parse_arguments(
        function
            .get("arguments")
            .and_then(|a| a.as_str())
            .unwrap_or("{}"),
    )?;

    Ok(ToolCall {
        id,
        name,
        arguments,
    })
}

#[async_trait]
impl ChatModel for OpenAIModel {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError> {
        let body = self.build_request_body(conversation, tools);
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body);

        let response = send_json(request, Provider::OpenAI, &self.base_url, self.timeout_seconds).await?;
        Self::parse_response(&response)
    }

    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
