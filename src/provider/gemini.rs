//! Google Gemini generateContent adapter.

use super::{send_json, ChatModel, ClientSettings, Provider, ProviderError};
use crate::agent::tools::ToolDefinition;
use crate::models::{Conversation, Message, ModelTurn, ToolCall};
use async_trait::async_trait;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Calls `generateContent` with function declarations. Gemini assigns no
/// call ids, so they are synthesized per turn.
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    max_tokens: u32,
    timeout_seconds: u64,
}

impl GeminiModel {
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

    pub fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Build the JSON request body for generateContent.
    pub fn build_request_body(&self, conversation: &Conversation, tools: &[ToolDefinition]) -> Value {
        let mut contents: Vec<Value> = Vec::new();

        for message in &conversation.messages {
            let (role, parts) = match message {
                Message::User(text) => ("user", vec![json!({ "text": text })]),
                Message::Assistant { text, tool_calls } => {
                    let mut parts = Vec::new();
                    if let Some(text) = text.as_deref().filter(|t| !t.is_empty()) {
                        parts.push(json!({ "text": text }));
                    }
                    for call in tool_calls {
                        parts.push(json!({
                            "functionCall": { "name": call.name, "args": call.arguments }
                        }));
                    }
                    ("model", parts)
                }
                Message::Tool { name, content, .. } => (
                    "user",
                    vec![json!({
                        "functionResponse": {
                            "name": name,
                            "response": { "content": content }
                        }
                    })],
                ),
            };
            push_content(&mut contents, role, parts);
        }

        let mut generation_config = json!({ "max_output_tokens": self.max_tokens });
        if let Some(temperature) = self.temperature {
            generation_config["temperature"] = json!(temperature);
        }

        let mut body = json!({
            "system_instruction": { "parts": [{ "text": conversation.system }] },
            "contents": contents,
            "generation_config": generation_config,
        });

        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|tool| {
                    json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters
                    })
                })
                .collect();
            body["tools"] = json!([{ "function_declarations": declarations }]);
        }

        body
    }

    /// Parse a generateContent response.
    pub fn parse_response(response_body: &Value) -> Result<ModelTurn, ProviderError> {
        let candidate = response_body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| {
                ProviderError::InvalidResponse("missing candidates in response".to_string())
            })?;

        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array())
            .ok_or_else(|| {
                let reason = candidate
                    .get("finishReason")
                    .and_then(|r| r.as_str())
                    .unwrap_or("unknown");
                ProviderError::InvalidResponse(format!(
                    "candidate has no content (finishReason: {})",
                    reason
                ))
            })?;

        let mut texts = Vec::new();
        let mut tool_calls = Vec::new();

        for part in parts {
            if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(|n| n.as_str()).ok_or_else(|| {
                    ProviderError::InvalidResponse("functionCall missing name".to_string())
                })?;
                tool_calls.push(ToolCall {
                    id: format!("call_{}", tool_calls.len()),
                    name: name.to_string(),
                    arguments: call.get("args").cloned().unwrap_or_else(|| json!({})),
                });
            } else if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                texts.push(text);
            }
        }

        let text = Some(texts.join("")).filter(|t| !t.is_empty());
        Ok(ModelTurn { text, tool_calls })
    }
}

/// Append parts under `role`, merging into the previous entry when the role
/// repeats (consecutive function responses must share one turn).
fn push_content(contents: &mut Vec<Value>, role: &str, parts: Vec<Value>) {
    if let Some(last) = contents.last_mut() {
        if last.get("role").and_then(|r| r.as_str()) == Some(role) {
            if let Some(existing) = last.get_mut("parts").and_then(|p| p.as_array_mut()) {
                existing.extend(parts);
                return;
            }
        }
    }
    contents.push(json!({ "role": role, "parts": parts }));
}

#[async_trait]
impl ChatModel for GeminiModel {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError> {
        let body = self.build_request_body(conversation, tools);

        let request = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response =
            send_json(request, Provider::Gemini, &self.base_url, self.timeout_seconds).await?;
        Self::parse_response(&response)
    }

    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::tools::tool_definitions;

    fn model() -> GeminiModel {
        GeminiModel::new(
            reqwest::Client::new(),
            &ClientSettings {
                provider: Provider::Gemini,
                model: "gemini-3.0-pro".to_string(),
                api_key: "test-key".to_string(),
                base_url: None,
                timeout_seconds: 30,
                temperature: None,
                max_tokens: 1024,
            },
        )
    }

    #[test]
    fn test_endpoint_keeps_key_out_of_url() {
        let endpoint = model().endpoint();
        assert_eq!(
            endpoint,
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3.0-pro:generateContent"
        );
        assert!(!endpoint.contains("test-key"));
    }

    #[test]
    fn test_builds_request_body() {
        let mut conv = Conversation::new("system prompt");
        conv.push(Message::User("How is config loaded?".to_string()));
        conv.push(Message::Assistant {
            text: None,
            tool_calls: vec![ToolCall {
                id: "call_0".to_string(),
                name: "search_for_pattern".to_string(),
                arguments: json!({"pattern": "fn load"}),
            }],
        });
        conv.push(Message::Tool {
            call_id: "call_0".to_string(),
            name: "search_for_pattern".to_string(),
            content: "src/config.rs:10: fn load()".to_string(),
        });

        let body = model().build_request_body(&conv, &tool_definitions());

        assert_eq!(body["system_instruction"]["parts"][0]["text"], "system prompt");
        assert_eq!(body["generation_config"]["max_output_tokens"], 1024);

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(
            contents[1]["parts"][0]["functionCall"]["name"],
            "search_for_pattern"
        );
        assert_eq!(
            contents[2]["parts"][0]["functionResponse"]["name"],
            "search_for_pattern"
        );

        let declarations = body["tools"][0]["function_declarations"].as_array().unwrap();
        assert_eq!(declarations.len(), tool_definitions().len());
    }

    #[test]
    fn test_parses_function_call_response() {
        let response = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [
                        { "functionCall": { "name": "list_dir", "args": { "directory": "." } } },
                        { "functionCall": { "name": "git_log", "args": {} } }
                    ]
                },
                "finishReason": "STOP"
            }]
        });

        let turn = GeminiModel::parse_response(&response).unwrap();
        assert_eq!(turn.tool_calls.len(), 2);
        assert_eq!(turn.tool_calls[0].id, "call_0");
        assert_eq!(turn.tool_calls[1].id, "call_1");
        assert_eq!(turn.tool_calls[1].name, "git_log");
    }

    #[test]
    fn test_parses_text_response() {
        let response = json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Config comes from TOML." }] },
                "finishReason": "STOP"
            }]
        });

        let turn = GeminiModel::parse_response(&response).unwrap();
        assert!(turn.is_final());
        assert_eq!(turn.text.as_deref(), Some("Config comes from TOML."));
    }

    #[test]
    fn test_reports_blocked_candidate() {
        let response = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        let err = GeminiModel::parse_response(&response).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }
}
