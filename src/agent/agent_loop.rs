//! Agent loop for tool-based question answering.
//!
//! The model explores the repository with the read-only tools until it
//! replies with plain text; that reply is the answer.

use crate::agent::tools::{tool_definitions, ToolDefinition, ToolExecutor};
use crate::error::DispatchError;
use crate::models::{Conversation, Message};
use crate::provider::ChatModel;
use indicatif::ProgressBar;
use tracing::{debug, info};

/// Configuration for the agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model round-trips allowed before giving up.
    pub max_iterations: usize,
    /// Tool output longer than this is truncated before it reaches the model.
    pub max_tool_output_chars: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            max_tool_output_chars: 30_000,
        }
    }
}

/// A single-query agent session.
pub struct QaAgent {
    config: AgentConfig,
    model: Box<dyn ChatModel>,
    tool_executor: ToolExecutor,
    tools: Vec<ToolDefinition>,
    progress: ProgressBar,
}

impl QaAgent {
    /// Create a new agent bound to one provider client and the repository tools.
    pub fn new(config: AgentConfig, model: Box<dyn ChatModel>, tool_executor: ToolExecutor) -> Self {
        info!(
            "Initializing agent with {} model {}",
            model.provider(),
            model.model_name()
        );

        Self {
            config,
            model,
            tool_executor,
            tools: tool_definitions(),
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress on a spinner while the agent works.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Run the session to completion and return the final answer.
    pub async fn answer(&self, query: &str) -> Result<String, DispatchError> {
        let mut conversation = Conversation::new(AGENT_SYSTEM_PROMPT);
        conversation.push(Message::User(query.to_string()));

        for iteration in 0..self.config.max_iterations {
            debug!("Agent iteration {}", iteration + 1);
            self.progress
                .set_message(format!("Waiting for {}...", self.model.model_name()));

            let turn = self.model.complete(&conversation, &self.tools).await?;

            if turn.is_final() {
                let answer = turn.text.unwrap_or_default().trim().to_string();
                if answer.is_empty() {
                    return Err(DispatchError::Invocation(
                        "model returned an empty answer".to_string(),
                    ));
                }
                info!("Agent answered after {} iteration(s)", iteration + 1);
                return Ok(answer);
            }

            conversation.push(Message::Assistant {
                text: turn.text.clone(),
                tool_calls: turn.tool_calls.clone(),
            });

            for call in &turn.tool_calls {
                self.progress.set_message(format!("Running {}...", call.name));

                let result = self.tool_executor.execute(call);
                if !result.success {
                    debug!("Tool {} failed: {:?}", call.name, result.error);
                }

                conversation.push(Message::Tool {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    content: truncate(result.into_message(), self.config.max_tool_output_chars),
                });

                info!("Tool {} executed", call.name);
            }
        }

        Err(DispatchError::Invocation(format!(
            "agent did not produce an answer within {} iterations",
            self.config.max_iterations
        )))
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}\n... [output truncated]", &text[..byte_index]),
        None => text,
    }
}

/// System prompt for the question-answering agent.
const AGENT_SYSTEM_PROMPT: &str = r#"You are a helpful QA agent for a software repository. Your goal is to answer the user's question by actively exploring the codebase.

## Available Tools

- `list_dir(directory)` - List files in a directory
- `find_file(pattern)` - Find files by name
- `search_for_pattern(pattern, path)` - Regex search over file contents
- `read_file(path, start_line, end_line)` - Read a file
- `get_file_info(path)` - Get file metadata
- `git_log(path, max_count)` - Show recent commits

## Rules

1. Start by understanding the directory structure if you are unsure where things are.
2. Use the tools to find evidence before answering. Cite file paths where relevant.
3. Be concise in your final answer but provide sufficient technical detail.
4. If you cannot find the answer, state what you tried and why you failed.
5. When you are done, reply with the answer as plain text and call no more tools.
"#;
