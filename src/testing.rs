//! Test doubles for the provider seam.
//!
//! Used in tests to drive the agent and dispatcher without real API calls.

use crate::agent::tools::ToolDefinition;
use crate::models::{Conversation, ModelTurn};
use crate::provider::{ChatModel, ClientSettings, ModelFactory, Provider, ProviderError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Replays a fixed sequence of replies and records every conversation sent.
pub struct ScriptedModel {
    provider: Provider,
    model: String,
    replies: Mutex<VecDeque<Result<ModelTurn, ProviderError>>>,
    seen: Arc<Mutex<Vec<Conversation>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<ModelTurn, ProviderError>>) -> Self {
        Self::for_provider(Provider::OpenAI, "stub-model", replies)
    }

    pub fn for_provider(
        provider: Provider,
        model: &str,
        replies: Vec<Result<ModelTurn, ProviderError>>,
    ) -> Self {
        Self {
            provider,
            model: model.to_string(),
            replies: Mutex::new(replies.into()),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle on the recorded conversations, valid after the model is boxed.
    pub fn seen(&self) -> Arc<Mutex<Vec<Conversation>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn complete(
        &self,
        conversation: &Conversation,
        _tools: &[ToolDefinition],
    ) -> Result<ModelTurn, ProviderError> {
        self.seen.lock().unwrap().push(conversation.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script exhausted".to_string())))
    }

    fn provider(&self) -> Provider {
        self.provider
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Factory that answers every query with fixed text and records the
/// settings it was asked to build.
#[derive(Clone)]
pub struct StubFactory {
    answer: String,
    created: Arc<Mutex<Vec<ClientSettings>>>,
}

impl StubFactory {
    pub fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn created(&self) -> Vec<ClientSettings> {
        self.created.lock().unwrap().clone()
    }
}

impl ModelFactory for StubFactory {
    fn create(&self, settings: &ClientSettings) -> Result<Box<dyn ChatModel>, ProviderError> {
        self.created.lock().unwrap().push(settings.clone());
        Ok(Box::new(ScriptedModel::for_provider(
            settings.provider,
            &settings.model,
            vec![Ok(ModelTurn::text(self.answer.clone()))],
        )))
    }
}

/// Factory whose clients reject every request as unauthorized.
pub struct FailingFactory;

impl ModelFactory for FailingFactory {
    fn create(&self, settings: &ClientSettings) -> Result<Box<dyn ChatModel>, ProviderError> {
        Ok(Box::new(ScriptedModel::for_provider(
            settings.provider,
            &settings.model,
            vec![Err(ProviderError::Unauthorized(
                settings.provider.key_vars().join(" or "),
            ))],
        )))
    }
}
