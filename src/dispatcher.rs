//! Provider selection and query dispatch.
//!
//! The dispatcher takes a validated [`InvocationRequest`], looks up the
//! credential for the selected provider, builds the client through the
//! [`ModelFactory`] seam and runs one agent session over the repository.

use crate::agent::tools::{ToolExecutor, ToolLimits};
use crate::agent::{AgentConfig, QaAgent};
use crate::config::Config;
use crate::error::DispatchError;
use crate::models::{Answer, InvocationRequest};
use crate::provider::{ClientSettings, Credentials, ModelFactory, Provider};
use crate::scanner::ScanConfig;
use chrono::Utc;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Settings shared by every dispatch, resolved once at startup.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    pub root: PathBuf,
    pub scan_config: ScanConfig,
    pub tool_limits: ToolLimits,
    pub agent: AgentConfig,
    pub timeout_seconds: u64,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    /// Endpoint override for the selected provider.
    pub base_url: Option<String>,
}

impl DispatchOptions {
    pub fn from_config(config: &Config, root: PathBuf, base_url: Option<String>) -> Self {
        Self {
            root,
            scan_config: ScanConfig::from(&config.tools),
            tool_limits: ToolLimits::from(&config.tools),
            agent: AgentConfig {
                max_iterations: config.model.max_iterations,
                max_tool_output_chars: config.tools.max_tool_output_chars,
            },
            timeout_seconds: config.model.timeout_seconds,
            temperature: config.model.temperature,
            max_tokens: config.model.max_tokens,
            base_url,
        }
    }
}

/// Endpoint override for `provider`: environment first, then config.
pub fn resolve_base_url<F>(provider: Provider, config: &Config, lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(provider.base_url_var())
        .filter(|url| !url.trim().is_empty())
        .or_else(|| config.base_url(provider))
}

/// Routes one request to the selected provider.
pub struct Dispatcher<'a> {
    factory: &'a dyn ModelFactory,
    credentials: &'a Credentials,
    options: DispatchOptions,
    progress: ProgressBar,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        factory: &'a dyn ModelFactory,
        credentials: &'a Credentials,
        options: DispatchOptions,
    ) -> Self {
        Self {
            factory,
            credentials,
            options,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report agent progress on a spinner.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Answer the request with the selected provider.
    ///
    /// The explicit provider always wins; a missing credential for it is a
    /// configuration error even when other providers have keys.
    pub async fn dispatch(&self, request: &InvocationRequest) -> Result<Answer, DispatchError> {
        let start_time = Instant::now();
        let provider = request.provider();

        let api_key = self.credentials.api_key(provider)?;
        debug!("Credentials available for: {:?}", self.credentials.available());

        let settings = ClientSettings {
            provider,
            model: request.effective_model().to_string(),
            api_key: api_key.to_string(),
            base_url: self.options.base_url.clone(),
            timeout_seconds: self.options.timeout_seconds,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
        };
        info!("Dispatching query to {} ({})", provider, settings.model);
        debug!("Client settings: {:?}", settings);

        let model = self.factory.create(&settings)?;
        let executor = ToolExecutor::new(
            self.options.root.clone(),
            self.options.scan_config.clone(),
            self.options.tool_limits.clone(),
        );

        let agent = QaAgent::new(self.options.agent.clone(), model, executor)
            .with_progress(self.progress.clone());
        let answer = agent.answer(request.query()).await?;

        let duration = start_time.elapsed().as_secs_f64();
        info!("Answer received in {:.1}s", duration);

        Ok(Answer {
            answer,
            provider,
            model: settings.model,
            duration_seconds: duration,
            answered_at: Utc::now(),
        })
    }
}
