//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.repo-qa.toml` files.

use crate::provider::Provider;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = ".repo-qa.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Tool settings.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log at debug level unless `--quiet` is given.
    #[serde(default)]
    pub verbose: bool,
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider used when neither `--provider` nor `PROVIDER` is set.
    #[serde(default)]
    pub provider: Option<Provider>,

    /// Model name; only applies when the effective provider matches
    /// `provider` (or `provider` is unset).
    #[serde(default)]
    pub name: Option<String>,

    /// Temperature for generation. Omitted from requests when unset.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens in each response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Model round-trips allowed per query.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Endpoint overrides, e.g. for a proxy or a compatible server.
    #[serde(default)]
    pub openai_base_url: Option<String>,
    #[serde(default)]
    pub anthropic_base_url: Option<String>,
    #[serde(default)]
    pub gemini_base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: None,
            name: None,
            temperature: None,
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            max_iterations: default_max_iterations(),
            openai_base_url: None,
            anthropic_base_url: None,
            gemini_base_url: None,
        }
    }
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout() -> u64 {
    300
}

fn default_max_iterations() -> usize {
    25
}

/// Repository tool settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Name globs (`*`, `?`) that are never listed, searched or read.
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,

    /// Maximum file size in bytes for reading and searching.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,

    /// Default cap on find/search results.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Default number of commits returned by git_log.
    #[serde(default = "default_max_log_entries")]
    pub max_log_entries: usize,

    /// Tool output beyond this many characters is truncated.
    #[serde(default = "default_max_tool_output_chars")]
    pub max_tool_output_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            excludes: default_excludes(),
            max_file_size: default_max_file_size(),
            max_results: default_max_results(),
            max_log_entries: default_max_log_entries(),
            max_tool_output_chars: default_max_tool_output_chars(),
        }
    }
}

fn default_excludes() -> Vec<String> {
    vec![
        ".git",
        ".env*",
        "*.pem",
        "*.key",
        "target",
        "node_modules",
        "vendor",
        "dist",
        "build",
        "__pycache__",
        ".venv",
        "venv",
        ".idea",
        ".vscode",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_file_size() -> u64 {
    256 * 1024 // 256KB
}

fn default_max_results() -> usize {
    20
}

fn default_max_log_entries() -> usize {
    10
}

fn default_max_tool_output_chars() -> usize {
    30_000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from a repo directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_repo(repo_path: &Path) -> Result<Option<Self>> {
        let config_path = repo_path.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings. Provider and
    /// model are resolved separately by [`Config::resolve_provider`] and
    /// [`Config::resolve_model`].
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(max_iterations) = args.max_iterations {
            self.model.max_iterations = max_iterations;
        }

        if args.temperature.is_some() {
            self.model.temperature = args.temperature;
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Reject settings that would make every run fail.
    pub fn validate(&self) -> Result<()> {
        if self.model.timeout_seconds == 0 {
            bail!("[model] timeout_seconds must be at least 1");
        }
        if self.model.max_iterations == 0 {
            bail!("[model] max_iterations must be at least 1");
        }
        if self.model.max_tokens == 0 {
            bail!("[model] max_tokens must be at least 1");
        }
        if let Some(temperature) = self.model.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                bail!("[model] temperature must be between 0.0 and 2.0");
            }
        }
        if self.tools.max_results == 0 {
            bail!("[tools] max_results must be at least 1");
        }
        if self.tools.max_log_entries == 0 {
            bail!("[tools] max_log_entries must be at least 1");
        }
        Ok(())
    }

    /// Effective provider: explicit selection, then config, then default.
    pub fn resolve_provider(&self, selected: Option<Provider>) -> Provider {
        selected.or(self.model.provider).unwrap_or_default()
    }

    /// Effective model override for `provider`, if any.
    pub fn resolve_model(&self, provider: Provider, selected: Option<&str>) -> Option<String> {
        if let Some(model) = selected {
            return Some(model.to_string());
        }

        match self.model.provider {
            Some(configured) if configured != provider => None,
            _ => self.model.name.clone(),
        }
    }

    /// Base URL override from config for `provider`.
    pub fn base_url(&self, provider: Provider) -> Option<String> {
        match provider {
            Provider::OpenAI => self.model.openai_base_url.clone(),
            Provider::Anthropic => self.model.anthropic_base_url.clone(),
            Provider::Gemini => self.model.gemini_base_url.clone(),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
