//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::provider::Provider;
use clap::Parser;
use std::path::PathBuf;

/// repo-qa - answer questions about a repository with an LLM agent
///
/// The selected provider's model explores the checkout with read-only
/// tools and the answer is printed to stdout.
///
/// Examples:
///   repo-qa --query "How is the config loaded?"
///   repo-qa --query "Where is retry logic?" --provider anthropic
///   repo-qa --query "What changed recently?" --provider gemini --format json
///   repo-qa --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Question to answer about the repository
    #[arg(
        short = 'Q',
        long,
        value_name = "TEXT",
        env = "QUERY",
        required_unless_present = "init_config"
    )]
    pub query: Option<String>,

    /// LLM provider to use
    ///
    /// One of openai, anthropic, gemini (case-insensitive). Falls back to
    /// [model] provider in .repo-qa.toml, then openai.
    #[arg(
        short,
        long,
        value_name = "PROVIDER",
        env = "PROVIDER",
        value_parser = parse_provider
    )]
    pub provider: Option<Provider>,

    /// Model name (defaults to the provider's default model)
    #[arg(short, long, value_name = "NAME", env = "MODEL_NAME")]
    pub model: Option<String>,

    /// Repository checkout the agent may read
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub root: PathBuf,

    /// Path to configuration file
    ///
    /// If not specified, looks for .repo-qa.toml in the repository root
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format (text, json)
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Also write the formatted answer to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Request timeout in seconds
    ///
    /// How long to wait for each provider response. Default: from config or 300s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum model round-trips before giving up
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<usize>,

    /// Temperature for LLM responses (0.0 - 2.0)
    ///
    /// Left to the provider default when not set.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (errors only, no spinner)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .repo-qa.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// The answer text only (default)
    #[default]
    Text,
    /// Answer plus provider, model and timing
    Json,
}

fn parse_provider(value: &str) -> Result<Provider, crate::error::DispatchError> {
    value.parse()
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The query as given, empty if absent. Emptiness is rejected later
    /// as an input error.
    pub fn query_text(&self) -> &str {
        self.query.as_deref().unwrap_or("")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 2.0".to_string());
            }
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.max_iterations == Some(0) {
            return Err("Max iterations must be at least 1".to_string());
        }

        if !self.root.exists() {
            return Err(format!(
                "Repository root does not exist: {}",
                self.root.display()
            ));
        }
        if !self.root.is_dir() {
            return Err(format!(
                "Repository root is not a directory: {}",
                self.root.display()
            ));
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `--quiet` beats `--verbose`, which matches `[general] verbose`.
    pub fn log_level(&self, config_verbose: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || config_verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) fn make_args() -> Args {
    Args {
        query: Some("What does this repo do?".to_string()),
        provider: None,
        model: None,
        root: PathBuf::from("."),
        config: None,
        format: OutputFormat::Text,
        output: None,
        timeout: None,
        max_iterations: None,
        temperature: None,
        verbose: false,
        quiet: true,
        init_config: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_and_model() {
        let args = Args::try_parse_from([
            "repo-qa",
            "--query",
            "hi",
            "--provider",
            "anthropic",
            "--model",
            "claude-opus-4",
        ])
        .unwrap();
        assert_eq!(args.provider, Some(Provider::Anthropic));
        assert_eq!(args.model.as_deref(), Some("claude-opus-4"));
        assert_eq!(args.format, OutputFormat::Text);
    }

    #[test]
    fn test_provider_is_case_insensitive() {
        let args =
            Args::try_parse_from(["repo-qa", "--query", "hi", "--provider", "Gemini"]).unwrap();
        assert_eq!(args.provider, Some(Provider::Gemini));
    }

    #[test]
    fn test_unknown_provider_is_usage_error() {
        let err = Args::try_parse_from(["repo-qa", "--query", "hi", "--provider", "bedrock"])
            .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_init_config_without_query() {
        let args = Args::try_parse_from(["repo-qa", "--init-config"]).unwrap();
        assert!(args.init_config);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let mut args = make_args();
        args.temperature = Some(3.0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.timeout = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.max_iterations = Some(0);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_missing_root() {
        let mut args = make_args();
        args.root = PathBuf::from("/definitely/not/here");
        let err = args.validate().unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn test_empty_query_passes_validation() {
        let mut args = make_args();
        args.query = Some("   ".to_string());
        assert!(args.validate().is_ok());
        assert_eq!(args.query_text(), "   ");
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        args.quiet = false;
        assert_eq!(args.log_level(false), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
    }

    #[test]
    fn test_config_verbose_raises_log_level() {
        let mut args = make_args();
        args.quiet = false;
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.quiet = true;
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }
}
