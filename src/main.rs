//! repo-qa - answer questions about a repository with an LLM agent
//!
//! A CLI tool that sends a query to the selected provider (OpenAI,
//! Anthropic or Gemini), lets the model explore the checkout with
//! read-only tools, and prints the answer to stdout.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Invocation error (provider call or agent run failed)
//!   2 - Input or configuration error (empty query, missing key, bad flags)

mod agent;
mod cli;
mod config;
mod dispatcher;
mod error;
mod models;
mod provider;
mod repo;
mod report;
mod scanner;
#[cfg(test)]
mod testing;

use anyhow::Context;
use cli::Args;
use config::{Config, CONFIG_FILE_NAME};
use dispatcher::{DispatchOptions, Dispatcher};
use error::{DispatchError, EXIT_INVOCATION, EXIT_USAGE};
use indicatif::{ProgressBar, ProgressStyle};
use models::InvocationRequest;
use provider::{Credentials, HttpModelFactory, ModelFactory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    // Must run before parsing so clap's env fallbacks see .env values
    let env_file = load_env_file(None);

    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(EXIT_USAGE);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        if let Err(e) = handle_init_config() {
            eprintln!("Error: {:#}", e);
            std::process::exit(EXIT_INVOCATION);
        }
        return;
    }

    let config = match prepare_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ {}", e);
            std::process::exit(e.exit_code());
        }
    };

    // Initialize logging
    init_logging(args.log_level(config.general.verbose));

    info!("repo-qa v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    if let Some(path) = env_file {
        info!("Loaded environment from {}", path.display());
    }

    // Credentials are read once and passed down explicitly
    let credentials = Credentials::from_env();
    let mut stdout = std::io::stdout();

    if let Err(e) = run(&args, config, &credentials, &HttpModelFactory, &mut stdout).await {
        error!("Query failed: {}", e);
        eprintln!("\n❌ {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Load a `.env` file (by default from the working directory or a parent)
/// without overriding variables that are already set.
fn load_env_file(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|_| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

/// Handle --init-config: generate a default .repo-qa.toml.
fn handle_init_config() -> anyhow::Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        anyhow::bail!(
            "{} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    eprintln!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    eprintln!("   Edit it to customize provider, model, tool limits, and more.");
    Ok(())
}

/// Initialize logging at `level`.
///
/// Logs go to stderr; stdout carries only the answer.
fn init_logging(level: tracing::Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load the config file, apply CLI overrides and check the result.
fn prepare_config(args: &Args) -> Result<Config, DispatchError> {
    let mut config =
        load_config(args).map_err(|e| DispatchError::Configuration(format!("{:#}", e)))?;
    config.merge_with_args(args);
    config
        .validate()
        .map_err(|e| DispatchError::Configuration(format!("{:#}", e)))?;
    Ok(config)
}

/// Answer one query and write the result to `out`.
async fn run<W: Write>(
    args: &Args,
    config: Config,
    credentials: &Credentials,
    factory: &dyn ModelFactory,
    out: &mut W,
) -> Result<(), DispatchError> {
    let provider = config.resolve_provider(args.provider);
    let model = config.resolve_model(provider, args.model.as_deref());

    // Rejects an empty query before anything touches a provider
    let request = InvocationRequest::new(args.query_text(), provider, model)?;
    info!(
        "Provider: {} | Model: {}",
        request.provider(),
        request.effective_model()
    );

    log_repository_context(&args.root);

    let base_url = dispatcher::resolve_base_url(provider, &config, |var| std::env::var(var).ok());
    let options = DispatchOptions::from_config(&config, args.root.clone(), base_url);

    let progress = create_spinner(args.quiet);
    let dispatcher =
        Dispatcher::new(factory, credentials, options).with_progress(progress.clone());

    let result = dispatcher.dispatch(&request).await;
    progress.finish_and_clear();
    let answer = result?;

    let rendered = report::render_answer(&answer, args.format)
        .map_err(|e| DispatchError::Invocation(format!("{:#}", e)))?;

    if let Some(ref path) = args.output {
        report::save_answer(&rendered, path)
            .map_err(|e| DispatchError::Configuration(format!("{:#}", e)))?;
        info!("Answer saved to: {}", path.display());
    }

    report::write_answer(out, &rendered)
        .map_err(|e| DispatchError::Invocation(format!("{:#}", e)))?;

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> anyhow::Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try the repository root
    match Config::load_from_repo(&args.root)? {
        Some(config) => Ok(config),
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

/// Log which checkout the agent is about to read.
fn log_repository_context(root: &Path) {
    match repo::open(root) {
        Ok(repository) => {
            let branch =
                repo::current_branch(&repository).unwrap_or_else(|| "detached".to_string());
            let commit =
                repo::current_commit(&repository).unwrap_or_else(|| "none".to_string());
            info!("Repository at {} ({} @ {})", root.display(), branch, commit);
        }
        Err(e) => warn!("{:#}; git_log will be unavailable", e),
    }
}

/// Spinner on stderr while the agent works; hidden in quiet mode.
fn create_spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message("Thinking...");
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::make_args;
    use crate::provider::Provider;
    use crate::testing::StubFactory;
    use tempfile::TempDir;

    fn repo_with_readme() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\n").unwrap();
        dir
    }

    async fn run_query(
        args: &Args,
        credentials: &Credentials,
        factory: &StubFactory,
        out: &mut Vec<u8>,
    ) -> Result<(), DispatchError> {
        let config = prepare_config(args)?;
        run(args, config, credentials, factory, out).await
    }

    fn args_for(dir: &TempDir, query: &str, provider: Provider) -> Args {
        let mut args = make_args();
        args.root = dir.path().to_path_buf();
        args.query = Some(query.to_string());
        args.provider = Some(provider);
        args
    }

    #[tokio::test]
    async fn test_answer_goes_to_output_verbatim() {
        let dir = repo_with_readme();
        let args = args_for(&dir, "What does README say?", Provider::OpenAI);
        let credentials = Credentials::default().with_key(Provider::OpenAI, "sk-test");
        let factory = StubFactory::answering("X");

        let mut out = Vec::new();
        run_query(&args, &credentials, &factory, &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap().trim_end(), "X");
    }

    #[tokio::test]
    async fn test_empty_query_makes_no_provider_call() {
        let dir = repo_with_readme();
        let args = args_for(&dir, "  ", Provider::OpenAI);
        let credentials = Credentials::default().with_key(Provider::OpenAI, "sk-test");
        let factory = StubFactory::answering("X");

        let mut out = Vec::new();
        let err = run_query(&args, &credentials, &factory, &mut out).await.unwrap_err();

        assert!(matches!(err, DispatchError::Input(_)));
        assert_eq!(err.exit_code(), 2);
        assert!(factory.created().is_empty());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_missing_credential_names_variable() {
        let dir = repo_with_readme();
        let args = args_for(&dir, "What does README say?", Provider::Gemini);
        let factory = StubFactory::answering("X");

        let mut out = Vec::new();
        let err = run_query(&args, &Credentials::default(), &factory, &mut out)
            .await
            .unwrap_err();

        assert_ne!(err.exit_code(), 0);
        assert!(err.to_string().contains("GEMINI_API_KEY"));
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_config_file_selects_provider_and_model() {
        let dir = repo_with_readme();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[model]\nprovider = \"anthropic\"\nname = \"claude-opus-4\"\n",
        )
        .unwrap();

        let mut args = args_for(&dir, "q", Provider::OpenAI);
        args.provider = None;
        let credentials = Credentials::default().with_key(Provider::Anthropic, "sk-ant");
        let factory = StubFactory::answering("ok");

        let mut out = Vec::new();
        run_query(&args, &credentials, &factory, &mut out).await.unwrap();

        let created = factory.created();
        assert_eq!(created[0].provider, Provider::Anthropic);
        assert_eq!(created[0].model, "claude-opus-4");
    }

    #[tokio::test]
    async fn test_json_format_and_output_file() {
        let dir = repo_with_readme();
        let output_path = dir.path().join("answer.json");
        let mut args = args_for(&dir, "q", Provider::Anthropic);
        args.format = cli::OutputFormat::Json;
        args.output = Some(output_path.clone());
        let credentials = Credentials::default().with_key(Provider::Anthropic, "sk-ant");
        let factory = StubFactory::answering("Y");

        let mut out = Vec::new();
        run_query(&args, &credentials, &factory, &mut out).await.unwrap();

        let printed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(printed["answer"], "Y");
        assert_eq!(printed["provider"], "anthropic");
        assert_eq!(printed["model"], "claude-4.5-sonnet");

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(output_path).unwrap()).unwrap();
        assert_eq!(saved["answer"], "Y");
    }

    #[tokio::test]
    async fn test_broken_config_is_configuration_error() {
        let dir = repo_with_readme();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[model\n").unwrap();
        let args = args_for(&dir, "q", Provider::OpenAI);
        let credentials = Credentials::default().with_key(Provider::OpenAI, "sk-test");
        let factory = StubFactory::answering("X");

        let mut out = Vec::new();
        let err = run_query(&args, &credentials, &factory, &mut out).await.unwrap_err();

        assert!(matches!(err, DispatchError::Configuration(_)));
        assert!(factory.created().is_empty());
    }

    #[tokio::test]
    async fn test_zero_limits_in_config_are_configuration_errors() {
        let dir = repo_with_readme();
        let args = args_for(&dir, "q", Provider::OpenAI);
        let credentials = Credentials::default().with_key(Provider::OpenAI, "sk-test");

        for content in ["[model]\nmax_iterations = 0\n", "[model]\ntimeout_seconds = 0\n"] {
            std::fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
            let factory = StubFactory::answering("X");

            let mut out = Vec::new();
            let err = run_query(&args, &credentials, &factory, &mut out)
                .await
                .unwrap_err();

            assert!(matches!(err, DispatchError::Configuration(_)));
            assert_eq!(err.exit_code(), 2);
            assert!(factory.created().is_empty());
        }
    }

    #[test]
    fn test_verbose_config_reaches_log_level() {
        let dir = repo_with_readme();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "[general]\nverbose = true\n").unwrap();
        let mut args = args_for(&dir, "q", Provider::OpenAI);
        args.quiet = false;

        let config = prepare_config(&args).unwrap();
        assert_eq!(args.log_level(config.general.verbose), tracing::Level::DEBUG);
    }

    #[test]
    fn test_env_file_feeds_credentials() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(
            &path,
            "ANTHROPIC_API_KEY=sk-ant-from-file\nREPO_QA_ENV_FILE_MARKER=first\n",
        )
        .unwrap();

        assert_eq!(load_env_file(Some(&path)), Some(path.clone()));
        assert_eq!(std::env::var("REPO_QA_ENV_FILE_MARKER").as_deref(), Ok("first"));
        assert!(Credentials::from_env().api_key(Provider::Anthropic).is_ok());

        // Variables already set win over later files.
        let second = dir.path().join("second.env");
        std::fs::write(&second, "REPO_QA_ENV_FILE_MARKER=second\n").unwrap();
        load_env_file(Some(&second));
        assert_eq!(std::env::var("REPO_QA_ENV_FILE_MARKER").as_deref(), Ok("first"));

        assert_eq!(load_env_file(Some(&dir.path().join("missing.env"))), None);
    }
}
