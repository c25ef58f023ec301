//! CLI surface: argument parsing and command wiring.
//!
//! Exit codes: 0 success, 1 failure, 2 misuse. clap reports its own
//! argument errors with exit code 2, matching the misuse contract.

use crate::config::Config;
use crate::error::OrchestratorError;
use crate::executor::PhaseExecutor;
use crate::exit_codes::{exit_code_for, ExitCode};
use crate::handoff::HandoffStore;
use crate::llm::AnthropicClient;
use crate::recovery::TokioSleeper;
use crate::repo::{GitRepository, Repository};
use crate::tools::ToolDispatcher;
use crate::types::WorkflowResult;
use crate::workflow::WorkflowDriver;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "redgreen",
    version,
    about = "Autonomous TDD orchestrator: drives red-green-refactor cycles through an LLM"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Workspace root (defaults to $TDD_PROJECT_ROOT, then the current directory)
    #[arg(long, global = true)]
    pub project_root: Option<PathBuf>,

    /// Enable debug-level logging
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a workflow for a feature request (inline text, or a path ending in .md)
    Run {
        /// The feature to implement
        feature_request: String,
    },
    /// Resume an interrupted workflow from the latest handoff record
    Resume,
    /// Print the current workflow state
    Status,
    /// Print the handoff record history, newest first
    History,
    /// Hard-reset the workspace to a commit
    Rollback {
        /// Full 40-character commit hash
        commit: String,
    },
}

/// Execute the parsed command, returning the process exit code.
pub async fn run(cli: Cli) -> ExitCode {
    match dispatch(cli).await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            exit_code_for(&error)
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode, OrchestratorError> {
    let config = Config::load(cli.project_root)?;
    match cli.command {
        Command::Run { feature_request } => {
            let text = load_feature_request(&feature_request, &config)?;
            let driver = build_driver(&config).await?;
            Ok(report(driver.run(&text).await))
        }
        Command::Resume => {
            let driver = build_driver(&config).await?;
            Ok(report(driver.resume(None).await?))
        }
        Command::Status => {
            let store = open_store(&config).await?;
            let latest = store.find_latest().await?;
            print!("{}", crate::status::render_status(latest.as_ref()));
            Ok(ExitCode::Success)
        }
        Command::History => {
            let store = open_store(&config).await?;
            let records = store.list_all().await?;
            print!("{}", crate::status::render_history(&records));
            Ok(ExitCode::Success)
        }
        Command::Rollback { commit } => {
            if commit.len() != 40 || !commit.bytes().all(|b| b.is_ascii_hexdigit()) {
                eprintln!("error: rollback requires a full 40-character commit hash");
                return Ok(ExitCode::Misuse);
            }
            let repo = GitRepository::open(&config.project_root).await?;
            repo.rollback(&commit).await?;
            println!("Rolled back to {commit}");
            Ok(ExitCode::Success)
        }
    }
}

fn report(result: WorkflowResult) -> ExitCode {
    if result.success {
        println!(
            "Workflow complete: {} cycle(s), {} test(s) finished.",
            result.completed_cycles,
            result.final_state.completed_tests.len()
        );
        ExitCode::Success
    } else {
        eprintln!(
            "Workflow failed: {}",
            result
                .error_message
                .as_deref()
                .unwrap_or("no error message")
        );
        ExitCode::Failure
    }
}

/// A feature request argument is either inline text or, when it names an
/// existing `.md` file, that file's contents.
fn load_feature_request(argument: &str, config: &Config) -> Result<String, OrchestratorError> {
    if argument.ends_with(".md") {
        let path = {
            let direct = PathBuf::from(argument);
            if direct.is_file() {
                direct
            } else {
                config.project_root.join(argument)
            }
        };
        if path.is_file() {
            return std::fs::read_to_string(&path).map_err(|source| {
                OrchestratorError::Config(crate::error::ConfigError::Io { path, source })
            });
        }
    }
    Ok(argument.to_string())
}

async fn open_store(config: &Config) -> Result<HandoffStore, OrchestratorError> {
    let repo = GitRepository::open(&config.project_root).await?;
    Ok(HandoffStore::new(repo))
}

async fn build_driver(config: &Config) -> Result<WorkflowDriver, OrchestratorError> {
    let api_key = config.require_api_key()?;
    let test_command = config.require_test_command()?.to_string();
    let llm = Arc::new(
        AnthropicClient::new(api_key, config.llm_timeout).map_err(OrchestratorError::Llm)?,
    );

    let git = GitRepository::open(&config.project_root).await?;
    let store = HandoffStore::new(git.clone());
    let repo: Arc<dyn Repository> = Arc::new(git);
    let dispatcher = ToolDispatcher::new(config.project_root.clone(), config.bash_timeout);

    let executor = PhaseExecutor::new(
        llm,
        repo.clone(),
        store.clone(),
        dispatcher,
        config.model.clone(),
        test_command,
    );
    Ok(WorkflowDriver::new(
        executor,
        repo,
        store,
        Arc::new(TokioSleeper),
        config.max_retries,
    ))
}
