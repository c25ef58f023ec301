//! Shared fixtures for integration tests: a scripted LLM, a recording
//! sleeper, a rollback-counting repository spy, and a workflow harness over
//! a real temporary git repository.

#![allow(dead_code)]

use async_trait::async_trait;
use redgreen::error::{GitError, LlmError};
use redgreen::executor::PhaseExecutor;
use redgreen::handoff::HandoffStore;
use redgreen::llm::{ChatRequest, ChatResponse, ContentBlock, LlmClient, StopReason};
use redgreen::recovery::Sleeper;
use redgreen::repo::{GitRepository, Repository};
use redgreen::tools::ToolDispatcher;
use redgreen::workflow::WorkflowDriver;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Scripted LLM: pops the next reply for each `complete` call.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<Result<ChatResponse, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("LLM script exhausted")
    }
}

/// Sleeper that records requested delays instead of waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Repository spy: delegates to a real [`GitRepository`] and records every
/// rollback target.
pub struct SpyRepository {
    inner: GitRepository,
    pub rollbacks: Mutex<Vec<String>>,
}

impl SpyRepository {
    pub fn new(inner: GitRepository) -> Self {
        Self {
            inner,
            rollbacks: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Repository for SpyRepository {
    async fn commit_all(&self, message: &str) -> Result<String, GitError> {
        self.inner.commit_all(message).await
    }

    async fn latest_commit(&self) -> Result<Option<String>, GitError> {
        self.inner.latest_commit().await
    }

    async fn rollback(&self, commit: &str) -> Result<(), GitError> {
        self.rollbacks.lock().unwrap().push(commit.to_string());
        self.inner.rollback(commit).await
    }

    async fn diff(&self, commit: &str) -> Result<String, GitError> {
        self.inner.diff(commit).await
    }

    async fn changed_files(&self, commit: &str) -> Result<Vec<String>, GitError> {
        self.inner.changed_files(commit).await
    }

    async fn commit_message(&self, commit: &str) -> Result<String, GitError> {
        self.inner.commit_message(commit).await
    }

    async fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        self.inner.has_uncommitted_changes().await
    }
}

/// A full workflow setup over a fresh temporary git repository.
pub struct Harness {
    pub dir: TempDir,
    pub git: GitRepository,
    pub store: HandoffStore,
    pub driver: WorkflowDriver,
    pub sleeper: Arc<RecordingSleeper>,
    pub spy: Arc<SpyRepository>,
}

pub fn git_in(dir: &std::path::Path, args: &[&str]) {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
}

pub async fn harness(replies: Vec<Result<ChatResponse, LlmError>>) -> Harness {
    let dir = TempDir::new().unwrap();
    git_in(dir.path(), &["init", "--quiet"]);
    git_in(dir.path(), &["config", "user.email", "tdd@example.com"]);
    git_in(dir.path(), &["config", "user.name", "tdd"]);

    let git = GitRepository::open(dir.path()).await.unwrap();
    let store = HandoffStore::new(git.clone());
    let spy = Arc::new(SpyRepository::new(git.clone()));
    let sleeper = Arc::new(RecordingSleeper::default());
    let dispatcher = ToolDispatcher::new(dir.path().to_path_buf(), Duration::from_secs(30));

    let repo: Arc<dyn Repository> = spy.clone();
    let executor = PhaseExecutor::new(
        Arc::new(ScriptedLlm::new(replies)),
        repo.clone(),
        store.clone(),
        dispatcher,
        "test-model",
        "pytest",
    );
    let driver = WorkflowDriver::new(executor, repo, store.clone(), sleeper.clone(), 3);

    Harness {
        dir,
        git,
        store,
        driver,
        sleeper,
        spy,
    }
}

// Reply builders ------------------------------------------------------------

pub fn text_reply(text: &str) -> Result<ChatResponse, LlmError> {
    Ok(ChatResponse {
        content: vec![ContentBlock::text(text)],
        stop_reason: StopReason::EndTurn,
        usage: None,
    })
}

/// A tool-use turn that writes a file and commits everything.
pub fn commit_reply(file: &str, content: &str, message: &str) -> Result<ChatResponse, LlmError> {
    Ok(ChatResponse {
        content: vec![
            ContentBlock::ToolUse {
                id: format!("toolu_write_{file}"),
                name: "Write".to_string(),
                input: json!({"file_path": file, "content": content}),
            },
            ContentBlock::ToolUse {
                id: format!("toolu_commit_{file}"),
                name: "Bash".to_string(),
                input: json!({"command": format!("git add -A && git commit -q -m '{message}'")}),
            },
        ],
        stop_reason: StopReason::ToolUse,
        usage: None,
    })
}

/// Terminal PLAN reply selecting a test.
pub fn selection_reply(description: &str, test_file: &str, impl_file: &str) -> Result<ChatResponse, LlmError> {
    let selection = json!({
        "currentTest": {
            "description": description,
            "testFile": test_file,
            "implFile": impl_file,
        }
    });
    text_reply(&format!(
        "Selected the next test.\n\n```json\n{selection}\n```\n"
    ))
}

/// Terminal PLAN reply reporting completion.
pub fn no_more_tests_reply() -> Result<ChatResponse, LlmError> {
    text_reply("All tests are checked off.\n\n{\"currentTest\": null}\n")
}
