//! Git capability: the repository operations the orchestrator needs.
//!
//! The trait exists so the workflow driver is testable with fakes and spies;
//! [`GitRepository`] is the production implementation, shelling out to the
//! `git` binary argv-style (no shell string evaluation).

use crate::error::GitError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Repository operations used by the orchestrator.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Stage every modification, addition and deletion, then commit.
    ///
    /// Fails on a blank message or when there is nothing to commit.
    async fn commit_all(&self, message: &str) -> Result<String, GitError>;

    /// Commit id of the current branch tip, or `None` before the first
    /// commit.
    async fn latest_commit(&self) -> Result<Option<String>, GitError>;

    /// Hard-reset to `commit`, discarding working-tree and index changes.
    async fn rollback(&self, commit: &str) -> Result<(), GitError>;

    /// Unified diff of the changes introduced by `commit`.
    async fn diff(&self, commit: &str) -> Result<String, GitError>;

    /// Paths touched by `commit`.
    async fn changed_files(&self, commit: &str) -> Result<Vec<String>, GitError>;

    /// Full commit message of `commit`.
    async fn commit_message(&self, commit: &str) -> Result<String, GitError>;

    /// True when the working tree or index differs from HEAD.
    async fn has_uncommitted_changes(&self) -> Result<bool, GitError>;
}

/// Production repository backed by the `git` binary.
#[derive(Debug, Clone)]
pub struct GitRepository {
    root: PathBuf,
}

impl GitRepository {
    /// Open the repository at `root`.
    ///
    /// # Errors
    ///
    /// Returns `GitError::NotARepository` when `root` is not inside a git
    /// work tree.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, GitError> {
        let repo = Self { root: root.into() };
        match repo.git(&["rev-parse", "--git-dir"]).await {
            Ok(_) => Ok(repo),
            Err(_) => Err(GitError::NotARepository(repo.root)),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run one git command in the repository root, returning trimmed stdout.
    pub(crate) async fn git(&self, args: &[&str]) -> Result<String, GitError> {
        debug!(args = ?args, "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()
            .await
            .map_err(GitError::Spawn)?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout)
                .trim_end()
                .to_string())
        } else {
            Err(GitError::CommandFailed {
                op: args.first().copied().unwrap_or("git").to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[async_trait]
impl Repository for GitRepository {
    async fn commit_all(&self, message: &str) -> Result<String, GitError> {
        if message.trim().is_empty() {
            return Err(GitError::BlankMessage);
        }
        self.git(&["add", "-A"]).await?;
        self.git(&["commit", "-m", message]).await?;
        self.git(&["rev-parse", "HEAD"]).await
    }

    async fn latest_commit(&self) -> Result<Option<String>, GitError> {
        match self.git(&["rev-parse", "--verify", "--quiet", "HEAD"]).await {
            Ok(commit) => Ok(Some(commit)),
            // rev-parse --verify exits non-zero before the first commit.
            Err(GitError::CommandFailed { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }

    async fn rollback(&self, commit: &str) -> Result<(), GitError> {
        self.git(&["reset", "--hard", commit]).await?;
        Ok(())
    }

    async fn diff(&self, commit: &str) -> Result<String, GitError> {
        self.git(&["show", "--pretty=format:", "--patch", commit])
            .await
    }

    async fn changed_files(&self, commit: &str) -> Result<Vec<String>, GitError> {
        let output = self
            .git(&["show", "--pretty=format:", "--name-only", commit])
            .await?;
        Ok(output
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn commit_message(&self, commit: &str) -> Result<String, GitError> {
        self.git(&["log", "-1", "--pretty=%B", commit]).await
    }

    async fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let status = self.git(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }
}
