//! Handoff store: workflow state records attached to commits as git notes.
//!
//! Records live under the private ref `refs/notes/tdd-handoffs`, out of
//! tree, so attaching one never changes a commit's identity. Every mutation
//! the workflow makes alongside a commit is persisted here; on crash,
//! [`HandoffStore::find_latest`] walks the branch ancestry and resumes from
//! the first commit bearing a record.

use crate::error::{GitError, StoreError};
use crate::repo::GitRepository;
use crate::types::HandoffState;
use tracing::debug;

/// Private namespace the records are attached under.
pub const HANDOFF_NOTES_REF: &str = "refs/notes/tdd-handoffs";

const NOTES_REF_ARG: &str = "--ref=tdd-handoffs";

/// Reads and writes handoff records for one repository.
#[derive(Debug, Clone)]
pub struct HandoffStore {
    repo: GitRepository,
}

impl HandoffStore {
    #[must_use]
    pub fn new(repo: GitRepository) -> Self {
        Self { repo }
    }

    /// Attach `state` to `commit`, replacing any prior record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` for serialization or git failures.
    pub async fn write(&self, commit: &str, state: &HandoffState) -> Result<(), StoreError> {
        let json = serde_json::to_string(state).map_err(StoreError::Serialize)?;
        // Overwrite-by-replace: drop any prior record, then attach fresh.
        let _ = self
            .repo
            .git(&["notes", NOTES_REF_ARG, "remove", "--ignore-missing", commit])
            .await;
        self.repo
            .git(&["notes", NOTES_REF_ARG, "add", "-f", "-m", &json, commit])
            .await?;
        debug!(commit = %&commit[..commit.len().min(8)], phase = %state.phase, "handoff record written");
        Ok(())
    }

    /// The record attached to `commit`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Malformed` when a record exists but is not a
    /// valid handoff document.
    pub async fn read(&self, commit: &str) -> Result<Option<HandoffState>, StoreError> {
        let json = match self
            .repo
            .git(&["notes", NOTES_REF_ARG, "show", commit])
            .await
        {
            Ok(json) => json,
            Err(GitError::CommandFailed { .. }) => return Ok(None),
            Err(other) => return Err(other.into()),
        };
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| StoreError::Malformed {
                commit: commit.to_string(),
                reason: e.to_string(),
            })
    }

    /// Walk the ancestry of the current branch tip, newest first, and
    /// return the first commit bearing a record. Used for crash resume.
    pub async fn find_latest(&self) -> Result<Option<(String, HandoffState)>, StoreError> {
        for commit in self.ancestry().await? {
            if let Some(state) = self.read(&commit).await? {
                return Ok(Some((commit, state)));
            }
        }
        Ok(None)
    }

    /// Every record reachable from the tip, newest first. Used for audit.
    pub async fn list_all(&self) -> Result<Vec<(String, HandoffState)>, StoreError> {
        let mut records = Vec::new();
        for commit in self.ancestry().await? {
            if let Some(state) = self.read(&commit).await? {
                records.push((commit, state));
            }
        }
        Ok(records)
    }

    /// Remove the record for `commit`. Returns true iff one existed.
    pub async fn remove(&self, commit: &str) -> Result<bool, StoreError> {
        match self
            .repo
            .git(&["notes", NOTES_REF_ARG, "remove", commit])
            .await
        {
            Ok(_) => Ok(true),
            Err(GitError::CommandFailed { stderr, .. })
                if stderr.to_lowercase().contains("no note found") =>
            {
                Ok(false)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Commits reachable from HEAD, newest first. Empty before the first
    /// commit.
    async fn ancestry(&self) -> Result<Vec<String>, StoreError> {
        match self.repo.git(&["rev-list", "HEAD"]).await {
            Ok(output) => Ok(output.lines().map(str::to_string).collect()),
            Err(GitError::CommandFailed { .. }) => Ok(Vec::new()),
            Err(other) => Err(other.into()),
        }
    }
}
