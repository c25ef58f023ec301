//! Phase executor: runs one phase end-to-end.
//!
//! Builds the role prompt, invokes the agent, observes the commit the agent
//! is expected to have created, and attaches the handoff record to it. The
//! executor never rolls back on its own; rollback is a workflow-driver
//! decision.

use crate::agent::{self, AgentConfig};
use crate::handoff::HandoffStore;
use crate::llm::LlmClient;
use crate::prompts;
use crate::repo::Repository;
use crate::tools::ToolDispatcher;
use crate::types::{HandoffState, Phase, PhaseResult, TestResult};
use std::sync::Arc;
use tracing::{info, warn};

/// Executes single phases against one workspace.
pub struct PhaseExecutor {
    llm: Arc<dyn LlmClient>,
    repo: Arc<dyn Repository>,
    store: HandoffStore,
    dispatcher: ToolDispatcher,
    model: String,
    test_command: String,
}

impl PhaseExecutor {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmClient>,
        repo: Arc<dyn Repository>,
        store: HandoffStore,
        dispatcher: ToolDispatcher,
        model: impl Into<String>,
        test_command: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            repo,
            store,
            dispatcher,
            model: model.into(),
            test_command: test_command.into(),
        }
    }

    /// The agent configuration for `phase`. COMPLETE has no agent.
    #[must_use]
    pub fn agent_config_for(&self, phase: Phase) -> AgentConfig {
        AgentConfig {
            name: prompts::agent_name_for(phase).to_string(),
            system_prompt: prompts::system_prompt_for(phase).to_string(),
            tool_schemas: crate::tools::tool_schemas(),
            model: self.model.clone(),
        }
    }

    /// Run one phase to completion.
    ///
    /// On success the returned state carries the executed phase, its
    /// successor, cleared error fields and a fresh timestamp, and a handoff
    /// record is attached to the observed commit. Every failure inside the
    /// phase is folded into `PhaseResult { success: false }` with the state
    /// as it was at entry.
    pub async fn run_phase(
        &self,
        phase: Phase,
        state: &HandoffState,
        feature_request: Option<&str>,
    ) -> PhaseResult {
        if phase.is_terminal() {
            return PhaseResult::failed(phase, state.clone(), "COMPLETE is not an executable phase");
        }
        info!(phase = %phase, cycle = state.cycle_number, retry = state.retry_count, "running phase");

        let config = self.agent_config_for(phase);
        let prompt = prompts::build_prompt(phase, state, feature_request, &self.test_command);

        let response = match agent::run_agent(
            self.llm.as_ref(),
            &self.dispatcher,
            &config,
            &prompt,
        )
        .await
        {
            Ok(response) => response,
            Err(error) => return PhaseResult::failed(phase, state.clone(), error.to_string()),
        };

        // Safety net: agents are expected to commit their own work; pick up
        // anything they left behind so the handoff record has a commit to
        // attach to.
        match self.repo.has_uncommitted_changes().await {
            Ok(true) => {
                let message = format!(
                    "{}: automated commit of {} phase changes",
                    phase.commit_prefix(),
                    phase
                );
                if let Err(error) = self.repo.commit_all(&message).await {
                    warn!(phase = %phase, error = %error, "fallback commit failed");
                }
            }
            Ok(false) => {}
            Err(error) => return PhaseResult::failed(phase, state.clone(), error.to_string()),
        }

        let commit = match self.repo.latest_commit().await {
            Ok(commit) => commit,
            Err(error) => return PhaseResult::failed(phase, state.clone(), error.to_string()),
        };

        let mut updated = state.clone();
        updated.phase = phase;
        updated.next_phase = phase.next();
        updated.test_result = match phase {
            // RED ends with the new test failing; GREEN and REFACTOR end
            // with the suite passing.
            Phase::Red => Some(TestResult::Fail),
            Phase::Green | Phase::Refactor => Some(TestResult::Pass),
            _ => updated.test_result,
        };
        updated.clear_failure();

        match &commit {
            Some(commit_id) => {
                if let Err(error) = self.store.write(commit_id, &updated).await {
                    return PhaseResult::failed(phase, state.clone(), error.to_string());
                }
            }
            None => {
                warn!(phase = %phase, "phase finished without a commit; no handoff record written");
            }
        }

        PhaseResult::succeeded(phase, updated, commit, response.final_text)
    }

    /// Re-attach `state` to `commit`, replacing the record written at phase
    /// end. The workflow driver uses this after it finishes its own
    /// bookkeeping (test selection, completion lists) so resume sees the
    /// post-bookkeeping state.
    pub async fn refresh_record(
        &self,
        commit: Option<&str>,
        state: &HandoffState,
    ) -> Result<(), crate::error::StoreError> {
        match commit {
            Some(commit_id) => self.store.write(commit_id, state).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::handoff::HandoffStore;
    use crate::llm::{ChatRequest, ChatResponse, ContentBlock, StopReason};
    use crate::repo::GitRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    struct ScriptedLlm {
        replies: Mutex<Vec<Result<ChatResponse, LlmError>>>,
    }

    impl ScriptedLlm {
        fn new(mut replies: Vec<Result<ChatResponse, LlmError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
            }
        }
    }

    #[async_trait]
    impl crate::llm::LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            self.replies.lock().unwrap().pop().expect("script exhausted")
        }
    }

    fn text_reply(text: &str) -> Result<ChatResponse, LlmError> {
        Ok(ChatResponse {
            content: vec![ContentBlock::text(text)],
            stop_reason: StopReason::EndTurn,
            usage: None,
        })
    }

    async fn fixture(replies: Vec<Result<ChatResponse, LlmError>>) -> (TempDir, PhaseExecutor) {
        let dir = TempDir::new().unwrap();
        let run = |args: &[&str]| {
            let out = std::process::Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .output()
                .unwrap();
            assert!(out.status.success());
        };
        run(&["init", "--quiet"]);
        run(&["config", "user.email", "tdd@example.com"]);
        run(&["config", "user.name", "tdd"]);

        let repo = GitRepository::open(dir.path()).await.unwrap();
        let store = HandoffStore::new(repo.clone());
        let dispatcher = ToolDispatcher::new(dir.path().to_path_buf(), Duration::from_secs(10));
        let executor = PhaseExecutor::new(
            Arc::new(ScriptedLlm::new(replies)),
            Arc::new(repo),
            store,
            dispatcher,
            "test-model",
            "pytest",
        );
        (dir, executor)
    }

    #[tokio::test]
    async fn test_complete_phase_is_invalid_input() {
        let (_dir, executor) = fixture(vec![]).await;
        let result = executor
            .run_phase(Phase::Complete, &HandoffState::initial(), None)
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn test_successful_phase_without_commit_warns_but_succeeds() {
        let (_dir, executor) = fixture(vec![text_reply("done")]).await;
        let result = executor
            .run_phase(Phase::Plan, &HandoffState::initial(), Some("feature"))
            .await;
        assert!(result.success);
        assert_eq!(result.commit_id, None);
        assert_eq!(result.updated_state.phase, Phase::Plan);
        assert_eq!(result.updated_state.next_phase, Phase::Red);
    }

    #[tokio::test]
    async fn test_fallback_commit_picks_up_dirty_tree_and_writes_record() {
        let (dir, executor) = fixture(vec![text_reply("done")]).await;
        // The "agent" left changes without committing.
        std::fs::write(dir.path().join("test-list.md"), "- [ ] first\n").unwrap();

        let result = executor
            .run_phase(Phase::Plan, &HandoffState::initial(), Some("feature"))
            .await;
        assert!(result.success);
        let commit = result.commit_id.expect("fallback commit");

        let repo = GitRepository::open(dir.path()).await.unwrap();
        let message = crate::repo::Repository::commit_message(&repo, &commit)
            .await
            .unwrap();
        assert!(message.starts_with("plan:"));

        let store = HandoffStore::new(repo);
        let recorded = store.read(&commit).await.unwrap().unwrap();
        assert_eq!(recorded.phase, Phase::Plan);
        assert_eq!(recorded.retry_count, 0);
        assert!(recorded.error.is_none());
    }

    #[tokio::test]
    async fn test_agent_failure_returns_state_at_entry() {
        let (_dir, executor) =
            fixture(vec![Err(LlmError::Transport("boom".to_string()))]).await;
        let state = HandoffState::initial();
        let result = executor.run_phase(Phase::Plan, &state, None).await;
        assert!(!result.success);
        assert!(result.error_message.as_deref().unwrap().contains("boom"));
        assert_eq!(result.updated_state, state);
    }

    #[tokio::test]
    async fn test_red_phase_records_expected_fail_result() {
        let (dir, executor) = fixture(vec![text_reply("wrote failing test")]).await;
        std::fs::write(dir.path().join("x.txt"), "x").unwrap();
        let mut state = HandoffState::initial();
        state.current_test = Some(crate::types::TestCase::new("d", "t", "i"));

        let result = executor.run_phase(Phase::Red, &state, None).await;
        assert!(result.success);
        assert_eq!(result.updated_state.test_result, Some(TestResult::Fail));
        assert_eq!(result.updated_state.next_phase, Phase::Green);
    }
}
