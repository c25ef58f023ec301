//! Agent invoker: runs one role-persona agent to a terminal stop.
//!
//! The four roles are data, not types: an [`AgentConfig`] value per phase,
//! dispatched by enum lookup in the phase executor. One invocation is a
//! strictly sequential conversation: model reply, tool execution in emission
//! order, tool-result turn, next reply, until the stop reason is no longer
//! `tool_use`.

use crate::error::AgentError;
use crate::llm::{ChatMessage, ChatRequest, ContentBlock, LlmClient, StopReason, ToolSchema};
use crate::tools::{ToolDispatcher, ToolResult};
use serde_json::Value;
use tracing::{debug, warn};

/// Safety net: an invocation that keeps requesting tools past this many
/// model replies is treated as a failed invocation.
pub const MAX_AGENT_TURNS: u32 = 50;

const MAX_TOKENS: u32 = 8192;

/// One agent role. Roles share the tool interface and differ only in their
/// system prompt.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub system_prompt: String,
    pub tool_schemas: Vec<ToolSchema>,
    pub model: String,
}

/// A record of one tool call the model requested.
#[derive(Debug, Clone)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub input: Value,
}

/// Everything observed across one complete invocation.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// Concatenated text blocks of the terminal reply.
    pub final_text: String,
    /// Number of model replies.
    pub turns: u32,
    /// Every tool call requested, in execution order.
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Run one agent to completion.
///
/// Tool failures never abort the invocation: they are delivered to the model
/// as error-typed tool results so it can recover in the same conversation.
/// Transport, rate-limit and timeout failures abort immediately.
///
/// # Errors
///
/// Returns `AgentError` for LLM failures or when the turn cap is exceeded.
pub async fn run_agent(
    llm: &dyn LlmClient,
    dispatcher: &ToolDispatcher,
    config: &AgentConfig,
    user_prompt: &str,
) -> Result<AgentResponse, AgentError> {
    let mut messages = vec![ChatMessage::user(vec![ContentBlock::text(user_prompt)])];
    let mut turns = 0u32;
    let mut tool_calls = Vec::new();

    loop {
        if turns >= MAX_AGENT_TURNS {
            warn!(agent = %config.name, turns, "turn cap exceeded");
            return Err(AgentError::TurnLimitExceeded {
                name: config.name.clone(),
                limit: MAX_AGENT_TURNS,
            });
        }

        let request = ChatRequest {
            model: config.model.clone(),
            system: config.system_prompt.clone(),
            messages: messages.clone(),
            tools: config.tool_schemas.clone(),
            max_tokens: MAX_TOKENS,
        };
        let reply = llm.complete(&request).await?;
        turns += 1;

        if reply.stop_reason != StopReason::ToolUse {
            debug!(agent = %config.name, turns, "agent reached terminal reply");
            return Ok(AgentResponse {
                final_text: reply.text(),
                turns,
                tool_calls,
            });
        }

        // Execute every tool-use block sequentially, in emission order; a
        // later call may depend on an earlier call's side effects.
        let mut result_blocks = Vec::new();
        for block in &reply.content {
            if let ContentBlock::ToolUse { id, name, input } = block {
                tool_calls.push(ToolCallRecord {
                    id: id.clone(),
                    name: name.clone(),
                    input: input.clone(),
                });
                let result = dispatcher.dispatch(name, input).await;
                if let ToolResult::Failure { error } = &result {
                    debug!(agent = %config.name, tool = %name, error = %error, "tool call failed");
                }
                result_blocks.push(ContentBlock::tool_result(
                    id.clone(),
                    result.text(),
                    !result.is_success(),
                ));
            }
        }

        messages.push(ChatMessage::assistant(reply.content));
        messages.push(ChatMessage::user(result_blocks));
    }
}
