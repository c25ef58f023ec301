//! Anthropic Messages API backend with tool-use support.

use super::http::{self, HttpClient};
use super::{ChatMessage, ChatRequest, ChatResponse, ContentBlock, LlmClient, StopReason, ToolSchema, Usage};
use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 8192;

/// HTTP client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a backend with the default API endpoint.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` when the HTTP client cannot be
    /// constructed.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            http: HttpClient::new()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout,
        })
    }

    /// Override the API endpoint, for tests and proxies.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = ApiRequest {
            model: &request.model,
            max_tokens: if request.max_tokens == 0 {
                DEFAULT_MAX_TOKENS
            } else {
                request.max_tokens
            },
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages: &request.messages,
            tools: &request.tools,
        };

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "invoking Anthropic Messages API"
        );

        let builder = reqwest::Client::new()
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self.http.execute_with_retry(builder, self.timeout).await?;
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::MalformedResponse(http::redact(&e.to_string())))?;

        if body.content.is_empty() {
            return Err(LlmError::MalformedResponse(
                "reply has no content blocks".to_string(),
            ));
        }
        let stop_reason = body.stop_reason.ok_or_else(|| {
            LlmError::MalformedResponse("reply has no stop reason".to_string())
        })?;

        debug!(
            stop_reason = ?stop_reason,
            blocks = body.content.len(),
            "Anthropic reply received"
        );

        Ok(ChatResponse {
            content: body.content,
            stop_reason,
            usage: body.usage,
        })
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "slice_is_empty")]
    tools: &'a [ToolSchema],
}

fn slice_is_empty(tools: &&[ToolSchema]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<StopReason>,
    usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            model: "claude-sonnet-4-20250514".to_string(),
            system: "You are terse.".to_string(),
            messages: vec![ChatMessage::user(vec![ContentBlock::text("hi")])],
            tools: vec![ToolSchema {
                name: "Read".to_string(),
                description: "read".to_string(),
                input_schema: json!({"type": "object"}),
            }],
            max_tokens: 1024,
        };
        let body = ApiRequest {
            model: &request.model,
            max_tokens: request.max_tokens,
            system: Some(&request.system),
            messages: &request.messages,
            tools: &request.tools,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], json!("claude-sonnet-4-20250514"));
        assert_eq!(value["system"], json!("You are terse."));
        assert_eq!(value["messages"][0]["role"], json!("user"));
        assert_eq!(value["messages"][0]["content"][0]["type"], json!("text"));
        assert_eq!(value["tools"][0]["name"], json!("Read"));
        assert!(value["tools"][0]["input_schema"].is_object());
    }

    #[test]
    fn test_empty_tools_are_omitted() {
        let body = ApiRequest {
            model: "m",
            max_tokens: 16,
            system: None,
            messages: &[],
            tools: &[],
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("system").is_none());
    }

    #[test]
    fn test_response_parses_tool_use_reply() {
        let raw = json!({
            "id": "msg_1",
            "content": [
                {"type": "text", "text": "Let me check."},
                {"type": "tool_use", "id": "toolu_1", "name": "Read",
                 "input": {"file_path": "a.txt"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 20}
        });
        let parsed: ApiResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.stop_reason, Some(StopReason::ToolUse));
        assert_eq!(parsed.content.len(), 2);
        assert_eq!(parsed.usage.unwrap().output_tokens, 20);
        match &parsed.content[1] {
            ContentBlock::ToolUse { name, input, .. } => {
                assert_eq!(name, "Read");
                assert_eq!(input["file_path"], json!("a.txt"));
            }
            other => panic!("expected tool_use block, got {other:?}"),
        }
    }
}
