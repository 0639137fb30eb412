//! Minimal provider-agnostic contract between the chat host and an agent runtime.
//!
//! This crate defines only the run lifecycle and the host-mediated tool-calling
//! envelopes. Planning, tool selection, and model transport belong to the
//! provider implementation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for one provider run.
pub type RunId = u64;

/// Provider-neutral model-facing message history item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum RunMessage {
    UserText {
        text: String,
    },
    AssistantText {
        text: String,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolResult {
        call_id: String,
        tool_name: String,
        content: Value,
        is_error: bool,
    },
}

impl RunMessage {
    /// Short role label used when rendering transcripts.
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::UserText { .. } => "human",
            Self::AssistantText { .. } => "ai",
            Self::ToolCall { .. } | Self::ToolResult { .. } => "tool",
        }
    }
}

/// Input required to start a provider run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: RunId,
    pub messages: Vec<RunMessage>,
    pub instructions: String,
}

/// Host tool definition exposed to providers for discovery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// Provider request envelope for one host tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Host tool call result returned back to providers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub call_id: String,
    pub tool_name: String,
    pub is_error: bool,
    pub content: Value,
}

impl ToolResult {
    /// Constructs a successful tool result.
    #[must_use]
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            is_error: false,
            content: content.into(),
        }
    }

    /// Constructs a tool error result.
    #[must_use]
    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            is_error: true,
            content: content.into(),
        }
    }

    /// Renders the content as the single JSON text blob stored in history.
    #[must_use]
    pub fn serialized_content(&self) -> String {
        self.content.to_string()
    }

    /// Converts the result into the history item keyed by its call id.
    #[must_use]
    pub fn into_message(self) -> RunMessage {
        RunMessage::ToolResult {
            call_id: self.call_id,
            tool_name: self.tool_name,
            content: self.content,
            is_error: self.is_error,
        }
    }
}

/// Provider-emitted lifecycle event for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Started { run_id: RunId },
    Chunk { run_id: RunId, text: String },
    Finished { run_id: RunId },
    Failed { run_id: RunId, error: String },
}

impl RunEvent {
    /// Returns the run identifier associated with this event.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        match self {
            Self::Started { run_id }
            | Self::Chunk { run_id, .. }
            | Self::Finished { run_id }
            | Self::Failed { run_id, .. } => *run_id,
        }
    }

    /// Returns true when this event terminates the run lifecycle.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished { .. } | Self::Failed { .. })
    }
}

/// Immutable metadata describing a run provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for executing one run request.
pub trait RunProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Executes a run request and emits lifecycle events in provider order.
    ///
    /// Providers request host tool execution synchronously through `execute_tool`.
    /// Calls are serial from the caller perspective; the host never runs two at once.
    fn run(
        &self,
        req: RunRequest,
        execute_tool: &mut dyn FnMut(ToolCallRequest) -> ToolResult,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RunEvent, RunMessage, ToolCallRequest, ToolResult};

    #[test]
    fn run_event_run_id_returns_event_run_id() {
        let run_id = 42;
        let events = [
            RunEvent::Started { run_id },
            RunEvent::Chunk {
                run_id,
                text: "partial".to_string(),
            },
            RunEvent::Finished { run_id },
            RunEvent::Failed {
                run_id,
                error: "failure".to_string(),
            },
        ];

        for event in events {
            assert_eq!(event.run_id(), run_id);
        }
    }

    #[test]
    fn run_event_terminal_detection_matches_lifecycle() {
        assert!(!RunEvent::Started { run_id: 1 }.is_terminal());
        assert!(!RunEvent::Chunk {
            run_id: 1,
            text: "hello".to_string(),
        }
        .is_terminal());
        assert!(RunEvent::Finished { run_id: 1 }.is_terminal());
        assert!(RunEvent::Failed {
            run_id: 1,
            error: "boom".to_string(),
        }
        .is_terminal());
    }

    #[test]
    fn tool_result_constructors_set_error_flag_and_content() {
        let success = ToolResult::success("call-1", "execute_script", json!({"status": "Success"}));
        assert!(!success.is_error);
        assert_eq!(success.content["status"], "Success");

        let error = ToolResult::error("call-2", "save_text", json!({"ex_type": "io"}));
        assert!(error.is_error);
        assert_eq!(error.call_id, "call-2");
    }

    #[test]
    fn serialized_content_is_compact_json_text() {
        let result = ToolResult::success("call-1", "save_text", json!({"filename": "a.csv"}));
        let decoded: serde_json::Value =
            serde_json::from_str(&result.serialized_content()).expect("content should be json");
        assert_eq!(decoded, json!({"filename": "a.csv"}));
    }

    #[test]
    fn into_message_keeps_call_id_and_error_flag() {
        let message = ToolResult::error("call-9", "execute_script", "boom").into_message();
        assert_eq!(
            message,
            RunMessage::ToolResult {
                call_id: "call-9".to_string(),
                tool_name: "execute_script".to_string(),
                content: json!("boom"),
                is_error: true,
            }
        );
        assert_eq!(message.role(), "tool");
    }

    #[test]
    fn tool_call_request_decodes_without_arguments() {
        let call: ToolCallRequest =
            serde_json::from_value(json!({"call_id": "c1", "tool_name": "execute_script"}))
                .expect("arguments should default");
        assert!(call.arguments.is_null());
    }
}
