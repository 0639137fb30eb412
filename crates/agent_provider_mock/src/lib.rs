//! Deterministic scripted implementation of the shared `agent_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::sync::{Mutex, MutexGuard};

use agent_provider::{
    ProviderProfile, RunEvent, RunProvider, RunRequest, ToolCallRequest, ToolResult,
};
use serde_json::Value;

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

/// One step replayed by [`ScriptedProvider`] during every run.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Streams text as whitespace-delimited chunks.
    Text(String),
    /// Requests one host tool call.
    ToolCall { tool_name: String, arguments: Value },
    /// Aborts the run with a provider error.
    Fail(String),
}

impl ScriptStep {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn tool_call(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Deterministic provider that replays a fixed script on every run.
#[derive(Debug)]
pub struct ScriptedProvider {
    steps: Vec<ScriptStep>,
    observed: Mutex<Observed>,
}

#[derive(Debug, Default)]
struct Observed {
    requests: Vec<RunRequest>,
    tool_results: Vec<ToolResult>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            observed: Mutex::new(Observed::default()),
        }
    }

    /// Returns every request received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RunRequest> {
        lock_unpoisoned(&self.observed).requests.clone()
    }

    /// Returns every tool result handed back by the host, in call order.
    #[must_use]
    pub fn tool_results(&self) -> Vec<ToolResult> {
        lock_unpoisoned(&self.observed).tool_results.clone()
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new(vec![ScriptStep::text(
            "This is the mock provider. Configure a real agent runtime to analyze your data.\n",
        )])
    }
}

impl RunProvider for ScriptedProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "scripted".to_string(),
        }
    }

    fn run(
        &self,
        req: RunRequest,
        execute_tool: &mut dyn FnMut(ToolCallRequest) -> ToolResult,
        emit: &mut dyn FnMut(RunEvent),
    ) -> Result<(), String> {
        let run_id = req.run_id;
        lock_unpoisoned(&self.observed).requests.push(req);

        emit(RunEvent::Started { run_id });

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                ScriptStep::Text(text) => {
                    for token in split_tokens(text) {
                        emit(RunEvent::Chunk {
                            run_id,
                            text: token.to_string(),
                        });
                    }
                }
                ScriptStep::ToolCall {
                    tool_name,
                    arguments,
                } => {
                    let result = execute_tool(ToolCallRequest {
                        call_id: format!("call-{run_id}-{index}"),
                        tool_name: tool_name.clone(),
                        arguments: arguments.clone(),
                    });
                    lock_unpoisoned(&self.observed).tool_results.push(result);
                }
                ScriptStep::Fail(error) => return Err(error.clone()),
            }
        }

        emit(RunEvent::Finished { run_id });
        Ok(())
    }
}

fn split_tokens(text: &str) -> Vec<&str> {
    text.split_inclusive(|c: char| c == ' ' || c == '\n').collect()
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use agent_provider::{RunEvent, RunProvider, RunRequest, ToolCallRequest, ToolResult};
    use serde_json::json;

    use super::{ScriptStep, ScriptedProvider, MOCK_PROVIDER_ID};

    fn no_tools(call: ToolCallRequest) -> ToolResult {
        panic!("unexpected tool call {}", call.tool_name)
    }

    fn request(run_id: u64) -> RunRequest {
        RunRequest {
            run_id,
            messages: Vec::new(),
            instructions: "be helpful".to_string(),
        }
    }

    #[test]
    fn profile_reports_mock_provider_id() {
        assert_eq!(ScriptedProvider::default().profile().provider_id, MOCK_PROVIDER_ID);
    }

    #[test]
    fn text_steps_stream_as_chunks_that_rejoin_exactly() {
        let provider = ScriptedProvider::new(vec![ScriptStep::text("hello data\nworld")]);
        let mut events = Vec::new();
        provider
            .run(request(3), &mut no_tools, &mut |event| events.push(event))
            .expect("run should succeed");

        assert_eq!(events.first(), Some(&RunEvent::Started { run_id: 3 }));
        assert_eq!(events.last(), Some(&RunEvent::Finished { run_id: 3 }));
        let text: String = events
            .iter()
            .filter_map(|event| match event {
                RunEvent::Chunk { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(text, "hello data\nworld");
    }

    #[test]
    fn tool_steps_are_requested_in_order_with_unique_call_ids() {
        let provider = ScriptedProvider::new(vec![
            ScriptStep::tool_call("save_text", json!({"filename": "a.py"})),
            ScriptStep::tool_call("execute_script", json!({"path": "a.py"})),
        ]);
        let mut seen = Vec::new();
        provider
            .run(
                request(1),
                &mut |call| {
                    seen.push((call.call_id.clone(), call.tool_name.clone()));
                    ToolResult::success(call.call_id, call.tool_name, json!({}))
                },
                &mut |_| {},
            )
            .expect("run should succeed");

        assert_eq!(
            seen,
            vec![
                ("call-1-0".to_string(), "save_text".to_string()),
                ("call-1-1".to_string(), "execute_script".to_string()),
            ]
        );
        assert_eq!(provider.tool_results().len(), 2);
        assert_eq!(provider.requests()[0].instructions, "be helpful");
    }

    #[test]
    fn fail_step_returns_error_without_terminal_event() {
        let provider = ScriptedProvider::new(vec![ScriptStep::Fail("quota".to_string())]);
        let mut events = Vec::new();
        let error = provider
            .run(request(2), &mut no_tools, &mut |event| events.push(event))
            .expect_err("run should fail");

        assert_eq!(error, "quota");
        assert!(!events.iter().any(RunEvent::is_terminal));
    }
}
