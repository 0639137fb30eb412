use std::panic::{catch_unwind, AssertUnwindSafe};

use agent_provider::{ToolCallRequest, ToolResult};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::context::ToolContext;
use crate::definitions::{EXECUTE_SCRIPT_TOOL, INJECTED_ARGUMENTS, SAVE_TEXT_TOOL};
use crate::error::{ToolError, ToolErrorKind};
use crate::save::save_text;
use crate::script::{execute_script, ScriptRunner};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SaveTextArgs {
    content: String,
    filename: String,
    #[serde(default)]
    is_code: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ExecuteScriptArgs {
    path: String,
}

/// Executes each call in order and returns exactly one result per call.
///
/// A failing call never prevents later calls from running.
#[must_use]
pub fn invoke_tools(
    calls: &[ToolCallRequest],
    ctx: &ToolContext,
    runner: &ScriptRunner,
) -> Vec<ToolResult> {
    calls
        .iter()
        .map(|call| invoke_tool(call, ctx, runner))
        .collect()
}

/// Executes one call. Failures, panics included, become `is_error` results.
#[must_use]
pub fn invoke_tool(call: &ToolCallRequest, ctx: &ToolContext, runner: &ScriptRunner) -> ToolResult {
    debug!(call_id = %call.call_id, tool_name = %call.tool_name, "invoking tool");

    let outcome = guarded(|| dispatch(call, ctx, runner));
    match outcome {
        Ok((is_error, content)) => ToolResult {
            call_id: call.call_id.clone(),
            tool_name: call.tool_name.clone(),
            is_error,
            content,
        },
        Err(error) => {
            warn!(
                call_id = %call.call_id,
                tool_name = %call.tool_name,
                ex_type = error.kind.as_str(),
                message = %error.message,
                "tool call failed"
            );
            ToolResult::error(&call.call_id, &call.tool_name, error.to_value())
        }
    }
}

fn dispatch(
    call: &ToolCallRequest,
    ctx: &ToolContext,
    runner: &ScriptRunner,
) -> Result<(bool, Value), ToolError> {
    match call.tool_name.as_str() {
        SAVE_TEXT_TOOL => {
            let args: SaveTextArgs = decode_arguments(&call.arguments)?;
            let receipt = save_text(ctx, &args.content, &args.filename, args.is_code)?;
            Ok((false, to_payload(&receipt)?))
        }
        EXECUTE_SCRIPT_TOOL => {
            let args: ExecuteScriptArgs = decode_arguments(&call.arguments)?;
            let result = execute_script(ctx, runner, &args.path);
            Ok((!result.is_success(), to_payload(&result)?))
        }
        unknown => Err(ToolError::unknown_tool(unknown)),
    }
}

fn decode_arguments<T: DeserializeOwned>(arguments: &Value) -> Result<T, ToolError> {
    let mut map = match arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(ToolError::invalid_arguments(format!(
                "Tool arguments must be a JSON object, got {other}"
            )));
        }
    };

    for injected in INJECTED_ARGUMENTS {
        map.remove(*injected);
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|error| ToolError::invalid_arguments(error.to_string()))
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|error| {
        ToolError::new(
            ToolErrorKind::Io,
            format!("Failed encoding tool output: {error}"),
        )
    })
}

fn guarded<T>(run: impl FnOnce() -> Result<T, ToolError>) -> Result<T, ToolError> {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(outcome) => outcome,
        Err(panic) => Err(ToolError::panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{decode_arguments, guarded, ExecuteScriptArgs, SaveTextArgs};
    use crate::error::ToolErrorKind;

    #[test]
    fn injected_cwd_is_stripped_before_strict_decoding() {
        let args: ExecuteScriptArgs =
            decode_arguments(&json!({"path": "a.py", "cwd": "/elsewhere"})).expect("decodes");
        assert_eq!(args.path, "a.py");
    }

    #[test]
    fn unknown_argument_fields_are_rejected() {
        let error = decode_arguments::<SaveTextArgs>(&json!({
            "content": "x",
            "filename": "x.txt",
            "mode": "append",
        }))
        .expect_err("unknown field must fail");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
    }

    #[test]
    fn non_object_arguments_are_rejected() {
        let error = decode_arguments::<ExecuteScriptArgs>(&json!(["a.py"]))
            .expect_err("array arguments must fail");
        assert_eq!(error.kind, ToolErrorKind::InvalidArguments);
    }

    #[test]
    fn is_code_defaults_to_false() {
        let args: SaveTextArgs =
            decode_arguments(&json!({"content": "x", "filename": "x.txt"})).expect("decodes");
        assert!(!args.is_code);
    }

    #[test]
    fn panics_become_panicked_errors() {
        let error = guarded::<()>(|| panic!("tool blew up")).expect_err("panic is caught");
        assert_eq!(error.kind, ToolErrorKind::Panicked);
        assert_eq!(error.message, "tool blew up");
    }
}
