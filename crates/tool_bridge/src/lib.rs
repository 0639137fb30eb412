//! Host tools the agent may call while answering questions about a session's data.
//!
//! Two tools are exposed: `save_text` persists generated text (scripts land in the
//! session's reserved `.hidden` folder) and `execute_script` runs a saved script as a
//! child process inside the session's working directory. [`invoke_tools`] is the
//! dispatch boundary between provider tool-call envelopes and those functions.
//!
//! Every operation receives an explicit [`ToolContext`]. The host process never
//! changes its own current directory; scripts get theirs on the launch call.

mod context;
mod definitions;
mod dispatch;
mod error;
mod paths;
mod save;
mod script;

pub use context::ToolContext;
pub use definitions::{tool_definitions, EXECUTE_SCRIPT_TOOL, INJECTED_ARGUMENTS, SAVE_TEXT_TOOL};
pub use dispatch::{invoke_tool, invoke_tools};
pub use error::{ToolError, ToolErrorKind};
pub use save::{save_text, SaveCategory, SaveReceipt};
pub use script::{
    execute_script, CodeResult, ScriptRunner, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_SCRIPT_TIMEOUT_SEC,
};
