use std::fmt;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

/// Closed set of failure classes reported back to the agent as `ex_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    UnknownTool,
    InvalidArguments,
    PathEscape,
    Io,
    Panicked,
}

impl ToolErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::InvalidArguments => "invalid_arguments",
            Self::PathEscape => "path_escape",
            Self::Io => "io",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure payload, serialized as `{"ex_type": .., "message": ..}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {message}")]
pub struct ToolError {
    #[serde(rename = "ex_type")]
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    #[must_use]
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_tool(tool_name: &str) -> Self {
        Self::new(
            ToolErrorKind::UnknownTool,
            format!("Unknown tool '{tool_name}'"),
        )
    }

    #[must_use]
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    #[must_use]
    pub fn path_escape(path: &str) -> Self {
        Self::new(
            ToolErrorKind::PathEscape,
            format!("Path escapes working directory: {path}"),
        )
    }

    #[must_use]
    pub fn io(operation: &str, path: &Path, source: &std::io::Error) -> Self {
        Self::new(
            ToolErrorKind::Io,
            format!("Failed {operation} {}: {source}", path.display()),
        )
    }

    #[must_use]
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Panicked, message)
    }

    /// Renders the payload handed back to the agent.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "ex_type": self.kind.as_str(),
            "message": self.message,
        })
    }
}
