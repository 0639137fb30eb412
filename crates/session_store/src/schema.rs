use std::fmt;
use std::str::FromStr;

use agent_provider::RunMessage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle state of a session record. Deletion is soft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Deleted,
}

impl SessionStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            // Older catalogs wrote the verb form.
            "deleted" | "delete" => Ok(Self::Deleted),
            other => Err(format!("unknown session status '{other}'")),
        }
    }
}

/// Persisted metadata for one conversation and its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    pub created: String,
    pub updated: String,
    /// Working directory, relative to the cache root.
    pub folder: String,
    pub status: SessionStatus,
}

/// One file received from the user for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Per-file outcome of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    pub name: String,
    pub content_type: String,
    pub outcome: UploadOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Saved,
    Failed { kind: String, message: String },
}

impl UploadStatus {
    #[must_use]
    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Saved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRecordType {
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRecordType {
    Entry,
}

/// First line of every conversation log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogHeader {
    #[serde(rename = "type")]
    pub record_type: LogRecordType,
    pub version: u32,
    pub session_id: String,
    pub created_at: String,
}

impl LogHeader {
    #[must_use]
    pub fn v1(session_id: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            record_type: LogRecordType::Session,
            version: 1,
            session_id: session_id.into(),
            created_at: created_at.into(),
        }
    }
}

/// Unknown fields are rejected by the flattened [`LogEntryKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub record_type: EntryRecordType,
    pub id: String,
    pub parent_id: Option<String>,
    pub ts: String,
    #[serde(flatten)]
    pub kind: LogEntryKind,
}

impl LogEntry {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<impl Into<String>>,
        ts: impl Into<String>,
        kind: LogEntryKind,
    ) -> Self {
        Self {
            record_type: EntryRecordType::Entry,
            id: id.into(),
            parent_id: parent_id.map(Into::into),
            ts: ts.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum LogEntryKind {
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

impl From<RunMessage> for LogEntryKind {
    fn from(message: RunMessage) -> Self {
        match message {
            RunMessage::UserText { text } => Self::UserText { text },
            RunMessage::AssistantText { text } => Self::AssistantText { text },
            RunMessage::ToolCall {
                call_id,
                tool_name,
                arguments,
            } => Self::ToolCall {
                call_id,
                tool_name,
                arguments,
            },
            RunMessage::ToolResult {
                call_id,
                tool_name,
                content,
                is_error,
            } => Self::ToolResult {
                call_id,
                tool_name,
                content,
                is_error,
            },
        }
    }
}

impl From<LogEntryKind> for RunMessage {
    fn from(kind: LogEntryKind) -> Self {
        match kind {
            LogEntryKind::UserText { text } => Self::UserText { text },
            LogEntryKind::AssistantText { text } => Self::AssistantText { text },
            LogEntryKind::ToolCall {
                call_id,
                tool_name,
                arguments,
            } => Self::ToolCall {
                call_id,
                tool_name,
                arguments,
            },
            LogEntryKind::ToolResult {
                call_id,
                tool_name,
                content,
                is_error,
            } => Self::ToolResult {
                call_id,
                tool_name,
                content,
                is_error,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum JsonLine {
    Session(LogHeader),
    Entry(LogEntry),
}
