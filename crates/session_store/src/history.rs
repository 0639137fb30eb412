use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use agent_provider::RunMessage;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{is_rfc3339, now_rfc3339};
use crate::error::SessionStoreError;
use crate::paths::conversation_log_path;
use crate::schema::{JsonLine, LogEntry, LogEntryKind, LogHeader};

/// Append-only JSONL conversation history for one session.
pub struct ConversationLog {
    path: PathBuf,
    file: File,
    header: LogHeader,
    entries: Vec<LogEntry>,
    current_leaf_id: Option<String>,
}

impl ConversationLog {
    /// Creates a new log for `session_id` under `log_root`. Fails if one already exists.
    pub fn create(log_root: &Path, session_id: &str) -> Result<Self, SessionStoreError> {
        fs::create_dir_all(log_root).map_err(|source| {
            SessionStoreError::io("creating conversation log root", log_root, source)
        })?;

        let path = conversation_log_path(log_root, session_id);
        let mut file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    SessionStoreError::LogAlreadyExists { path: path.clone() }
                } else {
                    SessionStoreError::io("creating conversation log", &path, source)
                }
            })?;

        let header = LogHeader::v1(session_id, now_rfc3339()?);
        write_json_line(&path, &mut file, &header)?;
        debug!(session_id, path = %path.display(), "created conversation log");

        Ok(Self {
            path,
            file,
            header,
            entries: Vec::new(),
            current_leaf_id: None,
        })
    }

    /// Opens the log for `session_id`, creating an empty one when none exists yet.
    pub fn open_or_create(log_root: &Path, session_id: &str) -> Result<Self, SessionStoreError> {
        let path = conversation_log_path(log_root, session_id);
        if path.exists() {
            Self::open(&path)
        } else {
            Self::create(log_root, session_id)
        }
    }

    pub fn open(path: &Path) -> Result<Self, SessionStoreError> {
        let path = path.to_path_buf();
        let read_file = File::open(&path)
            .map_err(|source| SessionStoreError::io("opening conversation log", &path, source))?;
        let reader = BufReader::new(read_file);

        let mut header: Option<LogHeader> = None;
        let mut entries_with_lines: Vec<(usize, LogEntry)> = Vec::new();
        let mut index_by_id = HashMap::new();

        for (line_index, line_result) in reader.lines().enumerate() {
            let line_number = line_index + 1;
            let line = line_result
                .map_err(|source| SessionStoreError::io_line(&path, line_number, source))?;
            let parsed = parse_json_line(&path, line_number, &line)?;

            if line_number == 1 {
                match parsed {
                    JsonLine::Session(parsed_header) => {
                        validate_header_line(&path, line_number, &parsed_header)?;
                        header = Some(parsed_header);
                    }
                    JsonLine::Entry(_) => {
                        return Err(SessionStoreError::InvalidHeaderRecord {
                            path,
                            line: line_number,
                        });
                    }
                }

                continue;
            }

            match parsed {
                JsonLine::Session(_) => {
                    return Err(SessionStoreError::InvalidEntryRecord {
                        path,
                        line: line_number,
                    });
                }
                JsonLine::Entry(entry) => {
                    validate_entry_line(&path, line_number, &entry)?;
                    if index_by_id.contains_key(&entry.id) {
                        return Err(SessionStoreError::DuplicateEntryId {
                            path,
                            line: line_number,
                            id: entry.id,
                        });
                    }

                    index_by_id.insert(entry.id.clone(), entries_with_lines.len());
                    entries_with_lines.push((line_number, entry));
                }
            }
        }

        let header =
            header.ok_or_else(|| SessionStoreError::MissingHeader { path: path.clone() })?;
        validate_entry_graph(&path, &entries_with_lines, &index_by_id)?;

        let entries = entries_with_lines
            .into_iter()
            .map(|(_, entry)| entry)
            .collect::<Vec<_>>();
        let current_leaf_id = entries.last().map(|entry| entry.id.clone());

        let file = OpenOptions::new()
            .append(true)
            .open(&path)
            .map_err(|source| {
                SessionStoreError::io("opening conversation log for append", &path, source)
            })?;

        Ok(Self {
            path,
            file,
            header,
            entries,
            current_leaf_id,
        })
    }

    /// Appends one entry chained to the current leaf and returns it.
    pub fn append(&mut self, kind: LogEntryKind) -> Result<&LogEntry, SessionStoreError> {
        let entry = LogEntry::new(
            Uuid::new_v4().to_string(),
            self.current_leaf_id.clone(),
            now_rfc3339()?,
            kind,
        );
        write_json_line(&self.path, &mut self.file, &entry)?;

        self.current_leaf_id = Some(entry.id.clone());
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Appends a provider-neutral message.
    pub fn append_message(&mut self, message: RunMessage) -> Result<&LogEntry, SessionStoreError> {
        self.append(message.into())
    }

    /// Replays the full history as provider-neutral messages, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<RunMessage> {
        self.entries
            .iter()
            .map(|entry| RunMessage::from(entry.kind.clone()))
            .collect()
    }

    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    #[must_use]
    pub fn current_leaf_id(&self) -> Option<&str> {
        self.current_leaf_id.as_deref()
    }
}

fn write_json_line<T: serde::Serialize>(
    path: &Path,
    file: &mut File,
    value: &T,
) -> Result<(), SessionStoreError> {
    let mut line = serde_json::to_string(value)
        .map_err(|source| SessionStoreError::json_serialize(path, source))?;
    line.push('\n');
    file.write_all(line.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|source| SessionStoreError::io("appending conversation line", path, source))
}

pub(crate) fn parse_json_line(
    path: &Path,
    line_number: usize,
    line: &str,
) -> Result<JsonLine, SessionStoreError> {
    let value = serde_json::from_str::<Value>(line)
        .map_err(|source| SessionStoreError::json_line(path, line_number, source))?;

    let parsed = match value.get("type").and_then(Value::as_str) {
        Some("session") => serde_json::from_value(value).map(JsonLine::Session),
        Some("entry") => serde_json::from_value(value).map(JsonLine::Entry),
        _ => Err(<serde_json::Error as serde::de::Error>::custom(
            "expected record type 'session' or 'entry'",
        )),
    };

    parsed.map_err(|source| SessionStoreError::json_line(path, line_number, source))
}

pub(crate) fn validate_header_line(
    path: &Path,
    line_number: usize,
    header: &LogHeader,
) -> Result<(), SessionStoreError> {
    if header.version != 1 {
        return Err(SessionStoreError::UnsupportedVersion {
            path: path.to_path_buf(),
            line: line_number,
            found: header.version,
        });
    }

    validate_rfc3339(path, line_number, "created_at", &header.created_at)
}

pub(crate) fn validate_entry_line(
    path: &Path,
    line_number: usize,
    entry: &LogEntry,
) -> Result<(), SessionStoreError> {
    validate_rfc3339(path, line_number, "ts", &entry.ts)
}

pub(crate) fn validate_entry_graph(
    path: &Path,
    entries_with_lines: &[(usize, LogEntry)],
    index_by_id: &HashMap<String, usize>,
) -> Result<(), SessionStoreError> {
    for (line_number, entry) in entries_with_lines {
        if let Some(parent_id) = &entry.parent_id {
            if !index_by_id.contains_key(parent_id) {
                return Err(SessionStoreError::DanglingParentId {
                    path: path.to_path_buf(),
                    line: *line_number,
                    entry_id: entry.id.clone(),
                    parent_id: parent_id.clone(),
                });
            }
        }
    }

    Ok(())
}

pub(crate) fn validate_rfc3339(
    path: &Path,
    line_number: usize,
    field: &'static str,
    value: &str,
) -> Result<(), SessionStoreError> {
    if !is_rfc3339(value) {
        return Err(SessionStoreError::InvalidTimestamp {
            path: path.to_path_buf(),
            line: line_number,
            field,
            value: value.to_string(),
        });
    }

    Ok(())
}
