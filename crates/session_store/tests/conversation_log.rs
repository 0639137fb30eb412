use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use agent_provider::RunMessage;
use serde_json::json;
use session_store::{conversation_log_path, ConversationLog, LogEntryKind, LogHeader, SessionStoreError};
use tempfile::TempDir;

fn write_log_file(lines: &[String]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let path = dir.path().join("session.jsonl");
    let mut file = File::create(&path).expect("log file should be created");

    for line in lines {
        writeln!(file, "{line}").expect("line should be written");
    }

    (dir, path)
}

fn header_line() -> String {
    json!({
        "type": "session",
        "version": 1,
        "session_id": "session-1",
        "created_at": "2026-02-14T00:00:00Z",
    })
    .to_string()
}

fn text_entry_line(kind: &str, id: &str, parent_id: Option<&str>, ts: &str, text: &str) -> String {
    json!({
        "type": "entry",
        "id": id,
        "parent_id": parent_id,
        "ts": ts,
        "kind": kind,
        "text": text,
    })
    .to_string()
}

#[test]
fn open_rejects_missing_header() {
    let (_dir, path) = write_log_file(&[]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("empty file must fail");
    assert!(matches!(error, SessionStoreError::MissingHeader { .. }));
}

#[test]
fn open_rejects_non_header_first_line() {
    let (_dir, path) = write_log_file(&[text_entry_line(
        "user_text",
        "entry-1",
        None,
        "2026-02-14T00:00:01Z",
        "hello",
    )]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("entry as first line must fail");
    assert!(matches!(
        error,
        SessionStoreError::InvalidHeaderRecord { line: 1, .. }
    ));
}

#[test]
fn open_rejects_unsupported_header_version() {
    let (_dir, path) = write_log_file(&[json!({
        "type": "session",
        "version": 2,
        "session_id": "session-1",
        "created_at": "2026-02-14T00:00:00Z",
    })
    .to_string()]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("unsupported version must fail");
    assert!(matches!(
        error,
        SessionStoreError::UnsupportedVersion {
            line: 1,
            found: 2,
            ..
        }
    ));
}

#[test]
fn open_rejects_unknown_header_fields() {
    let (_dir, path) = write_log_file(&[json!({
        "type": "session",
        "version": 1,
        "session_id": "session-1",
        "created_at": "2026-02-14T00:00:00Z",
        "unexpected": true,
    })
    .to_string()]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("unknown header field must fail");
    assert!(matches!(
        error,
        SessionStoreError::JsonLineParse { line: 1, .. }
    ));
}

#[test]
fn open_rejects_malformed_json_line_with_line_context() {
    let (_dir, path) = write_log_file(&[header_line(), "{ this is invalid json".to_string()]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("malformed json line must fail");
    assert!(matches!(
        error,
        SessionStoreError::JsonLineParse { line: 2, .. }
    ));
}

#[test]
fn open_rejects_unknown_entry_kind() {
    let (_dir, path) = write_log_file(&[
        header_line(),
        text_entry_line("unknown_kind", "entry-1", None, "2026-02-14T00:00:01Z", "hi"),
    ]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("unknown entry kind must fail");
    assert!(matches!(
        error,
        SessionStoreError::JsonLineParse { line: 2, .. }
    ));
}

#[test]
fn open_rejects_invalid_entry_timestamp() {
    let (_dir, path) = write_log_file(&[
        header_line(),
        text_entry_line("user_text", "entry-1", None, "yesterday", "hi"),
    ]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("bad timestamp must fail");
    assert!(matches!(
        error,
        SessionStoreError::InvalidTimestamp {
            line: 2,
            field: "ts",
            ..
        }
    ));
}

#[test]
fn open_rejects_duplicate_entry_id() {
    let (_dir, path) = write_log_file(&[
        header_line(),
        text_entry_line("user_text", "entry-1", None, "2026-02-14T00:00:01Z", "first"),
        text_entry_line(
            "assistant_text",
            "entry-1",
            Some("entry-1"),
            "2026-02-14T00:00:02Z",
            "duplicate",
        ),
    ]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("duplicate ids must fail");
    assert!(matches!(
        error,
        SessionStoreError::DuplicateEntryId { line: 3, .. }
    ));
}

#[test]
fn open_rejects_dangling_parent_id() {
    let (_dir, path) = write_log_file(&[
        header_line(),
        text_entry_line(
            "assistant_text",
            "entry-1",
            Some("missing"),
            "2026-02-14T00:00:01Z",
            "dangling",
        ),
    ]);

    let error = ConversationLog::open(&path)
        .err()
        .expect("dangling parent id must fail");
    assert!(matches!(
        error,
        SessionStoreError::DanglingParentId { line: 2, .. }
    ));
}

#[test]
fn open_sets_current_leaf_from_append_order() {
    let (_dir, path) = write_log_file(&[
        header_line(),
        text_entry_line("user_text", "entry-1", None, "2026-02-14T00:00:01Z", "hello"),
        text_entry_line(
            "assistant_text",
            "entry-2",
            Some("entry-1"),
            "2026-02-14T00:00:02Z",
            "world",
        ),
    ]);

    let log = ConversationLog::open(&path).expect("valid log should open");
    assert_eq!(log.current_leaf_id(), Some("entry-2"));
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn create_writes_header_keyed_by_session_id() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let log = ConversationLog::create(root.path(), "abc").expect("create should succeed");

    assert_eq!(log.path(), conversation_log_path(root.path(), "abc"));

    let file = std::fs::read_to_string(log.path()).expect("log should be readable");
    let mut lines = file.lines();
    let parsed_header: LogHeader = serde_json::from_str(lines.next().expect("header line"))
        .expect("header should deserialize");

    assert_eq!(parsed_header.version, 1);
    assert_eq!(parsed_header.session_id, "abc");
    assert_eq!(parsed_header.created_at, log.header().created_at);
    assert!(lines.next().is_none());
}

#[test]
fn create_refuses_to_overwrite_existing_log() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    ConversationLog::create(root.path(), "abc").expect("first create should succeed");

    let error = ConversationLog::create(root.path(), "abc")
        .err()
        .expect("second create must fail");
    assert!(matches!(error, SessionStoreError::LogAlreadyExists { .. }));
}

#[test]
fn create_fails_when_log_root_is_unwritable() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let blocked = root.path().join("messages");
    std::fs::write(&blocked, "file blocks directory creation").expect("blocker should be written");

    let error = ConversationLog::create(&blocked, "abc")
        .err()
        .expect("create should fail when the root cannot be created");
    assert!(matches!(error, SessionStoreError::Io { .. }));
}

#[test]
fn append_chains_entries_and_survives_reopen() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let mut log = ConversationLog::create(root.path(), "abc").expect("create should succeed");

    let first_id = log
        .append(LogEntryKind::UserText {
            text: "hello".to_string(),
        })
        .expect("first append should succeed")
        .id
        .clone();
    let second = log
        .append(LogEntryKind::AssistantText {
            text: "world".to_string(),
        })
        .expect("second append should succeed")
        .clone();

    assert_eq!(second.parent_id.as_deref(), Some(first_id.as_str()));
    assert_eq!(log.current_leaf_id(), Some(second.id.as_str()));

    let on_disk = std::fs::read_to_string(log.path()).expect("log should be readable");
    assert_eq!(on_disk.lines().count(), 3);

    let reopened = ConversationLog::open(log.path()).expect("reopen should succeed");
    assert_eq!(reopened.current_leaf_id(), Some(second.id.as_str()));
}

#[test]
fn open_or_create_reuses_existing_history() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    {
        let mut log = ConversationLog::open_or_create(root.path(), "abc").expect("create");
        log.append(LogEntryKind::AssistantText {
            text: "Hi!".to_string(),
        })
        .expect("append");
    }

    let log = ConversationLog::open_or_create(root.path(), "abc").expect("reopen");
    assert_eq!(log.entries().len(), 1);
}

#[test]
fn messages_replay_tool_calls_and_results_in_order() {
    let root = tempfile::tempdir().expect("tempdir should be created");
    let mut log = ConversationLog::create(root.path(), "abc").expect("create should succeed");

    let history = vec![
        RunMessage::UserText {
            text: "describe sales.csv".to_string(),
        },
        RunMessage::ToolCall {
            call_id: "call-1".to_string(),
            tool_name: "execute_script".to_string(),
            arguments: json!({"path": "describe.py"}),
        },
        RunMessage::ToolResult {
            call_id: "call-1".to_string(),
            tool_name: "execute_script".to_string(),
            content: json!({"status": "Success", "stdout": "42 rows", "stderr": ""}),
            is_error: false,
        },
        RunMessage::AssistantText {
            text: "The file has 42 rows.".to_string(),
        },
    ];
    for message in history.clone() {
        log.append_message(message).expect("append should succeed");
    }

    assert_eq!(log.messages(), history);
    let reopened = ConversationLog::open(log.path()).expect("reopen should succeed");
    assert_eq!(reopened.messages(), history);
}
