use std::path::{Path, PathBuf};

/// Reserved subdirectory of every working directory holding agent-authored scripts.
pub const HIDDEN_FOLDER: &str = ".hidden";

/// Prefix of the unique per-session directory names under the cache root.
pub const FOLDER_PREFIX: &str = "chat-";

const LOG_EXTENSION: &str = "jsonl";

#[must_use]
pub fn working_dir(cache_root: &Path, folder: &str) -> PathBuf {
    cache_root.join(folder)
}

#[must_use]
pub fn hidden_dir(working_dir: &Path) -> PathBuf {
    working_dir.join(HIDDEN_FOLDER)
}

#[must_use]
pub fn conversation_file_name(session_id: &str) -> String {
    format!("{}.{LOG_EXTENSION}", sanitize_for_filename(session_id))
}

#[must_use]
pub fn conversation_log_path(log_root: &Path, session_id: &str) -> PathBuf {
    log_root.join(conversation_file_name(session_id))
}

#[must_use]
pub fn sanitize_for_filename(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ':' | '/' | '\\' | ' ' | '.' => '-',
            _ => c,
        })
        .collect()
}
