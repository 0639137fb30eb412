//! Session persistence for dataframe chat.
//!
//! Three concerns live here:
//! - the session catalog ([`MetadataStore`], backed by SQLite),
//! - working directory provisioning ([`SessionManager`]),
//! - the append-only per-session conversation history ([`ConversationLog`]).

mod catalog;
mod clock;
mod error;
mod history;
mod paths;
mod provision;
mod schema;

pub use catalog::{MetadataStore, SqliteMetadataStore};
pub use clock::default_session_name;
pub use error::SessionStoreError;
pub use history::ConversationLog;
pub use paths::{
    conversation_file_name, conversation_log_path, hidden_dir, working_dir, FOLDER_PREFIX,
    HIDDEN_FOLDER,
};
pub use provision::SessionManager;
pub use schema::{
    EntryRecordType, LogEntry, LogEntryKind, LogHeader, LogRecordType, SessionRecord,
    SessionStatus, UploadOutcome, UploadStatus, UploadedFile,
};
