use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::catalog::MetadataStore;
use crate::clock::{default_session_name, now_rfc3339};
use crate::error::SessionStoreError;
use crate::paths::{hidden_dir, working_dir, FOLDER_PREFIX};
use crate::schema::{SessionRecord, SessionStatus, UploadOutcome, UploadStatus, UploadedFile};

/// Creates sessions with their working directories and mutates their metadata.
pub struct SessionManager<S> {
    store: S,
    cache_root: PathBuf,
}

impl<S: MetadataStore> SessionManager<S> {
    /// `cache_root` is made absolute against the current directory when relative.
    pub fn new(store: S, cache_root: impl Into<PathBuf>) -> Result<Self, SessionStoreError> {
        let cache_root = cache_root.into();
        let cache_root = std::path::absolute(&cache_root)
            .map_err(|source| SessionStoreError::io("resolving cache root", &cache_root, source))?;

        Ok(Self { store, cache_root })
    }

    #[must_use]
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Allocates a new session, its unique working directory, and the hidden script folder.
    pub fn create_session(
        &mut self,
        display_name: Option<&str>,
    ) -> Result<SessionRecord, SessionStoreError> {
        let folder = self.create_session_folder()?;
        let now = now_rfc3339()?;
        let name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_session_name(OffsetDateTime::now_utc()));

        let record = SessionRecord {
            id: Uuid::new_v4().to_string(),
            name,
            created: now.clone(),
            updated: now,
            folder,
            status: SessionStatus::Active,
        };
        self.store.insert(&record)?;

        info!(session_id = %record.id, folder = %record.folder, "created session");
        Ok(record)
    }

    /// Renames a session. A missing id yields `Ok(false)`.
    pub fn rename_session(&mut self, id: &str, new_name: &str) -> Result<bool, SessionStoreError> {
        let new_name = new_name.to_string();
        self.modify(id, |record| record.name = new_name)
    }

    /// Changes a session's status (soft delete). A missing id yields `Ok(false)`.
    pub fn set_session_status(
        &mut self,
        id: &str,
        status: SessionStatus,
    ) -> Result<bool, SessionStoreError> {
        let changed = self.modify(id, |record| record.status = status)?;
        if changed {
            info!(session_id = id, %status, "updated session status");
        }
        Ok(changed)
    }

    /// Lists active sessions for display. Ordering carries no meaning beyond that.
    pub fn list_active_sessions(&self) -> Result<Vec<SessionRecord>, SessionStoreError> {
        self.store.find_by_status(SessionStatus::Active)
    }

    pub fn find_session(&self, id: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        self.store.find_by_id(id)
    }

    /// Absolute working directory of a session.
    #[must_use]
    pub fn working_dir(&self, record: &SessionRecord) -> PathBuf {
        working_dir(&self.cache_root, &record.folder)
    }

    /// Writes uploaded files into the session's working directory.
    ///
    /// Each file is reported individually; a failed write never aborts the batch.
    #[must_use]
    pub fn save_uploaded_files(
        &self,
        record: &SessionRecord,
        files: &[UploadedFile],
    ) -> Vec<UploadStatus> {
        let dir = self.working_dir(record);
        files
            .iter()
            .map(|file| {
                let outcome = match write_upload(&dir, file) {
                    Ok(path) => {
                        debug!(session_id = %record.id, path = %path.display(), "saved upload");
                        UploadOutcome::Saved
                    }
                    Err((kind, message)) => {
                        warn!(session_id = %record.id, file = %file.name, %message, "upload failed");
                        UploadOutcome::Failed { kind, message }
                    }
                };

                UploadStatus {
                    name: file.name.clone(),
                    content_type: file.content_type.clone(),
                    outcome,
                }
            })
            .collect()
    }

    /// User-facing listing: regular files directly inside the working directory, sorted.
    pub fn list_files(&self, record: &SessionRecord) -> Result<Vec<String>, SessionStoreError> {
        let dir = self.working_dir(record);
        let read_dir = fs::read_dir(&dir)
            .map_err(|source| SessionStoreError::io("listing working directory", &dir, source))?;

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry
                .map_err(|source| SessionStoreError::io("listing working directory", &dir, source))?;
            let is_file = entry
                .file_type()
                .map_err(|source| {
                    SessionStoreError::io("reading directory entry type", entry.path(), source)
                })?
                .is_file();
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        names.sort();
        Ok(names)
    }

    fn modify(
        &mut self,
        id: &str,
        apply: impl FnOnce(&mut SessionRecord),
    ) -> Result<bool, SessionStoreError> {
        let Some(mut record) = self.store.find_by_id(id)? else {
            debug!(session_id = id, "session lookup missed");
            return Ok(false);
        };

        apply(&mut record);
        record.updated = now_rfc3339()?;
        self.store.update(&record)
    }

    fn create_session_folder(&self) -> Result<String, SessionStoreError> {
        fs::create_dir_all(&self.cache_root).map_err(|source| {
            SessionStoreError::io("creating cache root", &self.cache_root, source)
        })?;

        let folder = tempfile::Builder::new()
            .prefix(FOLDER_PREFIX)
            .tempdir_in(&self.cache_root)
            .map_err(|source| {
                SessionStoreError::io("creating session folder", &self.cache_root, source)
            })?
            .keep();

        let hidden = hidden_dir(&folder);
        fs::create_dir_all(&hidden)
            .map_err(|source| SessionStoreError::io("creating hidden folder", &hidden, source))?;

        let relative = folder
            .strip_prefix(&self.cache_root)
            .unwrap_or(&folder)
            .to_string_lossy()
            .into_owned();
        Ok(relative)
    }
}

fn write_upload(dir: &Path, file: &UploadedFile) -> Result<PathBuf, (String, String)> {
    let Some(file_name) = Path::new(&file.name).file_name() else {
        return Err((
            "invalid_name".to_string(),
            format!("'{}' is not a file name", file.name),
        ));
    };

    let path = dir.join(file_name);
    fs::write(&path, &file.bytes)
        .map(|()| path)
        .map_err(|error| (format!("{:?}", error.kind()), error.to_string()))
}
