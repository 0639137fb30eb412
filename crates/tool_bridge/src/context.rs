use std::path::{Path, PathBuf};

use session_store::hidden_dir;

use crate::error::ToolError;

/// Per-call execution context injected by the host, never supplied by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    working_dir: PathBuf,
}

impl ToolContext {
    /// Resolves `working_dir` to its canonical absolute form. It must be an existing directory.
    pub fn new(working_dir: impl Into<PathBuf>) -> Result<Self, ToolError> {
        let working_dir = working_dir.into();
        let canonical = working_dir
            .canonicalize()
            .map_err(|error| ToolError::io("resolving working directory", &working_dir, &error))?;

        if !canonical.is_dir() {
            return Err(ToolError::invalid_arguments(format!(
                "Working directory must be a directory: {}",
                canonical.display()
            )));
        }

        Ok(Self {
            working_dir: canonical,
        })
    }

    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Folder reserved for agent-authored scripts.
    #[must_use]
    pub fn hidden_dir(&self) -> PathBuf {
        hidden_dir(&self.working_dir)
    }
}
