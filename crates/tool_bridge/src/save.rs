use std::fs;

use serde::Serialize;
use tracing::debug;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::paths::resolve_write_target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveCategory {
    Code,
    Text,
}

/// Acknowledgement returned to the agent after a successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReceipt {
    pub filename: String,
    pub category: SaveCategory,
}

/// Writes `content` to `filename` inside the session.
///
/// Code goes under the hidden scripts folder, everything else directly under the
/// working directory. Missing parents are created and existing files replaced.
pub fn save_text(
    ctx: &ToolContext,
    content: &str,
    filename: &str,
    is_code: bool,
) -> Result<SaveReceipt, ToolError> {
    let root = if is_code {
        ctx.hidden_dir()
    } else {
        ctx.working_dir().to_path_buf()
    };
    let target = resolve_write_target(&root, filename)?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|error| ToolError::io("creating parent directories", parent, &error))?;
    }
    fs::write(&target, content).map_err(|error| ToolError::io("writing", &target, &error))?;

    debug!(path = %target.display(), bytes = content.len(), is_code, "saved text");
    Ok(SaveReceipt {
        filename: filename.to_string(),
        category: if is_code {
            SaveCategory::Code
        } else {
            SaveCategory::Text
        },
    })
}
