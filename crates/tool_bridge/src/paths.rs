use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{ToolError, ToolErrorKind};

/// Resolves an agent-supplied relative path for writing under `root`.
///
/// `..` may not climb above `root`, absolute paths are refused, and the deepest
/// existing ancestor must canonicalize inside `root` so symlinks cannot redirect writes.
/// An existing symlink at the target itself must also resolve inside `root`.
pub(crate) fn resolve_write_target(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let relative = normalize_relative(requested)?;
    let candidate = root.join(&relative);

    let root_anchor = canonicalize_existing_ancestor(root)?;
    let parent = candidate.parent().unwrap_or(root);
    let anchor = canonicalize_existing_ancestor(parent)?;
    if !anchor.starts_with(&root_anchor) {
        return Err(ToolError::path_escape(requested));
    }

    let is_symlink = fs::symlink_metadata(&candidate)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    if is_symlink {
        // Dangling links cannot be checked, so they are refused as well.
        let resolved = candidate
            .canonicalize()
            .map_err(|_| ToolError::path_escape(requested))?;
        if !resolved.starts_with(&root_anchor) {
            return Err(ToolError::path_escape(requested));
        }
    }

    Ok(candidate)
}

/// Resolves an agent-supplied relative path to an existing file under `root`.
pub(crate) fn resolve_existing_file(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let relative = normalize_relative(requested)?;
    let candidate = root.join(relative);

    let canonical_root = root
        .canonicalize()
        .map_err(|error| ToolError::io("resolving", root, &error))?;
    let canonical = candidate
        .canonicalize()
        .map_err(|error| ToolError::io("resolving", &candidate, &error))?;

    if !canonical.starts_with(&canonical_root) {
        return Err(ToolError::path_escape(requested));
    }
    if !canonical.is_file() {
        return Err(ToolError::new(
            ToolErrorKind::Io,
            format!("Not a regular file: {}", canonical.display()),
        ));
    }

    Ok(canonical)
}

fn normalize_relative(requested: &str) -> Result<PathBuf, ToolError> {
    if requested.trim().is_empty() {
        return Err(ToolError::invalid_arguments("Path must not be empty"));
    }

    let mut normalized = PathBuf::new();
    for component in Path::new(requested).components() {
        match component {
            Component::Normal(part) => normalized.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(ToolError::path_escape(requested));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(ToolError::path_escape(requested));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(ToolError::invalid_arguments(format!(
            "Path does not name a file: {requested}"
        )));
    }

    Ok(normalized)
}

fn canonicalize_existing_ancestor(path: &Path) -> Result<PathBuf, ToolError> {
    for ancestor in path.ancestors() {
        if ancestor.exists() {
            return ancestor
                .canonicalize()
                .map_err(|error| ToolError::io("resolving", ancestor, &error));
        }
    }

    Err(ToolError::new(
        ToolErrorKind::Io,
        format!("No existing ancestor found for path {}", path.display()),
    ))
}
