use std::fs;
use std::io;
use std::path::Path;

use session_store::UploadedFile;

/// Reads a local file into an upload, keeping only its final name component.
pub fn load_upload(path: &Path) -> io::Result<UploadedFile> {
    let bytes = fs::read(path)?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} does not name a file", path.display()),
            )
        })?;

    Ok(UploadedFile {
        content_type: content_type_for(&name),
        name,
        bytes,
    })
}

/// Best-effort MIME type from the file extension.
#[must_use]
pub fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
