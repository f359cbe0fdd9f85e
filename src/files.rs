//! Content directory management
//!
//! Uploaded and served files live flat in one directory. Names are checked
//! with [`valid_filename`] before they are joined onto that directory, so no
//! operation here can escape it.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::http::mime;

/// Pages the web UI needs; they may be served but not removed or replaced.
pub const PROTECTED_FILES: &[&str] = &["config.html", "files.html", "rotator.html"];

#[derive(Debug, Error)]
pub enum FileError {
    #[error("bad file name")]
    InvalidName,
    #[error("{0} is protected")]
    Protected(String),
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Accepts `stem.ext` where the stem is `[A-Za-z0-9._-]` minus dots, starting
/// and ending with an alphanumeric, and the extension is a known content type.
///
/// ```
/// # use rotorlink::files::valid_filename;
/// assert!(valid_filename("rotator.html"));
/// assert!(valid_filename("log_2024-01.txt"));
/// assert!(!valid_filename("../evil.sh"));
/// assert!(!valid_filename("archive.tar.gz"));
/// ```
pub fn valid_filename(name: &str) -> bool {
    let Some((stem, extension)) = name.rsplit_once('.') else {
        return false;
    };

    let stem_ok = stem.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        && stem.bytes().next().is_some_and(|b| b.is_ascii_alphanumeric())
        && stem.bytes().last().is_some_and(|b| b.is_ascii_alphanumeric());

    let extension_ok = !extension.is_empty()
        && extension.bytes().all(|b| b.is_ascii_alphanumeric())
        && mime::lookup(extension).is_some();

    stem_ok && extension_ok
}

pub fn is_protected(name: &str) -> bool {
    PROTECTED_FILES.contains(&name)
}

/// Joins a validated name onto the content directory.
pub fn content_path(dir: &Path, name: &str) -> Result<PathBuf, FileError> {
    if !valid_filename(name) {
        return Err(FileError::InvalidName);
    }
    Ok(dir.join(name))
}

/// Regular files in `dir`, sorted by name. Hidden files (in-flight uploads) are skipped.
pub async fn list(dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.starts_with('.') {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    Ok(names)
}

pub async fn remove(dir: &Path, name: &str) -> Result<(), FileError> {
    let path = content_path(dir, name)?;
    if is_protected(name) {
        return Err(FileError::Protected(name.to_string()));
    }

    tokio::fs::remove_file(&path).await?;
    tracing::info!(file = name, "Removed file");
    Ok(())
}

/// Renames `from` to `to`, replacing any existing `to`.
///
/// A protected page may be the target (that is how the UI gets updated after
/// an upload) but never the source.
pub async fn rename(dir: &Path, from: &str, to: &str) -> Result<(), FileError> {
    let source = content_path(dir, from)?;
    let target = content_path(dir, to)?;
    if is_protected(from) {
        return Err(FileError::Protected(from.to_string()));
    }

    tokio::fs::rename(&source, &target).await?;
    tracing::info!(from, to, "Renamed file");
    Ok(())
}
