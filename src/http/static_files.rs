//! Static content from the content directory.

use std::path::{Component, Path, PathBuf};

use crate::http::mime;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

/// Resolves a request path (leading slash already stripped) inside `root`.
///
/// Returns `None` for anything that could leave `root`: parent components,
/// absolute paths, drive prefixes, backslashes or NUL bytes. This check is
/// purely lexical and runs before the filesystem is touched.
pub fn resolve(root: &Path, relative: &str) -> Option<PathBuf> {
    if relative.contains("..") || relative.contains('\\') || relative.contains('\0') {
        return None;
    }

    let path = Path::new(relative);
    if !path.components().all(|c| matches!(c, Component::Normal(_) | Component::CurDir)) {
        return None;
    }

    Some(root.join(path))
}

/// Serves `relative` from `root`: 403 for traversal attempts, 404 for anything
/// that is not a regular file, otherwise a streamed 200.
pub async fn serve(root: &Path, relative: &str) -> Response {
    let Some(path) = resolve(root, relative) else {
        tracing::warn!(path = relative, "Rejected path traversal attempt");
        return Response::forbidden();
    };

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Response::not_found(),
    };

    match tokio::fs::File::open(&path).await {
        Ok(file) => ResponseBuilder::new(StatusCode::Ok)
            .content_type(mime::from_path(relative))
            .file(file, metadata.len())
            .build(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to open static file");
            Response::not_found()
        }
    }
}
