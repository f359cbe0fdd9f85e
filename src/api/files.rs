use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

use crate::files::{self, FileError};
use crate::http::multipart;
use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::router::{BodyReader, Handler};
use crate::server::state::AppState;

/// Most of a refused upload body read off the socket before replying.
const DRAIN_LIMIT: u64 = 64 * 1024;
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// `GET /api/get_files`: JSON array of file names in the content directory.
pub struct ListFiles;

/// `POST /api/upload_file`: single-file `multipart/form-data` upload.
pub struct UploadFile;

/// `POST /api/remove_file` with `filename`.
pub struct RemoveFile;

/// `POST /api/rename_file` with `filename` and `newname`.
pub struct RenameFile;

#[async_trait]
impl Handler for ListFiles {
    async fn handle(&self, app: &AppState, _request: &Request, _body: BodyReader<'_>) -> Response {
        let names = match files::list(app.content_dir()).await {
            Ok(names) => names,
            Err(e) => {
                tracing::error!(error = %e, "Failed to list content directory");
                return Response::internal_error();
            }
        };

        match serde_json::to_vec(&names) {
            Ok(body) => Response::json(StatusCode::Ok, body),
            Err(_) => Response::internal_error(),
        }
    }
}

#[async_trait]
impl Handler for UploadFile {
    async fn handle(&self, app: &AppState, request: &Request, body: BodyReader<'_>) -> Response {
        let upload = match multipart::check_request(request, app.max_upload_bytes()) {
            Ok(boundary) => {
                let length = request.content_length.unwrap_or_default();
                multipart::receive_upload(body, length, &boundary, app.content_dir()).await
            }
            Err(e) => {
                drain_body(body, request.content_length).await;
                Err(e)
            }
        };

        match upload {
            Ok(name) => Response::text(StatusCode::Created, format!("Uploaded {} successfully", name)),
            Err(e) => {
                tracing::warn!(error = %e, "Upload rejected");
                Response::text(e.status(), format!("{}\r\n", e))
            }
        }
    }
}

#[async_trait]
impl Handler for RemoveFile {
    async fn handle(&self, app: &AppState, request: &Request, _body: BodyReader<'_>) -> Response {
        let Some(name) = request.arg("filename") else {
            return Response::bad_request("filename required\r\n");
        };

        match files::remove(app.content_dir(), name).await {
            Ok(()) => Response::ok("removed\r\n"),
            Err(e) => conflict(e),
        }
    }
}

#[async_trait]
impl Handler for RenameFile {
    async fn handle(&self, app: &AppState, request: &Request, _body: BodyReader<'_>) -> Response {
        let (Some(from), Some(to)) = (request.arg("filename"), request.arg("newname")) else {
            return Response::bad_request("filename and newname required\r\n");
        };

        match files::rename(app.content_dir(), from, to).await {
            Ok(()) => Response::ok("renamed\r\n"),
            Err(e) => conflict(e),
        }
    }
}

fn conflict(error: FileError) -> Response {
    tracing::warn!(error = %error, "File operation refused");
    Response::text(StatusCode::Conflict, format!("{}\r\n", error))
}

/// Reads and drops up to [`DRAIN_LIMIT`] bytes of a refused body, so closing
/// the socket does not reset the connection before the client reads the error.
async fn drain_body(body: BodyReader<'_>, length: Option<u64>) {
    let Some(length) = length else {
        return;
    };

    let mut rest = body.take(length.min(DRAIN_LIMIT));
    let drained = tokio::time::timeout(DRAIN_TIMEOUT, tokio::io::copy(&mut rest, &mut tokio::io::sink())).await;
    if let Ok(Ok(bytes)) = drained {
        tracing::debug!(bytes, "Drained refused upload body");
    }
}
