//! HTTP endpoints of the rotator controller.

mod bearing;
mod config;
mod files;
mod system;

pub use bearing::{Bearing, parse_bearing};
pub use config::Settings;
pub use files::{ListFiles, RemoveFile, RenameFile, UploadFile};
pub use system::{HOME_PAGE, Restart, RootRedirect};

use crate::http::request::Method;
use crate::http::router::Router;

const OK: &str = "ok\r\n";
const OUT_OF_RANGE: &str = "parameter out of range\r\n";

const GET: &[Method] = &[Method::GET];
const POST: &[Method] = &[Method::POST];
const GET_POST: &[Method] = &[Method::GET, Method::POST];

/// The route table; anything not listed is served from the content directory.
pub fn router() -> Router {
    Router::new()
        .route("/", GET, RootRedirect)
        .route("/api/config", GET_POST, Settings)
        .route("/api/bearing", GET, Bearing)
        .route("/api/get_files", GET, ListFiles)
        .route("/api/upload_file", POST, UploadFile)
        .route("/api/remove_file", POST, RemoveFile)
        .route("/api/rename_file", POST, RenameFile)
        .route("/api/restart", POST, Restart)
}
