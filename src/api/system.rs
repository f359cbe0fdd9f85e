use async_trait::async_trait;

use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::router::{BodyReader, Handler};
use crate::server::state::AppState;

/// `GET /` sends browsers to the rotator page.
pub struct RootRedirect;

/// `POST /api/restart` asks the supervisor loop to stop the process.
pub struct Restart;

pub const HOME_PAGE: &str = "/rotator.html";

#[async_trait]
impl Handler for RootRedirect {
    async fn handle(&self, _app: &AppState, _request: &Request, _body: BodyReader<'_>) -> Response {
        Response::redirect(HOME_PAGE)
    }
}

#[async_trait]
impl Handler for Restart {
    async fn handle(&self, app: &AppState, _request: &Request, _body: BodyReader<'_>) -> Response {
        tracing::info!("Restart requested");
        app.request_shutdown();
        Response::ok(super::OK)
    }
}
