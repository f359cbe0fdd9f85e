use async_trait::async_trait;

use crate::config::ConfigError;
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::router::{BodyReader, Handler};
use crate::server::state::AppState;

/// `GET` returns the configuration as JSON, `POST` updates and saves it.
pub struct Settings;

#[async_trait]
impl Handler for Settings {
    async fn handle(&self, app: &AppState, request: &Request, _body: BodyReader<'_>) -> Response {
        match request.method {
            Method::GET => match serde_json::to_vec(&app.config().await) {
                Ok(body) => Response::json(StatusCode::Ok, body),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode configuration");
                    Response::internal_error()
                }
            },
            Method::POST => match app.update_config(&request.args).await {
                Ok(()) => Response::ok(super::OK),
                Err(ConfigError::OutOfRange(field)) => {
                    tracing::warn!(field, "Rejected configuration update");
                    Response::bad_request(super::OUT_OF_RANGE)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to save configuration");
                    Response::internal_error()
                }
            },
        }
    }
}
