use async_trait::async_trait;

use crate::http::request::Request;
use crate::http::response::{Response, StatusCode};
use crate::http::router::{BodyReader, Handler};
use crate::rotator::{MAX_BEARING, RotatorError};
use crate::server::state::AppState;

/// `GET /api/bearing` reports the bearing; `?set=N` turns the rotator first.
pub struct Bearing;

#[async_trait]
impl Handler for Bearing {
    async fn handle(&self, app: &AppState, request: &Request, _body: BodyReader<'_>) -> Response {
        let result = match request.arg("set").filter(|v| !v.is_empty()) {
            Some(value) => {
                let Some(degrees) = parse_bearing(value) else {
                    return Response::bad_request(super::OUT_OF_RANGE);
                };
                app.rotator.set_bearing(degrees).await
            }
            None => app.rotator.get_bearing().await,
        };

        match result {
            Ok(bearing) => Response::ok(format!("{}\r\n", bearing)),
            Err(e) => rotator_unavailable(e),
        }
    }
}

/// A whole number of degrees in 0..=360.
pub fn parse_bearing(value: &str) -> Option<u16> {
    value
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|degrees| *degrees <= MAX_BEARING)
}

fn rotator_unavailable(error: RotatorError) -> Response {
    tracing::warn!(error = %error, "Rotator request failed");
    Response::text(
        StatusCode::ServiceUnavailable,
        format!("{} ({})\r\n", error, error.code()),
    )
}
