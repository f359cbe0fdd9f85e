use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};

use crate::http::parser::{ParseError, read_request};
use crate::http::request::{Request, Version};
use crate::http::response::{Response, StatusCode};
use crate::http::router::Router;
use crate::http::writer::ResponseWriter;
use crate::server::state::AppState;

/// One HTTP exchange on one connection.
///
/// Exactly one request is read and one response written; the connection is
/// closed afterwards.
pub struct Connection<S> {
    reader: BufReader<ReadHalf<S>>,
    writer: WriteHalf<S>,
    peer: String,
    app: Arc<AppState>,
    router: Arc<Router>,
    state: ConnectionState,
    summary: String,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(Response, Version),
    Closed,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S, peer: impl Into<String>, app: Arc<AppState>, router: Arc<Router>) -> Self {
        let (read_half, write_half) = tokio::io::split(stream);
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            peer: peer.into(),
            app,
            router,
            state: ConnectionState::Reading,
            summary: String::from("-"),
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        let started = Instant::now();

        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match read_request(&mut self.reader).await {
                        Ok(Some(request)) => {
                            self.summary = format!("{} {}", request.method.as_str(), request.path);
                            ConnectionState::Processing(request)
                        }
                        Ok(None) => {
                            tracing::debug!(peer = %self.peer, "Client closed without a request");
                            ConnectionState::Closed
                        }
                        Err(ParseError::Io(e)) => return Err(e.into()),
                        Err(e) => {
                            tracing::warn!(peer = %self.peer, error = %e, "Malformed request");
                            ConnectionState::Writing(Self::error_response(&e), Version::Http10)
                        }
                    };
                }

                ConnectionState::Processing(request) => {
                    let response = self
                        .router
                        .dispatch(&self.app, &request, &mut self.reader)
                        .await;
                    self.state = ConnectionState::Writing(response, request.version);
                }

                ConnectionState::Writing(response, version) => {
                    let status = response.status;
                    let bytes = ResponseWriter::new(response, version)
                        .write_to_stream(&mut self.writer)
                        .await?;
                    // peer may already be gone; the response is flushed either way
                    let _ = self.writer.shutdown().await;

                    let elapsed_ms = started.elapsed().as_millis() as u64;
                    if status.as_u16() < 400 {
                        tracing::info!(peer = %self.peer, request = %self.summary, status = status.as_u16(), bytes, elapsed_ms, "Request served");
                    } else {
                        tracing::warn!(peer = %self.peer, request = %self.summary, status = status.as_u16(), bytes, elapsed_ms, "Request served");
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    fn error_response(error: &ParseError) -> Response {
        match error {
            ParseError::BodyTooLarge => {
                Response::text(StatusCode::PayloadTooLarge, error.to_string())
            }
            _ => Response::bad_request(&error.to_string()),
        }
    }
}
