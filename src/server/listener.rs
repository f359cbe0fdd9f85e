use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::http::connection::Connection;
use crate::http::router::Router;
use crate::server::legacy;
use crate::server::state::AppState;

/// Pause after a failed accept (EMFILE, ECONNABORTED, ...) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts HTTP connections, one task per connection.
pub async fn run_http(listener: TcpListener, app: Arc<AppState>, router: Arc<Router>) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "HTTP server listening");

    while app.is_running() {
        let (socket, peer) = accept_retrying(|| listener.accept()).await;
        tracing::debug!(peer = %peer, "Accepted HTTP connection");

        let app = app.clone();
        let router = router.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer.to_string(), app, router);
            if let Err(e) = conn.run().await {
                tracing::error!(peer = %peer, error = %e, "Connection error");
            }
        });
    }

    Ok(())
}

/// Accepts legacy serial pass-through clients.
pub async fn run_legacy(listener: TcpListener, app: Arc<AppState>) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "Serial pass-through listening");

    while app.is_running() {
        let (socket, peer) = accept_retrying(|| listener.accept()).await;

        let app = app.clone();
        tokio::spawn(async move {
            if let Err(e) = legacy::serve_client(socket, peer.to_string(), &app).await {
                tracing::error!(peer = %peer, error = %e, "Serial client error");
            }
        });
    }

    Ok(())
}

/// Calls `accept` until it succeeds, logging each failure.
async fn accept_retrying<T, F, Fut>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to accept connection");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}
