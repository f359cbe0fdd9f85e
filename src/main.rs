use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::{TcpListener, UdpSocket};
use tracing_subscriber::EnvFilter;

use rotorlink::api;
use rotorlink::config::Config;
use rotorlink::rotator::{RotatorDriver, open_serial};
use rotorlink::server::broadcast::{self, broadcast_address};
use rotorlink::server::{AppState, listener};

const SHUTDOWN_POLL: Duration = Duration::from_millis(250);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let config_path = Config::path_from_env();
    let cfg = Config::load()?;

    let port = open_serial(&cfg.serial.port, cfg.serial.baud_rate)?;
    tracing::info!(port = %cfg.serial.port, baud = cfg.serial.baud_rate, dialect = ?cfg.serial.dialect, "Rotator serial port open");
    let rotator = Arc::new(RotatorDriver::new(port, cfg.serial.dialect));

    let web_addr = SocketAddr::new(cfg.listen_addr, cfg.web_port);
    let tcp_addr = SocketAddr::new(cfg.listen_addr, cfg.tcp_port);
    let web = TcpListener::bind(web_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", web_addr))?;
    let legacy = TcpListener::bind(tcp_addr)
        .await
        .with_context(|| format!("Failed to bind serial pass-through on {}", tcp_addr))?;

    let n1mm = cfg.n1mm.clone();
    let listen_addr = cfg.listen_addr;
    let app = Arc::new(AppState::new(cfg, config_path, rotator));

    if n1mm.enabled {
        let target = SocketAddr::from((broadcast_address(n1mm.ip_address, n1mm.netmask), n1mm.broadcast_port));
        let sender = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .context("Failed to bind UDP broadcast socket")?;
        sender.set_broadcast(true)?;
        let receiver = UdpSocket::bind(SocketAddr::new(listen_addr, n1mm.receive_port))
            .await
            .with_context(|| format!("Failed to bind UDP rotor port {}", n1mm.receive_port))?;

        tokio::spawn(broadcast::run_sender(app.clone(), sender, target));
        tokio::spawn(broadcast::run_receiver(app.clone(), receiver));
    }

    let router = Arc::new(api::router());

    tokio::select! {
        res = listener::run_http(web, app.clone(), router) => {
            res?;
        }

        res = listener::run_legacy(legacy, app.clone()) => {
            res?;
        }

        _ = wait_for_restart(&app) => {
            tracing::info!("Restart requested, shutting down");
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            app.request_shutdown();
        }
    }

    Ok(())
}

async fn wait_for_restart(app: &AppState) {
    while app.is_running() {
        tokio::time::sleep(SHUTDOWN_POLL).await;
    }
}
