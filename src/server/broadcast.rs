//! UDP rotor integration compatible with N1MM Logger+.
//!
//! The sender announces our position as `"<name> @ <tenths of a degree>"` on
//! the subnet broadcast address. The receiver accepts rotor commands carrying
//! `<rotor>NAME</rotor>` and `<goazi>DEGREES</goazi>` and turns the rotator when
//! `NAME` is ours.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

use crate::rotator::MAX_BEARING;
use crate::server::state::AppState;

pub const BROADCAST_INTERVAL: Duration = Duration::from_millis(1500);
/// How long the receiver waits before re-checking the keep-running flag
pub const RECEIVE_POLL: Duration = Duration::from_millis(250);
const DATAGRAM_SIZE: usize = 512;

/// Directed broadcast address of the subnet `ip` lives on.
///
/// ```
/// # use std::net::Ipv4Addr;
/// # use rotorlink::server::broadcast::broadcast_address;
/// let bcast = broadcast_address(Ipv4Addr::new(192, 168, 1, 73), Ipv4Addr::new(255, 255, 255, 0));
/// assert_eq!(bcast, Ipv4Addr::new(192, 168, 1, 255));
/// ```
pub fn broadcast_address(ip: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(ip) | !u32::from(netmask))
}

pub fn position_message(name: &str, bearing: u16) -> String {
    format!("{} @ {}", name, u32::from(bearing) * 10)
}

/// Text between `<name>` and the next `<`, if any.
pub fn element<'a>(src: &'a str, name: &str) -> Option<&'a str> {
    let open = format!("<{}>", name);
    let start = src.find(&open)? + open.len();
    let len = src[start..].find('<')?;
    (len > 0).then(|| &src[start..start + len])
}

/// Extracts `(rotor name, bearing)` from a rotor command datagram.
///
/// The azimuth may be fractional; it is truncated and must land in 0..=360.
pub fn parse_rotor_command(message: &str) -> Option<(&str, u16)> {
    let name = element(message, "rotor")?;
    let azimuth: f64 = element(message, "goazi")?.trim().parse().ok()?;
    if !azimuth.is_finite() {
        return None;
    }

    let degrees = azimuth.trunc();
    if !(0.0..=f64::from(MAX_BEARING)).contains(&degrees) {
        return None;
    }
    Some((name, degrees as u16))
}

/// Announces the current bearing to `target` until shutdown is requested.
///
/// A period in which the bearing cannot be read (busy link, no reply) is
/// skipped rather than reported.
pub async fn run_sender(app: Arc<AppState>, socket: UdpSocket, target: SocketAddr) {
    let name = app.config().await.hostname;
    tracing::info!(target = %target, "Broadcasting rotator position");

    while app.is_running() {
        match app.rotator.get_bearing().await {
            Ok(bearing) => {
                let message = position_message(&name, bearing);
                if let Err(e) = socket.send_to(message.as_bytes(), target).await {
                    tracing::warn!(target = %target, error = %e, "Failed to send position broadcast");
                }
            }
            Err(e) => tracing::debug!(error = %e, "Skipping position broadcast"),
        }

        sleep(BROADCAST_INTERVAL).await;
    }
}

/// Handles rotor command datagrams until shutdown is requested.
pub async fn run_receiver(app: Arc<AppState>, socket: UdpSocket) {
    let name = app.config().await.hostname;
    let mut buf = [0u8; DATAGRAM_SIZE];

    while app.is_running() {
        let (n, peer) = match timeout(RECEIVE_POLL, socket.recv_from(&mut buf)).await {
            Err(_) => continue,
            Ok(Ok(received)) => received,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Rotor command receive failed");
                sleep(RECEIVE_POLL).await;
                continue;
            }
        };

        let Ok(message) = std::str::from_utf8(&buf[..n]) else {
            tracing::debug!(peer = %peer, "Ignoring non-UTF-8 datagram");
            continue;
        };

        match parse_rotor_command(message) {
            Some((rotor, bearing)) if rotor == name => {
                match app.rotator.set_bearing(bearing).await {
                    Ok(_) => tracing::info!(peer = %peer, bearing, "Rotor command applied"),
                    Err(e) => tracing::warn!(peer = %peer, bearing, error = %e, "Rotor command dropped"),
                }
            }
            Some((rotor, _)) => tracing::trace!(rotor, "Rotor command for another node"),
            None => tracing::debug!(peer = %peer, "Ignoring unrecognised datagram"),
        }
    }
}
