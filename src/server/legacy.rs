//! Serial pass-through for legacy rotator control software.
//!
//! Clients speak the DCU-1 subset understood by [`parse_command`] over TCP
//! (typically bridged from a virtual COM port). Every hardware access goes
//! through the shared [`RotatorDriver`](crate::rotator::RotatorDriver).

use std::time::Instant;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::rotator::protocol::parse_command;
use crate::rotator::{Command, MAX_BEARING};
use crate::server::state::AppState;

/// Longest frame kept while waiting for a terminator.
pub const MAX_COMMAND_LEN: usize = 8;

/// Reassembles command frames from the byte stream.
///
/// `A` always starts a new frame; bytes outside a frame are ignored, and a
/// frame that reaches [`MAX_COMMAND_LEN`] without `;` or CR is dropped.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    frame: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one byte; returns the decoded command when it completes a frame.
    pub fn push(&mut self, byte: u8) -> Option<Command> {
        if byte == b'A' {
            self.frame.clear();
            self.frame.push(byte);
            return None;
        }
        if self.frame.is_empty() {
            return None;
        }

        self.frame.push(byte);
        if byte == b';' || byte == b'\r' {
            let command = parse_command(&self.frame);
            if command.is_none() {
                tracing::debug!(frame = %String::from_utf8_lossy(&self.frame).escape_debug(), "Unknown legacy command");
            }
            self.frame.clear();
            return command;
        }

        if self.frame.len() >= MAX_COMMAND_LEN {
            self.frame.clear();
        }
        None
    }

    pub fn pending(&self) -> &[u8] {
        &self.frame
    }
}

/// Serves one pass-through client until it disconnects or shutdown is requested.
pub async fn serve_client<S>(mut stream: S, peer: String, app: &AppState) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let started = Instant::now();
    let mut commands = CommandBuffer::new();
    let mut requested: Option<u16> = None;
    let mut buf = [0u8; 64];

    tracing::info!(peer = %peer, "Serial client connected");

    while app.is_running() {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        for &byte in &buf[..n] {
            let Some(command) = commands.push(byte) else {
                continue;
            };

            match command {
                Command::QueryBearing => {
                    let reply = match app.rotator.get_bearing().await {
                        Ok(bearing) => format!(";{:03}", bearing),
                        Err(e) => {
                            tracing::warn!(peer = %peer, error = %e, "Bearing query failed");
                            format!(";{}", e.code())
                        }
                    };
                    stream.write_all(reply.as_bytes()).await?;
                    stream.flush().await?;
                }
                Command::SetTarget(bearing) => {
                    requested = bearing;
                }
                Command::SetAndMove(bearing) => {
                    requested = bearing;
                    if let Some(bearing) = bearing {
                        move_to(app, &peer, bearing).await;
                    }
                }
                Command::ExecuteMove => {
                    if let Some(bearing) = requested.filter(|b| *b <= MAX_BEARING) {
                        move_to(app, &peer, bearing).await;
                    }
                }
            }
        }
    }

    let elapsed_ms = started.elapsed().as_millis() as u64;
    tracing::info!(peer = %peer, elapsed_ms, "Serial client disconnected");
    Ok(())
}

async fn move_to(app: &AppState, peer: &str, bearing: u16) {
    if let Err(e) = app.rotator.set_bearing(bearing).await {
        tracing::warn!(peer = %peer, bearing, error = %e, "Failed to set bearing");
    }
}
