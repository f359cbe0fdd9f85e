//! Serial link arbitration and rotator transactions

use std::io;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_serial::SerialPortBuilderExt;

use crate::rotator::error::RotatorError;
use crate::rotator::protocol::{self, Dialect, MAX_BEARING};

/// Default line speed of DCU-1 compatible controllers.
pub const BAUD_RATE: u32 = 4800;

/// Time the controller gets to act on a command before we look for a reply
const SETTLE_DELAY: Duration = Duration::from_millis(50);
const READ_TIMEOUT: Duration = Duration::from_millis(100);
const INTER_BYTE_TIMEOUT: Duration = Duration::from_millis(10);
const WRITE_TIMEOUT: Duration = Duration::from_millis(500);
const DRAIN_POLL: Duration = Duration::from_millis(1);
const REPLY_BUFFER_SIZE: usize = 16;

pub trait SerialPortIO: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> SerialPortIO for T {}
pub type DynSerial = Box<dyn SerialPortIO>;

/// Opens the rotator UART (8N1, no flow control).
pub fn open_serial(path: &str, baud_rate: u32) -> Result<DynSerial> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .with_context(|| format!("Failed to open rotator serial port: {}", path))?;

    Ok(Box::new(port))
}

/// Everything guarded by the link lock.
struct LinkState {
    port: DynSerial,
    initialized: bool,
    last_bearing: Result<u16, RotatorError>,
    last_requested: Option<u16>,
}

/// The single owner of the rotator serial link.
///
/// Every operation takes the link lock with `try_lock`; a caller that finds it
/// held gets [`RotatorError::Busy`] straight away and the port is left alone.
/// The guard is dropped on every exit path, including I/O failures and a
/// cancelled caller future.
pub struct RotatorDriver {
    link: Mutex<LinkState>,
    dialect: Dialect,
}

impl RotatorDriver {
    pub fn new(port: DynSerial, dialect: Dialect) -> Self {
        Self {
            link: Mutex::new(LinkState {
                port,
                initialized: false,
                last_bearing: Err(RotatorError::Unknown),
                last_requested: None,
            }),
            dialect,
        }
    }

    /// Asks the controller for its current bearing.
    pub async fn get_bearing(&self) -> Result<u16, RotatorError> {
        let mut link = self.acquire()?;

        let result = match link.query().await {
            Ok(reply) => protocol::parse_bearing_reply(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "Serial error while reading bearing");
                Err(RotatorError::AsyncError)
            }
        };

        if result == Err(RotatorError::BadData) {
            tracing::warn!("Unexpected bearing reply from rotator");
        }

        link.last_bearing = result;
        result
    }

    /// Turns the rotator to `degrees` using the configured dialect.
    ///
    /// Callers validate the range; anything above 360 is refused with
    /// `BadData` without touching the port.
    pub async fn set_bearing(&self, degrees: u16) -> Result<u16, RotatorError> {
        if degrees > MAX_BEARING {
            return Err(RotatorError::BadData);
        }

        let mut link = self.acquire()?;

        for command in self.dialect.set_commands(degrees) {
            if let Err(e) = link.send(&command).await {
                tracing::warn!(error = %e, bearing = degrees, "Serial error while setting bearing");
                return Err(RotatorError::AsyncError);
            }
        }

        link.last_requested = Some(degrees);
        tracing::debug!(bearing = degrees, dialect = ?self.dialect, "Rotator bearing set");
        Ok(degrees)
    }

    /// Result of the most recent bearing query, or `Busy` while the link is in use.
    pub fn last_bearing(&self) -> Result<u16, RotatorError> {
        self.link
            .try_lock()
            .map_err(|_| RotatorError::Busy)
            .and_then(|link| link.last_bearing)
    }

    /// Most recently requested bearing, if the link is free and one was set.
    pub fn last_requested_bearing(&self) -> Option<u16> {
        self.link.try_lock().ok().and_then(|link| link.last_requested)
    }

    fn acquire(&self) -> Result<tokio::sync::MutexGuard<'_, LinkState>, RotatorError> {
        self.link.try_lock().map_err(|_| {
            tracing::debug!("Rotator link busy");
            RotatorError::Busy
        })
    }
}

impl LinkState {
    async fn ensure_initialized(&mut self) -> io::Result<()> {
        if !self.initialized {
            self.write_command(protocol::STOP).await?;
            self.initialized = true;
        }
        Ok(())
    }

    async fn query(&mut self) -> io::Result<Vec<u8>> {
        self.ensure_initialized().await?;
        self.write_command(protocol::QUERY_BEARING).await?;
        self.read_reply().await
    }

    async fn send(&mut self, command: &[u8]) -> io::Result<()> {
        self.ensure_initialized().await?;
        self.write_command(command).await
    }

    /// Drains stale input, writes `command` and waits for the controller to settle.
    async fn write_command(&mut self, command: &[u8]) -> io::Result<()> {
        self.drain().await?;

        tracing::debug!(command = %String::from_utf8_lossy(command).escape_debug(), "Serial write");

        let write = async {
            self.port.write_all(command).await?;
            self.port.flush().await
        };
        timeout(WRITE_TIMEOUT, write)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "serial write timed out"))??;

        sleep(SETTLE_DELAY).await;
        Ok(())
    }

    async fn drain(&mut self) -> io::Result<()> {
        let mut scratch = [0u8; REPLY_BUFFER_SIZE];

        loop {
            match timeout(DRAIN_POLL, self.port.read(&mut scratch)).await {
                Ok(Ok(0)) | Err(_) => return Ok(()),
                Ok(Ok(n)) => tracing::trace!(discarded = n, "Drained stale serial bytes"),
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    async fn read_reply(&mut self) -> io::Result<Vec<u8>> {
        let mut reply = Vec::with_capacity(REPLY_BUFFER_SIZE);
        let mut buf = [0u8; REPLY_BUFFER_SIZE];
        let mut wait = READ_TIMEOUT;

        while reply.len() < REPLY_BUFFER_SIZE {
            let room = REPLY_BUFFER_SIZE - reply.len();
            match timeout(wait, self.port.read(&mut buf[..room])).await {
                Ok(Ok(0)) | Err(_) => break,
                Ok(Ok(n)) => {
                    reply.extend_from_slice(&buf[..n]);
                    wait = INTER_BYTE_TIMEOUT;
                }
                Ok(Err(e)) => return Err(e),
            }
        }

        tracing::debug!(reply = %String::from_utf8_lossy(&reply).escape_debug(), "Serial read");
        Ok(reply)
    }
}
