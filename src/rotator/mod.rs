//! Rotator protocol driver
//!
//! This module owns the serial link to the rotator controller. The link is a
//! half-duplex UART shared by every logical client (HTTP handlers, the legacy
//! pass-through listener and the UDP integration), so all traffic goes through
//! a single [`RotatorDriver`] that serializes access and rejects contenders
//! with [`RotatorError::Busy`] instead of queueing them.

pub mod driver;
pub mod error;
pub mod protocol;

pub use driver::{DynSerial, RotatorDriver, SerialPortIO, open_serial};
pub use error::RotatorError;
pub use protocol::{Command, Dialect, MAX_BEARING};
