use thiserror::Error;

/// Failure modes of a rotator transaction.
///
/// These are returned through `Result` rather than folded into the bearing
/// value. The legacy serial wire still expects the old negative codes, which
/// [`RotatorError::code`] provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RotatorError {
    /// The controller did not answer within the read timeout
    #[error("no data from rotator")]
    NoData,
    /// The controller answered with something that is not a bearing
    #[error("bad data from rotator")]
    BadData,
    /// The serial port failed while reading or writing
    #[error("serial port error")]
    AsyncError,
    /// Another task holds the serial link
    #[error("rotator busy")]
    Busy,
    /// No transaction has completed yet
    #[error("rotator state unknown")]
    Unknown,
}

impl RotatorError {
    /// Numeric error code expected by legacy DCU-1 style clients.
    ///
    /// ```
    /// # use rotorlink::rotator::RotatorError;
    /// assert_eq!(RotatorError::Busy.code(), -13);
    /// ```
    pub fn code(&self) -> i32 {
        match self {
            RotatorError::NoData => -10,
            RotatorError::BadData => -11,
            RotatorError::AsyncError => -12,
            RotatorError::Busy => -13,
            RotatorError::Unknown => -99,
        }
    }
}
