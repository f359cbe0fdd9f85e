//! DCU-1 style command encoding
//!
//! Commands are short ASCII strings terminated by `;` or CR:
//!
//! - `AI1;` reports the current bearing, answered with `;DDD`
//! - `AP1DDD;` stores a target bearing
//! - `AM1;` moves to the stored target
//! - `AP1DDD<CR>` stores a target and moves in one step
//!
//! A bare `;` stops the rotator and is used as the wake-up command.

use serde::{Deserialize, Serialize};

use crate::rotator::error::RotatorError;

/// Highest valid bearing in degrees.
pub const MAX_BEARING: u16 = 360;

pub const QUERY_BEARING: &[u8] = b"AI1;";
pub const STOP: &[u8] = b";";
pub const EXECUTE_MOVE: &[u8] = b"AM1;";

/// How a "set and move" request is encoded for the attached controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Rotor-EZ / Green Heron: `AP1DDD<CR>` sets and moves
    #[default]
    Combined,
    /// Plain DCU-1: `AP1DDD;` followed by `AM1;`
    Primitive,
}

impl Dialect {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "combined" => Some(Dialect::Combined),
            "primitive" => Some(Dialect::Primitive),
            _ => None,
        }
    }

    /// Commands to send, in order, to turn the rotator to `degrees`.
    pub fn set_commands(&self, degrees: u16) -> Vec<Vec<u8>> {
        match self {
            Dialect::Combined => vec![format!("AP1{:03}\r", degrees).into_bytes()],
            Dialect::Primitive => vec![
                format!("AP1{:03};", degrees).into_bytes(),
                EXECUTE_MOVE.to_vec(),
            ],
        }
    }
}

/// Parses a `;DDD` bearing report.
pub fn parse_bearing_reply(reply: &[u8]) -> Result<u16, RotatorError> {
    if reply.is_empty() {
        return Err(RotatorError::NoData);
    }

    let trimmed = trim_trailing(reply);
    let digits = trimmed.strip_prefix(b";").ok_or(RotatorError::BadData)?;

    parse_degrees(digits).ok_or(RotatorError::BadData)
}

/// Parses one to three ASCII digits as a bearing in `0..=360`.
pub fn parse_degrees(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() || digits.len() > 3 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }

    let value = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));

    (value <= MAX_BEARING).then_some(value)
}

fn trim_trailing(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// A command received from a legacy client on the pass-through port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `AI1;` or `AI1<CR>`
    QueryBearing,
    /// `AP1DDD;`, `None` when the digits are not a valid bearing
    SetTarget(Option<u16>),
    /// `AP1DDD<CR>`
    SetAndMove(Option<u16>),
    /// `AM1;`
    ExecuteMove,
}

/// Decodes one terminated command frame, including its terminator.
pub fn parse_command(frame: &[u8]) -> Option<Command> {
    match frame {
        b"AI1;" | b"AI1\r" => Some(Command::QueryBearing),
        b"AM1;" => Some(Command::ExecuteMove),
        [b'A', b'P', b'1', digits @ .., b'\r'] => Some(Command::SetAndMove(parse_degrees(digits))),
        [b'A', b'P', b'1', digits @ .., b';'] => Some(Command::SetTarget(parse_degrees(digits))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_dialect_sends_one_command() {
        assert_eq!(Dialect::Combined.set_commands(7), vec![b"AP1007\r".to_vec()]);
    }

    #[test]
    fn primitive_dialect_sends_target_then_move() {
        assert_eq!(
            Dialect::Primitive.set_commands(270),
            vec![b"AP1270;".to_vec(), b"AM1;".to_vec()]
        );
    }

    #[test]
    fn reply_parsing() {
        assert_eq!(parse_bearing_reply(b";123"), Ok(123));
        assert_eq!(parse_bearing_reply(b";5\r"), Ok(5));
        assert_eq!(parse_bearing_reply(b""), Err(RotatorError::NoData));
        assert_eq!(parse_bearing_reply(b"123"), Err(RotatorError::BadData));
        assert_eq!(parse_bearing_reply(b";"), Err(RotatorError::BadData));
        assert_eq!(parse_bearing_reply(b";1234"), Err(RotatorError::BadData));
        assert_eq!(parse_bearing_reply(b";999"), Err(RotatorError::BadData));
    }

    #[test]
    fn command_frames() {
        assert_eq!(parse_command(b"AI1\r"), Some(Command::QueryBearing));
        assert_eq!(parse_command(b"AP1090;"), Some(Command::SetTarget(Some(90))));
        assert_eq!(parse_command(b"AP1400\r"), Some(Command::SetAndMove(None)));
        assert_eq!(parse_command(b"AM1;"), Some(Command::ExecuteMove));
        assert_eq!(parse_command(b"AX1;"), None);
    }
}
