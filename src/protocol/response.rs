//! Response definitions
//!
//! Status codes, reply shapes and decoded reply payloads.

use std::fmt;

use crate::error::TyrantError;
use super::CommandKind;

/// Status byte for a successful exchange
pub const STATUS_SUCCESS: u8 = 0x00;

/// Generic failure byte sent by the server; its meaning depends on the command
pub const STATUS_FAILURE: u8 = 0x01;

/// Highest status byte with a defined meaning
pub const MAX_STATUS: u8 = 0x0b;

/// Fixed-point scale used by ADDDOUBLE for the fractional part
pub const DOUBLE_FRACTION_SCALE: f64 = 1_000_000_000_000.0;

/// Server and transport error codes
///
/// Numeric values match the status bytes on the wire and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    InvalidOperation = 0x01,
    HostNotFound = 0x02,
    ConnectionRefused = 0x03,
    SendError = 0x04,
    ReceiveError = 0x05,
    ExistingRecord = 0x06,
    NoRecord = 0x07,
    NoSpace = 0x08,
    BrokenRecord = 0x09,
    RestoreError = 0x0a,
    MiscError = 0x0b,
}

impl ErrorCode {
    /// Map a nonzero status byte to its code
    pub fn from_status(status: u8) -> Option<Self> {
        let code = match status {
            0x01 => ErrorCode::InvalidOperation,
            0x02 => ErrorCode::HostNotFound,
            0x03 => ErrorCode::ConnectionRefused,
            0x04 => ErrorCode::SendError,
            0x05 => ErrorCode::ReceiveError,
            0x06 => ErrorCode::ExistingRecord,
            0x07 => ErrorCode::NoRecord,
            0x08 => ErrorCode::NoSpace,
            0x09 => ErrorCode::BrokenRecord,
            0x0a => ErrorCode::RestoreError,
            0x0b => ErrorCode::MiscError,
            _ => return None,
        };
        Some(code)
    }

    /// Status byte for this code
    pub fn status(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidOperation => "INVALID_OPERATION",
            ErrorCode::HostNotFound => "HOST_NOT_FOUND",
            ErrorCode::ConnectionRefused => "CONNECTION_REFUSED",
            ErrorCode::SendError => "SEND_ERROR",
            ErrorCode::ReceiveError => "RECEIVE_ERROR",
            ErrorCode::ExistingRecord => "EXISTING_RECORD",
            ErrorCode::NoRecord => "NO_RECORD",
            ErrorCode::NoSpace => "NO_SPACE",
            ErrorCode::BrokenRecord => "BROKEN_RECORD",
            ErrorCode::RestoreError => "RESTORE_ERROR",
            ErrorCode::MiscError => "MISC_ERROR",
        };
        f.write_str(name)
    }
}

/// What a generic failure status means for a given command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Code(ErrorCode),
    IncompatibleType,
}

impl Failure {
    pub fn into_error(self, command: CommandKind) -> TyrantError {
        match self {
            Failure::Code(code) => TyrantError::Server { command, code },
            Failure::IncompatibleType => TyrantError::IncompatibleType,
        }
    }
}

/// Map a nonzero status byte to the error it stands for
pub fn status_error(command: CommandKind, status: u8) -> TyrantError {
    if status == STATUS_FAILURE {
        return command.schema().failure.into_error(command);
    }
    match ErrorCode::from_status(status) {
        Some(code) => TyrantError::Server { command, code },
        None => TyrantError::UnknownStatus(status),
    }
}

/// Payload shape that follows a success status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// The server sends nothing at all, not even a status byte
    Nothing,
    /// Status byte only
    Status,
    /// `[len][bytes]`
    Blob,
    /// `[count]([len][bytes])*`
    List,
    /// `[count]([klen][vlen][key][value])*`
    Pairs,
    U32,
    I32,
    U64,
    /// Integral and fractional parts as two i64
    Double,
}

/// A decoded reply payload
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Done,
    Blob(Vec<u8>),
    List(Vec<Vec<u8>>),
    Pairs(Vec<(Vec<u8>, Vec<u8>)>),
    U32(u32),
    I32(i32),
    U64(u64),
    Double { integ: i64, fract: i64 },
}

impl Reply {
    /// Shape this reply encodes as
    pub fn shape(&self) -> ReplyShape {
        match self {
            Reply::Done => ReplyShape::Status,
            Reply::Blob(_) => ReplyShape::Blob,
            Reply::List(_) => ReplyShape::List,
            Reply::Pairs(_) => ReplyShape::Pairs,
            Reply::U32(_) => ReplyShape::U32,
            Reply::I32(_) => ReplyShape::I32,
            Reply::U64(_) => ReplyShape::U64,
            Reply::Double { .. } => ReplyShape::Double,
        }
    }

    /// Build a double reply from a float
    pub fn double(value: f64) -> Self {
        let (integ, fract) = split_double(value);
        Reply::Double { integ, fract }
    }
}

/// Split a float into the integral/fractional pair ADDDOUBLE carries
pub fn split_double(value: f64) -> (i64, i64) {
    let integ = value.trunc();
    let fract = ((value - integ) * DOUBLE_FRACTION_SCALE).round();
    (integ as i64, fract as i64)
}

/// Join an integral/fractional pair back into a float
pub fn join_double(integ: i64, fract: i64) -> f64 {
    integ as f64 + fract as f64 / DOUBLE_FRACTION_SCALE
}

/// A response frame: status byte plus payload
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// Status byte as received
    pub status: u8,

    /// Payload (always `Reply::Done` for a failure status)
    pub reply: Reply,
}

impl Response {
    /// Create a success response
    pub fn ok(reply: Reply) -> Self {
        Self {
            status: STATUS_SUCCESS,
            reply,
        }
    }

    /// Create a failure response with the given status byte
    pub fn failure(status: u8) -> Self {
        Self {
            status,
            reply: Reply::Done,
        }
    }

    /// Check whether the status byte reports success
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    /// Turn the status into the outcome the caller sees
    pub fn into_result(self, command: CommandKind) -> crate::error::Result<Reply> {
        if self.is_success() {
            Ok(self.reply)
        } else {
            Err(status_error(command, self.status))
        }
    }
}
