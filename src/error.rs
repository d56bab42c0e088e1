//! Error types for tyrantkv
//!
//! Provides a unified error type for all client operations.

use thiserror::Error;

use crate::protocol::{CommandKind, ErrorCode};

/// Result type alias using TyrantError
pub type Result<T> = std::result::Result<T, TyrantError>;

/// Unified error type for tyrantkv operations
#[derive(Debug, Error)]
pub enum TyrantError {
    // -------------------------------------------------------------------------
    // Session State Errors
    // -------------------------------------------------------------------------
    #[error("Not connected")]
    NotConnected,

    #[error("Connection lost ({code}): {source}")]
    ConnectionLost {
        code: ErrorCode,
        #[source]
        source: std::io::Error,
    },

    #[error("Out of sequence: {0}")]
    OutOfSequence(&'static str),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Unknown status code: 0x{0:02x}")]
    UnknownStatus(u8),

    #[error("Schema mismatch for {command}: {reason}")]
    SchemaMismatch {
        command: CommandKind,
        reason: String,
    },

    // -------------------------------------------------------------------------
    // Server Errors
    // -------------------------------------------------------------------------
    #[error("{command} failed: {code}")]
    Server { command: CommandKind, code: ErrorCode },

    #[error("Incompatible type: existing value is not the requested numeric kind")]
    IncompatibleType,

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Argument too large: {field} is {len} bytes (max {max})")]
    ArgumentTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TyrantError {
    /// The server code carried by this error, if it came from a status byte
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            TyrantError::Server { code, .. } => Some(*code),
            TyrantError::ConnectionLost { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for the expected "record does not exist" outcome
    pub fn is_no_record(&self) -> bool {
        self.code() == Some(ErrorCode::NoRecord)
            && matches!(self, TyrantError::Server { .. })
    }

    /// True when the session was torn down by a transport failure
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, TyrantError::ConnectionLost { .. })
    }

    /// True when the reply stream can no longer be trusted and the session was closed
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TyrantError::ConnectionLost { .. }
                | TyrantError::MalformedResponse(_)
                | TyrantError::UnknownStatus(_)
        )
    }
}
