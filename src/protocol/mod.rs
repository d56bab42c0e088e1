//! Protocol Module
//!
//! Defines the Tokyo Tyrant binary wire protocol.
//!
//! ## Request Format
//! ```text
//! ┌──────────┬──────────┬───────────────────────────────────────┐
//! │ 0xC8 (1) │ Cmd (1)  │ Arguments in schema slot order        │
//! └──────────┴──────────┴───────────────────────────────────────┘
//! ```
//!
//! ### Commands (selection)
//! - 0x10: PUT      - `[ksiz][vsiz][key][value]`
//! - 0x20: OUT      - `[ksiz][key]`
//! - 0x30: GET      - `[ksiz][key]`
//! - 0x31: MGET     - `[count]([ksiz][key])*`
//! - 0x60: ADDINT   - `[ksiz][num][key]`
//! - 0x90: MISC     - `[nsiz][opts][count][name]([asiz][arg])*`
//!
//! ## Response Format
//! ```text
//! ┌──────────┬─────────────────────────────────────┐
//! │Status(1) │ Payload (shape fixed per command)   │
//! └──────────┴─────────────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: success
//! - 0x01: failure, meaning resolved per command (e.g. NO_RECORD for GET)
//! - 0x02..=0x0b: explicit error codes, see [`ErrorCode`]

mod command;
mod response;
mod codec;

pub use command::{
    Arg, ArgType, CommandKind, Request, Schema, Slot, Value, EXT_LOCK_GLOBAL, EXT_LOCK_RECORD,
    MAGIC, MISC_NO_UPDATE_LOG, REPL_CHECK_CONSISTENCY, SCHEMAS,
};
pub use response::{
    join_double, split_double, status_error, ErrorCode, Failure, Reply, ReplyShape, Response,
    DOUBLE_FRACTION_SCALE, MAX_STATUS, STATUS_FAILURE, STATUS_SUCCESS,
};
pub use codec::{
    decode_command, decode_response, decode_response_with_limit, encode_command,
    encode_command_with_limit, encode_response, encoded_len, read_command, read_response,
    validate_request, write_command, write_response, HEADER_SIZE, MAX_FIELD_SIZE,
};
