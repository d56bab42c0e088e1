//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬──────────────────────┬─────────────────────┐
//! │ 0xC8 (1) │ Cmd (1)  │ lengths + numerics   │ bodies, list items  │
//! └──────────┴──────────┴──────────────────────┴─────────────────────┘
//! ```
//!
//! The slot order after the header comes from the command's [`Schema`].
//! All integers are big-endian.
//!
//! ### Response Format
//! ```text
//! ┌──────────┬─────────────────────────────────────┐
//! │Status(1) │ Payload (only when status == 0)     │
//! └──────────┴─────────────────────────────────────┘
//! ```

use std::io::{self, Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, TyrantError};
use super::command::{Arg, ArgType, CommandKind, Request, Schema, Slot, Value, MAGIC};
use super::response::{Reply, ReplyShape, Response, MAX_STATUS, STATUS_SUCCESS};

/// Largest length any field can declare (lengths are signed 32-bit on the server)
pub const MAX_FIELD_SIZE: usize = i32::MAX as usize;

/// Request header size: magic + command byte
pub const HEADER_SIZE: usize = 2;

// =============================================================================
// Request Validation
// =============================================================================

/// Check a request against its schema and the given length limit
pub fn validate_request(request: &Request<'_>, max_len: usize) -> Result<()> {
    let max_len = field_limit(max_len);
    let schema = request.kind.schema();

    if request.args.len() != schema.args.len() {
        return Err(TyrantError::SchemaMismatch {
            command: request.kind,
            reason: format!(
                "expected {} arguments, got {}",
                schema.args.len(),
                request.args.len()
            ),
        });
    }

    for (arg, (name, ty)) in request.args.iter().zip(schema.args) {
        if arg.arg_type() != *ty {
            return Err(TyrantError::SchemaMismatch {
                command: request.kind,
                reason: format!("argument '{}' should be {:?}, got {:?}", name, ty, arg.arg_type()),
            });
        }
        match arg {
            Arg::Bytes(bytes) => check_len(name, bytes.len(), max_len)?,
            Arg::List(items) => {
                check_len(name, items.len(), max_len)?;
                for item in items {
                    check_len(name, item.len(), max_len)?;
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Length words are 32-bit; no caller limit may exceed what they can carry
fn field_limit(max_len: usize) -> usize {
    max_len.min(MAX_FIELD_SIZE)
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(TyrantError::ArgumentTooLarge { field, len, max });
    }
    Ok(())
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
///
/// Validates against the schema and the protocol's field limit first.
pub fn encode_command(request: &Request<'_>) -> Result<Bytes> {
    encode_command_with_limit(request, MAX_FIELD_SIZE)
}

/// Encode a request, enforcing a tighter per-field limit
pub fn encode_command_with_limit(request: &Request<'_>, max_len: usize) -> Result<Bytes> {
    validate_request(request, max_len)?;

    let schema = request.kind.schema();
    let mut buf = BytesMut::with_capacity(encoded_len(request));
    buf.put_u8(MAGIC);
    buf.put_u8(request.kind as u8);

    for slot in schema.layout {
        match (*slot, &request.args[slot_index(*slot)]) {
            (Slot::Len(_), Arg::Bytes(bytes)) => buf.put_u32(bytes.len() as u32),
            (Slot::Body(_), Arg::Bytes(bytes)) => buf.put_slice(bytes),
            (Slot::Count(_), Arg::List(items)) => buf.put_u32(items.len() as u32),
            (Slot::Items(_), Arg::List(items)) => {
                for item in items {
                    buf.put_u32(item.len() as u32);
                    buf.put_slice(item);
                }
            }
            (Slot::Num(_), Arg::I32(n)) => buf.put_i32(*n),
            (Slot::Num(_), Arg::U32(n)) => buf.put_u32(*n),
            (Slot::Num(_), Arg::I64(n)) => buf.put_i64(*n),
            (Slot::Num(_), Arg::U64(n)) => buf.put_u64(*n),
            (slot, arg) => {
                return Err(TyrantError::SchemaMismatch {
                    command: request.kind,
                    reason: format!("slot {:?} cannot hold {:?}", slot, arg.arg_type()),
                })
            }
        }
    }

    Ok(buf.freeze())
}

/// Exact encoded size of a (valid) request
pub fn encoded_len(request: &Request<'_>) -> usize {
    HEADER_SIZE
        + request
            .args
            .iter()
            .map(|arg| match arg {
                Arg::Bytes(bytes) => 4 + bytes.len(),
                Arg::I32(_) | Arg::U32(_) => 4,
                Arg::I64(_) | Arg::U64(_) => 8,
                Arg::List(items) => 4 + items.iter().map(|i| 4 + i.len()).sum::<usize>(),
            })
            .sum::<usize>()
}

fn slot_index(slot: Slot) -> usize {
    match slot {
        Slot::Len(i) | Slot::Num(i) | Slot::Count(i) | Slot::Body(i) | Slot::Items(i) => i,
    }
}

/// Decode a request from bytes
///
/// Returns the command, its arguments in schema order, and the number of
/// bytes consumed.
pub fn decode_command(bytes: &[u8]) -> Result<(CommandKind, Vec<Value>, usize)> {
    let mut reader = FieldReader::new(bytes, MAX_FIELD_SIZE);
    let (kind, values) = read_request_body(&mut reader).map_err(|e| e.into_request_error())?;
    Ok((kind, values, bytes.len() - reader.inner.len()))
}

fn read_request_body<R: Read>(
    reader: &mut FieldReader<R>,
) -> std::result::Result<(CommandKind, Vec<Value>), FieldError> {
    let magic = reader.u8()?;
    if magic != MAGIC {
        return Err(FieldError::Invalid(format!("bad magic byte 0x{:02x}", magic)));
    }
    let byte = reader.u8()?;
    let kind = CommandKind::from_byte(byte)
        .ok_or_else(|| FieldError::Invalid(format!("unknown command byte 0x{:02x}", byte)))?;
    let values = read_args(reader, kind.schema())?;
    Ok((kind, values))
}

fn read_args<R: Read>(
    reader: &mut FieldReader<R>,
    schema: &Schema,
) -> std::result::Result<Vec<Value>, FieldError> {
    let mut lengths = vec![0usize; schema.args.len()];
    let mut values: Vec<Option<Value>> = vec![None; schema.args.len()];

    for slot in schema.layout {
        let index = slot_index(*slot);
        match *slot {
            Slot::Len(_) | Slot::Count(_) => lengths[index] = reader.len()?,
            Slot::Num(_) => {
                values[index] = Some(match schema.args[index].1 {
                    ArgType::I32 => Value::I32(reader.i32()?),
                    ArgType::U32 => Value::U32(reader.u32()?),
                    ArgType::I64 => Value::I64(reader.i64()?),
                    ArgType::U64 => Value::U64(reader.u64()?),
                    ty => return Err(FieldError::Invalid(format!("{:?} in numeric slot", ty))),
                })
            }
            Slot::Body(_) => values[index] = Some(Value::Bytes(reader.bytes(lengths[index])?)),
            Slot::Items(_) => {
                let mut items = Vec::with_capacity(lengths[index].min(1024));
                for _ in 0..lengths[index] {
                    let len = reader.len()?;
                    items.push(reader.bytes(len)?);
                }
                values[index] = Some(Value::List(items));
            }
        }
    }

    values
        .into_iter()
        .zip(schema.args)
        .map(|(value, (name, _))| {
            value.ok_or_else(|| FieldError::Invalid(format!("argument '{}' missing from layout", name)))
        })
        .collect()
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Commands whose schema has no reply encode to nothing. A failure status
/// carries no payload.
pub fn encode_response(kind: CommandKind, response: &Response) -> Result<Bytes> {
    let shape = kind.schema().reply;
    if shape == ReplyShape::Nothing {
        return Ok(Bytes::new());
    }

    let mut buf = BytesMut::new();
    buf.put_u8(response.status);
    if !response.is_success() {
        return Ok(buf.freeze());
    }

    if response.reply.shape() != shape {
        return Err(TyrantError::SchemaMismatch {
            command: kind,
            reason: format!("reply {:?} does not match {:?}", response.reply.shape(), shape),
        });
    }

    match &response.reply {
        Reply::Done => {}
        Reply::Blob(bytes) => put_blob(&mut buf, bytes),
        Reply::List(items) => {
            buf.put_u32(items.len() as u32);
            for item in items {
                put_blob(&mut buf, item);
            }
        }
        Reply::Pairs(pairs) => {
            buf.put_u32(pairs.len() as u32);
            for (key, value) in pairs {
                buf.put_u32(key.len() as u32);
                buf.put_u32(value.len() as u32);
                buf.put_slice(key);
                buf.put_slice(value);
            }
        }
        Reply::U32(n) => buf.put_u32(*n),
        Reply::I32(n) => buf.put_i32(*n),
        Reply::U64(n) => buf.put_u64(*n),
        Reply::Double { integ, fract } => {
            buf.put_i64(*integ);
            buf.put_i64(*fract);
        }
    }

    Ok(buf.freeze())
}

fn put_blob(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u32(bytes.len() as u32);
    buf.put_slice(bytes);
}

/// Decode one response frame from bytes
///
/// Returns the response and the number of bytes consumed. Fails with
/// `MalformedResponse` if any field is truncated and with `UnknownStatus`
/// for an undefined status byte.
pub fn decode_response(kind: CommandKind, bytes: &[u8]) -> Result<(Response, usize)> {
    decode_response_with_limit(kind, bytes, MAX_FIELD_SIZE)
}

/// Decode one response frame, rejecting declared lengths above `max_len`
pub fn decode_response_with_limit(
    kind: CommandKind,
    bytes: &[u8],
    max_len: usize,
) -> Result<(Response, usize)> {
    let mut reader = FieldReader::new(bytes, max_len);
    let response = read_response_frame(&mut reader, kind).map_err(|e| e.into_response_error())?;
    Ok((response, bytes.len() - reader.inner.len()))
}

fn read_response_frame<R: Read>(
    reader: &mut FieldReader<R>,
    kind: CommandKind,
) -> std::result::Result<Response, FieldError> {
    let shape = kind.schema().reply;
    if shape == ReplyShape::Nothing {
        return Ok(Response::ok(Reply::Done));
    }

    let status = reader.u8()?;
    if status > MAX_STATUS {
        return Err(FieldError::Status(status));
    }
    if status != STATUS_SUCCESS {
        return Ok(Response::failure(status));
    }

    let reply = match shape {
        ReplyShape::Nothing | ReplyShape::Status => Reply::Done,
        ReplyShape::Blob => {
            let len = reader.len()?;
            Reply::Blob(reader.bytes(len)?)
        }
        ReplyShape::List => {
            let count = reader.len()?;
            let mut items = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let len = reader.len()?;
                items.push(reader.bytes(len)?);
            }
            Reply::List(items)
        }
        ReplyShape::Pairs => {
            let count = reader.len()?;
            let mut pairs = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let key_len = reader.len()?;
                let value_len = reader.len()?;
                let key = reader.bytes(key_len)?;
                let value = reader.bytes(value_len)?;
                pairs.push((key, value));
            }
            Reply::Pairs(pairs)
        }
        ReplyShape::U32 => Reply::U32(reader.u32()?),
        ReplyShape::I32 => Reply::I32(reader.i32()?),
        ReplyShape::U64 => Reply::U64(reader.u64()?),
        ReplyShape::Double => Reply::Double {
            integ: reader.i64()?,
            fract: reader.i64()?,
        },
    };

    Ok(Response::ok(reply))
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Write a request to a stream in one logical send
pub fn write_command<W: Write>(writer: &mut W, request: &Request<'_>, max_len: usize) -> Result<()> {
    let bytes = encode_command_with_limit(request, max_len)?;
    writer.write_all(&bytes).map_err(send_error)?;
    writer.flush().map_err(send_error)?;
    Ok(())
}

/// Read a complete response frame from a stream
///
/// Blocks until the whole frame has been read. Any I/O failure, including a
/// timeout or EOF mid-frame, is reported as `ConnectionLost`.
pub fn read_response<R: Read>(reader: &mut R, kind: CommandKind, max_len: usize) -> Result<Response> {
    let mut reader = FieldReader::new(reader, max_len);
    read_response_frame(&mut reader, kind).map_err(|e| e.into_stream_error())
}

/// Read a complete request frame from a stream
///
/// Returns `Ok(None)` if the peer closed the stream between frames.
pub fn read_command<R: Read>(reader: &mut R, max_len: usize) -> Result<Option<(CommandKind, Vec<Value>)>> {
    let mut first = [0u8; 1];
    loop {
        match reader.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(recv_error(e)),
        }
    }

    let mut reader = FieldReader::new((&first[..]).chain(reader), max_len);
    read_request_body(&mut reader)
        .map(Some)
        .map_err(|e| e.into_stream_error())
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, kind: CommandKind, response: &Response) -> Result<()> {
    let bytes = encode_response(kind, response)?;
    writer.write_all(&bytes).map_err(send_error)?;
    writer.flush().map_err(send_error)?;
    Ok(())
}

pub(crate) fn send_error(source: io::Error) -> TyrantError {
    TyrantError::ConnectionLost {
        code: super::ErrorCode::SendError,
        source,
    }
}

pub(crate) fn recv_error(source: io::Error) -> TyrantError {
    TyrantError::ConnectionLost {
        code: super::ErrorCode::ReceiveError,
        source,
    }
}

// =============================================================================
// Field Reader
// =============================================================================

/// Failure while pulling fields out of a byte source
#[derive(Debug)]
enum FieldError {
    Io(io::Error),
    TooLarge { len: usize, max: usize },
    Status(u8),
    Invalid(String),
}

impl FieldError {
    /// Mapping for complete in-memory response frames
    fn into_response_error(self) -> TyrantError {
        match self {
            FieldError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                TyrantError::MalformedResponse("frame truncated before declared length".to_string())
            }
            other => other.into_stream_error(),
        }
    }

    /// Mapping for in-memory request frames
    fn into_request_error(self) -> TyrantError {
        match self {
            FieldError::Io(_) => TyrantError::InvalidArgument("truncated request frame".to_string()),
            FieldError::TooLarge { len, max } => TyrantError::ArgumentTooLarge {
                field: "request field",
                len,
                max,
            },
            other => other.into_stream_error(),
        }
    }

    /// Mapping for frames read off a socket
    fn into_stream_error(self) -> TyrantError {
        match self {
            FieldError::Io(e) => recv_error(e),
            FieldError::TooLarge { len, max } => TyrantError::MalformedResponse(format!(
                "declared length {} exceeds limit {}",
                len, max
            )),
            FieldError::Status(status) => TyrantError::UnknownStatus(status),
            FieldError::Invalid(reason) => TyrantError::MalformedResponse(reason),
        }
    }
}

impl From<io::Error> for FieldError {
    fn from(e: io::Error) -> Self {
        FieldError::Io(e)
    }
}

/// Reads fixed-width big-endian fields, never past a declared length
struct FieldReader<R> {
    inner: R,
    max_len: usize,
}

impl<R: Read> FieldReader<R> {
    fn new(inner: R, max_len: usize) -> Self {
        Self { inner, max_len }
    }

    fn array<const N: usize>(&mut self) -> std::result::Result<[u8; N], FieldError> {
        let mut buf = [0u8; N];
        self.inner.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn u8(&mut self) -> std::result::Result<u8, FieldError> {
        Ok(self.array::<1>()?[0])
    }

    fn u32(&mut self) -> std::result::Result<u32, FieldError> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> std::result::Result<i32, FieldError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> std::result::Result<u64, FieldError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn i64(&mut self) -> std::result::Result<i64, FieldError> {
        Ok(i64::from_be_bytes(self.array()?))
    }

    /// A length or count word, checked against the limit
    fn len(&mut self) -> std::result::Result<usize, FieldError> {
        let len = self.u32()? as usize;
        if len > self.max_len {
            return Err(FieldError::TooLarge {
                len,
                max: self.max_len,
            });
        }
        Ok(len)
    }

    fn bytes(&mut self, len: usize) -> std::result::Result<Vec<u8>, FieldError> {
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() < len {
            return Err(FieldError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("expected {} bytes, got {}", len, buf.len()),
            )));
        }
        Ok(buf)
    }
}
