//! Command definitions
//!
//! Typed requests and the static schema table that fixes, per command,
//! the argument list, the wire slot order and the reply shape.

use std::fmt;

use super::response::{Failure, ReplyShape};
use super::ErrorCode;

/// First byte of every request frame
pub const MAGIC: u8 = 0xc8;

/// Command identifiers (second byte of every request frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandKind {
    Put = 0x10,
    PutKeep = 0x11,
    PutCat = 0x12,
    PutShl = 0x13,
    PutNr = 0x18,
    Out = 0x20,
    Get = 0x30,
    MGet = 0x31,
    VSiz = 0x38,
    IterInit = 0x50,
    IterNext = 0x51,
    FwmKeys = 0x58,
    AddInt = 0x60,
    AddDouble = 0x61,
    Ext = 0x68,
    Sync = 0x70,
    Optimize = 0x71,
    Vanish = 0x72,
    Copy = 0x73,
    Restore = 0x74,
    SetMst = 0x78,
    RNum = 0x80,
    Size = 0x81,
    Stat = 0x88,
    Misc = 0x90,
}

impl CommandKind {
    /// Every command, in schema table order
    pub const ALL: [CommandKind; 25] = [
        CommandKind::Put,
        CommandKind::PutKeep,
        CommandKind::PutCat,
        CommandKind::PutShl,
        CommandKind::PutNr,
        CommandKind::Out,
        CommandKind::Get,
        CommandKind::MGet,
        CommandKind::VSiz,
        CommandKind::IterInit,
        CommandKind::IterNext,
        CommandKind::FwmKeys,
        CommandKind::AddInt,
        CommandKind::AddDouble,
        CommandKind::Ext,
        CommandKind::Sync,
        CommandKind::Optimize,
        CommandKind::Vanish,
        CommandKind::Copy,
        CommandKind::Restore,
        CommandKind::SetMst,
        CommandKind::RNum,
        CommandKind::Size,
        CommandKind::Stat,
        CommandKind::Misc,
    ];

    /// Look up a command by its wire byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| *kind as u8 == byte)
    }

    /// Static schema for this command
    pub fn schema(self) -> &'static Schema {
        &SCHEMAS[self.index()]
    }

    /// Protocol name, as ttserver logs it
    pub fn name(self) -> &'static str {
        self.schema().name
    }

    fn index(self) -> usize {
        match self {
            CommandKind::Put => 0,
            CommandKind::PutKeep => 1,
            CommandKind::PutCat => 2,
            CommandKind::PutShl => 3,
            CommandKind::PutNr => 4,
            CommandKind::Out => 5,
            CommandKind::Get => 6,
            CommandKind::MGet => 7,
            CommandKind::VSiz => 8,
            CommandKind::IterInit => 9,
            CommandKind::IterNext => 10,
            CommandKind::FwmKeys => 11,
            CommandKind::AddInt => 12,
            CommandKind::AddDouble => 13,
            CommandKind::Ext => 14,
            CommandKind::Sync => 15,
            CommandKind::Optimize => 16,
            CommandKind::Vanish => 17,
            CommandKind::Copy => 18,
            CommandKind::Restore => 19,
            CommandKind::SetMst => 20,
            CommandKind::RNum => 21,
            CommandKind::Size => 22,
            CommandKind::Stat => 23,
            CommandKind::Misc => 24,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// Typed Arguments
// =============================================================================

/// Argument types a schema can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// Raw bytes with a 4-byte length word
    Bytes,
    I32,
    U32,
    I64,
    U64,
    /// Count word plus `[len][bytes]` items
    List,
}

/// A borrowed request argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg<'a> {
    Bytes(&'a [u8]),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    List(Vec<&'a [u8]>),
}

impl Arg<'_> {
    pub fn arg_type(&self) -> ArgType {
        match self {
            Arg::Bytes(_) => ArgType::Bytes,
            Arg::I32(_) => ArgType::I32,
            Arg::U32(_) => ArgType::U32,
            Arg::I64(_) => ArgType::I64,
            Arg::U64(_) => ArgType::U64,
            Arg::List(_) => ArgType::List,
        }
    }
}

/// An owned argument, as produced by decoding a request frame
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bytes(Vec<u8>),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    List(Vec<Vec<u8>>),
}

impl Value {
    /// Borrow as a request argument
    pub fn as_arg(&self) -> Arg<'_> {
        match self {
            Value::Bytes(b) => Arg::Bytes(b),
            Value::I32(n) => Arg::I32(*n),
            Value::U32(n) => Arg::U32(*n),
            Value::I64(n) => Arg::I64(*n),
            Value::U64(n) => Arg::U64(*n),
            Value::List(items) => Arg::List(items.iter().map(Vec::as_slice).collect()),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

// =============================================================================
// Schema Table
// =============================================================================

/// One position in the request frame after the 2-byte header
///
/// The index refers to the argument list of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// 4-byte length word of a `Bytes` argument
    Len(usize),
    /// Fixed-width numeric argument
    Num(usize),
    /// 4-byte item count of a `List` argument
    Count(usize),
    /// Body of a `Bytes` argument
    Body(usize),
    /// `[len][bytes]` items of a `List` argument
    Items(usize),
}

/// Static description of one command
#[derive(Debug)]
pub struct Schema {
    pub kind: CommandKind,
    pub name: &'static str,
    /// Argument names and types, in call order
    pub args: &'static [(&'static str, ArgType)],
    /// Wire order of the argument slots
    pub layout: &'static [Slot],
    pub reply: ReplyShape,
    /// Meaning of the generic failure status for this command
    pub failure: Failure,
}

use ArgType as T;
use Slot::{Body, Count, Items, Len, Num};

const KEY_VALUE: &[(&str, ArgType)] = &[("key", T::Bytes), ("value", T::Bytes)];
const KEY_VALUE_LAYOUT: &[Slot] = &[Len(0), Len(1), Body(0), Body(1)];
const KEY: &[(&str, ArgType)] = &[("key", T::Bytes)];
const PATH: &[(&str, ArgType)] = &[("path", T::Bytes)];
const ONE_BLOB_LAYOUT: &[Slot] = &[Len(0), Body(0)];

const INVALID: Failure = Failure::Code(ErrorCode::InvalidOperation);
const NO_RECORD: Failure = Failure::Code(ErrorCode::NoRecord);

const fn schema(
    kind: CommandKind,
    name: &'static str,
    args: &'static [(&'static str, ArgType)],
    layout: &'static [Slot],
    reply: ReplyShape,
    failure: Failure,
) -> Schema {
    Schema {
        kind,
        name,
        args,
        layout,
        reply,
        failure,
    }
}

/// Schema table, indexed in `CommandKind::ALL` order
pub static SCHEMAS: [Schema; 25] = [
    schema(CommandKind::Put, "PUT", KEY_VALUE, KEY_VALUE_LAYOUT, ReplyShape::Status, INVALID),
    schema(
        CommandKind::PutKeep,
        "PUTKEEP",
        KEY_VALUE,
        KEY_VALUE_LAYOUT,
        ReplyShape::Status,
        Failure::Code(ErrorCode::ExistingRecord),
    ),
    schema(CommandKind::PutCat, "PUTCAT", KEY_VALUE, KEY_VALUE_LAYOUT, ReplyShape::Status, INVALID),
    schema(
        CommandKind::PutShl,
        "PUTSHL",
        &[("key", T::Bytes), ("value", T::Bytes), ("width", T::I32)],
        &[Len(0), Len(1), Num(2), Body(0), Body(1)],
        ReplyShape::Status,
        INVALID,
    ),
    schema(CommandKind::PutNr, "PUTNR", KEY_VALUE, KEY_VALUE_LAYOUT, ReplyShape::Nothing, INVALID),
    schema(CommandKind::Out, "OUT", KEY, ONE_BLOB_LAYOUT, ReplyShape::Status, NO_RECORD),
    schema(CommandKind::Get, "GET", KEY, ONE_BLOB_LAYOUT, ReplyShape::Blob, NO_RECORD),
    schema(
        CommandKind::MGet,
        "MGET",
        &[("keys", T::List)],
        &[Count(0), Items(0)],
        ReplyShape::Pairs,
        INVALID,
    ),
    schema(CommandKind::VSiz, "VSIZ", KEY, ONE_BLOB_LAYOUT, ReplyShape::U32, NO_RECORD),
    schema(CommandKind::IterInit, "ITERINIT", &[], &[], ReplyShape::Status, INVALID),
    schema(CommandKind::IterNext, "ITERNEXT", &[], &[], ReplyShape::Blob, NO_RECORD),
    schema(
        CommandKind::FwmKeys,
        "FWMKEYS",
        &[("prefix", T::Bytes), ("max", T::I32)],
        &[Len(0), Num(1), Body(0)],
        ReplyShape::List,
        INVALID,
    ),
    schema(
        CommandKind::AddInt,
        "ADDINT",
        &[("key", T::Bytes), ("num", T::I32)],
        &[Len(0), Num(1), Body(0)],
        ReplyShape::I32,
        Failure::IncompatibleType,
    ),
    schema(
        CommandKind::AddDouble,
        "ADDDOUBLE",
        &[("key", T::Bytes), ("integ", T::I64), ("fract", T::I64)],
        &[Len(0), Num(1), Num(2), Body(0)],
        ReplyShape::Double,
        Failure::IncompatibleType,
    ),
    schema(
        CommandKind::Ext,
        "EXT",
        &[
            ("name", T::Bytes),
            ("opts", T::U32),
            ("key", T::Bytes),
            ("value", T::Bytes),
        ],
        &[Len(0), Num(1), Len(2), Len(3), Body(0), Body(2), Body(3)],
        ReplyShape::Blob,
        Failure::Code(ErrorCode::MiscError),
    ),
    schema(CommandKind::Sync, "SYNC", &[], &[], ReplyShape::Status, INVALID),
    schema(
        CommandKind::Optimize,
        "OPTIMIZE",
        &[("params", T::Bytes)],
        ONE_BLOB_LAYOUT,
        ReplyShape::Status,
        INVALID,
    ),
    schema(CommandKind::Vanish, "VANISH", &[], &[], ReplyShape::Status, INVALID),
    schema(CommandKind::Copy, "COPY", PATH, ONE_BLOB_LAYOUT, ReplyShape::Status, INVALID),
    schema(
        CommandKind::Restore,
        "RESTORE",
        &[("path", T::Bytes), ("ts", T::U64), ("opts", T::U32)],
        &[Len(0), Num(1), Num(2), Body(0)],
        ReplyShape::Status,
        Failure::Code(ErrorCode::RestoreError),
    ),
    schema(
        CommandKind::SetMst,
        "SETMST",
        &[
            ("host", T::Bytes),
            ("port", T::U32),
            ("ts", T::U64),
            ("opts", T::U32),
        ],
        &[Len(0), Num(1), Num(2), Num(3), Body(0)],
        ReplyShape::Status,
        INVALID,
    ),
    schema(CommandKind::RNum, "RNUM", &[], &[], ReplyShape::U64, INVALID),
    schema(CommandKind::Size, "SIZE", &[], &[], ReplyShape::U64, INVALID),
    schema(CommandKind::Stat, "STAT", &[], &[], ReplyShape::Blob, INVALID),
    schema(
        CommandKind::Misc,
        "MISC",
        &[("name", T::Bytes), ("opts", T::U32), ("args", T::List)],
        &[Len(0), Num(1), Count(2), Body(0), Items(2)],
        ReplyShape::List,
        Failure::Code(ErrorCode::MiscError),
    ),
];

// =============================================================================
// Requests
// =============================================================================

/// Option bit for EXT: lock the record while the script runs
pub const EXT_LOCK_RECORD: u32 = 1 << 0;

/// Option bit for EXT: lock the whole database while the script runs
pub const EXT_LOCK_GLOBAL: u32 = 1 << 1;

/// Option bit for RESTORE/SETMST: check consistency of the update log
pub const REPL_CHECK_CONSISTENCY: u32 = 1 << 0;

/// Option bit for MISC: do not write the update log
pub const MISC_NO_UPDATE_LOG: u32 = 1 << 0;

/// A typed request: command plus arguments in schema order
///
/// Build requests with the constructors below; the codec still checks the
/// arguments against the schema before encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Request<'a> {
    pub kind: CommandKind,
    pub args: Vec<Arg<'a>>,
}

impl<'a> Request<'a> {
    pub fn new(kind: CommandKind, args: Vec<Arg<'a>>) -> Self {
        Self { kind, args }
    }

    fn key_value(kind: CommandKind, key: &'a [u8], value: &'a [u8]) -> Self {
        Self::new(kind, vec![Arg::Bytes(key), Arg::Bytes(value)])
    }

    fn bare(kind: CommandKind) -> Self {
        Self::new(kind, Vec::new())
    }

    pub fn put(key: &'a [u8], value: &'a [u8]) -> Self {
        Self::key_value(CommandKind::Put, key, value)
    }

    pub fn putkeep(key: &'a [u8], value: &'a [u8]) -> Self {
        Self::key_value(CommandKind::PutKeep, key, value)
    }

    pub fn putcat(key: &'a [u8], value: &'a [u8]) -> Self {
        Self::key_value(CommandKind::PutCat, key, value)
    }

    pub fn putshl(key: &'a [u8], value: &'a [u8], width: i32) -> Self {
        Self::new(
            CommandKind::PutShl,
            vec![Arg::Bytes(key), Arg::Bytes(value), Arg::I32(width)],
        )
    }

    pub fn putnr(key: &'a [u8], value: &'a [u8]) -> Self {
        Self::key_value(CommandKind::PutNr, key, value)
    }

    pub fn out(key: &'a [u8]) -> Self {
        Self::new(CommandKind::Out, vec![Arg::Bytes(key)])
    }

    pub fn get(key: &'a [u8]) -> Self {
        Self::new(CommandKind::Get, vec![Arg::Bytes(key)])
    }

    pub fn mget(keys: Vec<&'a [u8]>) -> Self {
        Self::new(CommandKind::MGet, vec![Arg::List(keys)])
    }

    pub fn vsiz(key: &'a [u8]) -> Self {
        Self::new(CommandKind::VSiz, vec![Arg::Bytes(key)])
    }

    pub fn iterinit() -> Self {
        Self::bare(CommandKind::IterInit)
    }

    pub fn iternext() -> Self {
        Self::bare(CommandKind::IterNext)
    }

    /// A negative `max` means no limit
    pub fn fwmkeys(prefix: &'a [u8], max: i32) -> Self {
        Self::new(CommandKind::FwmKeys, vec![Arg::Bytes(prefix), Arg::I32(max)])
    }

    pub fn addint(key: &'a [u8], num: i32) -> Self {
        Self::new(CommandKind::AddInt, vec![Arg::Bytes(key), Arg::I32(num)])
    }

    pub fn adddouble(key: &'a [u8], num: f64) -> Self {
        let (integ, fract) = super::response::split_double(num);
        Self::new(
            CommandKind::AddDouble,
            vec![Arg::Bytes(key), Arg::I64(integ), Arg::I64(fract)],
        )
    }

    pub fn ext(name: &'a [u8], opts: u32, key: &'a [u8], value: &'a [u8]) -> Self {
        Self::new(
            CommandKind::Ext,
            vec![
                Arg::Bytes(name),
                Arg::U32(opts),
                Arg::Bytes(key),
                Arg::Bytes(value),
            ],
        )
    }

    pub fn sync() -> Self {
        Self::bare(CommandKind::Sync)
    }

    pub fn optimize(params: &'a [u8]) -> Self {
        Self::new(CommandKind::Optimize, vec![Arg::Bytes(params)])
    }

    pub fn vanish() -> Self {
        Self::bare(CommandKind::Vanish)
    }

    pub fn copy(path: &'a [u8]) -> Self {
        Self::new(CommandKind::Copy, vec![Arg::Bytes(path)])
    }

    pub fn restore(path: &'a [u8], ts: u64, opts: u32) -> Self {
        Self::new(
            CommandKind::Restore,
            vec![Arg::Bytes(path), Arg::U64(ts), Arg::U32(opts)],
        )
    }

    pub fn setmst(host: &'a [u8], port: u32, ts: u64, opts: u32) -> Self {
        Self::new(
            CommandKind::SetMst,
            vec![Arg::Bytes(host), Arg::U32(port), Arg::U64(ts), Arg::U32(opts)],
        )
    }

    pub fn rnum() -> Self {
        Self::bare(CommandKind::RNum)
    }

    pub fn size() -> Self {
        Self::bare(CommandKind::Size)
    }

    pub fn stat() -> Self {
        Self::bare(CommandKind::Stat)
    }

    pub fn misc(name: &'a [u8], opts: u32, args: Vec<&'a [u8]>) -> Self {
        Self::new(
            CommandKind::Misc,
            vec![Arg::Bytes(name), Arg::U32(opts), Arg::List(args)],
        )
    }
}
