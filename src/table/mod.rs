//! Table Module
//!
//! Structured records and queries for table databases, carried over the
//! MISC command.
//!
//! ## MISC Functions Used
//! - `put`, `putkeep`, `putcat`: `[pkey, name, value, ...]`
//! - `out`, `get`: `[pkey]`
//! - `setindex`: `[name, type]`
//! - `genuid`: `[]`
//! - `search`, `metasearch`: query arguments (see [`Query::to_args`])

mod query;
mod record;

pub use query::{
    Condition, MetaSearch, Order, Query, QueryOp, COND_NEGATE, COND_NO_INDEX, HINT_MARKER,
};
pub use record::{Columns, Record};

use crate::error::{Result, TyrantError};
use crate::network::Session;
use crate::protocol::{CommandKind, ErrorCode, MISC_NO_UPDATE_LOG};
use query::{check_nul, join_fields, split_hint};
use record::{columns_from_list, columns_to_args};

/// Index flag: keep an existing index instead of failing
pub const INDEX_KEEP: u32 = 1 << 24;

/// Column index types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum IndexKind {
    Lexical = 0,
    Decimal = 1,
    Token = 2,
    QGram = 3,
    /// Optimize an existing index
    Optimize = 9998,
    /// Remove an existing index
    Void = 9999,
}

/// Turn a generic MISC failure into the code the table operation implies
fn refine(err: TyrantError, code: ErrorCode) -> TyrantError {
    match err {
        TyrantError::Server {
            command: CommandKind::Misc,
            code: ErrorCode::MiscError,
        } => TyrantError::Server {
            command: CommandKind::Misc,
            code,
        },
        other => other,
    }
}

impl Session {
    // =========================================================================
    // Table Records
    // =========================================================================

    /// Store a table record, overwriting an existing one
    pub fn tbl_put<I, C, V>(&mut self, key: &[u8], columns: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let args = columns_to_args(key, columns)?;
        self.misc("put", 0, &args).map(drop)
    }

    /// Store a table record only if the key is absent
    pub fn tbl_putkeep<I, C, V>(&mut self, key: &[u8], columns: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let args = columns_to_args(key, columns)?;
        self.misc("putkeep", 0, &args)
            .map(drop)
            .map_err(|e| refine(e, ErrorCode::ExistingRecord))
    }

    /// Merge columns into a table record, creating it if absent
    pub fn tbl_putcat<I, C, V>(&mut self, key: &[u8], columns: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let args = columns_to_args(key, columns)?;
        self.misc("putcat", 0, &args).map(drop)
    }

    /// Remove a table record (`NoRecord` if absent)
    pub fn tbl_out(&mut self, key: &[u8]) -> Result<()> {
        self.misc("out", 0, &[key])
            .map(drop)
            .map_err(|e| refine(e, ErrorCode::NoRecord))
    }

    /// Retrieve the columns of a table record (`NoRecord` if absent)
    pub fn tbl_get(&mut self, key: &[u8]) -> Result<Columns> {
        let items = self
            .misc("get", MISC_NO_UPDATE_LOG, &[key])
            .map_err(|e| refine(e, ErrorCode::NoRecord))?;
        let columns = columns_from_list(items);
        self.decoded(columns)
    }

    /// Create, optimize or remove a column index
    pub fn tbl_setindex(&mut self, column: &str, kind: IndexKind, keep: bool) -> Result<()> {
        check_nul("column name", column.as_bytes())?;
        let mut code = kind as u32;
        if keep {
            code |= INDEX_KEEP;
        }
        let code = code.to_string();
        self.misc("setindex", 0, &[column.as_bytes(), code.as_bytes()])
            .map(drop)
    }

    /// Generate a unique primary key
    pub fn tbl_genuid(&mut self) -> Result<i64> {
        let items = self.misc::<&[u8]>("genuid", 0, &[])?;
        let uid = items
            .first()
            .ok_or_else(|| TyrantError::MalformedResponse("genuid returned no value".to_string()))
            .and_then(|first| parse_decimal(first));
        self.decoded(uid)
    }

    // =========================================================================
    // Table Search
    // =========================================================================

    /// Primary keys of records matching the query
    pub fn search(&mut self, query: &Query) -> Result<Vec<Vec<u8>>> {
        self.search_with_hint(query).map(|(keys, _)| keys)
    }

    /// Primary keys plus the server's execution plan
    pub fn search_with_hint(&mut self, query: &Query) -> Result<(Vec<Vec<u8>>, String)> {
        let mut args = query.to_args()?;
        args.push(b"hint".to_vec());
        let items = self.misc("search", MISC_NO_UPDATE_LOG, &args)?;
        Ok(split_hint(items))
    }

    /// The server's execution plan for the query
    pub fn search_hint(&mut self, query: &Query) -> Result<String> {
        self.search_with_hint(query).map(|(_, hint)| hint)
    }

    /// Records matching the query
    ///
    /// An empty `columns` slice returns every column; otherwise only the
    /// listed ones.
    pub fn search_get(&mut self, query: &Query, columns: &[&str]) -> Result<Vec<Record>> {
        let mut args = query.to_args()?;
        let mut get = vec![&b"get"[..]];
        for column in columns {
            check_nul("column name", column.as_bytes())?;
            get.push(column.as_bytes());
        }
        args.push(join_fields(&get));

        let (items, _) = split_hint(self.misc("search", MISC_NO_UPDATE_LOG, &args)?);
        let records = items.iter().map(|item| Record::parse(item)).collect();
        self.decoded(records)
    }

    /// Remove every record matching the query
    pub fn search_out(&mut self, query: &Query) -> Result<()> {
        let mut args = query.to_args()?;
        args.push(b"out".to_vec());
        self.misc("search", 0, &args).map(drop)
    }

    /// Number of records matching the query
    pub fn search_count(&mut self, query: &Query) -> Result<u64> {
        let mut args = query.to_args()?;
        args.push(b"count".to_vec());
        let (items, _) = split_hint(self.misc("search", MISC_NO_UPDATE_LOG, &args)?);
        let count = items
            .first()
            .ok_or_else(|| {
                TyrantError::MalformedResponse("count search returned no value".to_string())
            })
            .and_then(|first| parse_decimal(first))
            .and_then(|count| {
                u64::try_from(count).map_err(|_| {
                    TyrantError::MalformedResponse(format!("negative count {}", count))
                })
            });
        self.decoded(count)
    }

    /// Combine several queries with a set operation, returning primary keys
    pub fn meta_search(&mut self, queries: &[&Query], kind: MetaSearch) -> Result<Vec<Vec<u8>>> {
        if queries.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = Vec::new();
        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                args.push(b"next".to_vec());
            }
            args.extend(query.to_args()?);
        }
        args.push(join_fields(&[b"mstype", (kind as u32).to_string().as_bytes()]));

        let (keys, _) = split_hint(self.misc("metasearch", MISC_NO_UPDATE_LOG, &args)?);
        Ok(keys)
    }

    /// A MISC payload that does not decode closes the session like a bad frame
    fn decoded<T>(&mut self, result: Result<T>) -> Result<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => self.fail(CommandKind::Misc, e),
        }
    }
}

fn parse_decimal(bytes: &[u8]) -> Result<i64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|text| text.trim().parse().ok())
        .ok_or_else(|| {
            TyrantError::MalformedResponse(format!(
                "expected a decimal number, got {:?}",
                String::from_utf8_lossy(bytes)
            ))
        })
}
