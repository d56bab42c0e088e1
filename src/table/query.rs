//! Table Query Builder
//!
//! Accumulates conditions, ordering and limits, and encodes them as the
//! argument list of the MISC `search` family of functions:
//!
//! ```text
//! addcond\0<column>\0<op>\0<operand>
//! setorder\0<column>\0<type>
//! setlimit\0<max>\0<skip>
//! ```
//!
//! Building never touches the network; a query can be executed any number
//! of times.

use crate::error::{Result, TyrantError};
use crate::network::Session;
use super::record::Record;

/// Condition flag: negate the operator
pub const COND_NEGATE: u32 = 1 << 24;

/// Condition flag: do not use a column index
pub const COND_NO_INDEX: u32 = 1 << 25;

/// Marker the server puts in front of the query plan element
pub const HINT_MARKER: &[u8] = b"\0\0[[HINT]]\n";

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum QueryOp {
    /// String is equal to
    StrEq = 0,
    /// String contains
    StrInclude = 1,
    /// String begins with
    StrBeginsWith = 2,
    /// String ends with
    StrEndsWith = 3,
    /// String contains all space/comma separated tokens
    StrAllTokens = 4,
    /// String contains at least one token
    StrAnyToken = 5,
    /// String is equal to at least one token
    StrOneOf = 6,
    /// String matches a regular expression
    StrRegex = 7,
    NumEq = 8,
    NumGt = 9,
    NumGe = 10,
    NumLt = 11,
    NumLe = 12,
    /// Number is between two tokens (inclusive)
    NumBetween = 13,
    /// Number is equal to at least one token
    NumOneOf = 14,
    /// Full-text phrase search
    FtsPhrase = 15,
    /// Full-text: all tokens
    FtsAll = 16,
    /// Full-text: at least one token
    FtsAny = 17,
    /// Full-text compound expression
    FtsExpr = 18,
}

/// Result ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Order {
    StrAsc = 0,
    StrDesc = 1,
    NumAsc = 2,
    NumDesc = 3,
}

/// Set operation combining the results of several queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MetaSearch {
    Union = 0,
    Intersection = 1,
    Difference = 2,
}

/// One search condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub column: String,
    pub op: QueryOp,
    pub operand: Vec<u8>,
    pub negate: bool,
    pub no_index: bool,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: QueryOp, operand: impl Into<Vec<u8>>) -> Self {
        Self {
            column: column.into(),
            op,
            operand: operand.into(),
            negate: false,
            no_index: false,
        }
    }

    /// Match records that do NOT satisfy the operator
    pub fn negate(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Evaluate without the column index
    pub fn no_index(mut self) -> Self {
        self.no_index = true;
        self
    }

    /// Operator code with flags, as sent on the wire
    pub fn op_code(&self) -> u32 {
        let mut code = self.op as u32;
        if self.negate {
            code |= COND_NEGATE;
        }
        if self.no_index {
            code |= COND_NO_INDEX;
        }
        code
    }

    fn encode(&self) -> Result<Vec<u8>> {
        check_nul("column name", self.column.as_bytes())?;
        check_nul("operand", &self.operand)?;
        Ok(join_fields(&[
            b"addcond",
            self.column.as_bytes(),
            self.op_code().to_string().as_bytes(),
            &self.operand,
        ]))
    }
}

/// A table query under construction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    conditions: Vec<Condition>,
    order: Option<(String, Order)>,
    limit: Option<(Option<usize>, usize)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a condition
    pub fn add_condition(
        &mut self,
        column: impl Into<String>,
        op: QueryOp,
        operand: impl Into<Vec<u8>>,
        negate: bool,
    ) -> &mut Self {
        let mut condition = Condition::new(column, op, operand);
        condition.negate = negate;
        self.add(condition)
    }

    /// Append a fully specified condition
    pub fn add(&mut self, condition: Condition) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Set the result order, replacing any previous one
    pub fn set_order(&mut self, column: impl Into<String>, order: Order) -> &mut Self {
        self.order = Some((column.into(), order));
        self
    }

    /// Return at most `max` results (`None` = no limit) after skipping `skip`
    pub fn set_limit(&mut self, max: Option<usize>, skip: usize) -> &mut Self {
        self.limit = Some((max, skip));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> Option<(&str, Order)> {
        self.order.as_ref().map(|(column, order)| (column.as_str(), *order))
    }

    pub fn limit(&self) -> Option<(Option<usize>, usize)> {
        self.limit
    }

    /// Encode the query as MISC arguments
    pub fn to_args(&self) -> Result<Vec<Vec<u8>>> {
        let mut args = Vec::with_capacity(self.conditions.len() + 2);

        for condition in &self.conditions {
            args.push(condition.encode()?);
        }

        if let Some((column, order)) = &self.order {
            check_nul("column name", column.as_bytes())?;
            args.push(join_fields(&[
                b"setorder",
                column.as_bytes(),
                (*order as u32).to_string().as_bytes(),
            ]));
        }

        if let Some((max, skip)) = self.limit {
            let max = match max {
                Some(n) => limit_field("max", n)?,
                None => -1,
            };
            let skip = limit_field("skip", skip)?;
            args.push(join_fields(&[
                b"setlimit",
                max.to_string().as_bytes(),
                skip.to_string().as_bytes(),
            ]));
        }

        Ok(args)
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Primary keys of matching records
    pub fn search(&self, session: &mut Session) -> Result<Vec<Vec<u8>>> {
        session.search(self)
    }

    /// Matching records with all (or the listed) columns
    pub fn search_get(&self, session: &mut Session, columns: &[&str]) -> Result<Vec<Record>> {
        session.search_get(self, columns)
    }

    /// Remove every matching record
    pub fn search_out(&self, session: &mut Session) -> Result<()> {
        session.search_out(self)
    }

    /// Number of matching records
    pub fn search_count(&self, session: &mut Session) -> Result<u64> {
        session.search_count(self)
    }

    /// The server's execution plan for this query
    pub fn hint(&self, session: &mut Session) -> Result<String> {
        session.search_hint(self)
    }
}

pub(crate) fn check_nul(what: &str, bytes: &[u8]) -> Result<()> {
    if bytes.contains(&0) {
        return Err(TyrantError::InvalidArgument(format!("{} contains a NUL byte", what)));
    }
    Ok(())
}

/// The server parses limit fields as a C int
fn limit_field(field: &'static str, n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| TyrantError::ArgumentTooLarge {
        field,
        len: n,
        max: i32::MAX as usize,
    })
}

pub(crate) fn join_fields(fields: &[&[u8]]) -> Vec<u8> {
    fields.join(&0u8)
}

/// Split off the trailing query-plan element, if the server sent one
pub(crate) fn split_hint(mut items: Vec<Vec<u8>>) -> (Vec<Vec<u8>>, String) {
    let has_hint = items
        .last()
        .is_some_and(|last| last.starts_with(HINT_MARKER));
    if !has_hint {
        return (items, String::new());
    }

    let hint = items
        .pop()
        .map(|last| String::from_utf8_lossy(&last[HINT_MARKER.len()..]).into_owned())
        .unwrap_or_default();
    (items, hint)
}
