//! Table records
//!
//! A table record is a primary key plus a map of named columns. Column
//! maps travel as flat `[name, value, name, value, ...]` MISC arguments,
//! and search results come back as one `\0`-joined element per record with
//! the primary key under the empty column name.

use std::collections::BTreeMap;

use crate::error::{Result, TyrantError};
use super::query::check_nul;

/// Column name → value
pub type Columns = BTreeMap<Vec<u8>, Vec<u8>>;

/// A record returned by a table search
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub columns: Columns,
}

impl Record {
    /// Value of a column
    pub fn get(&self, column: &str) -> Option<&[u8]> {
        self.columns.get(column.as_bytes()).map(Vec::as_slice)
    }

    /// Parse one `\0`-joined search result element
    pub fn parse(element: &[u8]) -> Result<Self> {
        let mut record = Record::default();
        let mut fields = element.split(|b| *b == 0);

        while let Some(name) = fields.next() {
            let value = fields.next().ok_or_else(|| {
                TyrantError::MalformedResponse("record has a column without a value".to_string())
            })?;
            if name.is_empty() {
                record.key = value.to_vec();
            } else {
                record.columns.insert(name.to_vec(), value.to_vec());
            }
        }

        Ok(record)
    }
}

/// Flatten a primary key and columns into MISC arguments
pub(crate) fn columns_to_args<I, C, V>(key: &[u8], columns: I) -> Result<Vec<Vec<u8>>>
where
    I: IntoIterator<Item = (C, V)>,
    C: AsRef<[u8]>,
    V: AsRef<[u8]>,
{
    let mut args = vec![key.to_vec()];
    for (name, value) in columns {
        let name = name.as_ref();
        if name.is_empty() {
            return Err(TyrantError::InvalidArgument("empty column name".to_string()));
        }
        check_nul("column name", name)?;
        args.push(name.to_vec());
        args.push(value.as_ref().to_vec());
    }
    Ok(args)
}

/// Rebuild a column map from a flat `[name, value, ...]` list
pub(crate) fn columns_from_list(items: Vec<Vec<u8>>) -> Result<Columns> {
    if items.len() % 2 != 0 {
        return Err(TyrantError::MalformedResponse(format!(
            "column list has odd length {}",
            items.len()
        )));
    }

    let mut columns = Columns::new();
    let mut items = items.into_iter();
    while let (Some(name), Some(value)) = (items.next(), items.next()) {
        columns.insert(name, value);
    }
    Ok(columns)
}
