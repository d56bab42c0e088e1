//! Client Facade
//!
//! `Tyrant` wraps a [`Session`] behind a lock so it can be shared between
//! threads, and turns expected misses (`NoRecord`) into `Option`/`bool`
//! results.
//!
//! ## Concurrency
//! The protocol has one outstanding request per socket. Every call holds
//! the session lock for its whole exchange, so concurrent callers are
//! serialized; for real parallelism open one `Tyrant` per thread.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::network::Session;
use crate::protocol::{ErrorCode, REPL_CHECK_CONSISTENCY};
use crate::table::{Columns, IndexKind, MetaSearch, Query, Record};

/// A thread-safe client for one ttserver
pub struct Tyrant {
    session: Mutex<Session>,
}

impl Tyrant {
    /// Create a closed client
    pub fn new(config: Config) -> Self {
        Self {
            session: Mutex::new(Session::new(config)),
        }
    }

    /// Create a client and open its connection
    pub fn connect(config: Config) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(Session::connect(config)?),
        })
    }

    /// Open (or reopen after a lost connection)
    pub fn open(&self) -> Result<()> {
        self.session.lock().open()
    }

    pub fn close(&self) -> Result<()> {
        self.session.lock().close()
    }

    pub fn is_open(&self) -> bool {
        self.session.lock().is_open()
    }

    /// Run several operations under one lock acquisition
    ///
    /// Use this for sequences that must not interleave with other callers,
    /// such as a full ITERINIT/ITERNEXT walk.
    pub fn with_session<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
        f(&mut *self.session.lock())
    }

    /// Start a new table query
    pub fn query(&self) -> Query {
        Query::new()
    }

    // =========================================================================
    // Key-Value Operations
    // =========================================================================

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.session.lock().put(key, value)
    }

    /// Store only if absent; `Ok(false)` if the key already existed
    pub fn putkeep(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        match self.session.lock().putkeep(key, value) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == Some(ErrorCode::ExistingRecord) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn putcat(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.session.lock().putcat(key, value)
    }

    pub fn putshl(&self, key: &[u8], value: &[u8], width: i32) -> Result<()> {
        self.session.lock().putshl(key, value, width)
    }

    /// Fire-and-forget store
    pub fn putnr(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.session.lock().putnr(key, value)
    }

    /// Remove a record; `Ok(false)` if it did not exist
    pub fn out(&self, key: &[u8]) -> Result<bool> {
        found(self.session.lock().out(key)).map(|r| r.is_some())
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        found(self.session.lock().get(key))
    }

    /// Retrieve existing records among `keys`
    pub fn mget<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        self.session.lock().mget(keys)
    }

    pub fn vsiz(&self, key: &[u8]) -> Result<Option<u32>> {
        found(self.session.lock().vsiz(key))
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        self.vsiz(key).map(|size| size.is_some())
    }

    pub fn iterinit(&self) -> Result<()> {
        self.session.lock().iterinit()
    }

    /// Next key from the server cursor; `Ok(None)` when exhausted
    pub fn iternext(&self) -> Result<Option<Vec<u8>>> {
        found(self.session.lock().iternext())
    }

    /// Every key in the database, walked with a fresh cursor
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        self.with_session(|session| {
            session.iterinit()?;
            let mut keys = Vec::new();
            while let Some(key) = found(session.iternext())? {
                keys.push(key);
            }
            Ok(keys)
        })
    }

    pub fn fwmkeys(&self, prefix: &[u8], max: Option<usize>) -> Result<Vec<Vec<u8>>> {
        self.session.lock().fwmkeys(prefix, max)
    }

    pub fn addint(&self, key: &[u8], num: i32) -> Result<i32> {
        self.session.lock().addint(key, num)
    }

    pub fn adddouble(&self, key: &[u8], num: f64) -> Result<f64> {
        self.session.lock().adddouble(key, num)
    }

    pub fn ext(&self, name: &str, opts: u32, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        self.session.lock().ext(name, opts, key, value)
    }

    pub fn sync(&self) -> Result<()> {
        self.session.lock().sync()
    }

    pub fn optimize(&self, params: &str) -> Result<()> {
        self.session.lock().optimize(params)
    }

    pub fn vanish(&self) -> Result<()> {
        self.session.lock().vanish()
    }

    pub fn copy(&self, path: &str) -> Result<()> {
        self.session.lock().copy(path)
    }

    pub fn restore(&self, path: &str, ts: u64, check_consistency: bool) -> Result<()> {
        self.session.lock().restore(path, ts, repl_opts(check_consistency))
    }

    pub fn setmst(&self, host: &str, port: u16, ts: u64, check_consistency: bool) -> Result<()> {
        self.session
            .lock()
            .setmst(host, port, ts, repl_opts(check_consistency))
    }

    pub fn rnum(&self) -> Result<u64> {
        self.session.lock().rnum()
    }

    pub fn size(&self) -> Result<u64> {
        self.session.lock().size()
    }

    /// Server status as an ordered map
    pub fn stat(&self) -> Result<BTreeMap<String, String>> {
        let text = self.session.lock().stat()?;
        Ok(parse_stat(&text))
    }

    pub fn misc<A: AsRef<[u8]>>(&self, name: &str, opts: u32, args: &[A]) -> Result<Vec<Vec<u8>>> {
        self.session.lock().misc(name, opts, args)
    }

    // =========================================================================
    // Table Operations
    // =========================================================================

    pub fn tbl_put<I, C, V>(&self, key: &[u8], columns: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.session.lock().tbl_put(key, columns)
    }

    /// Store only if absent; `Ok(false)` if the key already existed
    pub fn tbl_putkeep<I, C, V>(&self, key: &[u8], columns: I) -> Result<bool>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        match self.session.lock().tbl_putkeep(key, columns) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == Some(ErrorCode::ExistingRecord) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn tbl_putcat<I, C, V>(&self, key: &[u8], columns: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, V)>,
        C: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        self.session.lock().tbl_putcat(key, columns)
    }

    pub fn tbl_out(&self, key: &[u8]) -> Result<bool> {
        found(self.session.lock().tbl_out(key)).map(|r| r.is_some())
    }

    pub fn tbl_get(&self, key: &[u8]) -> Result<Option<Columns>> {
        found(self.session.lock().tbl_get(key))
    }

    pub fn tbl_setindex(&self, column: &str, kind: IndexKind, keep: bool) -> Result<()> {
        self.session.lock().tbl_setindex(column, kind, keep)
    }

    pub fn tbl_genuid(&self) -> Result<i64> {
        self.session.lock().tbl_genuid()
    }

    pub fn search(&self, query: &Query) -> Result<Vec<Vec<u8>>> {
        self.session.lock().search(query)
    }

    pub fn search_get(&self, query: &Query, columns: &[&str]) -> Result<Vec<Record>> {
        self.session.lock().search_get(query, columns)
    }

    pub fn search_out(&self, query: &Query) -> Result<()> {
        self.session.lock().search_out(query)
    }

    pub fn search_count(&self, query: &Query) -> Result<u64> {
        self.session.lock().search_count(query)
    }

    pub fn hint(&self, query: &Query) -> Result<String> {
        self.session.lock().search_hint(query)
    }

    pub fn meta_search(&self, queries: &[&Query], kind: MetaSearch) -> Result<Vec<Vec<u8>>> {
        self.session.lock().meta_search(queries, kind)
    }
}

impl std::fmt::Debug for Tyrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tyrant").field("session", &*self.session.lock()).finish()
    }
}

/// Turn the `NoRecord` outcome into `None`
fn found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_no_record() => Ok(None),
        Err(e) => Err(e),
    }
}

fn repl_opts(check_consistency: bool) -> u32 {
    if check_consistency {
        REPL_CHECK_CONSISTENCY
    } else {
        0
    }
}

/// Parse `key\tvalue` lines; lines without a tab are skipped
pub fn parse_stat(text: &[u8]) -> BTreeMap<String, String> {
    String::from_utf8_lossy(text)
        .lines()
        .filter_map(|line| line.split_once('\t'))
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

impl From<Session> for Tyrant {
    fn from(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }
}
