//! Connection Session
//!
//! Owns one TCP connection to a ttserver and drives the strictly sequential
//! request/response cycle.
//!
//! ## State Machine
//! ```text
//!   Closed ──open()──▶ Open ──close() / transport or framing error──▶ Closed
//! ```
//!
//! Every operation on a closed session fails with `NotConnected` without
//! touching the network. A transport failure (including a read or write
//! deadline) or a malformed frame closes the session; it is never reopened
//! behind the caller's back, since replaying a non-idempotent write such as
//! ADDINT could apply it twice.

use std::collections::HashMap;
use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use crate::config::Config;
use crate::error::{Result, TyrantError};
use crate::protocol::{
    join_double, read_response, write_command, CommandKind, ErrorCode, Reply, ReplyShape,
    Request, Response,
};

/// An open transport: buffered halves of one socket
struct Transport {
    /// TCP stream reader (buffered for efficiency)
    reader: BufReader<TcpStream>,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Peer address for logging
    peer_addr: String,
}

impl Transport {
    fn connect(config: &Config) -> Result<Self> {
        let addrs: Vec<SocketAddr> = config
            .addr
            .to_socket_addrs()
            .map_err(|source| TyrantError::ConnectionLost {
                code: ErrorCode::HostNotFound,
                source,
            })?
            .collect();

        if addrs.is_empty() {
            return Err(TyrantError::ConnectionLost {
                code: ErrorCode::HostNotFound,
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no addresses for {}", config.addr),
                ),
            });
        }

        let mut last_err = None;
        for addr in addrs {
            let attempt = match config.connect_timeout() {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Self::from_stream(stream, config),
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(TyrantError::ConnectionLost {
            code: ErrorCode::ConnectionRefused,
            source: last_err
                .unwrap_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused)),
        })
    }

    /// Set up buffered I/O and configure timeouts
    fn from_stream(stream: TcpStream, config: &Config) -> Result<Self> {
        let refused = |source| TyrantError::ConnectionLost {
            code: ErrorCode::ConnectionRefused,
            source,
        };

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| config.addr.clone());

        stream.set_nodelay(config.tcp_nodelay).map_err(refused)?;
        stream.set_read_timeout(config.read_timeout()).map_err(refused)?;
        stream.set_write_timeout(config.write_timeout()).map_err(refused)?;

        let read_stream = stream.try_clone().map_err(refused)?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
            peer_addr,
        })
    }

    /// Send one request and read its complete response
    fn exchange(&mut self, request: &Request<'_>, max_len: usize) -> Result<Response> {
        write_command(&mut self.writer, request, max_len)?;

        if request.kind.schema().reply == ReplyShape::Nothing {
            return Ok(Response::ok(Reply::Done));
        }

        read_response(&mut self.reader, request.kind, max_len)
    }

    fn shutdown(mut self) {
        let _ = self.writer.flush();
        let _ = self.writer.get_ref().shutdown(Shutdown::Both);
    }
}

enum State {
    Closed,
    Open(Transport),
}

/// A connection session to one ttserver
///
/// Operations take `&mut self`: at most one request is ever in flight on a
/// session. Share a session between threads behind a lock, or give each
/// thread its own.
pub struct Session {
    config: Config,
    state: State,

    /// Set by a successful ITERINIT on the current connection
    iter_started: bool,
}

impl Session {
    /// Create a closed session for the given config
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: State::Closed,
            iter_started: false,
        }
    }

    /// Create a session and open it
    pub fn connect(config: Config) -> Result<Self> {
        let mut session = Self::new(config);
        session.open()?;
        Ok(session)
    }

    /// Open the connection (Closed → Open)
    ///
    /// Opening an already open session is a no-op.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        self.config.validate()?;

        let transport = Transport::connect(&self.config)?;
        tracing::debug!("Session opened to {}", transport.peer_addr);

        self.state = State::Open(transport);
        self.iter_started = false;
        Ok(())
    }

    /// Close the connection (Open → Closed)
    pub fn close(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, State::Closed) {
            State::Open(transport) => {
                tracing::debug!("Session to {} closed", transport.peer_addr);
                transport.shutdown();
                self.iter_started = false;
                Ok(())
            }
            State::Closed => Err(TyrantError::NotConnected),
        }
    }

    /// Check whether the session is open
    pub fn is_open(&self) -> bool {
        matches!(self.state, State::Open(_))
    }

    /// Get the peer address, if open
    pub fn peer_addr(&self) -> Option<&str> {
        match &self.state {
            State::Open(transport) => Some(&transport.peer_addr),
            State::Closed => None,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one request/response exchange
    ///
    /// Arguments are checked against the schema and the configured field
    /// limit before anything is written. A nonzero status is returned as the
    /// matching error; transport and framing failures close the session.
    pub fn execute(&mut self, request: &Request<'_>) -> Result<Reply> {
        let max_len = self.config.max_field_len;
        let transport = match &mut self.state {
            State::Open(transport) => transport,
            State::Closed => return Err(TyrantError::NotConnected),
        };

        tracing::trace!("Sending {} to {}", request.kind, transport.peer_addr);

        let result = transport
            .exchange(request, max_len)
            .and_then(|response| response.into_result(request.kind));
        result.or_else(|e| self.fail(request.kind, e))
    }

    /// Return `err`, closing the session first if it is fatal
    ///
    /// Used for framing failures and for payloads that decode into nonsense
    /// after a complete frame was read.
    pub(crate) fn fail<T>(&mut self, command: CommandKind, err: TyrantError) -> Result<T> {
        if err.is_fatal() {
            if let State::Open(transport) = std::mem::replace(&mut self.state, State::Closed) {
                tracing::warn!(
                    "Closing session to {} after {} failed: {}",
                    transport.peer_addr,
                    command,
                    err
                );
                transport.shutdown();
            }
            self.iter_started = false;
        }
        Err(err)
    }

    // =========================================================================
    // Key-Value Operations
    // =========================================================================

    /// Store a record, overwriting any existing value
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.execute_done(&Request::put(key, value))
    }

    /// Store a record only if the key is absent (`ExistingRecord` otherwise)
    pub fn putkeep(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.execute_done(&Request::putkeep(key, value))
    }

    /// Append to the end of a record, creating it if absent
    pub fn putcat(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.execute_done(&Request::putcat(key, value))
    }

    /// Append to a record and keep only its last `width` bytes
    pub fn putshl(&mut self, key: &[u8], value: &[u8], width: i32) -> Result<()> {
        self.execute_done(&Request::putshl(key, value, width))
    }

    /// Store a record without waiting for the server's reply
    pub fn putnr(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.execute_done(&Request::putnr(key, value))
    }

    /// Remove a record (`NoRecord` if absent)
    pub fn out(&mut self, key: &[u8]) -> Result<()> {
        self.execute_done(&Request::out(key))
    }

    /// Retrieve a record (`NoRecord` if absent)
    pub fn get(&mut self, key: &[u8]) -> Result<Vec<u8>> {
        let request = Request::get(key);
        match self.execute(&request)? {
            Reply::Blob(value) => Ok(value),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Retrieve several records at once
    ///
    /// Only keys that exist appear in the result; missing keys are not an
    /// error.
    pub fn mget<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        let request = Request::mget(keys.iter().map(AsRef::as_ref).collect());
        match self.execute(&request)? {
            Reply::Pairs(pairs) => Ok(pairs.into_iter().collect()),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Size of a record's value in bytes (`NoRecord` if absent)
    pub fn vsiz(&mut self, key: &[u8]) -> Result<u32> {
        let request = Request::vsiz(key);
        match self.execute(&request)? {
            Reply::U32(size) => Ok(size),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Reset the server-side iteration cursor
    pub fn iterinit(&mut self) -> Result<()> {
        self.iter_started = false;
        self.execute_done(&Request::iterinit())?;
        self.iter_started = true;
        Ok(())
    }

    /// Next key from the server-side cursor (`NoRecord` when exhausted)
    pub fn iternext(&mut self) -> Result<Vec<u8>> {
        if !self.is_open() {
            return Err(TyrantError::NotConnected);
        }
        if !self.iter_started {
            return Err(TyrantError::OutOfSequence("iternext called before iterinit"));
        }
        let request = Request::iternext();
        match self.execute(&request)? {
            Reply::Blob(key) => Ok(key),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Keys starting with `prefix`, at most `max` of them (`None` = no limit)
    pub fn fwmkeys(&mut self, prefix: &[u8], max: Option<usize>) -> Result<Vec<Vec<u8>>> {
        let max = match max {
            Some(n) => i32::try_from(n).map_err(|_| TyrantError::ArgumentTooLarge {
                field: "max",
                len: n,
                max: i32::MAX as usize,
            })?,
            None => -1,
        };
        let request = Request::fwmkeys(prefix, max);
        self.execute_list(&request)
    }

    /// Atomically add to an integer record, returning the new total
    ///
    /// Fails with `IncompatibleType` if the stored value is not a 4-byte
    /// integer.
    pub fn addint(&mut self, key: &[u8], num: i32) -> Result<i32> {
        let request = Request::addint(key, num);
        match self.execute(&request)? {
            Reply::I32(total) => Ok(total),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Atomically add to a double record, returning the new total
    pub fn adddouble(&mut self, key: &[u8], num: f64) -> Result<f64> {
        if !num.is_finite() {
            return Err(TyrantError::InvalidArgument(format!(
                "adddouble needs a finite number, got {}",
                num
            )));
        }
        let request = Request::adddouble(key, num);
        match self.execute(&request)? {
            Reply::Double { integ, fract } => Ok(join_double(integ, fract)),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Call a function of the server's scripting extension
    pub fn ext(&mut self, name: &str, opts: u32, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let request = Request::ext(name.as_bytes(), opts, key, value);
        match self.execute(&request)? {
            Reply::Blob(result) => Ok(result),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Flush the database to the disk device
    pub fn sync(&mut self) -> Result<()> {
        self.execute_done(&Request::sync())
    }

    /// Optimize the database with backend-specific tuning parameters
    pub fn optimize(&mut self, params: &str) -> Result<()> {
        self.execute_done(&Request::optimize(params.as_bytes()))
    }

    /// Remove all records
    pub fn vanish(&mut self) -> Result<()> {
        self.execute_done(&Request::vanish())
    }

    /// Copy the database file on the server side
    pub fn copy(&mut self, path: &str) -> Result<()> {
        self.execute_done(&Request::copy(path.as_bytes()))
    }

    /// Restore the database from update logs newer than `ts` (microseconds)
    pub fn restore(&mut self, path: &str, ts: u64, opts: u32) -> Result<()> {
        self.execute_done(&Request::restore(path.as_bytes(), ts, opts))
    }

    /// Set the replication master of the server
    pub fn setmst(&mut self, host: &str, port: u16, ts: u64, opts: u32) -> Result<()> {
        self.execute_done(&Request::setmst(host.as_bytes(), u32::from(port), ts, opts))
    }

    /// Number of records
    pub fn rnum(&mut self) -> Result<u64> {
        self.execute_u64(&Request::rnum())
    }

    /// Database size in bytes
    pub fn size(&mut self) -> Result<u64> {
        self.execute_u64(&Request::size())
    }

    /// Raw server status text (`key\tvalue` lines)
    pub fn stat(&mut self) -> Result<Vec<u8>> {
        let request = Request::stat();
        match self.execute(&request)? {
            Reply::Blob(text) => Ok(text),
            other => self.unexpected(request.kind, other),
        }
    }

    /// Call a miscellaneous function (table operations, search, ...)
    pub fn misc<A: AsRef<[u8]>>(&mut self, name: &str, opts: u32, args: &[A]) -> Result<Vec<Vec<u8>>> {
        let request = Request::misc(name.as_bytes(), opts, args.iter().map(AsRef::as_ref).collect());
        self.execute_list(&request)
    }

    // =========================================================================
    // Reply Helpers
    // =========================================================================

    fn execute_done(&mut self, request: &Request<'_>) -> Result<()> {
        match self.execute(request)? {
            Reply::Done => Ok(()),
            other => self.unexpected(request.kind, other),
        }
    }

    fn execute_list(&mut self, request: &Request<'_>) -> Result<Vec<Vec<u8>>> {
        match self.execute(request)? {
            Reply::List(items) => Ok(items),
            other => self.unexpected(request.kind, other),
        }
    }

    fn execute_u64(&mut self, request: &Request<'_>) -> Result<u64> {
        match self.execute(request)? {
            Reply::U64(n) => Ok(n),
            other => self.unexpected(request.kind, other),
        }
    }

    fn unexpected<T>(&mut self, command: CommandKind, reply: Reply) -> Result<T> {
        let err = TyrantError::MalformedResponse(format!(
            "{} returned {:?} payload",
            command,
            reply.shape()
        ));
        self.fail(command, err)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let State::Open(transport) = std::mem::replace(&mut self.state, State::Closed) {
            transport.shutdown();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("addr", &self.config.addr)
            .field("open", &self.is_open())
            .field("iter_started", &self.iter_started)
            .finish()
    }
}
