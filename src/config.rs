//! Configuration for tyrantkv
//!
//! Connection parameters with sensible defaults.

use std::time::Duration;

use crate::error::{Result, TyrantError};
use crate::protocol::MAX_FIELD_SIZE;

/// Default ttserver port
pub const DEFAULT_PORT: u16 = 1978;

/// Connection configuration for a single session
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// Server address (host:port)
    pub addr: String,

    /// Connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Socket read deadline (milliseconds, 0 = block forever)
    ///
    /// Exceeding it leaves the socket mid-frame, so the session is closed.
    pub read_timeout_ms: u64,

    /// Socket write deadline (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm
    pub tcp_nodelay: bool,

    // -------------------------------------------------------------------------
    // Protocol Configuration
    // -------------------------------------------------------------------------
    /// Largest key/value/argument accepted on send and declared length
    /// accepted on receive (in bytes)
    pub max_field_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", DEFAULT_PORT),
            connect_timeout_ms: 5000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            tcp_nodelay: true,
            max_field_len: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check the config for values the session cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() {
            return Err(TyrantError::Config("server address is empty".to_string()));
        }
        if self.max_field_len == 0 || self.max_field_len > MAX_FIELD_SIZE {
            return Err(TyrantError::Config(format!(
                "max_field_len must be in 1..={} (got {})",
                MAX_FIELD_SIZE, self.max_field_len
            )));
        }
        Ok(())
    }

    pub(crate) fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }

    pub(crate) fn read_timeout(&self) -> Option<Duration> {
        millis(self.read_timeout_ms)
    }

    pub(crate) fn write_timeout(&self) -> Option<Duration> {
        millis(self.write_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address (host:port)
    pub fn addr(mut self, addr: impl Into<String>) -> Self {
        self.config.addr = addr.into();
        self
    }

    /// Set the server address from separate host and port
    pub fn host_port(mut self, host: &str, port: u16) -> Self {
        self.config.addr = format!("{}:{}", host, port);
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set both read and write timeouts (in milliseconds)
    pub fn timeout_ms(self, ms: u64) -> Self {
        self.read_timeout_ms(ms).write_timeout_ms(ms)
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.config.tcp_nodelay = enabled;
        self
    }

    /// Set the maximum field length (in bytes)
    pub fn max_field_len(mut self, len: usize) -> Self {
        self.config.max_field_len = len;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
