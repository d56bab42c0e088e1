//! # TyrantKV
//!
//! A client for the Tokyo Tyrant remote database protocol:
//! - Binary wire codec driven by a static per-command schema table
//! - Strictly sequential request/response sessions with explicit state
//! - Table database records and a query builder (conditions, order, limit)
//! - A thread-safe facade returning `Option` for missing records
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Client Facade (Tyrant)                    │
//! │              (Mutex<Session>, Option for misses)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │    Table    │─────────▶│   Session   │
//!   │   (Query)   │   MISC   │ (TCP, state)│
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │  Protocol   │
//!                           │   (Codec)   │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tyrantkv::{Config, Tyrant};
//!
//! let client = Tyrant::connect(Config::builder().host_port("localhost", 1978).build())?;
//! client.put(b"greeting", b"hello")?;
//! assert_eq!(client.get(b"greeting")?, Some(b"hello".to_vec()));
//! # Ok::<(), tyrantkv::TyrantError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod network;
pub mod table;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, TyrantError};
pub use config::{Config, ConfigBuilder};
pub use network::Session;
pub use protocol::ErrorCode;
pub use table::{Columns, Condition, IndexKind, MetaSearch, Order, Query, QueryOp, Record};
pub use client::Tyrant;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TyrantKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
