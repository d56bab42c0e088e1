//! Network Module
//!
//! Client-side connection handling.
//!
//! ## Model
//! - One blocking TCP socket per session
//! - One outstanding request per socket (no pipelining)
//! - Transport failures close the session; reopening is explicit

mod session;

pub use session::Session;
