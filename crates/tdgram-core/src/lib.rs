//! tdgram Core
//!
//! Foundational types for driving an asynchronous JSON messaging backend through
//! a request/response protocol layered over a single event stream:
//! - [`Query`] / [`Update`]: the JSON objects exchanged with the backend
//! - [`QueryId`]: correlation identifier linking a query to its response
//! - [`ResultSlot`]: single-resolution future for one query's outcome
//! - [`PendingTable`]: concurrent map of in-flight result slots
//! - [`Transport`]: the contract a backend handle must satisfy
//! - [`AuthState`]: the backend's authentication handshake steps
//!
//! The runtime that ties these together lives in `tdgram-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod auth_state;
pub mod config;
pub mod errors;
pub mod pending;
pub mod slot;
pub mod transport;
pub mod types;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use auth_state::AuthState;
pub use config::{AuthConfig, ClientParams, LogRotation, LoggingConfig, SessionPaths, Settings};
pub use errors::{TdgramError, TdgramResult, TransportError};
pub use pending::PendingTable;
pub use slot::{ResultSlot, SlotStatus};
pub use transport::Transport;
pub use types::{Query, QueryId, Update};

#[cfg(any(test, feature = "testing"))]
pub use testing::MemoryTransport;
