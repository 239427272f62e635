//! tdgram Runtime
//!
//! The orchestration layer over a [`tdgram_core::Transport`]:
//! - `ListenerTask`: the single task that reads the backend event stream,
//!   resolves pending queries and feeds the bounded update queue
//! - `QueryDispatcher`: correlation id assignment and query submission
//! - `AuthFlow`: the authentication handshake state machine
//! - `UpdatePipeline`: ordered, failure-isolated update handlers
//! - `ClientBuilder` / `Client`: wiring and lifecycle

pub mod auth;
pub mod builder;
pub mod client;
pub mod dispatcher;
pub mod listener;
pub mod prompt;
pub mod shutdown;
pub mod updates;

pub use auth::{AuthFlow, AuthPrompts};
pub use builder::ClientBuilder;
pub use client::Client;
pub use dispatcher::{QueryDispatcher, SubmitOptions};
pub use listener::{correlation_id, ListenerTask};
pub use prompt::Prompt;
pub use shutdown::{ShutdownSignal, StopReason};
pub use updates::{HandlerEntry, UpdateHandler, UpdatePipeline};

// Re-export core types for convenience
pub use tdgram_core::{
    AuthConfig, AuthState, ClientParams, LoggingConfig, Query, QueryId, ResultSlot,
    SessionPaths, Settings, SlotStatus, TdgramError, TdgramResult, Transport, TransportError,
    Update,
};
