//! Error types for the tdgram client
//!
//! Transport faults, correlation failures and lifecycle conditions are unified
//! in [`TdgramError`]. Backend `error` responses are deliberately absent: they
//! are a normal outcome recorded in a result slot's status.

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures reported by a [`crate::Transport`] implementation
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is not available: {reason}")]
    Unavailable { reason: String },
    #[error("Transport is closed")]
    Closed,
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Receive failed: {reason}")]
    ReceiveFailed { reason: String },
    #[error("Malformed backend payload: {reason}")]
    Malformed { reason: String },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Main error type for the tdgram client
#[derive(Debug, thiserror::Error)]
pub enum TdgramError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Failed to send query {query_id}: {source}")]
    SendFailed {
        query_id: String,
        #[source]
        source: TransportError,
    },

    #[error("Query id {query_id} is already in flight")]
    DuplicateQueryId { query_id: String },

    #[error("Update queue saturated: {capacity} updates still queued after {timeout_ms}ms")]
    QueueSaturated { capacity: usize, timeout_ms: u64 },

    #[error("Update queue consumer is gone")]
    UpdateQueueClosed,

    #[error("Timed out after {timeout_ms}ms waiting for query {query_id}")]
    WaitTimeout { query_id: String, timeout_ms: u64 },

    #[error("Client is shut down")]
    Shutdown,

    #[error("Listener stopped: {reason}")]
    ListenerFailed { reason: String },

    #[error("Authentication gave up after {attempts} consecutive failed steps")]
    AuthRetriesExhausted { attempts: u32 },

    #[error("Prompt for {state} failed: {reason}")]
    Prompt { state: String, reason: String },

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for tdgram operations
pub type TdgramResult<T> = Result<T, TdgramError>;
