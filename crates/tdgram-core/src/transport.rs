//! Transport Handle Contract
//!
//! Thin wrapper around the native backend: send a query, poll for the next
//! update, stop. No correlation logic lives behind this trait; the runtime's
//! listener task owns it.
//!
//! Concrete implementations are provided elsewhere:
//! - `TdJsonTransport` in the `tdgram-tdjson` crate
//! - [`crate::testing::MemoryTransport`] behind the `testing` feature

use std::time::Duration;

use crate::errors::TransportError;
use crate::types::{Query, Update};

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Hand a query to the backend
    async fn send(&self, query: &Query) -> Result<(), TransportError>;

    /// Next update from the backend, or `None` once `timeout` elapses
    ///
    /// Must never block past `timeout`, so the caller can observe shutdown.
    async fn receive(&self, timeout: Duration) -> Result<Option<Update>, TransportError>;

    /// Release backend resources; calling more than once is a no-op
    async fn stop(&self);

    /// Short name used in log output
    fn name(&self) -> &'static str {
        "transport"
    }
}
