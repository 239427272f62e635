//! Query Dispatcher
//!
//! Stamps a correlation id on each outgoing query, registers its result slot
//! and hands the query to the transport.

use std::sync::Arc;

use tdgram_core::{
    PendingTable, Query, QueryId, ResultSlot, TdgramError, TdgramResult, Transport,
};
use tracing::{debug, warn};

use crate::shutdown::ShutdownSignal;

/// How a query is submitted
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Await the result before returning
    pub block: bool,
    /// Caller-chosen correlation id; generated when absent
    pub query_id: Option<QueryId>,
}

impl SubmitOptions {
    pub fn blocking() -> Self {
        Self {
            block: true,
            query_id: None,
        }
    }

    pub fn detached() -> Self {
        Self::default()
    }

    pub fn with_query_id(mut self, query_id: impl Into<QueryId>) -> Self {
        self.query_id = Some(query_id.into());
        self
    }
}

#[derive(Clone)]
pub struct QueryDispatcher {
    client_name: Arc<str>,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    shutdown: ShutdownSignal,
}

impl QueryDispatcher {
    pub fn new(
        client_name: impl Into<Arc<str>>,
        transport: Arc<dyn Transport>,
        pending: Arc<PendingTable>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            transport,
            pending,
            shutdown,
        }
    }

    /// Send a query and return its result slot
    ///
    /// With `block` the slot is returned resolved (OK, ERROR, or CANCELLED if
    /// the client stopped meanwhile); otherwise it is returned PENDING.
    pub async fn submit(&self, mut query: Query, options: SubmitOptions) -> TdgramResult<ResultSlot> {
        if self.shutdown.is_triggered() {
            return Err(TdgramError::Shutdown);
        }

        let query_id = options.query_id.unwrap_or_else(QueryId::generate);
        query.set_query_id(&query_id);

        let slot = ResultSlot::new(query_id.clone(), query.clone());
        self.pending.register(slot.clone())?;

        // Shutdown may have swept the table between the check and the insert
        if self.shutdown.is_triggered() {
            self.pending.abandon(&query_id);
            return Err(TdgramError::Shutdown);
        }

        if let Err(source) = self.transport.send(&query).await {
            self.pending.abandon(&query_id);
            warn!(
                client = %self.client_name,
                %query_id,
                query_type = query.type_name(),
                error = %source,
                "send failed"
            );
            return Err(TdgramError::SendFailed {
                query_id: query_id.to_string(),
                source,
            });
        }
        debug!(client = %self.client_name, %query_id, query_type = query.type_name(), "query sent");

        if options.block {
            slot.wait(None).await
        } else {
            Ok(slot)
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::StopReason;
    use tdgram_core::{MemoryTransport, SlotStatus};

    fn dispatcher(transport: Arc<MemoryTransport>) -> (QueryDispatcher, ShutdownSignal) {
        let shutdown = ShutdownSignal::new();
        let dispatcher = QueryDispatcher::new(
            "test",
            transport,
            Arc::new(PendingTable::new()),
            shutdown.clone(),
        );
        (dispatcher, shutdown)
    }

    #[tokio::test]
    async fn test_detached_submit_registers_pending_slot() {
        let transport = Arc::new(MemoryTransport::new());
        let (dispatcher, _) = dispatcher(transport.clone());

        let slot = dispatcher
            .submit(Query::new("getMe"), SubmitOptions::detached())
            .await
            .unwrap();

        assert_eq!(slot.status(), SlotStatus::Pending);
        assert_eq!(dispatcher.pending_count(), 1);

        let sent = transport.sent_queries();
        assert_eq!(sent[0].query_id(), Some(slot.query_id().clone()));
    }

    #[tokio::test]
    async fn test_explicit_id_collision_is_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        let (dispatcher, _) = dispatcher(transport.clone());
        let options = SubmitOptions::detached().with_query_id("fixed");

        dispatcher.submit(Query::new("getMe"), options.clone()).await.unwrap();
        let second = dispatcher.submit(Query::new("getMe"), options).await;

        assert!(matches!(second, Err(TdgramError::DuplicateQueryId { .. })));
        assert_eq!(transport.sent_queries().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_leaves_no_slot() {
        let transport = Arc::new(MemoryTransport::new());
        transport.set_fail_sends(true);
        let (dispatcher, _) = dispatcher(transport);

        let result = dispatcher.submit(Query::new("getMe"), SubmitOptions::blocking()).await;

        assert!(matches!(result, Err(TdgramError::SendFailed { .. })));
        assert_eq!(dispatcher.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let transport = Arc::new(MemoryTransport::new());
        let (dispatcher, shutdown) = dispatcher(transport.clone());
        shutdown.trigger(StopReason::Requested);

        let result = dispatcher.submit(Query::new("getMe"), SubmitOptions::detached()).await;

        assert!(matches!(result, Err(TdgramError::Shutdown)));
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(transport.sent_queries().is_empty());
    }
}
