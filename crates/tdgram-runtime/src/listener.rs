//! Listener Task
//!
//! The single long-lived task that polls the transport, resolves correlated
//! responses in the pending table, and forwards every update into the bounded
//! update queue. Updates are handled strictly in receipt order, and a slot is
//! resolved before its update is queued.

use std::sync::Arc;
use std::time::Duration;

use tdgram_core::{
    types::AUTH_UPDATE_TYPE, PendingTable, QueryId, TdgramError, TdgramResult, Transport,
    TransportError, Update,
};
use tokio::sync::mpsc::{self, error::SendTimeoutError};
use tracing::{debug, error, info, warn};

use crate::shutdown::{ShutdownSignal, StopReason};

/// Correlation identifier an update answers, if any
///
/// Authorization state updates map to the fixed sentinel id used by the
/// authentication flow; everything else relies on `@extra.query_id`.
pub fn correlation_id(update: &Update) -> Option<QueryId> {
    if update.type_name() == AUTH_UPDATE_TYPE {
        Some(QueryId::from(AUTH_UPDATE_TYPE))
    } else {
        update.query_id()
    }
}

// ----------------------------------------------------------------------------
// Listener Task
// ----------------------------------------------------------------------------

pub struct ListenerTask {
    client_name: String,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    updates: mpsc::Sender<Update>,
    shutdown: ShutdownSignal,
    receive_timeout: Duration,
    put_timeout: Duration,
}

impl ListenerTask {
    pub fn new(
        client_name: String,
        transport: Arc<dyn Transport>,
        pending: Arc<PendingTable>,
        updates: mpsc::Sender<Update>,
        shutdown: ShutdownSignal,
        receive_timeout: Duration,
        put_timeout: Duration,
    ) -> Self {
        Self {
            client_name,
            transport,
            pending,
            updates,
            shutdown,
            receive_timeout,
            put_timeout,
        }
    }

    /// Run until shutdown, then cancel whatever is still pending
    ///
    /// A fatal error triggers shutdown with [`StopReason::ListenerFailed`]
    /// before it is returned, so the rest of the client observes it.
    pub async fn run(self) -> TdgramResult<()> {
        info!(client = %self.client_name, transport = self.transport.name(), "listener started");

        let result = self.poll_loop().await;
        if let Err(e) = &result {
            error!(client = %self.client_name, error = %e, "listener failed");
            self.shutdown.trigger(StopReason::ListenerFailed(e.to_string()));
        }

        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            warn!(client = %self.client_name, cancelled, "cancelled pending queries on shutdown");
        }

        info!(client = %self.client_name, "listener stopped");
        result
    }

    async fn poll_loop(&self) -> TdgramResult<()> {
        while !self.shutdown.is_triggered() {
            match self.transport.receive(self.receive_timeout).await {
                Ok(Some(update)) => self.process(update).await?,
                Ok(None) => continue,
                Err(TransportError::Closed) => {
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    return Err(TdgramError::Transport(TransportError::Closed));
                }
                Err(e) => {
                    warn!(client = %self.client_name, error = %e, "receive failed");
                }
            }
        }
        Ok(())
    }

    async fn process(&self, update: Update) -> TdgramResult<()> {
        match correlation_id(&update) {
            Some(query_id) => {
                if !self.pending.resolve_and_remove(&query_id, update.clone()) {
                    debug!(
                        client = %self.client_name,
                        %query_id,
                        update_type = update.type_name(),
                        "response for unknown or expired query"
                    );
                }
            }
            None => {
                debug!(client = %self.client_name, update_type = update.type_name(), "push update");
            }
        }

        self.forward(update).await
    }

    /// Bounded insert into the update queue; waits rather than drops
    async fn forward(&self, update: Update) -> TdgramResult<()> {
        tokio::select! {
            sent = self.updates.send_timeout(update, self.put_timeout) => match sent {
                Ok(()) => Ok(()),
                Err(SendTimeoutError::Timeout(_)) => Err(TdgramError::QueueSaturated {
                    capacity: self.updates.max_capacity(),
                    timeout_ms: self.put_timeout.as_millis() as u64,
                }),
                Err(SendTimeoutError::Closed(_)) => Err(TdgramError::UpdateQueueClosed),
            },
            _ = self.shutdown.triggered() => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(value: serde_json::Value) -> Update {
        Update::from_value(value).unwrap()
    }

    #[test]
    fn test_auth_update_uses_sentinel() {
        let auth = update(json!({
            "@type": "updateAuthorizationState",
            "@extra": {"query_id": "ignored"},
            "authorization_state": {"@type": "authorizationStateReady"}
        }));
        assert_eq!(correlation_id(&auth), Some(QueryId::from("updateAuthorizationState")));
    }

    #[test]
    fn test_extra_and_push_classification() {
        let response = update(json!({"@type": "pong", "@extra": {"query_id": 9}}));
        let push = update(json!({"@type": "updateNewMessage"}));

        assert_eq!(correlation_id(&response), Some(QueryId::Number(9)));
        assert_eq!(correlation_id(&push), None);
    }
}
