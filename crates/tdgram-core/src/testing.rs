//! In-memory transport for deterministic tests
//!
//! [`MemoryTransport`] stands in for the native backend: tests push updates
//! into it, inspect the queries it was sent, and may install a responder that
//! scripts backend replies per query.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::errors::TransportError;
use crate::transport::Transport;
use crate::types::{Query, Update};

/// Scripted backend reply: updates to emit for one sent query
pub type Responder = Box<dyn Fn(&Query) -> Vec<Update> + Send + Sync>;

// ----------------------------------------------------------------------------
// Statistics
// ----------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryTransportStats {
    pub queries_sent: AtomicU64,
    pub sends_rejected: AtomicU64,
    pub updates_delivered: AtomicU64,
    pub stop_calls: AtomicU64,
}

// ----------------------------------------------------------------------------
// Memory Transport
// ----------------------------------------------------------------------------

pub struct MemoryTransport {
    inbound_sender: mpsc::UnboundedSender<Update>,
    inbound_receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Update>>,
    sent: Mutex<Vec<Query>>,
    responder: Option<Responder>,
    fail_sends: AtomicBool,
    stopped: AtomicBool,
    stats: MemoryTransportStats,
}

impl MemoryTransport {
    pub fn new() -> Self {
        let (inbound_sender, inbound_receiver) = mpsc::unbounded_channel();
        Self {
            inbound_sender,
            inbound_receiver: tokio::sync::Mutex::new(inbound_receiver),
            sent: Mutex::new(Vec::new()),
            responder: None,
            fail_sends: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            stats: MemoryTransportStats::default(),
        }
    }

    /// Reply to every sent query with the updates returned by `responder`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Query) -> Vec<Update> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    /// Queue an update as if the backend had emitted it
    pub fn push(&self, update: Update) {
        // The receiver lives as long as `self`, so this cannot fail
        let _ = self.inbound_sender.send(update);
    }

    /// Make subsequent sends fail (or succeed again)
    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Every query accepted so far, in send order
    pub fn sent_queries(&self) -> Vec<Query> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    /// `@type` of every accepted query, in send order
    pub fn sent_types(&self) -> Vec<String> {
        self.sent_queries()
            .iter()
            .map(|query| query.type_name().to_string())
            .collect()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &MemoryTransportStats {
        &self.stats
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, query: &Query) -> Result<(), TransportError> {
        if self.is_stopped() {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            self.stats.sends_rejected.fetch_add(1, Ordering::Relaxed);
            return Err(TransportError::SendFailed {
                reason: "memory transport rejecting sends".to_string(),
            });
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(query.clone());
        }
        self.stats.queries_sent.fetch_add(1, Ordering::Relaxed);

        if let Some(responder) = &self.responder {
            for update in responder(query) {
                self.push(update);
            }
        }
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Option<Update>, TransportError> {
        if self.is_stopped() {
            return Err(TransportError::Closed);
        }
        let mut receiver = self.inbound_receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(update)) => {
                self.stats.updates_delivered.fetch_add(1, Ordering::Relaxed);
                Ok(Some(update))
            }
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Ok(None),
        }
    }

    async fn stop(&self) {
        self.stats.stop_calls.fetch_add(1, Ordering::Relaxed);
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
