//! Update Dispatch Pipeline
//!
//! Drains the bounded update queue and offers each update to the registered
//! handlers in order. A handler that errors or panics is logged and skipped;
//! the rest of the pipeline carries on.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tdgram_core::{TdgramError, TdgramResult, Update};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::shutdown::{ShutdownSignal, StopReason};

// ----------------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------------

#[async_trait]
pub trait UpdateHandler: Send + Sync {
    async fn handle(&self, update: &Update) -> anyhow::Result<()>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> UpdateHandler for FnHandler<F>
where
    F: Fn(Update) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn handle(&self, update: &Update) -> anyhow::Result<()> {
        (self.f)(update.clone()).await
    }
}

/// A named handler with an optional `@type` filter
#[derive(Clone)]
pub struct HandlerEntry {
    name: String,
    handler: Arc<dyn UpdateHandler>,
    filter: Option<HashSet<String>>,
}

impl HandlerEntry {
    pub fn new(name: impl Into<String>, handler: Arc<dyn UpdateHandler>) -> Self {
        Self {
            name: name.into(),
            handler,
            filter: None,
        }
    }

    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Update) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self::new(name, Arc::new(FnHandler { f }))
    }

    /// Restrict the entry to updates whose `@type` is in `types`
    pub fn only<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts(&self, update: &Update) -> bool {
        match &self.filter {
            Some(types) => types.contains(update.type_name()),
            None => true,
        }
    }
}

// ----------------------------------------------------------------------------
// Pipeline
// ----------------------------------------------------------------------------

pub struct UpdatePipeline {
    client_name: String,
    receiver: Mutex<mpsc::Receiver<Update>>,
    shutdown: ShutdownSignal,
    poll_interval: Duration,
}

impl UpdatePipeline {
    pub fn new(
        client_name: impl Into<String>,
        receiver: mpsc::Receiver<Update>,
        shutdown: ShutdownSignal,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            receiver: Mutex::new(receiver),
            shutdown,
            poll_interval,
        }
    }

    /// Dispatch updates until the client stops
    ///
    /// Returns `Ok` after a requested stop and `ListenerFailed` if the
    /// listener died.
    pub async fn run(&self, handlers: &[HandlerEntry]) -> TdgramResult<()> {
        let mut receiver = self.receiver.lock().await;
        info!(client = %self.client_name, handlers = handlers.len(), "update dispatch started");

        let result = loop {
            if self.shutdown.is_triggered() {
                break self.exit_status();
            }
            match tokio::time::timeout(self.poll_interval, receiver.recv()).await {
                Ok(Some(update)) => self.dispatch(handlers, &update).await,
                Ok(None) => break self.exit_status(),
                Err(_) => continue,
            }
        };

        info!(client = %self.client_name, "update dispatch stopped");
        result
    }

    /// Take the next queued update, waiting up to `timeout`
    ///
    /// `Ok(None)` means nothing arrived in time. Once the listener is gone
    /// and the queue is drained this reports why the client stopped.
    pub async fn next_update(&self, timeout: Duration) -> TdgramResult<Option<Update>> {
        let mut receiver = self.receiver.lock().await;
        match tokio::time::timeout(timeout, receiver.recv()).await {
            Ok(Some(update)) => Ok(Some(update)),
            Ok(None) => match self.exit_status() {
                Ok(()) => Err(TdgramError::Shutdown),
                Err(e) => Err(e),
            },
            Err(_) => Ok(None),
        }
    }

    async fn dispatch(&self, handlers: &[HandlerEntry], update: &Update) {
        debug!(client = %self.client_name, update_type = update.type_name(), "dispatching update");
        for entry in handlers.iter().filter(|entry| entry.accepts(update)) {
            match AssertUnwindSafe(entry.handler.handle(update)).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        client = %self.client_name,
                        handler = %entry.name,
                        update_type = update.type_name(),
                        error = %format!("{:#}", e),
                        "update handler failed"
                    );
                }
                Err(panic) => {
                    error!(
                        client = %self.client_name,
                        handler = %entry.name,
                        update_type = update.type_name(),
                        panic = panic_message(panic.as_ref()),
                        "update handler panicked"
                    );
                }
            }
        }
    }

    fn exit_status(&self) -> TdgramResult<()> {
        match self.shutdown.reason() {
            Some(StopReason::ListenerFailed(reason)) => Err(TdgramError::ListenerFailed { reason }),
            _ => Ok(()),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
