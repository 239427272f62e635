//! Client Handle
//!
//! The host-facing surface of a running session: query submission,
//! authorization, update consumption and shutdown.

use std::sync::Arc;
use std::time::Duration;

use tdgram_core::{
    AuthState, ClientParams, PendingTable, Query, ResultSlot, SessionPaths, Settings,
    TdgramError, TdgramResult, Transport, Update,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::auth::{AuthFlow, AuthPrompts};
use crate::dispatcher::{QueryDispatcher, SubmitOptions};
use crate::shutdown::{ShutdownSignal, StopReason};
use crate::updates::{HandlerEntry, UpdatePipeline};

pub struct Client {
    name: String,
    params: ClientParams,
    settings: Settings,
    paths: SessionPaths,
    transport: Arc<dyn Transport>,
    pending: Arc<PendingTable>,
    dispatcher: QueryDispatcher,
    pipeline: UpdatePipeline,
    shutdown: ShutdownSignal,
    listener: Mutex<Option<JoinHandle<TdgramResult<()>>>>,
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        params: ClientParams,
        settings: Settings,
        paths: SessionPaths,
        transport: Arc<dyn Transport>,
        pending: Arc<PendingTable>,
        dispatcher: QueryDispatcher,
        pipeline: UpdatePipeline,
        shutdown: ShutdownSignal,
        listener: JoinHandle<TdgramResult<()>>,
    ) -> Self {
        Self {
            name,
            params,
            settings,
            paths,
            transport,
            pending,
            dispatcher,
            pipeline,
            shutdown,
            listener: Mutex::new(Some(listener)),
        }
    }

    // ---- Queries ----

    /// Send a query under a generated id
    pub async fn send(&self, query: Query, block: bool) -> TdgramResult<ResultSlot> {
        let options = SubmitOptions {
            block,
            query_id: None,
        };
        self.dispatcher.submit(query, options).await
    }

    pub async fn submit(&self, query: Query, options: SubmitOptions) -> TdgramResult<ResultSlot> {
        self.dispatcher.submit(query, options).await
    }

    /// Walk the authentication handshake until the backend is ready
    pub async fn authorize(&self, prompts: &mut AuthPrompts) -> TdgramResult<AuthState> {
        let flow = AuthFlow::new(
            self.name.clone(),
            self.dispatcher.clone(),
            self.params.clone(),
            self.paths.clone(),
            self.settings.auth.clone(),
        );
        flow.run(prompts).await
    }

    // ---- Updates ----

    pub async fn run_updates(&self, handlers: &[HandlerEntry]) -> TdgramResult<()> {
        self.pipeline.run(handlers).await
    }

    pub async fn next_update(&self, timeout: Duration) -> TdgramResult<Option<Update>> {
        self.pipeline.next_update(timeout).await
    }

    // ---- State ----

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &ClientParams {
        &self.params
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn session_paths(&self) -> &SessionPaths {
        &self.paths
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_running(&self) -> bool {
        !self.shutdown.is_triggered()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.shutdown.reason()
    }

    /// A handle that stops the client from another task
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    // ---- Lifecycle ----

    /// Stop the client and wait for the listener to exit
    ///
    /// Safe to call more than once. Returns the listener's fatal error if it
    /// died before the stop was requested.
    pub async fn stop(&self) -> TdgramResult<()> {
        if self.shutdown.trigger(StopReason::Requested) {
            info!(client = %self.name, "stop requested");
        }
        self.transport.stop().await;

        let handle = self.listener.lock().await.take();
        let result = match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(TdgramError::ListenerFailed {
                    reason: format!("listener task aborted: {}", e),
                }),
            },
            None => match self.shutdown.reason() {
                Some(StopReason::ListenerFailed(reason)) => Err(TdgramError::ListenerFailed { reason }),
                _ => Ok(()),
            },
        };

        let cancelled = self.pending.cancel_all();
        if cancelled > 0 {
            warn!(client = %self.name, cancelled, "cancelled pending queries");
        }
        result
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Lets the listener exit on its next poll
        self.shutdown.trigger(StopReason::Requested);
    }
}
