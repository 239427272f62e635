//! Shutdown Signal
//!
//! Set-once stop flag shared by the listener, the dispatcher and the update
//! pipeline. The first trigger wins and records why the client stopped.

use std::sync::Arc;

use tokio::sync::watch;

/// Why the client stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// `Client::stop` was called
    Requested,
    /// The listener task hit a fatal error
    ListenerFailed(String),
}

#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    state: Arc<watch::Sender<Option<StopReason>>>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
        }
    }

    /// Trigger shutdown; returns `false` if it was already triggered
    pub fn trigger(&self, reason: StopReason) -> bool {
        self.state.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.state.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        self.state.borrow().clone()
    }

    /// Resolve once shutdown has been triggered
    pub async fn triggered(&self) {
        let mut receiver = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close under us
        let _ = receiver.wait_for(Option::is_some).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
