//! Result Slot
//!
//! One slot per outstanding query. Completion happens exactly once (first
//! write wins) and any number of tasks may wait on it. Backed by a
//! `tokio::sync::watch` channel so waiters observe the terminal state even if
//! they subscribe after completion.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::errors::{TdgramError, TdgramResult};
use crate::types::{Query, QueryId, Update};

// ----------------------------------------------------------------------------
// Status
// ----------------------------------------------------------------------------

/// Lifecycle of a result slot; leaves `Pending` at most once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotStatus {
    Pending,
    Ok,
    Error,
    /// Client shut down before a response arrived
    Cancelled,
}

#[derive(Debug, Clone)]
enum SlotState {
    Pending,
    Ok(Update),
    Error(Update),
    Cancelled,
}

impl SlotState {
    fn status(&self) -> SlotStatus {
        match self {
            SlotState::Pending => SlotStatus::Pending,
            SlotState::Ok(_) => SlotStatus::Ok,
            SlotState::Error(_) => SlotStatus::Error,
            SlotState::Cancelled => SlotStatus::Cancelled,
        }
    }
}

// ----------------------------------------------------------------------------
// Result Slot
// ----------------------------------------------------------------------------

struct SlotInner {
    query_id: QueryId,
    query: Query,
    state: watch::Sender<SlotState>,
}

/// Eventual outcome of one query; cheap to clone, all clones share state
#[derive(Clone)]
pub struct ResultSlot {
    inner: Arc<SlotInner>,
}

impl ResultSlot {
    pub fn new(query_id: QueryId, query: Query) -> Self {
        let (state, _) = watch::channel(SlotState::Pending);
        Self {
            inner: Arc::new(SlotInner {
                query_id,
                query,
                state,
            }),
        }
    }

    pub fn query_id(&self) -> &QueryId {
        &self.inner.query_id
    }

    /// The query as it was sent, including the stamped `@extra`
    pub fn query(&self) -> &Query {
        &self.inner.query
    }

    pub fn status(&self) -> SlotStatus {
        self.inner.state.borrow().status()
    }

    pub fn is_done(&self) -> bool {
        self.status() != SlotStatus::Pending
    }

    /// Resolved update when the status is `Ok`
    pub fn update(&self) -> Option<Update> {
        match &*self.inner.state.borrow() {
            SlotState::Ok(update) => Some(update.clone()),
            _ => None,
        }
    }

    /// Raw backend error payload when the status is `Error`
    pub fn error_info(&self) -> Option<Update> {
        match &*self.inner.state.borrow() {
            SlotState::Error(update) => Some(update.clone()),
            _ => None,
        }
    }

    pub fn complete_ok(&self, update: Update) -> bool {
        self.transition(SlotState::Ok(update))
    }

    pub fn complete_error(&self, update: Update) -> bool {
        self.transition(SlotState::Error(update))
    }

    /// Complete with `Error` if the update is a backend error, `Ok` otherwise
    pub fn complete(&self, update: Update) -> bool {
        if update.is_error() {
            self.complete_error(update)
        } else {
            self.complete_ok(update)
        }
    }

    pub fn cancel(&self) -> bool {
        self.transition(SlotState::Cancelled)
    }

    fn transition(&self, next: SlotState) -> bool {
        self.inner.state.send_if_modified(|state| {
            if matches!(state, SlotState::Pending) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait until the slot leaves `Pending`
    ///
    /// `None` waits without bound. On timeout the slot stays `Pending` and
    /// registered; the caller decides whether to wait again.
    pub async fn wait(&self, timeout: Option<Duration>) -> TdgramResult<ResultSlot> {
        let mut receiver = self.inner.state.subscribe();
        let done = receiver.wait_for(|state| !matches!(state, SlotState::Pending));

        match timeout {
            None => {
                done.await.map_err(|_| TdgramError::Shutdown)?;
            }
            Some(limit) => match tokio::time::timeout(limit, done).await {
                Ok(result) => {
                    result.map_err(|_| TdgramError::Shutdown)?;
                }
                Err(_) => {
                    return Err(TdgramError::WaitTimeout {
                        query_id: self.inner.query_id.to_string(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }
            },
        }

        Ok(self.clone())
    }
}

impl fmt::Debug for ResultSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResultSlot<{:?}, {}>", self.status(), self.inner.query_id)
    }
}
