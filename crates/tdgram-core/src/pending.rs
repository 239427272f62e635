//! Pending-Result Table
//!
//! Concurrent map from correlation identifier to in-flight [`ResultSlot`].
//! Written by any number of dispatching callers and by the single listener
//! task. An entry is removed *before* its slot is completed, so a response
//! can be delivered at most once.

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::errors::{TdgramError, TdgramResult};
use crate::slot::ResultSlot;
use crate::types::{QueryId, Update};

/// In-flight queries keyed by correlation identifier
#[derive(Debug, Default)]
pub struct PendingTable {
    slots: DashMap<QueryId, ResultSlot>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot under its own query id; duplicate ids are rejected
    pub fn register(&self, slot: ResultSlot) -> TdgramResult<()> {
        match self.slots.entry(slot.query_id().clone()) {
            Entry::Occupied(existing) => Err(TdgramError::DuplicateQueryId {
                query_id: existing.key().to_string(),
            }),
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(())
            }
        }
    }

    /// Remove the slot for `query_id` and complete it with `update`
    ///
    /// Returns `false` when no slot was registered under that id (a response
    /// for an unknown or already-resolved query).
    pub fn resolve_and_remove(&self, query_id: &QueryId, update: Update) -> bool {
        match self.slots.remove(query_id) {
            Some((_, slot)) => {
                debug!(%query_id, update_type = update.type_name(), "resolving pending query");
                slot.complete(update);
                true
            }
            None => {
                debug!(%query_id, "no pending query for response");
                false
            }
        }
    }

    /// Remove a slot without completing it
    pub fn abandon(&self, query_id: &QueryId) -> Option<ResultSlot> {
        self.slots.remove(query_id).map(|(_, slot)| slot)
    }

    /// Drain the table, cancelling every slot; returns how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let ids: Vec<QueryId> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        let mut cancelled = 0;
        for query_id in ids {
            if let Some((_, slot)) = self.slots.remove(&query_id) {
                if slot.cancel() {
                    cancelled += 1;
                }
            }
        }
        cancelled
    }

    pub fn contains(&self, query_id: &QueryId) -> bool {
        self.slots.contains_key(query_id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
