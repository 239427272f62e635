//! tdjson Transport
//!
//! [`TdJsonTransport`] adapts a tdjson client to the
//! [`Transport`] contract. Receives run on tokio's blocking pool and are
//! serialised; `stop` destroys the client once, after any in-flight receive
//! has returned.

use std::ffi::CString;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tdgram_core::{Query, Transport, TransportError, Update};
use tracing::{debug, info};

use crate::ffi::{RawClient, TdJsonLibrary};
use crate::init::init_process;

/// Encode a query for the C interface
pub fn encode_query(query: &Query) -> Result<CString, TransportError> {
    let text = serde_json::to_string(query.as_map()).map_err(|e| TransportError::Malformed {
        reason: e.to_string(),
    })?;
    CString::new(text).map_err(|e| TransportError::Malformed {
        reason: e.to_string(),
    })
}

/// Decode one backend event
pub fn decode_update(text: &str) -> Result<Update, TransportError> {
    let value: Value = serde_json::from_str(text).map_err(|e| TransportError::Malformed {
        reason: e.to_string(),
    })?;
    Update::from_value(value).ok_or_else(|| TransportError::Malformed {
        reason: "backend event is not a JSON object".to_string(),
    })
}

// ----------------------------------------------------------------------------
// Transport
// ----------------------------------------------------------------------------

pub struct TdJsonTransport {
    client: Arc<RwLock<Option<RawClient>>>,
    receive_lock: Arc<tokio::sync::Mutex<()>>,
}

impl TdJsonTransport {
    /// Load the library and create a client, applying the process-wide
    /// settings on first use
    ///
    /// `library_path` of `None` searches the loader path for the platform's
    /// `tdjson` library.
    pub fn open(library_path: Option<&Path>, verbosity: i32) -> Result<Self, TransportError> {
        let library = TdJsonLibrary::load(library_path).map_err(|e| TransportError::Unavailable {
            reason: format!("failed to load tdjson: {}", e),
        })?;
        info!(library = %library.path().display(), "using tdjson shared library");

        init_process(&library, verbosity);
        let client = RawClient::create(Arc::new(library)).ok_or_else(|| TransportError::Unavailable {
            reason: "td_json_client_create returned null".to_string(),
        })?;
        info!(verbosity, "tdjson client created");
        Ok(Self {
            client: Arc::new(RwLock::new(Some(client))),
            receive_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Run a query synchronously; only some backend queries support this
    pub fn execute(&self, query: &Query) -> Result<Option<Update>, TransportError> {
        let request = encode_query(query)?;
        let guard = self.client.read().map_err(|_| poisoned())?;
        let client = guard.as_ref().ok_or(TransportError::Closed)?;
        client.execute(&request).map(|text| decode_update(&text)).transpose()
    }
}

fn poisoned() -> TransportError {
    TransportError::ReceiveFailed {
        reason: "client lock poisoned".to_string(),
    }
}

#[async_trait::async_trait]
impl Transport for TdJsonTransport {
    async fn send(&self, query: &Query) -> Result<(), TransportError> {
        let request = encode_query(query)?;
        let guard = self.client.read().map_err(|_| TransportError::SendFailed {
            reason: "client lock poisoned".to_string(),
        })?;
        let client = guard.as_ref().ok_or(TransportError::Closed)?;
        client.send(&request);
        Ok(())
    }

    async fn receive(&self, timeout: Duration) -> Result<Option<Update>, TransportError> {
        let serialised = self.receive_lock.clone().lock_owned().await;
        let client = self.client.clone();
        let text = tokio::task::spawn_blocking(move || {
            let _serialised = serialised;
            let guard = client.read().map_err(|_| poisoned())?;
            let client = guard.as_ref().ok_or(TransportError::Closed)?;
            Ok::<_, TransportError>(client.receive(timeout.as_secs_f64()))
        })
        .await
        .map_err(|e| TransportError::ReceiveFailed {
            reason: e.to_string(),
        })??;

        match text {
            Some(text) => decode_update(&text).map(Some),
            None => Ok(None),
        }
    }

    async fn stop(&self) {
        let client = self.client.clone();
        // Waits for an in-flight receive to release its read lock
        let destroyed = tokio::task::spawn_blocking(move || match client.write() {
            Ok(mut guard) => guard.take().is_some(),
            Err(_) => false,
        })
        .await
        .unwrap_or(false);
        if destroyed {
            debug!("tdjson client destroyed");
        }
    }

    fn name(&self) -> &'static str {
        "tdjson"
    }
}
