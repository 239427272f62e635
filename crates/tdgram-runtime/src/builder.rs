//! Client Builder API
//!
//! Validates configuration, wires the pending table, update queue and
//! shutdown signal together, and spawns the listener task.

use std::sync::Arc;

use tdgram_core::{
    ClientParams, PendingTable, SessionPaths, Settings, TdgramError, TdgramResult, Transport,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::client::Client;
use crate::dispatcher::QueryDispatcher;
use crate::listener::ListenerTask;
use crate::shutdown::ShutdownSignal;
use crate::updates::UpdatePipeline;

// ----------------------------------------------------------------------------
// Client Builder
// ----------------------------------------------------------------------------

pub struct ClientBuilder {
    name: String,
    params: ClientParams,
    settings: Settings,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    /// `name` identifies the session and names its storage directory
    pub fn new(name: impl Into<String>, params: ClientParams) -> Self {
        Self {
            name: name.into(),
            params,
            settings: Settings::default(),
            transport: None,
        }
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate and start the client; must be called inside a tokio runtime
    pub fn build(self) -> TdgramResult<Client> {
        validate_name(&self.name)?;
        self.params.validate()?;
        self.settings.validate()?;

        let transport = self.transport.ok_or_else(|| TdgramError::Configuration {
            reason: "no transport configured".to_string(),
        })?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|e| TdgramError::Configuration {
            reason: format!("client must be built inside a tokio runtime: {}", e),
        })?;

        let paths = SessionPaths::for_client(&self.settings.app_data_root, &self.name);
        let pending = Arc::new(PendingTable::new());
        let shutdown = ShutdownSignal::new();
        let (update_sender, update_receiver) = mpsc::channel(self.settings.updates_queue_size);

        let listener = ListenerTask::new(
            self.name.clone(),
            transport.clone(),
            pending.clone(),
            update_sender,
            shutdown.clone(),
            self.settings.receive_timeout(),
            self.settings.queue_put_timeout(),
        );
        let listener_handle = runtime.spawn(listener.run());

        let dispatcher = QueryDispatcher::new(
            self.name.as_str(),
            transport.clone(),
            pending.clone(),
            shutdown.clone(),
        );
        let pipeline = UpdatePipeline::new(
            self.name.clone(),
            update_receiver,
            shutdown.clone(),
            self.settings.update_poll_interval(),
        );

        info!(
            client = %self.name,
            transport = transport.name(),
            queue_size = self.settings.updates_queue_size,
            "client started"
        );

        Ok(Client::new(
            self.name,
            self.params,
            self.settings,
            paths,
            transport,
            pending,
            dispatcher,
            pipeline,
            shutdown,
            listener_handle,
        ))
    }
}

fn validate_name(name: &str) -> TdgramResult<()> {
    if name.trim().is_empty() {
        return Err(TdgramError::Configuration {
            reason: "client name must not be empty".to_string(),
        });
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(TdgramError::Configuration {
            reason: format!("client name {:?} is not a valid directory name", name),
        });
    }
    Ok(())
}
