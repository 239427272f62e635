//! Centralized Configuration Management
//!
//! Plain data supplied by the embedding host: backend credentials and device
//! metadata ([`ClientParams`]), engine tuning ([`Settings`], [`AuthConfig`])
//! and log output ([`LoggingConfig`]). Everything is `serde` so a host can
//! load it from a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{TdgramError, TdgramResult};

/// Library version, reported to the backend as the default application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ----------------------------------------------------------------------------
// Client Parameters
// ----------------------------------------------------------------------------

/// Credentials and device metadata sent during the authentication handshake
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientParams {
    pub api_id: i32,
    pub api_hash: String,
    pub database_encryption_key: String,
    #[serde(default = "default_application_version")]
    pub application_version: String,
    /// Falls back to a value derived from the host architecture
    #[serde(default)]
    pub device_model: Option<String>,
    /// Falls back to the host kernel release
    #[serde(default)]
    pub system_version: Option<String>,
    #[serde(default = "default_language_code")]
    pub system_language_code: String,
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default = "default_true")]
    pub use_secret_chats: bool,
    #[serde(default = "default_true")]
    pub use_file_database: bool,
    #[serde(default = "default_true")]
    pub use_message_database: bool,
    #[serde(default = "default_true")]
    pub use_chat_info_database: bool,
}

fn default_application_version() -> String {
    VERSION.to_string()
}

fn default_language_code() -> String {
    "en".to_string()
}

fn default_true() -> bool {
    true
}

impl ClientParams {
    pub fn new(api_id: i32, api_hash: impl Into<String>, database_encryption_key: impl Into<String>) -> Self {
        Self {
            api_id,
            api_hash: api_hash.into(),
            database_encryption_key: database_encryption_key.into(),
            application_version: default_application_version(),
            device_model: None,
            system_version: None,
            system_language_code: default_language_code(),
            test_mode: false,
            use_secret_chats: true,
            use_file_database: true,
            use_message_database: true,
            use_chat_info_database: true,
        }
    }

    pub fn validate(&self) -> TdgramResult<()> {
        if self.api_id <= 0 {
            return Err(config_error("api_id must be a positive integer"));
        }
        if self.api_hash.trim().is_empty() {
            return Err(config_error("api_hash must not be empty"));
        }
        if self.system_language_code.trim().is_empty() {
            return Err(config_error("system_language_code must not be empty"));
        }
        Ok(())
    }

    pub fn resolved_device_model(&self) -> String {
        self.device_model.clone().unwrap_or_else(host_device_model)
    }

    pub fn resolved_system_version(&self) -> String {
        self.system_version.clone().unwrap_or_else(host_system_version)
    }

    /// Backend parameter object for the `setTdlibParameters` step
    pub fn backend_parameters(&self, paths: &SessionPaths) -> Value {
        json!({
            "api_id": self.api_id,
            "api_hash": self.api_hash,
            "use_test_dc": self.test_mode,
            "device_model": self.resolved_device_model(),
            "system_version": self.resolved_system_version(),
            "application_version": self.application_version,
            "system_language_code": self.system_language_code,
            "use_secret_chats": self.use_secret_chats,
            "use_file_database": self.use_file_database,
            "use_message_database": self.use_message_database,
            "use_chat_info_database": self.use_chat_info_database,
            "files_directory": paths.files_directory.to_string_lossy(),
            "database_directory": paths.database_directory.to_string_lossy(),
        })
    }
}

fn host_device_model() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "PC 64bit".to_string(),
        "x86" => "PC 32bit".to_string(),
        other => other.to_string(),
    }
}

fn host_system_version() -> String {
    let release = std::fs::read_to_string("/proc/sys/kernel/osrelease")
        .map(|raw| raw.trim().to_string())
        .unwrap_or_else(|_| std::env::consts::OS.to_string());
    strip_release_suffix(&release).to_string()
}

/// `6.1.0-18-amd64` -> `6.1.0`
fn strip_release_suffix(release: &str) -> &str {
    release.split('-').next().unwrap_or(release)
}

// ----------------------------------------------------------------------------
// Session Paths
// ----------------------------------------------------------------------------

/// Backend storage locations derived from the client's logical name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub files_directory: PathBuf,
    pub database_directory: PathBuf,
}

impl SessionPaths {
    /// `<root>/<name>` and `<root>/<name>/database`
    pub fn for_client(app_data_root: &Path, name: &str) -> Self {
        let files_directory = app_data_root.join(name);
        let database_directory = files_directory.join("database");
        Self {
            files_directory,
            database_directory,
        }
    }
}

// ----------------------------------------------------------------------------
// Authentication Configuration
// ----------------------------------------------------------------------------

/// Bounds for the authentication state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Consecutive failed steps (backend errors or unrecognised states)
    /// tolerated before giving up; 0 disables the bound
    pub max_consecutive_failures: u32,
    /// Pause after a backend error before re-querying the state
    pub retry_backoff_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 32,
            retry_backoff_ms: 250,
        }
    }
}

impl AuthConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ----------------------------------------------------------------------------
// Engine Settings
// ----------------------------------------------------------------------------

/// Tuning for the correlation engine and its update queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend log verbosity, applied once per process
    pub verbosity: i32,
    /// How long the listener waits for room in a full update queue
    pub queue_put_timeout_ms: u64,
    /// Capacity of the bounded update queue
    pub updates_queue_size: usize,
    /// Transport poll timeout; bounds how quickly the listener sees shutdown
    pub receive_timeout_ms: u64,
    /// Update queue poll timeout for the dispatch pipeline
    pub update_poll_interval_ms: u64,
    /// Root under which per-session backend directories are created
    pub app_data_root: PathBuf,
    /// tdjson shared library; `None` searches the platform loader path
    pub library_path: Option<PathBuf>,
    pub auth: AuthConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verbosity: 0,
            queue_put_timeout_ms: 10_000,
            updates_queue_size: 1000,
            receive_timeout_ms: 1000,
            update_poll_interval_ms: 500,
            app_data_root: PathBuf::from(".app-data"),
            library_path: None,
            auth: AuthConfig::default(),
        }
    }
}

impl Settings {
    /// Short timeouts and no auth backoff, for tests
    pub fn testing() -> Self {
        Self {
            queue_put_timeout_ms: 1000,
            updates_queue_size: 100,
            receive_timeout_ms: 20,
            update_poll_interval_ms: 20,
            auth: AuthConfig {
                max_consecutive_failures: 8,
                retry_backoff_ms: 0,
            },
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TdgramResult<()> {
        if self.updates_queue_size == 0 {
            return Err(config_error("updates_queue_size must be at least 1"));
        }
        if self.receive_timeout_ms == 0 {
            return Err(config_error("receive_timeout_ms must be positive"));
        }
        if self.update_poll_interval_ms == 0 {
            return Err(config_error("update_poll_interval_ms must be positive"));
        }
        Ok(())
    }

    pub fn queue_put_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_put_timeout_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn update_poll_interval(&self) -> Duration {
        Duration::from_millis(self.update_poll_interval_ms)
    }
}

// ----------------------------------------------------------------------------
// Logging Configuration
// ----------------------------------------------------------------------------

/// Log output for a client session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    /// Log file; `%name` is replaced by the session name. `None` logs to stderr
    pub path: Option<String>,
    /// When the log file is rotated to a date-suffixed name
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            path: None,
            rotation: LogRotation::Never,
        }
    }
}

/// Log file rotation schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Daily,
    Hourly,
}

impl LoggingConfig {
    pub fn resolved_path(&self, name: &str) -> Option<PathBuf> {
        self.path
            .as_ref()
            .map(|path| PathBuf::from(path.replace("%name", name)))
    }
}

fn config_error(reason: &str) -> TdgramError {
    TdgramError::Configuration {
        reason: reason.to_string(),
    }
}
