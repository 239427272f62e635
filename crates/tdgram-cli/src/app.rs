//! tdgram CLI application
//!
//! Owns one running [`Client`] and implements the subcommands on top of it.

use std::io::Write;
use std::sync::Arc;

use serde_json::{json, Value};
use tdgram_core::{Transport, TransportError};
use tdgram_runtime::{
    AuthState, Client, ClientBuilder, HandlerEntry, Query, ResultSlot, SlotStatus, Update,
};
use tracing::{info, warn};

use crate::cli::Commands;
use crate::config::AppConfig;
use crate::error::{CliError, Result};
use crate::prompts::build_prompts;

/// Synchronous query runner offered by some transports
pub type Executor =
    Box<dyn Fn(&Query) -> std::result::Result<Option<Update>, TransportError> + Send + Sync>;

pub struct TdgramApp {
    config: AppConfig,
    client: Client,
    executor: Option<Executor>,
}

impl TdgramApp {
    /// Start a client for session `name` over `transport`
    pub fn start(name: &str, config: AppConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let params = config.client_params()?.clone();
        let client = ClientBuilder::new(name, params)
            .with_settings(config.settings.clone())
            .with_transport(transport)
            .build()?;
        Ok(Self {
            config,
            client,
            executor: None,
        })
    }

    pub fn with_executor(
        mut self,
        executor: impl Fn(&Query) -> std::result::Result<Option<Update>, TransportError> + Send + Sync + 'static,
    ) -> Self {
        self.executor = Some(Box::new(executor));
        self
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Run one subcommand, then stop the client
    pub async fn execute(self, command: Commands) -> Result<()> {
        let outcome = self.dispatch(command).await;
        let stopped = self.client.stop().await;
        outcome?;
        stopped?;
        Ok(())
    }

    async fn dispatch(&self, command: Commands) -> Result<()> {
        match command {
            Commands::Login => {
                let state = self.login().await?;
                println!("{}", state);
                Ok(())
            }
            Commands::Listen { only } => {
                self.login().await?;
                self.listen(only).await
            }
            Commands::Query { json, no_wait } => {
                self.login().await?;
                let output = self.query(&json, !no_wait).await?;
                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(())
            }
            Commands::Execute { json } => {
                let output = self.execute_sync(&json)?;
                println!("{}", serde_json::to_string_pretty(&output)?);
                Ok(())
            }
        }
    }

    pub async fn login(&self) -> Result<AuthState> {
        let mut prompts = build_prompts(&self.config.login);
        let state = self.client.authorize(&mut prompts).await?;
        info!(client = self.client.name(), "logged in");
        Ok(state)
    }

    /// Send a raw JSON query; returns the result, or the query id if not waiting
    pub async fn query(&self, text: &str, wait: bool) -> Result<Value> {
        let query = parse_query(text)?;
        let slot = self.client.send(query, wait).await?;
        Ok(describe(&slot))
    }

    /// Run a raw JSON query synchronously; `null` when the library has no answer
    pub fn execute_sync(&self, text: &str) -> Result<Value> {
        let executor = self.executor.as_ref().ok_or_else(|| {
            CliError::InvalidQuery("this transport cannot execute queries synchronously".to_string())
        })?;
        let query = parse_query(text)?;
        let result = executor(&query)?;
        Ok(result.map(Update::into_value).unwrap_or(Value::Null))
    }

    /// Print updates as JSON lines until Ctrl-C or the client stops
    pub async fn listen(&self, only: Vec<String>) -> Result<()> {
        let mut printer = HandlerEntry::from_fn("stdout", |update: Update| async move {
            let line = serde_json::to_string(update.as_map())?;
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", line)?;
            Ok::<_, anyhow::Error>(())
        });
        if !only.is_empty() {
            printer = printer.only(only);
        }
        let handlers = [printer];

        tokio::select! {
            result = self.client.run_updates(&handlers) => result?,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                }
                info!(client = self.client.name(), "interrupted");
            }
        }
        Ok(())
    }
}

fn parse_query(text: &str) -> Result<Query> {
    let value: Value = serde_json::from_str(text)?;
    Query::from_value(value).map_err(|e| CliError::InvalidQuery(e.to_string()))
}

/// JSON summary of a result slot
pub fn describe(slot: &ResultSlot) -> Value {
    let status = match slot.status() {
        SlotStatus::Pending => "pending",
        SlotStatus::Ok => "ok",
        SlotStatus::Error => "error",
        SlotStatus::Cancelled => "cancelled",
    };
    let result = slot
        .update()
        .or_else(|| slot.error_info())
        .map(Update::into_value)
        .unwrap_or(Value::Null);
    json!({
        "query_id": slot.query_id().to_value(),
        "status": status,
        "result": result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tdgram_core::MemoryTransport;

    fn config() -> AppConfig {
        let mut config = AppConfig::from_toml_str(
            r#"
            [params]
            api_id = 1
            api_hash = "hash"
            database_encryption_key = ""

            [login]
            bot_token = "1:abc"
            "#,
        )
        .unwrap();
        config.settings = tdgram_core::Settings::testing();
        config
    }

    fn echo_backend() -> Arc<MemoryTransport> {
        Arc::new(MemoryTransport::with_responder(|query| {
            let mut body = match query.type_name() {
                "getAuthorizationState" => json!({"@type": "authorizationStateReady"}),
                "getMe" => json!({"@type": "user", "id": 99}),
                _ => json!({"@type": "error", "code": 400, "message": "UNKNOWN"}),
            };
            body["@extra"] = query.get("@extra").cloned().unwrap_or(Value::Null);
            Update::from_value(body).into_iter().collect()
        }))
    }

    #[tokio::test]
    async fn test_login_when_already_ready() {
        let app = TdgramApp::start("cli", config(), echo_backend()).unwrap();
        assert_eq!(app.login().await.unwrap(), AuthState::Ready);
        app.client().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_waits_for_result() {
        let app = TdgramApp::start("cli", config(), echo_backend()).unwrap();

        let output = app.query(r#"{"@type": "getMe"}"#, true).await.unwrap();
        assert_eq!(output["status"], json!("ok"));
        assert_eq!(output["result"]["id"], json!(99));

        let failed = app.query(r#"{"@type": "bogus"}"#, true).await.unwrap();
        assert_eq!(failed["status"], json!("error"));
        assert_eq!(failed["result"]["message"], json!("UNKNOWN"));

        app.client().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_runs_without_authorizing() {
        let backend = echo_backend();
        let app = TdgramApp::start("cli", config(), backend.clone())
            .unwrap()
            .with_executor(|query| {
                Ok(Update::from_value(json!({"@type": "text", "text": query.type_name()})))
            });

        let output = app.execute_sync(r#"{"@type": "getOption", "name": "version"}"#).unwrap();

        assert_eq!(output["text"], json!("getOption"));
        assert!(backend.sent_types().is_empty());
        app.client().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_needs_an_executor() {
        let app = TdgramApp::start("cli", config(), echo_backend()).unwrap();

        let err = app.execute_sync(r#"{"@type": "getOption"}"#).unwrap_err();
        assert!(matches!(err, CliError::InvalidQuery(_)));

        app.client().stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_query_rejects_untyped_json() {
        let app = TdgramApp::start("cli", config(), echo_backend()).unwrap();

        let err = app.query(r#"{"chat_id": 1}"#, false).await.unwrap_err();
        assert!(matches!(err, CliError::InvalidQuery(_)));
        let err = app.query("not json", false).await.unwrap_err();
        assert!(matches!(err, CliError::Serialization(_)));

        app.client().stop().await.unwrap();
    }
}
