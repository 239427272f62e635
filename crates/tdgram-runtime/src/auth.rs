//! Authentication State Machine
//!
//! Drives the backend's login handshake one query per step until it reports
//! `Ready`. Every step is a blocking query under a fixed sentinel id, so the
//! `updateAuthorizationState` push that follows a step resolves it directly.
//!
//! Backend errors never abort the handshake: the machine logs them and starts
//! over by asking for the current state, within [`AuthConfig`]'s retry bound.
//! A backend that keeps answering with an unrecognised, closing or closed
//! state counts against the same bound.

use serde_json::Value;
use tdgram_core::{
    types::AUTH_UPDATE_TYPE, AuthConfig, AuthState, ClientParams, Query, QueryId, SessionPaths,
    SlotStatus, TdgramError, TdgramResult, Update,
};
use tracing::{debug, info, warn};

use crate::dispatcher::{QueryDispatcher, SubmitOptions};
use crate::prompt::Prompt;

/// Sentinel id for the state query
pub const STATE_QUERY_ID: &str = "getAuthorizationState";

/// Backend acknowledgement type for a step that was accepted
const OK_TYPE: &str = "ok";

// ----------------------------------------------------------------------------
// Prompts
// ----------------------------------------------------------------------------

/// Inputs the handshake may ask for
///
/// Missing prompts are only an error if the backend actually reaches the
/// state that needs them.
#[derive(Debug, Default)]
pub struct AuthPrompts {
    pub bot_token: Option<String>,
    pub phone: Option<Prompt>,
    pub code: Option<Prompt>,
    pub password: Option<Prompt>,
    pub first_name: Option<Prompt>,
    pub last_name: Option<Prompt>,
}

impl AuthPrompts {
    pub fn bot(token: impl Into<String>) -> Self {
        Self {
            bot_token: Some(token.into()),
            ..Self::default()
        }
    }

    pub fn user(phone: impl Into<Prompt>, code: impl Into<Prompt>) -> Self {
        Self {
            phone: Some(phone.into()),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<Prompt>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_names(mut self, first_name: impl Into<Prompt>, last_name: impl Into<Prompt>) -> Self {
        self.first_name = Some(first_name.into());
        self.last_name = Some(last_name.into());
        self
    }
}

fn ask(prompt: &mut Option<Prompt>, state: AuthState, what: &str, last: Option<&Update>) -> TdgramResult<String> {
    let prompt = prompt.as_mut().ok_or_else(|| TdgramError::Prompt {
        state: state.to_string(),
        reason: format!("no {} prompt configured", what),
    })?;
    prompt.resolve(last).map_err(|e| prompt_error(state, e))
}

fn ask_once(prompt: &mut Option<Prompt>, state: AuthState, what: &str, last: Option<&Update>) -> TdgramResult<String> {
    let prompt = prompt.as_mut().ok_or_else(|| TdgramError::Prompt {
        state: state.to_string(),
        reason: format!("no {} prompt configured", what),
    })?;
    prompt.resolve_once(last).map_err(|e| prompt_error(state, e))
}

fn prompt_error(state: AuthState, error: anyhow::Error) -> TdgramError {
    TdgramError::Prompt {
        state: state.to_string(),
        reason: format!("{:#}", error),
    }
}

// ----------------------------------------------------------------------------
// Auth Flow
// ----------------------------------------------------------------------------

pub struct AuthFlow {
    client_name: String,
    dispatcher: QueryDispatcher,
    params: ClientParams,
    paths: SessionPaths,
    config: AuthConfig,
}

impl AuthFlow {
    pub fn new(
        client_name: impl Into<String>,
        dispatcher: QueryDispatcher,
        params: ClientParams,
        paths: SessionPaths,
        config: AuthConfig,
    ) -> Self {
        Self {
            client_name: client_name.into(),
            dispatcher,
            params,
            paths,
            config,
        }
    }

    /// Run the handshake to completion
    ///
    /// The state is `None` until the backend has reported one.
    pub async fn run(&self, prompts: &mut AuthPrompts) -> TdgramResult<AuthState> {
        let mut state: Option<AuthState> = None;
        let mut last: Option<Update> = None;
        let mut failures: u32 = 0;

        info!(client = %self.client_name, "authorization started");
        loop {
            let current = state.unwrap_or(AuthState::None);
            if current.is_ready() {
                info!(client = %self.client_name, "authorization complete");
                return Ok(current);
            }

            let (query, query_id) = self.step_query(current, prompts, last.as_ref())?;
            let is_state_query = query_id == QueryId::from(STATE_QUERY_ID);
            debug!(
                client = %self.client_name,
                state = %state.map_or_else(|| "unobserved".to_string(), |s| s.to_string()),
                query_type = query.type_name(),
                "authorization step"
            );

            let slot = self
                .dispatcher
                .submit(query, SubmitOptions::blocking().with_query_id(query_id))
                .await?;

            let stalled = match slot.status() {
                SlotStatus::Ok => {
                    let Some(update) = slot.update() else {
                        return Err(TdgramError::Shutdown);
                    };
                    let next = AuthState::from_update(&update);
                    let stalled = match next {
                        AuthState::Closing | AuthState::Closed => true,
                        AuthState::None => update.type_name() != OK_TYPE,
                        _ => false,
                    };
                    if stalled {
                        debug!(
                            client = %self.client_name,
                            update_type = update.type_name(),
                            "authorization not progressing"
                        );
                    } else if !is_state_query {
                        failures = 0;
                    }
                    state = Some(next);
                    last = Some(update);
                    stalled
                }
                SlotStatus::Error => {
                    let error = slot.error_info();
                    warn!(
                        client = %self.client_name,
                        state = %current,
                        error = ?error.as_ref().map(|e| e.as_map()),
                        "authorization step failed"
                    );
                    state = Some(AuthState::None);
                    last = error;
                    true
                }
                SlotStatus::Cancelled | SlotStatus::Pending => return Err(TdgramError::Shutdown),
            };

            if stalled {
                failures += 1;
                self.check_bound(failures)?;
                tokio::time::sleep(self.config.retry_backoff()).await;
            }
        }
    }

    fn check_bound(&self, failures: u32) -> TdgramResult<()> {
        let limit = self.config.max_consecutive_failures;
        if limit > 0 && failures > limit {
            return Err(TdgramError::AuthRetriesExhausted { attempts: failures });
        }
        Ok(())
    }

    /// The one query to issue in `state`, with its sentinel id
    fn step_query(
        &self,
        state: AuthState,
        prompts: &mut AuthPrompts,
        last: Option<&Update>,
    ) -> TdgramResult<(Query, QueryId)> {
        let query = match state {
            AuthState::None | AuthState::Closing | AuthState::Closed => {
                return Ok((Query::new("getAuthorizationState"), QueryId::from(STATE_QUERY_ID)));
            }
            AuthState::WaitTdlibParameters => self.parameters_query(),
            AuthState::WaitEncryptionKey => Query::new("checkDatabaseEncryptionKey")
                .with("encryption_key", self.params.database_encryption_key.clone()),
            AuthState::WaitPhoneNumber => {
                if prompts.bot_token.is_none() {
                    let answer = ask(&mut prompts.phone, state, "phone number", last)?;
                    if answer.contains(':') {
                        prompts.bot_token = Some(answer);
                    } else {
                        return Ok((
                            Query::new("setAuthenticationPhoneNumber").with("phone_number", answer),
                            QueryId::from(AUTH_UPDATE_TYPE),
                        ));
                    }
                }
                let token = prompts.bot_token.clone().unwrap_or_default();
                Query::new("checkAuthenticationBotToken").with("token", token)
            }
            AuthState::WaitCode => {
                let code = ask(&mut prompts.code, state, "code", last)?;
                Query::new("checkAuthenticationCode").with("code", code)
            }
            AuthState::WaitPassword => {
                let password = ask(&mut prompts.password, state, "password", last)?;
                Query::new("checkAuthenticationPassword").with("password", password)
            }
            AuthState::WaitRegistration => {
                let first_name = ask_once(&mut prompts.first_name, state, "first name", last)?;
                let last_name = ask_once(&mut prompts.last_name, state, "last name", last)?;
                Query::new("registerUser")
                    .with("first_name", first_name)
                    .with("last_name", last_name)
            }
            AuthState::Ready => {
                return Err(TdgramError::Configuration {
                    reason: "no authorization step after ready".to_string(),
                })
            }
        };
        Ok((query, QueryId::from(AUTH_UPDATE_TYPE)))
    }

    /// `setTdlibParameters`, with the parameters both nested and flattened
    fn parameters_query(&self) -> Query {
        let parameters = self.params.backend_parameters(&self.paths);
        let mut query = Query::new("setTdlibParameters").with("parameters", parameters.clone());
        if let Value::Object(fields) = parameters {
            for (key, value) in fields {
                query.insert(key, value);
            }
        }
        query.insert(
            "database_encryption_key",
            self.params.database_encryption_key.clone(),
        );
        query
    }
}
