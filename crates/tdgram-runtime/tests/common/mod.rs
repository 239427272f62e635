//! Shared helpers for runtime integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use tdgram_core::{MemoryTransport, Query, Update};
use tdgram_runtime::{Client, ClientBuilder, ClientParams, Settings};

pub fn params() -> ClientParams {
    ClientParams::new(12345, "0123456789abcdef", "secret")
}

pub fn start_client(transport: Arc<MemoryTransport>, settings: Settings) -> Client {
    ClientBuilder::new("test-session", params())
        .with_settings(settings)
        .with_transport(transport)
        .build()
        .expect("client should start")
}

pub fn update(value: Value) -> Update {
    Update::from_value(value).expect("update must be a JSON object")
}

/// A backend response echoing the query's `@extra`
pub fn reply(query: &Query, mut body: Value) -> Update {
    if let Some(extra) = query.get("@extra") {
        body["@extra"] = extra.clone();
    }
    update(body)
}

pub fn auth_update(state: &str) -> Update {
    update(json!({
        "@type": "updateAuthorizationState",
        "authorization_state": {"@type": state}
    }))
}

/// Poll `condition` until it holds or a second passes
pub async fn eventually<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// ----------------------------------------------------------------------------
// Scripted Authentication Backend
// ----------------------------------------------------------------------------

/// How the scripted backend reacts to one authentication step
pub enum Step {
    Move(&'static str),
    Fail(&'static str),
    Ignore,
}

/// Backend that answers `getAuthorizationState` with its current state and
/// moves between states as `step` dictates
///
/// With `ack` each accepted step is answered with `ok` before the
/// `updateAuthorizationState` push, as the real backend does.
pub fn auth_backend<F>(initial: &'static str, ack: bool, step: F) -> MemoryTransport
where
    F: Fn(&Query) -> Step + Send + Sync + 'static,
{
    let state = Mutex::new(initial);
    MemoryTransport::with_responder(move |query| {
        let mut state = state.lock().unwrap();
        if query.type_name() == "getAuthorizationState" {
            return vec![reply(query, json!({ "@type": *state }))];
        }
        match step(query) {
            Step::Move(next) => {
                *state = next;
                let mut updates = Vec::new();
                if ack {
                    updates.push(reply(query, json!({"@type": "ok"})));
                }
                updates.push(auth_update(next));
                updates
            }
            Step::Fail(message) => vec![reply(
                query,
                json!({"@type": "error", "code": 400, "message": message}),
            )],
            Step::Ignore => Vec::new(),
        }
    })
}

/// The standard user login path
pub fn user_login_step(query: &Query) -> Step {
    match query.type_name() {
        "setTdlibParameters" => Step::Move("authorizationStateWaitEncryptionKey"),
        "checkDatabaseEncryptionKey" => Step::Move("authorizationStateWaitPhoneNumber"),
        "setAuthenticationPhoneNumber" => Step::Move("authorizationStateWaitCode"),
        "checkAuthenticationBotToken" => Step::Move("authorizationStateReady"),
        "checkAuthenticationCode" => {
            if query.get("code") == Some(&json!("12345")) {
                Step::Move("authorizationStateReady")
            } else {
                Step::Fail("PHONE_CODE_INVALID")
            }
        }
        _ => Step::Ignore,
    }
}
