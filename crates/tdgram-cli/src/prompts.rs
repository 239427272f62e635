//! Interactive authentication prompts
//!
//! Configured `[login]` values are used as-is; anything missing is read from
//! stdin when the backend asks for it.

use std::io::{self, BufRead, Write};

use anyhow::Context;
use serde_json::Value;
use tdgram_runtime::{AuthPrompts, Prompt, Update};
use tokio::runtime::RuntimeFlavor;

use crate::config::LoginConfig;

pub fn build_prompts(login: &LoginConfig) -> AuthPrompts {
    AuthPrompts {
        bot_token: login.bot_token.clone(),
        phone: Some(configured_or(&login.phone_number, || {
            stdin_prompt("Phone number or bot token", |_| None)
        })),
        code: Some(stdin_prompt("Login code", code_hint)),
        password: Some(configured_or(&login.password, || {
            stdin_prompt("Password", password_hint)
        })),
        first_name: Some(configured_or(&login.first_name, || {
            stdin_prompt("First name", |_| None)
        })),
        last_name: Some(configured_or(&login.last_name, || {
            stdin_prompt("Last name", |_| None)
        })),
    }
}

fn configured_or(value: &Option<String>, fallback: impl FnOnce() -> Prompt) -> Prompt {
    match value {
        Some(value) => Prompt::literal(value.clone()),
        None => fallback(),
    }
}

/// Prompt on stderr and read one line from stdin
pub fn stdin_prompt(label: &'static str, hint: fn(&Update) -> Option<String>) -> Prompt {
    Prompt::provider(move |last| {
        let hint = last.and_then(hint);
        let mut stderr = io::stderr();
        match hint {
            Some(hint) => write!(stderr, "{} ({}): ", label, hint)?,
            None => write!(stderr, "{}: ", label)?,
        }
        stderr.flush()?;

        let mut line = String::new();
        let read = off_runtime(|| io::stdin().lock().read_line(&mut line))
            .with_context(|| format!("failed to read {}", label.to_lowercase()))?;
        if read == 0 {
            anyhow::bail!("stdin closed while reading {}", label.to_lowercase());
        }
        Ok(line.trim().to_string())
    })
}

/// Run a blocking read, moving other tasks off this worker when possible
///
/// Providers are called from inside the async handshake. On a multi-thread
/// runtime `block_in_place` keeps the listener running while stdin blocks; on
/// a current-thread runtime the whole runtime waits for the read.
fn off_runtime<T>(read: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(read)
        }
        _ => read(),
    }
}

/// Where the code was sent, from the state that asked for it
fn code_hint(last: &Update) -> Option<String> {
    let state = last.get("authorization_state").unwrap_or(&Value::Null);
    let info = state.get("code_info").or_else(|| last.get("code_info"))?;
    info.pointer("/type/@type")
        .and_then(Value::as_str)
        .map(|kind| format!("sent via {}", kind))
}

fn password_hint(last: &Update) -> Option<String> {
    let state = last.get("authorization_state").unwrap_or(&Value::Null);
    state
        .get("password_hint")
        .or_else(|| last.get("password_hint"))
        .and_then(Value::as_str)
        .filter(|hint| !hint.is_empty())
        .map(|hint| format!("hint: {}", hint))
}
