//! Authentication handshake against a scripted backend

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{auth_backend, start_client, user_login_step, Step};
use serde_json::json;
use tdgram_core::AuthConfig;
use tdgram_runtime::{AuthPrompts, AuthState, Prompt, Settings, TdgramError};

#[tokio::test]
async fn test_user_login_issues_one_query_per_state() {
    let transport = Arc::new(auth_backend(
        "authorizationStateWaitTdlibParameters",
        false,
        user_login_step,
    ));
    let client = start_client(transport.clone(), Settings::testing());
    let mut prompts = AuthPrompts::user("+15550100", "12345");

    let state = client.authorize(&mut prompts).await.unwrap();

    assert_eq!(state, AuthState::Ready);
    assert_eq!(
        transport.sent_types(),
        vec![
            "getAuthorizationState",
            "setTdlibParameters",
            "checkDatabaseEncryptionKey",
            "setAuthenticationPhoneNumber",
            "checkAuthenticationCode",
        ]
    );

    let sent = transport.sent_queries();
    assert_eq!(sent[0].get("@extra"), Some(&json!({"query_id": "getAuthorizationState"})));
    for step in &sent[1..] {
        assert_eq!(step.get("@extra"), Some(&json!({"query_id": "updateAuthorizationState"})));
    }
    assert_eq!(sent[2].get("encryption_key"), Some(&json!("secret")));
    assert_eq!(sent[3].get("phone_number"), Some(&json!("+15550100")));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_acknowledged_steps_requery_state() {
    let transport = Arc::new(auth_backend(
        "authorizationStateWaitTdlibParameters",
        true,
        user_login_step,
    ));
    let client = start_client(transport.clone(), Settings::testing());

    let state = client.authorize(&mut AuthPrompts::bot("42:token")).await.unwrap();

    assert_eq!(state, AuthState::Ready);
    assert_eq!(
        transport.sent_types(),
        vec![
            "getAuthorizationState",
            "setTdlibParameters",
            "getAuthorizationState",
            "checkDatabaseEncryptionKey",
            "getAuthorizationState",
            "checkAuthenticationBotToken",
            "getAuthorizationState",
        ]
    );

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_tdlib_parameters_are_nested_and_flat() {
    let transport = Arc::new(auth_backend(
        "authorizationStateWaitTdlibParameters",
        false,
        user_login_step,
    ));
    let client = start_client(transport.clone(), Settings::testing());

    client.authorize(&mut AuthPrompts::bot("1:abc")).await.unwrap();

    let params = transport
        .sent_queries()
        .into_iter()
        .find(|query| query.type_name() == "setTdlibParameters")
        .unwrap();
    assert_eq!(params.get("api_id"), Some(&json!(12345)));
    assert_eq!(params.get("api_hash"), Some(&json!("0123456789abcdef")));
    assert_eq!(params.get("database_encryption_key"), Some(&json!("secret")));
    assert_eq!(params.get("files_directory"), Some(&json!(".app-data/test-session")));
    let nested = params.get("parameters").unwrap();
    assert_eq!(nested["database_directory"], json!(".app-data/test-session/database"));
    assert_eq!(nested["use_message_database"], json!(true));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_phone_answer_with_colon_logs_in_as_bot() {
    let transport = Arc::new(auth_backend("authorizationStateWaitPhoneNumber", false, user_login_step));
    let client = start_client(transport.clone(), Settings::testing());
    let mut prompts = AuthPrompts::user("123456:ABC-DEF", "unused");

    client.authorize(&mut prompts).await.unwrap();

    let sent = transport.sent_queries();
    assert_eq!(sent[1].type_name(), "checkAuthenticationBotToken");
    assert_eq!(sent[1].get("token"), Some(&json!("123456:ABC-DEF")));
    assert!(!transport.sent_types().contains(&"setAuthenticationPhoneNumber".to_string()));
    assert_eq!(prompts.bot_token.as_deref(), Some("123456:ABC-DEF"));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_wrong_code_is_retried() {
    let transport = Arc::new(auth_backend("authorizationStateWaitCode", false, user_login_step));
    let client = start_client(transport.clone(), Settings::testing());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let code = {
        let seen = seen.clone();
        let mut attempts = 0;
        Prompt::provider(move |last| {
            seen.lock().unwrap().push(last.map(AuthState::from_update));
            attempts += 1;
            let code = if attempts == 1 { "00000" } else { "12345" };
            Ok(code.to_string())
        })
    };
    let mut prompts = AuthPrompts {
        code: Some(code),
        ..AuthPrompts::default()
    };

    let state = client.authorize(&mut prompts).await.unwrap();

    assert_eq!(state, AuthState::Ready);
    assert_eq!(
        transport.sent_types(),
        vec![
            "getAuthorizationState",
            "checkAuthenticationCode",
            "getAuthorizationState",
            "checkAuthenticationCode",
        ]
    );
    // The code prompt sees the response that led to it each time
    assert_eq!(
        *seen.lock().unwrap(),
        vec![Some(AuthState::WaitCode), Some(AuthState::WaitCode)]
    );

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_registration_names_are_asked_once() {
    let registrations = Arc::new(AtomicUsize::new(0));
    let transport = {
        let registrations = registrations.clone();
        Arc::new(auth_backend("authorizationStateWaitRegistration", false, move |query| {
            match query.type_name() {
                "registerUser" if registrations.fetch_add(1, Ordering::SeqCst) == 0 => {
                    Step::Fail("FIRSTNAME_INVALID")
                }
                "registerUser" => Step::Move("authorizationStateReady"),
                _ => Step::Ignore,
            }
        }))
    };
    let client = start_client(transport.clone(), Settings::testing());

    let asked = Arc::new(AtomicUsize::new(0));
    let first_name = {
        let asked = asked.clone();
        Prompt::provider(move |_| {
            asked.fetch_add(1, Ordering::SeqCst);
            Ok("Ada".to_string())
        })
    };
    let mut prompts = AuthPrompts::default().with_names(first_name, "Lovelace");

    client.authorize(&mut prompts).await.unwrap();

    assert_eq!(registrations.load(Ordering::SeqCst), 2);
    assert_eq!(asked.load(Ordering::SeqCst), 1);
    let register = transport
        .sent_queries()
        .into_iter()
        .rfind(|query| query.type_name() == "registerUser")
        .unwrap();
    assert_eq!(register.get("first_name"), Some(&json!("Ada")));
    assert_eq!(register.get("last_name"), Some(&json!("Lovelace")));

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_persistent_errors_exhaust_retries() {
    let transport = Arc::new(auth_backend("authorizationStateWaitEncryptionKey", false, |query| {
        match query.type_name() {
            "checkDatabaseEncryptionKey" => Step::Fail("DATABASE_ENCRYPTION_KEY_INVALID"),
            _ => Step::Ignore,
        }
    }));
    let settings = Settings {
        auth: AuthConfig {
            max_consecutive_failures: 3,
            retry_backoff_ms: 0,
        },
        ..Settings::testing()
    };
    let client = start_client(transport.clone(), settings);

    let err = client.authorize(&mut AuthPrompts::default()).await.unwrap_err();

    assert!(matches!(err, TdgramError::AuthRetriesExhausted { attempts: 4 }));
    let attempts = transport
        .sent_types()
        .iter()
        .filter(|name| name.as_str() == "checkDatabaseEncryptionKey")
        .count();
    assert_eq!(attempts, 4);

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_prompt_failure_aborts() {
    let transport = Arc::new(auth_backend("authorizationStateWaitCode", false, user_login_step));
    let client = start_client(transport, Settings::testing());
    let mut prompts = AuthPrompts {
        code: Some(Prompt::provider(|_| anyhow::bail!("stdin closed"))),
        ..AuthPrompts::default()
    };

    let err = client.authorize(&mut prompts).await.unwrap_err();

    match err {
        TdgramError::Prompt { state, reason } => {
            assert_eq!(state, "authorizationStateWaitCode");
            assert!(reason.contains("stdin closed"));
        }
        other => panic!("unexpected error: {other}"),
    }

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_password_step_after_code() {
    let transport = Arc::new(auth_backend("authorizationStateWaitCode", false, |query| {
        match query.type_name() {
            "checkAuthenticationCode" => Step::Move("authorizationStateWaitPassword"),
            "checkAuthenticationPassword" if query.get("password") == Some(&json!("hunter2")) => {
                Step::Move("authorizationStateReady")
            }
            "checkAuthenticationPassword" => Step::Fail("PASSWORD_HASH_INVALID"),
            _ => Step::Ignore,
        }
    }));
    let client = start_client(transport.clone(), Settings::testing());

    let seen = Arc::new(Mutex::new(Vec::new()));
    let password = {
        let seen = seen.clone();
        Prompt::provider(move |last| {
            let last = last.expect("password prompt gets the response that asked for it");
            seen.lock().unwrap().push((AuthState::from_update(last), last.type_name().to_string()));
            Ok("hunter2".to_string())
        })
    };
    let mut prompts = AuthPrompts::user("+15550100", "12345").with_password(password);

    let state = client.authorize(&mut prompts).await.unwrap();

    assert_eq!(state, AuthState::Ready);
    assert_eq!(
        transport.sent_types(),
        vec![
            "getAuthorizationState",
            "checkAuthenticationCode",
            "checkAuthenticationPassword",
        ]
    );
    let sent = transport.sent_queries();
    assert_eq!(sent[2].get("password"), Some(&json!("hunter2")));
    assert_eq!(sent[2].get("@extra"), Some(&json!({"query_id": "updateAuthorizationState"})));
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(AuthState::WaitPassword, "updateAuthorizationState".to_string())]
    );

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_closed_backend_exhausts_retries() {
    let transport = Arc::new(auth_backend("authorizationStateClosed", false, |_| Step::Ignore));
    let settings = Settings {
        auth: AuthConfig {
            max_consecutive_failures: 3,
            retry_backoff_ms: 0,
        },
        ..Settings::testing()
    };
    let client = start_client(transport.clone(), settings);

    let err = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        client.authorize(&mut AuthPrompts::default()),
    )
    .await
    .expect("a closed backend must not spin forever")
    .unwrap_err();

    assert!(matches!(err, TdgramError::AuthRetriesExhausted { attempts: 4 }));
    assert_eq!(transport.sent_types(), vec!["getAuthorizationState"; 4]);

    client.stop().await.unwrap();
}

#[tokio::test]
async fn test_closed_state_backs_off_between_queries() {
    let transport = Arc::new(auth_backend("authorizationStateClosing", false, |_| Step::Ignore));
    let settings = Settings {
        auth: AuthConfig {
            max_consecutive_failures: 2,
            retry_backoff_ms: 30,
        },
        ..Settings::testing()
    };
    let client = start_client(transport.clone(), settings);

    let started = std::time::Instant::now();
    let err = client.authorize(&mut AuthPrompts::default()).await.unwrap_err();

    assert!(matches!(err, TdgramError::AuthRetriesExhausted { attempts: 3 }));
    // Two backoffs precede the third, failing answer
    assert!(started.elapsed() >= std::time::Duration::from_millis(60));
    assert_eq!(transport.sent_types().len(), 3);

    client.stop().await.unwrap();
}
