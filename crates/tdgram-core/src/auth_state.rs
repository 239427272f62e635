//! Authentication handshake states reported by the backend

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Update;

/// Backend authentication step
///
/// [`AuthState::None`] is the deliberate fallback for any state name the
/// client does not recognise; it makes the handshake re-query the current
/// state instead of aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthState {
    None,
    WaitTdlibParameters,
    WaitEncryptionKey,
    WaitPhoneNumber,
    WaitCode,
    WaitPassword,
    WaitRegistration,
    Ready,
    Closing,
    Closed,
}

impl AuthState {
    /// Map a backend `authorizationState*` type name; unknown names fold to `None`
    pub fn from_type_name(name: &str) -> Self {
        match name {
            "authorizationStateWaitTdlibParameters" => AuthState::WaitTdlibParameters,
            "authorizationStateWaitEncryptionKey" => AuthState::WaitEncryptionKey,
            "authorizationStateWaitPhoneNumber" => AuthState::WaitPhoneNumber,
            "authorizationStateWaitCode" => AuthState::WaitCode,
            "authorizationStateWaitPassword" => AuthState::WaitPassword,
            "authorizationStateWaitRegistration" => AuthState::WaitRegistration,
            "authorizationStateReady" => AuthState::Ready,
            "authorizationStateClosing" => AuthState::Closing,
            "authorizationStateClosed" => AuthState::Closed,
            _ => AuthState::None,
        }
    }

    /// Derive the state from a response: nested `authorization_state.@type`
    /// first, then the update's own `@type`
    pub fn from_update(update: &Update) -> Self {
        match update.authorization_state_type() {
            Some(name) => Self::from_type_name(name),
            None => Self::from_type_name(update.type_name()),
        }
    }

    /// Backend type name, absent for the `None` fallback
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            AuthState::None => None,
            AuthState::WaitTdlibParameters => Some("authorizationStateWaitTdlibParameters"),
            AuthState::WaitEncryptionKey => Some("authorizationStateWaitEncryptionKey"),
            AuthState::WaitPhoneNumber => Some("authorizationStateWaitPhoneNumber"),
            AuthState::WaitCode => Some("authorizationStateWaitCode"),
            AuthState::WaitPassword => Some("authorizationStateWaitPassword"),
            AuthState::WaitRegistration => Some("authorizationStateWaitRegistration"),
            AuthState::Ready => Some("authorizationStateReady"),
            AuthState::Closing => Some("authorizationStateClosing"),
            AuthState::Closed => Some("authorizationStateClosed"),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, AuthState::Ready)
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name().unwrap_or("none"))
    }
}
