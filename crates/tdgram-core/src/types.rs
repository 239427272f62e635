//! JSON objects exchanged with the backend
//!
//! The backend schema is treated opaquely apart from three conventional fields:
//! `@type`, the `@extra.query_id` correlation metadata and the nested
//! `authorization_state` descriptor.

use core::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::errors::{TdgramError, TdgramResult};

// ----------------------------------------------------------------------------
// Well-known Fields
// ----------------------------------------------------------------------------

/// Discriminator carried by every query and update
pub const TYPE_FIELD: &str = "@type";
/// Metadata object echoed back by the backend on responses
pub const EXTRA_FIELD: &str = "@extra";
/// Correlation key inside [`EXTRA_FIELD`]
pub const QUERY_ID_FIELD: &str = "query_id";
/// Nested state descriptor on authorization updates
pub const AUTH_STATE_FIELD: &str = "authorization_state";
/// `@type` of backend error responses
pub const ERROR_TYPE: &str = "error";
/// `@type` of authorization state push updates
pub const AUTH_UPDATE_TYPE: &str = "updateAuthorizationState";

// ----------------------------------------------------------------------------
// Correlation Identifier
// ----------------------------------------------------------------------------

/// Token linking an outgoing query to its eventual response
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryId {
    Number(i64),
    Text(String),
}

impl QueryId {
    /// Fresh random identifier (UUIDv4, simple hex form)
    pub fn generate() -> Self {
        QueryId::Text(Uuid::new_v4().simple().to_string())
    }

    /// Read an identifier from a JSON value; empty strings do not count
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(QueryId::Text(s.clone())),
            Value::Number(n) => n.as_i64().map(QueryId::Number),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            QueryId::Number(n) => Value::from(*n),
            QueryId::Text(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryId::Number(n) => write!(f, "{}", n),
            QueryId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for QueryId {
    fn from(value: &str) -> Self {
        QueryId::Text(value.to_string())
    }
}

impl From<String> for QueryId {
    fn from(value: String) -> Self {
        QueryId::Text(value)
    }
}

impl From<i64> for QueryId {
    fn from(value: i64) -> Self {
        QueryId::Number(value)
    }
}

// ----------------------------------------------------------------------------
// Query
// ----------------------------------------------------------------------------

/// Outgoing request object; always carries `@type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(Map<String, Value>);

impl Query {
    /// Create a query of the given type with no other fields
    pub fn new(type_name: impl Into<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(TYPE_FIELD.to_string(), Value::String(type_name.into()));
        Self(fields)
    }

    /// Builder-style field setter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Accept an arbitrary JSON value as a query, rejecting anything without `@type`
    pub fn from_value(value: Value) -> TdgramResult<Self> {
        match value {
            Value::Object(fields) => {
                if fields.get(TYPE_FIELD).and_then(Value::as_str).is_none() {
                    return Err(TdgramError::Configuration {
                        reason: format!("query is missing a string '{}' field", TYPE_FIELD),
                    });
                }
                Ok(Self(fields))
            }
            other => Err(TdgramError::Configuration {
                reason: format!("query must be a JSON object, got {}", other),
            }),
        }
    }

    pub fn type_name(&self) -> &str {
        self.0.get(TYPE_FIELD).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Stamp the correlation identifier into `@extra.query_id`
    ///
    /// Existing `@extra` keys are preserved; a non-object `@extra` is replaced.
    pub fn set_query_id(&mut self, query_id: &QueryId) {
        let extra = self
            .0
            .entry(EXTRA_FIELD.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !extra.is_object() {
            *extra = Value::Object(Map::new());
        }
        if let Value::Object(extra) = extra {
            extra.insert(QUERY_ID_FIELD.to_string(), query_id.to_value());
        }
    }

    pub fn query_id(&self) -> Option<QueryId> {
        extra_query_id(&self.0)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn to_json(&self) -> TdgramResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

// ----------------------------------------------------------------------------
// Update
// ----------------------------------------------------------------------------

/// Incoming object from the backend: a correlated response or a push update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Update(Map<String, Value>);

impl Update {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Accept an arbitrary JSON value as an update; non-objects are rejected
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Parse the raw JSON text produced by the backend
    pub fn from_json(text: &str) -> TdgramResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value).ok_or_else(|| TdgramError::Configuration {
            reason: "backend produced a non-object update".to_string(),
        })
    }

    pub fn type_name(&self) -> &str {
        self.0.get(TYPE_FIELD).and_then(Value::as_str).unwrap_or_default()
    }

    pub fn is_error(&self) -> bool {
        self.type_name() == ERROR_TYPE
    }

    /// Correlation identifier from `@extra.query_id`, if any
    pub fn query_id(&self) -> Option<QueryId> {
        extra_query_id(&self.0)
    }

    /// `@type` of the nested `authorization_state` descriptor, if present
    pub fn authorization_state_type(&self) -> Option<&str> {
        self.0
            .get(AUTH_STATE_FIELD)
            .and_then(|state| state.get(TYPE_FIELD))
            .and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn extra_query_id(fields: &Map<String, Value>) -> Option<QueryId> {
    fields
        .get(EXTRA_FIELD)
        .and_then(Value::as_object)
        .and_then(|extra| extra.get(QUERY_ID_FIELD))
        .and_then(QueryId::from_value)
}
