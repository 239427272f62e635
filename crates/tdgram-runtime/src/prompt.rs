//! Prompts supplying authentication inputs
//!
//! A prompt is either a fixed value or a provider invoked with the last
//! response the backend sent, so interactive hosts can show context.

use std::fmt;

use tdgram_core::Update;

pub type PromptProvider = Box<dyn FnMut(Option<&Update>) -> anyhow::Result<String> + Send>;

pub enum Prompt {
    Literal(String),
    Provider(PromptProvider),
}

impl Prompt {
    pub fn literal(value: impl Into<String>) -> Self {
        Prompt::Literal(value.into())
    }

    pub fn provider<F>(provider: F) -> Self
    where
        F: FnMut(Option<&Update>) -> anyhow::Result<String> + Send + 'static,
    {
        Prompt::Provider(Box::new(provider))
    }

    /// Produce a value; providers run on every call
    pub fn resolve(&mut self, last: Option<&Update>) -> anyhow::Result<String> {
        match self {
            Prompt::Literal(value) => Ok(value.clone()),
            Prompt::Provider(provider) => provider(last),
        }
    }

    /// Produce a value and replace a provider with its answer
    pub fn resolve_once(&mut self, last: Option<&Update>) -> anyhow::Result<String> {
        let value = self.resolve(last)?;
        *self = Prompt::Literal(value.clone());
        Ok(value)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Prompt::Literal(_))
    }
}

impl fmt::Debug for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Literal values may be secrets
        match self {
            Prompt::Literal(_) => f.write_str("Prompt::Literal(..)"),
            Prompt::Provider(_) => f.write_str("Prompt::Provider(..)"),
        }
    }
}

impl From<&str> for Prompt {
    fn from(value: &str) -> Self {
        Prompt::literal(value)
    }
}

impl From<String> for Prompt {
    fn from(value: String) -> Self {
        Prompt::Literal(value)
    }
}
