//! Credential providers injected into adapters.
//!
//! Adapters never read process-wide state directly; the fallback to the
//! environment is an explicit `EnvCredentialProvider`.

use std::collections::HashMap;

pub trait CredentialProvider: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads process environment variables
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialProvider;

impl CredentialProvider for EnvCredentialProvider {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed key/value credentials
#[derive(Debug, Default, Clone)]
pub struct StaticCredentialProvider {
    values: HashMap<String, String>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Provides nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }
}
