//! Adapter Contract
//!
//! Every pluggable service integration (database, auth, payment, ...)
//! implements `Adapter`. Concrete integrations live outside this crate;
//! most of them should wrap their logic in `BaseAdapter`, which owns the
//! lifecycle state and credential lookup.

mod base;
mod credentials;
mod fake;

pub use base::{AdapterContext, AdapterHooks, BaseAdapter};
pub use credentials::{
    CredentialProvider, EnvCredentialProvider, NoCredentials, StaticCredentialProvider,
};
pub use fake::{FakeAdapter, FakeResponse};

use crate::error::AdapterError;
use crate::types::{AdapterConfig, AdapterType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of an adapter health check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    /// Milliseconds, as measured by the adapter itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthCheckResult {
    pub fn healthy(latency: u64) -> Self {
        Self {
            healthy: true,
            latency: Some(latency),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            latency: None,
            error: Some(error.into()),
        }
    }
}

/// Result of an adapter connection test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionResult {
    pub connected: bool,
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionResult {
    pub fn ok() -> Self {
        Self {
            connected: true,
            authenticated: true,
            error: None,
        }
    }

    pub fn failed(connected: bool, error: impl Into<String>) -> Self {
        Self {
            connected,
            authenticated: false,
            error: Some(error.into()),
        }
    }
}

/// Capability set of a service integration.
///
/// Capabilities called before `initialize` has completed fail with
/// `AdapterError::NotInitialized`.
#[async_trait]
pub trait Adapter: Send + Sync {
    fn adapter_type(&self) -> AdapterType;

    async fn initialize(&self, config: AdapterConfig) -> Result<(), AdapterError>;

    async fn health_check(&self) -> Result<HealthCheckResult, AdapterError>;

    async fn test_connection(&self) -> Result<ConnectionResult, AdapterError>;

    async fn cleanup(&self) -> Result<(), AdapterError>;
}

/// Builds adapters for configs declared in `ConduiiConfig.adapters`
pub trait AdapterFactory: Send + Sync {
    /// `None` when this factory has no integration for the config
    fn create(
        &self,
        config: &AdapterConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Option<Arc<dyn Adapter>>;
}

// ============================================================================
// Registry
// ============================================================================

/// A registered adapter and the config it was initialized with
#[derive(Clone)]
pub struct RegisteredAdapter {
    pub config: AdapterConfig,
    pub adapter: Arc<dyn Adapter>,
}

/// Adapters keyed by unique name, kept in registration order
#[derive(Default, Clone)]
pub struct AdapterRegistry {
    entries: Vec<RegisteredAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        config: AdapterConfig,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), AdapterError> {
        if self.contains(&config.name) {
            return Err(AdapterError::DuplicateName(config.name));
        }
        self.entries.push(RegisteredAdapter { config, adapter });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.config.name == name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Adapter>> {
        self.entries
            .iter()
            .find(|e| e.config.name == name)
            .map(|e| Arc::clone(&e.adapter))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAdapter> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.config.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake(name: &str) -> (AdapterConfig, Arc<dyn Adapter>) {
        (
            AdapterConfig::new(AdapterType::Database, name),
            Arc::new(BaseAdapter::new(FakeAdapter::healthy(5), Arc::new(NoCredentials))),
        )
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let mut registry = AdapterRegistry::new();
        let (config, adapter) = fake("postgres");
        registry.register(config, adapter).unwrap();

        let (config, adapter) = fake("postgres");
        let err = registry.register(config, adapter).unwrap_err();
        assert!(matches!(err, AdapterError::DuplicateName(name) if name == "postgres"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_keeps_registration_order() {
        let mut registry = AdapterRegistry::new();
        for name in ["stripe", "clerk", "postgres"] {
            let (config, adapter) = fake(name);
            registry.register(config, adapter).unwrap();
        }
        assert_eq!(registry.names(), vec!["stripe", "clerk", "postgres"]);
        assert!(registry.get("clerk").is_some());
        assert!(registry.get("mysql").is_none());
    }
}
