//! Fake adapter hooks for deterministic testing.
//!
//! Scripted health and connection responses, an optional artificial delay,
//! and call counters for assertions. No network access.
//!
//! ```rust,ignore
//! let adapter = Arc::new(BaseAdapter::new(FakeAdapter::healthy(12), Arc::new(NoCredentials)));
//! adapter.initialize(AdapterConfig::new(AdapterType::Database, "postgres")).await?;
//! assert_eq!(adapter.health_check().await?.latency, Some(12));
//! ```

use super::base::{AdapterContext, AdapterHooks};
use super::{ConnectionResult, HealthCheckResult};
use crate::error::AdapterError;
use crate::types::AdapterType;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted response: a value, or an error raised by the adapter
#[derive(Debug, Clone)]
pub enum FakeResponse<T> {
    Ok(T),
    Fail(String),
}

impl<T: Clone> FakeResponse<T> {
    fn resolve(&self) -> Result<T, AdapterError> {
        match self {
            FakeResponse::Ok(value) => Ok(value.clone()),
            FakeResponse::Fail(message) => Err(AdapterError::Service(message.clone())),
        }
    }
}

pub struct FakeAdapter {
    adapter_type: AdapterType,
    health: FakeResponse<HealthCheckResult>,
    connection: FakeResponse<ConnectionResult>,
    init_error: Option<String>,
    delay: Option<Duration>,
    init_calls: AtomicUsize,
    health_calls: AtomicUsize,
    connection_calls: AtomicUsize,
    cleanup_calls: AtomicUsize,
}

impl FakeAdapter {
    pub fn new(health: FakeResponse<HealthCheckResult>) -> Self {
        Self {
            adapter_type: AdapterType::Custom,
            health,
            connection: FakeResponse::Ok(ConnectionResult::ok()),
            init_error: None,
            delay: None,
            init_calls: AtomicUsize::new(0),
            health_calls: AtomicUsize::new(0),
            connection_calls: AtomicUsize::new(0),
            cleanup_calls: AtomicUsize::new(0),
        }
    }

    /// Reports healthy with the given latency
    pub fn healthy(latency: u64) -> Self {
        Self::new(FakeResponse::Ok(HealthCheckResult::healthy(latency)))
    }

    /// Reports `healthy: false`
    pub fn unhealthy(error: &str) -> Self {
        Self::new(FakeResponse::Ok(HealthCheckResult::unhealthy(error)))
    }

    /// Health check raises an error
    pub fn failing(error: &str) -> Self {
        Self::new(FakeResponse::Fail(error.to_string()))
    }

    pub fn with_type(mut self, adapter_type: AdapterType) -> Self {
        self.adapter_type = adapter_type;
        self
    }

    pub fn with_connection(mut self, connection: FakeResponse<ConnectionResult>) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_init(mut self, error: &str) -> Self {
        self.init_error = Some(error.to_string());
        self
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub fn connection_calls(&self) -> usize {
        self.connection_calls.load(Ordering::SeqCst)
    }

    pub fn cleanup_calls(&self) -> usize {
        self.cleanup_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl AdapterHooks for FakeAdapter {
    fn adapter_type(&self) -> AdapterType {
        self.adapter_type
    }

    async fn do_initialize(&self, _ctx: &AdapterContext) -> Result<(), AdapterError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        match &self.init_error {
            Some(error) => Err(AdapterError::Initialization(error.clone())),
            None => Ok(()),
        }
    }

    async fn do_health_check(&self, _ctx: &AdapterContext) -> Result<HealthCheckResult, AdapterError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.health.resolve()
    }

    async fn do_test_connection(&self, _ctx: &AdapterContext) -> Result<ConnectionResult, AdapterError> {
        self.connection_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        self.connection.resolve()
    }

    async fn do_cleanup(&self, _ctx: &AdapterContext) -> Result<(), AdapterError> {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
