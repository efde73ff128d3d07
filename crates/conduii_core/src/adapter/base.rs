//! Lifecycle-managing base for adapters.
//!
//! `BaseAdapter` implements the public `Adapter` capabilities and delegates
//! the service-specific work to `AdapterHooks`. The base alone decides
//! whether the adapter is ready, so hook implementations never see a call
//! before `do_initialize` has succeeded.

use super::credentials::CredentialProvider;
use super::{Adapter, ConnectionResult, HealthCheckResult};
use crate::error::AdapterError;
use crate::types::{AdapterConfig, AdapterType};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Everything a hook may consult once the adapter is initialized
pub struct AdapterContext {
    config: AdapterConfig,
    credentials: Arc<dyn CredentialProvider>,
}

impl AdapterContext {
    pub fn new(config: AdapterConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            config,
            credentials,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Adapter-scoped credential first, then the injected provider
    pub fn credential(&self, key: &str) -> Option<String> {
        self.config
            .credentials
            .get(key)
            .cloned()
            .or_else(|| self.credentials.get(key))
    }

    pub fn require_credential(&self, key: &str) -> Result<String, AdapterError> {
        self.credential(key)
            .ok_or_else(|| AdapterError::MissingCredential(key.to_string()))
    }

    pub fn option(&self, key: &str) -> Option<&Value> {
        self.config.options.get(key)
    }
}

/// Service-specific half of an adapter
#[async_trait]
pub trait AdapterHooks: Send + Sync {
    fn adapter_type(&self) -> AdapterType;

    async fn do_initialize(&self, _ctx: &AdapterContext) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn do_health_check(&self, ctx: &AdapterContext)
        -> Result<HealthCheckResult, AdapterError>;

    async fn do_test_connection(&self, ctx: &AdapterContext)
        -> Result<ConnectionResult, AdapterError>;

    async fn do_cleanup(&self, _ctx: &AdapterContext) -> Result<(), AdapterError> {
        Ok(())
    }
}

pub struct BaseAdapter<H> {
    hooks: H,
    credentials: Arc<dyn CredentialProvider>,
    /// `Some` once `do_initialize` succeeded, `None` before and after cleanup
    ready: RwLock<Option<Arc<AdapterContext>>>,
}

impl<H: AdapterHooks> BaseAdapter<H> {
    pub fn new(hooks: H, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            hooks,
            credentials,
            ready: RwLock::new(None),
        }
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub async fn is_initialized(&self) -> bool {
        self.ready.read().await.is_some()
    }

    async fn context(&self) -> Result<Arc<AdapterContext>, AdapterError> {
        self.ready
            .read()
            .await
            .clone()
            .ok_or(AdapterError::NotInitialized)
    }
}

#[async_trait]
impl<H: AdapterHooks> Adapter for BaseAdapter<H> {
    fn adapter_type(&self) -> AdapterType {
        self.hooks.adapter_type()
    }

    async fn initialize(&self, config: AdapterConfig) -> Result<(), AdapterError> {
        let mut ready = self.ready.write().await;
        if ready.is_some() {
            debug!("Adapter {} already initialized", config.name);
            return Ok(());
        }

        let ctx = AdapterContext::new(config, Arc::clone(&self.credentials));
        self.hooks.do_initialize(&ctx).await?;
        debug!("Adapter {} ready", ctx.name());
        *ready = Some(Arc::new(ctx));
        Ok(())
    }

    async fn health_check(&self) -> Result<HealthCheckResult, AdapterError> {
        let ctx = self.context().await?;
        self.hooks.do_health_check(&ctx).await
    }

    async fn test_connection(&self) -> Result<ConnectionResult, AdapterError> {
        let ctx = self.context().await?;
        self.hooks.do_test_connection(&ctx).await
    }

    async fn cleanup(&self) -> Result<(), AdapterError> {
        let ctx = self.ready.write().await.take().ok_or(AdapterError::NotInitialized)?;
        self.hooks.do_cleanup(&ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{FakeAdapter, NoCredentials, StaticCredentialProvider};

    fn config() -> AdapterConfig {
        AdapterConfig::new(AdapterType::Payment, "stripe")
    }

    #[tokio::test]
    async fn test_capabilities_require_initialize() {
        let adapter = BaseAdapter::new(FakeAdapter::healthy(3), Arc::new(NoCredentials));

        assert!(matches!(
            adapter.health_check().await,
            Err(AdapterError::NotInitialized)
        ));
        assert!(matches!(
            adapter.test_connection().await,
            Err(AdapterError::NotInitialized)
        ));
        assert!(matches!(adapter.cleanup().await, Err(AdapterError::NotInitialized)));
        assert_eq!(adapter.hooks().health_calls(), 0);
    }

    #[tokio::test]
    async fn test_initialize_marks_ready() {
        let adapter = BaseAdapter::new(FakeAdapter::healthy(3), Arc::new(NoCredentials));
        adapter.initialize(config()).await.unwrap();
        assert!(adapter.is_initialized().await);

        let health = adapter.health_check().await.unwrap();
        assert!(health.healthy);
        assert_eq!(health.latency, Some(3));
        assert_eq!(adapter.hooks().init_calls(), 1);

        // Second initialize is a no-op
        adapter.initialize(config()).await.unwrap();
        assert_eq!(adapter.hooks().init_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_initialize_stays_uninitialized() {
        let adapter = BaseAdapter::new(
            FakeAdapter::healthy(3).failing_init("bad key"),
            Arc::new(NoCredentials),
        );
        assert!(adapter.initialize(config()).await.is_err());
        assert!(!adapter.is_initialized().await);
        assert!(matches!(
            adapter.health_check().await,
            Err(AdapterError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_cleanup_returns_to_uninitialized() {
        let adapter = BaseAdapter::new(FakeAdapter::healthy(3), Arc::new(NoCredentials));
        adapter.initialize(config()).await.unwrap();
        adapter.cleanup().await.unwrap();
        assert!(matches!(
            adapter.health_check().await,
            Err(AdapterError::NotInitialized)
        ));
    }

    #[test]
    fn test_credential_fallback_order() {
        let provider = StaticCredentialProvider::new()
            .with("STRIPE_SECRET_KEY", "from-provider")
            .with("STRIPE_WEBHOOK_SECRET", "whsec_provider");
        let ctx = AdapterContext::new(
            config().with_credential("STRIPE_SECRET_KEY", "from-config"),
            Arc::new(provider),
        );

        assert_eq!(ctx.credential("STRIPE_SECRET_KEY").as_deref(), Some("from-config"));
        assert_eq!(
            ctx.credential("STRIPE_WEBHOOK_SECRET").as_deref(),
            Some("whsec_provider")
        );
        assert!(ctx.credential("MISSING").is_none());
        assert!(matches!(
            ctx.require_credential("MISSING"),
            Err(AdapterError::MissingCredential(key)) if key == "MISSING"
        ));
    }
}
