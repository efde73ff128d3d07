//! Orchestrator
//!
//! Owns the validated configuration, the adapter registry, the test runner
//! and the event bus. Wires discovery output into the runner, exposes the
//! suite entry points and classifies failures.
//!
//! Lifecycle:
//! 1. `new` / `from_raw` (validation errors surface here)
//! 2. `initialize` (idempotent): configured adapters, `system-health`,
//!    discovery when `autoDiscover`
//! 3. `run_*` / `health_check` / `diagnose`, any number of times
//! 4. `cleanup`

pub mod builtin;
pub mod diagnose;
pub mod events;

pub use builtin::{DEFAULT_MAX_RESPONSE_TIME_MS, SYSTEM_HEALTH_TEST_ID};
pub use events::{EventBus, OrchestratorEvent, Subscription};

use crate::adapter::{
    Adapter, AdapterFactory, AdapterRegistry, CredentialProvider, EnvCredentialProvider,
    RegisteredAdapter,
};
use crate::config::{ConduiiConfig, RawConfig};
use crate::discovery::{DiscoveryEngine, DiscoveryOptions, DiscoveryResult};
use crate::error::{AdapterError, ConduiiError, ConfigError, DiscoveryError, RunnerError};
use crate::runner::{panic_message, RunOptions, TestFn, TestRunner};
use crate::types::{
    AdapterConfig, DiagnosticResult, HealthReport, ServiceHealth, ServiceStatus, Severity,
    TestConfig, TestSuiteResult, TestType,
};
use builtin::SharedAdapters;
use chrono::Utc;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub struct Orchestrator {
    config: ConduiiConfig,
    credentials: Arc<dyn CredentialProvider>,
    factories: Vec<Arc<dyn AdapterFactory>>,
    adapters: SharedAdapters,
    runner: TestRunner,
    discovery: DiscoveryEngine,
    events: EventBus,
    http: reqwest::Client,
    initialized: bool,
    last_discovery: Option<DiscoveryResult>,
}

impl Orchestrator {
    /// Credentials fall back to the process environment unless replaced
    /// with `with_credentials`.
    pub fn new(config: ConduiiConfig) -> Self {
        Self {
            runner: TestRunner::new(config.defaults),
            discovery: DiscoveryEngine::new(config.discovery.clone(), config.defaults),
            config,
            credentials: Arc::new(EnvCredentialProvider),
            factories: Vec::new(),
            adapters: Arc::new(RwLock::new(AdapterRegistry::new())),
            events: EventBus::new(),
            http: builtin::http_client(),
            initialized: false,
            last_discovery: None,
        }
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(ConduiiConfig::validate(raw)?))
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Factories are consulted in insertion order; the first match wins
    pub fn with_adapter_factory<F: AdapterFactory + 'static>(mut self, factory: F) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    pub fn with_discovery_options(mut self, options: DiscoveryOptions) -> Self {
        self.discovery = DiscoveryEngine::new(options, self.config.defaults);
        self
    }

    pub fn config(&self) -> &ConduiiConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Result of the discovery run performed by `initialize`
    pub fn discovery_result(&self) -> Option<&DiscoveryResult> {
        self.last_discovery.as_ref()
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&OrchestratorEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(listener)
    }

    pub fn adapter_names(&self) -> Vec<String> {
        self.registry()
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Registered tests in registration order
    pub fn tests(&self) -> Vec<TestConfig> {
        self.runner.configs().cloned().collect()
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, AdapterRegistry> {
        self.adapters.read().unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Setup
    // ========================================================================

    pub async fn initialize(&mut self) -> Result<(), ConduiiError> {
        if self.initialized {
            debug!("Orchestrator already initialized");
            return Ok(());
        }
        info!("Initializing {} v{}", self.config.name, self.config.version);

        for config in self.config.adapters.clone() {
            if !config.enabled {
                debug!("Adapter {} disabled in config", config.name);
                continue;
            }
            if self.registry().contains(&config.name) {
                continue;
            }
            let credentials = Arc::clone(&self.credentials);
            let created = self
                .factories
                .iter()
                .find_map(|factory| factory.create(&config, Arc::clone(&credentials)));
            match created {
                Some(adapter) => self.register_adapter(config, adapter).await?,
                None => warn!(
                    "No integration available for adapter {} ({}); skipping",
                    config.name, config.adapter_type
                ),
            }
        }

        if !self.runner.contains(SYSTEM_HEALTH_TEST_ID) {
            let (config, run) = builtin::system_health();
            self.runner.register(config, run)?;
        }

        if self.config.auto_discover {
            let result = self.discover().await?;
            for test in result.suggested_tests.iter().cloned() {
                if self.runner.contains(&test.id) {
                    debug!("Test {} already registered; keeping existing", test.id);
                    continue;
                }
                self.register_test(test)?;
            }
            self.last_discovery = Some(result);
        }

        self.initialized = true;
        Ok(())
    }

    /// Scan the project directory, emitting `discovery:start` / `discovery:complete`
    pub async fn discover(&self) -> Result<DiscoveryResult, DiscoveryError> {
        self.events.emit(&OrchestratorEvent::DiscoveryStart {
            project_dir: self.config.project_dir.clone(),
        });
        let result = self.discovery.discover(&self.config.project_dir).await?;
        self.events.emit(&OrchestratorEvent::DiscoveryComplete {
            services: result.services.len(),
            endpoints: result.endpoints.len(),
            suggested_tests: result.suggested_tests.len(),
        });
        Ok(result)
    }

    /// Initialize `adapter` with `config` and register it under `config.name`
    pub async fn register_adapter(
        &mut self,
        config: AdapterConfig,
        adapter: Arc<dyn Adapter>,
    ) -> Result<(), AdapterError> {
        if self.registry().contains(&config.name) {
            return Err(AdapterError::DuplicateName(config.name));
        }
        adapter.initialize(config.clone()).await?;
        info!("Registered adapter {} ({})", config.name, config.adapter_type);
        self.adapters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(config, adapter)
    }

    /// Register a test with a function synthesized from its type
    pub fn register_test(&mut self, config: TestConfig) -> Result<(), RunnerError> {
        let run = builtin::synthesize(&config, &self.adapters, &self.http);
        self.runner.register(config, run)
    }

    pub fn register_test_fn(&mut self, config: TestConfig, run: TestFn) -> Result<(), RunnerError> {
        self.runner.register(config, run)
    }

    pub fn unregister_test(&mut self, id: &str) -> Option<TestConfig> {
        self.runner.unregister(id)
    }

    // ========================================================================
    // Suites
    // ========================================================================

    /// Run a suite; the active environment is used unless `options` names one
    pub async fn run_suite(
        &self,
        name: &str,
        mut options: RunOptions,
    ) -> Result<TestSuiteResult, RunnerError> {
        if options.environment.is_none() {
            options.environment = Some(self.config.active_environment());
        }
        self.events.emit(&OrchestratorEvent::SuiteStart {
            name: name.to_string(),
        });
        let result = self.runner.run_suite(name, options).await?;
        self.events.emit(&OrchestratorEvent::SuiteComplete {
            name: result.name.clone(),
            summary: result.summary,
            total_duration_ms: result.total_duration_ms,
        });
        Ok(result)
    }

    pub async fn run_all(&self) -> Result<TestSuiteResult, RunnerError> {
        self.run_suite("all", RunOptions::new()).await
    }

    pub async fn run_health_checks(&self) -> Result<TestSuiteResult, RunnerError> {
        self.run_type("health", TestType::Health).await
    }

    pub async fn run_integration_tests(&self) -> Result<TestSuiteResult, RunnerError> {
        self.run_type("integration", TestType::Integration).await
    }

    pub async fn run_api_tests(&self) -> Result<TestSuiteResult, RunnerError> {
        self.run_type("api", TestType::Api).await
    }

    pub async fn run_e2e_tests(&self) -> Result<TestSuiteResult, RunnerError> {
        self.run_type("e2e", TestType::E2e).await
    }

    async fn run_type(&self, name: &str, test_type: TestType) -> Result<TestSuiteResult, RunnerError> {
        self.run_suite(name, RunOptions::new().with_type(test_type))
            .await
    }

    // ========================================================================
    // Health & Diagnosis
    // ========================================================================

    /// Check every adapter, one at a time, in registration order.
    ///
    /// Adapter errors and panics never abort the pass; they become `down`
    /// entries with a diagnostic.
    pub async fn health_check(&self) -> HealthReport {
        let entries: Vec<RegisteredAdapter> = self.registry().iter().cloned().collect();
        self.events.emit(&OrchestratorEvent::HealthStart {
            adapters: entries.len(),
        });

        let mut services = Vec::with_capacity(entries.len());
        let mut diagnostics = Vec::new();

        for entry in entries {
            let name = entry.config.name.clone();
            let adapter = Arc::clone(&entry.adapter);
            let started = Instant::now();
            let outcome = match tokio::spawn(async move { adapter.health_check().await }).await {
                Ok(result) => result.map_err(|e| e.to_string()),
                Err(join_error) if join_error.is_panic() => Err(format!(
                    "health check panicked: {}",
                    panic_message(join_error.into_panic())
                )),
                Err(join_error) => Err(join_error.to_string()),
            };
            let latency = started.elapsed().as_millis() as u64;

            let (status, error) = match outcome {
                Ok(health) if health.healthy => (ServiceStatus::Up, None),
                Ok(health) => {
                    let reason = health.error.unwrap_or_else(|| "reported unhealthy".to_string());
                    warn!("Adapter {} unhealthy: {}", name, reason);
                    diagnostics.push(DiagnosticResult {
                        severity: Severity::Error,
                        component: name.clone(),
                        issue: "Service Unhealthy".to_string(),
                        description: format!("{} reported unhealthy: {}", name, reason),
                        suggestions: vec![
                            format!("Check the {} service status page", name),
                            "Verify credentials and connection settings".to_string(),
                        ],
                    });
                    (ServiceStatus::Down, Some(reason))
                }
                Err(e) => {
                    warn!("Adapter {} health check failed: {}", name, e);
                    diagnostics.push(DiagnosticResult {
                        severity: Severity::Critical,
                        component: name.clone(),
                        issue: "Adapter Health Check Failed".to_string(),
                        description: format!("Health check for {} raised an error: {}", name, e),
                        suggestions: vec![
                            "Check that the service is reachable from this host".to_string(),
                            "Verify the adapter configuration and credentials".to_string(),
                        ],
                    });
                    (ServiceStatus::Down, Some(e))
                }
            };

            services.push(ServiceHealth {
                name,
                service_type: entry.config.adapter_type,
                status,
                latency,
                last_checked: Utc::now(),
                error,
            });
        }

        let overall = HealthReport::overall_from(&services);
        self.events
            .emit(&OrchestratorEvent::HealthComplete { overall });

        HealthReport {
            overall,
            timestamp: Utc::now(),
            services,
            diagnostics,
        }
    }

    /// One diagnostic per FAILED or ERROR test
    pub fn diagnose(&self, suite: &TestSuiteResult) -> Vec<DiagnosticResult> {
        diagnose::diagnose_suite(suite)
    }

    /// Tear down every adapter. Failures are logged, not returned.
    pub async fn cleanup(&mut self) {
        let entries: Vec<RegisteredAdapter> = std::mem::take(
            &mut *self.adapters.write().unwrap_or_else(PoisonError::into_inner),
        )
        .iter()
        .cloned()
        .collect();

        for entry in entries {
            match entry.adapter.cleanup().await {
                Ok(()) => debug!("Adapter {} cleaned up", entry.config.name),
                Err(e) => warn!("Cleanup of adapter {} failed: {}", entry.config.name, e),
            }
        }
        self.initialized = false;
    }
}
