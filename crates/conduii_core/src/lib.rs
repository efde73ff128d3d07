//! Conduii Core - service discovery and test orchestration engine.
//!
//! Inspects a project to infer the external services it depends on, turns
//! the findings into runnable tests, runs them under bounded concurrency
//! with retry, timeout and cancellation, and classifies failures into
//! diagnostics.

pub mod adapter;
pub mod config;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod runner;
pub mod types;

pub use adapter::{
    Adapter, AdapterContext, AdapterFactory, AdapterHooks, AdapterRegistry, BaseAdapter,
    ConnectionResult, CredentialProvider, EnvCredentialProvider, FakeAdapter, FakeResponse,
    HealthCheckResult, NoCredentials, StaticCredentialProvider,
};
pub use config::{ConduiiConfig, RawConfig, TestDefaults};
pub use discovery::{
    DiscoveredEndpoint, DiscoveredService, DiscoveryEngine, DiscoveryOptions, DiscoveryResult,
    Evidence, EvidenceSource, HttpMethod,
};
pub use error::{AdapterError, ConduiiError, ConfigError, DiscoveryError, RunnerError};
pub use orchestrator::{Orchestrator, OrchestratorEvent, Subscription};
pub use runner::{
    assert, test_fn, RunOptions, TestContext, TestFailure, TestFn, TestOutcome, TestRunner,
};
pub use types::*;
