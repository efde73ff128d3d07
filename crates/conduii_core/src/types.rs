//! Shared data model for the Conduii engine.
//!
//! These are the contract surfaces consumed downstream (dashboard,
//! notification formatter, failure analyzer). Field names serialize in
//! camelCase and must stay stable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Default per-test timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default number of additional attempts after a failure
pub const DEFAULT_RETRIES: u32 = 2;

/// Default worker pool size
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

// ============================================================================
// Adapter Types
// ============================================================================

/// Category of external service an adapter integrates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    Database,
    Auth,
    Payment,
    Email,
    Storage,
    Monitoring,
    Repository,
    Analytics,
    Custom,
}

impl AdapterType {
    pub const ALL: [AdapterType; 9] = [
        AdapterType::Database,
        AdapterType::Auth,
        AdapterType::Payment,
        AdapterType::Email,
        AdapterType::Storage,
        AdapterType::Monitoring,
        AdapterType::Repository,
        AdapterType::Analytics,
        AdapterType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterType::Database => "database",
            AdapterType::Auth => "auth",
            AdapterType::Payment => "payment",
            AdapterType::Email => "email",
            AdapterType::Storage => "storage",
            AdapterType::Monitoring => "monitoring",
            AdapterType::Repository => "repository",
            AdapterType::Analytics => "analytics",
            AdapterType::Custom => "custom",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        AdapterType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown adapter type '{}' (expected one of: {})",
                    s,
                    AdapterType::ALL
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Declared configuration of a single adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterConfig {
    #[serde(rename = "type")]
    pub adapter_type: AdapterType,
    /// Unique within a registry
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub credentials: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl AdapterConfig {
    pub fn new(adapter_type: AdapterType, name: impl Into<String>) -> Self {
        Self {
            adapter_type,
            name: name.into(),
            enabled: true,
            credentials: BTreeMap::new(),
            options: Map::new(),
        }
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key.into(), value.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

// ============================================================================
// Test Definitions
// ============================================================================

/// Kind of test, used to pick a synthesized test function
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Health,
    Integration,
    Api,
    E2e,
    Custom,
}

impl TestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Health => "health",
            TestType::Integration => "integration",
            TestType::Api => "api",
            TestType::E2e => "e2e",
            TestType::Custom => "custom",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "health" => Ok(TestType::Health),
            "integration" => Ok(TestType::Integration),
            "api" => Ok(TestType::Api),
            "e2e" => Ok(TestType::E2e),
            "custom" => Ok(TestType::Custom),
            _ => Err(format!(
                "unknown test type '{}' (expected health, integration, api, e2e or custom)",
                s
            )),
        }
    }
}

/// A runnable test definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    /// Unique within a runner
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Milliseconds
    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl TestConfig {
    pub fn new(id: impl Into<String>, name: impl Into<String>, test_type: TestType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            test_type,
            enabled: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            retries: DEFAULT_RETRIES,
            tags: Vec::new(),
            config: Map::new(),
        }
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Bind this test to a registered adapter by name
    pub fn with_adapter(self, adapter: impl Into<String>) -> Self {
        self.with_config("adapter", Value::String(adapter.into()))
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Name of the adapter this test is bound to, if any
    pub fn adapter(&self) -> Option<&str> {
        self.config.get("adapter").and_then(Value::as_str)
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Target environment for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<Url>,
    #[serde(default)]
    pub is_production: bool,
}

impl EnvironmentConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            is_production: false,
        }
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self::new("default")
    }
}

// ============================================================================
// Results
// ============================================================================

/// Test lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Skipped,
    Timeout,
    Error,
}

impl TestStatus {
    /// Failed, errored or timed out
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TestStatus::Failed | TestStatus::Error | TestStatus::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Timeout => "timeout",
            TestStatus::Error => "error",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestError {
    pub message: String,
}

impl TestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Outcome of a single test. Terminal once returned by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub test_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    pub status: TestStatus,
    /// Milliseconds spent on the final attempt
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Attempts actually executed (0 when never started)
    pub attempts: u32,
}

impl TestResult {
    pub fn skipped(config: &TestConfig, reason: impl Into<String>) -> Self {
        Self {
            test_id: config.id.clone(),
            name: config.name.clone(),
            test_type: config.test_type,
            status: TestStatus::Skipped,
            duration_ms: 0,
            error: Some(TestError::new(reason)),
            metadata: Map::new(),
            attempts: 0,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

/// Counts by terminal status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timeout: usize,
    pub error: usize,
}

impl SuiteSummary {
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = SuiteSummary {
            total: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                TestStatus::Passed => summary.passed += 1,
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Skipped => summary.skipped += 1,
                TestStatus::Timeout => summary.timeout += 1,
                TestStatus::Error => summary.error += 1,
                // Never produced by the runner
                TestStatus::Pending | TestStatus::Running => {}
            }
        }
        summary
    }

    pub fn failures(&self) -> usize {
        self.failed + self.error + self.timeout
    }
}

/// Result of one `run_suite` invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuiteResult {
    pub run_id: String,
    pub name: String,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    /// Submission order, not completion order
    pub tests: Vec<TestResult>,
    pub summary: SuiteSummary,
    /// Wall-clock milliseconds for the whole suite
    #[serde(rename = "totalDuration")]
    pub total_duration_ms: u64,
}

impl TestSuiteResult {
    /// True when nothing failed, errored or timed out
    pub fn success(&self) -> bool {
        self.summary.failures() == 0
    }

    pub fn get(&self, test_id: &str) -> Option<&TestResult> {
        self.tests.iter().find(|t| t.test_id == test_id)
    }
}

// ============================================================================
// Diagnostics & Health
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// A classified failure with remediation hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticResult {
    pub severity: Severity,
    pub component: String,
    pub issue: String,
    pub description: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl fmt::Display for OverallHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallHealth::Healthy => write!(f, "healthy"),
            OverallHealth::Degraded => write!(f, "degraded"),
            OverallHealth::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
}

/// Health of one adapter at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: AdapterType,
    pub status: ServiceStatus,
    /// Milliseconds
    pub latency: u64,
    pub last_checked: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall: OverallHealth,
    pub timestamp: DateTime<Utc>,
    pub services: Vec<ServiceHealth>,
    pub diagnostics: Vec<DiagnosticResult>,
}

impl HealthReport {
    /// Overall status from per-service states. An empty report is healthy.
    pub fn overall_from(services: &[ServiceHealth]) -> OverallHealth {
        let up = services
            .iter()
            .filter(|s| s.status == ServiceStatus::Up)
            .count();
        if up == services.len() {
            OverallHealth::Healthy
        } else if up == 0 {
            OverallHealth::Unhealthy
        } else {
            OverallHealth::Degraded
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
