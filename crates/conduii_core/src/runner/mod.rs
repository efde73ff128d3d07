//! Test Runner
//!
//! Holds the test registry and executes suites:
//! - bounded worker pool (`pool::WorkerPool`), one worker when not parallel
//! - every attempt runs in its own task raced against the test's timeout
//! - FAILED and ERROR attempts are retried, TIMEOUT and SKIPPED are final
//! - results come back in submission order
//!
//! On timeout the attempt's `CancellationToken` is cancelled and its task
//! aborted, so no work outlives the result.

pub mod assert;
pub mod pool;

pub use assert::AssertionError;
pub use pool::WorkerPool;

use crate::config::TestDefaults;
use crate::error::{AdapterError, RunnerError};
use crate::types::{
    EnvironmentConfig, SuiteSummary, TestConfig, TestError, TestResult, TestStatus,
    TestSuiteResult, TestType,
};
use chrono::Utc;
use serde_json::{Map, Value};
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message of tests never started because an earlier test failed
pub const STOPPED_AFTER_FAILURE: &str = "skipped: stopped after first failure";

// ============================================================================
// Test Functions
// ============================================================================

/// Per-attempt input handed to a test function
#[derive(Debug, Clone)]
pub struct TestContext {
    pub test: TestConfig,
    pub environment: EnvironmentConfig,
    /// 1-based
    pub attempt: u32,
    /// Cancelled when the attempt times out
    pub cancel: CancellationToken,
}

impl TestContext {
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.test.config.get(key)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Successful attempt; metadata is copied into the `TestResult`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestOutcome {
    pub metadata: Map<String, Value>,
}

impl TestOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Failed attempt. The variant decides the terminal status.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TestFailure {
    /// → FAILED
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// → ERROR
    #[error("{0}")]
    Error(String),

    /// → SKIPPED
    #[error("{0}")]
    Skipped(String),
}

impl TestFailure {
    pub fn error(message: impl Into<String>) -> Self {
        TestFailure::Error(message.into())
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        TestFailure::Skipped(message.into())
    }

    pub fn status(&self) -> TestStatus {
        match self {
            TestFailure::Assertion(_) => TestStatus::Failed,
            TestFailure::Error(_) => TestStatus::Error,
            TestFailure::Skipped(_) => TestStatus::Skipped,
        }
    }
}

impl From<anyhow::Error> for TestFailure {
    fn from(e: anyhow::Error) -> Self {
        TestFailure::Error(format!("{:#}", e))
    }
}

impl From<AdapterError> for TestFailure {
    fn from(e: AdapterError) -> Self {
        TestFailure::Error(e.to_string())
    }
}

impl From<reqwest::Error> for TestFailure {
    fn from(e: reqwest::Error) -> Self {
        TestFailure::Error(error_chain(&e))
    }
}

/// Error message including every distinct source in the chain
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}

pub type TestFuture = Pin<Box<dyn Future<Output = Result<TestOutcome, TestFailure>> + Send>>;

pub type TestFn = Arc<dyn Fn(TestContext) -> TestFuture + Send + Sync>;

/// Box an async closure as a `TestFn`
pub fn test_fn<F, Fut>(f: F) -> TestFn
where
    F: Fn(TestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<TestOutcome, TestFailure>> + Send + 'static,
{
    Arc::new(move |ctx| Box::pin(f(ctx)))
}

// ============================================================================
// Run Options
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit selection in submission order; all enabled tests when `None`
    pub tests: Option<Vec<String>>,
    /// Any-match tag filter for the default selection
    pub tags: Vec<String>,
    /// Type filter for the default selection
    pub test_type: Option<TestType>,
    pub parallel: Option<bool>,
    pub max_concurrency: Option<usize>,
    pub stop_on_first_failure: bool,
    pub environment: Option<EnvironmentConfig>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tests<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_type(mut self, test_type: TestType) -> Self {
        self.test_type = Some(test_type);
        self
    }

    pub fn serial(mut self) -> Self {
        self.parallel = Some(false);
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn stop_on_first_failure(mut self) -> Self {
        self.stop_on_first_failure = true;
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentConfig) -> Self {
        self.environment = Some(environment);
        self
    }
}

// ============================================================================
// Runner
// ============================================================================

#[derive(Clone)]
struct RegisteredTest {
    config: TestConfig,
    test_fn: TestFn,
}

/// Test registry and suite executor
pub struct TestRunner {
    defaults: TestDefaults,
    tests: Vec<RegisteredTest>,
}

impl TestRunner {
    pub fn new(defaults: TestDefaults) -> Self {
        Self {
            defaults,
            tests: Vec::new(),
        }
    }

    pub fn register(&mut self, config: TestConfig, test_fn: TestFn) -> Result<(), RunnerError> {
        if self.contains(&config.id) {
            return Err(RunnerError::DuplicateTest(config.id));
        }
        debug!("Registered test {} ({})", config.id, config.test_type);
        self.tests.push(RegisteredTest { config, test_fn });
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> Option<TestConfig> {
        let index = self.tests.iter().position(|t| t.config.id == id)?;
        Some(self.tests.remove(index).config)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tests.iter().any(|t| t.config.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&TestConfig> {
        self.tests.iter().map(|t| &t.config).find(|c| c.id == id)
    }

    /// Registered configs in registration order
    pub fn configs(&self) -> impl Iterator<Item = &TestConfig> {
        self.tests.iter().map(|t| &t.config)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    fn select(&self, options: &RunOptions) -> Result<Vec<RegisteredTest>, RunnerError> {
        match &options.tests {
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.tests
                        .iter()
                        .find(|t| &t.config.id == id)
                        .cloned()
                        .ok_or_else(|| RunnerError::UnknownTest(id.clone()))
                })
                .collect(),
            None => Ok(self
                .tests
                .iter()
                .filter(|t| t.config.enabled)
                .filter(|t| options.tags.is_empty() || t.config.has_any_tag(&options.tags))
                .filter(|t| options.test_type.map_or(true, |ty| t.config.test_type == ty))
                .cloned()
                .collect()),
        }
    }

    /// Execute a suite and return results in submission order
    pub async fn run_suite(
        &self,
        name: &str,
        options: RunOptions,
    ) -> Result<TestSuiteResult, RunnerError> {
        let selected = self.select(&options)?;
        let environment = options.environment.clone().unwrap_or_default();
        let parallel = options.parallel.unwrap_or(self.defaults.parallel);
        let workers = if parallel {
            options
                .max_concurrency
                .unwrap_or(self.defaults.max_concurrency)
        } else {
            1
        };
        let pool = WorkerPool::new(workers);

        info!(
            "Starting suite '{}': {} tests on {} worker(s), environment {}",
            name,
            selected.len(),
            pool.workers(),
            environment.name
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let configs: Vec<TestConfig> = selected.iter().map(|t| t.config.clone()).collect();

        let job_env = environment.clone();
        let stop = options.stop_on_first_failure;
        let outputs = pool
            .run(
                selected,
                move |test| execute(test, job_env.clone()),
                move |result: &TestResult| {
                    stop && matches!(result.status, TestStatus::Failed | TestStatus::Error)
                },
            )
            .await;

        let tests: Vec<TestResult> = configs
            .iter()
            .zip(outputs)
            .map(|(config, output)| {
                output.unwrap_or_else(|| TestResult::skipped(config, STOPPED_AFTER_FAILURE))
            })
            .collect();
        let summary = SuiteSummary::from_results(&tests);
        let total_duration_ms = millis(start.elapsed());

        info!(
            "Suite '{}' finished in {}ms: {} passed, {} failed, {} errors, {} timeouts, {} skipped",
            name,
            total_duration_ms,
            summary.passed,
            summary.failed,
            summary.error,
            summary.timeout,
            summary.skipped
        );

        Ok(TestSuiteResult {
            run_id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            environment: environment.name,
            started_at,
            tests,
            summary,
            total_duration_ms,
        })
    }
}

struct Attempt {
    status: TestStatus,
    error: Option<String>,
    metadata: Map<String, Value>,
}

impl Attempt {
    fn failed(status: TestStatus, message: String) -> Self {
        Self {
            status,
            error: Some(message),
            metadata: Map::new(),
        }
    }
}

async fn execute(test: RegisteredTest, environment: EnvironmentConfig) -> TestResult {
    let config = &test.config;
    if !config.enabled {
        return TestResult::skipped(config, "skipped: test disabled");
    }

    let max_attempts = config.retries.saturating_add(1);
    let mut attempt_no = 0;
    loop {
        attempt_no += 1;
        let started = Instant::now();
        let mut attempt = run_attempt(&test, &environment, attempt_no).await;
        let duration_ms = millis(started.elapsed());

        let retryable = matches!(attempt.status, TestStatus::Failed | TestStatus::Error);
        if retryable && attempt_no < max_attempts {
            warn!(
                "Test {} attempt {}/{} {}: {}; retrying",
                config.id,
                attempt_no,
                max_attempts,
                attempt.status,
                attempt.error.as_deref().unwrap_or("")
            );
            continue;
        }

        attempt
            .metadata
            .insert("attempts".to_string(), Value::from(attempt_no));
        return TestResult {
            test_id: config.id.clone(),
            name: config.name.clone(),
            test_type: config.test_type,
            status: attempt.status,
            duration_ms,
            error: attempt.error.map(TestError::new),
            metadata: attempt.metadata,
            attempts: attempt_no,
        };
    }
}

async fn run_attempt(test: &RegisteredTest, environment: &EnvironmentConfig, attempt: u32) -> Attempt {
    let config = &test.config;
    let cancel = CancellationToken::new();
    let ctx = TestContext {
        test: config.clone(),
        environment: environment.clone(),
        attempt,
        cancel: cancel.clone(),
    };

    let mut handle = tokio::spawn((test.test_fn)(ctx));
    let limit = Duration::from_millis(config.timeout_ms);

    match tokio::time::timeout(limit, &mut handle).await {
        Ok(Ok(Ok(outcome))) => Attempt {
            status: TestStatus::Passed,
            error: None,
            metadata: outcome.metadata,
        },
        Ok(Ok(Err(failure))) => Attempt::failed(failure.status(), failure.to_string()),
        Ok(Err(join_error)) if join_error.is_panic() => Attempt::failed(
            TestStatus::Error,
            format!("test panicked: {}", panic_message(join_error.into_panic())),
        ),
        Ok(Err(join_error)) => Attempt::failed(TestStatus::Error, join_error.to_string()),
        Err(_) => {
            cancel.cancel();
            handle.abort();
            warn!("Test {} timed out after {}ms", config.id, config.timeout_ms);
            Attempt::failed(
                TestStatus::Timeout,
                format!("Test timed out after {}ms", config.timeout_ms),
            )
        }
    }
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn passing() -> TestFn {
        test_fn(|_| async { Ok(TestOutcome::new()) })
    }

    fn runner() -> TestRunner {
        TestRunner::new(TestDefaults::default())
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut runner = runner();
        runner
            .register(TestConfig::new("a", "A", TestType::Custom), passing())
            .unwrap();
        let err = runner
            .register(TestConfig::new("a", "A again", TestType::Custom), passing())
            .unwrap_err();
        assert!(matches!(err, RunnerError::DuplicateTest(id) if id == "a"));

        assert_eq!(runner.unregister("a").map(|c| c.name), Some("A".to_string()));
        assert!(runner.is_empty());
        assert!(runner.unregister("a").is_none());
    }

    #[tokio::test]
    async fn test_unknown_test_id() {
        let runner = runner();
        let err = runner
            .run_suite("s", RunOptions::new().with_tests(["missing"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::UnknownTest(id) if id == "missing"));
    }

    #[tokio::test]
    async fn test_failure_tiers() {
        let mut runner = runner();
        runner
            .register(
                TestConfig::new("assert", "assert", TestType::Custom).with_retries(0),
                test_fn(|_| async {
                    assert::status_code(500, 200)?;
                    Ok(TestOutcome::new())
                }),
            )
            .unwrap();
        runner
            .register(
                TestConfig::new("error", "error", TestType::Custom).with_retries(0),
                test_fn(|_| async { Err(TestFailure::error("boom")) }),
            )
            .unwrap();
        runner
            .register(
                TestConfig::new("skip", "skip", TestType::Custom),
                test_fn(|_| async { Err(TestFailure::skipped("no url")) }),
            )
            .unwrap();
        runner
            .register(
                TestConfig::new("panic", "panic", TestType::Custom).with_retries(0),
                test_fn(|ctx| async move {
                    if ctx.attempt > 0 {
                        panic!("kaboom");
                    }
                    Ok(TestOutcome::new())
                }),
            )
            .unwrap();

        let suite = runner.run_suite("tiers", RunOptions::new()).await.unwrap();
        let statuses: Vec<TestStatus> = suite.tests.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![
                TestStatus::Failed,
                TestStatus::Error,
                TestStatus::Skipped,
                TestStatus::Error
            ]
        );
        assert_eq!(
            suite.tests[0].error_message(),
            Some("Expected status 200, got 500")
        );
        assert_eq!(suite.tests[3].error_message(), Some("test panicked: kaboom"));
        assert_eq!(suite.tests[2].attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_terminal_and_cancels() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancelled = Arc::new(AtomicU32::new(0));
        let fn_calls = Arc::clone(&calls);
        let fn_cancelled = Arc::clone(&cancelled);

        let mut runner = runner();
        runner
            .register(
                TestConfig::new("slow", "slow", TestType::Custom)
                    .with_timeout(50)
                    .with_retries(3),
                test_fn(move |ctx| {
                    fn_calls.fetch_add(1, Ordering::SeqCst);
                    let cancelled = Arc::clone(&fn_cancelled);
                    async move {
                        let token = ctx.cancel.clone();
                        // Observe cancellation from a detached task so the
                        // signal is seen even though this task is aborted.
                        tokio::spawn(async move {
                            token.cancelled().await;
                            cancelled.fetch_add(1, Ordering::SeqCst);
                        });
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(TestOutcome::new())
                    }
                }),
            )
            .unwrap();

        let suite = runner.run_suite("timeouts", RunOptions::new()).await.unwrap();
        let result = &suite.tests[0];
        assert_eq!(result.status, TestStatus::Timeout);
        assert_eq!(result.error_message(), Some("Test timed out after 50ms"));
        assert_eq!(result.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::task::yield_now().await;
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_explicit_disabled_test_is_skipped() {
        let mut runner = runner();
        runner
            .register(TestConfig::new("off", "off", TestType::Custom).disabled(), passing())
            .unwrap();
        runner
            .register(TestConfig::new("on", "on", TestType::Custom), passing())
            .unwrap();

        let default_run = runner.run_suite("default", RunOptions::new()).await.unwrap();
        assert_eq!(default_run.tests.len(), 1);
        assert_eq!(default_run.tests[0].test_id, "on");

        let explicit = runner
            .run_suite("explicit", RunOptions::new().with_tests(["off", "on"]))
            .await
            .unwrap();
        assert_eq!(explicit.tests[0].status, TestStatus::Skipped);
        assert_eq!(explicit.tests[0].attempts, 0);
        assert_eq!(explicit.tests[1].status, TestStatus::Passed);
    }

    #[tokio::test]
    async fn test_tag_and_type_filters() {
        let mut runner = runner();
        runner
            .register(
                TestConfig::new("h", "h", TestType::Health).with_tag("smoke"),
                passing(),
            )
            .unwrap();
        runner
            .register(TestConfig::new("a", "a", TestType::Api), passing())
            .unwrap();

        let tagged = runner
            .run_suite("tagged", RunOptions::new().with_tag("smoke"))
            .await
            .unwrap();
        assert_eq!(tagged.tests.len(), 1);
        assert_eq!(tagged.tests[0].test_id, "h");

        let api = runner
            .run_suite("api", RunOptions::new().with_type(TestType::Api))
            .await
            .unwrap();
        assert_eq!(api.tests.len(), 1);
        assert_eq!(api.tests[0].test_id, "a");
    }

    #[tokio::test]
    async fn test_context_carries_environment_and_attempt() {
        let mut runner = runner();
        runner
            .register(
                TestConfig::new("ctx", "ctx", TestType::Custom).with_config("k", "v".into()),
                test_fn(|ctx| async move {
                    assert::equal(ctx.environment.name.as_str(), "staging", "environment")?;
                    assert::equal(ctx.config_value("k"), Some(&Value::from("v")), "config")?;
                    Ok(TestOutcome::new().with("attempt", ctx.attempt))
                }),
            )
            .unwrap();

        let suite = runner
            .run_suite(
                "ctx",
                RunOptions::new().with_environment(EnvironmentConfig::new("staging")),
            )
            .await
            .unwrap();
        let result = &suite.tests[0];
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.metadata["attempt"], 1);
        assert_eq!(result.metadata["attempts"], 1);
        assert_eq!(suite.environment, "staging");
        assert!(Uuid::parse_str(&suite.run_id).is_ok());
    }

    #[test]
    fn test_error_chain_skips_repeated_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let wrapped = anyhow::Error::new(io).context("request failed");
        let failure = TestFailure::from(wrapped);
        assert_eq!(failure, TestFailure::Error("request failed: connection refused".into()));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "tcp connect error");
        assert_eq!(error_chain(&io), "tcp connect error");
    }
}
