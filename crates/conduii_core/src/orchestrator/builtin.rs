//! Test functions synthesized from a `TestConfig`'s type.
//!
//! - HEALTH: bound adapter's `health_check`
//! - INTEGRATION: bound adapter's `test_connection`
//! - API: HTTP request to `environment.url + config.path`
//! - E2E / CUSTOM: skipped unless a custom function is registered
//!
//! Adapters are looked up when the test runs, so a test may be registered
//! before the adapter it is bound to.

use crate::adapter::{Adapter, AdapterRegistry};
use crate::runner::{assert, test_fn, TestContext, TestFailure, TestFn, TestOutcome};
use crate::types::{TestConfig, TestType};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

pub const SYSTEM_HEALTH_TEST_ID: &str = "system-health";

/// Response-time budget for API tests without `maxResponseTime`
pub const DEFAULT_MAX_RESPONSE_TIME_MS: u64 = 5_000;

pub(crate) type SharedAdapters = Arc<RwLock<AdapterRegistry>>;

/// Liveness smoke test, independent of discovery
pub fn system_health() -> (TestConfig, TestFn) {
    let config = TestConfig::new(SYSTEM_HEALTH_TEST_ID, "System health", TestType::Health)
        .with_retries(0)
        .with_tag("system");
    let run = test_fn(|_| async {
        assert::ok(true, "system health")?;
        Ok(TestOutcome::new())
    });
    (config, run)
}

/// Test function for `config`'s type
pub(crate) fn synthesize(config: &TestConfig, adapters: &SharedAdapters, http: &reqwest::Client) -> TestFn {
    match config.test_type {
        TestType::Health => {
            let adapters = Arc::clone(adapters);
            test_fn(move |ctx| health_test(ctx, Arc::clone(&adapters)))
        }
        TestType::Integration => {
            let adapters = Arc::clone(adapters);
            test_fn(move |ctx| integration_test(ctx, Arc::clone(&adapters)))
        }
        TestType::Api => {
            let http = http.clone();
            test_fn(move |ctx| api_test(ctx, http.clone()))
        }
        TestType::E2e | TestType::Custom => test_fn(|ctx| async move {
            Err::<TestOutcome, _>(TestFailure::skipped(format!(
                "no test function registered for {} test",
                ctx.test.test_type
            )))
        }),
    }
}

fn bound_adapter(
    ctx: &TestContext,
    adapters: &SharedAdapters,
) -> Result<(String, Arc<dyn Adapter>), TestFailure> {
    let name = ctx
        .test
        .adapter()
        .ok_or_else(|| TestFailure::skipped("no adapter bound to this test"))?;
    let adapter = adapters
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .ok_or_else(|| TestFailure::skipped(format!("adapter '{}' is not registered", name)))?;
    Ok((name.to_string(), adapter))
}

async fn health_test(ctx: TestContext, adapters: SharedAdapters) -> Result<TestOutcome, TestFailure> {
    let (name, adapter) = bound_adapter(&ctx, &adapters)?;

    let started = Instant::now();
    let health = adapter.health_check().await?;
    let latency = health
        .latency
        .unwrap_or_else(|| started.elapsed().as_millis() as u64);

    assert::ok(
        health.healthy,
        health.error.as_deref().unwrap_or("Service unhealthy"),
    )?;
    Ok(TestOutcome::new()
        .with("latency", latency)
        .with("adapter", name))
}

async fn integration_test(
    ctx: TestContext,
    adapters: SharedAdapters,
) -> Result<TestOutcome, TestFailure> {
    let (name, adapter) = bound_adapter(&ctx, &adapters)?;

    let connection = adapter.test_connection().await?;
    let reason = connection.error.as_deref();
    assert::ok(connection.connected, reason.unwrap_or("Not connected"))?;
    assert::ok(
        connection.authenticated,
        reason.unwrap_or("Connected but not authenticated"),
    )?;
    Ok(TestOutcome::new().with("adapter", name))
}

fn config_u64(ctx: &TestContext, key: &str, default: u64) -> u64 {
    ctx.config_value(key).and_then(Value::as_u64).unwrap_or(default)
}

async fn api_test(ctx: TestContext, http: reqwest::Client) -> Result<TestOutcome, TestFailure> {
    let base = ctx
        .environment
        .url
        .as_ref()
        .ok_or_else(|| TestFailure::skipped("no URL configured for this environment"))?;

    let path = ctx
        .config_value("path")
        .and_then(Value::as_str)
        .unwrap_or("/");
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err(TestFailure::skipped(format!(
            "path {} has unresolved parameters",
            path
        )));
    }

    let method = ctx
        .config_value("method")
        .and_then(Value::as_str)
        .unwrap_or("GET");
    let method = reqwest::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|_| TestFailure::error(format!("invalid HTTP method '{}'", method)))?;

    let expected = u16::try_from(config_u64(&ctx, "expectedStatus", 200))
        .map_err(|_| TestFailure::error("expectedStatus is not a valid status code"))?;
    let budget = config_u64(&ctx, "maxResponseTime", DEFAULT_MAX_RESPONSE_TIME_MS);

    let url = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );

    let started = Instant::now();
    let response = tokio::select! {
        response = http.request(method, url.as_str()).send() => response?,
        _ = ctx.cancel.cancelled() => return Err(TestFailure::error("request cancelled")),
    };
    let elapsed = started.elapsed().as_millis() as u64;
    let status = response.status().as_u16();

    assert::status_code(status, expected)?;
    assert::response_time(elapsed, budget)?;
    Ok(TestOutcome::new()
        .with("url", url)
        .with("statusCode", status)
        .with("responseTime", elapsed))
}

/// Shared HTTP client for API tests
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(concat!("conduii/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}
