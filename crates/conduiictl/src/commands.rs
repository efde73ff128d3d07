//! Command implementations for conduiictl
//!
//! Each command returns the process exit code; errors that prevent a
//! command from producing a result propagate as `anyhow::Error`.

use crate::output;
use anyhow::{Context, Result};
use conduii_core::{
    ConduiiConfig, Orchestrator, OverallHealth, RawConfig, RunOptions, TestSuiteResult, TestType,
};
use std::path::Path;
use tracing::{debug, info};

/// Exit code for success
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code when tests failed or services are not healthy
pub const EXIT_FAILURES: i32 = 1;

/// Suite filters from the `run` subcommand
pub struct RunArgs {
    pub test_type: Option<TestType>,
    pub tags: Vec<String>,
    pub serial: bool,
    pub concurrency: Option<usize>,
    pub stop_on_failure: bool,
}

impl RunArgs {
    fn suite_name(&self) -> String {
        match self.test_type {
            Some(test_type) => test_type.to_string(),
            None => "all".to_string(),
        }
    }

    fn into_options(self) -> RunOptions {
        let mut options = RunOptions::new();
        if let Some(test_type) = self.test_type {
            options = options.with_type(test_type);
        }
        for tag in self.tags {
            options = options.with_tag(tag);
        }
        if self.serial {
            options = options.serial();
        }
        if let Some(max) = self.concurrency {
            options = options.with_max_concurrency(max);
        }
        if self.stop_on_failure {
            options = options.stop_on_first_failure();
        }
        options
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Resolve the raw config: explicit path, else a config file in `dir`,
/// else defaults rooted at `dir`. `env` replaces the configured environment.
pub fn load_raw_config(path: Option<&Path>, dir: &Path, env: Option<String>) -> Result<RawConfig> {
    let file = match path {
        Some(path) => Some(path.to_path_buf()),
        None => ConduiiConfig::discover_file(dir),
    };

    let mut raw = match file {
        Some(file) => RawConfig::from_file(&file)
            .with_context(|| format!("Failed to load config {}", file.display()))?,
        None => RawConfig {
            project_dir: Some(dir.to_path_buf()),
            ..Default::default()
        },
    };

    if env.is_some() {
        raw.environment = env;
    }
    Ok(raw)
}

pub fn validate(raw: RawConfig) -> Result<ConduiiConfig> {
    let config = ConduiiConfig::validate(raw).context("Invalid configuration")?;
    debug!(
        "Config: project {} in {}, environment {}",
        config.name,
        config.project_dir.display(),
        config.environment
    );
    Ok(config)
}

async fn initialized(config: ConduiiConfig) -> Result<Orchestrator> {
    let mut orchestrator = Orchestrator::new(config);
    orchestrator
        .initialize()
        .await
        .context("Failed to initialize orchestrator")?;
    Ok(orchestrator)
}

fn suite_exit_code(suite: &TestSuiteResult) -> i32 {
    if suite.success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURES
    }
}

// ============================================================================
// Commands
// ============================================================================

pub async fn discover(config: ConduiiConfig, json: bool) -> Result<i32> {
    let orchestrator = Orchestrator::new(config);
    let result = orchestrator
        .discover()
        .await
        .context("Discovery failed")?;

    if json {
        output::print_json(&result)?;
    } else {
        output::print_discovery(&result);
    }
    Ok(EXIT_SUCCESS)
}

pub async fn run(config: ConduiiConfig, args: RunArgs, json: bool) -> Result<i32> {
    let mut orchestrator = initialized(config).await?;
    let name = args.suite_name();

    let suite = orchestrator
        .run_suite(&name, args.into_options())
        .await
        .context("Failed to run suite")?;
    orchestrator.cleanup().await;

    if json {
        output::print_json(&suite)?;
    } else {
        output::print_suite(&suite);
    }
    Ok(suite_exit_code(&suite))
}

pub async fn health(config: ConduiiConfig, json: bool) -> Result<i32> {
    let mut orchestrator = initialized(config).await?;
    let report = orchestrator.health_check().await;
    orchestrator.cleanup().await;

    if json {
        output::print_json(&report)?;
    } else {
        output::print_health(&report);
    }

    Ok(match report.overall {
        OverallHealth::Healthy => EXIT_SUCCESS,
        OverallHealth::Degraded | OverallHealth::Unhealthy => EXIT_FAILURES,
    })
}

pub async fn diagnose(config: ConduiiConfig, json: bool) -> Result<i32> {
    let mut orchestrator = initialized(config).await?;
    let suite = orchestrator
        .run_all()
        .await
        .context("Failed to run suite")?;
    let diagnostics = orchestrator.diagnose(&suite);
    orchestrator.cleanup().await;
    info!("{} diagnostic(s) for suite {}", diagnostics.len(), suite.run_id);

    if json {
        output::print_json(&diagnostics)?;
    } else {
        output::print_diagnostics(&diagnostics);
    }
    Ok(suite_exit_code(&suite))
}
