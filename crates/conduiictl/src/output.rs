//! Output formatting - plain ASCII terminal output and JSON

use anyhow::Result;
use conduii_core::{
    DiagnosticResult, DiscoveryResult, HealthReport, OverallHealth, ServiceStatus, Severity,
    TestStatus, TestSuiteResult,
};
use owo_colors::OwoColorize;
use serde::Serialize;

const SEPARATOR: &str = "------------------------------------------------------------";

/// Width of the longest status label, `[TIMEOUT]`
const STATUS_WIDTH: usize = 9;

/// Width of the longest service label, `[DOWN]`
const SERVICE_WIDTH: usize = 6;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Status label padded to a fixed visible width. Padding happens before
/// colouring since escape codes would count toward a `{:<N}` width.
fn status_tag(status: TestStatus) -> String {
    let label = format!(
        "{:<width$}",
        format!("[{}]", status_label(status)),
        width = STATUS_WIDTH
    );
    match status {
        TestStatus::Passed => label.bright_green().to_string(),
        TestStatus::Failed => label.bright_red().to_string(),
        TestStatus::Error => label.red().to_string(),
        TestStatus::Timeout => label.yellow().to_string(),
        TestStatus::Skipped => label.dimmed().to_string(),
        TestStatus::Pending | TestStatus::Running => label,
    }
}

fn status_label(status: TestStatus) -> String {
    match status {
        TestStatus::Passed => "PASS".to_string(),
        TestStatus::Failed => "FAIL".to_string(),
        TestStatus::Skipped => "SKIP".to_string(),
        other => other.as_str().to_uppercase(),
    }
}

fn service_tag(status: ServiceStatus) -> String {
    match status {
        ServiceStatus::Up => format!("{:<width$}", "[UP]", width = SERVICE_WIDTH)
            .bright_green()
            .to_string(),
        ServiceStatus::Down => format!("{:<width$}", "[DOWN]", width = SERVICE_WIDTH)
            .bright_red()
            .to_string(),
    }
}

fn severity_tag(severity: Severity) -> String {
    let label = format!("[{}]", severity.to_string().to_uppercase());
    match severity {
        Severity::Critical => label.bright_red().bold().to_string(),
        Severity::Error => label.red().to_string(),
        Severity::Warning => label.yellow().to_string(),
        Severity::Info => label.cyan().to_string(),
    }
}

// ============================================================================
// Discovery
// ============================================================================

pub fn print_discovery(result: &DiscoveryResult) {
    println!();
    println!("{} {}", "Project:".bold(), result.project_dir.display());
    if let Some(framework) = &result.framework {
        println!("{} {}", "Framework:".bold(), framework);
    }
    println!(
        "Scanned {} files ({} skipped)",
        result.files_scanned, result.skipped_paths
    );

    println!();
    println!("[SERVICES]");
    if result.services.is_empty() {
        println!("  {}", "none detected".dimmed());
    }
    for service in &result.services {
        println!(
            "  * {} ({}) confidence {:.2}",
            service.name.cyan(),
            service.service_type,
            service.confidence
        );
        for evidence in &service.evidence {
            println!(
                "      {} in {}",
                evidence.key.dimmed(),
                evidence.file.display()
            );
        }
    }

    println!();
    println!("[ENDPOINTS]");
    if result.endpoints.is_empty() {
        println!("  {}", "none detected".dimmed());
    }
    for endpoint in &result.endpoints {
        println!("  * {:<7} {}", endpoint.method.to_string(), endpoint.path);
    }

    println!();
    println!("[SUGGESTED TESTS]");
    for test in &result.suggested_tests {
        println!("  * {} ({})", test.id, test.test_type);
    }
    println!();
}

// ============================================================================
// Suites
// ============================================================================

pub fn print_suite(suite: &TestSuiteResult) {
    println!();
    println!(
        "{} {} ({})",
        "Suite".bold(),
        suite.name.bold(),
        suite.environment
    );
    println!("{}", SEPARATOR.dimmed());

    for test in &suite.tests {
        println!(
            "{} {} {}",
            status_tag(test.status),
            test.name,
            format!("{}ms", test.duration_ms).dimmed()
        );
        if let Some(message) = test.error_message() {
            println!("{:width$} {}", "", message.dimmed(), width = STATUS_WIDTH);
        }
    }

    let summary = &suite.summary;
    println!("{}", SEPARATOR.dimmed());
    let line = format!(
        "{} total, {} passed, {} failed, {} errors, {} timeouts, {} skipped in {}ms",
        summary.total,
        summary.passed,
        summary.failed,
        summary.error,
        summary.timeout,
        summary.skipped,
        suite.total_duration_ms
    );
    if suite.success() {
        println!("[OK] {}", line.green());
    } else {
        println!("[FAILED] {}", line.red());
    }
    println!();
}

// ============================================================================
// Health & Diagnostics
// ============================================================================

pub fn print_health(report: &HealthReport) {
    println!();
    let overall = report.overall.to_string().to_uppercase();
    let overall = match report.overall {
        OverallHealth::Healthy => overall.bright_green().to_string(),
        OverallHealth::Degraded => overall.yellow().to_string(),
        OverallHealth::Unhealthy => overall.bright_red().to_string(),
    };
    println!("{} {}", "Overall:".bold(), overall);

    if report.services.is_empty() {
        println!("  {}", "no adapters registered".dimmed());
    }
    for service in &report.services {
        println!(
            "  {} {} ({}) {}ms",
            service_tag(service.status),
            service.name,
            service.service_type,
            service.latency
        );
        if let Some(error) = &service.error {
            println!("  {:width$} {}", "", error.dimmed(), width = SERVICE_WIDTH);
        }
    }

    if !report.diagnostics.is_empty() {
        print_diagnostics(&report.diagnostics);
    }
    println!();
}

pub fn print_diagnostics(diagnostics: &[DiagnosticResult]) {
    println!();
    if diagnostics.is_empty() {
        println!("[OK] {}", "No issues found".green());
        return;
    }

    for diagnostic in diagnostics {
        println!(
            "{} {}: {}",
            severity_tag(diagnostic.severity),
            diagnostic.component.bold(),
            diagnostic.issue
        );
        println!("  {}", diagnostic.description);
        for suggestion in &diagnostic.suggestions {
            println!("  * {}", suggestion);
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Printed width with ANSI escape sequences removed
    fn visible_len(s: &str) -> usize {
        let mut len = 0;
        let mut in_escape = false;
        for c in s.chars() {
            match (in_escape, c) {
                (false, '\x1b') => in_escape = true,
                (true, 'm') => in_escape = false,
                (true, _) => {}
                (false, _) => len += 1,
            }
        }
        len
    }

    #[test]
    fn test_visible_len_ignores_escapes() {
        assert_eq!(visible_len("\x1b[92m[PASS]\x1b[39m"), 6);
        assert_eq!(visible_len("[PASS]"), 6);
    }

    #[test]
    fn test_status_tags_share_a_column() {
        let statuses = [
            TestStatus::Pending,
            TestStatus::Running,
            TestStatus::Passed,
            TestStatus::Failed,
            TestStatus::Skipped,
            TestStatus::Timeout,
            TestStatus::Error,
        ];
        for status in statuses {
            let tag = status_tag(status);
            assert_eq!(visible_len(&tag), STATUS_WIDTH, "{:?}: {:?}", status, tag);
            assert!(tag.contains(&format!("[{}]", status_label(status))));
        }
        assert!(status_tag(TestStatus::Passed).contains("[PASS]   "));
    }

    #[test]
    fn test_service_tags_share_a_column() {
        for status in [ServiceStatus::Up, ServiceStatus::Down] {
            assert_eq!(visible_len(&service_tag(status)), SERVICE_WIDTH);
        }
        assert!(service_tag(ServiceStatus::Up).contains("[UP]  "));
    }
}
