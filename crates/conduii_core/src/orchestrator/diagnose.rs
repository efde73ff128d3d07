//! Failure diagnosis.
//!
//! Ordered rules over the error message of FAILED and ERROR results; the
//! first matching rule wins and unmatched failures get a generic entry.

use crate::types::{DiagnosticResult, Severity, TestResult, TestStatus, TestSuiteResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

struct Rule {
    pattern: Regex,
    severity: Severity,
    issue: &'static str,
    description: &'static str,
    suggestions: &'static [&'static str],
}

static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    let rule = |pattern: &str,
                severity: Severity,
                issue: &'static str,
                description: &'static str,
                suggestions: &'static [&'static str]| Rule {
        pattern: Regex::new(pattern).unwrap(),
        severity,
        issue,
        description,
        suggestions,
    };

    vec![
        rule(
            r"(?i)ECONNREFUSED|connection refused",
            Severity::Critical,
            "Connection Refused",
            "The service actively refused the connection",
            &[
                "Check that the service is running",
                "Verify the host and port in your configuration",
                "Check firewall and security group rules",
            ],
        ),
        rule(
            r"(?i)ENOTFOUND|EAI_AGAIN|dns error|failed to lookup address|name or service not known",
            Severity::Critical,
            "Host Not Found",
            "The service hostname could not be resolved",
            &[
                "Check the hostname for typos",
                "Verify DNS records for the domain",
                "Confirm the environment URL points at a deployed instance",
            ],
        ),
        rule(
            r"(?i)\b401\b|unauthori[sz]ed",
            Severity::Error,
            "Authentication Failed",
            "The service rejected the provided credentials",
            &[
                "Check that API keys and secrets are set for this environment",
                "Verify the credentials have not expired or been rotated",
                "Make sure test and live keys are not mixed up",
            ],
        ),
        rule(
            r"(?i)\b403\b|forbidden",
            Severity::Error,
            "Permission Denied",
            "The credentials are valid but lack access to this resource",
            &[
                "Check the permissions or scopes granted to the API key",
                "Verify IP allow-lists for the service",
            ],
        ),
        rule(
            r"(?i)timeout|timed out|ETIMEDOUT",
            Severity::Warning,
            "Request Timeout",
            "The service did not respond in time",
            &[
                "Check service latency and load",
                "Increase the test timeout if the operation is expected to be slow",
                "Look for network issues between the runner and the service",
            ],
        ),
        rule(
            r"(?i)\b404\b",
            Severity::Warning,
            "Endpoint Not Found",
            "The requested route does not exist on the target environment",
            &[
                "Check that the latest version is deployed",
                "Verify the endpoint path and base URL",
            ],
        ),
        rule(
            r"\b5\d\d\b",
            Severity::Error,
            "Server Error",
            "The service returned a server-side error",
            &[
                "Check the application logs for the failing request",
                "Verify downstream dependencies of the endpoint are healthy",
            ],
        ),
    ]
});

const GENERIC_ISSUE: &str = "Test Failed";
const GENERIC_SUGGESTIONS: &[&str] = &[
    "Review the error message and test configuration",
    "Re-run the test to check whether the failure is intermittent",
];

/// Diagnose a single failed or errored result
pub fn diagnose_result(result: &TestResult) -> DiagnosticResult {
    let message = result.error_message().unwrap_or("no error message");
    let component = result
        .metadata
        .get("adapter")
        .and_then(Value::as_str)
        .unwrap_or(&result.name)
        .to_string();

    match RULES.iter().find(|r| r.pattern.is_match(message)) {
        Some(rule) => DiagnosticResult {
            severity: rule.severity,
            component,
            issue: rule.issue.to_string(),
            description: format!("{}: {}", rule.description, message),
            suggestions: rule.suggestions.iter().map(|s| s.to_string()).collect(),
        },
        None => DiagnosticResult {
            severity: Severity::Error,
            component,
            issue: GENERIC_ISSUE.to_string(),
            description: message.to_string(),
            suggestions: GENERIC_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        },
    }
}

/// One diagnostic per FAILED or ERROR test, in suite order
pub fn diagnose_suite(suite: &TestSuiteResult) -> Vec<DiagnosticResult> {
    suite
        .tests
        .iter()
        .filter(|t| matches!(t.status, TestStatus::Failed | TestStatus::Error))
        .map(diagnose_result)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TestConfig, TestError, TestType};

    fn failed(message: &str) -> TestResult {
        let mut result = TestResult::skipped(&TestConfig::new("t", "db health", TestType::Health), "");
        result.status = TestStatus::Failed;
        result.error = Some(TestError::new(message));
        result
    }

    fn issue(message: &str) -> (Severity, String) {
        let d = diagnose_result(&failed(message));
        (d.severity, d.issue)
    }

    #[test]
    fn test_connection_refused() {
        let diagnostic = diagnose_result(&failed("connect ECONNREFUSED 127.0.0.1:5432"));
        assert_eq!(diagnostic.severity, Severity::Critical);
        assert_eq!(diagnostic.issue, "Connection Refused");
        assert_eq!(diagnostic.component, "db health");
        assert!(!diagnostic.suggestions.is_empty());
        assert!(diagnostic.description.contains("127.0.0.1:5432"));
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(
            issue("tcp connect error: Connection refused (os error 111)"),
            (Severity::Critical, "Connection Refused".into())
        );
        assert_eq!(
            issue("getaddrinfo ENOTFOUND api.example.test"),
            (Severity::Critical, "Host Not Found".into())
        );
        assert_eq!(
            issue("Expected status 200, got 401"),
            (Severity::Error, "Authentication Failed".into())
        );
        assert_eq!(
            issue("403 Forbidden"),
            (Severity::Error, "Permission Denied".into())
        );
        assert_eq!(
            issue("Test timed out after 30000ms"),
            (Severity::Warning, "Request Timeout".into())
        );
        assert_eq!(
            issue("Expected status 200, got 404"),
            (Severity::Warning, "Endpoint Not Found".into())
        );
        assert_eq!(
            issue("Expected status 200, got 503"),
            (Severity::Error, "Server Error".into())
        );
        assert_eq!(
            issue("assertion failed: body.ok"),
            (Severity::Error, "Test Failed".into())
        );
    }

    #[test]
    fn test_first_rule_wins() {
        // Refused connections are reported even when a timeout is also mentioned
        assert_eq!(
            issue("ECONNREFUSED after connect timeout"),
            (Severity::Critical, "Connection Refused".into())
        );
    }

    #[test]
    fn test_component_prefers_adapter() {
        let mut result = failed("Service unhealthy");
        result
            .metadata
            .insert("adapter".to_string(), Value::from("postgres"));
        assert_eq!(diagnose_result(&result).component, "postgres");
    }
}
