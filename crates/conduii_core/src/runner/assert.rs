//! Assertion helpers for test functions.
//!
//! Each helper returns `Err(AssertionError)` on violation so a test can
//! fail fast with `?`. An assertion failure marks the test FAILED; any
//! other error marks it ERROR.

use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct AssertionError {
    pub message: String,
}

impl AssertionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn ok(condition: bool, message: &str) -> Result<(), AssertionError> {
    if condition {
        Ok(())
    } else {
        Err(AssertionError::new(message))
    }
}

pub fn status_code(actual: u16, expected: u16) -> Result<(), AssertionError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "Expected status {}, got {}",
            expected, actual
        )))
    }
}

/// `actual_ms` must not exceed `budget_ms`
pub fn response_time(actual_ms: u64, budget_ms: u64) -> Result<(), AssertionError> {
    if actual_ms <= budget_ms {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "Response time {}ms exceeded {}ms",
            actual_ms, budget_ms
        )))
    }
}

pub fn equal<T: PartialEq + Debug>(actual: T, expected: T, what: &str) -> Result<(), AssertionError> {
    if actual == expected {
        Ok(())
    } else {
        Err(AssertionError::new(format!(
            "{}: expected {:?}, got {:?}",
            what, expected, actual
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok() {
        assert!(ok(true, "unused").is_ok());
        assert_eq!(ok(false, "service unhealthy").unwrap_err().message, "service unhealthy");
    }

    #[test]
    fn test_status_code() {
        assert!(status_code(200, 200).is_ok());
        assert_eq!(
            status_code(500, 200).unwrap_err().to_string(),
            "Expected status 200, got 500"
        );
    }

    #[test]
    fn test_response_time_budget_is_inclusive() {
        assert!(response_time(5000, 5000).is_ok());
        assert!(response_time(5001, 5000).is_err());
    }

    #[test]
    fn test_equal() {
        assert!(equal("a", "a", "body").is_ok());
        assert_eq!(
            equal(1, 2, "count").unwrap_err().message,
            "count: expected 2, got 1"
        );
    }
}
