//! Error types for the test runner

use thiserror::Error;

use crate::a11y::Violation;

/// Failures reported by a driver adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("No element matches `{selector}`")]
    NotFound { selector: String },

    #[error("Element `{selector}` is not interactable: {reason}")]
    NotInteractable { selector: String, reason: String },

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("WebDriver error ({code}): {message}")]
    Protocol { code: String, message: String },

    #[error("Browser session lost: {0}")]
    SessionLost(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl DriverError {
    /// Errors after which the browser session cannot be used any more
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::SessionLost(_) | DriverError::Transport(_))
    }
}

impl From<pagecheck_common::Error> for DriverError {
    fn from(e: pagecheck_common::Error) -> Self {
        DriverError::InvalidSelector(e.to_string())
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(e: reqwest::Error) -> Self {
        DriverError::Transport(e.to_string())
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Command `{0}` is already registered")]
    DuplicateCommand(String),

    #[error("Unknown command `{0}`")]
    UnknownCommand(String),

    #[error("Command `{command}` expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        command: String,
        expected: usize,
        actual: usize,
    },

    #[error("Command nesting deeper than {0} levels")]
    CommandRecursion(usize),

    #[error("Timed out after {elapsed_ms} ms waiting for `{selector}` to {expected}; last observed: {actual}")]
    AssertionTimeout {
        selector: String,
        expected: String,
        actual: String,
        elapsed_ms: u64,
    },

    #[error("{} accessibility violation(s): {}", .violations.len(), summarize(.violations))]
    AccessibilityViolation { violations: Vec<Violation> },

    #[error("Unknown accessibility rule `{0}`")]
    UnknownRule(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("Step failed: {step} - {source}")]
    StepFailed {
        step: String,
        #[source]
        source: Box<E2eError>,
    },

    #[error("Suite not found: {0}")]
    SuiteNotFound(String),

    #[error("Test spec parse error: {0}")]
    SpecParse(String),

    #[error("Config error: {0}")]
    Config(#[from] pagecheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} ({} node(s))", v.rule, v.nodes.len()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl E2eError {
    pub fn step(step: impl Into<String>, source: E2eError) -> Self {
        E2eError::StepFailed {
            step: step.into(),
            source: Box::new(source),
        }
    }

    /// The underlying error with step wrappers removed
    pub fn root(&self) -> &E2eError {
        match self {
            E2eError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Names of the steps that were executing, outermost first
    pub fn trail(&self) -> Vec<String> {
        let mut trail = Vec::new();
        let mut current = self;
        while let E2eError::StepFailed { step, source } = current {
            trail.push(step.clone());
            current = source;
        }
        trail
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.root(), E2eError::Driver(e) if e.is_fatal())
    }

    /// Error kind as shown in reports
    pub fn kind(&self) -> &'static str {
        match self.root() {
            E2eError::DuplicateCommand(_) => "DuplicateCommandError",
            E2eError::UnknownCommand(_) => "UnknownCommandError",
            E2eError::ArityMismatch { .. } => "ArityMismatchError",
            E2eError::CommandRecursion(_) => "CommandRecursionError",
            E2eError::AssertionTimeout { .. } => "AssertionTimeoutError",
            E2eError::AccessibilityViolation { .. } => "AccessibilityViolationError",
            E2eError::UnknownRule(_) => "UnknownRuleError",
            E2eError::Driver(_) => "DriverError",
            E2eError::SuiteNotFound(_) => "SuiteNotFoundError",
            E2eError::SpecParse(_) | E2eError::Yaml(_) => "SpecParseError",
            E2eError::Config(_) => "ConfigError",
            E2eError::Io(_) => "IoError",
            E2eError::Json(_) => "JsonError",
            E2eError::StepFailed { .. } => "StepFailedError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trail_and_root() {
        let err = E2eError::step(
            "invoke:login",
            E2eError::step(
                "click:button containing \"Login\"",
                DriverError::SessionLost("chrome exited".into()).into(),
            ),
        );
        assert_eq!(err.trail(), ["invoke:login", "click:button containing \"Login\""]);
        assert_eq!(err.kind(), "DriverError");
        assert!(err.is_fatal());
    }

    #[test]
    fn test_non_fatal_driver_error() {
        let err: E2eError = DriverError::NotFound {
            selector: "input".into(),
        }
        .into();
        assert!(!err.is_fatal());
        assert!(err.trail().is_empty());
    }
}
