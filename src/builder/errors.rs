//! Build error types and diagnostics.

use std::path::PathBuf;

use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error raised while planning or running build units.
///
/// `Configuration` is fatal and reported before any unit runs; every other
/// kind is scoped to the unit it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    #[error("toolchain not found: {message}")]
    ToolchainNotFound { message: String },

    #[error("unsupported target `{target}`: {reason}")]
    UnsupportedTarget { target: String, reason: String },

    #[error("I/O failure on `{}`: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("build timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("go build exited with {}", exit_description(*code))]
    BuildFailure {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("build cancelled")]
    Cancelled,
}

fn exit_description(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

impl BuildError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BuildError::Configuration {
            message: message.into(),
        }
    }

    pub fn toolchain_not_found(message: impl Into<String>) -> Self {
        BuildError::ToolchainNotFound {
            message: message.into(),
        }
    }

    pub fn unsupported(target: impl ToString, reason: impl Into<String>) -> Self {
        BuildError::UnsupportedTarget {
            target: target.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        BuildError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Whether this error aborts the whole invocation rather than one unit.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuildError::Configuration { .. })
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            BuildError::Configuration { .. } => {
                diag.with_suggestion(suggestions::CHECK_MANIFEST)
            }
            BuildError::ToolchainNotFound { .. } => diag
                .with_suggestion(suggestions::INSTALL_GO)
                .with_suggestion(suggestions::SET_NDK),
            BuildError::UnsupportedTarget { .. } => {
                diag.with_suggestion(suggestions::LIST_TARGETS)
            }
            BuildError::Io { path, .. } => diag.with_location(path.clone()),
            BuildError::Timeout { .. } => diag.with_suggestion(suggestions::RAISE_TIMEOUT),
            BuildError::BuildFailure { diagnostics, .. } => {
                let mut diag = diag;
                for line in diagnostics.lines().filter(|l| !l.trim().is_empty()) {
                    diag = diag.with_context(line);
                }
                diag
            }
            BuildError::Cancelled => diag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(BuildError::configuration("bad").is_fatal());
        assert!(!BuildError::Timeout { seconds: 1 }.is_fatal());
        assert!(!BuildError::toolchain_not_found("no go").is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = BuildError::BuildFailure {
            code: Some(2),
            diagnostics: String::new(),
        };
        assert_eq!(err.to_string(), "go build exited with status 2");

        let err = BuildError::unsupported("darwin/386", "not a Go port");
        assert_eq!(
            err.to_string(),
            "unsupported target `darwin/386`: not a Go port"
        );
    }

    #[test]
    fn test_build_failure_diagnostic_keeps_output() {
        let err = BuildError::BuildFailure {
            code: Some(1),
            diagnostics: "./main.go:3:1: syntax error\n\n".to_string(),
        };
        let text = err.to_diagnostic().format(false);
        assert!(text.contains("./main.go:3:1: syntax error"));
    }
}
