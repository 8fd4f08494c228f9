//! Build event types for JSON output.
//!
//! Emitted one object per line with `--message-format json`. Every event
//! carries a `reason` tag. New fields may be added; existing ones are not
//! renamed or removed.

use std::path::PathBuf;

use serde::Serialize;

use crate::builder::executor::{BuildResult, BuildStatus};

/// A build event emitted during the build process.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum BuildEvent {
    /// The matrix was expanded and units are about to be scheduled.
    #[serde(rename = "build-started")]
    BuildStarted {
        units: Vec<String>,
    },

    /// `go build` started for a unit.
    #[serde(rename = "unit-started")]
    UnitStarted {
        unit: String,
        target: String,
    },

    /// A unit reached a terminal state.
    #[serde(rename = "unit-finished")]
    UnitFinished {
        unit: String,
        target: String,
        status: BuildStatus,
        artifact: PathBuf,
        /// Whether the artifact was produced by this run (vs cached)
        fresh: bool,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(skip_serializing_if = "String::is_empty")]
        diagnostics: String,
    },

    /// Build completed (success or failure).
    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        duration_ms: u64,
        built: usize,
        skipped: usize,
        failed: usize,
    },
}

impl BuildEvent {
    pub fn started(units: Vec<String>) -> Self {
        BuildEvent::BuildStarted { units }
    }

    pub fn unit_started(unit: impl Into<String>, target: impl ToString) -> Self {
        BuildEvent::UnitStarted {
            unit: unit.into(),
            target: target.to_string(),
        }
    }

    pub fn unit_finished(result: &BuildResult) -> Self {
        BuildEvent::UnitFinished {
            unit: result.name.clone(),
            target: result.unit.target.to_string(),
            status: result.status,
            artifact: result.artifact.clone(),
            fresh: result.status == BuildStatus::Succeeded,
            duration_ms: result.duration.as_millis() as u64,
            error: result.error.as_ref().map(ToString::to_string),
            diagnostics: result.diagnostics.clone(),
        }
    }

    pub fn finished(
        success: bool,
        duration_ms: u64,
        built: usize,
        skipped: usize,
        failed: usize,
    ) -> Self {
        BuildEvent::BuildFinished {
            success,
            duration_ms,
            built,
            skipped,
            failed,
        }
    }

    /// Serialize this event to a JSON string.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
