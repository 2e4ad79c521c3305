//! Pipeline stage identity, lifecycle, and output types.
//!
//! These types describe the data flowing between pipeline stages. The
//! orchestrator treats stage outputs as opaque; only the validator looks
//! inside an arbiter's text.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable string key for one stage, e.g. `case_bundle`, `gpt_52`, `arbiter_alpha`.
///
/// Used for dependency edges, output slots, audit records, and report files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId(pub String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one pipeline run. Appears in every audit record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub uuid::Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a stage does. Determines which inputs it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Builds the case bundle from the source document.
    Ingestion,
    /// Applies the instruction template to the bundle.
    Analysis,
    /// Reconciles every analysis into one verdict.
    Arbitration,
}

/// Per-stage lifecycle: `Pending -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageStatus {
    /// True when `self -> next` is a legal lifecycle edge.
    pub fn can_transition_to(self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Pending, StageStatus::Running)
                | (StageStatus::Running, StageStatus::Completed)
                | (StageStatus::Running, StageStatus::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Failed)
    }
}

/// The output of a completed stage.
///
/// Each producer commits to exactly one shape. Consumers that need text use
/// `to_text()`, which renders structured payloads as pretty JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum StageOutput {
    Text(String),
    Structured(serde_json::Value),
}

impl StageOutput {
    pub fn to_text(&self) -> String {
        match self {
            StageOutput::Text(text) => text.clone(),
            StageOutput::Structured(value) => serde_json::to_string_pretty(value)
                .unwrap_or_else(|_| value.to_string()),
        }
    }

    /// Borrow the text without rendering; `None` for structured output.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            StageOutput::Text(text) => Some(text),
            StageOutput::Structured(_) => None,
        }
    }

    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            StageOutput::Structured(value) => Some(value),
            StageOutput::Text(_) => None,
        }
    }

    /// True when the output carries no reportable content.
    pub fn is_blank(&self) -> bool {
        match self {
            StageOutput::Text(text) => text.trim().is_empty(),
            StageOutput::Structured(value) => value.is_null(),
        }
    }
}

/// An immutable record of one stage lifecycle event, written to the trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub run_id: RunId,
    pub stage: StageId,
    pub kind: StageKind,
    pub status: StageStatus,
    /// Present only on `Completed`.
    pub output: Option<StageOutput>,
    /// Failure reason, present only on `Failed`.
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}
