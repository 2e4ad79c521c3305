//! Runtime error types for the RUCAM pipeline.
//!
//! All fallible operations return `RucamResult<T>`. Variants carry the path,
//! stage, or field needed to diagnose a failure without re-running.

use thiserror::Error;

use crate::verdict::ValidationFailure;

/// The unified error type for the RUCAM workspace.
#[derive(Debug, Error)]
pub enum RucamError {
    /// The input document does not resolve to an existing file.
    ///
    /// Raised before any stage runs.
    #[error("document not found: {path}")]
    DocumentNotFound { path: String },

    /// The input file exists but could not be read.
    #[error("document '{path}' unreadable: {reason}")]
    DocumentUnreadable { path: String, reason: String },

    /// The instruction template could not be read.
    #[error("instruction template '{path}' unavailable: {reason}")]
    TemplateUnavailable { path: String, reason: String },

    /// An extractor adapter could not read the document at all.
    ///
    /// The bundle builder records this as a note; it never aborts a build.
    #[error("extractor '{adapter}' failed: {reason}")]
    ExtractionFailed { adapter: String, reason: String },

    /// The external model-invocation collaborator returned an error.
    #[error("model '{model}' invocation failed: {reason}")]
    ModelInvocation { model: String, reason: String },

    /// A pipeline stage failed; the run is aborted.
    #[error("stage '{stage}' failed: {reason}")]
    StageFailed { stage: String, reason: String },

    /// A stage lifecycle edge was illegal or a dependency was not satisfied.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },

    /// A configuration value is missing or invalid, or the stage graph is malformed.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// An arbiter's structured verdict was rejected.
    #[error("verdict from stage '{stage}' failed validation: {failure}")]
    Validation {
        stage: String,
        failure: ValidationFailure,
    },

    /// A report file could not be written.
    #[error("report write to '{path}' failed: {reason}")]
    ReportWriteFailed { path: String, reason: String },

    /// The stage trail rejected a record.
    #[error("stage trail write failed: {reason}")]
    AuditWriteFailed { reason: String },

    #[error("serialization error: {reason}")]
    Serialization { reason: String },
}

/// Convenience alias used throughout the RUCAM crates.
pub type RucamResult<T> = Result<T, RucamError>;
