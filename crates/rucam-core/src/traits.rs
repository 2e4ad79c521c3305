//! Seam traits for the RUCAM pipeline.
//!
//! The orchestrator only talks to the outside world through these traits:
//!
//! - `BundleSource`    : deterministic ingestion (document → case bundle)
//! - `BlockExtractor`  : one text-block adapter, capability-checked
//! - `TableExtractor`  : one table adapter, capability-checked
//! - `ModelClient`     : the external model-invocation collaborator (opaque)
//! - `VerdictValidator`: trusted checker for arbiter reports
//! - `StageAuditor`    : append-only sink for stage lifecycle records
//!
//! Everything behind `ModelClient` is untrusted: its text is never parsed by
//! the orchestrator, only handed to the validator.

use std::path::Path;

use rucam_contracts::{
    bundle::{CaseBundle, EvidenceBlock, EvidenceTable},
    error::RucamResult,
    extract::Extraction,
    stage::{RunId, StageRecord},
    verdict::{RucamVerdict, ValidationFailure},
};

/// Produces the canonical case bundle for one document.
///
/// Implementations must be deterministic: the same file yields the same
/// bundle. A missing file is `RucamError::DocumentNotFound`; any other
/// extraction trouble degrades into notes rather than an error.
pub trait BundleSource: Send + Sync {
    fn build(&self, document: &Path) -> RucamResult<CaseBundle>;
}

/// One text-block extractor adapter.
///
/// The bundle builder consults `is_available()` before calling `extract()`.
/// An unavailable adapter is skipped with a note; it is never an error.
pub trait BlockExtractor: Send + Sync {
    /// Short adapter name used in notes and log fields.
    fn name(&self) -> &str;

    /// True when the underlying capability was compiled in and usable.
    fn is_available(&self) -> bool;

    /// Extract blocks in physical page order.
    ///
    /// Returns `Err` only when no strategy could even open the document. A
    /// document that opens but yields nothing is `Ok` with empty items and
    /// notes recording every attempt.
    fn extract(&self, document: &Path) -> RucamResult<Extraction<EvidenceBlock>>;
}

/// One table extractor adapter. Same contract as `BlockExtractor`.
pub trait TableExtractor: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    /// Extract tables in page order. `table_index` values start at 1.
    fn extract(&self, document: &Path) -> RucamResult<Extraction<EvidenceTable>>;
}

/// The external model-invocation collaborator.
///
/// Routing of `model` to an endpoint is the implementation's concern. Retries,
/// if any, also belong here; the orchestrator never retries.
pub trait ModelClient: Send + Sync {
    fn invoke(&self, model: &str, prompt: &str, temperature: f64) -> RucamResult<String>;
}

/// Checks an arbiter report before its stage may complete.
pub trait VerdictValidator: Send + Sync {
    /// Extract and validate the structured verdict embedded in `report`.
    ///
    /// `analyst_reports` holds the text of every analysis stage, in schedule
    /// order. Implementations use them to decide whether the report must
    /// justify a disagreement.
    fn check_arbiter_report(
        &self,
        report: &str,
        analyst_reports: &[&str],
    ) -> Result<RucamVerdict, ValidationFailure>;
}

/// The stage trail: one record per lifecycle transition.
///
/// A failed write is fatal to the run.
pub trait StageAuditor: Send + Sync {
    /// Append one record. Records are never modified afterwards.
    fn record(&self, record: &StageRecord) -> RucamResult<()>;

    /// Called once after every stage has completed.
    fn finalize(&self, run_id: &RunId) -> RucamResult<()>;
}
