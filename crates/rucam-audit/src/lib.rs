//! # rucam-audit
//!
//! Stage trail and report persistence for RUCAM pipeline runs.
//!
//! ## Overview
//!
//! Every stage transition the pipeline records is wrapped in a `TrailEntry`
//! that links to the previous entry via its SHA-256 hash. Changing a single
//! byte of any entry breaks the chain, and `verify_chain` detects it.
//!
//! `ReportCollector` gathers each model-backed stage's text and writes the
//! non-empty ones as markdown files.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rucam_audit::{InMemoryStageTrail, ReportCollector};
//!
//! let trail = InMemoryStageTrail::new();
//! // hand `trail.clone()` to the pipeline as its `StageAuditor`
//! let outcome = pipeline.run(path)?;
//! assert!(trail.verify_integrity());
//! ReportCollector::from_outcome(&outcome).persist(&config, out_dir)?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;
pub mod reports;

pub use chain::{digest_output, hash_entry, verify_chain};
pub use event::{StageTrail, TrailEntry};
pub use memory::InMemoryStageTrail;
pub use reports::{report_file_name, ReportCollector};

// ── Tests ─────────────────────────────────────────────────────────────────────
