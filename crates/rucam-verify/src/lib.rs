//! # rucam-verify
//!
//! Verdict validation for RUCAM arbiter output.
//!
//! This crate provides [`engine::RucamValidator`], which implements the
//! [`rucam_core::traits::VerdictValidator`] trait. It validates candidate
//! verdicts in two phases:
//!
//! 1. **Structural**: JSON Schema validation via the `jsonschema` crate.
//! 2. **Semantic**: closed enumerations, numeric bounds, and the
//!    `total_score` sum invariant.
//!
//! Report text is handled by [`extract`] (finding the structured result) and
//! [`sections`] (the `SECTION A`..`SECTION D` layout).
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use rucam_verify::RucamValidator;
//!
//! let verdict = RucamValidator::new().validate_text(&arbiter_report)?;
//! println!("{} ({})", verdict.category, verdict.total_score);
//! ```

pub mod engine;
pub mod extract;
pub mod sections;

pub use engine::{validate, verdict_schema, RucamValidator};
pub use extract::payload_from_text;
pub use sections::{analysts_disagree, ReportSections, Section};
