//! # rucam-ingest
//!
//! Deterministic ingestion: one PDF in, one canonical `CaseBundle` out.
//!
//! This crate provides:
//! - The extractor adapters (`LayoutExtractor`, `FallbackExtractor`,
//!   `HeuristicTableExtractor`), each behind a cargo feature
//! - `merge_blocks`, the dedup-and-sort step
//! - `CaseBundleBuilder`, the adapter registry that implements `BundleSource`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rucam_ingest::CaseBundleBuilder;
//!
//! let bundle = CaseBundleBuilder::with_default_adapters().build(Path::new("case.pdf"))?;
//! println!("{}", bundle.to_json_pretty());
//! ```

pub mod adapters;
pub mod builder;
pub mod merge;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use adapters::{FallbackExtractor, HeuristicTableExtractor, LayoutExtractor};
pub use builder::CaseBundleBuilder;
pub use merge::merge_blocks;
