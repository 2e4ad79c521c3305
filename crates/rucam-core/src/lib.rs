//! # rucam-core
//!
//! The deterministic orchestration layer for RUCAM causality assessment.
//!
//! This crate provides:
//! - The seam traits (`BundleSource`, `BlockExtractor`, `TableExtractor`,
//!   `ModelClient`, `VerdictValidator`, `StageAuditor`)
//! - `PipelineConfig`, built once and passed by reference
//! - `resolve_endpoint` and the `RoutingTable` for model identifiers
//! - The instruction template and prompt rendering
//! - The `Pipeline` that runs the stage graph in dependency order
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rucam_core::{Pipeline, PipelineConfig, InstructionTemplate};
//!
//! let config = PipelineConfig::from_lookup(|k| std::env::var(k).ok());
//! let pipeline = Pipeline::new(config, source, client, validator, auditor, template);
//! let outcome = pipeline.run(Path::new("case.pdf"))?;
//! ```

pub mod config;
pub mod orchestrator;
pub mod prompts;
pub mod routing;
pub mod template;
pub mod traits;

pub use config::{AnalystConfig, ArbiterConfig, PipelineConfig};
pub use orchestrator::{CompletedStage, Pipeline, PipelineOutcome, StageGraph, StageSpec};
pub use routing::{resolve_endpoint, Endpoint, RouteRule, RoutingTable};
pub use template::InstructionTemplate;
