//! # rucam-contracts
//!
//! Shared types, wire formats, and the error taxonomy for the RUCAM
//! causality-assessment pipeline.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions, derived values, and error types.

pub mod bundle;
pub mod error;
pub mod extract;
pub mod stage;
pub mod verdict;
