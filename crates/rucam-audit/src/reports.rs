//! Report capture and markdown persistence.
//!
//! `ReportCollector` holds the text output of every model-backed stage,
//! keyed by stage identity in schedule order. `persist` writes each
//! non-empty report to the file name the configuration assigns it.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use rucam_contracts::{
    error::{RucamError, RucamResult},
    stage::{StageId, StageKind},
};
use rucam_core::{config::PipelineConfig, orchestrator::PipelineOutcome};

/// Text reports keyed by stage identity.
#[derive(Debug, Clone, Default)]
pub struct ReportCollector {
    reports: Vec<(StageId, String)>,
}

impl ReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the analysis and arbitration outputs of a finished run.
    pub fn from_outcome(outcome: &PipelineOutcome) -> Self {
        let mut collector = Self::new();
        for stage in &outcome.stages {
            if stage.kind != StageKind::Ingestion {
                collector.insert(stage.id.clone(), stage.output.to_text());
            }
        }
        collector
    }

    /// Insert or replace the report for `stage`.
    pub fn insert(&mut self, stage: StageId, text: impl Into<String>) {
        let text = text.into();
        match self.reports.iter_mut().find(|(id, _)| *id == stage) {
            Some((_, existing)) => *existing = text,
            None => self.reports.push((stage, text)),
        }
    }

    pub fn get(&self, stage: &str) -> Option<&str> {
        self.reports
            .iter()
            .find(|(id, _)| id.as_str() == stage)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StageId, &str)> {
        self.reports.iter().map(|(id, text)| (id, text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Write every non-empty report into `dir`, creating it if needed.
    ///
    /// Stages without a configured file name are skipped. Returns the paths
    /// written, in collection order.
    pub fn persist(&self, config: &PipelineConfig, dir: &Path) -> RucamResult<Vec<PathBuf>> {
        std::fs::create_dir_all(dir).map_err(|e| RucamError::ReportWriteFailed {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut written = Vec::new();
        for (stage, text) in self.iter() {
            if text.trim().is_empty() {
                debug!(stage = %stage, "empty report skipped");
                continue;
            }
            let Some(file_name) = report_file_name(config, stage.as_str()) else {
                debug!(stage = %stage, "no report file configured");
                continue;
            };

            let path = dir.join(file_name);
            std::fs::write(&path, text).map_err(|e| RucamError::ReportWriteFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            written.push(path);
        }

        info!(dir = %dir.display(), reports = written.len(), "reports persisted");
        Ok(written)
    }
}

/// The file name the configuration assigns to `stage`, if any.
pub fn report_file_name(config: &PipelineConfig, stage: &str) -> Option<String> {
    if let Some(analyst) = config.analysts.iter().find(|a| a.key == stage) {
        return Some(analyst.report_file.clone());
    }
    config
        .arbiters
        .iter()
        .find(|arbiter| arbiter.stage_key() == stage)
        .map(|arbiter| arbiter.report_file())
}
