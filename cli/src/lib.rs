//! # rucam-cli
//!
//! Wiring for the `rucam` binary: configuration layering, pipeline
//! assembly, and the work behind each subcommand. Kept in a library so the
//! end-to-end tests can drive a run with a scripted `ModelClient`.
//!
//! Configuration layers, lowest to highest priority:
//!
//! 1. built-in defaults
//! 2. environment (`OPENAI_MODEL`, `ARBITER_MODEL`, ...)
//! 3. the `--config` TOML file
//! 4. command-line flags

pub mod client;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use rucam_audit::{InMemoryStageTrail, ReportCollector, StageTrail};
use rucam_contracts::{
    error::{RucamError, RucamResult},
    verdict::{RucamVerdict, ValidationFailure},
};
use rucam_core::{
    config::PipelineConfig, orchestrator::PipelineOutcome, routing::Endpoint, traits::ModelClient,
    InstructionTemplate, Pipeline,
};
use rucam_ingest::CaseBundleBuilder;
use rucam_verify::{payload_from_text, RucamValidator};

use crate::client::{Credentials, HttpModelClient};

/// File name of the exported stage trail inside the output directory.
pub const TRAIL_FILE: &str = "stage_trail.json";

/// Command-line overrides for `rucam run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub prompt_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub arbiter_beta: bool,
    pub arbiter_gamma: bool,
    pub config_path: Option<PathBuf>,
    pub parallel: bool,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunReport {
    pub outcome: PipelineOutcome,
    pub trail: StageTrail,
    /// Files written to the output directory, if one was configured.
    pub written: Vec<PathBuf>,
}

/// Environment layer plus the optional TOML file.
pub fn load_config<F>(lookup: F, config_path: Option<&Path>) -> RucamResult<PipelineConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let config = PipelineConfig::from_lookup(lookup);
    match config_path {
        Some(path) => config.merge_file(path),
        None => Ok(config),
    }
}

/// Apply `rucam run` flags on top of a loaded configuration.
pub fn apply_options(mut config: PipelineConfig, options: &RunOptions) -> RucamResult<PipelineConfig> {
    if options.arbiter_beta {
        config.set_arbiter_enabled("beta", true)?;
    }
    if options.arbiter_gamma {
        config.set_arbiter_enabled("gamma", true)?;
    }
    if options.parallel {
        config.parallel_stages = true;
    }
    if let Some(path) = &options.prompt_path {
        config.prompt_path = Some(path.clone());
    }
    if let Some(dir) = &options.output_dir {
        config.output_dir = Some(dir.clone());
    }
    config.validate()?;
    Ok(config)
}

/// The production model client for `config`, with keys from `lookup`.
pub fn http_client<F>(config: &PipelineConfig, lookup: F) -> RucamResult<HttpModelClient>
where
    F: Fn(&str) -> Option<String>,
{
    let extra: Vec<String> = config.routes.iter().filter_map(|r| r.provider.clone()).collect();
    HttpModelClient::new(config.routing_table(), Credentials::from_lookup(lookup, &extra))
}

/// Run the full pipeline on `document` and persist its artifacts.
pub fn run_case(
    config: PipelineConfig,
    document: &Path,
    client: Arc<dyn ModelClient>,
) -> RucamResult<RunReport> {
    let template = InstructionTemplate::load(config.prompt_path.as_deref())?;
    let trail = InMemoryStageTrail::new();
    let output_dir = config.output_dir.clone();

    let pipeline = Pipeline::new(
        config,
        Arc::new(CaseBundleBuilder::with_default_adapters()),
        client,
        Arc::new(RucamValidator::new()),
        Arc::new(trail.clone()),
        template,
    );
    let outcome = pipeline.run(document)?;
    let exported = trail.export_trail();

    let mut written = Vec::new();
    if let Some(dir) = output_dir {
        written = ReportCollector::from_outcome(&outcome).persist(pipeline.config(), &dir)?;
        let trail_path = dir.join(TRAIL_FILE);
        std::fs::write(&trail_path, exported.to_json_pretty()?).map_err(|e| {
            RucamError::ReportWriteFailed {
                path: trail_path.display().to_string(),
                reason: e.to_string(),
            }
        })?;
        written.push(trail_path);
    }

    info!(
        run_id = %outcome.run_id,
        stages = outcome.stages.len(),
        verdicts = outcome.verdicts.len(),
        files = written.len(),
        "run complete"
    );

    Ok(RunReport { outcome, trail: exported, written })
}

/// Pretty-printed canonical bundle JSON for `document`.
pub fn bundle_json(document: &Path) -> RucamResult<String> {
    let bundle = CaseBundleBuilder::with_default_adapters().build(document)?;
    Ok(bundle.to_json_pretty())
}

/// Read a text input named on the command line.
///
/// A missing file is `DocumentNotFound`; any other read error is
/// `DocumentUnreadable` with the underlying reason.
pub fn read_input(path: &Path) -> RucamResult<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RucamError::DocumentNotFound {
            path: path.display().to_string(),
        },
        _ => RucamError::DocumentUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        },
    })
}

/// Validate a verdict JSON document or an arbiter report.
///
/// Returns every failure found, not just the first.
pub fn validate_text(text: &str) -> Result<RucamVerdict, Vec<ValidationFailure>> {
    let payload = payload_from_text(text).map_err(|failure| vec![failure])?;
    let validator = RucamValidator::new();
    let failures = validator.check(&payload);
    if !failures.is_empty() {
        return Err(failures);
    }
    validator.validate(&payload).map_err(|failure| vec![failure])
}

/// `rucam route` output: `<base_url>\t<provider>`, `default` for absent parts.
pub fn describe_endpoint(endpoint: &Endpoint) -> String {
    format!(
        "{}\t{}",
        endpoint.base_url.as_deref().unwrap_or("default"),
        endpoint.provider.as_deref().unwrap_or("default")
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rucam_core::routing::RoutingTable;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn file_layer_overrides_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rucam.toml");
        std::fs::write(&path, "temperature = 0.0\n\n[[arbiters]]\nname = \"alpha\"\nmodel = \"claude-opus\"\n")
            .unwrap();

        let config = load_config(env(&[("ARBITER_MODEL", "gpt-5.2")]), Some(&path)).unwrap();
        let alpha = config.arbiters.iter().find(|a| a.name == "alpha").unwrap();
        assert_eq!(alpha.model, "claude-opus");
    }

    #[test]
    fn flags_enable_ensemble_arbiters() {
        let options = RunOptions { arbiter_beta: true, parallel: true, ..RunOptions::default() };
        let config = apply_options(PipelineConfig::default(), &options).unwrap();
        let enabled: Vec<String> = config.enabled_arbiters().map(|a| a.stage_key()).collect();
        assert_eq!(enabled, vec!["arbiter_alpha", "arbiter_beta"]);
        assert!(config.parallel_stages);
    }

    #[test]
    fn route_description_marks_defaults() {
        let table = RoutingTable::default();
        assert_eq!(describe_endpoint(&table.resolve("gpt-5.2")), "default\tdefault");
        assert_eq!(
            describe_endpoint(&table.resolve("deepseek-reasoner")),
            "https://api.deepseek.com\tdeepseek"
        );
    }

    #[test]
    fn validate_text_reports_all_failures() {
        let text = r#"{"injury_pattern": "viral", "R_ratio": -2, "rucam_scores": {
            "time_to_onset": 1, "course": 1, "risk_factors": 0, "concomitant_drugs": 0,
            "alternative_causes_excluded": 0, "known_hepatotoxicity": 0, "rechallenge": 0},
            "total_score": 2, "category": "Unlikely"}"#;
        let failures = validate_text(text).unwrap_err();
        assert_eq!(failures.len(), 2, "failures: {:?}", failures);
    }

    #[test]
    fn input_read_errors_are_distinguished() {
        let dir = tempfile::tempdir().unwrap();
        let missing = read_input(&dir.path().join("absent.md"));
        assert!(matches!(missing, Err(RucamError::DocumentNotFound { .. })));

        // Reading a directory fails with something other than NotFound.
        match read_input(dir.path()) {
            Err(RucamError::DocumentUnreadable { path, reason }) => {
                assert_eq!(path, dir.path().display().to_string());
                assert!(!reason.is_empty());
            }
            other => panic!("expected DocumentUnreadable, got {:?}", other),
        }
    }

    #[test]
    fn missing_document_fails_bundle() {
        let result = bundle_json(Path::new("/nonexistent/case.pdf"));
        assert!(matches!(result, Err(RucamError::DocumentNotFound { .. })));
    }
}
