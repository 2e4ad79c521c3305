//! The RUCAM task pipeline: ingestion → analysts → arbiters.
//!
//! The pipeline enforces the stage model:
//!
//!   Graph → Schedule → (Pending → Running → Completed | Failed) per stage → Outcome
//!
//! Stages form a DAG. Analysts depend only on ingestion; arbiters depend on
//! every analyst and never on each other. `StageGraph::schedule()` collapses
//! the DAG to one sequential order. With `parallel_stages` the stages of one
//! tier run on worker threads, each writing to its own slot keyed by stage
//! identity; the first failure aborts the run without waiting for the rest.
//!
//! Any failure aborts the run. No partial outcome is returned and nothing is
//! retried here.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;

use chrono::Utc;
use tracing::{debug, info, warn};

use rucam_contracts::{
    bundle::CaseBundle,
    error::{RucamError, RucamResult},
    stage::{RunId, StageId, StageKind, StageOutput, StageRecord, StageStatus},
    verdict::RucamVerdict,
};

use crate::config::PipelineConfig;
use crate::prompts::{analysis_prompt, arbiter_prompt};
use crate::template::InstructionTemplate;
use crate::traits::{BundleSource, ModelClient, StageAuditor, VerdictValidator};

/// Identity of the ingestion stage.
pub const INGESTION_STAGE: &str = "case_bundle";

// ── Stage graph ──────────────────────────────────────────────────────────────

/// One node of the stage graph.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSpec {
    pub id: StageId,
    pub kind: StageKind,
    /// Label used in prompts, e.g. "GPT-5.2" or "Arbiter Alpha".
    pub label: String,
    /// Model identifier; `None` for the deterministic ingestion stage.
    pub model: Option<String>,
    /// Upstream stages whose output must exist before this one runs.
    pub depends_on: Vec<StageId>,
}

/// The stages of one run, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    stages: Vec<StageSpec>,
}

impl StageGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stage. Duplicate identities are a `ConfigError`.
    pub fn add(&mut self, spec: StageSpec) -> RucamResult<()> {
        if self.get(&spec.id).is_some() {
            return Err(RucamError::ConfigError {
                reason: format!("stage '{}' declared twice", spec.id),
            });
        }
        self.stages.push(spec);
        Ok(())
    }

    /// Build the standard graph: ingestion, every analyst, every enabled arbiter.
    pub fn from_config(config: &PipelineConfig) -> RucamResult<Self> {
        let mut graph = Self::new();
        let ingestion = StageId::new(INGESTION_STAGE);

        graph.add(StageSpec {
            id: ingestion.clone(),
            kind: StageKind::Ingestion,
            label: "Case Bundle".to_string(),
            model: None,
            depends_on: vec![],
        })?;

        let mut analyst_ids = Vec::with_capacity(config.analysts.len());
        for analyst in &config.analysts {
            let id = StageId::new(analyst.key.clone());
            graph.add(StageSpec {
                id: id.clone(),
                kind: StageKind::Analysis,
                label: analyst.label.clone(),
                model: Some(analyst.model.clone()),
                depends_on: vec![ingestion.clone()],
            })?;
            analyst_ids.push(id);
        }

        for arbiter in config.enabled_arbiters() {
            graph.add(StageSpec {
                id: StageId::new(arbiter.stage_key()),
                kind: StageKind::Arbitration,
                label: arbiter.label(),
                model: Some(arbiter.model.clone()),
                depends_on: analyst_ids.clone(),
            })?;
        }

        Ok(graph)
    }

    pub fn get(&self, id: &StageId) -> Option<&StageSpec> {
        self.stages.iter().find(|s| &s.id == id)
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Declaration indices of each stage's dependencies.
    fn dependency_indices(&self) -> RucamResult<Vec<Vec<usize>>> {
        let index: HashMap<&StageId, usize> =
            self.stages.iter().enumerate().map(|(i, s)| (&s.id, i)).collect();

        self.stages
            .iter()
            .map(|stage| {
                stage
                    .depends_on
                    .iter()
                    .map(|dep| {
                        index.get(dep).copied().ok_or_else(|| RucamError::ConfigError {
                            reason: format!("stage '{}' depends on unknown stage '{}'", stage.id, dep),
                        })
                    })
                    .collect()
            })
            .collect()
    }

    /// Collapse the DAG to a sequential order (Kahn's algorithm).
    ///
    /// Among ready stages the earliest declared runs first. A cycle or an
    /// unknown dependency is a `ConfigError`.
    pub fn schedule(&self) -> RucamResult<Vec<&StageSpec>> {
        let deps = self.dependency_indices()?;
        let mut remaining: Vec<usize> = deps.iter().map(|d| d.len()).collect();
        let mut done = vec![false; self.stages.len()];
        let mut order = Vec::with_capacity(self.stages.len());

        while order.len() < self.stages.len() {
            let next = (0..self.stages.len()).find(|&i| !done[i] && remaining[i] == 0);
            let Some(next) = next else {
                let stuck: Vec<String> = (0..self.stages.len())
                    .filter(|&i| !done[i])
                    .map(|i| self.stages[i].id.to_string())
                    .collect();
                return Err(RucamError::ConfigError {
                    reason: format!("stage graph has a cycle among: {}", stuck.join(", ")),
                });
            };

            done[next] = true;
            order.push(&self.stages[next]);
            for (i, d) in deps.iter().enumerate() {
                remaining[i] -= d.iter().filter(|&&dep| dep == next).count();
            }
        }

        Ok(order)
    }

    /// Group the schedule into tiers of mutually independent stages.
    ///
    /// A stage's tier is one more than the deepest tier among its
    /// dependencies. Within a tier, declaration order is kept.
    pub fn tiers(&self) -> RucamResult<Vec<Vec<&StageSpec>>> {
        let order = self.schedule()?;
        let mut depth: HashMap<&StageId, usize> = HashMap::new();
        let mut tiers: Vec<Vec<&StageSpec>> = Vec::new();

        for stage in order {
            let level = stage
                .depends_on
                .iter()
                .filter_map(|d| depth.get(d))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            depth.insert(&stage.id, level);
            if tiers.len() <= level {
                tiers.resize_with(level + 1, Vec::new);
            }
            tiers[level].push(stage);
        }

        for tier in &mut tiers {
            tier.sort_by_key(|s| self.stages.iter().position(|x| x.id == s.id));
        }
        Ok(tiers)
    }
}

// ── Outcome ──────────────────────────────────────────────────────────────────

/// One completed stage in the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedStage {
    pub id: StageId,
    pub kind: StageKind,
    pub label: String,
    pub output: StageOutput,
}

/// Everything a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub run_id: RunId,
    pub bundle: CaseBundle,
    /// Every stage output, in schedule order.
    pub stages: Vec<CompletedStage>,
    /// Validated verdict per arbiter stage, in schedule order. Empty when
    /// validation is off.
    pub verdicts: Vec<(StageId, RucamVerdict)>,
    /// Text of the last arbiter, or of the last analyst when no arbiter ran.
    pub final_report: String,
}

impl PipelineOutcome {
    pub fn output(&self, id: &str) -> Option<&StageOutput> {
        self.stages.iter().find(|s| s.id.as_str() == id).map(|s| &s.output)
    }

    pub fn verdict(&self, id: &str) -> Option<&RucamVerdict> {
        self.verdicts.iter().find(|(s, _)| s.as_str() == id).map(|(_, v)| v)
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

/// Mutable state of one run, owned by the coordinating thread only.
struct RunState {
    run_id: RunId,
    status: HashMap<StageId, StageStatus>,
    outputs: HashMap<StageId, StageOutput>,
    bundle: Option<CaseBundle>,
    bundle_json: Option<String>,
    /// Keyed by stage so parallel completion order does not leak into the outcome.
    verdicts: HashMap<StageId, RucamVerdict>,
}

/// Drives one document through the stage graph.
///
/// Components are held behind `Arc` so worker threads can share them in
/// parallel mode. The pipeline itself holds no per-run state.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn BundleSource>,
    client: Arc<dyn ModelClient>,
    validator: Arc<dyn VerdictValidator>,
    auditor: Arc<dyn StageAuditor>,
    template: InstructionTemplate,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn BundleSource>,
        client: Arc<dyn ModelClient>,
        validator: Arc<dyn VerdictValidator>,
        auditor: Arc<dyn StageAuditor>,
        template: InstructionTemplate,
    ) -> Self {
        Self { config, source, client, validator, auditor, template }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage for `document`.
    ///
    /// # Errors
    ///
    /// - `DocumentNotFound` before any stage runs
    /// - `ConfigError` for an invalid configuration or stage graph
    /// - `StageFailed` when a model invocation fails
    /// - `Validation` when an arbiter's verdict is rejected
    /// - `StateMachineError` for an illegal lifecycle edge
    /// - any error from the stage auditor
    pub fn run(&self, document: &Path) -> RucamResult<PipelineOutcome> {
        if !document.is_file() {
            return Err(RucamError::DocumentNotFound {
                path: document.display().to_string(),
            });
        }

        self.config.validate()?;
        let graph = StageGraph::from_config(&self.config)?;
        let tiers = graph.tiers()?;

        let mut state = RunState {
            run_id: RunId::new(),
            status: graph.stages().iter().map(|s| (s.id.clone(), StageStatus::Pending)).collect(),
            outputs: HashMap::new(),
            bundle: None,
            bundle_json: None,
            verdicts: HashMap::new(),
        };

        info!(
            run_id = %state.run_id,
            document = %document.display(),
            stages = graph.len(),
            parallel = self.config.parallel_stages,
            "pipeline run starting"
        );

        for tier in &tiers {
            if self.config.parallel_stages && tier.len() > 1 {
                self.run_tier_parallel(&mut state, &graph, tier)?;
            } else {
                for spec in tier {
                    self.run_stage(&mut state, &graph, spec, document)?;
                }
            }
        }

        self.auditor.finalize(&state.run_id)?;
        self.assemble(state, &graph)
    }

    // ── Stage execution ──────────────────────────────────────────────────────

    fn run_stage(
        &self,
        state: &mut RunState,
        graph: &StageGraph,
        spec: &StageSpec,
        document: &Path,
    ) -> RucamResult<()> {
        self.start(state, spec)?;

        if spec.kind == StageKind::Ingestion {
            return match self.source.build(document) {
                Ok(bundle) => {
                    let output = StageOutput::Structured(bundle.to_json());
                    state.bundle_json = Some(bundle.to_json_pretty());
                    state.bundle = Some(bundle);
                    self.advance(state, spec, StageStatus::Completed, Some(output), None)
                }
                Err(e) => {
                    self.advance(state, spec, StageStatus::Failed, None, Some(e.to_string()))?;
                    Err(e)
                }
            };
        }

        let prompt = self.render_prompt(state, graph, spec)?;
        let model = spec.model.as_deref().unwrap_or_default();
        let result = self.client.invoke(model, &prompt, self.config.temperature);
        self.finish(state, graph, spec, result)
    }

    fn run_tier_parallel(
        &self,
        state: &mut RunState,
        graph: &StageGraph,
        tier: &[&StageSpec],
    ) -> RucamResult<()> {
        let (tx, rx) = mpsc::channel::<(StageId, RucamResult<String>)>();

        for spec in tier {
            self.start(state, spec)?;
            let prompt = self.render_prompt(state, graph, spec)?;
            let client = Arc::clone(&self.client);
            let model = spec.model.clone().unwrap_or_default();
            let temperature = self.config.temperature;
            let id = spec.id.clone();
            let tx = tx.clone();

            debug!(stage = %id, model = %model, "dispatching stage to worker");
            thread::spawn(move || {
                let result = client.invoke(&model, &prompt, temperature);
                // The receiver is gone once a sibling failed; nothing to report then.
                let _ = tx.send((id, result));
            });
        }
        drop(tx);

        for _ in 0..tier.len() {
            let (id, result) = rx.recv().map_err(|_| RucamError::StateMachineError {
                reason: "a stage worker exited without reporting a result".to_string(),
            })?;
            let spec = graph.get(&id).ok_or_else(|| RucamError::StateMachineError {
                reason: format!("worker reported unknown stage '{}'", id),
            })?;
            // First failure returns immediately; remaining workers are abandoned.
            self.finish(state, graph, spec, result)?;
        }

        Ok(())
    }

    /// Check dependencies and move `Pending -> Running`.
    fn start(&self, state: &mut RunState, spec: &StageSpec) -> RucamResult<()> {
        for dep in &spec.depends_on {
            if state.status.get(dep) != Some(&StageStatus::Completed) {
                return Err(RucamError::StateMachineError {
                    reason: format!("stage '{}' started before dependency '{}' completed", spec.id, dep),
                });
            }
        }
        debug!(run_id = %state.run_id, stage = %spec.id, kind = ?spec.kind, "stage running");
        self.advance(state, spec, StageStatus::Running, None, None)
    }

    /// Commit a model result: validate arbiters, then `Completed` or `Failed`.
    fn finish(
        &self,
        state: &mut RunState,
        graph: &StageGraph,
        spec: &StageSpec,
        result: RucamResult<String>,
    ) -> RucamResult<()> {
        let text = match result {
            Ok(text) => text,
            Err(e) => {
                let reason = e.to_string();
                warn!(run_id = %state.run_id, stage = %spec.id, error = %reason, "stage failed");
                self.advance(state, spec, StageStatus::Failed, None, Some(reason.clone()))?;
                return Err(RucamError::StageFailed {
                    stage: spec.id.to_string(),
                    reason,
                });
            }
        };

        if spec.kind == StageKind::Arbitration && self.config.validate_verdicts {
            let analyst_reports = self.analyst_texts(state, graph, spec);
            let refs: Vec<&str> = analyst_reports.iter().map(|(_, t)| t.as_str()).collect();

            match self.validator.check_arbiter_report(&text, &refs) {
                Ok(verdict) => {
                    debug!(
                        stage = %spec.id,
                        total = verdict.total_score,
                        category = %verdict.category,
                        "arbiter verdict validated"
                    );
                    state.verdicts.insert(spec.id.clone(), verdict);
                }
                Err(failure) => {
                    warn!(stage = %spec.id, failure = %failure, "arbiter verdict rejected");
                    self.advance(state, spec, StageStatus::Failed, None, Some(failure.to_string()))?;
                    return Err(RucamError::Validation {
                        stage: spec.id.to_string(),
                        failure,
                    });
                }
            }
        }

        info!(run_id = %state.run_id, stage = %spec.id, chars = text.len(), "stage completed");
        self.advance(state, spec, StageStatus::Completed, Some(StageOutput::Text(text)), None)
    }

    /// Apply one lifecycle edge and append it to the trail.
    fn advance(
        &self,
        state: &mut RunState,
        spec: &StageSpec,
        next: StageStatus,
        output: Option<StageOutput>,
        error: Option<String>,
    ) -> RucamResult<()> {
        let current = state.status.get(&spec.id).copied().ok_or_else(|| {
            RucamError::StateMachineError {
                reason: format!("stage '{}' has no slot in this run", spec.id),
            }
        })?;
        if !current.can_transition_to(next) {
            return Err(RucamError::StateMachineError {
                reason: format!("stage '{}' cannot move from {:?} to {:?}", spec.id, current, next),
            });
        }

        state.status.insert(spec.id.clone(), next);
        if let Some(out) = &output {
            state.outputs.insert(spec.id.clone(), out.clone());
        }

        self.auditor.record(&StageRecord {
            run_id: state.run_id.clone(),
            stage: spec.id.clone(),
            kind: spec.kind,
            status: next,
            output,
            error,
            timestamp: Utc::now(),
        })
    }

    // ── Prompt inputs ────────────────────────────────────────────────────────

    fn render_prompt(
        &self,
        state: &RunState,
        graph: &StageGraph,
        spec: &StageSpec,
    ) -> RucamResult<String> {
        match spec.kind {
            StageKind::Analysis => {
                let bundle_json = state.bundle_json.as_deref().ok_or_else(|| {
                    RucamError::StateMachineError {
                        reason: format!("analysis stage '{}' has no case bundle", spec.id),
                    }
                })?;
                Ok(analysis_prompt(&spec.label, &self.template, bundle_json))
            }
            StageKind::Arbitration => {
                let analyses = self.analyst_texts(state, graph, spec);
                let pairs: Vec<(&str, &str)> =
                    analyses.iter().map(|(l, t)| (l.as_str(), t.as_str())).collect();
                Ok(arbiter_prompt(&spec.label, &pairs))
            }
            StageKind::Ingestion => Err(RucamError::StateMachineError {
                reason: format!("ingestion stage '{}' does not take a prompt", spec.id),
            }),
        }
    }

    /// `(label, text)` of every completed analysis stage `spec` depends on.
    fn analyst_texts(
        &self,
        state: &RunState,
        graph: &StageGraph,
        spec: &StageSpec,
    ) -> Vec<(String, String)> {
        spec.depends_on
            .iter()
            .filter_map(|dep| {
                let upstream = graph.get(dep)?;
                if upstream.kind != StageKind::Analysis {
                    return None;
                }
                let output = state.outputs.get(dep)?;
                Some((upstream.label.clone(), output.to_text()))
            })
            .collect()
    }

    fn assemble(&self, mut state: RunState, graph: &StageGraph) -> RucamResult<PipelineOutcome> {
        let bundle = state.bundle.take().ok_or_else(|| RucamError::StateMachineError {
            reason: "run finished without a case bundle".to_string(),
        })?;

        let mut stages = Vec::with_capacity(graph.len());
        let mut verdicts = Vec::with_capacity(state.verdicts.len());
        for spec in graph.schedule()? {
            if let Some(verdict) = state.verdicts.remove(&spec.id) {
                verdicts.push((spec.id.clone(), verdict));
            }
            let output = state.outputs.remove(&spec.id).ok_or_else(|| {
                RucamError::StateMachineError {
                    reason: format!("stage '{}' finished without output", spec.id),
                }
            })?;
            stages.push(CompletedStage {
                id: spec.id.clone(),
                kind: spec.kind,
                label: spec.label.clone(),
                output,
            });
        }

        let final_report = stages
            .iter()
            .rev()
            .find(|s| s.kind == StageKind::Arbitration)
            .or_else(|| stages.iter().rev().find(|s| s.kind == StageKind::Analysis))
            .map(|s| s.output.to_text())
            .unwrap_or_default();

        info!(
            run_id = %state.run_id,
            stages = stages.len(),
            verdicts = verdicts.len(),
            "pipeline run complete"
        );

        Ok(PipelineOutcome {
            run_id: state.run_id,
            bundle,
            stages,
            verdicts,
            final_report,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
