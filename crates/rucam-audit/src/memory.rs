//! In-memory implementation of `StageAuditor`.
//!
//! `InMemoryStageTrail` keeps the chain in a `Vec` behind a `Mutex`, so the
//! pipeline may record from worker threads. Once a run is finalized the
//! trail is sealed and later records are rejected.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info};

use rucam_contracts::{
    error::{RucamError, RucamResult},
    stage::{RunId, StageRecord},
};
use rucam_core::traits::StageAuditor;

use crate::{
    chain::{digest_output, hash_entry, verify_chain},
    event::{StageTrail, TrailEntry},
};

// ── Internal mutable state ────────────────────────────────────────────────────

pub(crate) struct TrailState {
    pub(crate) entries: Vec<TrailEntry>,
    pub(crate) run_id: Option<RunId>,
    pub(crate) sequence: u64,
    pub(crate) last_hash: String,
    pub(crate) sealed: bool,
}

// ── Public trail ──────────────────────────────────────────────────────────────

/// An append-only stage trail for a single run.
///
/// The first record fixes the run; a record from any other run is rejected.
#[derive(Clone)]
pub struct InMemoryStageTrail {
    pub(crate) state: Arc<Mutex<TrailState>>,
}

impl InMemoryStageTrail {
    pub fn new() -> Self {
        let state = TrailState {
            entries: Vec::new(),
            run_id: None,
            sequence: 0,
            last_hash: TrailEntry::GENESIS_HASH.to_string(),
            sealed: false,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Export the chain recorded so far.
    pub fn export_trail(&self) -> StageTrail {
        let state = self.state.lock().expect("stage trail lock poisoned");
        StageTrail {
            run_id: state.run_id.clone(),
            entries: state.entries.clone(),
            exported_at: Utc::now(),
            terminal_hash: state
                .entries
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        }
    }

    pub fn verify_integrity(&self) -> bool {
        let state = self.state.lock().expect("stage trail lock poisoned");
        verify_chain(&state.entries)
    }

    pub fn is_sealed(&self) -> bool {
        self.state.lock().map(|s| s.sealed).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.state.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStageTrail {
    fn default() -> Self {
        Self::new()
    }
}

// ── StageAuditor impl ─────────────────────────────────────────────────────────

impl StageAuditor for InMemoryStageTrail {
    fn record(&self, record: &StageRecord) -> RucamResult<()> {
        let mut state = self.state.lock().map_err(|e| RucamError::AuditWriteFailed {
            reason: format!("stage trail lock poisoned: {}", e),
        })?;

        if state.sealed {
            return Err(RucamError::AuditWriteFailed {
                reason: format!("trail for run {} is finalized", record.run_id),
            });
        }
        match &state.run_id {
            Some(run_id) if *run_id != record.run_id => {
                return Err(RucamError::AuditWriteFailed {
                    reason: format!("record for run {} sent to trail of run {}", record.run_id, run_id),
                });
            }
            Some(_) => {}
            None => state.run_id = Some(record.run_id.clone()),
        }

        let prev_hash = state.last_hash.clone();
        let sequence = state.sequence;
        let output_digest = record.output.as_ref().map(digest_output);
        let this_hash = hash_entry(&record.run_id, sequence, record, output_digest.as_deref(), &prev_hash);

        debug!(
            run_id = %record.run_id,
            stage = %record.stage,
            status = ?record.status,
            sequence,
            "stage record appended"
        );

        state.entries.push(TrailEntry {
            sequence,
            run_id: record.run_id.clone(),
            record: record.clone(),
            output_digest,
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.sequence += 1;
        state.last_hash = this_hash;

        Ok(())
    }

    fn finalize(&self, run_id: &RunId) -> RucamResult<()> {
        let mut state = self.state.lock().map_err(|e| RucamError::AuditWriteFailed {
            reason: format!("stage trail lock poisoned: {}", e),
        })?;
        state.sealed = true;

        info!(
            run_id = %run_id,
            entry_count = state.entries.len(),
            terminal_hash = %state.last_hash,
            "stage trail finalized"
        );

        Ok(())
    }
}
