//! Trail entry and sealed trail types.
//!
//! `TrailEntry` is one link in the hash chain. It wraps a `StageRecord` with
//! a sequence number, a digest of the stage output, and the SHA-256 hashes
//! that make tampering detectable. `StageTrail` is the sealed form exported
//! after a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rucam_contracts::{
    error::{RucamError, RucamResult},
    stage::{RunId, StageRecord},
};

/// A single entry in the hash chain for one run.
///
/// Modifying any field, including those of the embedded `record`,
/// invalidates `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub run_id: RunId,

    pub record: StageRecord,

    /// SHA-256 (hex) of the stage output text, when the record carries one.
    pub output_digest: Option<String>,

    /// `this_hash` of the previous entry, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Computed by `hash_entry()` over (run_id, sequence, prev_hash,
    /// output_digest, canonical JSON of record).
    pub this_hash: String,
}

impl TrailEntry {
    /// The `prev_hash` of the first entry in every chain.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed trail for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTrail {
    pub run_id: Option<RunId>,

    /// Entries in chain order.
    pub entries: Vec<TrailEntry>,

    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last entry. Empty when the trail is empty.
    pub terminal_hash: String,
}

impl StageTrail {
    pub fn to_json_pretty(&self) -> RucamResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| RucamError::Serialization {
            reason: format!("failed to serialize stage trail: {}", e),
        })
    }
}
