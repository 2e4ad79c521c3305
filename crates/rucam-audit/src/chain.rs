//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. run_id as its hyphenated UUID string
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. output_digest as UTF-8 bytes, or nothing
//!   5. canonical JSON of the record (serde_json, no pretty-printing)

use sha2::{Digest, Sha256};

use rucam_contracts::stage::{RunId, StageOutput, StageRecord};

use crate::event::TrailEntry;

/// SHA-256 (hex) of a stage output's text rendering.
pub fn digest_output(output: &StageOutput) -> String {
    hex::encode(Sha256::digest(output.to_text().as_bytes()))
}

/// Compute the SHA-256 hash for a single trail entry.
///
/// Returns a lowercase 64-character hex string.
///
/// # Panics
///
/// Panics if `record` cannot be serialized to JSON, which cannot happen for
/// the well-formed `StageRecord` type.
pub fn hash_entry(
    run_id: &RunId,
    sequence: u64,
    record: &StageRecord,
    output_digest: Option<&str>,
    prev_hash: &str,
) -> String {
    let record_json =
        serde_json::to_vec(record).expect("StageRecord must always be serializable to JSON");

    let mut hasher = Sha256::new();
    hasher.update(run_id.to_string().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    if let Some(digest) = output_digest {
        hasher.update(digest.as_bytes());
    }
    hasher.update(&record_json);

    hex::encode(hasher.finalize())
}

/// Verify prev-hash linkage, output digests, and entry hashes.
///
/// An empty chain is valid.
pub fn verify_chain(entries: &[TrailEntry]) -> bool {
    let mut expected_prev = TrailEntry::GENESIS_HASH.to_string();

    for entry in entries {
        if entry.prev_hash != expected_prev {
            return false;
        }

        let digest = entry.record.output.as_ref().map(digest_output);
        if entry.output_digest != digest {
            return false;
        }

        let recomputed = hash_entry(
            &entry.run_id,
            entry.sequence,
            &entry.record,
            entry.output_digest.as_deref(),
            &entry.prev_hash,
        );
        if entry.this_hash != recomputed {
            return false;
        }

        expected_prev = entry.this_hash.clone();
    }

    true
}
