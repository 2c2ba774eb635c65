use serde::Serialize;

use crate::instructions::{process_verify_range, verify_checkpoint, CheckpointVerification, RangeVerification};
use crate::store::Tables;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainIntegrity {
    pub is_valid: bool,
    /// The window actually checked, clamped to the chain.
    pub window_start: u64,
    pub window_end: u64,
    pub range: RangeVerification,
    pub checkpoints: Vec<CheckpointVerification>,
    pub errors: Vec<String>,
}

/// Range replay plus every checkpoint overlapping the window.
pub fn process_verify_chain(tables: &Tables, start: Option<u64>, end: Option<u64>) -> ChainIntegrity {
    let range = process_verify_range(tables, start, end);
    let window_start = start.unwrap_or(1).max(1);
    let window_end = end
        .unwrap_or_else(|| tables.chain_length())
        .min(tables.chain_length());

    let checkpoints: Vec<CheckpointVerification> = tables
        .checkpoints()
        .filter(|c| c.start_sequence <= window_end && c.end_sequence >= window_start)
        .map(|c| verify_checkpoint(tables, c))
        .collect();

    let mut errors = range.errors.clone();
    for checkpoint in &checkpoints {
        errors.extend(checkpoint.errors.iter().cloned());
    }

    ChainIntegrity {
        is_valid: range.is_valid && checkpoints.iter().all(|c| c.is_valid),
        window_start,
        window_end,
        range,
        checkpoints,
        errors,
    }
}
