use anchor_lang::prelude::*;
use serde::Serialize;

use crate::error::LedgerError;
use crate::merkle::{compute_entry_hash, merkle_root};
use crate::state::{ChainEntry, Checkpoint};
use crate::store::Tables;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointVerification {
    pub checkpoint_id: u64,
    pub is_valid: bool,
    pub start_sequence: u64,
    pub end_sequence: u64,
    pub expected_count: u64,
    pub actual_count: u64,
    pub merkle_root_matches: bool,
    pub hash_matches: bool,
    pub computed_merkle_root: Option<String>,
    pub errors: Vec<String>,
}

/// Reloads the checkpoint's range, rehashes every entry and recomputes the
/// Merkle root from those hashes. A count mismatch fails at once.
pub fn verify_checkpoint(tables: &Tables, checkpoint: &Checkpoint) -> CheckpointVerification {
    let entries: Vec<&ChainEntry> = tables
        .entries_in_range(checkpoint.start_sequence, checkpoint.end_sequence)
        .collect();
    let mut result = CheckpointVerification {
        checkpoint_id: checkpoint.id,
        is_valid: false,
        start_sequence: checkpoint.start_sequence,
        end_sequence: checkpoint.end_sequence,
        expected_count: checkpoint.entries_count,
        actual_count: entries.len() as u64,
        merkle_root_matches: false,
        hash_matches: false,
        computed_merkle_root: None,
        errors: Vec::new(),
    };

    if result.actual_count != result.expected_count {
        result.errors.push(format!(
            "Checkpoint {} covers {} entries but {} were found",
            checkpoint.id, result.expected_count, result.actual_count
        ));
        return result;
    }

    let hashes: Vec<String> = match entries.iter().map(|e| compute_entry_hash(e)).collect::<Result<_>>() {
        Ok(hashes) => hashes,
        Err(_) => {
            result.errors.push(format!(
                "Checkpoint {} range could not be canonically encoded",
                checkpoint.id
            ));
            return result;
        }
    };
    let root = merkle_root(&hashes);
    result.merkle_root_matches = root == checkpoint.merkle_root;
    result.hash_matches = hashes.last() == Some(&checkpoint.hash);
    result.computed_merkle_root = Some(root);

    if !result.merkle_root_matches {
        result
            .errors
            .push(format!("Checkpoint {} Merkle root mismatch", checkpoint.id));
    }
    if !result.hash_matches {
        result.errors.push(format!(
            "Checkpoint {} hash does not match entry {}",
            checkpoint.id, checkpoint.end_sequence
        ));
    }
    result.is_valid = result.merkle_root_matches && result.hash_matches;
    result
}

pub fn process_verify_checkpoint(tables: &Tables, checkpoint_id: u64) -> Result<CheckpointVerification> {
    let checkpoint = tables
        .checkpoint(checkpoint_id)
        .ok_or_else(|| error!(LedgerError::CheckpointNotFound))?;
    Ok(verify_checkpoint(tables, checkpoint))
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LatestCheckpoint {
    pub checkpoint: Checkpoint,
    pub verification: CheckpointVerification,
}

pub fn process_verify_latest_checkpoint(tables: &Tables) -> Result<LatestCheckpoint> {
    let checkpoint = tables
        .latest_checkpoint()
        .ok_or_else(|| error!(LedgerError::CheckpointNotFound))?;
    Ok(LatestCheckpoint {
        checkpoint: checkpoint.clone(),
        verification: verify_checkpoint(tables, checkpoint),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::is_error;
    use crate::testing::{chain_of, sample_data};

    #[test]
    fn test_checkpoint_round_trip() {
        let tables = chain_of(100, 100);
        let result = process_verify_checkpoint(&tables, 1).unwrap();
        assert!(result.is_valid);
        assert_eq!(result.actual_count, 100);
        assert_eq!(
            result.computed_merkle_root.as_deref(),
            Some(tables.checkpoint(1).unwrap().merkle_root.as_str())
        );
    }

    #[test]
    fn test_altered_entry_breaks_root() {
        let mut tables = chain_of(100, 100);
        // a forger who also fixes the entry's own hash still moves the root
        let entry = &mut tables.entries_mut()[56];
        entry.data = sample_data(5_000);
        entry.hash = crate::merkle::compute_entry_hash(entry).unwrap();

        let result = process_verify_checkpoint(&tables, 1).unwrap();
        assert!(!result.is_valid);
        assert!(!result.merkle_root_matches);
        assert!(result.hash_matches);
    }

    #[test]
    fn test_missing_entries_fail_on_count() {
        let mut tables = chain_of(100, 100);
        tables.entries_mut().truncate(90);
        let result = process_verify_checkpoint(&tables, 1).unwrap();
        assert!(!result.is_valid);
        assert_eq!(result.actual_count, 90);
        assert_eq!(result.computed_merkle_root, None);
    }

    #[test]
    fn test_latest_and_unknown() {
        let tables = chain_of(25, 10);
        let latest = process_verify_latest_checkpoint(&tables).unwrap();
        assert_eq!(latest.checkpoint.id, 2);
        assert!(latest.verification.is_valid);

        let err = process_verify_checkpoint(&tables, 9).unwrap_err();
        assert!(is_error(&err, LedgerError::CheckpointNotFound));

        let err = process_verify_latest_checkpoint(&chain_of(5, 10)).unwrap_err();
        assert!(is_error(&err, LedgerError::CheckpointNotFound));
    }
}
