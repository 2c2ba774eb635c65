use anchor_lang::prelude::*;

use crate::constants::MIN_CHECKPOINT_INTERVAL;
use crate::error::LedgerError;
use crate::merkle::{compute_entry_hash, merkle_root};
use crate::session::LedgerSession;
use crate::state::*;

/// Appends one entry after the current tail and, when its sequence lands on
/// the checkpoint interval, checkpoints the last interval's entries.
///
/// Must run inside the session's serializable transaction: the tail read
/// here and the row written here commit together or not at all.
pub fn process_append(
    session: &mut LedgerSession,
    data: EntryData,
    metadata: Option<EntryMetadata>,
) -> Result<ChainEntry> {
    let interval = session.config.checkpoint_interval;
    require!(interval >= MIN_CHECKPOINT_INTERVAL, LedgerError::InvalidConfig);

    let entry = push_entry(session, data, metadata)?;
    if entry.sequence % interval == 0 {
        process_create_checkpoint(session, entry.sequence)?;
    }

    Ok(entry)
}

fn push_entry(
    session: &mut LedgerSession,
    data: EntryData,
    metadata: Option<EntryMetadata>,
) -> Result<ChainEntry> {
    let (sequence, previous_hash) = match session.tables.tail() {
        Some(tail) => (
            tail.sequence.checked_add(1).ok_or(LedgerError::MathOverflow)?,
            Some(tail.hash.clone()),
        ),
        None => (1, None),
    };

    let mut entry = ChainEntry {
        sequence,
        entry_type: data.entry_type(),
        timestamp: session.now,
        data,
        metadata,
        previous_hash,
        hash: String::new(),
    };
    entry.hash = compute_entry_hash(&entry)?;

    tracing::debug!(sequence = entry.sequence, entry_type = ?entry.entry_type, "chain entry appended");
    session.tables.push_entry(entry.clone());

    Ok(entry)
}

/// Builds a checkpoint over the `checkpoint_interval` entries ending at
/// `end_sequence`, then records it on the chain as a CHECKPOINT entry.
pub fn process_create_checkpoint(
    session: &mut LedgerSession,
    end_sequence: u64,
) -> Result<Checkpoint> {
    let interval = session.config.checkpoint_interval;
    let start_sequence = end_sequence
        .checked_sub(interval)
        .ok_or(LedgerError::MathOverflow)?
        + 1;

    let hashes: Vec<String> = session
        .tables
        .entries_in_range(start_sequence, end_sequence)
        .map(|e| e.hash.clone())
        .collect();
    require!(
        hashes.len() as u64 == interval,
        LedgerError::SequenceGap
    );

    let last_hash = hashes
        .last()
        .cloned()
        .ok_or(LedgerError::SequenceGap)?;

    let checkpoint = Checkpoint {
        id: session.tables.checkpoint_count() + 1,
        start_sequence,
        end_sequence,
        entries_count: hashes.len() as u64,
        merkle_root: merkle_root(&hashes),
        hash: last_hash,
        created_at: session.now,
        published_hash: None,
        published_at: None,
    };

    tracing::info!(
        checkpoint_id = checkpoint.id,
        start_sequence,
        end_sequence,
        root = %checkpoint.merkle_root,
        "checkpoint created"
    );
    session.tables.push_checkpoint(checkpoint.clone());

    // Recorded directly: a CHECKPOINT entry never triggers a checkpoint itself.
    push_entry(
        session,
        EntryData::Checkpoint(CheckpointData {
            checkpoint_id: checkpoint.id,
            start_sequence: checkpoint.start_sequence,
            end_sequence: checkpoint.end_sequence,
            entries_count: checkpoint.entries_count,
            merkle_root: checkpoint.merkle_root.clone(),
            hash: checkpoint.hash.clone(),
        }),
        None,
    )?;

    Ok(checkpoint)
}
