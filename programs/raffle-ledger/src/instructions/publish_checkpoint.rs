use anchor_lang::prelude::*;

use crate::error::LedgerError;
use crate::session::LedgerSession;
use crate::state::Checkpoint;

/// Records that a checkpoint's hash was anchored somewhere external.
/// Happens once; the anchored value must be the checkpoint's own hash.
pub fn process_publish_checkpoint(
    session: &mut LedgerSession,
    checkpoint_id: u64,
    published_hash: &str,
) -> Result<Checkpoint> {
    let now = session.now;
    let checkpoint = session
        .tables
        .checkpoint_mut(checkpoint_id)
        .ok_or_else(|| error!(LedgerError::CheckpointNotFound))?;

    require!(
        checkpoint.published_hash.is_none(),
        LedgerError::CheckpointAlreadyPublished
    );
    require!(
        checkpoint.hash == published_hash.to_ascii_lowercase(),
        LedgerError::PublishedHashMismatch
    );

    checkpoint.published_hash = Some(checkpoint.hash.clone());
    checkpoint.published_at = Some(now);

    tracing::info!(checkpoint_id, "checkpoint published");
    Ok(checkpoint.clone())
}
