use anchor_lang::prelude::*;
use serde::Serialize;

use crate::error::LedgerError;
use crate::instructions::{process_append, record_status_change};
use crate::merkle::seed_commitment;
use crate::session::LedgerSession;
use crate::state::*;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedRevelation {
    pub competition_id: CompetitionId,
    pub seed_reveal: String,
    pub commit_hash: String,
    pub chain_sequence: u64,
    pub chain_hash: String,
    pub timestamp: i64,
}

/// Discloses the committed seed. Accepted once, and only when it hashes to
/// the commitment exactly. The competition moves to DRAWING.
pub fn process_reveal_seed(
    session: &mut LedgerSession,
    competition_id: &str,
    seed: &str,
) -> Result<SeedRevelation> {
    let status = session.tables.competition(competition_id)?.status;
    let draw_seed = session
        .tables
        .draw_seed(competition_id)
        .cloned()
        .ok_or_else(|| error!(LedgerError::SeedNotCommitted))?;

    require!(
        draw_seed.status == SeedStatus::Committed,
        LedgerError::AlreadyRevealed
    );
    if seed_commitment(seed) != draw_seed.seed_commit {
        tracing::warn!(competition_id, "seed reveal does not match its commitment");
        return err!(LedgerError::SeedMismatch);
    }
    require!(
        matches!(status, CompetitionStatus::Active | CompetitionStatus::SoldOut),
        LedgerError::CompetitionNotDrawable
    );

    let entry = process_append(
        session,
        EntryData::SeedReveal(SeedRevealData {
            competition_id: competition_id.to_string(),
            seed_reveal: seed.to_string(),
            seed_commit: draw_seed.seed_commit.clone(),
            commit_sequence: draw_seed.commit_sequence,
        }),
        None,
    )?;

    session.tables.put_draw_seed(DrawSeed {
        seed_reveal: Some(seed.to_string()),
        reveal_timestamp: Some(session.now),
        status: SeedStatus::Revealed,
        ..draw_seed.clone()
    });
    tracing::info!(competition_id, "seed revealed");

    record_status_change(session, competition_id, CompetitionStatus::Drawing)?;

    Ok(SeedRevelation {
        competition_id: competition_id.to_string(),
        seed_reveal: seed.to_string(),
        commit_hash: draw_seed.seed_commit,
        chain_sequence: entry.sequence,
        chain_hash: entry.hash,
        timestamp: session.now,
    })
}
