use std::collections::BTreeSet;

use anchor_lang::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::cipher::{seal, KeyProvider};
use crate::constants::{BASIS_POINTS, INSTANT_WIN_STREAM_DOMAIN};
use crate::error::LedgerError;
use crate::instructions::process_append;
use crate::merkle::sha256_hex;
use crate::random::SeedStream;
use crate::session::{new_id, LedgerSession};
use crate::state::*;

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinRequest {
    pub competition_id: CompetitionId,
    pub total_tickets: u64,
    /// 1% = 100.
    pub win_percentage_bp: u32,
}

/// Public summary of a generation. Positions are never part of it.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinGeneration {
    pub competition_id: CompetitionId,
    pub count: u64,
    pub total_tickets: u64,
    pub win_percentage_bp: u32,
    pub positions_digest: String,
    pub chain_sequence: u64,
    pub chain_hash: String,
}

/// Converts a percentage such as `2.5` to basis points, rounding to the
/// nearest one.
pub fn percentage_to_basis_points(percentage: f64) -> Result<u32> {
    require!(
        percentage.is_finite() && (0.0..=100.0).contains(&percentage),
        LedgerError::InvalidWinPercentage
    );
    Ok((percentage * 100.0).round() as u32)
}

/// `floor(total_tickets * percentage / 100)`, exactly.
pub fn winning_count(total_tickets: u64, win_percentage_bp: u32) -> Result<u64> {
    let count = u128::from(total_tickets) * u128::from(win_percentage_bp) / u128::from(BASIS_POINTS);
    u64::try_from(count).map_err(|_| error!(LedgerError::MathOverflow))
}

/// `count` distinct positions in `[1, total]`, ascending. Floyd's sampling:
/// exactly `count` draws, no retries.
pub fn choose_positions(stream: &mut SeedStream, total: u64, count: u64) -> Result<Vec<u64>> {
    require!(count <= total, LedgerError::MathOverflow);
    let mut chosen = BTreeSet::new();
    for j in (total - count + 1)..=total {
        let candidate = stream.in_range(1, j)?;
        if !chosen.insert(candidate) {
            chosen.insert(j);
        }
    }
    Ok(chosen.into_iter().collect())
}

/// Hiding commitment to a position set: SHA-256 over the salt followed by
/// each position as u64 little-endian, ascending.
pub fn positions_digest(salt: &[u8], positions: &[u64]) -> String {
    let mut buf = Vec::with_capacity(salt.len() + positions.len() * 8);
    buf.extend_from_slice(salt);
    for position in positions {
        buf.extend_from_slice(&position.to_le_bytes());
    }
    sha256_hex(&[&buf])
}

/// Pre-allocates the competition's instant-win positions and seals each one.
/// Runs once, before the first sale, over the competition's full ticket
/// range.
///
/// The chain only learns the count, the percentage and a salted digest of
/// the position set; the salt is sealed with the same key as the records.
pub fn process_generate_instant_wins(
    session: &mut LedgerSession,
    keys: &dyn KeyProvider,
    request: InstantWinRequest,
) -> Result<InstantWinGeneration> {
    let competition_id = request.competition_id.as_str();
    let competition = session.tables.competition(competition_id)?;
    require!(
        matches!(competition.status, CompetitionStatus::Draft | CompetitionStatus::Active),
        LedgerError::CompetitionNotOpen
    );
    require!(
        request.total_tickets > 0 && request.total_tickets == competition.total_tickets,
        LedgerError::InvalidTicketTotal
    );
    require!(
        u64::from(request.win_percentage_bp) <= BASIS_POINTS,
        LedgerError::InvalidWinPercentage
    );
    require!(
        session.tables.instant_win_count(competition_id) == 0,
        LedgerError::InstantWinsAlreadyGenerated
    );
    // The vault is sealed before the first sale.
    require!(
        session.tables.tickets_for(competition_id).next().is_none(),
        LedgerError::TicketsAlreadySold
    );

    let prize_ids: Vec<PrizeId> = session
        .tables
        .prizes_for(competition_id)
        .into_iter()
        .filter(|p| p.tier == PrizeTier::InstantWin)
        .map(|p| p.id.clone())
        .collect();
    require!(!prize_ids.is_empty(), LedgerError::NoInstantWinPrizes);

    let key = keys.instant_win_key()?;
    let aad = competition_id.as_bytes();

    let mut stream_seed = [0u8; 32];
    OsRng.fill_bytes(&mut stream_seed);
    let mut stream = SeedStream::new(INSTANT_WIN_STREAM_DOMAIN, &stream_seed);
    let count = winning_count(request.total_tickets, request.win_percentage_bp)?;
    let positions = choose_positions(&mut stream, request.total_tickets, count)?;

    for (i, position) in positions.iter().enumerate() {
        let prize_id = prize_ids[i % prize_ids.len()].clone();
        let payload = InstantWinPayload {
            position: *position,
            prize_id: prize_id.clone(),
            competition_id: competition_id.to_string(),
            created_at: session.now,
        };
        let plaintext =
            serde_json::to_vec(&payload).map_err(|_| error!(LedgerError::SerializationFailed))?;

        session.tables.insert_instant_win(InstantWin {
            id: new_id(),
            competition_id: competition_id.to_string(),
            position: *position,
            prize_id,
            encrypted_data: seal(&key, aad, &plaintext)?,
            is_claimed: false,
            is_revealed: false,
            ticket_id: None,
            claimed_at: None,
        })?;
    }

    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);
    let digest = positions_digest(&salt, &positions);
    let sealed_salt = seal(&key, aad, &salt)?;

    let entry = process_append(
        session,
        EntryData::CompetitionStateChange(CompetitionStateChangeData {
            competition_id: competition_id.to_string(),
            change: StateChange::InstantWinsGenerated {
                count,
                total_tickets: request.total_tickets,
                win_percentage_bp: request.win_percentage_bp,
                positions_digest: digest.clone(),
                sealed_salt,
            },
        }),
        None,
    )?;

    tracing::info!(competition_id, count, "instant wins generated");
    Ok(InstantWinGeneration {
        competition_id: competition_id.to_string(),
        count,
        total_tickets: request.total_tickets,
        win_percentage_bp: request.win_percentage_bp,
        positions_digest: digest,
        chain_sequence: entry.sequence,
        chain_hash: entry.hash,
    })
}
