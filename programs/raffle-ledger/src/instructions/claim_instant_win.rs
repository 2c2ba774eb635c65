use anchor_lang::prelude::*;
use serde::Serialize;

use crate::cipher::KeyProvider;
use crate::error::LedgerError;
use crate::instructions::{open_payload, process_allocate_prize, process_append, AllocationRequest};
use crate::session::LedgerSession;
use crate::state::*;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinClaim {
    pub winner: Winner,
    pub payload: InstantWinPayload,
    pub chain_sequence: u64,
    pub chain_hash: String,
}

/// Claims an instant win with the ticket sitting on its position, then
/// publishes the decrypted record on the chain.
pub fn process_claim_instant_win(
    session: &mut LedgerSession,
    keys: &dyn KeyProvider,
    instant_win_id: &str,
    ticket_id: &str,
    user_id: &str,
) -> Result<InstantWinClaim> {
    let instant_win = session.tables.instant_win(instant_win_id)?.clone();
    require!(!instant_win.is_claimed, LedgerError::InstantWinAlreadyClaimed);

    let status = session.tables.competition(&instant_win.competition_id)?.status;
    let open = matches!(status, CompetitionStatus::Active | CompetitionStatus::SoldOut)
        && session.tables.draw_seed(&instant_win.competition_id).is_none();
    if !open {
        tracing::warn!(instant_win_id, ?status, "instant-win claims are closed");
        return err!(LedgerError::InstantWinClaimsClosed);
    }

    let ticket = session.tables.ticket(ticket_id)?;
    require!(
        ticket.competition_id == instant_win.competition_id,
        LedgerError::TicketCompetitionMismatch
    );
    require!(ticket.user_id == user_id, LedgerError::NotTicketOwner);
    require!(
        ticket.position() == Some(instant_win.position),
        LedgerError::PositionMismatch
    );

    let key = keys.instant_win_key()?;
    let payload = open_payload(&key, &instant_win).map_err(|e| {
        tracing::error!(instant_win_id, "integrity fault: sealed instant win failed to open");
        e
    })?;

    let winner = process_allocate_prize(
        session,
        AllocationRequest {
            competition_id: instant_win.competition_id.clone(),
            ticket_id: ticket_id.to_string(),
            prize_id: payload.prize_id.clone(),
            user_id: user_id.to_string(),
            is_instant_win: true,
        },
    )?;

    let now = session.now;
    let row = session.tables.instant_win_mut(instant_win_id)?;
    row.is_claimed = true;
    row.is_revealed = true;
    row.ticket_id = Some(ticket_id.to_string());
    row.claimed_at = Some(now);

    let entry = process_append(
        session,
        EntryData::InstantWinReveal(InstantWinRevealData {
            instant_win_id: instant_win_id.to_string(),
            winner_id: winner.id.clone(),
            ticket_id: ticket_id.to_string(),
            user_id: user_id.to_string(),
            payload: payload.clone(),
        }),
        None,
    )?;

    tracing::info!(instant_win_id, ticket_id, "instant win claimed");
    Ok(InstantWinClaim {
        winner,
        payload,
        chain_sequence: entry.sequence,
        chain_hash: entry.hash,
    })
}
