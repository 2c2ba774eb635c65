use anchor_lang::prelude::*;
use serde::Deserialize;

use crate::error::LedgerError;
use crate::instructions::process_append;
use crate::session::{new_id, LedgerSession};
use crate::state::*;

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub competition_id: CompetitionId,
    pub ticket_id: TicketId,
    pub prize_id: PrizeId,
    pub user_id: UserId,
    #[serde(default)]
    pub is_instant_win: bool,
}

/// Binds a ticket to a prize. A ticket wins at most once per competition.
pub fn process_allocate_prize(session: &mut LedgerSession, request: AllocationRequest) -> Result<Winner> {
    let ticket = session.tables.ticket(&request.ticket_id)?;
    require!(
        ticket.competition_id == request.competition_id,
        LedgerError::TicketCompetitionMismatch
    );
    require!(ticket.user_id == request.user_id, LedgerError::NotTicketOwner);
    let ticket_number = ticket.ticket_number.clone();

    let prize = session.tables.prize(&request.prize_id)?;
    require!(
        prize.competition_id == request.competition_id,
        LedgerError::PrizeCompetitionMismatch
    );
    let metadata = EntryMetadata {
        prize_name: Some(prize.name.clone()),
        prize_value_cents: Some(prize.value_cents),
        note: None,
    };

    require!(
        session
            .tables
            .winner_for_ticket(&request.competition_id, &request.ticket_id)
            .is_none(),
        LedgerError::AlreadyAllocated
    );

    let winner_id = new_id();
    let entry = process_append(
        session,
        EntryData::PrizeAllocation(PrizeAllocationData {
            winner_id: winner_id.clone(),
            competition_id: request.competition_id.clone(),
            ticket_id: request.ticket_id.clone(),
            ticket_number,
            prize_id: request.prize_id.clone(),
            user_id: request.user_id.clone(),
            is_instant_win: request.is_instant_win,
        }),
        Some(metadata),
    )?;

    let winner = Winner {
        id: winner_id,
        competition_id: request.competition_id,
        ticket_id: request.ticket_id,
        prize_id: request.prize_id,
        user_id: request.user_id,
        status: WinnerStatus::Pending,
        is_instant_win: request.is_instant_win,
        chain_sequence: entry.sequence,
        created_at: session.now,
        claimed_at: None,
    };
    session.tables.ticket_mut(&winner.ticket_id)?.status = TicketStatus::Winner;
    session.tables.insert_winner(winner.clone());

    tracing::info!(
        prize_id = %winner.prize_id,
        ticket_id = %winner.ticket_id,
        winner_id = %winner.id,
        "prize allocated"
    );
    Ok(winner)
}
