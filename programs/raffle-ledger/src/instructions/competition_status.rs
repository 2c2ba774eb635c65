use anchor_lang::prelude::*;

use crate::error::LedgerError;
use crate::instructions::process_append;
use crate::session::LedgerSession;
use crate::state::*;
use crate::store::Tables;

/// Draw inputs stay editable only while the competition is DRAFT or ACTIVE
/// and no seed has been committed for it.
fn ensure_draw_inputs_open(tables: &Tables, competition_id: &str) -> Result<()> {
    let status = tables.competition(competition_id)?.status;
    let open = matches!(status, CompetitionStatus::Draft | CompetitionStatus::Active)
        && tables.draw_seed(competition_id).is_none();
    if !open {
        tracing::warn!(competition_id, ?status, "draw inputs are frozen");
        return err!(LedgerError::DrawInputsFrozen);
    }
    Ok(())
}

/// Inserts or replaces a competition synced from the marketplace.
///
/// A new row enters as DRAFT or ACTIVE. An existing row changes only while
/// its draw inputs are open, and its total never drops below a sold
/// position. Sealed instant wins fix the total.
pub fn process_upsert_competition(session: &mut LedgerSession, competition: Competition) -> Result<Competition> {
    require!(
        matches!(competition.status, CompetitionStatus::Draft | CompetitionStatus::Active),
        LedgerError::InvalidStatusTransition
    );
    require!(competition.total_tickets > 0, LedgerError::InvalidTicketTotal);

    if let Ok(current) = session.tables.competition(&competition.id) {
        let current = current.clone();
        ensure_draw_inputs_open(session.tables, &competition.id)?;
        require!(
            current.status == competition.status || current.status.can_transition_to(competition.status),
            LedgerError::InvalidStatusTransition
        );
        let highest_sold = session
            .tables
            .tickets_for(&competition.id)
            .filter_map(|t| t.position())
            .max()
            .unwrap_or(0);
        require!(
            competition.total_tickets >= highest_sold,
            LedgerError::InvalidTicketTotal
        );
        if session.tables.instant_win_count(&competition.id) > 0 {
            require!(
                competition.total_tickets == current.total_tickets,
                LedgerError::DrawInputsFrozen
            );
        }
    }

    tracing::info!(competition_id = %competition.id, status = ?competition.status, "competition synced");
    session.tables.upsert_competition(competition.clone());
    Ok(competition)
}

/// Inserts or replaces a prize. Both the prize's competition and, for a
/// prize moving between competitions, its previous one must be open.
pub fn process_upsert_prize(session: &mut LedgerSession, prize: Prize) -> Result<Prize> {
    ensure_draw_inputs_open(session.tables, &prize.competition_id)?;
    let previous = session.tables.prize(&prize.id).ok().map(|p| p.competition_id.clone());
    if let Some(previous) = previous.filter(|c| *c != prize.competition_id) {
        ensure_draw_inputs_open(session.tables, &previous)?;
    }

    tracing::info!(prize_id = %prize.id, competition_id = %prize.competition_id, "prize synced");
    session.tables.upsert_prize(prize.clone());
    Ok(prize)
}

/// Administrative status change (open, pause on sell-out, cancel).
/// DRAWING and COMPLETED are only entered by the draw.
pub fn process_set_competition_status(
    session: &mut LedgerSession,
    competition_id: &str,
    status: CompetitionStatus,
) -> Result<Competition> {
    let current = session.tables.competition(competition_id)?.status;
    require!(
        current.can_transition_to(status),
        LedgerError::InvalidStatusTransition
    );

    record_status_change(session, competition_id, status)?;
    Ok(session.tables.competition(competition_id)?.clone())
}

/// Moves the competition to `to` and records the change on the chain.
/// Callers have already decided the transition is allowed.
pub(crate) fn record_status_change(
    session: &mut LedgerSession,
    competition_id: &str,
    to: CompetitionStatus,
) -> Result<ChainEntry> {
    let competition = session.tables.competition_mut(competition_id)?;
    let from = competition.status;
    competition.status = to;

    tracing::info!(competition_id, ?from, ?to, "competition status changed");
    process_append(
        session,
        EntryData::CompetitionStateChange(CompetitionStateChangeData {
            competition_id: competition_id.to_string(),
            change: StateChange::StatusChanged { from, to },
        }),
        None,
    )
}
