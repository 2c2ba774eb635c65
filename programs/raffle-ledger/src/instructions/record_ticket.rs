use anchor_lang::prelude::*;
use serde::Deserialize;

use crate::error::LedgerError;
use crate::instructions::{process_append, record_status_change};
use crate::session::LedgerSession;
use crate::state::*;

/// A sale completed by the marketplace, handed over for recording.
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketPurchase {
    pub ticket_id: TicketId,
    pub competition_id: CompetitionId,
    pub user_id: UserId,
    pub ticket_number: String,
}

/// Stores the ticket, appends its TICKET_PURCHASE entry and keeps the
/// entry's sequence on the ticket. Selling the last ticket moves the
/// competition to SOLD_OUT.
pub fn process_record_ticket(session: &mut LedgerSession, purchase: TicketPurchase) -> Result<Ticket> {
    let competition = session.tables.competition(&purchase.competition_id)?;
    require!(
        competition.status == CompetitionStatus::Active,
        LedgerError::CompetitionNotOpen
    );
    let total_tickets = competition.total_tickets;
    require!(
        session.tables.draw_seed(&purchase.competition_id).is_none(),
        LedgerError::DrawInputsFrozen
    );

    require!(
        !session.tables.has_ticket(&purchase.ticket_id),
        LedgerError::TicketAlreadyRecorded
    );
    let position = ticket_position(&purchase.ticket_number)
        .filter(|p| *p <= total_tickets)
        .ok_or_else(|| error!(LedgerError::InvalidTicketNumber))?;
    require!(
        session
            .tables
            .tickets_for(&purchase.competition_id)
            .all(|t| t.position() != Some(position)),
        LedgerError::TicketAlreadyRecorded
    );

    let entry = process_append(
        session,
        EntryData::TicketPurchase(TicketPurchaseData {
            ticket_id: purchase.ticket_id.clone(),
            ticket_number: purchase.ticket_number.clone(),
            competition_id: purchase.competition_id.clone(),
            user_id: purchase.user_id.clone(),
        }),
        None,
    )?;

    let ticket = Ticket {
        id: purchase.ticket_id,
        competition_id: purchase.competition_id,
        user_id: purchase.user_id,
        ticket_number: purchase.ticket_number,
        status: TicketStatus::Active,
        chain_sequence: Some(entry.sequence),
        purchased_at: session.now,
    };
    session.tables.insert_ticket(ticket.clone());

    let sold = session.tables.tickets_for(&ticket.competition_id).count() as u64;
    if sold >= total_tickets {
        record_status_change(session, &ticket.competition_id, CompetitionStatus::SoldOut)?;
    }

    Ok(ticket)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::is_error;
    use crate::store::Tables;
    use crate::testing::{competition, purchase, COMPETITION};

    fn open(total: u64) -> Tables {
        let mut tables = Tables::default();
        tables.upsert_competition(competition(COMPETITION, CompetitionStatus::Active, total));
        tables
    }

    #[test]
    fn test_ticket_points_at_its_entry() {
        let mut tables = open(10);
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 5);
        let ticket = process_record_ticket(&mut session, purchase(COMPETITION, 3, "user-a")).unwrap();

        assert_eq!(ticket.chain_sequence, Some(1));
        let entry = tables.entry(1).unwrap();
        match &entry.data {
            EntryData::TicketPurchase(d) => {
                assert_eq!(d.ticket_id, ticket.id);
                assert_eq!(d.ticket_number, "LC-0003");
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn test_duplicates_rejected() {
        let mut tables = open(10);
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 5);
        process_record_ticket(&mut session, purchase(COMPETITION, 3, "user-a")).unwrap();

        let mut session = LedgerSession::at(&mut tables, &config, 6);
        let err = process_record_ticket(&mut session, purchase(COMPETITION, 3, "user-b")).unwrap_err();
        assert!(is_error(&err, LedgerError::TicketAlreadyRecorded));

        let mut same_position = purchase(COMPETITION, 3, "user-b");
        same_position.ticket_id = "other-id".to_string();
        let mut session = LedgerSession::at(&mut tables, &config, 7);
        let err = process_record_ticket(&mut session, same_position).unwrap_err();
        assert!(is_error(&err, LedgerError::TicketAlreadyRecorded));
        assert_eq!(tables.chain_length(), 1);
    }

    #[test]
    fn test_number_must_carry_position_in_range() {
        let mut tables = open(10);
        let config = LedgerConfig::default();
        let mut bad = purchase(COMPETITION, 1, "user-a");
        bad.ticket_number = "LC-".to_string();
        let mut session = LedgerSession::at(&mut tables, &config, 5);
        let err = process_record_ticket(&mut session, bad).unwrap_err();
        assert!(is_error(&err, LedgerError::InvalidTicketNumber));

        let mut session = LedgerSession::at(&mut tables, &config, 5);
        let err = process_record_ticket(&mut session, purchase(COMPETITION, 11, "user-a")).unwrap_err();
        assert!(is_error(&err, LedgerError::InvalidTicketNumber));
    }

    #[test]
    fn test_closed_competition_rejects_sales() {
        let mut tables = Tables::default();
        tables.upsert_competition(competition(COMPETITION, CompetitionStatus::Draft, 10));
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 5);
        let err = process_record_ticket(&mut session, purchase(COMPETITION, 1, "user-a")).unwrap_err();
        assert!(is_error(&err, LedgerError::CompetitionNotOpen));
    }

    #[test]
    fn test_last_ticket_sells_out() {
        let mut tables = open(2);
        let config = LedgerConfig::default();
        for position in 1..=2 {
            let mut session = LedgerSession::at(&mut tables, &config, 5);
            process_record_ticket(&mut session, purchase(COMPETITION, position, "user-a")).unwrap();
        }
        assert_eq!(
            tables.competition(COMPETITION).unwrap().status,
            CompetitionStatus::SoldOut
        );
        assert_eq!(tables.tail().unwrap().entry_type, EntryType::CompetitionStateChange);
    }

    #[test]
    fn test_sales_stop_once_seed_is_committed() {
        let mut tables = open(10);
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 5);
        process_record_ticket(&mut session, purchase(COMPETITION, 1, "user-a")).unwrap();
        crate::instructions::process_commit_seed(&mut session, COMPETITION, "S").unwrap();

        let err = process_record_ticket(&mut session, purchase(COMPETITION, 2, "user-b")).unwrap_err();
        assert!(is_error(&err, LedgerError::DrawInputsFrozen));
        assert_eq!(tables.tickets_for(COMPETITION).count(), 1);
    }
}
