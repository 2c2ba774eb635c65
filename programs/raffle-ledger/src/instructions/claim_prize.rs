use anchor_lang::prelude::*;

use crate::error::LedgerError;
use crate::instructions::process_append;
use crate::session::LedgerSession;
use crate::state::*;

/// The winning user claims their prize.
///
/// Only PENDING or NOTIFIED winners can be claimed. Two concurrent claims on
/// one winner cannot both commit: the loser retries and sees CLAIMED.
pub fn process_claim_prize(session: &mut LedgerSession, winner_id: &str, user_id: &str) -> Result<Winner> {
    let now = session.now;
    let winner = session.tables.winner_mut(winner_id)?;
    require!(winner.user_id == user_id, LedgerError::NotWinnerOwner);
    require!(
        matches!(winner.status, WinnerStatus::Pending | WinnerStatus::Notified),
        LedgerError::InvalidWinnerStatus
    );

    winner.status = WinnerStatus::Claimed;
    winner.claimed_at = Some(now);
    let winner = winner.clone();

    process_append(
        session,
        EntryData::PrizeClaim(PrizeClaimData {
            winner_id: winner.id.clone(),
            competition_id: winner.competition_id.clone(),
            ticket_id: winner.ticket_id.clone(),
            prize_id: winner.prize_id.clone(),
            user_id: winner.user_id.clone(),
        }),
        None,
    )?;

    tracing::info!(winner_id = %winner.id, prize_id = %winner.prize_id, "prize claimed");
    Ok(winner)
}

/// Administrative winner moves: PENDING -> NOTIFIED once the winner has
/// been told, CLAIMED -> PAID once settlement happened elsewhere. Claiming
/// goes through `process_claim_prize`.
pub fn process_advance_winner(session: &mut LedgerSession, winner_id: &str, to: WinnerStatus) -> Result<Winner> {
    let required = match to {
        WinnerStatus::Notified => WinnerStatus::Pending,
        WinnerStatus::Paid => WinnerStatus::Claimed,
        _ => return err!(LedgerError::InvalidWinnerStatus),
    };
    let winner = session.tables.winner_mut(winner_id)?;
    let from = winner.status;
    require!(from == required, LedgerError::InvalidWinnerStatus);
    winner.status = to;
    tracing::info!(winner_id, ?from, ?to, "winner status changed");
    Ok(winner.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::is_error;
    use crate::instructions::{process_allocate_prize, AllocationRequest};
    use crate::store::Tables;
    use crate::testing::*;

    fn with_winner() -> (Tables, LedgerConfig, String) {
        let mut tables = Tables::default();
        let config = config(100);
        raffle(
            &mut tables,
            &config,
            COMPETITION,
            10,
            2,
            vec![prize("p1", COMPETITION, 1, 1, PrizeTier::Draw)],
        );
        let mut session = LedgerSession::at(&mut tables, &config, 99);
        let winner = process_allocate_prize(
            &mut session,
            AllocationRequest {
                competition_id: COMPETITION.to_string(),
                ticket_id: ticket_id(COMPETITION, 2),
                prize_id: "p1".to_string(),
                user_id: "user-b".to_string(),
                is_instant_win: false,
            },
        )
        .unwrap();
        (tables, config, winner.id)
    }

    #[test]
    fn test_claim_by_owner() {
        let (mut tables, config, winner_id) = with_winner();
        let mut session = LedgerSession::at(&mut tables, &config, 500);
        let claimed = process_claim_prize(&mut session, &winner_id, "user-b").unwrap();
        assert_eq!(claimed.status, WinnerStatus::Claimed);
        assert_eq!(claimed.claimed_at, Some(500));
        assert_eq!(tables.tail().unwrap().entry_type, EntryType::PrizeClaim);
    }

    #[test]
    fn test_claim_rules() {
        let (mut tables, config, winner_id) = with_winner();
        let mut session = LedgerSession::at(&mut tables, &config, 500);
        let err = process_claim_prize(&mut session, &winner_id, "user-a").unwrap_err();
        assert!(is_error(&err, LedgerError::NotWinnerOwner));

        let mut session = LedgerSession::at(&mut tables, &config, 500);
        process_claim_prize(&mut session, &winner_id, "user-b").unwrap();
        let length = tables.chain_length();

        let mut session = LedgerSession::at(&mut tables, &config, 501);
        let err = process_claim_prize(&mut session, &winner_id, "user-b").unwrap_err();
        assert!(is_error(&err, LedgerError::InvalidWinnerStatus));
        assert_eq!(tables.chain_length(), length);
    }

    #[test]
    fn test_notify_claim_pay() {
        let (mut tables, config, winner_id) = with_winner();
        let mut session = LedgerSession::at(&mut tables, &config, 500);
        let err = process_advance_winner(&mut session, &winner_id, WinnerStatus::Paid).unwrap_err();
        assert!(is_error(&err, LedgerError::InvalidWinnerStatus));
        let err = process_advance_winner(&mut session, &winner_id, WinnerStatus::Claimed).unwrap_err();
        assert!(is_error(&err, LedgerError::InvalidWinnerStatus));

        let mut session = LedgerSession::at(&mut tables, &config, 500);
        process_advance_winner(&mut session, &winner_id, WinnerStatus::Notified).unwrap();
        let mut session = LedgerSession::at(&mut tables, &config, 501);
        process_claim_prize(&mut session, &winner_id, "user-b").unwrap();
        let mut session = LedgerSession::at(&mut tables, &config, 502);
        let paid = process_advance_winner(&mut session, &winner_id, WinnerStatus::Paid).unwrap();
        assert_eq!(paid.status, WinnerStatus::Paid);
    }
}
