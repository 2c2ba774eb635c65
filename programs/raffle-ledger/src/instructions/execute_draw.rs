use anchor_lang::prelude::*;
use serde::Serialize;

use crate::constants::DRAW_STREAM_DOMAIN;
use crate::error::LedgerError;
use crate::instructions::{process_allocate_prize, process_append, record_status_change, AllocationRequest};
use crate::merkle::sha256_hex;
use crate::random::SeedStream;
use crate::session::LedgerSession;
use crate::state::*;
use crate::store::Tables;

/// One (ticket, prize) pair chosen by `select_winners`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawSelection {
    pub ticket_id: TicketId,
    pub ticket_number: String,
    pub user_id: UserId,
    pub prize_id: PrizeId,
    pub prize_name: String,
    pub prize_position: u32,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawOutcome {
    pub selections: Vec<DrawSelection>,
    pub ticket_count: u64,
    pub pool_digest: String,
    pub unallocated_units: u64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawExecution {
    pub competition_id: CompetitionId,
    pub winners_count: usize,
    pub winners: Vec<DrawWinnerRecord>,
    pub unallocated_units: u64,
    pub chain_sequence: u64,
    pub chain_hash: String,
    pub timestamp: i64,
}

/// Canonical draw order: numeric position from the ticket number, then the
/// raw number string, then the id.
pub fn sort_for_draw(tickets: &mut [Ticket]) {
    tickets.sort_by(|a, b| {
        a.position()
            .cmp(&b.position())
            .then_with(|| a.ticket_number.cmp(&b.ticket_number))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// SHA-256 over the pool's ticket ids in draw order, newline separated.
pub fn pool_digest(tickets: &[Ticket]) -> String {
    let joined = tickets
        .iter()
        .map(|t| t.id.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    sha256_hex(&[joined.as_bytes()])
}

/// Draw-tier prizes with units to give, in draw order.
pub fn draw_prizes(tables: &Tables, competition_id: &str) -> Vec<Prize> {
    tables
        .prizes_for(competition_id)
        .into_iter()
        .filter(|p| p.tier == PrizeTier::Draw && p.quantity > 0)
        .cloned()
        .collect()
}

/// SHA-256 over `id:position:quantity` of each prize, newline separated.
/// Committed with the seed so the prize set cannot move before the draw.
pub fn prize_digest(prizes: &[Prize]) -> String {
    let joined = prizes
        .iter()
        .map(|p| format!("{}:{}:{}", p.id, p.position, p.quantity))
        .collect::<Vec<_>>()
        .join("\n");
    sha256_hex(&[joined.as_bytes()])
}

/// Replayable winner selection: a pure function of the revealed seed, the
/// eligible tickets and the prizes.
///
/// Prizes are taken in ascending position; each unit of quantity draws one
/// ticket uniformly from those still in the pool and removes it. Units left
/// once the pool is empty are counted, not drawn.
pub fn select_winners(seed: &str, tickets: &[Ticket], prizes: &[Prize]) -> Result<DrawOutcome> {
    let mut pool = tickets.to_vec();
    sort_for_draw(&mut pool);
    let ticket_count = pool.len() as u64;
    let digest = pool_digest(&pool);

    let mut ordered: Vec<&Prize> = prizes.iter().collect();
    ordered.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));

    let mut stream = SeedStream::new(DRAW_STREAM_DOMAIN, seed.as_bytes());
    let mut selections = Vec::new();
    let mut unallocated_units = 0u64;

    for prize in ordered {
        for _ in 0..prize.quantity {
            if pool.is_empty() {
                unallocated_units += 1;
                continue;
            }
            let index = stream.below(pool.len() as u64)? as usize;
            let ticket = pool.remove(index);
            selections.push(DrawSelection {
                ticket_id: ticket.id,
                ticket_number: ticket.ticket_number,
                user_id: ticket.user_id,
                prize_id: prize.id.clone(),
                prize_name: prize.name.clone(),
                prize_position: prize.position,
            });
        }
    }

    Ok(DrawOutcome {
        selections,
        ticket_count,
        pool_digest: digest,
        unallocated_units,
    })
}

/// Runs the draw for a competition whose seed has been revealed.
///
/// Every allocation, the DRAW_RESULT entry and the status changes are made
/// in the caller's one transaction; any failure leaves nothing behind.
pub fn process_execute_draw(session: &mut LedgerSession, competition_id: &str) -> Result<DrawExecution> {
    let status = session.tables.competition(competition_id)?.status;
    let draw_seed = session
        .tables
        .draw_seed(competition_id)
        .cloned()
        .ok_or_else(|| error!(LedgerError::SeedNotCommitted))?;

    let seed = match (draw_seed.status, draw_seed.seed_reveal.as_deref()) {
        (SeedStatus::Used, _) => return err!(LedgerError::DrawAlreadyExecuted),
        (SeedStatus::Revealed, Some(seed)) => seed.to_string(),
        _ => return err!(LedgerError::SeedNotRevealed),
    };
    require!(
        status == CompetitionStatus::Drawing,
        LedgerError::CompetitionNotDrawable
    );

    let prizes = draw_prizes(session.tables, competition_id);
    let digest = prize_digest(&prizes);
    if digest != draw_seed.prize_digest {
        tracing::error!(
            competition_id,
            committed = %draw_seed.prize_digest,
            current = %digest,
            "prize set changed after seed commit"
        );
        return err!(LedgerError::DrawInputsChanged);
    }
    require!(!prizes.is_empty(), LedgerError::NoPrizes);

    let tickets: Vec<Ticket> = session
        .tables
        .tickets_for(competition_id)
        .filter(|t| t.status == TicketStatus::Active)
        .cloned()
        .collect();
    require!(!tickets.is_empty(), LedgerError::NoEligibleTickets);

    let outcome = select_winners(&seed, &tickets, &prizes)?;
    tracing::info!(
        competition_id,
        units = outcome.selections.len() as u64 + outcome.unallocated_units,
        tickets = outcome.ticket_count,
        "drawing prizes"
    );

    let mut winners = Vec::with_capacity(outcome.selections.len());
    for selection in outcome.selections {
        let winner = process_allocate_prize(
            session,
            AllocationRequest {
                competition_id: competition_id.to_string(),
                ticket_id: selection.ticket_id.clone(),
                prize_id: selection.prize_id.clone(),
                user_id: selection.user_id.clone(),
                is_instant_win: false,
            },
        )?;
        winners.push(DrawWinnerRecord {
            winner_id: winner.id,
            ticket_id: selection.ticket_id,
            ticket_number: selection.ticket_number,
            prize_id: selection.prize_id,
            prize_name: selection.prize_name,
            prize_position: selection.prize_position,
            user_id: selection.user_id,
        });
    }

    if outcome.unallocated_units > 0 {
        tracing::warn!(
            competition_id,
            unallocated = outcome.unallocated_units,
            "prize units left unallocated"
        );
    }

    let entry = process_append(
        session,
        EntryData::DrawResult(DrawResultData {
            competition_id: competition_id.to_string(),
            seed_commit: draw_seed.seed_commit.clone(),
            seed_reveal: seed,
            ticket_count: outcome.ticket_count,
            pool_digest: outcome.pool_digest,
            winners: winners.clone(),
            unallocated_units: outcome.unallocated_units,
        }),
        None,
    )?;

    session.tables.put_draw_seed(DrawSeed {
        status: SeedStatus::Used,
        ..draw_seed
    });
    record_status_change(session, competition_id, CompetitionStatus::Completed)?;

    tracing::info!(competition_id, winners = winners.len(), "draw complete");
    Ok(DrawExecution {
        competition_id: competition_id.to_string(),
        winners_count: winners.len(),
        winners,
        unallocated_units: outcome.unallocated_units,
        chain_sequence: entry.sequence,
        chain_hash: entry.hash,
        timestamp: session.now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::is_error;
    use crate::instructions::process_verify_range;
    use crate::testing::*;

    fn draw_ready(tickets: u64, prizes: Vec<Prize>, seed: &str) -> (Tables, LedgerConfig) {
        let mut tables = Tables::default();
        let config = config(100);
        raffle(&mut tables, &config, COMPETITION, 100, tickets, prizes);
        revealed(&mut tables, &config, COMPETITION, seed);
        (tables, config)
    }

    fn draw_result_entries(tables: &Tables) -> Vec<&ChainEntry> {
        tables
            .entries()
            .filter(|e| e.entry_type == EntryType::DrawResult)
            .collect()
    }

    #[test]
    fn test_three_tickets_one_prize() {
        let (mut tables, config) =
            draw_ready(3, vec![prize("p1", COMPETITION, 1, 1, PrizeTier::Draw)], "S");
        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        let execution = process_execute_draw(&mut session, COMPETITION).unwrap();

        assert_eq!(execution.winners_count, 1);
        assert_eq!(tables.winners_for(COMPETITION).len(), 1);

        let results = draw_result_entries(&tables);
        assert_eq!(results.len(), 1);
        match &results[0].data {
            EntryData::DrawResult(d) => {
                assert_eq!(d.winners.len(), 1);
                assert_eq!(d.ticket_count, 3);
                assert_eq!(d.seed_reveal, "S");
            }
            other => panic!("unexpected payload {other:?}"),
        }

        assert_eq!(tables.draw_seed(COMPETITION).unwrap().status, SeedStatus::Used);
        assert_eq!(
            tables.competition(COMPETITION).unwrap().status,
            CompetitionStatus::Completed
        );
        assert!(process_verify_range(&tables, None, None).is_valid);
    }

    #[test]
    fn test_replay_matches_recorded_result() {
        let prizes = vec![
            prize("p1", COMPETITION, 1, 1, PrizeTier::Draw),
            prize("p2", COMPETITION, 2, 3, PrizeTier::Draw),
        ];
        let (mut tables, config) = draw_ready(20, prizes.clone(), "replay-seed");
        let tickets: Vec<Ticket> = tables.tickets_for(COMPETITION).cloned().collect();

        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        let execution = process_execute_draw(&mut session, COMPETITION).unwrap();

        // a third party shuffling the inputs still gets the same answer
        let mut shuffled = tickets.clone();
        shuffled.reverse();
        let mut reversed_prizes = prizes.clone();
        reversed_prizes.reverse();
        let replay = select_winners("replay-seed", &shuffled, &reversed_prizes).unwrap();

        let replayed: Vec<(&str, &str)> = replay
            .selections
            .iter()
            .map(|s| (s.ticket_id.as_str(), s.prize_id.as_str()))
            .collect();
        let recorded: Vec<(&str, &str)> = execution
            .winners
            .iter()
            .map(|w| (w.ticket_id.as_str(), w.prize_id.as_str()))
            .collect();
        assert_eq!(replayed, recorded);
        assert_eq!(recorded[0].1, "p1");
    }

    #[test]
    fn test_selection_is_deterministic_and_distinct() {
        let tickets: Vec<Ticket> = (1..=50u64)
            .map(|n| Ticket {
                id: format!("t{n}"),
                competition_id: COMPETITION.to_string(),
                user_id: "u".to_string(),
                ticket_number: format!("LC-{n:04}"),
                status: TicketStatus::Active,
                chain_sequence: None,
                purchased_at: 0,
            })
            .collect();
        let prizes = vec![prize("p1", COMPETITION, 1, 10, PrizeTier::Draw)];

        let a = select_winners("seed", &tickets, &prizes).unwrap();
        let b = select_winners("seed", &tickets, &prizes).unwrap();
        assert_eq!(a, b);

        let mut ids: Vec<&str> = a.selections.iter().map(|s| s.ticket_id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);

        let c = select_winners("other seed", &tickets, &prizes).unwrap();
        assert_ne!(a.selections, c.selections);
    }

    #[test]
    fn test_pool_exhaustion_leaves_units_unallocated() {
        let (mut tables, config) =
            draw_ready(2, vec![prize("p1", COMPETITION, 1, 5, PrizeTier::Draw)], "S");
        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        let execution = process_execute_draw(&mut session, COMPETITION).unwrap();
        assert_eq!(execution.winners_count, 2);
        assert_eq!(execution.unallocated_units, 3);
    }

    #[test]
    fn test_execute_guards() {
        let mut tables = Tables::default();
        let config = config(100);
        raffle(
            &mut tables,
            &config,
            COMPETITION,
            100,
            3,
            vec![prize("p1", COMPETITION, 1, 1, PrizeTier::Draw)],
        );

        let mut session = LedgerSession::at(&mut tables, &config, 1);
        let err = process_execute_draw(&mut session, COMPETITION).unwrap_err();
        assert!(is_error(&err, LedgerError::SeedNotCommitted));

        let mut session = LedgerSession::at(&mut tables, &config, 2);
        crate::instructions::process_commit_seed(&mut session, COMPETITION, "S").unwrap();
        let mut session = LedgerSession::at(&mut tables, &config, 3);
        let err = process_execute_draw(&mut session, COMPETITION).unwrap_err();
        assert!(is_error(&err, LedgerError::SeedNotRevealed));

        let mut session = LedgerSession::at(&mut tables, &config, 4);
        crate::instructions::process_reveal_seed(&mut session, COMPETITION, "S").unwrap();
        let mut session = LedgerSession::at(&mut tables, &config, 5);
        process_execute_draw(&mut session, COMPETITION).unwrap();

        let mut session = LedgerSession::at(&mut tables, &config, 6);
        let err = process_execute_draw(&mut session, COMPETITION).unwrap_err();
        assert!(is_error(&err, LedgerError::DrawAlreadyExecuted));
    }

    #[test]
    fn test_no_prizes_or_tickets() {
        let (mut tables, config) = draw_ready(3, vec![], "S");
        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        let err = process_execute_draw(&mut session, COMPETITION).unwrap_err();
        assert!(is_error(&err, LedgerError::NoPrizes));

        let mut tables = Tables::default();
        tables.upsert_competition(competition(COMPETITION, CompetitionStatus::Active, 10));
        tables.upsert_prize(prize("p1", COMPETITION, 1, 1, PrizeTier::Draw));
        revealed(&mut tables, &config, COMPETITION, "S");
        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        let err = process_execute_draw(&mut session, COMPETITION).unwrap_err();
        assert!(is_error(&err, LedgerError::NoEligibleTickets));
    }

    #[test]
    fn test_prize_change_after_commit_fails_the_draw() {
        let (mut tables, config) =
            draw_ready(5, vec![prize("p1", COMPETITION, 1, 1, PrizeTier::Draw)], "S");
        // a raw table write, past the upsert freeze
        tables.upsert_prize(prize("p1", COMPETITION, 1, 4, PrizeTier::Draw));
        let length = tables.chain_length();

        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        let err = process_execute_draw(&mut session, COMPETITION).unwrap_err();
        assert!(is_error(&err, LedgerError::DrawInputsChanged));
        assert!(tables.winners_for(COMPETITION).is_empty());
        assert_eq!(tables.chain_length(), length);
    }

    #[test]
    fn test_prize_digest_follows_draw_order() {
        let mut tables = Tables::default();
        tables.upsert_prize(prize("b", COMPETITION, 2, 1, PrizeTier::Draw));
        tables.upsert_prize(prize("a", COMPETITION, 1, 2, PrizeTier::Draw));
        tables.upsert_prize(prize("iw", COMPETITION, 1, 9, PrizeTier::InstantWin));
        tables.upsert_prize(prize("empty", COMPETITION, 3, 0, PrizeTier::Draw));

        let prizes = draw_prizes(&tables, COMPETITION);
        let ids: Vec<&str> = prizes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(prize_digest(&prizes), sha256_hex(&["a:1:2\nb:2:1".as_bytes()]));
    }
}
