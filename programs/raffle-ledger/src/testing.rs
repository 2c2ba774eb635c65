//! Fixtures shared by the unit tests.

use crate::config::LedgerConfig;
use crate::instructions::*;
use crate::session::LedgerSession;
use crate::state::*;
use crate::store::Tables;

pub const COMPETITION: &str = "comp-1";

pub fn config(checkpoint_interval: u64) -> LedgerConfig {
    LedgerConfig {
        checkpoint_interval,
        ..LedgerConfig::default()
    }
}

pub fn sample_data(i: u64) -> EntryData {
    EntryData::TicketPurchase(TicketPurchaseData {
        ticket_id: format!("sample-ticket-{i}"),
        ticket_number: format!("S-{:04}", i + 1),
        competition_id: "comp-sample".to_string(),
        user_id: format!("user-{}", i % 7),
    })
}

/// A chain of `n` appended sample entries, checkpointing every `interval`.
pub fn chain_of(n: u64, interval: u64) -> Tables {
    let mut tables = Tables::default();
    let config = config(interval);
    for i in 0..n {
        let mut session = LedgerSession::at(&mut tables, &config, 1_000 + i as i64);
        process_append(&mut session, sample_data(i), None).unwrap();
    }
    tables
}

pub fn competition(id: &str, status: CompetitionStatus, total_tickets: u64) -> Competition {
    Competition {
        id: id.to_string(),
        title: format!("Raffle {id}"),
        status,
        total_tickets,
        draw_at: None,
    }
}

pub fn prize(id: &str, competition_id: &str, position: u32, quantity: u32, tier: PrizeTier) -> Prize {
    Prize {
        id: id.to_string(),
        competition_id: competition_id.to_string(),
        name: format!("Prize {id}"),
        value_cents: 10_000 * u64::from(position),
        quantity,
        position,
        tier,
    }
}

pub fn purchase(competition_id: &str, position: u64, user_id: &str) -> TicketPurchase {
    TicketPurchase {
        ticket_id: format!("{competition_id}-t{position}"),
        competition_id: competition_id.to_string(),
        user_id: user_id.to_string(),
        ticket_number: format!("LC-{position:04}"),
    }
}

pub fn ticket_id(competition_id: &str, position: u64) -> String {
    format!("{competition_id}-t{position}")
}

/// An ACTIVE competition with `tickets` recorded purchases (users alternate
/// between `user-a` and `user-b`) and the given prizes.
pub fn raffle(
    tables: &mut Tables,
    config: &LedgerConfig,
    competition_id: &str,
    total_tickets: u64,
    tickets: u64,
    prizes: Vec<Prize>,
) {
    tables.upsert_competition(competition(competition_id, CompetitionStatus::Active, total_tickets));
    for p in prizes {
        tables.upsert_prize(p);
    }
    for position in 1..=tickets {
        let user = if position % 2 == 1 { "user-a" } else { "user-b" };
        let mut session = LedgerSession::at(tables, config, 10_000 + position as i64);
        process_record_ticket(&mut session, purchase(competition_id, position, user)).unwrap();
    }
}

/// Drives a competition through commit and reveal with `seed`.
pub fn revealed(tables: &mut Tables, config: &LedgerConfig, competition_id: &str, seed: &str) {
    let mut session = LedgerSession::at(tables, config, 50_000);
    process_commit_seed(&mut session, competition_id, seed).unwrap();
    let mut session = LedgerSession::at(tables, config, 60_000);
    process_reveal_seed(&mut session, competition_id, seed).unwrap();
}
