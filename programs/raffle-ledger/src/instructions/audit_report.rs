use serde::Serialize;

use crate::instructions::{process_verify_chain, ChainIntegrity};
use crate::state::Checkpoint;
use crate::store::Tables;

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableCounts {
    pub competitions: u64,
    pub tickets: u64,
    pub prizes: u64,
    pub winners: u64,
    pub draw_seeds: u64,
    pub checkpoints: u64,
    pub instant_wins: u64,
    pub instant_wins_claimed: u64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: i64,
    pub chain_length: u64,
    pub latest_checkpoint: Option<Checkpoint>,
    pub integrity: ChainIntegrity,
    pub counts: TableCounts,
}

/// Full-chain audit for operators.
pub fn process_audit_report(tables: &Tables, now: i64) -> AuditReport {
    let counts = TableCounts {
        competitions: tables.competitions.len() as u64,
        tickets: tables.tickets.len() as u64,
        prizes: tables.prizes.len() as u64,
        winners: tables.winners.len() as u64,
        draw_seeds: tables.draw_seeds.len() as u64,
        checkpoints: tables.checkpoints.len() as u64,
        instant_wins: tables.instant_wins.len() as u64,
        instant_wins_claimed: tables.instant_wins.values().filter(|iw| iw.is_claimed).count() as u64,
    };

    AuditReport {
        generated_at: now,
        chain_length: tables.chain_length(),
        latest_checkpoint: tables.latest_checkpoint().cloned(),
        integrity: process_verify_chain(tables, None, None),
        counts,
    }
}
