use std::sync::Arc;

use anchor_lang::prelude::*;

pub use instructions::*;

/// HTTP routes over a shared ledger.
pub mod api;

/// Instant-win sealing and the key source it uses.
pub mod cipher;

/// Runtime settings read from the environment.
pub mod config;

/// Protocol constants: checkpoint interval, neighbourhood width, domain tags.
pub mod constants;

/// The ledger's error codes and their classification.
pub mod error;

/// One handler per ledger operation.
pub mod instructions;

/// Entry hashing and Merkle roots.
pub mod merkle;

/// Seeded deterministic stream used by draws and instant-win placement.
pub mod random;

/// Write handle that every mutating operation runs under.
pub mod session;

/// Rows the core reads and writes, including the chain entry payloads.
pub mod state;

/// Transactional table store.
pub mod store;

#[cfg(test)]
mod testing;

use crate::cipher::KeyProvider;
use crate::config::LedgerConfig;
use crate::session::{now_millis, LedgerSession};
use crate::state::*;
use crate::store::{serializable, with_retry, MemoryStore, Store, Tables};

/// The fairness core behind one store.
///
/// Every write runs as a serializable transaction and is re-run from the
/// start when it loses a race with another writer. Reads see a committed
/// snapshot.
pub struct RaffleLedger<S: Store = MemoryStore> {
    store: S,
    config: LedgerConfig,
    keys: Arc<dyn KeyProvider>,
}

impl<S: Store> RaffleLedger<S> {
    pub fn new(store: S, config: LedgerConfig, keys: Arc<dyn KeyProvider>) -> Self {
        Self { store, config, keys }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn snapshot(&self) -> Arc<Tables> {
        self.store.snapshot()
    }

    fn write<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(&mut LedgerSession) -> Result<T>,
    {
        with_retry(self.config.max_transaction_retries, || {
            serializable(&self.store, |tables| {
                let mut session = LedgerSession::new(tables, &self.config);
                op(&mut session)
            })
        })
    }

    // Rows synced from the marketplace. They carry no chain entry.

    pub fn upsert_competition(&self, competition: Competition) -> Result<Competition> {
        self.write(|session| process_upsert_competition(session, competition.clone()))
    }

    pub fn upsert_prize(&self, prize: Prize) -> Result<Prize> {
        self.write(|session| process_upsert_prize(session, prize.clone()))
    }

    // Chain

    pub fn append(&self, data: EntryData, metadata: Option<EntryMetadata>) -> Result<ChainEntry> {
        self.write(|session| process_append(session, data.clone(), metadata.clone()))
    }

    pub fn verify_range(&self, start: Option<u64>, end: Option<u64>) -> RangeVerification {
        process_verify_range(&self.snapshot(), start, end)
    }

    pub fn publish_checkpoint(&self, checkpoint_id: u64, published_hash: &str) -> Result<Checkpoint> {
        self.write(|session| process_publish_checkpoint(session, checkpoint_id, published_hash))
    }

    // Tickets and competitions

    pub fn record_ticket_purchase(&self, purchase: TicketPurchase) -> Result<Ticket> {
        self.write(|session| process_record_ticket(session, purchase.clone()))
    }

    pub fn set_competition_status(&self, competition_id: &str, status: CompetitionStatus) -> Result<Competition> {
        self.write(|session| process_set_competition_status(session, competition_id, status))
    }

    // Draw

    pub fn commit_seed(&self, competition_id: &str, seed: &str) -> Result<SeedCommitment> {
        self.write(|session| process_commit_seed(session, competition_id, seed))
    }

    pub fn reveal_seed(&self, competition_id: &str, seed: &str) -> Result<SeedRevelation> {
        self.write(|session| process_reveal_seed(session, competition_id, seed))
    }

    pub fn execute_draw(&self, competition_id: &str) -> Result<DrawExecution> {
        self.write(|session| process_execute_draw(session, competition_id))
    }

    pub fn draw_status(&self, competition_id: &str) -> Result<DrawStatus> {
        process_draw_status(&self.snapshot(), competition_id)
    }

    pub fn upcoming_draws(&self, limit: Option<usize>) -> Vec<UpcomingDraw> {
        process_upcoming_draws(&self.snapshot(), limit)
    }

    pub fn validate_draw(&self, competition_id: &str) -> Result<DrawValidation> {
        process_validate_draw(&self.snapshot(), competition_id)
    }

    // Prizes

    pub fn allocate_prize(&self, request: AllocationRequest) -> Result<Winner> {
        self.write(|session| process_allocate_prize(session, request.clone()))
    }

    pub fn claim_prize(&self, winner_id: &str, user_id: &str) -> Result<Winner> {
        self.write(|session| process_claim_prize(session, winner_id, user_id))
    }

    pub fn advance_winner(&self, winner_id: &str, status: WinnerStatus) -> Result<Winner> {
        self.write(|session| process_advance_winner(session, winner_id, status))
    }

    // Instant wins

    pub fn generate_instant_wins(&self, request: InstantWinRequest) -> Result<InstantWinGeneration> {
        self.write(|session| process_generate_instant_wins(session, self.keys.as_ref(), request.clone()))
    }

    pub fn check_instant_win(&self, competition_id: &str, ticket_number: &str) -> Result<InstantWinCheck> {
        process_check_instant_win(&self.snapshot(), self.keys.as_ref(), competition_id, ticket_number)
    }

    pub fn claim_instant_win(&self, instant_win_id: &str, ticket_id: &str, user_id: &str) -> Result<InstantWinClaim> {
        self.write(|session| {
            process_claim_instant_win(session, self.keys.as_ref(), instant_win_id, ticket_id, user_id)
        })
    }

    // Verification

    pub fn verify_ticket(&self, ticket_id: &str) -> Result<TicketVerification> {
        process_verify_ticket(&self.snapshot(), ticket_id, self.config.neighbourhood)
    }

    pub fn verify_chain_integrity(&self, start: Option<u64>, end: Option<u64>) -> ChainIntegrity {
        process_verify_chain(&self.snapshot(), start, end)
    }

    pub fn verify_checkpoint(&self, checkpoint_id: u64) -> Result<CheckpointVerification> {
        process_verify_checkpoint(&self.snapshot(), checkpoint_id)
    }

    pub fn verify_latest_checkpoint(&self) -> Result<LatestCheckpoint> {
        process_verify_latest_checkpoint(&self.snapshot())
    }

    pub fn draw_results(&self, competition_id: &str) -> Result<DrawResults> {
        process_draw_results(&self.snapshot(), competition_id)
    }

    pub fn report(&self) -> AuditReport {
        process_audit_report(&self.snapshot(), now_millis())
    }
}
