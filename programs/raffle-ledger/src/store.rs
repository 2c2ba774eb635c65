use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::sync::Arc;

use anchor_lang::prelude::*;
use parking_lot::RwLock;

use crate::error::{is_conflict, LedgerError};
use crate::state::*;

/// Keyed rows shared with the committed version until written.
///
/// Reads look in the transaction's write set first, then in the shared
/// base. Writes only touch the write set; `settle` folds it into the base
/// at commit.
#[derive(Clone, Debug)]
pub struct Table<K, V> {
    base: Arc<BTreeMap<K, V>>,
    writes: BTreeMap<K, V>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            base: Arc::new(BTreeMap::new()),
            writes: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V: Clone> Table<K, V> {
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.writes.get(key).or_else(|| self.base.get(key))
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Copies the row into the write set on first access.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        if !self.writes.contains_key(key) {
            let (k, v) = self.base.get_key_value(key)?;
            self.writes.insert(k.clone(), v.clone());
        }
        self.writes.get_mut(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.writes.insert(key, value);
    }

    /// Every row, unordered.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        let writes = &self.writes;
        self.base
            .iter()
            .filter(move |(k, _)| !writes.contains_key(*k))
            .map(|(_, v)| v)
            .chain(writes.values())
    }

    pub fn len(&self) -> usize {
        let added = self.writes.keys().filter(|k| !self.base.contains_key(*k)).count();
        self.base.len() + added
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub(crate) fn clear(&mut self) {
        self.base = Arc::new(BTreeMap::new());
        self.writes.clear();
    }

    /// Copies the base only when an older snapshot still shares it.
    fn settle(&mut self) {
        if !self.writes.is_empty() {
            let writes = std::mem::take(&mut self.writes);
            Arc::make_mut(&mut self.base).extend(writes);
        }
    }
}

/// Append-only rows; a transaction only holds what it appended.
#[derive(Clone, Debug)]
pub struct Log<T> {
    base: Arc<Vec<T>>,
    pending: Vec<T>,
}

impl<T> Default for Log<T> {
    fn default() -> Self {
        Self {
            base: Arc::new(Vec::new()),
            pending: Vec::new(),
        }
    }
}

impl<T: Clone> Log<T> {
    pub fn len(&self) -> usize {
        self.base.len() + self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        match index.checked_sub(self.base.len()) {
            Some(i) => self.pending.get(i),
            None => self.base.get(index),
        }
    }

    /// Rewriting a committed row copies the base; only rare admin writes do it.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        match index.checked_sub(self.base.len()) {
            Some(i) => self.pending.get_mut(i),
            None => Arc::make_mut(&mut self.base).get_mut(index),
        }
    }

    pub fn last(&self) -> Option<&T> {
        self.pending.last().or_else(|| self.base.last())
    }

    pub fn push(&mut self, row: T) {
        self.pending.push(row);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.base.iter().chain(self.pending.iter())
    }

    /// Rows at indexes `start..end`, clamped to the log.
    pub fn range(&self, start: usize, end: usize) -> impl Iterator<Item = &T> + '_ {
        let split = self.base.len();
        let end = end.min(self.len());
        let start = start.min(end);
        let head = &self.base[start.min(split)..end.min(split)];
        let tail = &self.pending[start.saturating_sub(split)..end.saturating_sub(split)];
        head.iter().chain(tail.iter())
    }

    /// Flattens the log into one editable vector.
    #[cfg(test)]
    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<T> {
        let mut all = (*self.base).clone();
        all.append(&mut self.pending);
        self.base = Arc::new(Vec::new());
        self.pending = all;
        &mut self.pending
    }

    fn settle(&mut self) {
        if !self.pending.is_empty() {
            Arc::make_mut(&mut self.base).append(&mut self.pending);
        }
    }
}

/// In-memory image of the tables the core reads and writes.
///
/// Entry index `i` holds sequence `i + 1`; checkpoint index `i` holds id
/// `i + 1`. Cloning is cheap: every table shares its committed rows.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    pub(crate) entries: Log<ChainEntry>,
    pub(crate) checkpoints: Log<Checkpoint>,
    pub(crate) draw_seeds: Table<CompetitionId, DrawSeed>,
    pub(crate) winners: Table<WinnerId, Winner>,
    pub(crate) instant_wins: Table<InstantWinId, InstantWin>,
    pub(crate) competitions: Table<CompetitionId, Competition>,
    pub(crate) tickets: Table<TicketId, Ticket>,
    pub(crate) prizes: Table<PrizeId, Prize>,
}

impl Tables {
    pub fn tail(&self) -> Option<&ChainEntry> {
        self.entries.last()
    }

    pub fn chain_length(&self) -> u64 {
        self.entries.len() as u64
    }

    pub fn entry(&self, sequence: u64) -> Option<&ChainEntry> {
        let index = usize::try_from(sequence.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    /// Entries with `start <= sequence <= end`, ascending.
    pub fn entries_in_range(&self, start: u64, end: u64) -> impl Iterator<Item = &ChainEntry> + '_ {
        let start = usize::try_from(start.max(1) - 1).unwrap_or(usize::MAX);
        let end = usize::try_from(end).unwrap_or(usize::MAX);
        self.entries.range(start, end)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ChainEntry> + '_ {
        self.entries.iter()
    }

    #[cfg(test)]
    pub(crate) fn entries_mut(&mut self) -> &mut Vec<ChainEntry> {
        self.entries.as_mut_vec()
    }

    pub(crate) fn push_entry(&mut self, entry: ChainEntry) {
        self.entries.push(entry);
    }

    pub fn checkpoints(&self) -> impl Iterator<Item = &Checkpoint> + '_ {
        self.checkpoints.iter()
    }

    pub fn checkpoint_count(&self) -> u64 {
        self.checkpoints.len() as u64
    }

    pub fn checkpoint(&self, id: u64) -> Option<&Checkpoint> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.checkpoints.get(index)
    }

    pub(crate) fn checkpoint_mut(&mut self, id: u64) -> Option<&mut Checkpoint> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.checkpoints.get_mut(index)
    }

    pub fn latest_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    pub(crate) fn push_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.checkpoints.push(checkpoint);
    }

    pub fn draw_seed(&self, competition_id: &str) -> Option<&DrawSeed> {
        self.draw_seeds.get(competition_id)
    }

    pub(crate) fn put_draw_seed(&mut self, seed: DrawSeed) {
        self.draw_seeds.insert(seed.competition_id.clone(), seed);
    }

    pub fn competition(&self, id: &str) -> Result<&Competition> {
        self.competitions
            .get(id)
            .ok_or_else(|| error!(LedgerError::CompetitionNotFound))
    }

    pub(crate) fn competition_mut(&mut self, id: &str) -> Result<&mut Competition> {
        self.competitions
            .get_mut(id)
            .ok_or_else(|| error!(LedgerError::CompetitionNotFound))
    }

    pub fn competitions(&self) -> impl Iterator<Item = &Competition> + '_ {
        self.competitions.values()
    }

    pub fn ticket(&self, id: &str) -> Result<&Ticket> {
        self.tickets
            .get(id)
            .ok_or_else(|| error!(LedgerError::TicketNotFound))
    }

    pub(crate) fn ticket_mut(&mut self, id: &str) -> Result<&mut Ticket> {
        self.tickets
            .get_mut(id)
            .ok_or_else(|| error!(LedgerError::TicketNotFound))
    }

    pub fn has_ticket(&self, id: &str) -> bool {
        self.tickets.contains_key(id)
    }

    pub fn tickets_for(&self, competition_id: &str) -> impl Iterator<Item = &Ticket> + '_ {
        let competition_id = competition_id.to_string();
        self.tickets
            .values()
            .filter(move |t| t.competition_id == competition_id)
    }

    pub fn prize(&self, id: &str) -> Result<&Prize> {
        self.prizes
            .get(id)
            .ok_or_else(|| error!(LedgerError::PrizeNotFound))
    }

    pub fn prizes_for(&self, competition_id: &str) -> Vec<&Prize> {
        let mut prizes: Vec<&Prize> = self
            .prizes
            .values()
            .filter(|p| p.competition_id == competition_id)
            .collect();
        prizes.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        prizes
    }

    pub fn winner(&self, id: &str) -> Result<&Winner> {
        self.winners
            .get(id)
            .ok_or_else(|| error!(LedgerError::WinnerNotFound))
    }

    pub(crate) fn winner_mut(&mut self, id: &str) -> Result<&mut Winner> {
        self.winners
            .get_mut(id)
            .ok_or_else(|| error!(LedgerError::WinnerNotFound))
    }

    pub fn winner_for_ticket(&self, competition_id: &str, ticket_id: &str) -> Option<&Winner> {
        self.winners
            .values()
            .find(|w| w.competition_id == competition_id && w.ticket_id == ticket_id)
    }

    pub fn winners_for(&self, competition_id: &str) -> Vec<&Winner> {
        let mut winners: Vec<&Winner> = self
            .winners
            .values()
            .filter(|w| w.competition_id == competition_id)
            .collect();
        winners.sort_by_key(|w| w.chain_sequence);
        winners
    }

    pub(crate) fn insert_winner(&mut self, winner: Winner) {
        self.winners.insert(winner.id.clone(), winner);
    }

    pub fn instant_win(&self, id: &str) -> Result<&InstantWin> {
        self.instant_wins
            .get(id)
            .ok_or_else(|| error!(LedgerError::InstantWinNotFound))
    }

    pub(crate) fn instant_win_mut(&mut self, id: &str) -> Result<&mut InstantWin> {
        self.instant_wins
            .get_mut(id)
            .ok_or_else(|| error!(LedgerError::InstantWinNotFound))
    }

    pub fn instant_win_at(&self, competition_id: &str, position: u64) -> Option<&InstantWin> {
        self.instant_wins
            .values()
            .find(|iw| iw.competition_id == competition_id && iw.position == position)
    }

    pub fn instant_win_count(&self, competition_id: &str) -> usize {
        self.instant_wins
            .values()
            .filter(|iw| iw.competition_id == competition_id)
            .count()
    }

    /// Enforces one instant win per (competition, position).
    pub(crate) fn insert_instant_win(&mut self, instant_win: InstantWin) -> Result<()> {
        require!(
            self.instant_win_at(&instant_win.competition_id, instant_win.position)
                .is_none(),
            LedgerError::InstantWinsAlreadyGenerated
        );
        self.instant_wins.insert(instant_win.id.clone(), instant_win);
        Ok(())
    }

    // Rows owned by the surrounding marketplace.

    pub fn upsert_competition(&mut self, competition: Competition) {
        self.competitions.insert(competition.id.clone(), competition);
    }

    pub fn upsert_prize(&mut self, prize: Prize) {
        self.prizes.insert(prize.id.clone(), prize);
    }

    pub(crate) fn insert_ticket(&mut self, ticket: Ticket) {
        self.tickets.insert(ticket.id.clone(), ticket);
    }

    /// Folds every write set into its shared base.
    fn settle(&mut self) {
        self.entries.settle();
        self.checkpoints.settle();
        self.draw_seeds.settle();
        self.winners.settle();
        self.instant_wins.settle();
        self.competitions.settle();
        self.tickets.settle();
        self.prizes.settle();
    }
}

/// A serializable unit of work: the committed tables it began from plus
/// its own write sets.
pub struct Transaction {
    base_version: u64,
    tables: Tables,
}

impl Transaction {
    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn tables_mut(&mut self) -> &mut Tables {
        &mut self.tables
    }
}

/// The transactional data store the core runs on.
///
/// Readers get a committed snapshot. Writers get a serializable transaction:
/// `commit` fails with `ConcurrencyConflict` when another transaction
/// committed after this one began, and nothing from the loser is kept.
pub trait Store: Send + Sync {
    fn snapshot(&self) -> Arc<Tables>;
    fn begin(&self) -> Transaction;
    fn commit(&self, tx: Transaction) -> Result<()>;
}

struct Committed {
    version: u64,
    tables: Arc<Tables>,
}

pub struct MemoryStore {
    inner: RwLock<Committed>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_tables(Tables::default())
    }

    pub fn with_tables(mut tables: Tables) -> Self {
        tables.settle();
        Self {
            inner: RwLock::new(Committed {
                version: 0,
                tables: Arc::new(tables),
            }),
        }
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }

    /// Rewrites committed rows in place, bypassing the chain. Test-only tampering.
    #[cfg(test)]
    pub(crate) fn tamper<F: FnOnce(&mut Tables)>(&self, f: F) {
        let mut guard = self.inner.write();
        let mut tables = (*guard.tables).clone();
        f(&mut tables);
        tables.settle();
        guard.tables = Arc::new(tables);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&self.inner.read().tables)
    }

    fn begin(&self) -> Transaction {
        let guard = self.inner.read();
        Transaction {
            base_version: guard.version,
            tables: (*guard.tables).clone(),
        }
    }

    fn commit(&self, tx: Transaction) -> Result<()> {
        let mut guard = self.inner.write();
        if guard.version != tx.base_version {
            tracing::warn!(
                began_at = tx.base_version,
                store_at = guard.version,
                "serialization conflict"
            );
            return err!(LedgerError::ConcurrencyConflict);
        }
        let mut tables = tx.tables;
        // Release the committed image first so settling can take its shared
        // rows without copying them, unless a reader still holds a snapshot.
        guard.tables = Arc::new(Tables::default());
        tables.settle();
        guard.version += 1;
        guard.tables = Arc::new(tables);
        Ok(())
    }
}

/// Runs `op` in one serializable transaction; an error from `op` rolls back.
pub fn serializable<S, T, F>(store: &S, op: F) -> Result<T>
where
    S: Store + ?Sized,
    F: FnOnce(&mut Tables) -> Result<T>,
{
    let mut tx = store.begin();
    let out = op(tx.tables_mut())?;
    store.commit(tx)?;
    Ok(out)
}

/// Re-runs the whole logical operation after a serialization conflict.
/// Other errors are returned at once.
pub fn with_retry<T, F>(max_attempts: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op() {
            Err(e) if is_conflict(&e) && attempt < attempts => {
                tracing::debug!(attempt, attempts, "retrying after conflict");
                attempt += 1;
            }
            other => return other,
        }
    }
}
