use serde::Serialize;

use crate::merkle::compute_entry_hash;
use crate::state::ChainEntry;
use crate::store::Tables;

/// Which property of an entry failed verification.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityFacet {
    /// Stored hash differs from the recomputed one.
    Hash,
    /// `previous_hash` differs from the predecessor's hash.
    Linkage,
    /// Sequence is not exactly predecessor + 1.
    Sequence,
    /// `type` disagrees with the payload variant.
    EntryType,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RangeVerification {
    pub is_valid: bool,
    pub start_sequence: u64,
    pub end_sequence: u64,
    pub entries_checked: u64,
    pub broken_at_sequence: Option<u64>,
    pub failure: Option<IntegrityFacet>,
    pub errors: Vec<String>,
    pub note: Option<String>,
}

impl RangeVerification {
    fn empty(start: u64, end: u64) -> Self {
        Self {
            is_valid: true,
            start_sequence: start,
            end_sequence: end,
            entries_checked: 0,
            broken_at_sequence: None,
            failure: None,
            errors: Vec::new(),
            note: Some("No entries in the requested range".to_string()),
        }
    }
}

/// True when the stored hash equals the recomputed hash and the type tag
/// agrees with the payload.
pub fn entry_hash_valid(entry: &ChainEntry) -> bool {
    entry.entry_type == entry.data.entry_type()
        && compute_entry_hash(entry).map_or(false, |h| h == entry.hash)
}

fn check_entry(
    entry: &ChainEntry,
    predecessor: Option<&ChainEntry>,
) -> Option<(IntegrityFacet, String)> {
    match predecessor {
        Some(prev) => {
            if Some(entry.sequence) != prev.sequence.checked_add(1) {
                return Some((
                    IntegrityFacet::Sequence,
                    format!(
                        "Entry {} follows entry {}; expected sequence {}",
                        entry.sequence,
                        prev.sequence,
                        prev.sequence.saturating_add(1)
                    ),
                ));
            }
            if entry.previous_hash.as_deref() != Some(prev.hash.as_str()) {
                return Some((
                    IntegrityFacet::Linkage,
                    format!(
                        "Entry {} previous hash does not match hash of entry {}",
                        entry.sequence, prev.sequence
                    ),
                ));
            }
        }
        None if entry.sequence == 1 && entry.previous_hash.is_some() => {
            return Some((
                IntegrityFacet::Linkage,
                "Entry 1 must not reference a previous hash".to_string(),
            ));
        }
        None => {}
    }

    if entry.entry_type != entry.data.entry_type() {
        return Some((
            IntegrityFacet::EntryType,
            format!(
                "Entry {} is typed {:?} but carries a {:?} payload",
                entry.sequence,
                entry.entry_type,
                entry.data.entry_type()
            ),
        ));
    }

    match compute_entry_hash(entry) {
        Ok(hash) if hash == entry.hash => None,
        Ok(hash) => Some((
            IntegrityFacet::Hash,
            format!(
                "Entry {} hash mismatch: stored {}, computed {}",
                entry.sequence, entry.hash, hash
            ),
        )),
        Err(_) => Some((
            IntegrityFacet::Hash,
            format!("Entry {} could not be canonically encoded", entry.sequence),
        )),
    }
}

/// Verifies `entries` in order, stopping at the first failure.
/// `predecessor` is the entry just before the first one, when there is one.
pub fn verify_entries<'a, I>(entries: I, predecessor: Option<&'a ChainEntry>) -> RangeVerification
where
    I: IntoIterator<Item = &'a ChainEntry>,
{
    let mut prev = predecessor;
    let mut checked = 0u64;
    let mut bounds: Option<(u64, u64)> = None;
    for entry in entries {
        checked += 1;
        let start = bounds.map_or(entry.sequence, |(start, _)| start);
        bounds = Some((start, entry.sequence));
        if let Some((facet, message)) = check_entry(entry, prev) {
            return RangeVerification {
                is_valid: false,
                start_sequence: start,
                end_sequence: entry.sequence,
                entries_checked: checked,
                broken_at_sequence: Some(entry.sequence),
                failure: Some(facet),
                errors: vec![message],
                note: None,
            };
        }
        prev = Some(entry);
    }

    match bounds {
        None => RangeVerification::empty(0, 0),
        Some((start, end)) => RangeVerification {
            is_valid: true,
            start_sequence: start,
            end_sequence: end,
            entries_checked: checked,
            broken_at_sequence: None,
            failure: None,
            errors: Vec::new(),
            note: None,
        },
    }
}

/// Replays `[start, end]` (defaults: whole chain) against whatever snapshot
/// `tables` is. The entry before `start`, if any, anchors the first link.
pub fn process_verify_range(tables: &Tables, start: Option<u64>, end: Option<u64>) -> RangeVerification {
    let start = start.unwrap_or(1).max(1);
    let end = end.unwrap_or_else(|| tables.chain_length()).min(tables.chain_length());
    if start > end {
        return RangeVerification::empty(start, end);
    }

    let predecessor = tables.entry(start - 1);
    let mut result = verify_entries(tables.entries_in_range(start, end), predecessor);
    result.start_sequence = start;
    result.end_sequence = end;
    result
}
