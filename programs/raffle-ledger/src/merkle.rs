use anchor_lang::prelude::*;
use solana_program::hash::hashv;

use crate::error::LedgerError;
use crate::state::ChainEntry;

/// SHA-256 over the concatenated parts, as lowercase hex.
pub fn sha256_hex(parts: &[&[u8]]) -> String {
    hex::encode(hashv(parts).to_bytes())
}

/// Digest a secret seed the way commitments are formed.
pub fn seed_commitment(seed: &str) -> String {
    sha256_hex(&[seed.as_bytes()])
}

fn write_canonical<T: AnchorSerialize>(buf: &mut Vec<u8>, value: &T) -> Result<()> {
    value
        .serialize(buf)
        .map_err(|_| error!(LedgerError::SerializationFailed))
}

/// Canonical bytes of everything an entry's hash commits to.
/// Borsh encoding of sequence, type, timestamp, data, metadata, previous hash.
pub fn canonical_bytes(entry: &ChainEntry) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(256);
    write_canonical(&mut buf, &entry.sequence)?;
    write_canonical(&mut buf, &entry.entry_type)?;
    write_canonical(&mut buf, &entry.timestamp)?;
    write_canonical(&mut buf, &entry.data)?;
    write_canonical(&mut buf, &entry.metadata)?;
    write_canonical(&mut buf, &entry.previous_hash)?;
    Ok(buf)
}

/// Recompute an entry's hash from its fields, ignoring the stored `hash`.
pub fn compute_entry_hash(entry: &ChainEntry) -> Result<String> {
    let bytes = canonical_bytes(entry)?;
    Ok(sha256_hex(&[&bytes]))
}

/// Parent of two sibling hashes: SHA-256 of the concatenated hex strings.
/// Order matters; entries are ordered by sequence.
pub fn hash_pair(left: &str, right: &str) -> String {
    sha256_hex(&[left.as_bytes(), right.as_bytes()])
}

/// Merkle root over ordered hashes. Odd levels duplicate their last element.
/// An empty list has no meaningful root and yields the digest of nothing.
pub fn merkle_root(hashes: &[String]) -> String {
    if hashes.is_empty() {
        return sha256_hex(&[]);
    }

    let mut level: Vec<String> = hashes.to_vec();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }
        level = level
            .chunks_exact(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    level.swap_remove(0)
}
