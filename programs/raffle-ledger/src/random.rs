use anchor_lang::prelude::*;
use solana_program::hash::hashv;

use crate::error::LedgerError;

/// Deterministic stream keyed on a seed: SHA-256 in counter mode.
///
/// block_i = SHA-256(domain || SHA-256(seed) || i as u64 LE)
///
/// Every value drawn is a pure function of (domain, seed, draw index), so a
/// third party holding the revealed seed reproduces the same sequence.
pub struct SeedStream {
    domain: &'static [u8],
    key: [u8; 32],
    counter: u64,
    block: [u8; 32],
    offset: usize,
}

impl SeedStream {
    pub fn new(domain: &'static [u8], seed: &[u8]) -> Self {
        Self {
            domain,
            key: hashv(&[seed]).to_bytes(),
            counter: 0,
            block: [0u8; 32],
            offset: 32,
        }
    }

    fn refill(&mut self) {
        self.block = hashv(&[self.domain, &self.key, &self.counter.to_le_bytes()]).to_bytes();
        self.counter = self.counter.wrapping_add(1);
        self.offset = 0;
    }

    pub fn next_u64(&mut self) -> u64 {
        if self.offset + 8 > self.block.len() {
            self.refill();
        }
        let mut arr = [0u8; 8];
        arr.copy_from_slice(&self.block[self.offset..self.offset + 8]);
        self.offset += 8;
        u64::from_le_bytes(arr)
    }

    /// Uniform value in `[0, bound)`, by rejection so no residue is favoured.
    pub fn below(&mut self, bound: u64) -> Result<u64> {
        require!(bound > 0, LedgerError::MathOverflow);
        // Largest multiple of `bound` that fits; values at or above it are redrawn.
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let v = self.next_u64();
            if v < zone {
                return Ok(v % bound);
            }
        }
    }

    /// Uniform value in `[min, max]`.
    pub fn in_range(&mut self, min: u64, max: u64) -> Result<u64> {
        require!(min <= max, LedgerError::MathOverflow);
        let span = max - min;
        if span == u64::MAX {
            return Ok(self.next_u64());
        }
        Ok(min + self.below(span + 1)?)
    }
}
