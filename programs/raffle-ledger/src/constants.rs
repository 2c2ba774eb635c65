/// Number of entries summarized by each automatic checkpoint.
pub const CHECKPOINT_INTERVAL: u64 = 100;

/// Each checkpoint's CHECKPOINT entry must fall inside the next window.
pub const MIN_CHECKPOINT_INTERVAL: u64 = 2;

/// Entries checked on each side of a ticket's entry by `verify_ticket`.
pub const VERIFY_NEIGHBOURHOOD: u64 = 5;

/// Serialization conflicts retried by the service facade before surfacing.
pub const MAX_TRANSACTION_RETRIES: u32 = 3;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

pub const DEFAULT_UPCOMING_LIMIT: usize = 10;
pub const MAX_UPCOMING_LIMIT: usize = 100;

/// Instant-win percentages are carried in basis points (1% = 100).
pub const BASIS_POINTS: u64 = 10_000;

// Domain tags keep the different SHA-256 streams from colliding.
pub const DRAW_STREAM_DOMAIN: &[u8] = b"raffle-ledger/draw/v1";
pub const INSTANT_WIN_STREAM_DOMAIN: &[u8] = b"raffle-ledger/instant-win/v1";
pub const INSTANT_WIN_KEY_DOMAIN: &[u8] = b"raffle-ledger/instant-win-key/v1";

/// Length of the random nonce sealed with every instant-win record.
pub const SEAL_NONCE_LEN: usize = 12;

pub const ENV_PREFIX: &str = "RAFFLE_LEDGER_";
