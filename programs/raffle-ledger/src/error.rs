use anchor_lang::prelude::*;
use anchor_lang::error::{Error, ERROR_CODE_OFFSET};

#[error_code]
pub enum LedgerError {
    // Integrity errors
    #[msg("Entry hash does not match its recomputed hash")]
    HashMismatch,
    #[msg("Entry does not link to the previous entry's hash")]
    BrokenLinkage,
    #[msg("Entry sequence is not contiguous")]
    SequenceGap,
    #[msg("Checkpoint Merkle root does not match its entry range")]
    MerkleRootMismatch,
    #[msg("More than one draw result recorded for the competition")]
    DuplicateDrawResult,
    #[msg("Sealed instant-win record failed authentication")]
    SealedRecordCorrupted,
    #[msg("Draw prizes differ from those bound at seed commitment")]
    DrawInputsChanged,

    // Protocol errors
    #[msg("A seed has already been committed for this competition")]
    AlreadyCommitted,
    #[msg("No seed has been committed for this competition")]
    SeedNotCommitted,
    #[msg("The committed seed has already been revealed")]
    AlreadyRevealed,
    #[msg("Revealed seed does not match the commitment")]
    SeedMismatch,
    #[msg("The seed has not been revealed")]
    SeedNotRevealed,
    #[msg("The draw has already been executed")]
    DrawAlreadyExecuted,
    #[msg("Seed must not be empty")]
    EmptySeed,
    #[msg("Competition is not in a drawable state")]
    CompetitionNotDrawable,
    #[msg("Competition is not accepting tickets")]
    CompetitionNotOpen,
    #[msg("Competition status transition is not allowed")]
    InvalidStatusTransition,
    #[msg("Competition has no prizes")]
    NoPrizes,
    #[msg("Competition has no eligible tickets")]
    NoEligibleTickets,
    #[msg("Ticket already has a prize allocated")]
    AlreadyAllocated,
    #[msg("Ticket does not belong to this competition")]
    TicketCompetitionMismatch,
    #[msg("Prize does not belong to this competition")]
    PrizeCompetitionMismatch,
    #[msg("Ticket is not owned by this user")]
    NotTicketOwner,
    #[msg("Ticket has already been recorded")]
    TicketAlreadyRecorded,
    #[msg("Ticket number does not carry a numeric position")]
    InvalidTicketNumber,
    #[msg("Winner is not owned by this user")]
    NotWinnerOwner,
    #[msg("Winner status does not allow this transition")]
    InvalidWinnerStatus,
    #[msg("Instant wins have already been generated for this competition")]
    InstantWinsAlreadyGenerated,
    #[msg("Competition has no instant-win prizes")]
    NoInstantWinPrizes,
    #[msg("Instant-win percentage must be between 0 and 100")]
    InvalidWinPercentage,
    #[msg("Ticket total must be positive and match the competition")]
    InvalidTicketTotal,
    #[msg("Instant win has already been claimed")]
    InstantWinAlreadyClaimed,
    #[msg("Ticket position does not match the instant win")]
    PositionMismatch,
    #[msg("Checkpoint has already been published")]
    CheckpointAlreadyPublished,
    #[msg("Published hash does not match the checkpoint hash")]
    PublishedHashMismatch,
    #[msg("Draw inputs are frozen once the competition leaves its open phase or a seed is committed")]
    DrawInputsFrozen,
    #[msg("Instant wins cannot be claimed once the draw seed is committed")]
    InstantWinClaimsClosed,
    #[msg("Instant wins must be generated before any ticket is sold")]
    TicketsAlreadySold,

    // Concurrency
    #[msg("Another transaction committed first; retry the operation")]
    ConcurrencyConflict,

    // Lookup errors
    #[msg("Competition not found")]
    CompetitionNotFound,
    #[msg("Ticket not found")]
    TicketNotFound,
    #[msg("Prize not found")]
    PrizeNotFound,
    #[msg("Winner not found")]
    WinnerNotFound,
    #[msg("Checkpoint not found")]
    CheckpointNotFound,
    #[msg("Instant win not found")]
    InstantWinNotFound,

    // Configuration and internal errors
    #[msg("Invalid configuration value")]
    InvalidConfig,
    #[msg("Instant-win key is unavailable")]
    KeyUnavailable,
    #[msg("Canonical serialization failed")]
    SerializationFailed,
    #[msg("Arithmetic overflow")]
    MathOverflow,
}

/// Coarse classification callers branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    IntegrityViolation,
    ProtocolViolation,
    ConcurrencyConflict,
    NotFound,
    Configuration,
    Internal,
}

// Variants are declared grouped by kind; these mark the group boundaries.
const PROTOCOL_START: u32 = LedgerError::AlreadyCommitted as u32;
const CONFLICT_START: u32 = LedgerError::ConcurrencyConflict as u32;
const NOT_FOUND_START: u32 = LedgerError::CompetitionNotFound as u32;
const CONFIG_START: u32 = LedgerError::InvalidConfig as u32;
const INTERNAL_START: u32 = LedgerError::SerializationFailed as u32;
const END: u32 = LedgerError::MathOverflow as u32 + 1;

impl LedgerError {
    pub fn kind(self) -> ErrorKind {
        kind_of_offset(self as u32).unwrap_or(ErrorKind::Internal)
    }
}

fn kind_of_offset(offset: u32) -> Option<ErrorKind> {
    let kind = match offset {
        o if o < PROTOCOL_START => ErrorKind::IntegrityViolation,
        o if o < CONFLICT_START => ErrorKind::ProtocolViolation,
        o if o < NOT_FOUND_START => ErrorKind::ConcurrencyConflict,
        o if o < CONFIG_START => ErrorKind::NotFound,
        o if o < INTERNAL_START => ErrorKind::Configuration,
        o if o < END => ErrorKind::Internal,
        _ => return None,
    };
    Some(kind)
}

/// Numeric code of an anchor error, if it carries one.
pub fn error_code(err: &Error) -> Option<u32> {
    match err {
        Error::AnchorError(e) => Some(e.error_code_number),
        Error::ProgramError(_) => None,
    }
}

pub fn is_error(err: &Error, expected: LedgerError) -> bool {
    error_code(err) == Some(u32::from(expected))
}

pub fn classify(err: &Error) -> ErrorKind {
    error_code(err)
        .and_then(|code| code.checked_sub(ERROR_CODE_OFFSET))
        .and_then(kind_of_offset)
        .unwrap_or(ErrorKind::Internal)
}

pub fn is_conflict(err: &Error) -> bool {
    is_error(err, LedgerError::ConcurrencyConflict)
}

/// Human-readable message without anchor's framing.
pub fn error_message(err: &Error) -> String {
    match err {
        Error::AnchorError(e) => e.error_msg.clone(),
        Error::ProgramError(e) => e.program_error.to_string(),
    }
}
