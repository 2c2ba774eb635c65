use anchor_lang::prelude::*;
use serde::{Deserialize, Serialize};

pub type CompetitionId = String;
pub type TicketId = String;
pub type UserId = String;
pub type PrizeId = String;
pub type WinnerId = String;
pub type InstantWinId = String;

/// Closed set of events the chain records.
#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryType {
    TicketPurchase,
    PrizeAllocation,
    DrawResult,
    PrizeClaim,
    CompetitionStateChange,
    InstantWinReveal,
    SeedCommit,
    SeedReveal,
    Checkpoint,
}

/// One immutable, hash-linked record. Written once by `process_append`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainEntry {
    /// Starts at 1 and increases by exactly one per entry.
    pub sequence: u64,

    #[serde(rename = "type")]
    pub entry_type: EntryType,

    /// Unix milliseconds at append time.
    pub timestamp: i64,

    pub data: EntryData,

    pub metadata: Option<EntryMetadata>,

    /// `None` only for sequence 1.
    pub previous_hash: Option<String>,

    /// Lowercase hex SHA-256 over the canonical encoding of the fields above.
    pub hash: String,
}

/// Typed payload per entry type. The variant must agree with `ChainEntry::entry_type`.
#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum EntryData {
    TicketPurchase(TicketPurchaseData),
    PrizeAllocation(PrizeAllocationData),
    DrawResult(DrawResultData),
    PrizeClaim(PrizeClaimData),
    CompetitionStateChange(CompetitionStateChangeData),
    InstantWinReveal(InstantWinRevealData),
    SeedCommit(SeedCommitData),
    SeedReveal(SeedRevealData),
    Checkpoint(CheckpointData),
}

impl EntryData {
    pub fn entry_type(&self) -> EntryType {
        match self {
            EntryData::TicketPurchase(_) => EntryType::TicketPurchase,
            EntryData::PrizeAllocation(_) => EntryType::PrizeAllocation,
            EntryData::DrawResult(_) => EntryType::DrawResult,
            EntryData::PrizeClaim(_) => EntryType::PrizeClaim,
            EntryData::CompetitionStateChange(_) => EntryType::CompetitionStateChange,
            EntryData::InstantWinReveal(_) => EntryType::InstantWinReveal,
            EntryData::SeedCommit(_) => EntryType::SeedCommit,
            EntryData::SeedReveal(_) => EntryType::SeedReveal,
            EntryData::Checkpoint(_) => EntryType::Checkpoint,
        }
    }

    /// Competition the entry concerns, if any.
    pub fn competition_id(&self) -> Option<&str> {
        match self {
            EntryData::TicketPurchase(d) => Some(&d.competition_id),
            EntryData::PrizeAllocation(d) => Some(&d.competition_id),
            EntryData::DrawResult(d) => Some(&d.competition_id),
            EntryData::PrizeClaim(d) => Some(&d.competition_id),
            EntryData::CompetitionStateChange(d) => Some(&d.competition_id),
            EntryData::InstantWinReveal(d) => Some(&d.payload.competition_id),
            EntryData::SeedCommit(d) => Some(&d.competition_id),
            EntryData::SeedReveal(d) => Some(&d.competition_id),
            EntryData::Checkpoint(_) => None,
        }
    }
}

/// Free-form audit annotations, e.g. the prize name on an allocation.
#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub prize_name: Option<String>,
    pub prize_value_cents: Option<u64>,
    pub note: Option<String>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TicketPurchaseData {
    pub ticket_id: TicketId,
    pub ticket_number: String,
    pub competition_id: CompetitionId,
    pub user_id: UserId,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrizeAllocationData {
    pub winner_id: WinnerId,
    pub competition_id: CompetitionId,
    pub ticket_id: TicketId,
    pub ticket_number: String,
    pub prize_id: PrizeId,
    pub user_id: UserId,
    pub is_instant_win: bool,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawWinnerRecord {
    pub winner_id: WinnerId,
    pub ticket_id: TicketId,
    pub ticket_number: String,
    pub prize_id: PrizeId,
    pub prize_name: String,
    pub prize_position: u32,
    pub user_id: UserId,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawResultData {
    pub competition_id: CompetitionId,
    pub seed_commit: String,
    pub seed_reveal: String,
    /// Size of the eligible pool the draw sampled from.
    pub ticket_count: u64,
    /// SHA-256 over the pool's ticket ids in draw order, newline separated.
    pub pool_digest: String,
    pub winners: Vec<DrawWinnerRecord>,
    /// Prize units left over when the pool ran out.
    pub unallocated_units: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrizeClaimData {
    pub winner_id: WinnerId,
    pub competition_id: CompetitionId,
    pub ticket_id: TicketId,
    pub prize_id: PrizeId,
    pub user_id: UserId,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompetitionStateChangeData {
    pub competition_id: CompetitionId,
    pub change: StateChange,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StateChange {
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        from: CompetitionStatus,
        to: CompetitionStatus,
    },
    /// Summary of an instant-win generation. Never carries positions.
    #[serde(rename_all = "camelCase")]
    InstantWinsGenerated {
        count: u64,
        total_tickets: u64,
        win_percentage_bp: u32,
        /// SHA-256 over the salt and the sorted position set.
        positions_digest: String,
        /// The digest salt, sealed with the instant-win key.
        sealed_salt: String,
    },
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinRevealData {
    pub instant_win_id: InstantWinId,
    pub winner_id: WinnerId,
    pub ticket_id: TicketId,
    pub user_id: UserId,
    /// The decrypted record, verbatim.
    pub payload: InstantWinPayload,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedCommitData {
    pub competition_id: CompetitionId,
    pub seed_commit: String,
    /// Digest of the draw-tier prizes the seed was committed against.
    pub prize_digest: String,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedRevealData {
    pub competition_id: CompetitionId,
    pub seed_reveal: String,
    pub seed_commit: String,
    /// Sequence of the SEED_COMMIT entry this reveal answers.
    pub commit_sequence: u64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointData {
    pub checkpoint_id: u64,
    pub start_sequence: u64,
    pub end_sequence: u64,
    pub entries_count: u64,
    pub merkle_root: String,
    pub hash: String,
}

/// Merkle-rooted summary of `[start_sequence, end_sequence]`.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub id: u64,
    pub start_sequence: u64,
    pub end_sequence: u64,
    pub entries_count: u64,
    pub merkle_root: String,
    /// Hash of the last entry in range.
    pub hash: String,
    pub created_at: i64,
    pub published_hash: Option<String>,
    pub published_at: Option<i64>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeedStatus {
    Committed,
    Revealed,
    Used,
}

/// Commit-reveal state for one competition's draw.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawSeed {
    pub competition_id: CompetitionId,

    /// SHA-256 hex of the secret seed.
    pub seed_commit: String,

    pub commit_timestamp: i64,

    /// Sequence of the SEED_COMMIT entry.
    pub commit_sequence: u64,

    /// Prize digest recorded in the SEED_COMMIT entry.
    pub prize_digest: String,

    /// The secret itself, `None` until revealed.
    pub seed_reveal: Option<String>,

    pub reveal_timestamp: Option<i64>,

    pub status: SeedStatus,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WinnerStatus {
    Pending,
    Notified,
    Claimed,
    Paid,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub id: WinnerId,
    pub competition_id: CompetitionId,
    pub ticket_id: TicketId,
    pub prize_id: PrizeId,
    pub user_id: UserId,
    pub status: WinnerStatus,
    pub is_instant_win: bool,
    /// Sequence of the PRIZE_ALLOCATION entry.
    pub chain_sequence: u64,
    pub created_at: i64,
    pub claimed_at: Option<i64>,
}

/// A pre-allocated winning position. Never serialized to public surfaces.
#[derive(Clone, Debug, PartialEq)]
pub struct InstantWin {
    pub id: InstantWinId,
    pub competition_id: CompetitionId,
    pub position: u64,
    pub prize_id: PrizeId,
    /// `hex(nonce):hex(ciphertext)` of an `InstantWinPayload`.
    pub encrypted_data: String,
    pub is_claimed: bool,
    pub is_revealed: bool,
    pub ticket_id: Option<TicketId>,
    pub claimed_at: Option<i64>,
}

/// Plaintext sealed into `InstantWin::encrypted_data`.
#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstantWinPayload {
    pub position: u64,
    pub prize_id: PrizeId,
    pub competition_id: CompetitionId,
    pub created_at: i64,
}

#[derive(AnchorSerialize, AnchorDeserialize, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompetitionStatus {
    Draft,
    Active,
    SoldOut,
    Drawing,
    Completed,
    Cancelled,
}

impl CompetitionStatus {
    /// Administrative transitions. DRAWING and COMPLETED are entered by the draw itself.
    pub fn can_transition_to(self, next: CompetitionStatus) -> bool {
        use CompetitionStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Draft, Cancelled)
                | (Active, SoldOut)
                | (Active, Cancelled)
                | (SoldOut, Active)
                | (SoldOut, Cancelled)
        )
    }
}

// Rows below belong to the surrounding marketplace; the core reads them and
// flips a few statuses.

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Competition {
    pub id: CompetitionId,
    pub title: String,
    pub status: CompetitionStatus,
    pub total_tickets: u64,
    pub draw_at: Option<i64>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    Winner,
    Refunded,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub competition_id: CompetitionId,
    pub user_id: UserId,
    /// Display number, e.g. `"LC-0042"`; its trailing digits are the position.
    pub ticket_number: String,
    pub status: TicketStatus,
    /// Sequence of the TICKET_PURCHASE entry, once recorded.
    pub chain_sequence: Option<u64>,
    pub purchased_at: i64,
}

impl Ticket {
    pub fn position(&self) -> Option<u64> {
        ticket_position(&self.ticket_number)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrizeTier {
    Draw,
    InstantWin,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Prize {
    pub id: PrizeId,
    pub competition_id: CompetitionId,
    pub name: String,
    pub value_cents: u64,
    pub quantity: u32,
    /// Draw order; position 1 is drawn first.
    pub position: u32,
    pub tier: PrizeTier,
}

/// Numeric position carried by a ticket number: its trailing run of digits.
pub fn ticket_position(ticket_number: &str) -> Option<u64> {
    let digits: String = ticket_number
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse::<u64>().ok().filter(|p| *p > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_position() {
        assert_eq!(ticket_position("LC-0042"), Some(42));
        assert_eq!(ticket_position("7"), Some(7));
        assert_eq!(ticket_position("A1B22"), Some(22));
        assert_eq!(ticket_position("LC-"), None);
        assert_eq!(ticket_position("LC-0000"), None);
    }

    #[test]
    fn test_entry_type_follows_payload() {
        let data = EntryData::SeedCommit(SeedCommitData {
            competition_id: "comp-1".to_string(),
            seed_commit: "ab".to_string(),
            prize_digest: "cd".to_string(),
        });
        assert_eq!(data.entry_type(), EntryType::SeedCommit);
        assert_eq!(data.competition_id(), Some("comp-1"));
    }

    #[test]
    fn test_status_transitions() {
        assert!(CompetitionStatus::Draft.can_transition_to(CompetitionStatus::Active));
        assert!(CompetitionStatus::Active.can_transition_to(CompetitionStatus::SoldOut));
        assert!(!CompetitionStatus::Active.can_transition_to(CompetitionStatus::Completed));
        assert!(!CompetitionStatus::Completed.can_transition_to(CompetitionStatus::Active));
    }
}
