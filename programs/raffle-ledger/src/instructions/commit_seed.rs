use anchor_lang::prelude::*;
use serde::Serialize;

use crate::error::LedgerError;
use crate::instructions::{draw_prizes, prize_digest, process_append};
use crate::merkle::seed_commitment;
use crate::session::LedgerSession;
use crate::state::*;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedCommitment {
    pub competition_id: CompetitionId,
    pub commit_hash: String,
    pub chain_sequence: u64,
    pub chain_hash: String,
    pub timestamp: i64,
}

/// Binds the competition's draw to `seed` by publishing only its hash.
///
/// The seed itself is neither stored nor logged here. One commitment per
/// competition, ever.
pub fn process_commit_seed(
    session: &mut LedgerSession,
    competition_id: &str,
    seed: &str,
) -> Result<SeedCommitment> {
    require!(!seed.is_empty(), LedgerError::EmptySeed);

    let status = session.tables.competition(competition_id)?.status;
    require!(
        session.tables.draw_seed(competition_id).is_none(),
        LedgerError::AlreadyCommitted
    );
    require!(
        matches!(status, CompetitionStatus::Active | CompetitionStatus::SoldOut),
        LedgerError::CompetitionNotDrawable
    );

    let commit_hash = seed_commitment(seed);
    let digest = prize_digest(&draw_prizes(session.tables, competition_id));
    let entry = process_append(
        session,
        EntryData::SeedCommit(SeedCommitData {
            competition_id: competition_id.to_string(),
            seed_commit: commit_hash.clone(),
            prize_digest: digest.clone(),
        }),
        None,
    )?;

    session.tables.put_draw_seed(DrawSeed {
        competition_id: competition_id.to_string(),
        seed_commit: commit_hash.clone(),
        commit_timestamp: session.now,
        commit_sequence: entry.sequence,
        prize_digest: digest,
        seed_reveal: None,
        reveal_timestamp: None,
        status: SeedStatus::Committed,
    });

    tracing::info!(competition_id, commit = %commit_hash, "seed committed");
    Ok(SeedCommitment {
        competition_id: competition_id.to_string(),
        commit_hash,
        chain_sequence: entry.sequence,
        chain_hash: entry.hash,
        timestamp: session.now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::error::is_error;
    use crate::store::Tables;
    use crate::testing::{competition, prize, COMPETITION};

    fn active() -> Tables {
        let mut tables = Tables::default();
        tables.upsert_competition(competition(COMPETITION, CompetitionStatus::Active, 10));
        tables
    }

    #[test]
    fn test_commit_records_hash_only() {
        let mut tables = active();
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 9);
        let commitment = process_commit_seed(&mut session, COMPETITION, "abc").unwrap();

        assert_eq!(
            commitment.commit_hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        let seed = tables.draw_seed(COMPETITION).unwrap();
        assert_eq!(seed.status, SeedStatus::Committed);
        assert_eq!(seed.seed_reveal, None);
        assert_eq!(seed.commit_sequence, commitment.chain_sequence);

        let entry = tables.tail().unwrap();
        assert_eq!(entry.entry_type, EntryType::SeedCommit);
        assert_eq!(entry.hash, commitment.chain_hash);
        let json = serde_json::to_string(entry).unwrap();
        assert!(!json.contains("\"abc\""));
    }

    #[test]
    fn test_second_commit_fails() {
        let mut tables = active();
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 9);
        process_commit_seed(&mut session, COMPETITION, "abc").unwrap();

        let mut session = LedgerSession::at(&mut tables, &config, 10);
        let err = process_commit_seed(&mut session, COMPETITION, "other").unwrap_err();
        assert!(is_error(&err, LedgerError::AlreadyCommitted));
        assert_eq!(tables.chain_length(), 1);
    }

    #[test]
    fn test_commit_requires_open_competition() {
        let mut tables = Tables::default();
        tables.upsert_competition(competition(COMPETITION, CompetitionStatus::Draft, 10));
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 9);
        let err = process_commit_seed(&mut session, COMPETITION, "abc").unwrap_err();
        assert!(is_error(&err, LedgerError::CompetitionNotDrawable));

        let mut session = LedgerSession::at(&mut tables, &config, 9);
        let err = process_commit_seed(&mut session, COMPETITION, "").unwrap_err();
        assert!(is_error(&err, LedgerError::EmptySeed));
    }

    #[test]
    fn test_commit_binds_the_prize_set() {
        let mut tables = active();
        tables.upsert_prize(prize("p1", COMPETITION, 1, 2, PrizeTier::Draw));
        tables.upsert_prize(prize("iw", COMPETITION, 2, 5, PrizeTier::InstantWin));
        let config = LedgerConfig::default();
        let mut session = LedgerSession::at(&mut tables, &config, 9);
        process_commit_seed(&mut session, COMPETITION, "abc").unwrap();

        let expected = prize_digest(&draw_prizes(&tables, COMPETITION));
        assert_eq!(tables.draw_seed(COMPETITION).unwrap().prize_digest, expected);
        match &tables.tail().unwrap().data {
            EntryData::SeedCommit(d) => assert_eq!(d.prize_digest, expected),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}
