use anchor_lang::prelude::*;
use serde::Serialize;

use crate::error::LedgerError;
use crate::instructions::{entry_hash_valid, process_verify_range, RangeVerification};
use crate::state::*;
use crate::store::Tables;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawResults {
    pub competition_id: CompetitionId,
    pub is_drawn: bool,
    pub entry: Option<ChainEntry>,
    pub entry_hash_valid: bool,
    /// Replay of the chain up to and including the result entry.
    pub chain: Option<RangeVerification>,
    pub winners: Vec<DrawWinnerRecord>,
    /// One line per winner, in draw order.
    pub summary: Vec<String>,
}

/// DRAW_RESULT entries recorded for a competition, in chain order.
pub fn draw_result_entries<'a>(tables: &'a Tables, competition_id: &str) -> Vec<&'a ChainEntry> {
    tables
        .entries()
        .filter(|e| matches!(&e.data, EntryData::DrawResult(d) if d.competition_id == competition_id))
        .collect()
}

pub fn process_draw_results(tables: &Tables, competition_id: &str) -> Result<DrawResults> {
    tables.competition(competition_id)?;
    let entries = draw_result_entries(tables, competition_id);
    if entries.len() > 1 {
        tracing::error!(
            competition_id,
            results = entries.len(),
            "integrity fault: more than one draw result recorded"
        );
        return err!(LedgerError::DuplicateDrawResult);
    }

    let Some(entry) = entries.first().copied() else {
        return Ok(DrawResults {
            competition_id: competition_id.to_string(),
            is_drawn: false,
            entry: None,
            entry_hash_valid: false,
            chain: None,
            winners: Vec::new(),
            summary: Vec::new(),
        });
    };

    let winners = match &entry.data {
        EntryData::DrawResult(d) => d.winners.clone(),
        _ => Vec::new(),
    };
    let summary = winners
        .iter()
        .map(|w| {
            format!(
                "Prize {} ({}): ticket {}",
                w.prize_position, w.prize_name, w.ticket_number
            )
        })
        .collect();

    Ok(DrawResults {
        competition_id: competition_id.to_string(),
        is_drawn: true,
        entry_hash_valid: entry_hash_valid(entry),
        chain: Some(process_verify_range(tables, None, Some(entry.sequence))),
        entry: Some(entry.clone()),
        winners,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::process_execute_draw;
    use crate::session::LedgerSession;
    use crate::testing::*;

    fn drawn() -> Tables {
        let mut tables = Tables::default();
        let config = config(100);
        raffle(
            &mut tables,
            &config,
            COMPETITION,
            100,
            5,
            vec![
                prize("p1", COMPETITION, 1, 1, PrizeTier::Draw),
                prize("p2", COMPETITION, 2, 1, PrizeTier::Draw),
            ],
        );
        revealed(&mut tables, &config, COMPETITION, "S");
        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        process_execute_draw(&mut session, COMPETITION).unwrap();
        tables
    }

    #[test]
    fn test_results_after_draw() {
        let tables = drawn();
        let results = process_draw_results(&tables, COMPETITION).unwrap();
        assert!(results.is_drawn);
        assert!(results.entry_hash_valid);
        assert!(results.chain.unwrap().is_valid);
        assert_eq!(results.winners.len(), 2);
        assert!(results.summary[0].starts_with("Prize 1 (Prize p1): ticket LC-"));
    }

    #[test]
    fn test_not_drawn_yet() {
        let mut tables = Tables::default();
        raffle(&mut tables, &config(100), COMPETITION, 100, 2, vec![]);
        let results = process_draw_results(&tables, COMPETITION).unwrap();
        assert!(!results.is_drawn);
        assert!(results.winners.is_empty());
    }

    #[test]
    fn test_duplicate_result_is_integrity_fault() {
        let mut tables = drawn();
        let duplicate = draw_result_entries(&tables, COMPETITION)[0].clone();
        tables.entries_mut().push(duplicate);
        let err = process_draw_results(&tables, COMPETITION).unwrap_err();
        assert!(crate::error::is_error(&err, LedgerError::DuplicateDrawResult));
    }
}
