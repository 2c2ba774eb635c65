use anchor_lang::prelude::*;
use serde::Serialize;

use crate::constants::{DEFAULT_UPCOMING_LIMIT, MAX_UPCOMING_LIMIT};
use crate::instructions::{draw_result_entries, process_verify_range, RangeVerification};
use crate::merkle::seed_commitment;
use crate::state::*;
use crate::store::Tables;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawStatus {
    pub competition_id: CompetitionId,
    pub title: String,
    pub competition_status: CompetitionStatus,
    pub seed_status: Option<SeedStatus>,
    pub seed_commit: Option<String>,
    /// Only present once revealed.
    pub seed_reveal: Option<String>,
    pub ticket_count: u64,
    pub eligible_ticket_count: u64,
    pub prize_units: u64,
    pub instant_win_count: u64,
    /// Filled in once the draw has run.
    pub winners: Option<Vec<Winner>>,
}

pub fn process_draw_status(tables: &Tables, competition_id: &str) -> Result<DrawStatus> {
    let competition = tables.competition(competition_id)?;
    let seed = tables.draw_seed(competition_id);

    let (ticket_count, eligible_ticket_count) =
        tables
            .tickets_for(competition_id)
            .fold((0u64, 0u64), |(all, eligible), t| {
                (all + 1, eligible + u64::from(t.status == TicketStatus::Active))
            });
    let prize_units = tables
        .prizes_for(competition_id)
        .iter()
        .filter(|p| p.tier == PrizeTier::Draw)
        .map(|p| u64::from(p.quantity))
        .sum();

    let drawn = matches!(seed.map(|s| s.status), Some(SeedStatus::Used));
    let winners = drawn.then(|| {
        tables
            .winners_for(competition_id)
            .into_iter()
            .filter(|w| !w.is_instant_win)
            .cloned()
            .collect()
    });

    Ok(DrawStatus {
        competition_id: competition.id.clone(),
        title: competition.title.clone(),
        competition_status: competition.status,
        seed_status: seed.map(|s| s.status),
        seed_commit: seed.map(|s| s.seed_commit.clone()),
        seed_reveal: seed.and_then(|s| s.seed_reveal.clone()),
        ticket_count,
        eligible_ticket_count,
        prize_units,
        instant_win_count: tables.instant_win_count(competition_id) as u64,
        winners,
    })
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingDraw {
    pub competition_id: CompetitionId,
    pub title: String,
    pub status: CompetitionStatus,
    pub draw_at: Option<i64>,
    pub ticket_count: u64,
    pub seed_status: Option<SeedStatus>,
}

/// Competitions whose draw has not run yet, soonest first. Undated ones last.
pub fn process_upcoming_draws(tables: &Tables, limit: Option<usize>) -> Vec<UpcomingDraw> {
    let limit = limit
        .unwrap_or(DEFAULT_UPCOMING_LIMIT)
        .clamp(1, MAX_UPCOMING_LIMIT);

    let mut pending: Vec<UpcomingDraw> = tables
        .competitions()
        .filter(|c| {
            matches!(
                c.status,
                CompetitionStatus::Active | CompetitionStatus::SoldOut | CompetitionStatus::Drawing
            )
        })
        .filter(|c| !matches!(tables.draw_seed(&c.id).map(|s| s.status), Some(SeedStatus::Used)))
        .map(|c| UpcomingDraw {
            competition_id: c.id.clone(),
            title: c.title.clone(),
            status: c.status,
            draw_at: c.draw_at,
            ticket_count: tables.tickets_for(&c.id).count() as u64,
            seed_status: tables.draw_seed(&c.id).map(|s| s.status),
        })
        .collect();

    pending.sort_by(|a, b| match (a.draw_at, b.draw_at) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.competition_id.cmp(&b.competition_id)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.competition_id.cmp(&b.competition_id),
    });
    pending.truncate(limit);
    pending
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeedValidation {
    pub committed: bool,
    pub revealed: bool,
    pub status: Option<SeedStatus>,
    /// `None` until there is a reveal to check.
    pub commitment_matches: Option<bool>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DrawValidation {
    pub competition_id: CompetitionId,
    pub valid: bool,
    pub draw_seed: SeedValidation,
    pub chain_verification: RangeVerification,
    pub winners_count: usize,
    pub draw_results_count: usize,
    pub errors: Vec<String>,
}

/// Operator-side audit of one competition's draw: seed commitment, chain
/// integrity and the recorded result against the winner rows.
pub fn process_validate_draw(tables: &Tables, competition_id: &str) -> Result<DrawValidation> {
    tables.competition(competition_id)?;
    let seed = tables.draw_seed(competition_id);
    let chain_verification = process_verify_range(tables, None, None);
    let mut errors = chain_verification.errors.clone();

    let commitment_matches = seed
        .and_then(|s| s.seed_reveal.as_deref().map(|r| seed_commitment(r) == s.seed_commit));
    if commitment_matches == Some(false) {
        errors.push("Revealed seed does not hash to the commitment".to_string());
    }

    let winners_count = tables
        .winners_for(competition_id)
        .iter()
        .filter(|w| !w.is_instant_win)
        .count();
    let results = draw_result_entries(tables, competition_id);
    let drawn = matches!(seed.map(|s| s.status), Some(SeedStatus::Used));

    if drawn {
        match results.as_slice() {
            [entry] => {
                if let EntryData::DrawResult(d) = &entry.data {
                    if d.winners.len() != winners_count {
                        errors.push(format!(
                            "Draw result lists {} winners but {} are recorded",
                            d.winners.len(),
                            winners_count
                        ));
                    }
                    if Some(d.seed_reveal.as_str()) != seed.and_then(|s| s.seed_reveal.as_deref()) {
                        errors.push("Draw result was made with a different seed".to_string());
                    }
                }
            }
            [] => errors.push("Draw marked as used but no draw result is recorded".to_string()),
            _ => errors.push(format!("{} draw results recorded", results.len())),
        }
    } else if !results.is_empty() {
        errors.push("Draw result recorded before the seed was used".to_string());
    }

    Ok(DrawValidation {
        competition_id: competition_id.to_string(),
        valid: errors.is_empty(),
        draw_seed: SeedValidation {
            committed: seed.is_some(),
            revealed: seed.map_or(false, |s| s.seed_reveal.is_some()),
            status: seed.map(|s| s.status),
            commitment_matches,
        },
        chain_verification,
        winners_count,
        draw_results_count: results.len(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instructions::process_execute_draw;
    use crate::session::LedgerSession;
    use crate::testing::*;

    #[test]
    fn test_status_through_lifecycle() {
        let mut tables = Tables::default();
        let config = config(100);
        raffle(
            &mut tables,
            &config,
            COMPETITION,
            100,
            4,
            vec![prize("p1", COMPETITION, 1, 2, PrizeTier::Draw)],
        );

        let status = process_draw_status(&tables, COMPETITION).unwrap();
        assert_eq!(status.seed_status, None);
        assert_eq!(status.ticket_count, 4);
        assert_eq!(status.prize_units, 2);
        assert_eq!(status.winners, None);

        revealed(&mut tables, &config, COMPETITION, "S");
        let status = process_draw_status(&tables, COMPETITION).unwrap();
        assert_eq!(status.seed_status, Some(SeedStatus::Revealed));
        assert_eq!(status.seed_reveal.as_deref(), Some("S"));

        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        process_execute_draw(&mut session, COMPETITION).unwrap();
        let status = process_draw_status(&tables, COMPETITION).unwrap();
        assert_eq!(status.winners.map(|w| w.len()), Some(2));
        assert_eq!(status.eligible_ticket_count, 2);
    }

    #[test]
    fn test_upcoming_order_and_limit() {
        let mut tables = Tables::default();
        for (id, draw_at) in [("c-late", Some(300)), ("c-soon", Some(100)), ("c-undated", None)] {
            let mut c = competition(id, CompetitionStatus::Active, 10);
            c.draw_at = draw_at;
            tables.upsert_competition(c);
        }
        tables.upsert_competition(competition("c-draft", CompetitionStatus::Draft, 10));

        let ids: Vec<String> = process_upcoming_draws(&tables, None)
            .into_iter()
            .map(|u| u.competition_id)
            .collect();
        assert_eq!(ids, vec!["c-soon", "c-late", "c-undated"]);
        assert_eq!(process_upcoming_draws(&tables, Some(1)).len(), 1);
        assert_eq!(process_upcoming_draws(&tables, Some(0)).len(), 1);
    }

    #[test]
    fn test_validate_after_draw() {
        let mut tables = Tables::default();
        let config = config(100);
        raffle(
            &mut tables,
            &config,
            COMPETITION,
            100,
            3,
            vec![prize("p1", COMPETITION, 1, 1, PrizeTier::Draw)],
        );
        revealed(&mut tables, &config, COMPETITION, "S");
        let mut session = LedgerSession::at(&mut tables, &config, 70_000);
        process_execute_draw(&mut session, COMPETITION).unwrap();

        let validation = process_validate_draw(&tables, COMPETITION).unwrap();
        assert!(validation.valid, "{:?}", validation.errors);
        assert!(validation.draw_seed.committed && validation.draw_seed.revealed);
        assert_eq!(validation.draw_seed.commitment_matches, Some(true));
        assert_eq!(validation.winners_count, 1);
        assert_eq!(validation.draw_results_count, 1);

        // a winner row removed behind the chain's back is noticed
        tables.winners.clear();
        let validation = process_validate_draw(&tables, COMPETITION).unwrap();
        assert!(!validation.valid);
    }
}
