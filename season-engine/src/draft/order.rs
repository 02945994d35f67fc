// The draft order calculator.
//
// Produces the complete 224-pick order (7 rounds, 32 slots, gapless) from
// the resolved standings and the extracted playoff bracket. Within the
// non-playoff tier the worse team picks earlier; playoff teams then follow
// in elimination order: wild-card losers, divisional losers, conference
// losers, the runner-up, the champion. Rounds 2 through 7 repeat the
// round-one order.
//
// Computation is a dry run by default; nothing is written until the caller
// explicitly commits via `Database::save_draft_order`.

use rand::rngs::SmallRng;
use tracing::{debug, info, warn};

use crate::config::LeagueConfig;
use crate::db::Database;
use crate::error::EngineError;
use crate::playoffs::{get_playoff_results, PlayoffResults};
use crate::records::{HeadToHeadLedger, TeamId, TeamRecord};
use crate::standings::resolve_standings;
use crate::tiebreak::{entropy_rng, resolve_draft_tie, seeded_rng};

use super::pick::{DraftPick, PickReason};

/// Outcome of one draft-order computation.
///
/// `picks` is empty exactly when `errors` is non-empty. A partial order
/// (playoffs still running) carries `playoffs_complete = false`, only the
/// non-playoff tier, and a warning explaining what is missing.
#[derive(Debug, Clone, Default)]
pub struct ResolutionResult {
    pub picks: Vec<DraftPick>,
    pub playoffs_complete: bool,
    /// Seed the tie-breaking RNG was built from, when one was supplied.
    pub seed: Option<u64>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

pub struct DraftOrderCalculator<'a> {
    db: &'a Database,
    league: LeagueConfig,
    rng: SmallRng,
    seed: Option<u64>,
}

impl<'a> DraftOrderCalculator<'a> {
    /// Calculator with entropy-seeded tie breaking.
    pub fn new(db: &'a Database, league: LeagueConfig) -> Self {
        Self {
            db,
            league,
            rng: entropy_rng(),
            seed: None,
        }
    }

    /// Calculator with a fixed seed; two runs over the same data produce
    /// byte-identical orders.
    pub fn with_seed(db: &'a Database, league: LeagueConfig, seed: u64) -> Self {
        Self {
            db,
            league,
            rng: seeded_rng(seed),
            seed: Some(seed),
        }
    }

    /// Compute the draft order for one dynasty/season.
    pub fn get_draft_order(&mut self, dynasty_id: &str, season: u16) -> ResolutionResult {
        let mut result = ResolutionResult {
            seed: self.seed,
            ..ResolutionResult::default()
        };

        match self.compute(dynasty_id, season, &mut result) {
            Ok(picks) => {
                if let Err(e) = self.validate_order(&picks, result.playoffs_complete) {
                    result.errors.push(e.to_string());
                } else {
                    result.picks = picks;
                }
            }
            Err(e) => result.errors.push(e.to_string()),
        }

        if !result.errors.is_empty() {
            result.picks.clear();
        }
        result
    }

    fn compute(
        &mut self,
        dynasty_id: &str,
        season: u16,
        result: &mut ResolutionResult,
    ) -> Result<Vec<DraftPick>, EngineError> {
        let mut records = self
            .db
            .load_team_records(dynasty_id, season, "regular")
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
        if records.is_empty() {
            return Err(EngineError::MissingStandings {
                dynasty: dynasty_id.to_string(),
                season,
            });
        }

        self.fill_strength_of_schedule(dynasty_id, season, &mut records, result)?;

        let ledger = self.build_ledger(dynasty_id, season)?;
        let view = resolve_standings(
            dynasty_id,
            season,
            &records,
            &ledger,
            &self.league,
            &mut self.rng,
        )?;

        let playoffs = match get_playoff_results(self.db, dynasty_id, season) {
            Ok(playoffs) => {
                result.playoffs_complete = true;
                Some(playoffs)
            }
            Err(e) if e.is_recoverable() => {
                result.playoffs_complete = false;
                result.warnings.push(format!(
                    "{e}; emitting a partial order covering non-playoff teams only"
                ));
                None
            }
            Err(e) => return Err(e),
        };

        // Non-playoff tier: everyone outside the playoff field, worst first.
        let qualifiers = view.playoff_qualifiers(&self.league);
        let non_playoff: Vec<&TeamRecord> = records
            .iter()
            .filter(|r| !qualifiers.contains(&r.team_id))
            .collect();
        let expected_non_playoff = (self.league.num_teams - self.league.playoff_teams) as usize;
        if non_playoff.len() != expected_non_playoff {
            return Err(EngineError::StructuralViolation(format!(
                "{} non-playoff teams, expected {}",
                non_playoff.len(),
                expected_non_playoff
            )));
        }

        let mut round_one: Vec<(TeamId, PickReason)> = self
            .order_tier(non_playoff, &ledger)
            .into_iter()
            .map(|team| (team, PickReason::NonPlayoff))
            .collect();

        if let Some(playoffs) = &playoffs {
            round_one.extend(self.playoff_tiers(playoffs, &records, &ledger)?);
        }

        info!(
            dynasty = dynasty_id,
            season,
            slots = round_one.len(),
            complete = result.playoffs_complete,
            "computed round-one order"
        );

        Ok(self.expand_rounds(&round_one, &records))
    }

    /// Fill in strength of schedule for any record the standings store left
    /// unmaterialized: average opponent win percentage from the schedule,
    /// falling back to a neutral 0.500 with a warning when the schedule is
    /// unavailable too.
    fn fill_strength_of_schedule(
        &self,
        dynasty_id: &str,
        season: u16,
        records: &mut [TeamRecord],
        result: &mut ResolutionResult,
    ) -> Result<(), EngineError> {
        if records.iter().all(|r| r.strength_of_schedule.is_some()) {
            return Ok(());
        }

        let opponents = self
            .db
            .opponents_for(dynasty_id, season)
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
        let pct_by_team: std::collections::HashMap<TeamId, f64> =
            records.iter().map(|r| (r.team_id, r.win_pct())).collect();

        for record in records.iter_mut() {
            if record.strength_of_schedule.is_some() {
                continue;
            }
            let sos = opponents.get(&record.team_id).and_then(|opps| {
                let pcts: Vec<f64> = opps
                    .iter()
                    .filter_map(|o| pct_by_team.get(o).copied())
                    .collect();
                if pcts.is_empty() {
                    None
                } else {
                    Some(pcts.iter().sum::<f64>() / pcts.len() as f64)
                }
            });
            match sos {
                Some(value) => {
                    debug!(team = record.team_id, sos = value, "derived strength of schedule");
                    record.strength_of_schedule = Some(value);
                }
                None => {
                    warn!(
                        team = record.team_id,
                        "no schedule data for strength of schedule; defaulting to 0.500"
                    );
                    result.warnings.push(format!(
                        "team {} missing strength of schedule; defaulted to 0.500",
                        record.team_id
                    ));
                    record.strength_of_schedule = Some(0.5);
                }
            }
        }
        Ok(())
    }

    fn build_ledger(
        &self,
        dynasty_id: &str,
        season: u16,
    ) -> Result<HeadToHeadLedger, EngineError> {
        let games = self
            .db
            .load_regular_games(dynasty_id, season)
            .map_err(|e| EngineError::Storage(format!("{e:#}")))?;
        let mut ledger = HeadToHeadLedger::new();
        for game in &games {
            ledger.record_game(game.home_team, game.away_team, game.winner);
        }
        Ok(ledger)
    }

    /// Order one tier worst-first: ascending win percentage, identical
    /// records settled by the draft cascade (weaker schedule picks earlier,
    /// coin flip only on exact equality).
    fn order_tier(
        &mut self,
        mut members: Vec<&TeamRecord>,
        ledger: &HeadToHeadLedger,
    ) -> Vec<TeamId> {
        members.sort_by(|a, b| {
            a.win_pct()
                .partial_cmp(&b.win_pct())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.record_key().cmp(&b.record_key()))
        });

        let mut order = Vec::with_capacity(members.len());
        let mut i = 0;
        while i < members.len() {
            let mut j = i + 1;
            while j < members.len() && members[j].record_key() == members[i].record_key() {
                j += 1;
            }
            if j - i == 1 {
                order.push(members[i].team_id);
            } else {
                let resolution = resolve_draft_tie(&members[i..j], ledger, &mut self.rng);
                order.extend(&resolution.order);
            }
            i = j;
        }
        order
    }

    /// Slots 19-32: playoff teams in elimination order, each elimination
    /// tier internally ordered by the draft cascade.
    fn playoff_tiers(
        &mut self,
        playoffs: &PlayoffResults,
        records: &[TeamRecord],
        ledger: &HeadToHeadLedger,
    ) -> Result<Vec<(TeamId, PickReason)>, EngineError> {
        let mut slots = Vec::with_capacity(self.league.playoff_teams as usize);

        let tiers: [(&[TeamId], PickReason); 3] = [
            (&playoffs.wild_card_losers, PickReason::WildCardLoser),
            (&playoffs.divisional_losers, PickReason::DivisionalLoser),
            (&playoffs.conference_losers, PickReason::ConferenceLoser),
        ];
        for (teams, reason) in tiers {
            let members = self.tier_records(teams, records)?;
            for team in self.order_tier(members, ledger) {
                slots.push((team, reason));
            }
        }

        // validate() guarantees both are present by the time we get here.
        if let Some(loser) = playoffs.super_bowl_loser {
            slots.push((loser, PickReason::SuperBowlLoser));
        }
        if let Some(winner) = playoffs.super_bowl_winner {
            slots.push((winner, PickReason::SuperBowlWinner));
        }
        Ok(slots)
    }

    fn tier_records<'r>(
        &self,
        teams: &[TeamId],
        records: &'r [TeamRecord],
    ) -> Result<Vec<&'r TeamRecord>, EngineError> {
        teams
            .iter()
            .map(|&team| {
                records.iter().find(|r| r.team_id == team).ok_or_else(|| {
                    EngineError::DataInconsistency(format!(
                        "playoff team {team} has no standings record"
                    ))
                })
            })
            .collect()
    }

    /// Expand the round-one order into every round of the draft, numbering
    /// overall picks gaplessly.
    fn expand_rounds(
        &self,
        round_one: &[(TeamId, PickReason)],
        records: &[TeamRecord],
    ) -> Vec<DraftPick> {
        let slots = round_one.len() as u32;
        let mut picks = Vec::with_capacity((slots * self.league.draft_rounds) as usize);
        for round in 1..=self.league.draft_rounds {
            for (slot, &(team_id, reason)) in round_one.iter().enumerate() {
                let record = records.iter().find(|r| r.team_id == team_id);
                picks.push(DraftPick {
                    overall: (round - 1) * slots + slot as u32 + 1,
                    round,
                    pick_in_round: slot as u32 + 1,
                    team_id,
                    record: record.map(|r| r.overall.display()).unwrap_or_default(),
                    reason,
                    strength_of_schedule: record
                        .and_then(|r| r.strength_of_schedule)
                        .unwrap_or(0.5),
                });
            }
        }
        picks
    }

    /// Structural checks on the finished order: gapless overall numbering,
    /// the right number of slots per round, every team appearing once per
    /// round.
    fn validate_order(
        &self,
        picks: &[DraftPick],
        playoffs_complete: bool,
    ) -> Result<(), EngineError> {
        let slots = if playoffs_complete {
            self.league.num_teams
        } else {
            self.league.num_teams - self.league.playoff_teams
        };
        let expected = (slots * self.league.draft_rounds) as usize;
        if picks.len() != expected {
            return Err(EngineError::StructuralViolation(format!(
                "draft order holds {} picks, expected {}",
                picks.len(),
                expected
            )));
        }

        let mut appearances: std::collections::HashMap<TeamId, u32> =
            std::collections::HashMap::new();
        for (i, pick) in picks.iter().enumerate() {
            if pick.overall != i as u32 + 1 {
                return Err(EngineError::StructuralViolation(format!(
                    "pick at position {} numbered {}, order is not gapless",
                    i + 1,
                    pick.overall
                )));
            }
            *appearances.entry(pick.team_id).or_insert(0) += 1;
        }
        for (&team, &count) in &appearances {
            if count != self.league.draft_rounds {
                return Err(EngineError::StructuralViolation(format!(
                    "team {} holds {} picks, expected {}",
                    team, count, self.league.draft_rounds
                )));
            }
        }
        Ok(())
    }
}
