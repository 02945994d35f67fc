// Standings resolution: division ranks and wild-card ranks per conference.
//
// Teams are ordered by win percentage, with groups of identical
// win/loss/tie records handed to the tiebreaker cascade. A tie means exact
// record equality; two teams whose derived percentages happen to coincide
// with different counts are separated by record, not flipped for.

use std::collections::{HashMap, HashSet};

use rand::rngs::SmallRng;
use tracing::debug;

use crate::config::LeagueConfig;
use crate::error::EngineError;
use crate::records::{HeadToHeadLedger, TeamId, TeamRecord};
use crate::tiebreak::{resolve_division_tie, resolve_wildcard_tie, TieResolution};

/// Fully resolved standings for one dynasty/season.
#[derive(Debug, Clone, Default)]
pub struct StandingsView {
    /// Ranked team ids per (conference, division), best first.
    pub division_ranks: HashMap<(u32, u32), Vec<TeamId>>,
    /// Ranked non-division-winners per conference, best first. The top
    /// `wildcard_berths` of each list qualify.
    pub wildcard_ranks: HashMap<u32, Vec<TeamId>>,
    /// Audit trail of every tiebreaker invocation, in resolution order.
    pub tiebreak_trails: Vec<TieResolution>,
}

impl StandingsView {
    /// Division winners for one conference, in division-id order.
    pub fn division_winners(&self, conference_id: u32) -> Vec<TeamId> {
        let mut divisions: Vec<_> = self
            .division_ranks
            .iter()
            .filter(|((conf, _), _)| *conf == conference_id)
            .collect();
        divisions.sort_by_key(|((_, div), _)| *div);
        divisions
            .into_iter()
            .filter_map(|(_, ranks)| ranks.first().copied())
            .collect()
    }

    /// The full playoff field: every division winner plus the top wild-card
    /// teams of each conference.
    pub fn playoff_qualifiers(&self, league: &LeagueConfig) -> HashSet<TeamId> {
        let mut qualifiers = HashSet::new();
        for ranks in self.division_ranks.values() {
            if let Some(&winner) = ranks.first() {
                qualifiers.insert(winner);
            }
        }
        for ranks in self.wildcard_ranks.values() {
            for &team in ranks.iter().take(league.wildcard_berths as usize) {
                qualifiers.insert(team);
            }
        }
        qualifiers
    }
}

/// Resolve division and wild-card standings from a complete set of team
/// records.
///
/// Errors:
/// - [`EngineError::MissingStandings`] when `records` is empty; an empty
///   standings store means "not available", never a league of 0-0 teams.
/// - [`EngineError::StructuralViolation`] for wrong team counts, duplicate
///   ids, or a team with the wrong number of games played.
pub fn resolve_standings(
    dynasty_id: &str,
    season: u16,
    records: &[TeamRecord],
    ledger: &HeadToHeadLedger,
    league: &LeagueConfig,
    rng: &mut SmallRng,
) -> Result<StandingsView, EngineError> {
    validate_records(dynasty_id, season, records, league)?;

    let mut view = StandingsView::default();

    // Division ranks.
    let mut divisions: HashMap<(u32, u32), Vec<&TeamRecord>> = HashMap::new();
    for record in records {
        divisions
            .entry((record.conference_id, record.division_id))
            .or_default()
            .push(record);
    }
    let teams_per_division =
        league.num_teams / (league.conferences * league.divisions_per_conference);
    for (&key, members) in &divisions {
        if members.len() != teams_per_division as usize {
            return Err(EngineError::StructuralViolation(format!(
                "conference {} division {} has {} teams, expected {}",
                key.0,
                key.1,
                members.len(),
                teams_per_division
            )));
        }
    }

    for (key, members) in divisions {
        let (order, trails) = rank_group(members, ledger, rng, resolve_division_tie);
        debug!(
            conference = key.0,
            division = key.1,
            ?order,
            "resolved division"
        );
        view.division_ranks.insert(key, order);
        view.tiebreak_trails.extend(trails);
    }

    // Wild-card ranks: everyone who did not win their division, per
    // conference, under the wild-card cascade.
    let winners: HashSet<TeamId> = view
        .division_ranks
        .values()
        .filter_map(|ranks| ranks.first().copied())
        .collect();

    for conference_id in 1..=league.conferences {
        let contenders: Vec<&TeamRecord> = records
            .iter()
            .filter(|r| r.conference_id == conference_id && !winners.contains(&r.team_id))
            .collect();
        let (order, trails) = rank_group(contenders, ledger, rng, resolve_wildcard_tie);
        view.wildcard_ranks.insert(conference_id, order);
        view.tiebreak_trails.extend(trails);
    }

    Ok(view)
}

fn validate_records(
    dynasty_id: &str,
    season: u16,
    records: &[TeamRecord],
    league: &LeagueConfig,
) -> Result<(), EngineError> {
    if records.is_empty() {
        return Err(EngineError::MissingStandings {
            dynasty: dynasty_id.to_string(),
            season,
        });
    }
    if records.len() != league.num_teams as usize {
        return Err(EngineError::StructuralViolation(format!(
            "standings hold {} teams, expected {}",
            records.len(),
            league.num_teams
        )));
    }

    let mut seen = HashSet::new();
    for record in records {
        if !seen.insert(record.team_id) {
            return Err(EngineError::StructuralViolation(format!(
                "duplicate team {} in standings",
                record.team_id
            )));
        }
        if record.overall.games() != league.games_per_team {
            return Err(EngineError::StructuralViolation(format!(
                "team {} has played {} games, expected {}",
                record.team_id,
                record.overall.games(),
                league.games_per_team
            )));
        }
    }
    Ok(())
}

type TieResolver =
    fn(&[&TeamRecord], &HeadToHeadLedger, &mut SmallRng) -> TieResolution;

/// Rank one group of records: win percentage first, then the given cascade
/// for runs of exactly identical records.
fn rank_group(
    mut members: Vec<&TeamRecord>,
    ledger: &HeadToHeadLedger,
    rng: &mut SmallRng,
    resolve_tie: TieResolver,
) -> (Vec<TeamId>, Vec<TieResolution>) {
    // Percentage descending, then record key for a stable order between
    // distinct records that share a percentage.
    members.sort_by(|a, b| {
        b.win_pct()
            .partial_cmp(&a.win_pct())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.record_key().cmp(&a.record_key()))
    });

    let mut order = Vec::with_capacity(members.len());
    let mut trails = Vec::new();

    let mut i = 0;
    while i < members.len() {
        let mut j = i + 1;
        while j < members.len() && members[j].record_key() == members[i].record_key() {
            j += 1;
        }
        if j - i == 1 {
            order.push(members[i].team_id);
        } else {
            let resolution = resolve_tie(&members[i..j], ledger, rng);
            order.extend(&resolution.order);
            trails.push(resolution);
        }
        i = j;
    }

    (order, trails)
}
