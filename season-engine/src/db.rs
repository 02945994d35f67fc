// SQLite access to the shared event log and standings store.
//
// The event log (`games`) and standings store (`team_records`) are owned by
// the surrounding system (game simulator, persistence layer); the resolution
// path only reads them, always through a compound dynasty/season key. The
// engine's single write surface is `draft_orders`, reached exclusively
// through the explicit `save_draft_order` commit step.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::draft::pick::{DraftPick, PickReason};
use crate::records::{SplitRecord, TeamId, TeamRecord};

/// One row of the shared game event log.
#[derive(Debug, Clone)]
pub struct GameRow {
    pub dynasty_id: String,
    pub season: u16,
    /// `regular` or `playoff`.
    pub phase: String,
    /// Playoff round label exactly as the producer logged it; historical
    /// spellings vary and are normalized by the outcome extractor.
    pub round_label: Option<String>,
    /// Calendar date the game was played, informational only. Never used as
    /// a lookup key: the event log is shared across dynasties and seasons,
    /// and date-based queries are a known cross-dynasty leakage hazard.
    pub played_on: Option<String>,
    pub home_team: TeamId,
    pub away_team: TeamId,
    pub home_score: i32,
    pub away_score: i32,
    /// Declared winner; `None` for a tie (regular season) or an unfinished
    /// game (playoffs).
    pub winner: Option<TeamId>,
    /// Semi-structured JSON metadata; shape varies by producer version.
    pub meta: String,
}

/// SQLite-backed access to games, team records, and committed draft orders.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS games (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                dynasty_id  TEXT NOT NULL,
                season      INTEGER NOT NULL,
                phase       TEXT NOT NULL,
                round_label TEXT,
                played_on   TEXT,
                home_team   INTEGER NOT NULL,
                away_team   INTEGER NOT NULL,
                home_score  INTEGER NOT NULL,
                away_score  INTEGER NOT NULL,
                winner      INTEGER,
                meta        TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_games_scope
                ON games(dynasty_id, season, phase, round_label);

            CREATE TABLE IF NOT EXISTS team_records (
                dynasty_id           TEXT NOT NULL,
                season               INTEGER NOT NULL,
                season_type          TEXT NOT NULL,
                team_id              INTEGER NOT NULL,
                conference_id        INTEGER NOT NULL,
                division_id          INTEGER NOT NULL,
                wins                 INTEGER NOT NULL,
                losses               INTEGER NOT NULL,
                ties                 INTEGER NOT NULL,
                div_wins             INTEGER NOT NULL DEFAULT 0,
                div_losses           INTEGER NOT NULL DEFAULT 0,
                div_ties             INTEGER NOT NULL DEFAULT 0,
                conf_wins            INTEGER NOT NULL DEFAULT 0,
                conf_losses          INTEGER NOT NULL DEFAULT 0,
                conf_ties            INTEGER NOT NULL DEFAULT 0,
                home_wins            INTEGER NOT NULL DEFAULT 0,
                home_losses          INTEGER NOT NULL DEFAULT 0,
                home_ties            INTEGER NOT NULL DEFAULT 0,
                away_wins            INTEGER NOT NULL DEFAULT 0,
                away_losses          INTEGER NOT NULL DEFAULT 0,
                away_ties            INTEGER NOT NULL DEFAULT 0,
                points_for           INTEGER NOT NULL DEFAULT 0,
                points_against       INTEGER NOT NULL DEFAULT 0,
                div_point_diff       INTEGER NOT NULL DEFAULT 0,
                conf_point_diff      INTEGER NOT NULL DEFAULT 0,
                strength_of_victory  REAL NOT NULL DEFAULT 0,
                strength_of_schedule REAL,
                PRIMARY KEY (dynasty_id, season, season_type, team_id)
            );

            CREATE TABLE IF NOT EXISTS draft_orders (
                dynasty_id           TEXT NOT NULL,
                season               INTEGER NOT NULL,
                overall              INTEGER NOT NULL,
                round                INTEGER NOT NULL,
                pick_in_round        INTEGER NOT NULL,
                team_id              INTEGER NOT NULL,
                record               TEXT NOT NULL,
                reason               TEXT NOT NULL,
                strength_of_schedule REAL NOT NULL,
                computed_at          TEXT NOT NULL,
                PRIMARY KEY (dynasty_id, season, overall)
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Event log (write path belongs to the game simulator; exposed here
    // for seeding and tests)
    // ------------------------------------------------------------------

    /// Append one game row to the event log.
    pub fn insert_game(&self, game: &GameRow) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO games
                (dynasty_id, season, phase, round_label, played_on,
                 home_team, away_team, home_score, away_score, winner, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                game.dynasty_id,
                game.season,
                game.phase,
                game.round_label,
                game.played_on,
                game.home_team,
                game.away_team,
                game.home_score,
                game.away_score,
                game.winner,
                game.meta,
            ],
        )
        .context("failed to insert game")?;
        Ok(())
    }

    /// Load all regular-season games for one dynasty/season.
    pub fn load_regular_games(&self, dynasty_id: &str, season: u16) -> Result<Vec<GameRow>> {
        self.load_games_where(
            "dynasty_id = ?1 AND season = ?2 AND phase = 'regular'",
            params![dynasty_id, season],
        )
    }

    /// Load all playoff games for one dynasty/season. The compound
    /// dynasty/season key is mandatory: the log holds every dynasty's games,
    /// and two dynasties routinely play the same round on the same calendar
    /// date. Round classification is the outcome extractor's job; producers
    /// have spelled the labels too many ways for an exact-match query.
    pub fn load_playoff_games(&self, dynasty_id: &str, season: u16) -> Result<Vec<GameRow>> {
        self.load_games_where(
            "dynasty_id = ?1 AND season = ?2 AND phase = 'playoff'",
            params![dynasty_id, season],
        )
    }

    fn load_games_where(
        &self,
        predicate: &str,
        bind: impl rusqlite::Params,
    ) -> Result<Vec<GameRow>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT dynasty_id, season, phase, round_label, played_on,
                    home_team, away_team, home_score, away_score, winner, meta
             FROM games WHERE {predicate} ORDER BY id"
        );
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare games query")?;

        let rows = stmt
            .query_map(bind, |row| {
                Ok(GameRow {
                    dynasty_id: row.get(0)?,
                    season: row.get(1)?,
                    phase: row.get(2)?,
                    round_label: row.get(3)?,
                    played_on: row.get(4)?,
                    home_team: row.get(5)?,
                    away_team: row.get(6)?,
                    home_score: row.get(7)?,
                    away_score: row.get(8)?,
                    winner: row.get(9)?,
                    meta: row.get(10)?,
                })
            })
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;

        Ok(rows)
    }

    /// Opponent lists per team, derived from the regular-season schedule.
    /// Used to compute strength of schedule when the standings store has not
    /// materialized it.
    pub fn opponents_for(
        &self,
        dynasty_id: &str,
        season: u16,
    ) -> Result<HashMap<TeamId, Vec<TeamId>>> {
        let games = self.load_regular_games(dynasty_id, season)?;
        let mut opponents: HashMap<TeamId, Vec<TeamId>> = HashMap::new();
        for game in &games {
            opponents.entry(game.home_team).or_default().push(game.away_team);
            opponents.entry(game.away_team).or_default().push(game.home_team);
        }
        Ok(opponents)
    }

    // ------------------------------------------------------------------
    // Standings store (write path belongs to the persistence layer;
    // exposed here for seeding and tests)
    // ------------------------------------------------------------------

    /// Insert or replace one team's season record.
    pub fn upsert_team_record(
        &self,
        dynasty_id: &str,
        season: u16,
        season_type: &str,
        record: &TeamRecord,
    ) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT OR REPLACE INTO team_records
                (dynasty_id, season, season_type, team_id, conference_id, division_id,
                 wins, losses, ties,
                 div_wins, div_losses, div_ties,
                 conf_wins, conf_losses, conf_ties,
                 home_wins, home_losses, home_ties,
                 away_wins, away_losses, away_ties,
                 points_for, points_against, div_point_diff, conf_point_diff,
                 strength_of_victory, strength_of_schedule)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                     ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27)",
            params![
                dynasty_id,
                season,
                season_type,
                record.team_id,
                record.conference_id,
                record.division_id,
                record.overall.wins,
                record.overall.losses,
                record.overall.ties,
                record.division.wins,
                record.division.losses,
                record.division.ties,
                record.conference.wins,
                record.conference.losses,
                record.conference.ties,
                record.home.wins,
                record.home.losses,
                record.home.ties,
                record.away.wins,
                record.away.losses,
                record.away.ties,
                record.points_for,
                record.points_against,
                record.division_point_diff,
                record.conference_point_diff,
                record.strength_of_victory,
                record.strength_of_schedule,
            ],
        )
        .context("failed to upsert team record")?;
        Ok(())
    }

    /// Load every team record for one (dynasty, season, season_type) scope,
    /// ordered by team id. An empty result means the standings are not
    /// available; callers must treat that as an error, never as a league of
    /// all-zero records.
    pub fn load_team_records(
        &self,
        dynasty_id: &str,
        season: u16,
        season_type: &str,
    ) -> Result<Vec<TeamRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, conference_id, division_id,
                        wins, losses, ties,
                        div_wins, div_losses, div_ties,
                        conf_wins, conf_losses, conf_ties,
                        home_wins, home_losses, home_ties,
                        away_wins, away_losses, away_ties,
                        points_for, points_against, div_point_diff, conf_point_diff,
                        strength_of_victory, strength_of_schedule
                 FROM team_records
                 WHERE dynasty_id = ?1 AND season = ?2 AND season_type = ?3
                 ORDER BY team_id",
            )
            .context("failed to prepare team_records query")?;

        let records = stmt
            .query_map(params![dynasty_id, season, season_type], |row| {
                Ok(TeamRecord {
                    team_id: row.get(0)?,
                    conference_id: row.get(1)?,
                    division_id: row.get(2)?,
                    overall: SplitRecord::new(row.get(3)?, row.get(4)?, row.get(5)?),
                    division: SplitRecord::new(row.get(6)?, row.get(7)?, row.get(8)?),
                    conference: SplitRecord::new(row.get(9)?, row.get(10)?, row.get(11)?),
                    home: SplitRecord::new(row.get(12)?, row.get(13)?, row.get(14)?),
                    away: SplitRecord::new(row.get(15)?, row.get(16)?, row.get(17)?),
                    points_for: row.get(18)?,
                    points_against: row.get(19)?,
                    division_point_diff: row.get(20)?,
                    conference_point_diff: row.get(21)?,
                    strength_of_victory: row.get(22)?,
                    strength_of_schedule: row.get(23)?,
                })
            })
            .context("failed to query team records")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team record rows")?;

        Ok(records)
    }

    // ------------------------------------------------------------------
    // Draft order (the engine's only write surface)
    // ------------------------------------------------------------------

    /// Persist a computed draft order for `(dynasty, season)`, replacing any
    /// previously committed order, in a single transaction. This is the
    /// explicit commit step; dry-run callers simply never invoke it.
    pub fn save_draft_order(
        &self,
        dynasty_id: &str,
        season: u16,
        picks: &[DraftPick],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let computed_at = chrono::Utc::now().to_rfc3339();

        tx.execute(
            "DELETE FROM draft_orders WHERE dynasty_id = ?1 AND season = ?2",
            params![dynasty_id, season],
        )
        .context("failed to clear previous draft order")?;

        for pick in picks {
            tx.execute(
                "INSERT INTO draft_orders
                    (dynasty_id, season, overall, round, pick_in_round, team_id,
                     record, reason, strength_of_schedule, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    dynasty_id,
                    season,
                    pick.overall,
                    pick.round,
                    pick.pick_in_round,
                    pick.team_id,
                    pick.record,
                    pick.reason.as_str(),
                    pick.strength_of_schedule,
                    computed_at,
                ],
            )
            .context("failed to insert draft pick")?;
        }

        tx.commit().context("failed to commit draft order")?;
        Ok(())
    }

    /// Load a previously committed draft order, ordered by overall pick.
    /// Empty when no order has been committed for this scope.
    pub fn load_draft_order(&self, dynasty_id: &str, season: u16) -> Result<Vec<DraftPick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT overall, round, pick_in_round, team_id, record, reason,
                        strength_of_schedule
                 FROM draft_orders
                 WHERE dynasty_id = ?1 AND season = ?2
                 ORDER BY overall",
            )
            .context("failed to prepare draft_orders query")?;

        let picks = stmt
            .query_map(params![dynasty_id, season], |row| {
                let reason_str: String = row.get(5)?;
                Ok(DraftPick {
                    overall: row.get(0)?,
                    round: row.get(1)?,
                    pick_in_round: row.get(2)?,
                    team_id: row.get(3)?,
                    record: row.get(4)?,
                    reason: PickReason::from_str(&reason_str).unwrap_or(PickReason::NonPlayoff),
                    strength_of_schedule: row.get(6)?,
                })
            })
            .context("failed to query draft order")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft pick rows")?;

        Ok(picks)
    }

    /// Whether a draft order has been committed for this scope.
    pub fn has_draft_order(&self, dynasty_id: &str, season: u16) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM draft_orders WHERE dynasty_id = ?1 AND season = ?2)",
                params![dynasty_id, season],
                |row| row.get(0),
            )
            .context("failed to check draft_orders existence")?;
        Ok(exists)
    }
}
