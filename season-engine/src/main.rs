// Season resolution CLI.
//
// Two subcommands: `standings` resolves and prints division and wild-card
// ranks, `draft-order` computes the full draft order. Both are read-only by
// default; `draft-order --commit` is the single write path, persisting the
// order to the database.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use season_engine::config;
use season_engine::db::Database;
use season_engine::draft::DraftOrderCalculator;
use season_engine::records::HeadToHeadLedger;
use season_engine::standings::resolve_standings;
use season_engine::tiebreak::{entropy_rng, seeded_rng};

#[derive(Parser)]
#[command(name = "frontoffice")]
#[command(about = "Resolve standings and draft orders from the season event log", long_about = None)]
struct Cli {
    /// Database path; overrides the configured one.
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and print division and wild-card standings
    Standings {
        /// Dynasty identifier
        #[arg(long)]
        dynasty: String,

        /// Season number
        #[arg(long)]
        season: u16,

        /// Fixed seed for tie-breaking coin flips (reproducible output)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compute the draft order
    DraftOrder {
        /// Dynasty identifier
        #[arg(long)]
        dynasty: String,

        /// Season number
        #[arg(long)]
        season: u16,

        /// Persist the computed order (default is a dry run)
        #[arg(long, default_value = "false")]
        commit: bool,

        /// Fixed seed for tie-breaking coin flips (reproducible output)
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = config::load_config().context("failed to load configuration")?;
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());
    let db = Database::open(&db_path).context("failed to open database")?;
    info!(db = %db_path, "database opened");

    match cli.command {
        Commands::Standings {
            dynasty,
            season,
            seed,
        } => run_standings(&db, &config.league, &dynasty, season, seed),
        Commands::DraftOrder {
            dynasty,
            season,
            commit,
            seed,
        } => run_draft_order(&db, &config.league, &dynasty, season, commit, seed),
    }
}

fn run_standings(
    db: &Database,
    league: &config::LeagueConfig,
    dynasty: &str,
    season: u16,
    seed: Option<u64>,
) -> Result<()> {
    let records = db
        .load_team_records(dynasty, season, "regular")
        .context("failed to load team records")?;
    let games = db
        .load_regular_games(dynasty, season)
        .context("failed to load regular-season games")?;
    let mut ledger = HeadToHeadLedger::new();
    for game in &games {
        ledger.record_game(game.home_team, game.away_team, game.winner);
    }

    let mut rng = match seed {
        Some(seed) => seeded_rng(seed),
        None => entropy_rng(),
    };
    let view = resolve_standings(dynasty, season, &records, &ledger, league, &mut rng)
        .with_context(|| format!("failed to resolve standings for {dynasty} season {season}"))?;

    let record_of = |team: u32| {
        records
            .iter()
            .find(|r| r.team_id == team)
            .map(|r| r.overall.display())
            .unwrap_or_default()
    };

    for conference in 1..=league.conferences {
        println!("Conference {conference}");
        for division in 1..=league.divisions_per_conference {
            println!("  Division {division}");
            if let Some(ranks) = view.division_ranks.get(&(conference, division)) {
                for (i, &team) in ranks.iter().enumerate() {
                    println!("    {}. team {:<3} {}", i + 1, team, record_of(team));
                }
            }
        }
        println!("  Wild card");
        if let Some(ranks) = view.wildcard_ranks.get(&conference) {
            for (i, &team) in ranks.iter().enumerate() {
                let marker = if (i as u32) < league.wildcard_berths {
                    "*"
                } else {
                    " "
                };
                println!("   {marker}{}. team {:<3} {}", i + 1, team, record_of(team));
            }
        }
    }

    for trail in &view.tiebreak_trails {
        for outcome in &trail.trail {
            println!(
                "tiebreak: {} ({})",
                outcome.rule.name(),
                if outcome.decisive { "decisive" } else { "passed" }
            );
        }
    }

    Ok(())
}

fn run_draft_order(
    db: &Database,
    league: &config::LeagueConfig,
    dynasty: &str,
    season: u16,
    commit: bool,
    seed: Option<u64>,
) -> Result<()> {
    // A committed order is authoritative; re-running without --commit reads
    // it back instead of rolling new coin flips.
    if !commit && db.has_draft_order(dynasty, season)? {
        info!(dynasty, season, "printing previously committed order");
        let picks = db.load_draft_order(dynasty, season)?;
        print_picks(&picks);
        return Ok(());
    }

    let mut calculator = match seed {
        Some(seed) => DraftOrderCalculator::with_seed(db, league.clone(), seed),
        None => DraftOrderCalculator::new(db, league.clone()),
    };
    let result = calculator.get_draft_order(dynasty, season);

    for warning in &result.warnings {
        warn!("{warning}");
    }
    if !result.errors.is_empty() {
        for error in &result.errors {
            eprintln!("error: {error}");
        }
        anyhow::bail!("draft order resolution failed for {dynasty} season {season}");
    }

    print_picks(&result.picks);

    if commit {
        if !result.playoffs_complete {
            anyhow::bail!("refusing to commit a partial order; playoffs are not complete");
        }
        db.save_draft_order(dynasty, season, &result.picks)
            .context("failed to persist draft order")?;
        info!(
            dynasty,
            season,
            picks = result.picks.len(),
            seed = ?result.seed,
            "draft order committed"
        );
    } else {
        println!("(dry run; use --commit to persist)");
    }

    Ok(())
}

fn print_picks(picks: &[season_engine::draft::DraftPick]) {
    let mut current_round = 0;
    for pick in picks {
        if pick.round != current_round {
            current_round = pick.round;
            println!("Round {current_round}");
        }
        println!(
            "  {:>3}. team {:<3} {:<8} sos {:.3}  ({})",
            pick.overall,
            pick.team_id,
            pick.record,
            pick.strength_of_schedule,
            pick.reason.as_str()
        );
    }
}
