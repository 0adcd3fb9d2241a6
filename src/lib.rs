pub mod cli;
pub mod config;
pub mod database;
pub mod domain;
pub mod errors;
pub mod scoring;
pub mod services;
pub mod store;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use cli::Cli;
use colored::Colorize;

use crate::cli::Command;
use crate::config::settings::AppConfig;
use crate::database::SqliteStore;
use crate::domain::EntityId;
use crate::services::{
    fixtures, ActivityPublisher, BatchReport, LogPublisher, MatchFinalizer, ReportingService, SeriesOverview,
    StoreActivityPublisher,
};
use crate::store::Store;

pub fn interpret() -> Command {
    let cli = Cli::parse();
    cli.command
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn Store>> {
    let store = SqliteStore::open(&config.database.path)
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    Ok(Arc::new(store))
}

pub fn handle_init() -> Result<()> {
    let config = AppConfig::new();
    let store = SqliteStore::open(&config.database.path)?;
    store.reset()?;
    println!("{} {}", "Initialized".green(), config.database.path);
    Ok(())
}

pub fn handle_import(file: &Path) -> Result<()> {
    let config = AppConfig::new();
    let store = open_store(&config)?;
    let fixture = fixtures::load_fixture(file)?;
    let summary = fixtures::import_fixture(store.as_ref(), &fixture)?;
    println!(
        "{} {} users, {} teams, {} tournaments, {} matches, {} predictions",
        "Imported".green(),
        summary.users,
        summary.teams,
        summary.tournaments,
        summary.matches,
        summary.predictions
    );
    Ok(())
}

pub fn handle_finish(tournament_id: EntityId, match_id: EntityId, log_activities: bool) -> Result<()> {
    let config = AppConfig::new();
    let store = open_store(&config)?;
    let publisher: Arc<dyn ActivityPublisher> = if log_activities {
        Arc::new(LogPublisher)
    } else {
        Arc::new(StoreActivityPublisher::new(store.clone()))
    };
    let finalizer = MatchFinalizer::new(store, publisher, config.aggregation);

    let report = finalizer
        .finalize(tournament_id, match_id)
        .with_context(|| format!("Failed to finalize match {match_id} of tournament {tournament_id}"))?;

    print_batch("Users", &report.users);
    print_batch("Teams", &report.teams);
    Ok(())
}

pub fn handle_scores(user_id: EntityId, limit: Option<usize>) -> Result<()> {
    let config = AppConfig::new();
    let reporting = ReportingService::new(open_store(&config)?, config.reporting);
    let overviews = reporting.tournament_scores(user_id, limit)?;

    let title = format!("Scores of user {user_id}");
    println!("{}", title.as_str().bold());
    print_overviews(&overviews);
    Ok(())
}

pub fn handle_accuracy(team_id: EntityId, tournament_id: Option<EntityId>, limit: Option<usize>) -> Result<()> {
    let config = AppConfig::new();
    let reporting = ReportingService::new(open_store(&config)?, config.reporting);
    let overviews = match tournament_id {
        Some(tournament_id) => reporting
            .tournament_accuracy(team_id, tournament_id)?
            .into_iter()
            .collect(),
        None => reporting.tournament_accuracies(team_id, limit)?,
    };

    let title = format!("Accuracy of team {team_id}");
    println!("{}", title.as_str().bold());
    print_overviews(&overviews);
    Ok(())
}

pub fn handle_leaderboard(tournament_id: EntityId, limit: Option<usize>) -> Result<()> {
    let config = AppConfig::new();
    let reporting = ReportingService::new(open_store(&config)?, config.reporting);
    let board = reporting.leaderboard(tournament_id, limit)?;

    let title = format!("Tournament {tournament_id}");
    println!("{}", title.as_str().bold());
    println!("{}", "Users".cyan());
    for (rank, user) in board.users.iter().enumerate() {
        println!("{:>3}. {:<20} {:>5}", rank + 1, user.username, user.score);
    }
    println!("{}", "Teams".cyan());
    for (rank, team) in board.teams.iter().enumerate() {
        println!("{:>3}. {:<20} {:>6.2}%", rank + 1, team.name, team.accuracy * 100.0);
    }
    Ok(())
}

pub fn handle_completions(shell: Shell) -> Result<()> {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, &mut io::stdout());
    Ok(())
}

fn print_batch(label: &str, report: &BatchReport) {
    let updated = report.updated.len().to_string();
    println!(
        "{}: {} updated, {} skipped, {} already applied",
        label.bold(),
        updated.as_str().green(),
        report.skipped.len(),
        report.already_applied.len()
    );
}

fn print_overviews(overviews: &[SeriesOverview]) {
    if overviews.is_empty() {
        println!("{}", "no data".yellow());
    }
    for overview in overviews {
        let latest = overview
            .latest
            .map_or_else(|| "-".to_string(), |value| format!("{value:.3}"));
        let progression: Vec<String> = overview
            .progression
            .iter()
            .map(|value| format!("{value:.3}"))
            .collect();
        println!(
            "  tournament {:<6} latest {:<8} [{}]",
            overview.tournament_id,
            latest.as_str().green(),
            progression.join(", ")
        );
    }
}
