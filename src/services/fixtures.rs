use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;

use crate::domain::{Match, Prediction, Team, Tournament, User};
use crate::store::{self, Store};

/// Seed data for an empty document store
#[derive(Debug, Default, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub tournaments: Vec<Tournament>,
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub users: usize,
    pub teams: usize,
    pub tournaments: usize,
    pub matches: usize,
    pub predictions: usize,
}

pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture file {}", path.display()))?;
    serde_json::from_str(&content).context("Failed to parse fixture")
}

pub fn import_fixture(store: &dyn Store, fixture: &Fixture) -> Result<ImportSummary> {
    store::insert_all(store, &fixture.users).context("Failed to import users")?;
    store::insert_all(store, &fixture.teams).context("Failed to import teams")?;
    store::insert_all(store, &fixture.tournaments).context("Failed to import tournaments")?;
    store::insert_all(store, &fixture.matches).context("Failed to import matches")?;
    store::insert_all(store, &fixture.predictions).context("Failed to import predictions")?;

    let summary = ImportSummary {
        users: fixture.users.len(),
        teams: fixture.teams.len(),
        tournaments: fixture.tournaments.len(),
        matches: fixture.matches.len(),
        predictions: fixture.predictions.len(),
    };
    info!("Imported fixture: {:?}", summary);
    Ok(summary)
}
