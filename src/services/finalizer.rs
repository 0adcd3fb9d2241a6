use std::collections::HashMap;
use std::sync::Arc;

use log::{error, info};

use super::activity::ActivityPublisher;
use super::team_accuracy::TeamAccuracyAggregator;
use super::user_scores::UserScoreAggregator;
use super::BatchReport;
use crate::config::AggregationSettings;
use crate::domain::{EntityId, Match, MatchFinished, Prediction, Team, TeamRoster, Tournament};
use crate::errors::AggregationError;
use crate::store::{self, Kind, Store};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub users: BatchReport,
    pub teams: BatchReport,
}

/// Entry point for the "match finished" event: scores every participant,
/// then updates every team of the tournament
pub struct MatchFinalizer {
    store: Arc<dyn Store>,
    users: UserScoreAggregator,
    teams: TeamAccuracyAggregator,
}

impl MatchFinalizer {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn ActivityPublisher>,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            users: UserScoreAggregator::new(store.clone(), settings.clone()),
            teams: TeamAccuracyAggregator::new(store.clone(), publisher, settings),
            store,
        }
    }

    /// Loads the event for `match_id` from the store and processes it
    pub fn finalize(&self, tournament_id: EntityId, match_id: EntityId) -> Result<MatchReport, AggregationError> {
        let event = load_match_finished(self.store.as_ref(), tournament_id, match_id)?;
        self.on_match_finished(&event)
    }

    /// Runs both fan-outs to completion. If any user or team failed, the
    /// failures of both are returned together; successful writes stay.
    pub fn on_match_finished(&self, event: &MatchFinished) -> Result<MatchReport, AggregationError> {
        event.validate()?;

        info!(
            "=== Match {} of tournament {} finished ({}-{}) ===",
            event.match_id(),
            event.tournament_id,
            event.finished_match.result1,
            event.finished_match.result2
        );

        let report = MatchReport {
            users: self.users.run(event),
            teams: self.teams.run(event),
        };

        let failed = report.users.failures.len() + report.teams.failures.len();
        if failed == 0 {
            info!("=== Match {} processed ===", event.match_id());
            return Ok(report);
        }

        error!("Match {} processed with {} failed updates", event.match_id(), failed);
        Err(AggregationError::PartialBatchFailure {
            succeeded: report.users.succeeded() + report.teams.succeeded(),
            failures: report
                .users
                .failures
                .into_iter()
                .chain(report.teams.failures)
                .collect(),
        })
    }
}

/// Snapshots everything a finished match needs from the store: the result,
/// the tournament's participants and teams, and every prediction made for it
pub fn load_match_finished(
    store: &dyn Store,
    tournament_id: EntityId,
    match_id: EntityId,
) -> Result<MatchFinished, AggregationError> {
    let tournament = store::fetch::<Tournament>(store, tournament_id)?.value;
    let finished_match = store::fetch::<Match>(store, match_id)?.value;
    let predictions = latest_predictions(store, match_id)?;
    let teams = load_rosters(store, &tournament.team_ids)?;

    info!(
        "Loaded match {}: {} participants, {} predictions, {} teams",
        match_id,
        tournament.participant_ids.len(),
        predictions.len(),
        teams.len()
    );

    Ok(MatchFinished {
        tournament_id,
        finished_match,
        participants: tournament.participant_ids,
        predictions,
        teams,
    })
}

/// One prediction per user; the most recently created wins
fn latest_predictions(store: &dyn Store, match_id: EntityId) -> Result<HashMap<EntityId, Prediction>, AggregationError> {
    let mut predictions: HashMap<EntityId, Prediction> = HashMap::new();

    for found in store::find_by::<Prediction>(store, "match_id", match_id)? {
        let prediction = found.value;
        let newer = predictions
            .get(&prediction.user_id)
            .is_none_or(|existing| prediction.created > existing.created);
        if newer {
            predictions.insert(prediction.user_id, prediction);
        }
    }

    Ok(predictions)
}

fn load_rosters(store: &dyn Store, team_ids: &[EntityId]) -> Result<Vec<TeamRoster>, AggregationError> {
    let teams = store::load_many::<Team>(store, team_ids)?;

    team_ids
        .iter()
        .zip(teams)
        .map(|(&team_id, team)| {
            let team = team.ok_or_else(|| AggregationError::not_found(Kind::Team, team_id))?;
            Ok(TeamRoster {
                team_id,
                members: team.value.member_ids,
            })
        })
        .collect()
}
