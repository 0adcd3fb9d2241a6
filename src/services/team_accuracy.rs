use std::sync::Arc;

use log::{debug, error, info, warn};

use super::activity::{accuracy_message, ActivityPublisher, ACCURACY_ACTIVITY};
use super::{with_retries, BatchReport, EntityOutcome};
use crate::config::AggregationSettings;
use crate::domain::{AccuracySeries, EntityId, MatchFinished, Team, TeamRoster};
use crate::errors::{AggregationError, EntityFailure};
use crate::scoring::{match_accuracy, overall_accuracy, Points};
use crate::store::{self, Kind, Store, Versioned};

struct SeriesAppend {
    series_id: EntityId,
    /// Latest value of the series once the match is in it
    latest: f64,
    added: bool,
}

struct OverallRefresh {
    team: Team,
    previous: f64,
    saved: bool,
}

impl OverallRefresh {
    fn changed(&self) -> bool {
        self.team.accuracy != self.previous
    }
}

/// Records how well each team of a tournament predicted a finished match and
/// refreshes the team's overall accuracy
pub struct TeamAccuracyAggregator {
    store: Arc<dyn Store>,
    publisher: Arc<dyn ActivityPublisher>,
    settings: AggregationSettings,
}

impl TeamAccuracyAggregator {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn ActivityPublisher>,
        settings: AggregationSettings,
    ) -> Self {
        Self {
            store,
            publisher,
            settings,
        }
    }

    pub fn update_teams_accuracy(&self, event: &MatchFinished) -> Result<BatchReport, AggregationError> {
        self.run(event).into_result()
    }

    pub(crate) fn run(&self, event: &MatchFinished) -> BatchReport {
        info!("Updating accuracy of {} teams for match {}", event.teams.len(), event.match_id());

        let mut report = BatchReport::default();
        for roster in &event.teams {
            match self.update_team(event, roster) {
                Ok(outcome) => report.record(roster.team_id, outcome),
                Err(e) => {
                    error!("Unable to update accuracy of team {}: {}", roster.team_id, e);
                    report.failures.push(EntityFailure::new(Kind::Team, roster.team_id, &e));
                }
            }
        }

        info!(
            "  → teams: {} updated, {} without members, {} already scored, {} failed",
            report.updated.len(),
            report.skipped.len(),
            report.already_applied.len(),
            report.failures.len()
        );
        report
    }

    pub fn update_team(&self, event: &MatchFinished, roster: &TeamRoster) -> Result<EntityOutcome, AggregationError> {
        let team_id = roster.team_id;
        let member_points: Vec<Points> = roster
            .members
            .iter()
            .map(|&user_id| event.points_for(user_id).unwrap_or(0))
            .collect();

        let Some(ratio) = match_accuracy(&member_points) else {
            warn!("Team {} has no members, skipping", team_id);
            return Ok(EntityOutcome::Skipped);
        };
        debug!(
            "Team {} scored {:?} on match {}, ratio {:.4}",
            team_id,
            member_points,
            event.match_id(),
            ratio
        );

        let subject = format!("team {team_id}");
        let attempts = self.settings.max_write_attempts;

        let appended = with_retries(attempts, &subject, || self.append_to_series(event, team_id, ratio))?;

        // Also when the series already held the match: the team write of an
        // earlier run may be missing
        let refreshed = with_retries(attempts, &subject, || {
            self.refresh_overall(team_id, event.tournament_id, appended.series_id, appended.latest)
        })?;

        if refreshed.changed() {
            self.publish(&refreshed.team, appended.latest);
        }

        if appended.added {
            Ok(EntityOutcome::Updated)
        } else if refreshed.saved {
            info!("Repaired overall accuracy of team {} for match {}", team_id, event.match_id());
            Ok(EntityOutcome::Updated)
        } else {
            info!("Match {} already counted for team {}, skipping", event.match_id(), team_id);
            Ok(EntityOutcome::AlreadyApplied)
        }
    }

    /// Appends the match to the team's series unless it is already there
    fn append_to_series(
        &self,
        event: &MatchFinished,
        team_id: EntityId,
        ratio: f64,
    ) -> Result<SeriesAppend, AggregationError> {
        let team: Versioned<Team> = store::fetch(self.store.as_ref(), team_id)?;
        let mut series = self.locate_series(&team.value, event.tournament_id)?;

        if series.value.has_match(event.match_id()) {
            debug!("Accuracy series {} already holds match {}", series.value.id, event.match_id());
            return Ok(SeriesAppend {
                series_id: series.value.id,
                latest: series.value.accuracies.latest().unwrap_or(ratio),
                added: false,
            });
        }

        let latest = series.value.add(event.match_id(), ratio);
        store::save(self.store.as_ref(), &mut series)?;
        Ok(SeriesAppend {
            series_id: series.value.id,
            latest,
            added: true,
        })
    }

    /// Links the series to the team and stores the recomputed overall
    /// accuracy. Nothing is written when both were already in place.
    fn refresh_overall(
        &self,
        team_id: EntityId,
        tournament_id: EntityId,
        series_id: EntityId,
        latest: f64,
    ) -> Result<OverallRefresh, AggregationError> {
        let mut team: Versioned<Team> = store::fetch(self.store.as_ref(), team_id)?;
        let previous = team.value.accuracy;
        let linked = team.value.add_accuracy_ref(series_id, tournament_id);
        let accuracy = self.overall_accuracy_of(&team.value, tournament_id, latest)?;

        let saved = linked || accuracy != previous;
        if saved {
            team.value.accuracy = accuracy;
            store::save(self.store.as_ref(), &mut team)?;
            debug!("Team {} overall accuracy is now {:.4}", team_id, accuracy);
        }

        Ok(OverallRefresh {
            team: team.value,
            previous,
            saved,
        })
    }

    /// Mean of the latest value of every subscribed tournament's series, with
    /// `computed` standing in for the tournament being processed
    fn overall_accuracy_of(
        &self,
        team: &Team,
        tournament_id: EntityId,
        computed: f64,
    ) -> Result<f64, AggregationError> {
        let others: Vec<_> = team
            .tournament_accuracies
            .iter()
            .filter(|r| r.tournament_id != tournament_id && team.is_subscribed(r.tournament_id))
            .collect();
        let ids: Vec<EntityId> = others.iter().map(|r| r.accuracy_id).collect();
        let loaded = store::load_many::<AccuracySeries>(self.store.as_ref(), &ids)?;

        let mut latest = vec![Some(computed)];
        for (accuracy_ref, series) in others.iter().zip(loaded) {
            match series {
                Some(series) => latest.push(series.value.accuracies.latest()),
                None => warn!(
                    "Accuracy series {} of team {} not found, leaving tournament {} out",
                    accuracy_ref.accuracy_id, team.id, accuracy_ref.tournament_id
                ),
            }
        }

        Ok(overall_accuracy(latest).unwrap_or(computed))
    }

    fn locate_series(&self, team: &Team, tournament_id: EntityId) -> Result<Versioned<AccuracySeries>, AggregationError> {
        let store = self.store.as_ref();

        if let Some(accuracy_ref) = team.accuracy_ref(tournament_id) {
            return store::fetch(store, accuracy_ref.accuracy_id);
        }

        let orphan = store::find_by::<AccuracySeries>(store, "team_id", team.id)?
            .into_iter()
            .find(|series| series.value.tournament_id == tournament_id);
        if let Some(series) = orphan {
            info!("Reusing unreferenced accuracy series {} of team {}", series.value.id, team.id);
            return Ok(series);
        }

        let id = store.allocate_id(Kind::AccuracySeries)?;
        info!("Creating accuracy series {} for team {} in tournament {}", id, team.id, tournament_id);
        Ok(Versioned::new(AccuracySeries::new(id, team.id, tournament_id)))
    }

    /// Announces the tournament accuracy the team just reached
    fn publish(&self, team: &Team, tournament_accuracy: f64) {
        let message = accuracy_message(tournament_accuracy);
        if let Err(e) = self
            .publisher
            .publish_team_activity(team, ACCURACY_ACTIVITY, &message)
        {
            warn!("Unable to publish accuracy activity of team {}: {:#}", team.id, e);
        }
    }
}
