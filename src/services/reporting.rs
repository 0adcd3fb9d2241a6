use std::cmp::Ordering;
use std::sync::Arc;

use log::error;
use serde::Serialize;

use crate::config::ReportingSettings;
use crate::domain::{AccuracySeries, EntityId, ScoreRecord, Team, Tournament, User};
use crate::errors::AggregationError;
use crate::scoring::RunningAverageSeries;
use crate::store::{self, Store};

/// Latest value of one tournament series and its recent history, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOverview {
    pub id: EntityId,
    pub tournament_id: EntityId,
    pub latest: Option<f64>,
    pub progression: Vec<f64>,
}

impl SeriesOverview {
    fn new(id: EntityId, tournament_id: EntityId, series: &RunningAverageSeries, limit: Option<usize>) -> Self {
        Self {
            id,
            tournament_id,
            latest: series.latest(),
            progression: series.progression(limit),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leaderboard {
    pub tournament_id: EntityId,
    pub users: Vec<User>,
    pub teams: Vec<Team>,
}

/// Read side over the aggregates, for leaderboards and progress views
pub struct ReportingService {
    store: Arc<dyn Store>,
    settings: ReportingSettings,
}

impl ReportingService {
    pub fn new(store: Arc<dyn Store>, settings: ReportingSettings) -> Self {
        Self { store, settings }
    }

    pub fn tournament_scores(&self, user_id: EntityId, limit: Option<usize>) -> Result<Vec<SeriesOverview>, AggregationError> {
        let store = self.store.as_ref();
        let user = store::fetch::<User>(store, user_id)?.value;
        let limit = limit.unwrap_or(self.settings.progression_limit);

        let ids: Vec<EntityId> = user.tournament_scores.iter().map(|r| r.score_id).collect();
        let records = store::load_many::<ScoreRecord>(store, &ids)?;

        Ok(ids
            .iter()
            .zip(records)
            .filter_map(|(id, record)| match record {
                Some(record) => Some(SeriesOverview::new(
                    record.value.id,
                    record.value.tournament_id,
                    &record.value.scores,
                    Some(limit),
                )),
                None => {
                    error!("Score record {} of user {} not found", id, user_id);
                    None
                }
            })
            .collect())
    }

    pub fn tournament_accuracies(&self, team_id: EntityId, limit: Option<usize>) -> Result<Vec<SeriesOverview>, AggregationError> {
        let store = self.store.as_ref();
        let team = store::fetch::<Team>(store, team_id)?.value;
        let limit = limit.unwrap_or(self.settings.progression_limit);

        let ids: Vec<EntityId> = team.tournament_accuracies.iter().map(|r| r.accuracy_id).collect();
        let series = store::load_many::<AccuracySeries>(store, &ids)?;

        Ok(ids
            .iter()
            .zip(series)
            .filter_map(|(id, series)| match series {
                Some(series) => Some(SeriesOverview::new(
                    series.value.id,
                    series.value.tournament_id,
                    &series.value.accuracies,
                    Some(limit),
                )),
                None => {
                    error!("Accuracy series {} of team {} not found", id, team_id);
                    None
                }
            })
            .collect())
    }

    /// Full progression of a team in one tournament, `None` if it has no series there
    pub fn tournament_accuracy(&self, team_id: EntityId, tournament_id: EntityId) -> Result<Option<SeriesOverview>, AggregationError> {
        let store = self.store.as_ref();
        let team = store::fetch::<Team>(store, team_id)?.value;

        let Some(accuracy_ref) = team.accuracy_ref(tournament_id) else {
            return Ok(None);
        };
        let series = store::fetch::<AccuracySeries>(store, accuracy_ref.accuracy_id)?.value;

        Ok(Some(SeriesOverview::new(series.id, tournament_id, &series.accuracies, None)))
    }

    pub fn leaderboard(&self, tournament_id: EntityId, limit: Option<usize>) -> Result<Leaderboard, AggregationError> {
        let store = self.store.as_ref();
        let tournament = store::fetch::<Tournament>(store, tournament_id)?.value;
        let limit = limit.unwrap_or(self.settings.leaderboard_size);

        let users = store::load_many::<User>(store, &tournament.participant_ids)?
            .into_iter()
            .flatten()
            .map(|u| u.value)
            .collect();
        let teams = store::load_many::<Team>(store, &tournament.team_ids)?
            .into_iter()
            .flatten()
            .map(|t| t.value)
            .collect();

        Ok(Leaderboard {
            tournament_id,
            users: rank_users_by_score(users, limit),
            teams: rank_teams_by_accuracy(teams, limit),
        })
    }
}

/// Highest lifetime score first, ties by id
pub fn rank_users_by_score(mut users: Vec<User>, limit: usize) -> Vec<User> {
    users.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
    users.truncate(limit);
    users
}

/// Highest overall accuracy first, ties by id
pub fn rank_teams_by_accuracy(mut teams: Vec<Team>, limit: usize) -> Vec<Team> {
    teams.sort_by(|a, b| {
        b.accuracy
            .partial_cmp(&a.accuracy)
            .unwrap_or(Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });
    teams.truncate(limit);
    teams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{team, user};
    use crate::store::MemoryStore;

    fn reporting(store: Arc<dyn Store>) -> ReportingService {
        ReportingService::new(store, ReportingSettings::default())
    }

    #[test]
    fn test_accuracy_overview_caps_progression() {
        let store = Arc::new(MemoryStore::new());
        let mut subscribed = team(1, vec![1], vec![1, 2]);
        subscribed.add_accuracy_ref(10, 1);
        subscribed.add_accuracy_ref(11, 2);
        let mut long = AccuracySeries::new(10, 1, 1);
        for (i, ratio) in [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7].into_iter().enumerate() {
            long.add(i as EntityId, ratio);
        }
        store::insert_all(&*store, &[subscribed]).unwrap();
        store::insert_all(&*store, &[long.clone(), AccuracySeries::new(11, 1, 2)]).unwrap();

        let overviews = reporting(store.clone()).tournament_accuracies(1, None).unwrap();

        assert_eq!(overviews.len(), 2);
        assert_eq!(overviews[0].latest, long.accuracies.latest());
        assert_eq!(overviews[0].progression.len(), 5);
        assert_eq!(overviews[0].progression[0], long.accuracies.values()[6]);
        assert_eq!(overviews[1].latest, None);
        assert!(overviews[1].progression.is_empty());

        let full = reporting(store).tournament_accuracy(1, 1).unwrap().unwrap();
        assert_eq!(full.progression.len(), 7);
    }

    #[test]
    fn test_score_overview_skips_missing_records() {
        let store = Arc::new(MemoryStore::new());
        let mut player = user(1);
        player.add_score_ref(20, 1);
        player.add_score_ref(21, 2);
        let mut record = ScoreRecord::new(20, 1, 1);
        record.add(5, 3);
        record.add(6, 1);
        store::insert_all(&*store, &[player]).unwrap();
        store::insert_all(&*store, &[record]).unwrap();

        let overviews = reporting(store).tournament_scores(1, Some(1)).unwrap();

        assert_eq!(overviews.len(), 1);
        assert_eq!(overviews[0].latest, Some(2.0));
        assert_eq!(overviews[0].progression, vec![2.0]);
    }

    #[test]
    fn test_rankings_order_and_limit() {
        let mut users: Vec<User> = (1..=4).map(user).collect();
        users[0].score = 5;
        users[1].score = 9;
        users[2].score = 5;
        users[3].score = 1;
        let ranked: Vec<EntityId> = rank_users_by_score(users, 3).iter().map(|u| u.id).collect();
        assert_eq!(ranked, vec![2, 1, 3]);

        let mut teams: Vec<Team> = (1..=3).map(|id| team(id, vec![], vec![])).collect();
        teams[0].accuracy = 0.2;
        teams[1].accuracy = 0.9;
        teams[2].accuracy = 0.5;
        let ranked: Vec<EntityId> = rank_teams_by_accuracy(teams, 10).iter().map(|t| t.id).collect();
        assert_eq!(ranked, vec![2, 3, 1]);
    }

    #[test]
    fn test_leaderboard_for_tournament() {
        let store = Arc::new(MemoryStore::new());
        let mut leader = user(2);
        leader.score = 7;
        store::insert_all(&*store, &[user(1), leader]).unwrap();
        store::insert_all(&*store, &[team(1, vec![1, 2], vec![1])]).unwrap();
        store::insert_all(
            &*store,
            &[Tournament {
                id: 1,
                name: "world cup".to_string(),
                participant_ids: vec![1, 2],
                team_ids: vec![1],
                match_ids: Vec::new(),
            }],
        )
        .unwrap();

        let board = reporting(store).leaderboard(1, None).unwrap();

        assert_eq!(board.users.iter().map(|u| u.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(board.teams.len(), 1);
    }
}
