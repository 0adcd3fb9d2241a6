use std::sync::Arc;

use log::{debug, error, info};

use super::{with_retries, BatchReport, EntityOutcome};
use crate::config::AggregationSettings;
use crate::domain::{EntityId, MatchFinished, ScoreRecord, User};
use crate::errors::{AggregationError, EntityFailure};
use crate::scoring::Points;
use crate::store::{self, Kind, Store, Versioned};

/// Adds the points of a finished match to every participant
pub struct UserScoreAggregator {
    store: Arc<dyn Store>,
    settings: AggregationSettings,
}

impl UserScoreAggregator {
    pub fn new(store: Arc<dyn Store>, settings: AggregationSettings) -> Self {
        Self { store, settings }
    }

    /// Updates every participant, then reports a partial failure if any of
    /// them could not be updated. Writes already made are kept.
    pub fn update_users_score(&self, event: &MatchFinished) -> Result<BatchReport, AggregationError> {
        self.run(event).into_result()
    }

    pub(crate) fn run(&self, event: &MatchFinished) -> BatchReport {
        info!(
            "Updating scores of {} participants for match {}",
            event.participants.len(),
            event.match_id()
        );

        let mut report = BatchReport::default();
        for &user_id in &event.participants {
            match self.update_user(event, user_id) {
                Ok(outcome) => report.record(user_id, outcome),
                Err(e) => {
                    error!("Unable to update score of user {}: {}", user_id, e);
                    report.failures.push(EntityFailure::new(Kind::User, user_id, &e));
                }
            }
        }

        info!(
            "  → users: {} updated, {} without prediction, {} already scored, {} failed",
            report.updated.len(),
            report.skipped.len(),
            report.already_applied.len(),
            report.failures.len()
        );
        report
    }

    pub fn update_user(&self, event: &MatchFinished, user_id: EntityId) -> Result<EntityOutcome, AggregationError> {
        let Some(points) = event.points_for(user_id) else {
            info!("User {} made no prediction for match {}, skipping", user_id, event.match_id());
            return Ok(EntityOutcome::Skipped);
        };

        let subject = format!("user {user_id}");
        let attempts = self.settings.max_write_attempts;

        // The record is written first. The user then counts every record
        // entry it has not counted yet, so either step can be retried alone
        let record = with_retries(attempts, &subject, || self.append_to_record(event, user_id, points))?;
        let counted = with_retries(attempts, &subject, || self.add_to_user(user_id, &record))?;

        if !counted.contains(&event.match_id()) {
            info!("Match {} already scored for user {}, skipping", event.match_id(), user_id);
            return Ok(EntityOutcome::AlreadyApplied);
        }
        if counted.len() > 1 {
            info!("User {} caught up on earlier matches {:?}", user_id, counted);
        }

        debug!("User {} earned {} points on match {}", user_id, points, event.match_id());
        Ok(EntityOutcome::Updated)
    }

    /// Returns the record holding the match, appending it if missing
    fn append_to_record(
        &self,
        event: &MatchFinished,
        user_id: EntityId,
        points: Points,
    ) -> Result<ScoreRecord, AggregationError> {
        let user: Versioned<User> = store::fetch(self.store.as_ref(), user_id)?;
        let mut record = self.locate_record(&user.value, event.tournament_id)?;

        if record.value.has_match(event.match_id()) {
            debug!("Score record {} already holds match {}", record.value.id, event.match_id());
            return Ok(record.value);
        }

        record.value.add(event.match_id(), points);
        store::save(self.store.as_ref(), &mut record)?;
        Ok(record.value)
    }

    fn add_to_user(&self, user_id: EntityId, record: &ScoreRecord) -> Result<Vec<EntityId>, AggregationError> {
        let mut user: Versioned<User> = store::fetch(self.store.as_ref(), user_id)?;
        let counted = user.value.count_points(record);
        if !counted.is_empty() {
            store::save(self.store.as_ref(), &mut user)?;
        }
        Ok(counted)
    }

    /// Finds the user's record for the tournament, creating an empty one if
    /// none exists yet. An unreferenced record left by an interrupted run is
    /// picked up through a query before anything new is allocated.
    fn locate_record(&self, user: &User, tournament_id: EntityId) -> Result<Versioned<ScoreRecord>, AggregationError> {
        let store = self.store.as_ref();

        if let Some(score_ref) = user.score_ref(tournament_id) {
            return store::fetch(store, score_ref.score_id);
        }

        let orphan = store::find_by::<ScoreRecord>(store, "user_id", user.id)?
            .into_iter()
            .find(|record| record.value.tournament_id == tournament_id);
        if let Some(record) = orphan {
            info!("Reusing unreferenced score record {} of user {}", record.value.id, user.id);
            return Ok(record);
        }

        let id = store.allocate_id(Kind::ScoreRecord)?;
        info!("Creating score record {} for user {} in tournament {}", id, user.id, tournament_id);
        Ok(Versioned::new(ScoreRecord::new(id, user.id, tournament_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{finished_match, prediction, user, FailingStore};
    use crate::store::MemoryStore;

    fn aggregator(store: Arc<dyn Store>) -> UserScoreAggregator {
        UserScoreAggregator::new(store, AggregationSettings::default())
    }

    fn two_player_event() -> MatchFinished {
        MatchFinished::new(1, finished_match(10, 1, 2, 0))
            .with_participant(1, Some(prediction(1, 10, 2, 0)))
            .with_participant(2, Some(prediction(2, 10, 1, 0)))
    }

    fn record_of(store: &dyn Store, user_id: EntityId, tournament_id: EntityId) -> ScoreRecord {
        let user: Versioned<User> = store::fetch(store, user_id).unwrap();
        let score_ref = user.value.score_ref(tournament_id).unwrap();
        store::fetch::<ScoreRecord>(store, score_ref.score_id).unwrap().value
    }

    #[test]
    fn test_scores_each_participant() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(1), user(2)]).unwrap();

        let report = aggregator(store.clone()).update_users_score(&two_player_event()).unwrap();

        assert_eq!(report.updated, vec![1, 2]);
        let a: Versioned<User> = store::fetch(&*store, 1).unwrap();
        let b: Versioned<User> = store::fetch(&*store, 2).unwrap();
        assert_eq!(a.value.score, 3);
        assert_eq!(b.value.score, 1);
        assert_eq!(record_of(&*store, 1, 1).scores.values(), &[3.0]);
        assert_eq!(record_of(&*store, 2, 1).scores.values(), &[1.0]);
    }

    #[test]
    fn test_user_without_prediction_is_left_untouched() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(1), user(3)]).unwrap();
        let event = MatchFinished::new(1, finished_match(10, 1, 2, 0))
            .with_participant(1, Some(prediction(1, 10, 0, 0)))
            .with_participant(3, None);

        let report = aggregator(store.clone()).update_users_score(&event).unwrap();

        assert_eq!(report.skipped, vec![3]);
        let untouched: Versioned<User> = store::fetch(&*store, 3).unwrap();
        assert_eq!(untouched.version, 1);
        assert_eq!(untouched.value.score, 0);
        assert!(untouched.value.tournament_scores.is_empty());
        assert_eq!(store.len(Kind::ScoreRecord), 1);
    }

    #[test]
    fn test_second_match_appends_to_existing_record() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(1)]).unwrap();
        let aggregator = aggregator(store.clone());

        let first = MatchFinished::new(1, finished_match(10, 1, 1, 1))
            .with_participant(1, Some(prediction(1, 10, 1, 1)));
        let second = MatchFinished::new(1, finished_match(11, 1, 0, 2))
            .with_participant(1, Some(prediction(1, 11, 3, 0)));
        aggregator.update_users_score(&first).unwrap();
        aggregator.update_users_score(&second).unwrap();

        let record = record_of(&*store, 1, 1);
        assert_eq!(record.scores.values(), &[3.0, 1.5]);
        assert_eq!(record.match_ids, vec![10, 11]);
        assert_eq!(store.len(Kind::ScoreRecord), 1);

        let stored: Versioned<User> = store::fetch(&*store, 1).unwrap();
        assert_eq!(stored.value.score, 3);
    }

    #[test]
    fn test_records_are_kept_per_tournament() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(1)]).unwrap();
        let aggregator = aggregator(store.clone());

        let first = MatchFinished::new(1, finished_match(10, 1, 1, 0))
            .with_participant(1, Some(prediction(1, 10, 1, 0)));
        let other = MatchFinished::new(2, finished_match(20, 2, 1, 0))
            .with_participant(1, Some(prediction(1, 20, 2, 1)));
        aggregator.update_users_score(&first).unwrap();
        aggregator.update_users_score(&other).unwrap();

        let stored: Versioned<User> = store::fetch(&*store, 1).unwrap();
        assert_eq!(stored.value.score, 4);
        assert_eq!(stored.value.tournament_scores.len(), 2);
        assert_eq!(record_of(&*store, 1, 2).scores.values(), &[1.0]);
    }

    #[test]
    fn test_redelivered_match_is_not_counted_twice() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(1), user(2)]).unwrap();
        let aggregator = aggregator(store.clone());

        aggregator.update_users_score(&two_player_event()).unwrap();
        let report = aggregator.update_users_score(&two_player_event()).unwrap();

        assert_eq!(report.already_applied, vec![1, 2]);
        let a: Versioned<User> = store::fetch(&*store, 1).unwrap();
        assert_eq!(a.value.score, 3);
        assert_eq!(record_of(&*store, 1, 1).scores.len(), 1);
    }

    #[test]
    fn test_failure_of_one_user_does_not_stop_the_others() {
        let store = Arc::new(FailingStore::default());
        store::insert_all(&*store, &[user(1), user(2)]).unwrap();
        store.fail_writes_to(Kind::User, 1);

        let result = aggregator(store.clone()).update_users_score(&two_player_event());

        match result {
            Err(AggregationError::PartialBatchFailure { failures, succeeded }) => {
                assert_eq!(succeeded, 1);
                assert_eq!(failures.len(), 1);
                assert_eq!((failures[0].kind, failures[0].id), (Kind::User, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
        let b: Versioned<User> = store::fetch(&*store, 2).unwrap();
        assert_eq!(b.value.score, 1);
    }

    #[test]
    fn test_missing_user_is_reported_not_found() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(2)]).unwrap();

        let result = aggregator(store.clone()).update_users_score(&two_player_event());

        let failures = result.unwrap_err().failures().to_vec();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, 1);
        assert!(failures[0].reason.contains("not found"));
        assert_eq!(store.len(Kind::ScoreRecord), 1);
    }

    #[test]
    fn test_conflict_is_retried() {
        let store = Arc::new(FailingStore::default());
        store::insert_all(&*store, &[user(1), user(2)]).unwrap();
        store.conflict_once(Kind::User, 2);

        let report = aggregator(store.clone()).update_users_score(&two_player_event()).unwrap();

        assert_eq!(report.updated, vec![1, 2]);
        let b: Versioned<User> = store::fetch(&*store, 2).unwrap();
        assert_eq!(b.value.score, 1);
        assert_eq!(record_of(&*store, 2, 1).scores.len(), 1);
    }

    #[test]
    fn test_unreferenced_record_is_reused() {
        let store = Arc::new(MemoryStore::new());
        store::insert_all(&*store, &[user(1)]).unwrap();
        let mut orphan = ScoreRecord::new(5, 1, 1);
        orphan.add(9, 3);
        store::insert_all(&*store, &[orphan]).unwrap();

        let event = MatchFinished::new(1, finished_match(10, 1, 1, 0))
            .with_participant(1, Some(prediction(1, 10, 1, 0)));
        aggregator(store.clone()).update_users_score(&event).unwrap();

        assert_eq!(store.len(Kind::ScoreRecord), 1);
        let record = record_of(&*store, 1, 1);
        assert_eq!(record.id, 5);
        assert_eq!(record.scores.values(), &[3.0, 3.0]);
        let stored: Versioned<User> = store::fetch(&*store, 1).unwrap();
        assert_eq!(stored.value.score, 6);
    }

    #[test]
    fn test_points_survive_a_match_processed_before_the_retry() {
        let store = Arc::new(FailingStore::default());
        store::insert_all(&*store, &[user(1)]).unwrap();
        let aggregator = aggregator(store.clone());
        let exact = MatchFinished::new(1, finished_match(9, 1, 2, 1))
            .with_participant(1, Some(prediction(1, 9, 2, 1)));
        let trend = MatchFinished::new(1, finished_match(10, 1, 1, 0))
            .with_participant(1, Some(prediction(1, 10, 3, 0)));

        store.fail_writes_to(Kind::User, 1);
        let error = aggregator.update_users_score(&exact).unwrap_err();
        store.recover(Kind::User, 1);

        let report = aggregator.update_users_score(&trend).unwrap();
        assert_eq!(report.updated, vec![1]);
        let stored: Versioned<User> = store::fetch(&*store, 1).unwrap();
        assert_eq!(stored.value.score, 4);

        let retry = aggregator.update_users_score(&exact.restricted_to(error.failures())).unwrap();
        assert_eq!(retry.already_applied, vec![1]);
        let stored: Versioned<User> = store::fetch(&*store, 1).unwrap();
        assert_eq!(stored.value.score, 4);
        assert_eq!(record_of(&*store, 1, 1).match_ids, vec![9, 10]);
    }
}
