pub mod activity;
pub mod finalizer;
pub mod fixtures;
pub mod reporting;
pub mod team_accuracy;
pub mod user_scores;

use log::warn;

use crate::domain::EntityId;
use crate::errors::{AggregationError, EntityFailure};

pub use activity::{ActivityPublisher, LogPublisher, StoreActivityPublisher};
pub use finalizer::{load_match_finished, MatchFinalizer, MatchReport};
pub use fixtures::{import_fixture, load_fixture, Fixture, ImportSummary};
pub use reporting::{Leaderboard, ReportingService, SeriesOverview};
pub use team_accuracy::TeamAccuracyAggregator;
pub use user_scores::UserScoreAggregator;

/// What happened to one user or team during a fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOutcome {
    Updated,
    /// Nothing to record (no prediction, no members)
    Skipped,
    /// The match was already recorded for this entity
    AlreadyApplied,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub updated: Vec<EntityId>,
    pub skipped: Vec<EntityId>,
    pub already_applied: Vec<EntityId>,
    pub failures: Vec<EntityFailure>,
}

impl BatchReport {
    pub fn record(&mut self, id: EntityId, outcome: EntityOutcome) {
        match outcome {
            EntityOutcome::Updated => self.updated.push(id),
            EntityOutcome::Skipped => self.skipped.push(id),
            EntityOutcome::AlreadyApplied => self.already_applied.push(id),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.updated.len() + self.skipped.len() + self.already_applied.len()
    }

    pub fn into_result(self) -> Result<Self, AggregationError> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(AggregationError::PartialBatchFailure {
                succeeded: self.succeeded(),
                failures: self.failures,
            })
        }
    }
}

/// Reruns `op` while it fails on a version conflict, up to `attempts` times
pub(crate) fn with_retries<T>(
    attempts: usize,
    subject: &str,
    mut op: impl FnMut() -> Result<T, AggregationError>,
) -> Result<T, AggregationError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match op() {
            Err(e) if e.is_conflict() && attempt < attempts => {
                warn!("Concurrent write on {} (attempt {}/{}), retrying", subject, attempt, attempts);
                attempt += 1;
            }
            result => return result,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::Kind;

    #[test]
    fn test_with_retries_gives_up_after_attempts() {
        let mut calls = 0;
        let result: Result<(), AggregationError> = with_retries(3, "team 1", || {
            calls += 1;
            Err(StoreError::Conflict { kind: Kind::Team, id: 1 }.into())
        });

        assert!(result.is_err());
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_with_retries_does_not_retry_other_errors() {
        let mut calls = 0;
        let result: Result<(), AggregationError> = with_retries(3, "user 1", || {
            calls += 1;
            Err(AggregationError::not_found(Kind::User, 1))
        });

        assert!(matches!(result, Err(AggregationError::NotFound { .. })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_report_with_failures_becomes_partial_failure() {
        let mut report = BatchReport::default();
        report.record(1, EntityOutcome::Updated);
        report.record(2, EntityOutcome::Skipped);
        report.failures.push(EntityFailure {
            kind: Kind::User,
            id: 3,
            reason: "boom".to_string(),
        });

        match report.into_result() {
            Err(AggregationError::PartialBatchFailure { failures, succeeded }) => {
                assert_eq!(succeeded, 2);
                assert_eq!(failures.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
