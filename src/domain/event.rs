use std::collections::HashMap;

use super::models::{EntityId, Match, Prediction};
use crate::errors::{AggregationError, EntityFailure};
use crate::scoring::{compute_score, Points};
use crate::store::Kind;

/// Team membership as it was when the match was finalized
#[derive(Debug, Clone, PartialEq)]
pub struct TeamRoster {
    pub team_id: EntityId,
    pub members: Vec<EntityId>,
}

/// Everything the aggregators need about one finished match.
///
/// Participants, predictions and rosters are a snapshot taken by the caller;
/// aggregation never re-reads membership while it runs.
#[derive(Debug, Clone)]
pub struct MatchFinished {
    pub tournament_id: EntityId,
    pub finished_match: Match,
    pub participants: Vec<EntityId>,
    pub predictions: HashMap<EntityId, Prediction>,
    pub teams: Vec<TeamRoster>,
}

impl MatchFinished {
    pub fn new(tournament_id: EntityId, finished_match: Match) -> Self {
        Self {
            tournament_id,
            finished_match,
            participants: Vec::new(),
            predictions: HashMap::new(),
            teams: Vec::new(),
        }
    }

    pub fn with_participant(mut self, user_id: EntityId, prediction: Option<Prediction>) -> Self {
        self.participants.push(user_id);
        if let Some(prediction) = prediction {
            self.predictions.insert(user_id, prediction);
        }
        self
    }

    pub fn with_prediction(mut self, prediction: Prediction) -> Self {
        self.predictions.insert(prediction.user_id, prediction);
        self
    }

    pub fn with_team(mut self, team_id: EntityId, members: Vec<EntityId>) -> Self {
        self.teams.push(TeamRoster { team_id, members });
        self
    }

    pub fn match_id(&self) -> EntityId {
        self.finished_match.id
    }

    pub fn prediction_for(&self, user_id: EntityId) -> Option<&Prediction> {
        self.predictions.get(&user_id)
    }

    /// `None` when the user made no prediction for this match
    pub fn points_for(&self, user_id: EntityId) -> Option<Points> {
        self.prediction_for(user_id).map(|prediction| {
            compute_score(&self.finished_match.scoreline(), &prediction.scoreline())
        })
    }

    pub fn validate(&self) -> Result<(), AggregationError> {
        if !self.finished_match.finished {
            return Err(AggregationError::InvalidEvent(format!(
                "match {} is not finished",
                self.match_id()
            )));
        }
        if self.finished_match.tournament_id != self.tournament_id {
            return Err(AggregationError::InvalidEvent(format!(
                "match {} does not belong to tournament {}",
                self.match_id(),
                self.tournament_id
            )));
        }
        if let Some(stray) = self
            .predictions
            .values()
            .find(|p| p.match_id != self.match_id())
        {
            return Err(AggregationError::InvalidEvent(format!(
                "prediction {} targets match {} instead of {}",
                stray.id,
                stray.match_id,
                self.match_id()
            )));
        }
        Ok(())
    }

    /// Same event narrowed to the users and teams that failed, for a retry
    pub fn restricted_to(&self, failures: &[EntityFailure]) -> Self {
        let failed = |kind: Kind, id: EntityId| failures.iter().any(|f| f.kind == kind && f.id == id);

        Self {
            tournament_id: self.tournament_id,
            finished_match: self.finished_match.clone(),
            participants: self
                .participants
                .iter()
                .copied()
                .filter(|&id| failed(Kind::User, id))
                .collect(),
            predictions: self.predictions.clone(),
            teams: self
                .teams
                .iter()
                .filter(|roster| failed(Kind::Team, roster.team_id))
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn finished(result1: i64, result2: i64) -> Match {
        Match {
            id: 9,
            tournament_id: 1,
            result1,
            result2,
            finished: true,
        }
    }

    fn prediction(user_id: EntityId, result1: i64, result2: i64) -> Prediction {
        Prediction {
            id: 100 + user_id,
            user_id,
            match_id: 9,
            result1,
            result2,
            created: Utc::now(),
        }
    }

    #[test]
    fn test_points_for_participants() {
        let event = MatchFinished::new(1, finished(2, 0))
            .with_participant(1, Some(prediction(1, 2, 0)))
            .with_participant(2, Some(prediction(2, 1, 0)))
            .with_participant(3, None);

        assert_eq!(event.points_for(1), Some(3));
        assert_eq!(event.points_for(2), Some(1));
        assert_eq!(event.points_for(3), None);
    }

    #[test]
    fn test_validate_rejects_unfinished_match() {
        let mut game = finished(1, 1);
        game.finished = false;
        let event = MatchFinished::new(1, game);

        assert!(matches!(event.validate(), Err(AggregationError::InvalidEvent(_))));
    }

    #[test]
    fn test_validate_rejects_foreign_tournament_and_stray_prediction() {
        let event = MatchFinished::new(2, finished(1, 1));
        assert!(event.validate().is_err());

        let mut stray = prediction(1, 0, 0);
        stray.match_id = 10;
        let event = MatchFinished::new(1, finished(1, 1)).with_prediction(stray);
        assert!(event.validate().is_err());

        let event = MatchFinished::new(1, finished(1, 1)).with_participant(1, Some(prediction(1, 0, 0)));
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_restricted_to_keeps_only_failed_identities() {
        let event = MatchFinished::new(1, finished(1, 0))
            .with_participant(1, Some(prediction(1, 1, 0)))
            .with_participant(2, Some(prediction(2, 1, 0)))
            .with_team(5, vec![1, 2])
            .with_team(6, vec![2]);
        let failures = vec![
            EntityFailure {
                kind: Kind::User,
                id: 2,
                reason: "conflict".to_string(),
            },
            EntityFailure {
                kind: Kind::Team,
                id: 6,
                reason: "conflict".to_string(),
            },
        ];

        let retry = event.restricted_to(&failures);

        assert_eq!(retry.participants, vec![2]);
        assert_eq!(retry.teams.len(), 1);
        assert_eq!(retry.teams[0].team_id, 6);
        // teams still score every member
        assert_eq!(retry.points_for(1), Some(3));
    }
}
