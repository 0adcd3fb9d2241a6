use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::{Points, RunningAverageSeries, Scoreline};
use crate::store::{Entity, Kind};

pub type EntityId = i64;

/// Match with its final result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: EntityId,
    pub tournament_id: EntityId,
    pub result1: i64,
    pub result2: i64,
    #[serde(default)]
    pub finished: bool,
}

impl Match {
    pub fn scoreline(&self) -> Scoreline {
        Scoreline::new(self.result1, self.result2)
    }
}

/// A user's guessed result for a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: EntityId,
    pub user_id: EntityId,
    pub match_id: EntityId,
    pub result1: i64,
    pub result2: i64,
    pub created: DateTime<Utc>,
}

impl Prediction {
    pub fn scoreline(&self) -> Scoreline {
        Scoreline::new(self.result1, self.result2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentScoreRef {
    pub score_id: EntityId,
    pub tournament_id: EntityId,
    /// Matches of the record already added to the lifetime score
    #[serde(default)]
    pub counted_matches: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub username: String,
    #[serde(default)]
    pub name: String,
    /// Lifetime total over every tournament
    #[serde(default)]
    pub score: Points,
    #[serde(default)]
    pub tournament_scores: Vec<TournamentScoreRef>,
}

impl User {
    pub fn score_ref(&self, tournament_id: EntityId) -> Option<&TournamentScoreRef> {
        self.tournament_scores
            .iter()
            .find(|r| r.tournament_id == tournament_id)
    }

    /// Returns false when the tournament already had a record
    pub fn add_score_ref(&mut self, score_id: EntityId, tournament_id: EntityId) -> bool {
        if self.score_ref(tournament_id).is_some() {
            return false;
        }
        self.tournament_scores.push(TournamentScoreRef {
            score_id,
            tournament_id,
            counted_matches: Vec::new(),
        });
        true
    }

    /// Adds every entry of `record` not yet part of the lifetime score and
    /// returns the matches that were counted now
    pub fn count_points(&mut self, record: &ScoreRecord) -> Vec<EntityId> {
        self.add_score_ref(record.id, record.tournament_id);
        let Some(score_ref) = self
            .tournament_scores
            .iter_mut()
            .find(|r| r.tournament_id == record.tournament_id)
        else {
            return Vec::new();
        };

        let mut newly_counted = Vec::new();
        for (match_id, points) in record.entries() {
            if score_ref.counted_matches.contains(&match_id) {
                continue;
            }
            score_ref.counted_matches.push(match_id);
            self.score += points;
            newly_counted.push(match_id);
        }
        newly_counted
    }
}

/// Score contributions of one user in one tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: EntityId,
    pub user_id: EntityId,
    pub tournament_id: EntityId,
    #[serde(default)]
    pub scores: RunningAverageSeries,
    /// Match behind each value in `scores`, same order
    #[serde(default)]
    pub match_ids: Vec<EntityId>,
    /// Raw points of each match, same order
    #[serde(default)]
    pub points: Vec<Points>,
}

impl ScoreRecord {
    pub fn new(id: EntityId, user_id: EntityId, tournament_id: EntityId) -> Self {
        Self {
            id,
            user_id,
            tournament_id,
            scores: RunningAverageSeries::new(),
            match_ids: Vec::new(),
            points: Vec::new(),
        }
    }

    pub fn has_match(&self, match_id: EntityId) -> bool {
        self.match_ids.contains(&match_id)
    }

    /// `(match, points)` pairs in the order they were recorded
    pub fn entries(&self) -> impl Iterator<Item = (EntityId, Points)> + '_ {
        self.match_ids.iter().copied().zip(self.points.iter().copied())
    }

    pub fn add(&mut self, match_id: EntityId, points: Points) -> f64 {
        self.match_ids.push(match_id);
        self.points.push(points);
        self.scores.append(points as f64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentAccuracyRef {
    pub accuracy_id: EntityId,
    pub tournament_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<EntityId>,
    /// Tournaments the team is subscribed to
    #[serde(default)]
    pub tournament_ids: Vec<EntityId>,
    /// Overall accuracy across tournaments, in [0, 1]
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub tournament_accuracies: Vec<TournamentAccuracyRef>,
}

impl Team {
    pub fn accuracy_ref(&self, tournament_id: EntityId) -> Option<TournamentAccuracyRef> {
        self.tournament_accuracies
            .iter()
            .find(|r| r.tournament_id == tournament_id)
            .copied()
    }

    pub fn add_accuracy_ref(&mut self, accuracy_id: EntityId, tournament_id: EntityId) -> bool {
        if self.accuracy_ref(tournament_id).is_some() {
            return false;
        }
        self.tournament_accuracies.push(TournamentAccuracyRef {
            accuracy_id,
            tournament_id,
        });
        true
    }

    pub fn is_subscribed(&self, tournament_id: EntityId) -> bool {
        self.tournament_ids.contains(&tournament_id)
    }
}

/// Accuracy progression of one team in one tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySeries {
    pub id: EntityId,
    pub team_id: EntityId,
    pub tournament_id: EntityId,
    #[serde(default)]
    pub accuracies: RunningAverageSeries,
    #[serde(default)]
    pub match_ids: Vec<EntityId>,
}

impl AccuracySeries {
    pub fn new(id: EntityId, team_id: EntityId, tournament_id: EntityId) -> Self {
        Self {
            id,
            team_id,
            tournament_id,
            accuracies: RunningAverageSeries::new(),
            match_ids: Vec::new(),
        }
    }

    pub fn has_match(&self, match_id: EntityId) -> bool {
        self.match_ids.contains(&match_id)
    }

    pub fn add(&mut self, match_id: EntityId, ratio: f64) -> f64 {
        self.match_ids.push(match_id);
        self.accuracies.append(ratio)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub participant_ids: Vec<EntityId>,
    #[serde(default)]
    pub team_ids: Vec<EntityId>,
    #[serde(default)]
    pub match_ids: Vec<EntityId>,
}

/// Feed entry published on behalf of a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: EntityId,
    pub activity_type: String,
    pub verb: String,
    pub actor_id: EntityId,
    pub actor_name: String,
    pub published: DateTime<Utc>,
}

macro_rules! impl_entity {
    ($($ty:ty => $kind:expr),+ $(,)?) => {
        $(
            impl Entity for $ty {
                const KIND: Kind = $kind;

                fn id(&self) -> EntityId {
                    self.id
                }
            }
        )+
    };
}

impl_entity! {
    Match => Kind::Match,
    Prediction => Kind::Prediction,
    User => Kind::User,
    ScoreRecord => Kind::ScoreRecord,
    Team => Kind::Team,
    AccuracySeries => Kind::AccuracySeries,
    Tournament => Kind::Tournament,
    Activity => Kind::Activity,
}
