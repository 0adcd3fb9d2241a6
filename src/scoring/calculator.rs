use serde::{Deserialize, Serialize};

pub type Points = i64;

/// A pair of result components, either a final result or a guessed one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scoreline {
    pub result1: i64,
    pub result2: i64,
}

impl Scoreline {
    pub fn new(result1: i64, result2: i64) -> Self {
        Self { result1, result2 }
    }

    pub fn trend(&self) -> Trend {
        Trend::of(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    FirstSideWins,
    SecondSideWins,
    Tie,
}

impl Trend {
    pub fn of(scoreline: &Scoreline) -> Self {
        use std::cmp::Ordering;

        match scoreline.result1.cmp(&scoreline.result2) {
            Ordering::Greater => Trend::FirstSideWins,
            Ordering::Less => Trend::SecondSideWins,
            Ordering::Equal => Trend::Tie,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Exact, // both components guessed
    Trend, // right winner (or tie), wrong score
    Miss,
}

impl Outcome {
    pub fn classify(actual: &Scoreline, predicted: &Scoreline) -> Self {
        if actual == predicted {
            Outcome::Exact
        } else if actual.trend() == predicted.trend() {
            Outcome::Trend
        } else {
            Outcome::Miss
        }
    }

    pub fn points(&self) -> Points {
        match self {
            Outcome::Exact => 3,
            Outcome::Trend => 1,
            Outcome::Miss => 0,
        }
    }
}

/// Points awarded to a prediction once the match result is known.
/// Total over every pair of integers: the result is always 0, 1 or 3.
pub fn compute_score(actual: &Scoreline, predicted: &Scoreline) -> Points {
    Outcome::classify(actual, predicted).points()
}
