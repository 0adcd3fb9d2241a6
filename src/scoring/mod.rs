pub mod accuracy;
pub mod calculator;
pub mod series;

pub use accuracy::{match_accuracy, overall_accuracy, MAX_POINTS_PER_PLAYER};
pub use calculator::{compute_score, Outcome, Points, Scoreline, Trend};
pub use series::RunningAverageSeries;
