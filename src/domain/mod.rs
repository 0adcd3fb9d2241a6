pub mod event;
pub mod models;

pub use event::{MatchFinished, TeamRoster};
pub use models::*;
