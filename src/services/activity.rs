use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use log::info;

use crate::domain::{Activity, Team};
use crate::store::{self, Kind, Store, Versioned};

pub const ACCURACY_ACTIVITY: &str = "accuracy";

/// Receives team feed events. Publishing is fire-and-forget for callers:
/// an error here never fails an aggregation.
pub trait ActivityPublisher: Send + Sync {
    fn publish_team_activity(&self, team: &Team, activity_type: &str, message: &str) -> Result<()>;
}

pub fn accuracy_message(accuracy: f64) -> String {
    format!("has a new accuracy of {:.2}%", accuracy * 100.0)
}

/// Writes activities to the log only
pub struct LogPublisher;

impl ActivityPublisher for LogPublisher {
    fn publish_team_activity(&self, team: &Team, activity_type: &str, message: &str) -> Result<()> {
        info!("[{}] team {} ({}) {}", activity_type, team.id, team.name, message);
        Ok(())
    }
}

/// Persists each activity as an `Activity` document
pub struct StoreActivityPublisher {
    store: Arc<dyn Store>,
}

impl StoreActivityPublisher {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

impl ActivityPublisher for StoreActivityPublisher {
    fn publish_team_activity(&self, team: &Team, activity_type: &str, message: &str) -> Result<()> {
        let id = self
            .store
            .allocate_id(Kind::Activity)
            .context("Failed to allocate activity id")?;

        let mut activity = Versioned::new(Activity {
            id,
            activity_type: activity_type.to_string(),
            verb: message.to_string(),
            actor_id: team.id,
            actor_name: team.name.clone(),
            published: Utc::now(),
        });

        store::save(self.store.as_ref(), &mut activity)
            .with_context(|| format!("Failed to save activity for team {}", team.id))
    }
}
