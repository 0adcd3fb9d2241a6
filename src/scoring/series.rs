use serde::{Deserialize, Serialize};

/// Append-only sequence of derived averages.
///
/// Each append stores `(sum(previous values) + sample) / (len + 1)`, i.e. the
/// stored averages are re-averaged together with the new raw sample. Past two
/// samples this is not the arithmetic mean of the raw inputs, and the result
/// depends on the order samples arrive in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunningAverageSeries {
    values: Vec<f64>,
}

impl RunningAverageSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Appends a new sample and returns the value that was stored for it
    pub fn append(&mut self, sample: f64) -> f64 {
        let sum: f64 = self.values.iter().sum();
        let computed = (sum + sample) / (self.values.len() + 1) as f64;
        self.values.push(computed);
        computed
    }

    pub fn latest(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Most recent values first, optionally capped to `limit` entries
    pub fn progression(&self, limit: Option<usize>) -> Vec<f64> {
        let take = limit.unwrap_or(self.values.len());
        self.values.iter().rev().take(take).copied().collect()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
