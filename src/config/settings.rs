#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Optimistic read-modify-write attempts per entity before giving up
    pub max_write_attempts: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            max_write_attempts: 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportingSettings {
    pub progression_limit: usize,
    pub leaderboard_size: usize,
}

impl Default for ReportingSettings {
    fn default() -> Self {
        Self {
            progression_limit: 5,
            leaderboard_size: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "prediction_scoring.db".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub aggregation: AggregationSettings,
    pub reporting: ReportingSettings,
    pub database: DatabaseSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            aggregation: AggregationSettings::default(),
            reporting: ReportingSettings::default(),
            database: DatabaseSettings::default(),
        }
    }
}
