pub mod settings;

pub use settings::{AggregationSettings, AppConfig, DatabaseSettings, ReportingSettings};
