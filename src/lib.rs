pub mod alerts;
pub mod db;
pub mod embedding;
pub mod environment;
pub mod geo;
pub mod geocode;
pub mod logging;
pub mod ranking;
pub mod report;
pub mod scoring;
pub mod worker;

pub const TARGET_DB: &str = "db_query";
pub const TARGET_MATCHING: &str = "matching";
pub const TARGET_ALERTS: &str = "alerts";
