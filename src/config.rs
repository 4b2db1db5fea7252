// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Period of the session timer. The tick only refreshes the derived remaining
/// time; the stored `started_at` is the source of truth.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Letters available to first-generation shuffled copies.
pub const VERSION_LETTERS: std::ops::RangeInclusive<char> = 'A'..='Z';

/// Name written to `exam_answers.evaluated_by` by the built-in grader.
pub const AUTO_EVALUATOR: &str = "auto";

/// Which grading collaborator handles submitted attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradingMode {
    /// Objective grading inside this service.
    Local,
    /// Server-side routines invoked by name in the database.
    Database,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// When absent the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub grading_mode: GradingMode,
    pub log_dir: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL").ok().filter(|url| !url.is_empty());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let grading_mode = match env::var("GRADING_MODE").as_deref() {
            Ok("database") => GradingMode::Database,
            _ => GradingMode::Local,
        };

        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Self {
            database_url,
            bind_addr,
            grading_mode,
            log_dir,
            rust_log,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind_addr: "127.0.0.1:0".to_string(),
            grading_mode: GradingMode::Local,
            log_dir: "logs".to_string(),
            rust_log: "error".to_string(),
        }
    }
}
