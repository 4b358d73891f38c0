use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

use record_service::{MAX_LIMIT, MIN_LIMIT};

use crate::walker::DEFAULT_PAGE_SIZE;

/// Warehouse path that selects an in-memory store.
pub const IN_MEMORY: &str = ":memory:";

/// Pipeline configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sis_api_url: String,
    pub lms_api_url: String,
    pub state_api_url: String,
    pub api_timeout: Duration,
    pub page_size: usize,
    pub warehouse_path: String,
    pub raw_schema: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sis_api_url: "http://localhost:8001".to_string(),
            lms_api_url: "http://localhost:8002".to_string(),
            state_api_url: "http://localhost:8003".to_string(),
            api_timeout: Duration::from_secs(30),
            page_size: DEFAULT_PAGE_SIZE,
            warehouse_path: "warehouse.db".to_string(),
            raw_schema: "raw".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let defaults = Self::default();
        let page_size = match env::var("PAGE_SIZE") {
            Ok(v) => check_page_size(v.parse().context("PAGE_SIZE must be a valid number")?)
                .context("Invalid PAGE_SIZE")?,
            Err(_) => defaults.page_size,
        };

        Ok(Self {
            sis_api_url: env::var("SIS_API_URL").unwrap_or(defaults.sis_api_url),
            lms_api_url: env::var("LMS_API_URL").unwrap_or(defaults.lms_api_url),
            state_api_url: env::var("STATE_API_URL").unwrap_or(defaults.state_api_url),
            api_timeout: match env::var("API_TIMEOUT_SECS") {
                Ok(v) => Duration::from_secs(
                    v.parse()
                        .context("API_TIMEOUT_SECS must be a valid number")?,
                ),
                Err(_) => defaults.api_timeout,
            },
            page_size,
            warehouse_path: env::var("WAREHOUSE_PATH").unwrap_or(defaults.warehouse_path),
            raw_schema: env::var("RAW_SCHEMA").unwrap_or(defaults.raw_schema),
        })
    }

    pub fn in_memory_warehouse(&self) -> bool {
        self.warehouse_path == IN_MEMORY
    }
}

/// Page sizes the record services accept as `limit`.
pub fn check_page_size(size: usize) -> Result<usize> {
    anyhow::ensure!(
        (MIN_LIMIT..=MAX_LIMIT).contains(&size),
        "page size must be between {MIN_LIMIT} and {MAX_LIMIT}, got {size}"
    );
    Ok(size)
}
