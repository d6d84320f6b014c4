use std::fs;
use std::path::Path;

use serde::Deserialize;
use tokio::sync::Semaphore;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Status labels that do not count as resolved work.
    pub pending_statuses: Vec<String>,
    pub max_resolution_days: i64,
    pub trend_min_points: usize,
    pub trend_correlation_threshold: f64,
    pub iqr_multiplier: f64,
    /// Sheet names (case-insensitive) that never describe a person.
    pub skip_sheets: Vec<String>,
    /// Upper bound on concurrently analyzed sheets; 0 means unbounded.
    pub max_workers: usize,
    pub high_pending_share: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pending_statuses: [
                "PENDING",
                "IN_ANALYSIS",
                "PRIORITY",
                "PRIORITY_TOTAL",
                "ANÁLISE",
                "ANALISE",
                "PRIORIDADE",
                "PRIORIDADE TOTAL",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_resolution_days: 365,
            trend_min_points: 3,
            trend_correlation_threshold: 0.1,
            iqr_multiplier: 1.5,
            skip_sheets: ["resumo", "índice", "index", "summary"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_workers: 0,
            high_pending_share: 0.7,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidInput(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_resolution_days < 0 {
            return Err(EngineError::InvalidInput(
                "max_resolution_days must not be negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.trend_correlation_threshold) {
            return Err(EngineError::InvalidInput(
                "trend_correlation_threshold must be within [0, 1]".into(),
            ));
        }
        if self.iqr_multiplier < 0.0 {
            return Err(EngineError::InvalidInput(
                "iqr_multiplier must not be negative".into(),
            ));
        }
        if self.max_workers > Semaphore::MAX_PERMITS {
            return Err(EngineError::InvalidInput(format!(
                "max_workers must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }

    pub fn is_pending(&self, label: &str) -> bool {
        self.pending_statuses.iter().any(|pending| pending == label)
    }

    pub fn skips_sheet(&self, name: &str) -> bool {
        let name = name.trim().to_lowercase();
        self.skip_sheets.iter().any(|skip| skip.to_lowercase() == name)
    }
}
