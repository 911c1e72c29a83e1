//! Persisted overlay settings.
//!
//! Stored as JSON. Fields missing from the file fall back to their defaults,
//! so older files keep loading as settings are added.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::SearchLimit;
use crate::error::ConfigError;
use crate::models::AnalysisLimits;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(default)]
pub struct OverlayConfig {
    /// UCI engine executable
    pub engine_path: Option<PathBuf>,
    /// Polyglot opening book (`.bin`)
    pub book_path: Option<PathBuf>,
    /// Requested engine strength
    pub elo: u32,
    /// Search depth for position analysis
    pub depth: u32,
    /// Move time for position analysis, in milliseconds
    pub movetime_ms: u64,
    /// Move time for each promotion probe, in milliseconds
    pub promotion_movetime_ms: u64,
    /// Board square size in pixels
    pub square_size: u32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            engine_path: None,
            book_path: None,
            elo: 1500,
            depth: 15,
            movetime_ms: 100,
            promotion_movetime_ms: 50,
            square_size: 60,
        }
    }
}

impl OverlayConfig {
    pub fn analysis_limits(&self) -> AnalysisLimits {
        let depth = (self.depth > 0).then_some(self.depth);
        let time = (self.movetime_ms > 0).then(|| Duration::from_millis(self.movetime_ms));
        AnalysisLimits {
            search: SearchLimit { depth, time },
            promotion: SearchLimit::time(Duration::from_millis(self.promotion_movetime_ms.max(1))),
        }
    }
}

/// Load settings from `path`. A missing file gives the defaults; an unreadable
/// or malformed one is logged and also gives the defaults.
pub fn load(path: &Path) -> OverlayConfig {
    match try_load(path) {
        Ok(Some(config)) => {
            info!(path = %path.display(), "Loaded config");
            config
        }
        Ok(None) => OverlayConfig::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unusable config");
            OverlayConfig::default()
        }
    }
}

fn try_load(path: &Path) -> Result<Option<OverlayConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&text)?))
}

pub fn save(config: &OverlayConfig, path: &Path) -> Result<(), ConfigError> {
    let text = serde_json::to_string_pretty(config)?;
    fs::write(path, text)?;
    Ok(())
}

/// JSON Schema describing the config file
pub fn schema() -> Result<String, ConfigError> {
    let schema = schemars::schema_for!(OverlayConfig);
    Ok(serde_json::to_string_pretty(&schema)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load(&dir.path().join("nope.json")),
            OverlayConfig::default()
        );
    }

    #[test]
    fn test_partial_file_merges_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"elo": 2000, "engine_path": "/usr/bin/stockfish"}"#).unwrap();
        let config = load(&path);
        assert_eq!(config.elo, 2000);
        assert_eq!(config.engine_path, Some(PathBuf::from("/usr/bin/stockfish")));
        assert_eq!(config.depth, 15);
        assert_eq!(config.square_size, 60);
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load(&path), OverlayConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let config = OverlayConfig {
            book_path: Some(PathBuf::from("book.bin")),
            elo: 2400,
            ..OverlayConfig::default()
        };
        save(&config, &path).unwrap();
        assert_eq!(load(&path), config);
    }

    #[test]
    fn test_limits_from_config() {
        let limits = OverlayConfig::default().analysis_limits();
        assert_eq!(limits, AnalysisLimits::default());

        let depth_only = OverlayConfig {
            movetime_ms: 0,
            ..OverlayConfig::default()
        };
        assert_eq!(depth_only.analysis_limits().search, SearchLimit::depth(15));
    }

    #[test]
    fn test_schema_names_fields() {
        let schema = schema().unwrap();
        assert!(schema.contains("engine_path"));
        assert!(schema.contains("promotion_movetime_ms"));
    }
}
