use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::EngineError;

/// Engine settings, loadable from a JSON file.
///
/// Missing fields fall back to their defaults, so an empty object `{}`
/// is a valid configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Quiet period before a typed search is committed, in milliseconds
    pub debounce_ms: u64,
    /// Number of entries in a facet's "top" slice
    pub top_n: usize,
    /// Maximum number of media records requested per query
    pub page_size: u32,
    /// Catalog location; `None` uses the per-user data directory
    pub db_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            top_n: 5,
            page_size: 500,
            db_path: None,
        }
    }
}

impl EngineConfig {
    /// Read a configuration file
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Catalog path, falling back to the default data directory location
    pub fn resolved_db_path(&self) -> Result<PathBuf, EngineError> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path().ok_or(EngineError::NoDataDir),
        }
    }
}

/// Get the path where the catalog should be stored
///
/// - Linux: ~/.local/share/archive-explorer/archive.db
/// - macOS: ~/Library/Application Support/archive-explorer/archive.db
/// - Windows: %APPDATA%\archive-explorer\archive.db
pub fn default_db_path() -> Option<PathBuf> {
    let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
    path.push("archive-explorer");
    path.push("archive.db");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "top_n": 8 }}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.top_n, 8);
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.page_size, 500);
    }

    #[test]
    fn test_malformed_file_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = EngineConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, EngineError::ConfigParse { .. }));
    }

    #[test]
    fn test_explicit_db_path_wins() {
        let config = EngineConfig {
            db_path: Some(PathBuf::from("/tmp/archive.db")),
            ..EngineConfig::default()
        };
        assert_eq!(config.resolved_db_path().unwrap(), PathBuf::from("/tmp/archive.db"));
    }
}
