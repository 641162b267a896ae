// ⚙️ Configuration - where the relations live and how to log
//
// JSON file, every field optional. Environment variables override the file
// for the data location only.

use crate::resolver::DEFAULT_CACHE_CAPACITY;
use crate::store::{CsvSource, RelationFiles, RelationSource, SqliteSource};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_DATA_DIR: &str = "BANK_ANALYZER_DATA_DIR";
pub const ENV_SQLITE: &str = "BANK_ANALYZER_SQLITE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Csv,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Directory holding the four CSV relations
    pub data_dir: PathBuf,

    pub backend: Backend,

    /// Database file when backend = sqlite (defaults to <data_dir>/relations.db)
    pub sqlite_path: Option<PathBuf>,

    pub files: RelationFiles,

    /// Entries kept in each resolver memo
    pub cache_capacity: usize,

    /// tracing EnvFilter directive used when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            data_dir: PathBuf::from("data"),
            backend: Backend::Csv,
            sqlite_path: None,
            files: RelationFiles::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            log_filter: "info".to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: AnalyzerConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config.with_env_overrides())
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        AnalyzerConfig::default().with_env_overrides()
    }

    fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var_os(ENV_DATA_DIR).map(PathBuf::from),
            std::env::var_os(ENV_SQLITE).map(PathBuf::from),
        )
    }

    /// Setting a database path implies the sqlite backend
    fn with_overrides(mut self, data_dir: Option<PathBuf>, sqlite: Option<PathBuf>) -> Self {
        if let Some(dir) = data_dir {
            self.data_dir = dir;
        }
        if let Some(path) = sqlite {
            self.sqlite_path = Some(path);
            self.backend = Backend::Sqlite;
        }
        self
    }

    pub fn sqlite_file(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("relations.db"))
    }

    /// Relation source for the configured backend
    pub fn source(&self) -> Box<dyn RelationSource> {
        match self.backend {
            Backend::Csv => Box::new(CsvSource::new(&self.data_dir, self.files.clone())),
            Backend::Sqlite => Box::new(SqliteSource::new(self.sqlite_file())),
        }
    }
}

/// Install the global tracing subscriber on stderr; RUST_LOG wins over the configured filter
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"data_dir": "/srv/relations", "files": {"registry": "cadastro.csv"}, "cache_capacity": 16}"#,
        )
        .unwrap();

        let config = AnalyzerConfig::from_file(&path).unwrap();
        // Only assert fields the environment cannot override
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.files.registry, "cadastro.csv");
        assert_eq!(config.files.entity_detail, "entity_detail.csv");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = AnalyzerConfig::from_file(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to parse config JSON"));
        assert!(AnalyzerConfig::from_file(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn test_sqlite_override_switches_backend() {
        let config = AnalyzerConfig::default().with_overrides(None, Some(PathBuf::from("/tmp/r.db")));
        assert_eq!(config.backend, Backend::Sqlite);
        assert_eq!(config.sqlite_file(), PathBuf::from("/tmp/r.db"));
        assert!(config.source().describe().contains("sqlite"));

        let csv = AnalyzerConfig::default().with_overrides(Some(PathBuf::from("/data")), None);
        assert_eq!(csv.backend, Backend::Csv);
        assert_eq!(csv.sqlite_file(), PathBuf::from("/data/relations.db"));
        assert!(csv.source().describe().contains("csv"));
    }
}
