use markup_provenance_engine::{DEFAULT_MAX_DEPTH, DsrOptions, SourceRange};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid source_offsets in {config_path}: start {start} is after end {end}")]
    InvalidSourceOffsets {
        config_path: PathBuf,
        start: i64,
        end: i64,
    },
}

/// Settings for the span resolution pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsrConfig {
    /// Known `[start, end]` of the root; the whole source when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_offsets: Option<[i64; 2]>,
    pub attr_expansion: bool,
    pub max_depth: usize,
}

impl Default for DsrConfig {
    fn default() -> Self {
        Self {
            source_offsets: None,
            attr_expansion: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl From<&DsrConfig> for DsrOptions {
    fn from(config: &DsrConfig) -> Self {
        Self {
            source_offsets: config
                .source_offsets
                .map(|[start, end]| SourceRange::new(start, end)),
            attr_expansion: config.attr_expansion,
            max_depth: config.max_depth,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// An `env_logger` filter such as `warn` or `dsr=trace`.
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dsr: DsrConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        if let Some([start, end]) = config.dsr.source_offsets
            && start > end
        {
            return Err(ConfigError::InvalidSourceOffsets {
                config_path: config_path.to_path_buf(),
                start,
                end,
            });
        }

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/markup-provenance");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn dsr_options(&self) -> DsrOptions {
        DsrOptions::from(&self.dsr)
    }

    /// Expands `~` and environment variables in a user-supplied path.
    pub fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
