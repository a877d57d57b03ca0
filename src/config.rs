use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_derive::Deserialize;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "registry.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("error reading config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration in {origin}: {source}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Test,
    #[default]
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Dev => "DEV",
            Environment::Test => "TEST",
            Environment::Prod => "PROD",
        };
        f.write_str(name)
    }
}

/// What the table merge does with registry rows whose table left the database.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrphanPolicy {
    /// Keep the row, forced disabled.
    #[default]
    Retain,
    Drop,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct TableSettings {
    pub orphans: OrphanPolicy,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct StatsSettings {
    pub low_frequency_threshold: usize,
    pub essential_columns: Vec<String>,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            low_frequency_threshold: 5,
            essential_columns: vec!["Date".into(), "Title".into(), "Text".into()],
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub app_name: String,
    pub environment: Environment,
    pub data_dir: PathBuf,
    pub source_db_file: String,
    pub table_registry_file: String,
    pub column_registry_file: String,
    /// Defaults to `data_processing.<ENV>.log` inside `data_dir`.
    pub log_file: Option<String>,
    pub tables: TableSettings,
    pub stats: StatsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "Schema Registry Builder".to_string(),
            environment: Environment::default(),
            data_dir: PathBuf::from("data"),
            source_db_file: "source.sqlite".to_string(),
            table_registry_file: "master_table.tsv".to_string(),
            column_registry_file: "columns.tsv".to_string(),
            log_file: None,
            tables: TableSettings::default(),
            stats: StatsSettings::default(),
        }
    }
}

impl Settings {
    /// Loads `path` when given; otherwise `registry.toml` in the working
    /// directory if present, falling back to the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => load_settings(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    load_settings(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn with_data_dir(self, data_dir: PathBuf) -> Self {
        Self { data_dir, ..self }
    }

    pub fn source_db_path(&self) -> PathBuf {
        self.data_dir.join(&self.source_db_file)
    }

    pub fn table_registry_path(&self) -> PathBuf {
        self.data_dir.join(&self.table_registry_file)
    }

    pub fn column_registry_path(&self) -> PathBuf {
        self.data_dir.join(&self.column_registry_file)
    }

    pub fn log_path(&self) -> PathBuf {
        match &self.log_file {
            Some(name) => self.data_dir.join(name),
            None => self
                .data_dir
                .join(format!("data_processing.{}.log", self.environment)),
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        origin: format!("'{}'", path.display()),
        source,
    })
}

// Load settings from a string (to test our structs are defined correctly)
pub fn load_settings_from_str(contents: &str) -> Result<Settings, ConfigError> {
    toml::from_str(contents).map_err(|source| ConfigError::Parse {
        origin: "inline settings".to_string(),
        source,
    })
}

/// Who is running the tools and where, for the run header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    pub user: String,
    pub computer: String,
}

impl RunIdentity {
    pub fn from_env() -> Self {
        Self {
            user: first_env(&["USERNAME", "USER"]),
            computer: first_env(&["COMPUTERNAME", "HOSTNAME"]),
        }
    }
}

fn first_env(names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .unwrap_or_else(|| "NA".to_string())
}
