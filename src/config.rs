use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::parser::{ParseOptions, Timestamp};

/// Podcasts app group container, relative to the home directory.
const PODCASTS_CONTAINER: &str = "Library/Group Containers/243LU875E5.groups.com.apple.podcasts";
const CACHE_SUBDIR: &str = "Library/Cache/Assets/TTML";
const DATABASE_FILE: &str = "Documents/MTLibrary.sqlite";

pub const ENV_CACHE_DIR: &str = "PODPULP_CACHE_DIR";
pub const ENV_DATABASE: &str = "PODPULP_DATABASE";
pub const ENV_WORKERS: &str = "PODPULP_WORKERS";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub database_path: PathBuf,
    pub workers: usize,
    pub paragraph_gap_secs: f64,
}

/// What a config file may set. Anything left out keeps its default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    cache_dir: Option<String>,
    database_path: Option<String>,
    workers: Option<usize>,
    paragraph_gap_secs: Option<f64>,
}

/// Values given on the command line. They win over every other layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache_dir: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub workers: Option<usize>,
}

impl Config {
    pub fn defaults_for_home(home: &Path) -> Self {
        let container = home.join(PODCASTS_CONTAINER);
        Self {
            cache_dir: container.join(CACHE_SUBDIR),
            database_path: container.join(DATABASE_FILE),
            ..Self::without_paths()
        }
    }

    /// Defaults when no home directory is known. The empty paths must be
    /// filled by a later layer.
    fn without_paths() -> Self {
        Self {
            cache_dir: PathBuf::new(),
            database_path: PathBuf::new(),
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            paragraph_gap_secs: 2.0,
        }
    }

    /// `~/.config/podpulp/config.yaml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("podpulp").join("config.yaml"))
    }

    /// Defaults, then the config file (the explicit one, or the default
    /// location if it exists), then environment overrides, then `overrides`.
    pub fn load(explicit: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|p| p.is_file()),
        };
        Self::load_layers(
            file.as_deref(),
            overrides,
            dirs::home_dir().as_deref(),
            |key| std::env::var(key).ok(),
        )
    }

    fn load_layers<F>(
        file: Option<&Path>,
        overrides: &Overrides,
        home: Option<&Path>,
        lookup: F,
    ) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match home {
            Some(home) => Self::defaults_for_home(home),
            None => Self::without_paths(),
        };

        if let Some(path) = file {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            config.merge_yaml(&text, home)?;
            log::debug!("Loaded config from {}", path.display());
        }

        config.apply_env(lookup, home)?;
        config.apply_overrides(overrides);

        if config.cache_dir.as_os_str().is_empty() || config.database_path.as_os_str().is_empty() {
            return Err(ConfigError::NoHomeDirectory);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn merge_yaml(&mut self, text: &str, home: Option<&Path>) -> Result<(), ConfigError> {
        // An empty file deserializes to unit, not a map.
        if text.trim().is_empty() {
            return Ok(());
        }
        let file: ConfigFile = serde_yaml::from_str(text)?;
        if let Some(dir) = file.cache_dir {
            self.cache_dir = expand_home(&dir, home)?;
        }
        if let Some(db) = file.database_path {
            self.database_path = expand_home(&db, home)?;
        }
        if let Some(workers) = file.workers {
            self.workers = workers;
        }
        if let Some(gap) = file.paragraph_gap_secs {
            self.paragraph_gap_secs = gap;
        }
        Ok(())
    }

    pub fn apply_env<F>(&mut self, lookup: F, home: Option<&Path>) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|v| !v.trim().is_empty()) {
            self.cache_dir = expand_home(dir.trim(), home)?;
        }
        if let Some(db) = lookup(ENV_DATABASE).filter(|v| !v.trim().is_empty()) {
            self.database_path = expand_home(db.trim(), home)?;
        }
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.workers = workers
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_WORKERS,
                    value: workers.clone(),
                })?;
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(dir) = &overrides.cache_dir {
            self.cache_dir = dir.clone();
        }
        if let Some(db) = &overrides.database_path {
            self.database_path = db.clone();
        }
        if let Some(workers) = overrides.workers {
            self.workers = workers;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "workers",
                value: "0".to_string(),
            });
        }
        if !self.paragraph_gap_secs.is_finite() || self.paragraph_gap_secs < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "paragraph_gap_secs",
                value: self.paragraph_gap_secs.to_string(),
            });
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            paragraph_gap: Timestamp::from_millis((self.paragraph_gap_secs * 1000.0).round() as u64),
        }
    }
}

fn expand_home(raw: &str, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let rest = match raw.strip_prefix("~/") {
        Some(rest) => rest,
        None if raw == "~" => "",
        None => return Ok(PathBuf::from(raw)),
    };
    let home = home.ok_or(ConfigError::NoHomeDirectory)?;
    Ok(if rest.is_empty() {
        home.to_path_buf()
    } else {
        home.join(rest)
    })
}
