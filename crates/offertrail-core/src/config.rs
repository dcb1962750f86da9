use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::attribute::AttributionOptions;
use crate::event::Hours;

/// Name of the per-directory config file.
pub const CONFIG_FILE_NAME: &str = "offertrail.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub attribution: AttributionConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionConfig {
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Worker threads for the rayon pool; rayon's default when unset.
    #[serde(default)]
    pub threads: Option<usize>,
}

impl Default for AttributionConfig {
    fn default() -> Self {
        Self {
            parallel: default_true(),
            threads: None,
        }
    }
}

impl AttributionConfig {
    #[must_use]
    pub const fn options(&self) -> AttributionOptions {
        AttributionOptions {
            parallel: self.parallel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Event-time hours per portfolio duration unit (days).
    #[serde(default = "default_hours_per_duration_unit")]
    pub hours_per_duration_unit: Hours,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            hours_per_duration_unit: default_hours_per_duration_unit(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Calendar date of event time zero.
    #[serde(default = "default_experiment_start")]
    pub experiment_start: NaiveDate,
    /// Drop users whose profile lacks gender or income.
    #[serde(default = "default_true")]
    pub require_demographics: bool,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            experiment_start: default_experiment_start(),
            require_demographics: default_true(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// `pretty`, `text` or `json`; resolved against flags and TTY when unset.
    #[serde(default)]
    pub format: Option<String>,
}

/// Load config from an explicit path. The file must exist.
///
/// # Errors
///
/// Fails if the file cannot be read or is not valid TOML for [`Config`].
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<Config>(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Candidate config locations in precedence order, explicit path first.
#[must_use]
pub fn config_candidates(explicit: Option<&Path>, working_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
        return candidates;
    }
    candidates.push(working_dir.join(CONFIG_FILE_NAME));
    if let Some(config_dir) = dirs::config_dir() {
        candidates.push(config_dir.join("offertrail/config.toml"));
    }
    candidates
}

/// Resolve the effective config.
///
/// An explicit path must exist. Otherwise the first existing file among
/// `./offertrail.toml` and `<config dir>/offertrail/config.toml` wins, and
/// defaults apply when neither exists.
///
/// # Errors
///
/// Fails if the chosen file cannot be read or parsed.
pub fn resolve_config(explicit: Option<&Path>, working_dir: &Path) -> Result<Config> {
    if let Some(path) = explicit {
        return load_config_file(path);
    }

    config_candidates(None, working_dir)
        .into_iter()
        .find(|path| path.exists())
        .map_or_else(|| Ok(Config::default()), |path| load_config_file(&path))
}

const fn default_true() -> bool {
    true
}

const fn default_hours_per_duration_unit() -> Hours {
    24
}

fn default_experiment_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 8, 1).unwrap_or_default()
}
