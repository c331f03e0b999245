//! Engine settings: file defaults plus `TURNFORGE_*` environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{DataFormat, DEFAULT_DATA_PATH};
use crate::error::ConfigError;
use crate::timeline::TieBreak;

pub const ENV_STEP_DELAY_MS: &str = "TURNFORGE_STEP_DELAY_MS";
pub const ENV_SEED: &str = "TURNFORGE_SEED";
pub const ENV_MAX_TURNS: &str = "TURNFORGE_MAX_TURNS";
pub const ENV_DATA: &str = "TURNFORGE_DATA";

/// Step delay used when a host animates playback.
pub const ANIMATED_STEP_DELAY_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct EngineConfig {
    /// Pause between timeline steps; 0 for headless play.
    pub step_delay_ms: u64,
    /// Autoplay gives up after this many turns.
    pub max_turns: u32,
    /// Seed for `random_*` target selection.
    pub seed: u64,
    /// Tie-break used when a level sets none.
    pub tie_break: Option<TieBreak>,
    pub data_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: 0,
            max_turns: 50,
            seed: 7,
            tie_break: None,
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = match DataFormat::from_path(path) {
            DataFormat::Json => serde_json::from_str(&raw).map_err(|err| err.to_string()),
            DataFormat::Yaml => serde_yaml::from_str(&raw).map_err(|err| err.to_string()),
        };
        parsed.map_err(|message| ConfigError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    /// Defaults with process environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| env::var(key).ok());
        config
    }

    /// Applies `TURNFORGE_*` values from `lookup`. Unparsable values are
    /// logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = parse_var(&lookup, ENV_STEP_DELAY_MS) {
            self.step_delay_ms = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_SEED) {
            self.seed = value;
        }
        if let Some(value) = parse_var(&lookup, ENV_MAX_TURNS) {
            self.max_turns = value;
        }
        if let Some(path) = lookup(ENV_DATA).filter(|raw| !raw.trim().is_empty()) {
            self.data_path = PathBuf::from(path);
        }
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment override");
            None
        }
    }
}
