//! Load game data from one YAML or JSON document, chosen by file extension.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::data::game::GameData;
use crate::error::ConfigError;

pub const DEFAULT_DATA_PATH: &str = "data/demo_battle.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Yaml,
    Json,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

pub fn parse_game_data(raw: &str, format: DataFormat, path: &Path) -> Result<GameData, ConfigError> {
    let parsed = match format {
        DataFormat::Json => serde_json::from_str(raw).map_err(|err| err.to_string()),
        DataFormat::Yaml => serde_yaml::from_str(raw).map_err(|err| err.to_string()),
    };
    parsed.map_err(|message| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

pub fn load_game_data(path: impl AsRef<Path>) -> Result<GameData, ConfigError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse_game_data(&raw, DataFormat::from_path(path), path)?;
    info!(
        path = %path.display(),
        skills = data.skills.len(),
        buffs = data.buffs.len(),
        enemies = data.enemies.len(),
        levels = data.levels.len(),
        "game data loaded"
    );
    Ok(data)
}
