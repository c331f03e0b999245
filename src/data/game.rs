//! Authored game data: player, skills, buffs, enemies, levels, slot layouts.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::buff::BuffDefinition;
use crate::combat::{BodyPart, Stats};
use crate::data::skill::{SkillCatalog, SkillConfig};
use crate::error::ConfigError;
use crate::planning::SlotLayout;
use crate::timeline::RoundRules;

/// Anything listed in a data file that carries its own id.
pub trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for SkillConfig {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for BuffDefinition {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for EnemyTemplate {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for LevelConfig {
    fn key(&self) -> &str {
        &self.id
    }
}

/// Accepts either a list of records or a map keyed by id.
fn by_id<'de, D, T>(deserializer: D) -> Result<BTreeMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Keyed,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ListOrMap<T> {
        List(Vec<T>),
        Map(BTreeMap<String, T>),
    }

    Ok(match ListOrMap::<T>::deserialize(deserializer)? {
        ListOrMap::List(items) => items
            .into_iter()
            .map(|item| (item.key().to_string(), item))
            .collect(),
        ListOrMap::Map(map) => map,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTemplate {
    #[serde(default = "default_player_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub stats: Stats,
    #[serde(default)]
    pub body_parts: BTreeMap<String, BodyPart>,
    /// Learned skills, in skill-bar order.
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub buffs: Vec<String>,
}

fn default_player_id() -> String {
    "player".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyTemplate {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub stats: Stats,
    #[serde(default)]
    pub body_parts: BTreeMap<String, BodyPart>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub buffs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveEnemy {
    pub template_id: String,
    #[serde(default)]
    pub position: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wave {
    #[serde(default)]
    pub enemies: Vec<WaveEnemy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slot_layout_id: Option<String>,
    #[serde(default)]
    pub rules: RoundRules,
    #[serde(default)]
    pub waves: Vec<Wave>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub player: PlayerTemplate,
    #[serde(default, deserialize_with = "by_id")]
    pub skills: BTreeMap<String, SkillConfig>,
    #[serde(default, deserialize_with = "by_id")]
    pub buffs: BTreeMap<String, BuffDefinition>,
    #[serde(default, deserialize_with = "by_id")]
    pub enemies: BTreeMap<String, EnemyTemplate>,
    #[serde(default, deserialize_with = "by_id")]
    pub levels: BTreeMap<String, LevelConfig>,
    #[serde(default)]
    pub slot_layouts: BTreeMap<String, SlotLayout>,
    #[serde(default)]
    pub default_slot_layout: Option<String>,
}

impl SkillCatalog for GameData {
    fn skill(&self, id: &str) -> Option<&SkillConfig> {
        self.skills.get(id)
    }
}

impl GameData {
    pub fn level(&self, id: &str) -> Result<&LevelConfig, ConfigError> {
        self.levels
            .get(id)
            .ok_or_else(|| ConfigError::UnknownLevel(id.to_string()))
    }

    pub fn first_level_id(&self) -> Option<&str> {
        self.levels.keys().next().map(String::as_str)
    }

    /// Layout id and table for a level, falling back to the default layout.
    pub fn slot_layout_for(&self, level: &LevelConfig) -> Option<(String, SlotLayout)> {
        let id = level
            .slot_layout_id
            .as_deref()
            .or(self.default_slot_layout.as_deref())?;
        self.slot_layouts
            .get(id)
            .map(|layout| (id.to_string(), layout.clone()))
    }
}
