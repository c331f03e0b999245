use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buff::{BuffManager, StatValues};
use crate::events::EntityStatus;
use crate::planning::Side;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub hp: f64,
    pub max_hp: f64,
    #[serde(default)]
    pub ap: f64,
    #[serde(default)]
    pub max_ap: f64,
    #[serde(default)]
    pub speed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPart {
    /// Current armor; starts at `max_armor` when omitted.
    #[serde(default, alias = "current")]
    pub armor: Option<f64>,
    #[serde(default, alias = "max")]
    pub max_armor: f64,
    #[serde(default = "neutral_weakness")]
    pub weakness: f64,
    #[serde(default)]
    pub broken: bool,
}

fn neutral_weakness() -> f64 {
    1.0
}

impl BodyPart {
    pub fn new(max_armor: f64, weakness: f64) -> Self {
        Self {
            armor: Some(max_armor),
            max_armor,
            weakness,
            broken: false,
        }
    }

    pub fn current_armor(&self) -> f64 {
        self.armor.unwrap_or(self.max_armor)
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub side: Side,
    pub stats: Stats,
    pub body_parts: BTreeMap<String, BodyPart>,
    /// Skill ids in listed order.
    pub skills: Vec<String>,
    pub buffs: BuffManager,
}

impl Entity {
    pub fn is_alive(&self) -> bool {
        self.stats.hp > 0.0
    }

    pub fn stat_values(&self) -> StatValues {
        StatValues {
            hp: self.stats.hp,
            max_hp: self.stats.max_hp,
            ap: self.stats.ap,
            max_ap: self.stats.max_ap,
            speed: self.stats.speed,
        }
    }

    pub fn status(&self) -> EntityStatus {
        EntityStatus {
            entity_id: self.id.clone(),
            hp: self.stats.hp,
            max_hp: self.stats.max_hp,
            ap: self.stats.ap,
            max_ap: self.stats.max_ap,
        }
    }

    /// Speed after buff modifiers.
    pub fn effective_speed(&self) -> f64 {
        self.buffs.effective_stat("speed", self.stats.speed)
    }

    pub fn damage(&mut self, amount: f64) -> f64 {
        let before = self.stats.hp;
        self.stats.hp = (before - amount.max(0.0)).max(0.0);
        before - self.stats.hp
    }

    pub fn heal(&mut self, amount: f64) -> f64 {
        let before = self.stats.hp;
        self.stats.hp = (before + amount.max(0.0)).min(self.stats.max_hp);
        self.stats.hp - before
    }

    /// First part that still has armor, else the first part.
    pub fn default_part(&self) -> Option<&str> {
        self.body_parts
            .iter()
            .find(|(_, part)| part.current_armor() > 0.0)
            .or_else(|| self.body_parts.iter().next())
            .map(|(name, _)| name.as_str())
    }
}

/// Every combatant in the battle, player first.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    entities: Vec<Entity>,
}

impl Roster {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entities.iter().map(|entity| entity.id.clone()).collect()
    }

    pub fn player(&self) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.side == Side::Player)
    }

    pub fn enemies(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|entity| entity.side == Side::Enemy)
    }

    pub fn living_enemies(&self) -> impl Iterator<Item = &Entity> {
        self.enemies().filter(|entity| entity.is_alive())
    }

    pub fn player_alive(&self) -> bool {
        self.player().is_some_and(Entity::is_alive)
    }

    pub fn any_enemy_alive(&self) -> bool {
        self.living_enemies().next().is_some()
    }
}
