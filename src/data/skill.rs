use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::planning::Side;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillKind {
    #[default]
    Damage,
    Heal,
    Buff,
}

/// Who the skill is aimed at, relative to the caster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetSubject {
    #[serde(rename = "SELF")]
    Caster,
    #[default]
    Enemy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetScope {
    Entity,
    #[default]
    Part,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
    RandomSingle,
    RandomMultiple,
}

impl SelectionMode {
    pub const fn is_random(self) -> bool {
        matches!(self, Self::RandomSingle | Self::RandomMultiple)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub mode: SelectionMode,
    #[serde(default)]
    pub select_count: Option<u32>,
    #[serde(default)]
    pub candidate_parts: Vec<String>,
    #[serde(default)]
    pub selected_parts: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    #[serde(default)]
    pub subject: TargetSubject,
    #[serde(default)]
    pub scope: TargetScope,
    #[serde(default)]
    pub selection: Selection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuffRefTarget {
    #[serde(rename = "self")]
    Caster,
    #[default]
    Target,
}

/// Buff applied when the skill lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffRef {
    pub buff_id: String,
    #[serde(default)]
    pub target: BuffRefTarget,
    #[serde(default = "one")]
    pub stacks: u32,
}

fn one() -> u32 {
    1
}

/// Immutable skill definition. `cost` stays optional here; a missing or
/// negative cost is rejected when the turn's AP snapshot is taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "type")]
    pub kind: SkillKind,
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub target: TargetDescriptor,
    #[serde(default)]
    pub buff_refs: Vec<BuffRef>,
}

impl SkillConfig {
    /// How many slots one skill may occupy at once (never below 1).
    pub fn select_count(&self) -> u32 {
        self.target.selection.select_count.unwrap_or(1).max(1)
    }

    /// Slot side this skill is placed on when aimed by the player.
    pub fn target_side(&self) -> Side {
        match self.target.subject {
            TargetSubject::Caster => Side::Player,
            TargetSubject::Enemy => Side::Enemy,
        }
    }

    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Skill lookup used by planning and validation.
pub trait SkillCatalog {
    fn skill(&self, id: &str) -> Option<&SkillConfig>;
}

impl SkillCatalog for BTreeMap<String, SkillConfig> {
    fn skill(&self, id: &str) -> Option<&SkillConfig> {
        self.get(id)
    }
}
