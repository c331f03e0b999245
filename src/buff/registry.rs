//! Buff definitions and the read-only registry that resolves them.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::buff::stacking::ModifierKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackStrategy {
    #[default]
    Refresh,
    Replace,
    Add,
    Extend,
    Independent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    /// Turns; `-1` is permanent.
    #[serde(default)]
    pub duration: i32,
    #[serde(default = "default_max_stacks")]
    pub max_stacks: u32,
    #[serde(default)]
    pub stack_strategy: StackStrategy,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            duration: 0,
            max_stacks: default_max_stacks(),
            stack_strategy: StackStrategy::default(),
        }
    }
}

fn default_max_stacks() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatModifier {
    #[serde(rename = "type")]
    pub kind: ModifierKind,
    pub value: f64,
}

/// Combat moments a buff effect can react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Trigger {
    OnTurnStart,
    OnTurnEnd,
    OnActionPre,
    OnAttackPre,
    OnAttackPost,
    OnTakeDamagePre,
    OnTakeDamage,
    OnDefendPost,
    OnDeath,
    #[serde(other)]
    Unknown,
}

impl Trigger {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnTurnStart => "onTurnStart",
            Self::OnTurnEnd => "onTurnEnd",
            Self::OnActionPre => "onActionPre",
            Self::OnAttackPre => "onAttackPre",
            Self::OnAttackPost => "onAttackPost",
            Self::OnTakeDamagePre => "onTakeDamagePre",
            Self::OnTakeDamage => "onTakeDamage",
            Self::OnDefendPost => "onDefendPost",
            Self::OnDeath => "onDeath",
            Self::Unknown => "unknown",
        }
    }
}

/// Whose stats an effect reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectTarget {
    #[serde(rename = "self")]
    Owner,
    Attacker,
    Target,
}

/// A literal number or a formula / buff id string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EffectValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectParams {
    #[serde(default)]
    pub stat: Option<String>,
    #[serde(default)]
    pub value: Option<EffectValue>,
    #[serde(default, rename = "type")]
    pub kind: Option<ModifierKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffEffect {
    pub trigger: Trigger,
    pub action: String,
    #[serde(default)]
    pub target: Option<EffectTarget>,
    #[serde(default)]
    pub value: Option<EffectValue>,
    #[serde(default)]
    pub params: Option<EffectParams>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub alias_of: Option<String>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub stat_modifiers: BTreeMap<String, StatModifier>,
    #[serde(default)]
    pub effects: Vec<BuffEffect>,
}

#[derive(Debug, Clone, Default)]
pub struct BuffRegistry {
    raw: BTreeMap<String, BuffDefinition>,
}

impl BuffRegistry {
    pub fn new(definitions: BTreeMap<String, BuffDefinition>) -> Self {
        Self { raw: definitions }
    }

    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = BuffDefinition>,
    {
        Self::new(
            definitions
                .into_iter()
                .map(|def| (def.id.clone(), def))
                .collect(),
        )
    }

    pub fn contains(&self, id: &str) -> bool {
        self.raw.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.raw.keys().map(String::as_str)
    }

    pub fn raw(&self, id: &str) -> Option<&BuffDefinition> {
        self.raw.get(id)
    }

    /// Resolved definition, or `None` for unknown ids and dangling aliases.
    ///
    /// An alias takes behaviour (lifecycle, modifiers, effects) from the
    /// definition it names and keeps its own id, plus name, type and tags
    /// when it sets them.
    pub fn definition(&self, id: &str) -> Option<Rc<BuffDefinition>> {
        let def = self.raw.get(id)?;
        let Some(target) = def.alias_of.as_deref() else {
            return Some(Rc::new(def.clone()));
        };
        let aliased = self.raw.get(target)?;
        if aliased.alias_of.is_some() {
            return None;
        }
        Some(Rc::new(BuffDefinition {
            id: def.id.clone(),
            name: if def.name.is_empty() {
                aliased.name.clone()
            } else {
                def.name.clone()
            },
            kind: def.kind.clone().or_else(|| aliased.kind.clone()),
            tags: if def.tags.is_empty() {
                aliased.tags.clone()
            } else {
                def.tags.clone()
            },
            alias_of: None,
            ..aliased.clone()
        }))
    }
}
