use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::buff::{ModifierKind, ModifierStacking, ModifierContribution};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempModifier {
    pub value: f64,
    #[serde(rename = "type")]
    pub kind: ModifierKind,
}

/// Counter-hit queued by a buff; resolved after the main hit without
/// firing further triggers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterHit {
    pub attacker_id: String,
    pub target_id: String,
    pub amount: f64,
    pub source_buff: String,
}

/// Per-action scratch record shared by the damage pipeline and buff
/// effects. Built fresh for every resolved entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatContext {
    pub turn: u32,
    pub attacker_id: Option<String>,
    pub target_id: Option<String>,
    pub skill_id: Option<String>,
    pub body_part: Option<String>,
    pub raw_damage: f64,
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub armor_absorbed: f64,
    pub shield_absorbed: f64,
    pub temp_modifiers: BTreeMap<String, Vec<TempModifier>>,
    pub shield_pool: f64,
    pub damage_taken_mult: f64,
    /// Additive bonus on outgoing damage (`0` = none).
    pub damage_dealt_mult: f64,
    pub damage_taken_override: Option<f64>,
    /// Fraction of the final hit converted into healing instead.
    pub heal_ratio: Option<f64>,
    pub skip_turn: bool,
    pub revived: bool,
    pub counter_hits: Vec<CounterHit>,
}

impl Default for CombatContext {
    fn default() -> Self {
        Self {
            turn: 0,
            attacker_id: None,
            target_id: None,
            skill_id: None,
            body_part: None,
            raw_damage: 0.0,
            damage_dealt: 0.0,
            damage_taken: 0.0,
            armor_absorbed: 0.0,
            shield_absorbed: 0.0,
            temp_modifiers: BTreeMap::new(),
            shield_pool: 0.0,
            damage_taken_mult: 1.0,
            damage_dealt_mult: 0.0,
            damage_taken_override: None,
            heal_ratio: None,
            skip_turn: false,
            revived: false,
            counter_hits: Vec::new(),
        }
    }
}

impl CombatContext {
    pub fn for_turn(turn: u32) -> Self {
        Self {
            turn,
            ..Self::default()
        }
    }

    pub fn action(
        turn: u32,
        attacker_id: &str,
        target_id: &str,
        skill_id: &str,
        body_part: &str,
    ) -> Self {
        Self {
            turn,
            attacker_id: Some(attacker_id.to_string()),
            target_id: Some(target_id.to_string()),
            skill_id: Some(skill_id.to_string()),
            body_part: Some(body_part.to_string()),
            ..Self::default()
        }
    }

    /// Context aimed at one entity only (death checks).
    pub fn targeting(turn: u32, target_id: &str) -> Self {
        Self {
            turn,
            target_id: Some(target_id.to_string()),
            ..Self::default()
        }
    }

    pub fn push_temp_modifier(&mut self, stat: &str, modifier: TempModifier) {
        self.temp_modifiers
            .entry(stat.to_string())
            .or_default()
            .push(modifier);
    }

    /// Temp-modifier value of `stat` composed over `base`.
    pub fn temp_stat(&self, stat: &str, base: f64) -> f64 {
        let Some(modifiers) = self.temp_modifiers.get(stat) else {
            return base;
        };
        let mut stacking = ModifierStacking::new();
        stacking.add_many(modifiers.iter().map(|m| ModifierContribution {
            key: stat,
            kind: m.kind,
            value: m.value,
        }));
        stacking.effective(stat, base)
    }

    pub fn involves(&self, entity_id: &str) -> bool {
        self.attacker_id.as_deref() == Some(entity_id) || self.target_id.as_deref() == Some(entity_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_stat_composes_over_base() {
        let mut ctx = CombatContext::default();
        assert_eq!(ctx.temp_stat("armorMitigationMult", 1.0), 1.0);
        ctx.push_temp_modifier(
            "armorMitigationMult",
            TempModifier {
                value: 0.5,
                kind: ModifierKind::Flat,
            },
        );
        assert_eq!(ctx.temp_stat("armorMitigationMult", 1.0), 1.5);
    }
}
