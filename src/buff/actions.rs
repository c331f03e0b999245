//! The closed set of effect actions a buff may run.

use std::fmt;
use std::str::FromStr;

use crate::buff::formula::{Formula, FormulaScope};
use crate::buff::instance::AddOptions;
use crate::buff::registry::{BuffEffect, EffectTarget, EffectValue};
use crate::buff::stacking::ModifierKind;
use crate::combat::{CombatContext, CounterHit, Roster, TempModifier};
use crate::error::BuffFault;
use crate::events::{BattleEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Damage,
    Heal,
    ApplyBuff,
    SkipTurn,
    ModifyAp,
    AbsorbDamage,
    ModifyDamageTaken,
    SetDamageTaken,
    Attack,
    AbsorbToHeal,
    Revive,
    RemoveSelf,
    ModifyStatTemp,
}

impl ActionKind {
    pub const ALL: [ActionKind; 13] = [
        Self::Damage,
        Self::Heal,
        Self::ApplyBuff,
        Self::SkipTurn,
        Self::ModifyAp,
        Self::AbsorbDamage,
        Self::ModifyDamageTaken,
        Self::SetDamageTaken,
        Self::Attack,
        Self::AbsorbToHeal,
        Self::Revive,
        Self::RemoveSelf,
        Self::ModifyStatTemp,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Damage => "damage",
            Self::Heal => "heal",
            Self::ApplyBuff => "applyBuff",
            Self::SkipTurn => "skipTurn",
            Self::ModifyAp => "modifyAP",
            Self::AbsorbDamage => "absorbDamage",
            Self::ModifyDamageTaken => "modifyDamageTaken",
            Self::SetDamageTaken => "setDamageTaken",
            Self::Attack => "attack",
            Self::AbsorbToHeal => "absorbToHeal",
            Self::Revive => "revive",
            Self::RemoveSelf => "removeSelf",
            Self::ModifyStatTemp => "modifyStatTemp",
        }
    }

    /// Whose stats the action touches when the effect names no target.
    const fn default_target(self) -> EffectTarget {
        match self {
            Self::Attack => EffectTarget::Attacker,
            _ => EffectTarget::Owner,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = BuffFault;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REMOVE_SELF" => return Ok(Self::RemoveSelf),
            "MODIFY_STAT_TEMP" => return Ok(Self::ModifyStatTemp),
            _ => {}
        }
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| BuffFault::UnsupportedAction(s.to_string()))
    }
}

/// Everything an action may read or write while it runs.
pub struct EffectCtx<'a> {
    pub roster: &'a mut Roster,
    pub context: &'a mut CombatContext,
    pub bus: &'a EventBus,
    pub owner_id: &'a str,
    pub buff_id: &'a str,
    pub instance_id: &'a str,
    pub stacks: u32,
}

impl EffectCtx<'_> {
    fn target_id(&self, kind: ActionKind, effect: &BuffEffect) -> Result<String, BuffFault> {
        match effect.target.unwrap_or(kind.default_target()) {
            EffectTarget::Owner => Ok(self.owner_id.to_string()),
            EffectTarget::Attacker => self
                .context
                .attacker_id
                .clone()
                .ok_or_else(|| BuffFault::MissingTarget("attacker".into())),
            EffectTarget::Target => self
                .context
                .target_id
                .clone()
                .ok_or_else(|| BuffFault::MissingTarget("target".into())),
        }
    }

    fn scope(&self, target_id: &str) -> FormulaScope {
        FormulaScope {
            damage_dealt: self.context.damage_dealt,
            damage_taken: self.context.damage_taken,
            raw_damage: self.context.raw_damage,
            stacks: f64::from(self.stacks),
            owner: self
                .roster
                .get(self.owner_id)
                .map(|entity| entity.stat_values())
                .unwrap_or_default(),
            target: self.roster.get(target_id).map(|entity| entity.stat_values()),
        }
    }

    fn number(&self, value: Option<&EffectValue>, target_id: &str) -> Result<f64, BuffFault> {
        match value {
            None => Err(BuffFault::MissingParameter("value")),
            Some(EffectValue::Number(n)) => Ok(*n),
            Some(EffectValue::Text(text)) => {
                if let Ok(n) = text.trim().parse::<f64>() {
                    return Ok(n);
                }
                let formula = Formula::parse(text).map_err(|message| BuffFault::Formula {
                    formula: text.clone(),
                    message,
                })?;
                Ok(formula.eval(&self.scope(target_id)))
            }
        }
    }

    fn log(&self, text: String) {
        self.bus.emit(BattleEvent::log(text));
    }
}

impl ActionKind {
    /// Runs the action for one effect of one buff instance.
    pub fn apply(self, ctx: &mut EffectCtx<'_>, effect: &BuffEffect) -> Result<(), BuffFault> {
        match self {
            Self::Damage => {
                let target_id = ctx.target_id(self, effect)?;
                let amount = ctx.number(effect.value.as_ref(), &target_id)?;
                if amount <= 0.0 {
                    return Ok(());
                }
                let entity = ctx
                    .roster
                    .get_mut(&target_id)
                    .ok_or_else(|| BuffFault::MissingTarget(target_id.clone()))?;
                let dealt = entity.damage(amount);
                ctx.log(format!("[Buff] {} dealt {dealt} damage to {target_id}", ctx.buff_id));
            }
            Self::Heal => {
                let target_id = ctx.target_id(self, effect)?;
                let amount = ctx.number(effect.value.as_ref(), &target_id)?;
                if amount <= 0.0 {
                    return Ok(());
                }
                let entity = ctx
                    .roster
                    .get_mut(&target_id)
                    .ok_or_else(|| BuffFault::MissingTarget(target_id.clone()))?;
                let healed = entity.heal(amount);
                ctx.log(format!("[Buff] {} healed {healed} HP for {target_id}", ctx.buff_id));
            }
            Self::ApplyBuff => {
                let target_id = ctx.target_id(self, effect)?;
                let Some(EffectValue::Text(buff_id)) = effect.value.as_ref() else {
                    return Err(BuffFault::MissingParameter("value"));
                };
                let entity = ctx
                    .roster
                    .get_mut(&target_id)
                    .ok_or_else(|| BuffFault::MissingTarget(target_id.clone()))?;
                if !entity.buffs.registry().contains(buff_id) {
                    return Err(BuffFault::UnknownBuff(buff_id.clone()));
                }
                entity.buffs.add(buff_id, AddOptions::default());
            }
            Self::SkipTurn => ctx.context.skip_turn = true,
            Self::ModifyAp => {
                let target_id = ctx.target_id(self, effect)?;
                let amount = ctx.number(effect.value.as_ref(), &target_id)?;
                if amount == 0.0 {
                    return Ok(());
                }
                let entity = ctx
                    .roster
                    .get_mut(&target_id)
                    .ok_or_else(|| BuffFault::MissingTarget(target_id.clone()))?;
                entity.stats.ap = (entity.stats.ap + amount).max(0.0);
            }
            Self::AbsorbDamage => {
                let amount = ctx.number(effect.value.as_ref(), ctx.owner_id)?;
                if amount > 0.0 {
                    ctx.context.shield_pool += amount;
                }
            }
            Self::ModifyDamageTaken => {
                let mult = ctx.number(effect.value.as_ref(), ctx.owner_id)?;
                if mult > 0.0 {
                    ctx.context.damage_taken_mult *= mult;
                }
            }
            Self::SetDamageTaken => {
                let amount = ctx.number(effect.value.as_ref(), ctx.owner_id)?;
                ctx.context.damage_taken_override = Some(amount.max(0.0));
            }
            Self::Attack => {
                let target_id = ctx.target_id(self, effect)?;
                let amount = ctx.number(effect.value.as_ref(), &target_id)?;
                if amount > 0.0 && target_id != ctx.owner_id {
                    ctx.context.counter_hits.push(CounterHit {
                        attacker_id: ctx.owner_id.to_string(),
                        target_id,
                        amount,
                        source_buff: ctx.buff_id.to_string(),
                    });
                }
            }
            Self::AbsorbToHeal => {
                let ratio = match effect.value.as_ref() {
                    None => 1.0,
                    value => ctx.number(value, ctx.owner_id)?,
                };
                if ratio > 0.0 {
                    ctx.context.heal_ratio = Some(ratio);
                }
            }
            Self::Revive => {
                let owner_id = ctx.owner_id;
                let amount = match effect.value.as_ref() {
                    None => None,
                    value => Some(ctx.number(value, owner_id)?),
                };
                let entity = ctx
                    .roster
                    .get_mut(owner_id)
                    .ok_or_else(|| BuffFault::MissingTarget(owner_id.to_string()))?;
                if entity.is_alive() {
                    return Ok(());
                }
                let restored = amount.unwrap_or(entity.stats.max_hp).clamp(1.0, entity.stats.max_hp.max(1.0));
                entity.stats.hp = restored;
                ctx.context.revived = true;
                ctx.log(format!("[Buff] {} revived {owner_id} with {restored} HP", ctx.buff_id));
            }
            Self::RemoveSelf => {
                let owner_id = ctx.owner_id;
                let instance_id = ctx.instance_id;
                if let Some(entity) = ctx.roster.get_mut(owner_id) {
                    entity.buffs.remove_instance(instance_id, "consume");
                }
            }
            Self::ModifyStatTemp => {
                let params = effect
                    .params
                    .as_ref()
                    .ok_or(BuffFault::MissingParameter("params"))?;
                let stat = params
                    .stat
                    .as_deref()
                    .ok_or(BuffFault::MissingParameter("params.stat"))?;
                let value = match params.value.as_ref() {
                    None => 0.0,
                    value => ctx.number(value, ctx.owner_id)?,
                };
                ctx.context.push_temp_modifier(
                    stat,
                    TempModifier {
                        value,
                        kind: params.kind.unwrap_or(ModifierKind::Flat),
                    },
                );
            }
        }
        Ok(())
    }
}
