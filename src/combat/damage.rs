//! Per-action resolution pipeline.
//!
//! Order is fixed: action-pre, attack-pre, weakness, armor, take-damage-pre
//! (buff stat modifiers folded in first), shield, HP, attack-post,
//! take-damage, defend-post, counter hits, on-hit buffs, death checks.

use serde::Serialize;
use tracing::{debug, info};

use crate::buff::{trigger_for, AddOptions, BuffSystem};
use crate::combat::context::CombatContext;
use crate::combat::entity::{BodyPart, Roster};
use crate::data::{BuffRefTarget, SkillConfig, SkillKind};
use crate::events::{BattleEvent, EventBus, Topic};
use crate::planning::PlannedAction;

/// Temp-modifier key scaling how much damage a part's armor soaks.
pub const ARMOR_MITIGATION_MULT: &str = "armorMitigationMult";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArmorHit {
    pub absorbed: f64,
    pub overflow: f64,
    pub broke: bool,
}

/// Soaks `amount` into the part's armor. Armor can absorb up to
/// `armor * armor_mult`; the rest overflows to HP. A part whose armor
/// reaches zero on this hit is marked broken.
pub fn absorb_armor(part: &mut BodyPart, amount: f64, armor_mult: f64) -> ArmorHit {
    let armor = part.current_armor();
    if amount <= 0.0 || armor <= 0.0 || armor_mult <= 0.0 || !armor_mult.is_finite() {
        return ArmorHit {
            absorbed: 0.0,
            overflow: amount.max(0.0),
            broke: false,
        };
    }

    let capacity = armor * armor_mult;
    if amount < capacity {
        part.armor = Some(armor - amount / armor_mult);
        return ArmorHit {
            absorbed: amount,
            overflow: 0.0,
            broke: false,
        };
    }

    part.armor = Some(0.0);
    part.broken = true;
    ArmorHit {
        absorbed: capacity,
        overflow: amount - capacity,
        broke: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Alive,
    Revived,
    Defeated,
}

/// What one resolved timeline entry did. Serialized as the entry result
/// and flattened into report rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub actor_id: String,
    pub skill_id: String,
    pub kind: SkillKind,
    pub target_id: String,
    pub body_part: String,
    pub raw_damage: f64,
    pub armor_absorbed: f64,
    pub shield_absorbed: f64,
    pub damage_dealt: f64,
    pub healed: f64,
    pub counter_damage: f64,
    pub part_broken: bool,
    pub target_hp: f64,
    pub target_defeated: bool,
    pub revived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl ActionOutcome {
    fn new(action: &PlannedAction, skill: &SkillConfig) -> Self {
        Self {
            actor_id: action.source_id.clone(),
            skill_id: skill.id.clone(),
            kind: skill.kind,
            target_id: action.target_id.clone(),
            body_part: action.body_part.clone(),
            ..Self::default()
        }
    }

    fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skipped = Some(reason.into());
        self
    }
}

/// Borrowed view of battle state for resolving actions within one turn.
pub struct DamagePipeline<'a> {
    roster: &'a mut Roster,
    buffs: &'a BuffSystem,
    bus: &'a EventBus,
    turn: u32,
}

impl<'a> DamagePipeline<'a> {
    pub fn new(roster: &'a mut Roster, buffs: &'a BuffSystem, bus: &'a EventBus, turn: u32) -> Self {
        Self {
            roster,
            buffs,
            bus,
            turn,
        }
    }

    /// Runs buff triggers for `topic`, then broadcasts the context.
    pub fn dispatch(&mut self, topic: Topic, context: &mut CombatContext) {
        if let Some(trigger) = trigger_for(topic) {
            match topic {
                Topic::TurnStart | Topic::TurnEnd => self.buffs.dispatch_all(trigger, self.roster, context),
                _ => self.buffs.dispatch_participants(trigger, self.roster, context),
            }
        }
        self.bus.emit(BattleEvent::Combat {
            topic,
            context: context.clone(),
        });
    }

    fn log(&self, text: String) {
        self.bus.emit(BattleEvent::log(text));
    }

    fn name_of(&self, id: &str) -> String {
        self.roster
            .get(id)
            .map(|entity| if entity.name.is_empty() { entity.id.clone() } else { entity.name.clone() })
            .unwrap_or_else(|| id.to_string())
    }

    pub fn resolve(&mut self, action: &PlannedAction, skill: &SkillConfig) -> ActionOutcome {
        let outcome = ActionOutcome::new(action, skill);
        if !self.roster.get(&action.source_id).is_some_and(|e| e.is_alive()) {
            return outcome.skip("actor defeated");
        }

        let mut context = CombatContext::action(
            self.turn,
            &action.source_id,
            &action.target_id,
            &skill.id,
            &action.body_part,
        );
        self.dispatch(Topic::BattleActionPre, &mut context);
        if context.skip_turn {
            self.log(format!("{} loses the action ({})", self.name_of(&action.source_id), skill.label()));
            return outcome.skip("skip_turn");
        }

        let target_was_alive = self.roster.get(&action.target_id).is_some_and(|e| e.is_alive());
        let mut outcome = match skill.kind {
            SkillKind::Damage => self.strike(context, skill, outcome),
            SkillKind::Heal => self.mend(skill, outcome),
            SkillKind::Buff => outcome,
        };
        if outcome.skipped.is_some() {
            return outcome;
        }

        self.apply_buff_refs(action, skill);

        if target_was_alive {
            match self.death_check(&action.target_id) {
                Fate::Defeated => outcome.target_defeated = true,
                Fate::Revived => outcome.revived = true,
                Fate::Alive => {}
            }
        }
        if let Some(target) = self.roster.get(&action.target_id) {
            outcome.target_hp = target.stats.hp;
        }
        outcome
    }

    fn mend(&mut self, skill: &SkillConfig, mut outcome: ActionOutcome) -> ActionOutcome {
        let Some(target) = self.roster.get_mut(&outcome.target_id) else {
            return outcome.skip("unknown target");
        };
        if !target.is_alive() {
            return outcome.skip("target defeated");
        }
        outcome.healed = target.heal(skill.value);
        outcome.target_hp = target.stats.hp;
        self.log(format!(
            "{} uses {} and restores {} HP to {}",
            self.name_of(&outcome.actor_id),
            skill.label(),
            outcome.healed,
            self.name_of(&outcome.target_id)
        ));
        outcome
    }

    fn strike(&mut self, mut context: CombatContext, skill: &SkillConfig, mut outcome: ActionOutcome) -> ActionOutcome {
        if !self.roster.get(&outcome.target_id).is_some_and(|e| e.is_alive()) {
            return outcome.skip("target defeated");
        }

        context.raw_damage = skill.value;
        self.dispatch(Topic::BattleAttackPre, &mut context);

        let armor_mult = context.temp_stat(ARMOR_MITIGATION_MULT, 1.0);
        let mut amount = context.raw_damage;
        outcome.raw_damage = amount;
        if let Some(part) = self
            .roster
            .get_mut(&outcome.target_id)
            .and_then(|target| target.body_parts.get_mut(&outcome.body_part))
        {
            amount *= part.weakness;
            let hit = absorb_armor(part, amount, armor_mult);
            context.armor_absorbed = hit.absorbed;
            outcome.part_broken = hit.broke;
            amount = hit.overflow;
        }
        outcome.armor_absorbed = context.armor_absorbed;
        if outcome.part_broken {
            self.log(format!("{}'s {} armor is broken", self.name_of(&outcome.target_id), outcome.body_part));
        }

        self.buffs.apply_stat_modifiers(self.roster, &mut context);
        context.damage_taken = amount;
        self.dispatch(Topic::BattleTakeDamagePre, &mut context);

        amount *= (1.0 + context.damage_dealt_mult) * context.damage_taken_mult;
        if let Some(fixed) = context.damage_taken_override {
            amount = fixed;
        }
        amount = if amount.is_finite() { amount.max(0.0) } else { 0.0 };

        if context.shield_pool > 0.0 {
            let absorbed = context.shield_pool.min(amount);
            context.shield_pool -= absorbed;
            context.shield_absorbed = absorbed;
            amount -= absorbed;
        }
        outcome.shield_absorbed = context.shield_absorbed;
        context.damage_taken = amount;

        if let Some(target) = self.roster.get_mut(&outcome.target_id) {
            match context.heal_ratio {
                Some(ratio) => {
                    outcome.healed = target.heal(amount * ratio);
                    context.damage_dealt = 0.0;
                }
                None => context.damage_dealt = target.damage(amount),
            }
        }
        outcome.damage_dealt = context.damage_dealt;
        debug!(
            turn = self.turn,
            attacker = %outcome.actor_id,
            target = %outcome.target_id,
            part = %outcome.body_part,
            raw = context.raw_damage,
            armor = outcome.armor_absorbed,
            shield = outcome.shield_absorbed,
            dealt = outcome.damage_dealt,
            "damage resolved"
        );
        self.log(format!(
            "{} uses {} on {} ({}) for {} damage",
            self.name_of(&outcome.actor_id),
            skill.label(),
            self.name_of(&outcome.target_id),
            outcome.body_part,
            outcome.damage_dealt
        ));

        self.dispatch(Topic::BattleAttackPost, &mut context);
        self.dispatch(Topic::BattleTakeDamage, &mut context);
        self.dispatch(Topic::BattleDefendPost, &mut context);

        outcome.counter_damage = self.resolve_counters(&mut context);
        outcome
    }

    /// Applies counter hits queued by buffs as plain HP damage.
    fn resolve_counters(&mut self, context: &mut CombatContext) -> f64 {
        let mut total = 0.0;
        for hit in std::mem::take(&mut context.counter_hits) {
            if !self.roster.get(&hit.attacker_id).is_some_and(|e| e.is_alive()) {
                continue;
            }
            let Some(target) = self.roster.get_mut(&hit.target_id) else {
                continue;
            };
            if !target.is_alive() {
                continue;
            }
            let dealt = target.damage(hit.amount);
            total += dealt;
            self.log(format!(
                "{} counters {} for {dealt} damage ({})",
                self.name_of(&hit.attacker_id),
                self.name_of(&hit.target_id),
                hit.source_buff
            ));
            if dealt > 0.0 {
                self.death_check(&hit.target_id);
            }
        }
        total
    }

    fn apply_buff_refs(&mut self, action: &PlannedAction, skill: &SkillConfig) {
        for buff_ref in &skill.buff_refs {
            let recipient = match buff_ref.target {
                BuffRefTarget::Caster => &action.source_id,
                BuffRefTarget::Target => &action.target_id,
            };
            if let Some(entity) = self.roster.get_mut(recipient).filter(|e| e.is_alive()) {
                entity.buffs.add(&buff_ref.buff_id, AddOptions::stacks(buff_ref.stacks));
            }
        }
    }

    /// Runs on-death effects for an entity at zero HP.
    pub fn death_check(&mut self, entity_id: &str) -> Fate {
        if self.roster.get(entity_id).map_or(true, |e| e.is_alive()) {
            return Fate::Alive;
        }
        let mut context = CombatContext::targeting(self.turn, entity_id);
        self.dispatch(Topic::BattleDeathCheck, &mut context);
        if self.roster.get(entity_id).is_some_and(|e| e.is_alive()) {
            info!(turn = self.turn, entity = entity_id, "entity revived");
            return Fate::Revived;
        }
        info!(turn = self.turn, entity = entity_id, "entity defeated");
        self.log(format!("{} is defeated", self.name_of(entity_id)));
        Fate::Defeated
    }
}
