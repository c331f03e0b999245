//! Trigger dispatcher: runs buff effects at combat lifecycle points.

use std::rc::Rc;

use tracing::{trace, warn};

use crate::buff::actions::{ActionKind, EffectCtx};
use crate::buff::registry::{BuffDefinition, Trigger};
use crate::combat::{CombatContext, Roster};
use crate::events::{BattleEvent, EventBus, Topic};

/// Which buff trigger fires for a pipeline topic.
pub fn trigger_for(topic: Topic) -> Option<Trigger> {
    match topic {
        Topic::TurnStart => Some(Trigger::OnTurnStart),
        Topic::TurnEnd => Some(Trigger::OnTurnEnd),
        Topic::BattleActionPre => Some(Trigger::OnActionPre),
        Topic::BattleAttackPre => Some(Trigger::OnAttackPre),
        Topic::BattleAttackPost => Some(Trigger::OnAttackPost),
        Topic::BattleTakeDamagePre => Some(Trigger::OnTakeDamagePre),
        Topic::BattleTakeDamage => Some(Trigger::OnTakeDamage),
        Topic::BattleDefendPost => Some(Trigger::OnDefendPost),
        Topic::BattleDeathCheck => Some(Trigger::OnDeath),
        _ => None,
    }
}

struct Firing {
    instance_id: String,
    buff_id: String,
    stacks: u32,
    definition: Rc<BuffDefinition>,
}

#[derive(Debug, Clone)]
pub struct BuffSystem {
    bus: EventBus,
}

impl BuffSystem {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Turn-level triggers reach every entity.
    pub fn dispatch_all(&self, trigger: Trigger, roster: &mut Roster, context: &mut CombatContext) {
        for owner_id in roster.ids() {
            self.process(&owner_id, trigger, roster, context);
        }
    }

    /// Pipeline triggers reach only the attacker and the target.
    pub fn dispatch_participants(&self, trigger: Trigger, roster: &mut Roster, context: &mut CombatContext) {
        let mut owners: Vec<String> = Vec::with_capacity(2);
        for id in [context.attacker_id.clone(), context.target_id.clone()].into_iter().flatten() {
            if !owners.contains(&id) {
                owners.push(id);
            }
        }
        for owner_id in owners {
            self.process(&owner_id, trigger, roster, context);
        }
    }

    /// Folds attacker `damageDealtMult` and target `damageTakenMult` stat
    /// modifiers into the context ahead of take-damage-pre effects.
    pub fn apply_stat_modifiers(&self, roster: &Roster, context: &mut CombatContext) {
        if let Some(attacker) = context.attacker_id.as_deref().and_then(|id| roster.get(id)) {
            let dealt = attacker.buffs.effective_stat("damageDealtMult", 0.0);
            if dealt.is_finite() && dealt != 0.0 {
                context.damage_dealt_mult += dealt;
            }
        }
        if let Some(target) = context.target_id.as_deref().and_then(|id| roster.get(id)) {
            let taken = target.buffs.effective_stat("damageTakenMult", 0.0);
            if taken.is_finite() && taken != 0.0 {
                context.damage_taken_mult *= 1.0 + taken;
            }
        }
    }

    /// Ticks every manager; returns `(owner, buff)` pairs that expired.
    pub fn tick_all(&self, roster: &mut Roster) -> Vec<(String, String)> {
        let mut expired = Vec::new();
        for entity in roster.iter_mut() {
            for buff_id in entity.buffs.tick_turn() {
                expired.push((entity.id.clone(), buff_id));
            }
        }
        expired
    }

    fn process(&self, owner_id: &str, trigger: Trigger, roster: &mut Roster, context: &mut CombatContext) {
        // Snapshot so effects may add or remove buffs mid-dispatch.
        let firings: Vec<Firing> = match roster.get(owner_id) {
            Some(entity) => entity
                .buffs
                .instances()
                .iter()
                .filter(|buff| buff.definition.effects.iter().any(|e| e.trigger == trigger))
                .map(|buff| Firing {
                    instance_id: buff.instance_id.clone(),
                    buff_id: buff.id.clone(),
                    stacks: buff.stacks,
                    definition: Rc::clone(&buff.definition),
                })
                .collect(),
            None => return,
        };

        for firing in firings {
            for effect in firing.definition.effects.iter().filter(|e| e.trigger == trigger) {
                let kind = match effect.action.parse::<ActionKind>() {
                    Ok(kind) => kind,
                    Err(fault) => {
                        warn!(owner = owner_id, buff = %firing.buff_id, action = %effect.action, "unsupported buff action");
                        self.bus.emit(BattleEvent::BuffWarn {
                            owner_id: owner_id.to_string(),
                            buff_id: firing.buff_id.clone(),
                            reason: fault.to_string(),
                        });
                        continue;
                    }
                };

                if let Some(entity) = roster.get_mut(owner_id) {
                    entity.buffs.record_trigger(&firing.instance_id, trigger);
                }
                trace!(owner = owner_id, buff = %firing.buff_id, trigger = trigger.as_str(), action = %kind, "buff effect");

                let mut ctx = EffectCtx {
                    roster: &mut *roster,
                    context: &mut *context,
                    bus: &self.bus,
                    owner_id,
                    buff_id: &firing.buff_id,
                    instance_id: &firing.instance_id,
                    stacks: firing.stacks,
                };
                if let Err(fault) = kind.apply(&mut ctx, effect) {
                    if fault.is_warning() {
                        warn!(owner = owner_id, buff = %firing.buff_id, %fault, "buff effect skipped");
                        self.bus.emit(BattleEvent::BuffWarn {
                            owner_id: owner_id.to_string(),
                            buff_id: firing.buff_id.clone(),
                            reason: fault.to_string(),
                        });
                    } else {
                        warn!(owner = owner_id, buff = %firing.buff_id, %fault, "buff effect failed");
                        self.bus.emit(BattleEvent::BuffError {
                            owner_id: owner_id.to_string(),
                            buff_id: firing.buff_id.clone(),
                            trigger: trigger.as_str().to_string(),
                            action: effect.action.clone(),
                            error: fault.to_string(),
                        });
                    }
                }
            }
        }
    }
}
