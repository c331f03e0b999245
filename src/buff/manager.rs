use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buff::instance::{AddOptions, BuffInstance};
use crate::buff::registry::{BuffRegistry, StackStrategy, Trigger};
use crate::buff::stacking::{ModifierContribution, ModifierKind, ModifierStacking};
use crate::events::{BattleEvent, EventBus};

/// Persisted form of one active buff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffRecord {
    pub id: String,
    pub remaining: i32,
    pub stacks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub instance_id: String,
    pub stacks: u32,
    pub remaining: i32,
    pub refreshed: bool,
}

/// Active buffs of one entity. Owns stacking, expiry and the aggregated
/// stat-modifier cache.
#[derive(Debug, Clone)]
pub struct BuffManager {
    owner_id: String,
    registry: Rc<BuffRegistry>,
    bus: EventBus,
    buffs: Vec<BuffInstance>,
    next_instance: u32,
    modifiers: RefCell<Option<ModifierStacking<String>>>,
}

impl BuffManager {
    pub fn new(owner_id: impl Into<String>, registry: Rc<BuffRegistry>, bus: EventBus) -> Self {
        Self {
            owner_id: owner_id.into(),
            registry,
            bus,
            buffs: Vec::new(),
            next_instance: 1,
            modifiers: RefCell::new(None),
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn registry(&self) -> &Rc<BuffRegistry> {
        &self.registry
    }

    pub fn instances(&self) -> &[BuffInstance] {
        &self.buffs
    }

    pub fn len(&self) -> usize {
        self.buffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffs.is_empty()
    }

    pub fn has(&self, buff_id: &str) -> bool {
        self.buffs.iter().any(|buff| buff.id == buff_id)
    }

    /// Total stacks across every instance of `buff_id`.
    pub fn stacks(&self, buff_id: &str) -> u32 {
        self.buffs
            .iter()
            .filter(|buff| buff.id == buff_id)
            .map(|buff| buff.stacks)
            .sum()
    }

    pub fn instance(&self, instance_id: &str) -> Option<&BuffInstance> {
        self.buffs.iter().find(|buff| buff.instance_id == instance_id)
    }

    fn invalidate(&self) {
        self.modifiers.replace(None);
    }

    /// Applies `buff_id`. Unknown definitions are reported with `BUFF_WARN`
    /// and yield `None`.
    pub fn add(&mut self, buff_id: &str, options: AddOptions) -> Option<AddOutcome> {
        let Some(definition) = self.registry.definition(buff_id) else {
            warn!(owner = %self.owner_id, buff = buff_id, "buff definition not found");
            self.bus.emit(BattleEvent::BuffWarn {
                owner_id: self.owner_id.clone(),
                buff_id: buff_id.to_string(),
                reason: "definition_not_found".into(),
            });
            return None;
        };

        let existing = self
            .buffs
            .iter()
            .rposition(|buff| buff.id == buff_id)
            .filter(|&i| options.strategy.unwrap_or(self.buffs[i].strategy) != StackStrategy::Independent);
        let outcome = if let Some(index) = existing {
            let buff = &mut self.buffs[index];
            let strategy = options.strategy.unwrap_or(buff.strategy);
            buff.restack(strategy, &options);
            AddOutcome {
                instance_id: buff.instance_id.clone(),
                stacks: buff.stacks,
                remaining: buff.remaining,
                refreshed: true,
            }
        } else {
            let instance_id = format!("{buff_id}#{}", self.next_instance);
            self.next_instance += 1;
            let buff = BuffInstance::new(definition, instance_id, &options);
            let outcome = AddOutcome {
                instance_id: buff.instance_id.clone(),
                stacks: buff.stacks,
                remaining: buff.remaining,
                refreshed: false,
            };
            self.buffs.push(buff);
            outcome
        };
        self.invalidate();

        debug!(owner = %self.owner_id, buff = buff_id, stacks = outcome.stacks, remaining = outcome.remaining, "buff added");
        self.bus.emit(BattleEvent::BuffAdded {
            owner_id: self.owner_id.clone(),
            buff_id: buff_id.to_string(),
            stacks: outcome.stacks,
            remaining: outcome.remaining,
            refreshed: outcome.refreshed,
        });
        Some(outcome)
    }

    fn remove_where<F>(&mut self, reason: &str, predicate: F) -> Vec<String>
    where
        F: Fn(&BuffInstance) -> bool,
    {
        let mut removed = Vec::new();
        self.buffs.retain(|buff| {
            if predicate(buff) {
                removed.push(buff.id.clone());
                false
            } else {
                true
            }
        });
        if !removed.is_empty() {
            self.invalidate();
        }
        for buff_id in &removed {
            debug!(owner = %self.owner_id, buff = %buff_id, reason, "buff removed");
            self.bus.emit(BattleEvent::BuffRemoved {
                owner_id: self.owner_id.clone(),
                buff_id: buff_id.clone(),
                reason: reason.to_string(),
            });
        }
        removed
    }

    /// Removes every instance of `buff_id`.
    pub fn remove(&mut self, buff_id: &str, reason: &str) -> bool {
        !self.remove_where(reason, |buff| buff.id == buff_id).is_empty()
    }

    pub fn remove_instance(&mut self, instance_id: &str, reason: &str) -> bool {
        !self
            .remove_where(reason, |buff| buff.instance_id == instance_id)
            .is_empty()
    }

    pub fn remove_by_tag(&mut self, tag: &str, reason: &str) -> usize {
        self.remove_where(reason, |buff| buff.tags.iter().any(|t| t == tag))
            .len()
    }

    pub fn remove_by_kind(&mut self, kind: &str, reason: &str) -> usize {
        self.remove_where(reason, |buff| buff.definition.kind.as_deref() == Some(kind))
            .len()
    }

    /// Counts one firing of `trigger` on an instance.
    pub fn record_trigger(&mut self, instance_id: &str, trigger: Trigger) {
        if let Some(buff) = self.buffs.iter_mut().find(|buff| buff.instance_id == instance_id) {
            buff.record_trigger(trigger);
        }
    }

    /// Decrements every non-permanent buff and drops the ones that ran out.
    /// Returns the removed buff ids.
    pub fn tick_turn(&mut self) -> Vec<String> {
        for buff in &mut self.buffs {
            buff.tick();
        }
        self.remove_where("expired", BuffInstance::is_expired)
    }

    /// `overwrite` if any buff sets one, else `(base + Σflat) * (1 + Σpercent)`.
    pub fn effective_stat(&self, stat: &str, base: f64) -> f64 {
        let mut cache = self.modifiers.borrow_mut();
        let stacking = cache.get_or_insert_with(|| {
            let mut stacking = ModifierStacking::new();
            for buff in &self.buffs {
                let stacks = f64::from(buff.stacks);
                for (key, modifier) in &buff.definition.stat_modifiers {
                    stacking.add(ModifierContribution {
                        key: key.clone(),
                        kind: modifier.kind,
                        value: match modifier.kind {
                            ModifierKind::Overwrite => modifier.value,
                            _ => modifier.value * stacks,
                        },
                    });
                }
            }
            stacking
        });
        stacking.effective(stat, base)
    }

    pub fn to_records(&self) -> Vec<BuffRecord> {
        self.buffs
            .iter()
            .map(|buff| BuffRecord {
                id: buff.id.clone(),
                remaining: buff.remaining,
                stacks: buff.stacks,
            })
            .collect()
    }

    /// Replaces the active set from persisted records. Records naming
    /// unknown definitions are skipped.
    pub fn from_records(&mut self, records: &[BuffRecord]) {
        self.buffs.clear();
        for record in records {
            let Some(definition) = self.registry.definition(&record.id) else {
                continue;
            };
            let instance_id = format!("{}#{}", record.id, self.next_instance);
            self.next_instance += 1;
            let mut buff = BuffInstance::new(definition, instance_id, &AddOptions::stacks(record.stacks));
            buff.remaining = record.remaining;
            self.buffs.push(buff);
        }
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::registry::BuffDefinition;
    use crate::events::{EventRecorder, Topic};

    fn registry() -> Rc<BuffRegistry> {
        let yaml = r#"
- id: guard
  lifecycle: { duration: 2, stackStrategy: refresh }
  statModifiers: { damageTakenMult: { type: flat, value: -0.5 } }
- id: rage
  tags: [fury]
  lifecycle: { duration: 3, maxStacks: 3, stackStrategy: add }
  statModifiers: { attack: { type: percent, value: 0.1 } }
- id: stone
  type: debuff
  lifecycle: { duration: -1 }
  statModifiers: { speed: { type: overwrite, value: 1 } }
- id: spark
  lifecycle: { duration: 1, stackStrategy: independent, maxStacks: 9 }
"#;
        let defs: Vec<BuffDefinition> = serde_yaml::from_str(yaml).unwrap();
        Rc::new(BuffRegistry::from_definitions(defs))
    }

    #[test]
    fn refresh_keeps_stacks_and_resets_remaining() {
        let mut manager = BuffManager::new("hero", registry(), EventBus::new());
        manager.add("guard", AddOptions::default()).unwrap();
        manager.tick_turn();
        assert_eq!(manager.instances()[0].remaining, 1);

        let outcome = manager.add("guard", AddOptions::default()).unwrap();
        assert!(outcome.refreshed);
        assert_eq!(outcome.stacks, 1);
        assert_eq!(outcome.remaining, 2);
    }

    #[test]
    fn add_strategy_clamps_at_max_stacks() {
        let mut manager = BuffManager::new("hero", registry(), EventBus::new());
        for _ in 0..5 {
            manager.add("rage", AddOptions::default());
        }
        assert_eq!(manager.stacks("rage"), 3);
        assert!((manager.effective_stat("attack", 100.0) - 130.0).abs() < 1e-9);
    }

    #[test]
    fn modifier_cache_tracks_add_and_remove() {
        let mut manager = BuffManager::new("hero", registry(), EventBus::new());
        assert_eq!(manager.effective_stat("speed", 10.0), 10.0);
        manager.add("stone", AddOptions::default());
        assert_eq!(manager.effective_stat("speed", 10.0), 1.0);
        assert_eq!(manager.remove_by_kind("debuff", "cleanse"), 1);
        assert_eq!(manager.effective_stat("speed", 10.0), 10.0);
    }

    #[test]
    fn tick_turn_returns_expired_ids_and_spares_permanent() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        let mut manager = BuffManager::new("hero", registry(), bus);
        manager.add("guard", AddOptions::default());
        manager.add("stone", AddOptions::default());

        assert!(manager.tick_turn().is_empty());
        assert_eq!(manager.tick_turn(), vec!["guard".to_string()]);
        assert!(manager.has("stone"));
        assert_eq!(recorder.count(Topic::BuffRemoved), 1);
    }

    #[test]
    fn independent_strategy_keeps_parallel_instances() {
        let mut manager = BuffManager::new("hero", registry(), EventBus::new());
        manager.add("spark", AddOptions::default());
        manager.add("spark", AddOptions::default());
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.stacks("spark"), 2);
        assert!(manager.remove("spark", "manual"));
        assert!(manager.is_empty());
    }

    #[test]
    fn unknown_buff_warns() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        let mut manager = BuffManager::new("hero", registry(), bus);
        assert!(manager.add("ghost", AddOptions::default()).is_none());
        assert_eq!(recorder.count(Topic::BuffWarn), 1);
    }

    #[test]
    fn records_restore_active_set() {
        let mut manager = BuffManager::new("hero", registry(), EventBus::new());
        manager.from_records(&[
            BuffRecord { id: "rage".into(), remaining: 1, stacks: 2 },
            BuffRecord { id: "ghost".into(), remaining: 1, stacks: 1 },
        ]);
        assert_eq!(
            manager.to_records(),
            vec![BuffRecord { id: "rage".into(), remaining: 1, stacks: 2 }]
        );
        assert_eq!(manager.remove_by_tag("fury", "cleanse"), 1);
    }
}
