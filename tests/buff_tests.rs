use std::collections::BTreeMap;
use std::rc::Rc;

use turnforge::buff::{AddOptions, BuffDefinition, BuffManager, BuffRegistry, BuffSystem, Trigger};
use turnforge::combat::{BodyPart, CombatContext, DamagePipeline, Entity, Roster, Stats};
use turnforge::data::SkillConfig;
use turnforge::events::{EventBus, EventRecorder, Topic};
use turnforge::planning::{PlannedAction, Side};

const BUFFS: &str = r#"
- id: barrier
  effects:
    - { trigger: onTakeDamagePre, action: absorbDamage, value: 15 }
- id: brittle
  lifecycle: { duration: 2 }
  effects:
    - { trigger: onTakeDamagePre, action: modifyDamageTaken, value: 1.5 }
- id: stoneskin
  effects:
    - { trigger: onTakeDamagePre, action: setDamageTaken, value: 1 }
- id: leech
  effects:
    - { trigger: onTakeDamagePre, action: absorbToHeal }
- id: thorns
  effects:
    - { trigger: onDefendPost, action: attack, target: attacker, value: 4 }
- id: phoenix
  effects:
    - { trigger: onDeath, action: revive, value: 25 }
    - { trigger: onDeath, action: removeSelf }
- id: crusher
  effects:
    - trigger: onAttackPre
      action: modifyStatTemp
      params: { stat: armorMitigationMult, value: 0.5, type: overwrite }
- id: poison
  lifecycle: { duration: 3, maxStacks: 5, stackStrategy: add }
  effects:
    - { trigger: onTurnEnd, action: damage, target: self, value: "stacks * 2" }
- id: regen
  lifecycle: { duration: -1 }
  effects:
    - { trigger: onTurnStart, action: heal, value: 10 }
- id: weird
  effects:
    - { trigger: onTakeDamagePre, action: teleport }
    - { trigger: onTakeDamagePre, action: absorbDamage, value: 5 }
- id: cursed
  effects:
    - { trigger: onTakeDamagePre, action: absorbDamage, value: "banana + 1" }
- id: exposed
  statModifiers:
    damageTakenMult: { type: flat, value: 0.5 }
"#;

struct Arena {
    bus: EventBus,
    events: EventRecorder,
    system: BuffSystem,
    roster: Roster,
}

fn entity(id: &str, side: Side, registry: &Rc<BuffRegistry>, bus: &EventBus) -> Entity {
    Entity {
        id: id.into(),
        name: id.into(),
        side,
        stats: Stats {
            hp: 100.0,
            max_hp: 100.0,
            ap: 3.0,
            max_ap: 3.0,
            speed: 10.0,
        },
        body_parts: BTreeMap::from([
            ("head".to_string(), BodyPart::new(10.0, 1.0)),
            ("torso".to_string(), BodyPart::new(0.0, 1.0)),
        ]),
        skills: vec![],
        buffs: BuffManager::new(id, Rc::clone(registry), bus.clone()),
    }
}

fn arena() -> Arena {
    let bus = EventBus::new();
    let events = EventRecorder::attach(&bus);
    let defs: Vec<BuffDefinition> = serde_yaml::from_str(BUFFS).expect("buffs parse");
    let registry = Rc::new(BuffRegistry::from_definitions(defs));
    let roster = Roster::new(vec![
        entity("hero", Side::Player, &registry, &bus),
        entity("ogre", Side::Enemy, &registry, &bus),
    ]);
    Arena {
        system: BuffSystem::new(bus.clone()),
        bus,
        events,
        roster,
    }
}

impl Arena {
    fn give(&mut self, owner: &str, buff_id: &str) {
        let entity = self.roster.get_mut(owner).expect("owner exists");
        entity.buffs.add(buff_id, AddOptions::default()).expect("buff defined");
    }

    fn hp(&self, id: &str) -> f64 {
        self.roster.get(id).map_or(0.0, |entity| entity.stats.hp)
    }

    fn punch(&mut self, part: &str) -> turnforge::combat::ActionOutcome {
        let skill: SkillConfig = serde_yaml::from_str("{ id: punch, cost: 1, value: 20 }").expect("skill parses");
        self.cast(&skill, part)
    }

    fn cast(&mut self, skill: &SkillConfig, part: &str) -> turnforge::combat::ActionOutcome {
        let action = PlannedAction {
            action_id: "a_1".into(),
            source: Side::Player,
            source_id: "hero".into(),
            skill_id: skill.id.clone(),
            target_id: "ogre".into(),
            body_part: part.into(),
            cost: 1,
            speed: 10.0,
            priority: 0,
            time: None,
            slot_key: None,
        };
        DamagePipeline::new(&mut self.roster, &self.system, &self.bus, 1).resolve(&action, skill)
    }
}

#[test]
fn plain_hit_runs_every_pipeline_stage_once() {
    let mut arena = arena();
    let outcome = arena.punch("torso");

    assert_eq!(outcome.damage_dealt, 20.0);
    assert_eq!(arena.hp("ogre"), 80.0);
    for topic in [
        Topic::BattleActionPre,
        Topic::BattleAttackPre,
        Topic::BattleTakeDamagePre,
        Topic::BattleAttackPost,
        Topic::BattleTakeDamage,
        Topic::BattleDefendPost,
    ] {
        assert_eq!(arena.events.count(topic), 1, "{topic:?}");
    }
    assert_eq!(arena.events.count(Topic::BattleDeathCheck), 0);
}

#[test]
fn shield_pool_soaks_before_hp() {
    let mut arena = arena();
    arena.give("ogre", "barrier");
    let outcome = arena.punch("torso");

    assert_eq!(outcome.shield_absorbed, 15.0);
    assert_eq!(outcome.damage_dealt, 5.0);
    assert_eq!(arena.hp("ogre"), 95.0);
}

#[test]
fn damage_taken_multiplier_and_override() {
    let mut arena = arena();
    arena.give("ogre", "brittle");
    assert_eq!(arena.punch("torso").damage_dealt, 30.0);

    let mut arena = self::arena();
    arena.give("ogre", "brittle");
    arena.give("ogre", "stoneskin");
    assert_eq!(arena.punch("torso").damage_dealt, 1.0);
}

#[test]
fn stat_modifier_damage_taken_mult_folds_in() {
    let mut arena = arena();
    arena.give("ogre", "exposed");
    assert_eq!(arena.punch("torso").damage_dealt, 30.0);
}

#[test]
fn absorb_to_heal_converts_the_hit() {
    let mut arena = arena();
    arena.roster.get_mut("ogre").unwrap().stats.hp = 50.0;
    arena.give("ogre", "leech");
    let outcome = arena.punch("torso");

    assert_eq!(outcome.damage_dealt, 0.0);
    assert_eq!(outcome.healed, 20.0);
    assert_eq!(arena.hp("ogre"), 70.0);
}

#[test]
fn thorns_counter_the_attacker() {
    let mut arena = arena();
    arena.give("ogre", "thorns");
    let outcome = arena.punch("torso");

    assert_eq!(outcome.counter_damage, 4.0);
    assert_eq!(arena.hp("hero"), 96.0);
    assert_eq!(arena.hp("ogre"), 80.0);
}

#[test]
fn revive_on_death_consumes_itself() {
    let mut arena = arena();
    arena.roster.get_mut("ogre").unwrap().stats.hp = 10.0;
    arena.give("ogre", "phoenix");
    let outcome = arena.punch("torso");

    assert!(outcome.revived);
    assert!(!outcome.target_defeated);
    assert_eq!(outcome.target_hp, 25.0);
    assert!(!arena.roster.get("ogre").unwrap().buffs.has("phoenix"));
    assert_eq!(arena.events.count(Topic::BattleDeathCheck), 1);

    assert!(!arena.punch("torso").target_defeated);
    let outcome = arena.punch("torso");
    assert!(outcome.target_defeated);
    assert!(!outcome.revived);
    assert_eq!(arena.hp("ogre"), 0.0);
}

#[test]
fn temp_armor_multiplier_shrinks_armor_capacity() {
    let mut arena = arena();
    arena.give("hero", "crusher");
    let outcome = arena.punch("head");

    assert_eq!(outcome.armor_absorbed, 5.0);
    assert_eq!(outcome.damage_dealt, 15.0);
    assert!(outcome.part_broken);
}

#[test]
fn turn_triggers_reach_every_entity() {
    let mut arena = arena();
    arena.roster.get_mut("hero").unwrap().stats.hp = 50.0;
    arena.give("hero", "regen");
    arena
        .roster
        .get_mut("ogre")
        .unwrap()
        .buffs
        .add("poison", AddOptions::stacks(3));

    let mut context = CombatContext::for_turn(1);
    arena.system.dispatch_all(Trigger::OnTurnStart, &mut arena.roster, &mut context);
    arena.system.dispatch_all(Trigger::OnTurnEnd, &mut arena.roster, &mut context);

    assert_eq!(arena.hp("hero"), 60.0);
    assert_eq!(arena.hp("ogre"), 94.0);
}

#[test]
fn tick_all_reports_expired_buffs() {
    let mut arena = arena();
    arena.give("ogre", "brittle");
    arena.give("hero", "regen");

    assert!(arena.system.tick_all(&mut arena.roster).is_empty());
    assert_eq!(
        arena.system.tick_all(&mut arena.roster),
        vec![("ogre".to_string(), "brittle".to_string())]
    );
    assert!(arena.roster.get("hero").unwrap().buffs.has("regen"));
}

#[test]
fn unsupported_action_warns_and_later_effects_still_run() {
    let mut arena = arena();
    arena.give("ogre", "weird");
    let outcome = arena.punch("torso");

    assert_eq!(outcome.damage_dealt, 15.0);
    assert_eq!(arena.events.count(Topic::BuffWarn), 1);
}

#[test]
fn bad_formula_is_isolated_as_buff_error() {
    let mut arena = arena();
    arena.give("ogre", "cursed");
    let outcome = arena.punch("torso");

    assert_eq!(outcome.damage_dealt, 20.0);
    assert_eq!(arena.events.count(Topic::BuffError), 1);
}

#[test]
fn skill_buff_refs_land_on_the_target() {
    let mut arena = arena();
    let hex: SkillConfig = serde_yaml::from_str(
        "{ id: hex, type: buff, cost: 1, buffRefs: [{ buffId: brittle }, { buffId: regen, target: self }] }",
    )
    .unwrap();
    let outcome = arena.cast(&hex, "torso");

    assert_eq!(outcome.damage_dealt, 0.0);
    assert!(arena.roster.get("ogre").unwrap().buffs.has("brittle"));
    assert!(arena.roster.get("hero").unwrap().buffs.has("regen"));
    assert_eq!(arena.events.count(Topic::BuffAdded), 2);
}

#[test]
fn defeated_actor_does_nothing() {
    let mut arena = arena();
    arena.roster.get_mut("hero").unwrap().stats.hp = 0.0;
    let outcome = arena.punch("torso");

    assert_eq!(outcome.skipped.as_deref(), Some("actor defeated"));
    assert_eq!(arena.hp("ogre"), 100.0);
    assert_eq!(arena.events.count(Topic::BattleActionPre), 0);
}
