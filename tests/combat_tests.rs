use std::path::Path;

use turnforge::autoplay::run_battle;
use turnforge::combat::{choose_part, plan_enemy_actions, BattleEngine, BattlePhase, BattleResult, Rng};
use turnforge::config::EngineConfig;
use turnforge::data::{parse_game_data, DataFormat, GameData};
use turnforge::error::{BattleError, ConfigError, PlanningError};
use turnforge::events::{EventBus, EventRecorder, Topic};
use turnforge::phase::GameState;
use turnforge::planning::{PlanningDraft, Side};
use turnforge::timeline::{PlayOutcome, TimelinePhase};

const DUEL: &str = r#"
player:
  stats: { hp: 100, maxHp: 100, ap: 5, maxAp: 5, speed: 10 }
  bodyParts:
    torso: { maxArmor: 0 }
  skills: [slash, guard]
skills:
  - id: slash
    cost: 2
    value: 20
    target:
      subject: ENEMY
      selection: { mode: multiple, selectCount: 2 }
  - id: guard
    type: buff
    cost: 1
    target: { subject: SELF, scope: ENTITY }
    buffRefs:
      - { buffId: ward, target: self }
  - id: smash
    cost: 4
    value: 40
  - id: mend
    type: heal
    cost: 1
    value: 30
    target: { subject: SELF }
  - id: bite
    cost: 0
    value: 5
    target:
      subject: ENEMY
      selection: { selectedParts: [torso] }
  - id: lunge
    cost: 0
    value: 5
    target:
      subject: ENEMY
      selection: { mode: random_single, candidateParts: [head, torso, tail] }
buffs:
  - id: ward
    lifecycle: { duration: 1 }
    effects:
      - { trigger: onTakeDamagePre, action: absorbDamage, value: 3 }
  - id: stun
    lifecycle: { duration: 1 }
    effects:
      - { trigger: onActionPre, action: skipTurn }
  - id: haste
    lifecycle: { duration: -1 }
    effects:
      - { trigger: onTurnStart, action: modifyAP, value: 2 }
enemies:
  - id: goblin
    stats: { hp: 50, maxHp: 50, speed: 5 }
    bodyParts:
      head: { maxArmor: 10, weakness: 1.5 }
      torso: { maxArmor: 0 }
    skills: [bite]
slotLayouts:
  duel:
    head: { self: 0, enemy: 1 }
    torso: { self: 1, enemy: 1 }
levels:
  - id: duel
    slotLayoutId: duel
    waves:
      - enemies:
          - templateId: goblin
  - id: pack
    slotLayoutId: duel
    waves:
      - enemies:
          - templateId: goblin
          - templateId: goblin
"#;

fn duel_data() -> GameData {
    parse_game_data(DUEL, DataFormat::Yaml, Path::new("duel.yaml")).expect("fixture parses")
}

fn engine_with(data: GameData) -> (BattleEngine, EventRecorder) {
    let bus = EventBus::new();
    let recorder = EventRecorder::attach(&bus);
    (BattleEngine::new(data, &EngineConfig::default(), bus), recorder)
}

fn started() -> (BattleEngine, EventRecorder) {
    let (mut engine, recorder) = engine_with(duel_data());
    engine.start_battle("duel").expect("battle starts");
    (engine, recorder)
}

#[test]
fn start_battle_opens_turn_one_in_planning() {
    let (engine, recorder) = started();

    assert_eq!(engine.turn(), 1);
    assert_eq!(engine.phase(), BattlePhase::Planning);
    assert_eq!(engine.game_state(), GameState::BattleLoop);
    assert!(engine.battle_id().is_some());
    assert_eq!(engine.planner().budget().available_ap, 5);
    assert_eq!(engine.planner().budget().enemy_target.as_deref(), Some("goblin"));
    assert_eq!(recorder.count(Topic::BattleStart), 1);
    assert_eq!(recorder.count(Topic::TurnStart), 1);
}

#[tokio::test]
async fn armor_break_example_resolves_through_the_engine() {
    let (mut engine, _recorder) = started();
    engine
        .assign_skill_to_slot("enemy:head:0", "slash", None)
        .expect("slash placed");

    let outcome = engine.commit_turn().await.expect("turn plays");
    assert_eq!(outcome, PlayOutcome::Finished);

    let row = &engine.report_rows()[0];
    assert_eq!(row.actor_id, "player");
    assert_eq!(row.raw_damage, 20.0);
    assert_eq!(row.armor_absorbed, 10.0);
    assert_eq!(row.damage_dealt, 20.0);
    assert!(row.part_broken);
    assert_eq!(row.target_hp, 30.0);

    let goblin = engine.roster().get("goblin").expect("goblin");
    assert!(goblin.body_parts["head"].broken);
    assert_eq!(goblin.body_parts["head"].current_armor(), 0.0);

    // The goblin bites back on the bare torso, then turn 2 opens.
    assert_eq!(engine.report_rows()[1].actor_id, "goblin");
    assert_eq!(engine.roster().player().map(|p| p.stats.hp), Some(95.0));
    assert_eq!(engine.turn(), 2);
    assert_eq!(engine.phase(), BattlePhase::Planning);
}

#[test]
fn ap_budget_and_learned_skills_gate_assignment() {
    let (mut engine, _recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    engine.assign_skill_to_slot("enemy:torso:0", "slash", None).unwrap();
    engine.assign_skill_to_slot("self:torso:0", "guard", None).unwrap();
    assert_eq!(engine.planner().used_ap(), 5);

    assert_eq!(
        engine.assign_skill_to_slot("enemy:head:0", "smash", None),
        Err(PlanningError::SkillNotLearned("smash".into()))
    );
    engine.learn_skill("smash").unwrap();
    engine.unassign_slot("enemy:head:0").unwrap();
    assert_eq!(
        engine.assign_skill_to_slot("enemy:head:0", "smash", None),
        Err(PlanningError::InsufficientAp {
            needed: 4,
            available: 2
        })
    );
}

#[test]
fn slot_and_target_checks_reject_without_mutation() {
    let (mut engine, _recorder) = started();

    assert_eq!(
        engine.assign_skill_to_slot("enemy:head", "slash", None),
        Err(PlanningError::InvalidSlotKey("enemy:head".into()))
    );
    assert_eq!(
        engine.assign_skill_to_slot("self:head:0", "guard", None),
        Err(PlanningError::UnknownBodyPart {
            target_id: "player".into(),
            part: "head".into()
        })
    );
    assert!(matches!(
        engine.assign_skill_to_slot("enemy:torso:3", "slash", None),
        Err(PlanningError::SlotIndexOutOfRange { capacity: 1, .. })
    ));
    assert_eq!(
        engine.assign_skill_to_slot("enemy:torso:0", "slash", Some("player")),
        Err(PlanningError::UnknownTarget("player".into()))
    );
    assert!(engine.planner().is_empty());
    assert_eq!(engine.planner().used_ap(), 0);
}

#[test]
fn commit_with_defeated_target_is_rejected() {
    let (mut engine, recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    if let Some(goblin) = engine.roster_mut().get_mut("goblin") {
        goblin.stats.hp = 0.0;
    }

    match engine.commit_planning() {
        Err(BattleError::CommitRejected(errors)) => {
            assert_eq!(errors, vec![PlanningError::TargetDefeated("goblin".into())]);
        }
        other => panic!("expected commit rejection, got {other:?}"),
    }
    assert_eq!(recorder.count(Topic::PlanningCommitFailed), 1);
    assert_eq!(engine.phase(), BattlePhase::Planning);
    assert_eq!(engine.planner().len(), 1);
}

#[test]
fn commit_planning_loads_timeline_and_spends_ap() {
    let (mut engine, recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();

    let count = engine.commit_planning().expect("commit succeeds");
    assert_eq!(count, 2);
    assert_eq!(engine.phase(), BattlePhase::Execution);
    assert_eq!(engine.timeline().phase(), TimelinePhase::Ready);
    assert_eq!(engine.roster().player().map(|p| p.stats.ap), Some(3.0));
    assert_eq!(recorder.count(Topic::PlanningCommitted), 1);

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.phase, "EXECUTION");
    assert_eq!(snapshot.queues.player.len(), 1);
    assert_eq!(snapshot.queues.enemy.len(), 1);
    assert_eq!(snapshot.battle_rules.slot_layout_id.as_deref(), Some("duel"));
    assert_eq!(snapshot.planning.player.order, vec!["a_1".to_string()]);

    assert_eq!(
        engine.assign_skill_to_slot("enemy:torso:0", "slash", None),
        Err(PlanningError::WrongPhase("EXECUTION"))
    );
}

#[test]
fn reset_turn_clears_placements() {
    let (mut engine, _recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    engine.reset_turn().unwrap();
    assert!(engine.planner().is_empty());
    assert_eq!(engine.planner().remaining_ap(), 5);
}

#[tokio::test]
async fn skip_turn_buff_cancels_the_action() {
    let (mut engine, _recorder) = started();
    if let Some(player) = engine.roster_mut().get_mut("player") {
        player.buffs.add("stun", Default::default());
    }
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    engine.commit_turn().await.unwrap();

    let row = &engine.report_rows()[0];
    assert_eq!(row.skipped, "skip_turn");
    assert_eq!(row.damage_dealt, 0.0);
    assert_eq!(engine.roster().get("goblin").map(|g| g.stats.hp), Some(50.0));
}

#[tokio::test]
async fn turn_start_effects_feed_the_ap_snapshot() {
    let mut data = duel_data();
    data.player.buffs.push("haste".into());
    let (mut engine, _recorder) = engine_with(data);
    engine.start_battle("duel").unwrap();

    assert_eq!(engine.planner().budget().available_ap, 7);
    engine.commit_turn().await.unwrap();
    assert_eq!(engine.planner().budget().available_ap, 7);
}

#[tokio::test]
async fn heal_skill_restores_hp_up_to_max() {
    let (mut engine, _recorder) = started();
    engine.learn_skill("mend").unwrap();
    if let Some(player) = engine.roster_mut().get_mut("player") {
        player.stats.hp = 80.0;
    }
    engine.assign_skill_to_slot("self:torso:0", "mend", None).unwrap();
    engine.commit_turn().await.unwrap();

    let row = &engine.report_rows()[0];
    assert_eq!(row.skill_id, "mend");
    assert_eq!(row.healed, 20.0);
    assert_eq!(row.armor_absorbed, 0.0);
}

#[test]
fn missing_cost_aborts_the_turn() {
    let mut data = duel_data();
    if let Some(slash) = data.skills.get_mut("slash") {
        slash.cost = None;
    }
    let (mut engine, _recorder) = engine_with(data);

    match engine.start_battle("duel") {
        Err(BattleError::Config(ConfigError::MissingApCost { skill_id })) => assert_eq!(skill_id, "slash"),
        other => panic!("expected missing cost, got {other:?}"),
    }
}

#[test]
fn enemy_skill_without_cost_aborts_the_commit() {
    let mut data = duel_data();
    if let Some(bite) = data.skills.get_mut("bite") {
        bite.cost = None;
    }
    let (mut engine, _recorder) = engine_with(data);
    engine.start_battle("duel").expect("player skills are fine");
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();

    match engine.commit_planning() {
        Err(BattleError::Config(ConfigError::MissingApCost { skill_id })) => assert_eq!(skill_id, "bite"),
        other => panic!("expected missing cost, got {other:?}"),
    }
    assert_eq!(engine.phase(), BattlePhase::Planning);
}

#[test]
fn drafted_targets_get_the_same_checks_as_single_assignment() {
    let (mut engine, recorder) = started();

    for (target, expected) in [
        ("player", PlanningError::UnknownTarget("player".into())),
        ("ghost", PlanningError::UnknownTarget("ghost".into())),
    ] {
        let mut draft = PlanningDraft::default().with_skill("slash", ["enemy:head:0"]);
        if let Some(skill_draft) = draft.planning_draft_by_skill.get_mut("slash") {
            skill_draft.target_id = Some(target.into());
        }
        let report = engine.plan_many(&draft);
        assert!(report.placed.is_empty(), "{target}");
        assert_eq!(report.errors.len(), 1, "{target}");
        assert_eq!(report.errors[0].error, expected);
        assert_eq!(report.errors[0].slot_key, "enemy:head:0");
    }
    assert!(engine.planner().is_empty());
    assert!(recorder.count(Topic::BattleLog) >= 2);

    let report = engine.plan_many(&PlanningDraft::default().with_skill("slash", ["enemy:head:0"]));
    assert_eq!(report.placed.len(), 1);
    assert!(report.errors.is_empty());
}

#[test]
fn drafted_slot_on_a_missing_body_part_is_rejected() {
    let data = parse_game_data(
        &DUEL.replace(
            "    torso: { self: 1, enemy: 1 }\n",
            "    torso: { self: 1, enemy: 1 }\n    tail: { self: 0, enemy: 1 }\n",
        ),
        DataFormat::Yaml,
        Path::new("duel.yaml"),
    )
    .expect("fixture parses");
    let (mut engine, _recorder) = engine_with(data);
    engine.start_battle("duel").unwrap();

    let report = engine.plan_many(&PlanningDraft::default().with_skill("slash", ["enemy:tail:0", "enemy:head:0"]));
    assert_eq!(
        report.errors.iter().map(|failure| &failure.error).collect::<Vec<_>>(),
        vec![&PlanningError::UnknownBodyPart {
            target_id: "goblin".into(),
            part: "tail".into(),
        }]
    );
    assert_eq!(report.placed.len(), 1);
    assert_eq!(engine.planner().len(), 1);
}

#[tokio::test]
async fn paused_turn_resumes_into_the_next_turn() {
    let (mut engine, _recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    engine.commit_planning().unwrap();
    engine.timeline_control().request_pause();

    assert_eq!(engine.commit_turn().await.unwrap(), PlayOutcome::Paused);
    assert_eq!(engine.phase(), BattlePhase::Execution);
    assert_eq!(engine.turn(), 1);
    assert_eq!(engine.timeline().phase(), TimelinePhase::Paused);

    assert_eq!(engine.resume_turn().await.unwrap(), PlayOutcome::Finished);
    assert_eq!(engine.turn(), 2);
    assert_eq!(engine.phase(), BattlePhase::Planning);
    assert!(engine.roster().get("goblin").is_some_and(|goblin| goblin.stats.hp < 50.0));
}

#[tokio::test]
async fn stop_request_halts_playback_and_ends_the_turn() {
    let (mut engine, _recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    engine.commit_planning().unwrap();
    engine.timeline_control().request_stop();

    assert_eq!(engine.commit_turn().await.unwrap(), PlayOutcome::Halted);
    assert_eq!(engine.turn(), 2);
    assert_eq!(engine.phase(), BattlePhase::Planning);
    assert!(engine.report_rows().is_empty());
    assert_eq!(engine.roster().get("goblin").map(|goblin| goblin.stats.hp), Some(50.0));
    assert!(engine.assign_skill_to_slot("enemy:head:0", "slash", None).is_ok());
    assert!(matches!(engine.resume_turn().await, Err(BattleError::Rejected(_))));
}

#[tokio::test]
async fn executor_failure_leaves_the_turn_in_execution() {
    let (mut engine, _recorder) = started();
    engine.assign_skill_to_slot("enemy:head:0", "slash", None).unwrap();
    engine.commit_planning().unwrap();
    if let Some(goblin) = engine.roster_mut().get_mut("goblin") {
        goblin.id = "vanished".into();
    }

    assert!(matches!(engine.commit_turn().await, Err(BattleError::Timeline(_))));
    assert_eq!(engine.phase(), BattlePhase::Execution);
    assert_eq!(engine.turn(), 1);
    assert_eq!(engine.timeline().phase(), TimelinePhase::Error);
    assert!(matches!(engine.resume_turn().await, Err(BattleError::Rejected(_))));
}

#[test]
fn unknown_level_is_a_config_error() {
    let (mut engine, _recorder) = engine_with(duel_data());
    assert!(matches!(
        engine.start_battle("nowhere"),
        Err(BattleError::Config(ConfigError::UnknownLevel(_)))
    ));
}

#[test]
fn duplicate_templates_get_indexed_ids() {
    let (mut engine, _recorder) = engine_with(duel_data());
    engine.start_battle("pack").unwrap();
    let ids: Vec<&str> = engine.roster().enemies().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["goblin_1", "goblin_2"]);
}

#[tokio::test]
async fn autoplay_settles_the_duel() {
    let (mut engine, recorder) = engine_with(duel_data());
    let summary = run_battle(&mut engine, "duel", 20, 7).await.expect("battle runs");

    assert_eq!(summary.result, "victory");
    assert_eq!(engine.result(), Some(BattleResult::Victory));
    assert_eq!(engine.phase(), BattlePhase::Finished);
    assert_eq!(engine.game_state(), GameState::BattleSettlement);
    assert!(summary.enemies.iter().all(|enemy| enemy.hp == 0.0));
    assert!(recorder.log_lines().iter().any(|line| line.starts_with("Victory")));

    assert_eq!(
        engine.assign_skill_to_slot("enemy:head:0", "slash", None),
        Err(PlanningError::WrongPhase("FINISHED"))
    );
    assert!(matches!(engine.commit_turn().await, Err(BattleError::Rejected(_))));
}

#[test]
fn enemy_plan_uses_first_skill_and_selected_part() {
    let (engine, _recorder) = started();
    let mut rng = Rng::new(1);
    let actions = plan_enemy_actions(engine.roster(), engine.data(), &mut rng).expect("enemy costs are valid");

    assert_eq!(actions.len(), 1);
    let action = &actions[0];
    assert_eq!(action.action_id, "e_goblin_1");
    assert_eq!(action.source, Side::Enemy);
    assert_eq!(action.skill_id, "bite");
    assert_eq!(action.target_id, "player");
    assert_eq!(action.body_part, "torso");
    assert_eq!(action.speed, 5.0);
    assert!(action.slot_key.is_none());
}

#[test]
fn random_part_choice_is_seeded_and_filtered() {
    let (engine, _recorder) = started();
    let lunge = engine.data().skills["lunge"].clone();
    let goblin = engine.roster().get("goblin").expect("goblin");

    let picks = |seed| {
        let mut rng = Rng::new(seed);
        (0..8).map(|_| choose_part(&lunge, goblin, &mut rng)).collect::<Vec<_>>()
    };
    let first = picks(42);
    assert_eq!(first, picks(42));
    assert!(first.iter().all(|part| part == "head" || part == "torso"));
}
