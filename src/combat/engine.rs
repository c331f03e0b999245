//! Battle orchestrator: owns the turn lifecycle and drives the timeline
//! through the damage pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::buff::{AddOptions, BuffManager, BuffRegistry, BuffSystem, Trigger};
use crate::combat::context::CombatContext;
use crate::combat::damage::DamagePipeline;
use crate::combat::enemy_ai::plan_enemy_actions;
use crate::combat::entity::{BodyPart, Entity, Roster, Stats};
use crate::combat::rng::Rng;
use crate::combat::snapshot::{ActionQueues, BattleRules, BattleSnapshot, PlanningState};
use crate::config::EngineConfig;
use crate::data::{GameData, SkillCatalog};
use crate::error::{BattleError, ConfigError, PlanningError};
use crate::events::{BattleEvent, CommitFailure, EventBus};
use crate::phase::{GameFsm, GameState};
use crate::planning::{
    AssignRequest, PlanManyReport, PlannedAction, PlanningDraft, Side, SlotKey, TurnBudget, TurnPlanner,
};
use crate::report::ReportRow;
use crate::timeline::{
    EntryExecutor, PlayOptions, PlayOutcome, RoundRules, TimelineControl, TimelineEntry, TimelineManager,
    TimelinePhase, TimelineSnapshot,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattlePhase {
    #[default]
    Idle,
    Planning,
    Execution,
    Finished,
}

impl BattlePhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Planning => "PLANNING",
            Self::Execution => "EXECUTION",
            Self::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for BattlePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BattleResult {
    Victory,
    Defeat,
}

impl BattleResult {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Victory => "victory",
            Self::Defeat => "defeat",
        }
    }
}

/// Timeline executor that resolves each entry against the live roster.
struct ActionResolver<'a> {
    roster: &'a mut Roster,
    buffs: &'a BuffSystem,
    bus: &'a EventBus,
    data: &'a GameData,
    turn: u32,
    rows: &'a mut Vec<ReportRow>,
}

impl EntryExecutor for ActionResolver<'_> {
    async fn execute_entry(&mut self, entry: &TimelineEntry) -> Result<Value, String> {
        let skill = self
            .data
            .skill(&entry.skill_id)
            .ok_or_else(|| format!("unknown skill '{}'", entry.skill_id))?;
        let action = &entry.source_action;
        for id in [&action.source_id, &action.target_id] {
            if self.roster.get(id).is_none() {
                return Err(format!("unknown combatant '{id}'"));
            }
        }
        let outcome =
            DamagePipeline::new(self.roster, self.buffs, self.bus, self.turn).resolve(&entry.source_action, skill);

        for id in [&outcome.actor_id, &outcome.target_id] {
            if let Some(entity) = self.roster.get(id) {
                self.bus.emit(BattleEvent::DataUpdate(entity.status()));
            }
        }
        self.rows.push(ReportRow::new(self.turn, entry, &outcome));
        serde_json::to_value(&outcome).map_err(|err| err.to_string())
    }

    /// Playback stops as soon as one side is wiped out.
    fn can_continue(&self) -> bool {
        self.roster.player_alive() && self.roster.any_enemy_alive()
    }
}

pub struct BattleEngine {
    data: Rc<GameData>,
    registry: Rc<BuffRegistry>,
    bus: EventBus,
    fsm: GameFsm,
    buffs: BuffSystem,
    roster: Roster,
    planner: TurnPlanner,
    timeline: TimelineManager,
    rng: Rng,
    step_delay_ms: u64,
    default_rules: RoundRules,
    rules: RoundRules,
    battle_id: Option<Uuid>,
    level_id: Option<String>,
    slot_layout_id: Option<String>,
    turn: u32,
    phase: BattlePhase,
    queues: ActionQueues,
    result: Option<BattleResult>,
    report: Vec<ReportRow>,
}

impl BattleEngine {
    pub fn new(data: GameData, config: &EngineConfig, bus: EventBus) -> Self {
        let registry = Rc::new(BuffRegistry::new(data.buffs.clone()));
        let default_rules = RoundRules {
            tie_break: config.tie_break,
            side_priority: None,
        };
        Self {
            data: Rc::new(data),
            registry,
            fsm: GameFsm::new(bus.clone()),
            buffs: BuffSystem::new(bus.clone()),
            timeline: TimelineManager::new(bus.clone()),
            planner: TurnPlanner::new(String::new(), None),
            roster: Roster::default(),
            rng: Rng::new(config.seed),
            step_delay_ms: config.step_delay_ms,
            default_rules,
            rules: default_rules,
            battle_id: None,
            level_id: None,
            slot_layout_id: None,
            turn: 0,
            phase: BattlePhase::Idle,
            queues: ActionQueues::default(),
            result: None,
            report: Vec::new(),
            bus,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn data(&self) -> &GameData {
        &self.data
    }

    pub fn phase(&self) -> BattlePhase {
        self.phase
    }

    pub fn game_state(&self) -> GameState {
        self.fsm.current()
    }

    pub fn fsm_mut(&mut self) -> &mut GameFsm {
        &mut self.fsm
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn battle_id(&self) -> Option<Uuid> {
        self.battle_id
    }

    pub fn level_id(&self) -> Option<&str> {
        self.level_id.as_deref()
    }

    pub fn result(&self) -> Option<BattleResult> {
        self.result
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut Roster {
        &mut self.roster
    }

    pub fn planner(&self) -> &TurnPlanner {
        &self.planner
    }

    pub fn timeline(&self) -> &TimelineManager {
        &self.timeline
    }

    pub fn timeline_snapshot(&self) -> TimelineSnapshot {
        self.timeline.snapshot()
    }

    pub fn queues(&self) -> &ActionQueues {
        &self.queues
    }

    pub fn report_rows(&self) -> &[ReportRow] {
        &self.report
    }

    fn player_id(&self) -> Option<String> {
        self.roster.player().map(|player| player.id.clone())
    }

    fn log(&self, text: impl Into<String>) {
        self.bus.emit(BattleEvent::log(text));
    }

    #[allow(clippy::too_many_arguments)]
    fn build_entity(
        &self,
        id: String,
        name: &str,
        side: Side,
        stats: Stats,
        body_parts: &BTreeMap<String, BodyPart>,
        skills: &[String],
        buffs: &[String],
    ) -> Entity {
        let mut manager = BuffManager::new(id.clone(), Rc::clone(&self.registry), self.bus.clone());
        for buff_id in buffs {
            manager.add(buff_id, AddOptions::default());
        }
        Entity {
            name: if name.is_empty() { id.clone() } else { name.to_string() },
            id,
            side,
            stats,
            body_parts: body_parts
                .iter()
                .map(|(part, config)| {
                    let mut part_state = *config;
                    part_state.armor = Some(config.current_armor());
                    (part.clone(), part_state)
                })
                .collect(),
            skills: skills.to_vec(),
            buffs: manager,
        }
    }

    /// Sets up the roster, slot layout and rules for `level_id`, then
    /// opens turn 1.
    pub fn start_battle(&mut self, level_id: &str) -> Result<(), BattleError> {
        let data = Rc::clone(&self.data);
        let level = data.level(level_id)?;
        self.fsm
            .change_state(GameState::BattlePrepare, json!({ "levelId": level_id }));

        let wave = level
            .waves
            .first()
            .filter(|wave| !wave.enemies.is_empty())
            .ok_or_else(|| ConfigError::EmptyLevel(level_id.to_string()))?;

        let player = &data.player;
        let mut entities = vec![self.build_entity(
            player.id.clone(),
            &player.name,
            Side::Player,
            player.stats,
            &player.body_parts,
            &player.skills,
            &player.buffs,
        )];
        for (index, spawn) in wave.enemies.iter().enumerate() {
            let template = data.enemies.get(&spawn.template_id).ok_or_else(|| {
                ConfigError::UnknownEnemyTemplate {
                    level_id: level_id.to_string(),
                    template_id: spawn.template_id.clone(),
                }
            })?;
            let duplicates = wave
                .enemies
                .iter()
                .filter(|other| other.template_id == spawn.template_id)
                .count();
            let id = if duplicates > 1 {
                format!("{}_{}", template.id, index + 1)
            } else {
                template.id.clone()
            };
            entities.push(self.build_entity(
                id,
                &template.name,
                Side::Enemy,
                template.stats,
                &template.body_parts,
                &template.skills,
                &template.buffs,
            ));
        }
        self.roster = Roster::new(entities);

        let layout = data.slot_layout_for(level);
        self.slot_layout_id = layout.as_ref().map(|(id, _)| id.clone());
        self.planner = TurnPlanner::new(player.id.clone(), layout.map(|(_, layout)| layout));
        if self.planner.layout().is_none() {
            warn!(level = level_id, "level has no slot layout; planning will reject every slot");
        }
        self.rules = RoundRules {
            tie_break: level.rules.tie_break.or(self.default_rules.tie_break),
            side_priority: level.rules.side_priority,
        };

        self.timeline.reset();
        self.queues = ActionQueues::default();
        self.report.clear();
        self.result = None;
        self.turn = 0;
        self.level_id = Some(level_id.to_string());
        let battle_id = Uuid::new_v4();
        self.battle_id = Some(battle_id);

        self.fsm.change_state(
            GameState::BattleLoop,
            json!({ "levelId": level_id, "battleId": battle_id.to_string() }),
        );
        info!(battle = %battle_id, level = level_id, enemies = wave.enemies.len(), "battle started");
        self.bus.emit(BattleEvent::BattleStart {
            battle_id,
            level_id: level_id.to_string(),
            player_id: player.id.clone(),
            enemy_ids: self.roster.enemies().map(|enemy| enemy.id.clone()).collect(),
        });
        self.start_turn()
    }

    /// Per-skill AP costs of every learned skill. Missing or negative costs
    /// are authoring bugs and abort the turn.
    fn skill_costs(&self, skills: &[String]) -> Result<BTreeMap<String, u32>, ConfigError> {
        let mut costs = BTreeMap::new();
        for skill_id in skills {
            let Some(skill) = self.data.skill(skill_id) else {
                warn!(skill = %skill_id, "learned skill has no definition");
                continue;
            };
            costs.insert(skill_id.clone(), checked_cost(skill_id, skill.cost)?);
        }
        Ok(costs)
    }

    /// Opens the next turn: AP snapshot, reset of queues, planner and
    /// timeline, turn-start triggers.
    pub fn start_turn(&mut self) -> Result<(), BattleError> {
        if self.result.is_some() {
            return Err(BattleError::Rejected("battle is already settled".into()));
        }
        let Some(player_id) = self.player_id() else {
            return Err(BattleError::NoBattle);
        };
        self.turn += 1;

        let learned = self
            .roster
            .player()
            .map(|player| player.skills.clone())
            .unwrap_or_default();
        let costs = self.skill_costs(&learned).inspect_err(|err| {
            error!(turn = self.turn, %err, "turn aborted by invalid skill data");
        })?;

        for entity in self.roster.iter_mut() {
            entity.stats.ap = entity.stats.max_ap;
        }
        self.queues = ActionQueues::default();
        self.planner.reset();
        self.planner.unlock();
        self.timeline.reset();
        self.phase = BattlePhase::Planning;

        let mut context = CombatContext::for_turn(self.turn);
        self.buffs
            .dispatch_all(Trigger::OnTurnStart, &mut self.roster, &mut context);
        info!(turn = self.turn, "turn started");
        self.bus.emit(BattleEvent::TurnStart { turn: self.turn });
        self.check_deaths();
        if self.settle() {
            return Ok(());
        }

        let Some(player) = self.roster.player() else {
            return Err(BattleError::NoBattle);
        };
        self.planner.set_budget(TurnBudget {
            available_ap: player.stats.ap.max(0.0).floor() as u32,
            costs,
            actor_speed: player.effective_speed(),
            player_target: player_id,
            enemy_target: self.roster.living_enemies().next().map(|enemy| enemy.id.clone()),
        });
        for entity in self.roster.iter() {
            self.bus.emit(BattleEvent::DataUpdate(entity.status()));
        }
        self.emit_update();
        Ok(())
    }

    fn emit_update(&self) {
        self.bus.emit(BattleEvent::BattleUpdate {
            turn: self.turn,
            phase: self.phase.as_str(),
            used_ap: self.planner.used_ap(),
            available_ap: self.planner.budget().available_ap,
            planned: self.planner.len(),
        });
    }

    /// Logs a planning rejection and hands it back.
    fn rejected<T>(&self, result: Result<T, PlanningError>) -> Result<T, PlanningError> {
        if let Err(err) = &result {
            warn!(turn = self.turn, %err, "planning command rejected");
            self.log(format!("Planning rejected: {err}"));
        }
        result
    }

    fn ensure_planning(&self) -> Result<(), PlanningError> {
        if self.phase == BattlePhase::Planning {
            Ok(())
        } else {
            Err(PlanningError::WrongPhase(self.phase.as_str()))
        }
    }

    fn try_assign(&mut self, slot: &str, skill_id: &str, target_id: Option<&str>) -> Result<String, PlanningError> {
        self.ensure_planning()?;
        let slot = SlotKey::parse(slot)?;
        let learned = self
            .roster
            .player()
            .is_some_and(|player| player.skills.iter().any(|id| id == skill_id));
        if !learned {
            return Err(PlanningError::SkillNotLearned(skill_id.to_string()));
        }
        let data = Rc::clone(&self.data);
        let skill = data
            .skill(skill_id)
            .ok_or_else(|| PlanningError::UnknownSkill(skill_id.to_string()))?;
        let cost = *self
            .planner
            .budget()
            .costs
            .get(skill_id)
            .ok_or_else(|| PlanningError::UnknownSkill(skill_id.to_string()))?;
        let target_id = resolve_target(&self.roster, self.planner.budget(), &slot, target_id)?;

        let mut request = AssignRequest::new(slot, skill_id, target_id)
            .cost(cost)
            .speed(self.planner.budget().actor_speed + skill.speed)
            .replacing();
        request.priority = skill.priority;
        self.planner.assign(request, &*data)
    }

    /// `assignSkillToSlot`. Aims at the slot side's default target unless
    /// `target_id` is given.
    pub fn assign_skill_to_slot(
        &mut self,
        slot: &str,
        skill_id: &str,
        target_id: Option<&str>,
    ) -> Result<String, PlanningError> {
        let result = self.try_assign(slot, skill_id, target_id);
        let result = self.rejected(result);
        if result.is_ok() {
            self.emit_update();
        }
        result
    }

    /// `unassignSlot`. An empty slot is not an error.
    pub fn unassign_slot(&mut self, slot: &str) -> Result<Option<PlannedAction>, PlanningError> {
        let result = self
            .ensure_planning()
            .and_then(|()| SlotKey::parse(slot))
            .and_then(|slot| self.planner.unassign(&slot));
        let result = self.rejected(result);
        if result.is_ok() {
            self.emit_update();
        }
        result
    }

    /// Batch placement from a UI draft; per-slot failures are collected.
    pub fn plan_many(&mut self, draft: &PlanningDraft) -> PlanManyReport {
        let data = Rc::clone(&self.data);
        let roster = &self.roster;
        let report = self
            .planner
            .plan_many_with(draft, &*data, |budget, slot, target_id| {
                resolve_target(roster, budget, slot, target_id)
            });
        for failure in &report.errors {
            self.log(format!(
                "Planning rejected {} at {}: {}",
                failure.skill_id, failure.slot_key, failure.error
            ));
        }
        self.emit_update();
        report
    }

    /// `resetTurn`: drops every placement of the current turn.
    pub fn reset_turn(&mut self) -> Result<(), BattleError> {
        if let Err(err) = self.ensure_planning() {
            self.log(format!("Reset rejected: {err}"));
            return Err(BattleError::Rejected(err.to_string()));
        }
        self.planner.reset();
        debug!(turn = self.turn, "planning reset");
        self.emit_update();
        Ok(())
    }

    /// `learnSkill`: adds a skill to the player's bar. Learning during
    /// planning makes it usable this turn.
    pub fn learn_skill(&mut self, skill_id: &str) -> Result<(), BattleError> {
        let Some(skill) = self.data.skill(skill_id) else {
            self.log(format!("Unknown skill: {skill_id}"));
            return Err(BattleError::Rejected(format!("unknown skill '{skill_id}'")));
        };
        let cost = checked_cost(skill_id, skill.cost)?;
        let Some(player_id) = self.player_id() else {
            return Err(BattleError::NoBattle);
        };
        let Some(player) = self.roster.get_mut(&player_id) else {
            return Err(BattleError::NoBattle);
        };
        if player.skills.iter().any(|id| id == skill_id) {
            return Ok(());
        }
        player.skills.push(skill_id.to_string());
        if self.phase == BattlePhase::Planning {
            let mut budget = self.planner.budget().clone();
            budget.costs.insert(skill_id.to_string(), cost);
            self.planner.set_budget(budget);
        }
        info!(skill = skill_id, "skill learned");
        self.log(format!("Learned {}", skill.label()));
        self.emit_update();
        Ok(())
    }

    /// Slotted actions get the full side/alive/body-part check again, since
    /// the roster may have changed since placement.
    fn target_problem(&self, action: &PlannedAction) -> Option<PlanningError> {
        match &action.slot_key {
            Some(slot) => resolve_target(&self.roster, self.planner.budget(), slot, Some(&action.target_id)).err(),
            None if self.roster.get(&action.target_id).is_some_and(Entity::is_alive) => None,
            None => Some(PlanningError::TargetDefeated(action.target_id.clone())),
        }
    }

    fn commit_failures(&self, actions: &[PlannedAction]) -> Vec<(CommitFailure, PlanningError)> {
        let mut failures = Vec::new();
        let mut spent = 0u32;
        let available = self.planner.budget().available_ap;
        for action in actions {
            let problem = if self.data.skill(&action.skill_id).is_none() {
                Some(PlanningError::UnknownSkill(action.skill_id.clone()))
            } else if let Some(err) = self.target_problem(action) {
                Some(err)
            } else if spent + action.cost > available {
                Some(PlanningError::InsufficientAp {
                    needed: action.cost,
                    available: available.saturating_sub(spent),
                })
            } else {
                spent += action.cost;
                None
            };
            if let Some(err) = problem {
                failures.push((
                    CommitFailure {
                        action_id: Some(action.action_id.clone()),
                        slot_key: action.slot_key.as_ref().map(SlotKey::to_string),
                        reason: err.to_string(),
                    },
                    err,
                ));
            }
        }
        failures
    }

    /// `commitPlanning`: freezes the player's plan, builds the enemy plan
    /// and loads the round into the timeline.
    pub fn commit_planning(&mut self) -> Result<usize, BattleError> {
        if let Err(err) = self.ensure_planning() {
            self.log(format!("Commit rejected: {err}"));
            return Err(BattleError::Rejected(err.to_string()));
        }

        let player_actions = self.planner.planned_actions();
        let failures = self.commit_failures(&player_actions);
        if !failures.is_empty() {
            let (payload, errors): (Vec<_>, Vec<_>) = failures.into_iter().unzip();
            warn!(turn = self.turn, errors = errors.len(), "planning commit failed");
            self.log(format!("Commit failed: {} invalid action(s)", errors.len()));
            self.bus.emit(BattleEvent::PlanningCommitFailed {
                turn: self.turn,
                errors: payload,
            });
            return Err(BattleError::CommitRejected(errors));
        }

        let data = Rc::clone(&self.data);
        let enemy_actions = plan_enemy_actions(&self.roster, &*data, &mut self.rng)?;
        let count = self
            .timeline
            .load_round_actions(self.turn, &player_actions, &enemy_actions, &self.rules)?;

        let used = self.planner.used_ap();
        if let Some(player) = self.roster.iter_mut().find(|entity| entity.side == Side::Player) {
            player.stats.ap = (player.stats.ap - f64::from(used)).max(0.0);
        }
        self.queues = ActionQueues {
            player: player_actions.clone(),
            enemy: enemy_actions,
        };
        self.planner.lock(BattlePhase::Execution.as_str());
        self.phase = BattlePhase::Execution;

        info!(turn = self.turn, player = player_actions.len(), entries = count, "planning committed");
        self.bus.emit(BattleEvent::PlanningCommitted {
            turn: self.turn,
            actions: player_actions,
        });
        self.emit_update();
        Ok(count)
    }

    /// `commitTurn`: commits planning if still open, then plays the loaded
    /// timeline. Requires a READY timeline. A finished round ends the turn
    /// and opens the next one (or settles the battle).
    pub async fn commit_turn(&mut self) -> Result<PlayOutcome, BattleError> {
        if self.phase == BattlePhase::Planning {
            self.commit_planning()?;
        }
        if self.phase != BattlePhase::Execution || self.timeline.phase() != TimelinePhase::Ready {
            let reason = format!(
                "cannot execute in {} with timeline {}",
                self.phase,
                self.timeline.phase().as_str()
            );
            self.log(format!("Execute rejected: {reason}"));
            return Err(BattleError::Rejected(reason));
        }
        self.play(false).await
    }

    /// Continues a paused timeline.
    pub async fn resume_turn(&mut self) -> Result<PlayOutcome, BattleError> {
        if self.phase != BattlePhase::Execution || self.timeline.phase() != TimelinePhase::Paused {
            return Err(BattleError::Rejected(format!(
                "nothing to resume (timeline {})",
                self.timeline.phase().as_str()
            )));
        }
        self.play(true).await
    }

    async fn play(&mut self, resume: bool) -> Result<PlayOutcome, BattleError> {
        let options = PlayOptions::with_delay_ms(self.step_delay_ms);
        let mut resolver = ActionResolver {
            roster: &mut self.roster,
            buffs: &self.buffs,
            bus: &self.bus,
            data: &*self.data,
            turn: self.turn,
            rows: &mut self.report,
        };
        let played = if resume {
            self.timeline.resume(&mut resolver, options).await
        } else {
            self.timeline.start(&mut resolver, options).await
        };

        let outcome = match played {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(turn = self.turn, %err, "timeline playback failed");
                self.log(format!("Execution error: {err}"));
                return Err(err.into());
            }
        };

        match outcome {
            PlayOutcome::Finished => self.end_turn()?,
            PlayOutcome::Stopped => {
                // Host guard: one side is gone.
                self.timeline.stop();
                self.end_turn()?;
            }
            PlayOutcome::Halted => {
                // Stop request: the timeline is already FINISHED.
                debug!(turn = self.turn, "playback halted");
                self.end_turn()?;
            }
            PlayOutcome::Paused => {
                debug!(turn = self.turn, "playback paused");
            }
        }
        Ok(outcome)
    }

    /// Pause/stop requests for a running playback.
    pub fn timeline_control(&self) -> TimelineControl {
        self.timeline.control()
    }

    /// Turn-end triggers, buff tick, settlement check, then the next turn.
    pub fn end_turn(&mut self) -> Result<(), BattleError> {
        let mut context = CombatContext::for_turn(self.turn);
        self.buffs
            .dispatch_all(Trigger::OnTurnEnd, &mut self.roster, &mut context);
        let expired = self.buffs.tick_all(&mut self.roster);
        for (owner, buff) in &expired {
            debug!(owner = %owner, buff = %buff, "buff expired");
        }
        info!(turn = self.turn, expired = expired.len(), "turn ended");
        self.bus.emit(BattleEvent::TurnEnd {
            turn: self.turn,
            expired,
        });
        for entity in self.roster.iter() {
            self.bus.emit(BattleEvent::BuffUpdate {
                owner_id: entity.id.clone(),
                buffs: entity.buffs.to_records(),
            });
        }

        self.check_deaths();
        if self.settle() {
            return Ok(());
        }
        self.start_turn()
    }

    /// Death checks for anyone left at zero HP by turn-level effects.
    fn check_deaths(&mut self) {
        let fallen: Vec<String> = self
            .roster
            .iter()
            .filter(|entity| !entity.is_alive())
            .map(|entity| entity.id.clone())
            .collect();
        let mut pipeline = DamagePipeline::new(&mut self.roster, &self.buffs, &self.bus, self.turn);
        for id in fallen {
            pipeline.death_check(&id);
        }
    }

    /// Resolves victory or defeat once a side is wiped out. Returns `true`
    /// when the battle is over.
    fn settle(&mut self) -> bool {
        if self.result.is_some() {
            return true;
        }
        let result = if !self.roster.player_alive() {
            BattleResult::Defeat
        } else if !self.roster.any_enemy_alive() {
            BattleResult::Victory
        } else {
            return false;
        };

        self.result = Some(result);
        self.phase = BattlePhase::Finished;
        self.planner.lock(BattlePhase::Finished.as_str());
        self.timeline.stop();
        info!(turn = self.turn, result = result.as_str(), "battle settled");
        self.log(match result {
            BattleResult::Victory => format!("Victory on turn {}", self.turn),
            BattleResult::Defeat => format!("Defeat on turn {}", self.turn),
        });
        self.fsm.change_state(
            GameState::BattleSettlement,
            json!({ "result": result.as_str(), "turn": self.turn }),
        );
        true
    }

    pub fn snapshot(&self) -> BattleSnapshot {
        BattleSnapshot {
            turn: self.turn,
            phase: self.phase.as_str().to_string(),
            queues: self.queues.clone(),
            planning: PlanningState {
                player: self.planner.snapshot(),
            },
            battle_rules: BattleRules {
                slot_layout_id: self.slot_layout_id.clone(),
                slot_layout: self.planner.layout().cloned(),
            },
        }
    }
}

impl fmt::Debug for BattleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BattleEngine")
            .field("battle_id", &self.battle_id)
            .field("turn", &self.turn)
            .field("phase", &self.phase)
            .field("result", &self.result)
            .finish_non_exhaustive()
    }
}

/// Whole AP cost of a skill; missing and negative costs are config errors.
/// Checks the target of a player action against the live roster. Without an
/// explicit id the slot side's default target from the budget is used.
fn resolve_target(
    roster: &Roster,
    budget: &TurnBudget,
    slot: &SlotKey,
    target_id: Option<&str>,
) -> Result<String, PlanningError> {
    let target_id = match target_id {
        Some(id) => id.to_string(),
        None => match slot.side {
            Side::Player => budget.player_target.clone(),
            Side::Enemy => budget
                .enemy_target
                .clone()
                .ok_or_else(|| PlanningError::UnknownTarget("enemy".into()))?,
        },
    };
    let target = roster
        .get(&target_id)
        .filter(|entity| entity.side == slot.side)
        .ok_or_else(|| PlanningError::UnknownTarget(target_id.clone()))?;
    if !target.is_alive() {
        return Err(PlanningError::TargetDefeated(target_id));
    }
    if !target.body_parts.is_empty() && !target.body_parts.contains_key(&slot.part) {
        return Err(PlanningError::UnknownBodyPart {
            target_id,
            part: slot.part.clone(),
        });
    }
    Ok(target_id)
}

pub(crate) fn checked_cost(skill_id: &str, cost: Option<f64>) -> Result<u32, ConfigError> {
    match cost {
        Some(cost) if cost.is_finite() && cost >= 0.0 => Ok(cost.round() as u32),
        Some(cost) if cost.is_finite() => Err(ConfigError::NegativeApCost {
            skill_id: skill_id.to_string(),
            cost: cost.round() as i64,
        }),
        _ => Err(ConfigError::MissingApCost {
            skill_id: skill_id.to_string(),
        }),
    }
}
