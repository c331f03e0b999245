//! Slot assignment bookkeeping for one side's planning phase.
//!
//! The planner owns the assignment tables and enforces three limits on every
//! mutation: slot capacity from the [`SlotLayout`], the per-skill placement
//! cap (`selectCount`), and the AP budget snapshot. Rejections come back as
//! [`PlanningError`] with nothing mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::SkillCatalog;
use crate::error::PlanningError;
use crate::planning::{Side, SlotKey, SlotLayout};

/// One action frozen into a queue or held by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAction {
    pub action_id: String,
    /// Side of the acting entity.
    pub source: Side,
    pub source_id: String,
    pub skill_id: String,
    pub target_id: String,
    pub body_part: String,
    pub cost: u32,
    pub speed: f64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_key: Option<SlotKey>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignRequest {
    pub slot_key: SlotKey,
    pub skill_id: String,
    pub target_id: String,
    /// Defaults to the slot's part when `None`.
    pub body_part: Option<String>,
    pub cost: u32,
    pub speed: f64,
    pub priority: i32,
    pub replace_if_already_placed: bool,
}

impl AssignRequest {
    pub fn new(slot_key: SlotKey, skill_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            slot_key,
            skill_id: skill_id.into(),
            target_id: target_id.into(),
            body_part: None,
            cost: 0,
            speed: 0.0,
            priority: 0,
            replace_if_already_placed: false,
        }
    }

    pub fn cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn replacing(mut self) -> Self {
        self.replace_if_already_placed = true;
        self
    }
}

/// AP and per-skill cost snapshot taken at turn start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnBudget {
    pub available_ap: u32,
    pub costs: BTreeMap<String, u32>,
    /// Actor speed added to every skill's speed modifier.
    pub actor_speed: f64,
    pub player_target: String,
    pub enemy_target: Option<String>,
}

impl TurnBudget {
    fn default_target(&self, side: Side) -> Option<&str> {
        match side {
            Side::Player => Some(self.player_target.as_str()),
            Side::Enemy => self.enemy_target.as_deref(),
        }
    }
}

/// UI draft: slots chosen per skill, in click order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillDraft {
    pub placed_slots: Vec<String>,
    #[serde(default)]
    pub target_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningDraft {
    pub planning_draft_by_skill: BTreeMap<String, SkillDraft>,
}

impl PlanningDraft {
    pub fn with_skill<I, S>(mut self, skill_id: impl Into<String>, slots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.planning_draft_by_skill.insert(
            skill_id.into(),
            SkillDraft {
                placed_slots: slots.into_iter().map(Into::into).collect(),
                target_id: None,
            },
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotFailure {
    pub skill_id: String,
    pub slot_key: String,
    pub error: PlanningError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanManyReport {
    pub placed: Vec<String>,
    pub errors: Vec<SlotFailure>,
}

impl PlanManyReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Persisted planning shape (`assigned`, `actionsById`, `order`, `skillCounts`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningSnapshot {
    pub assigned: BTreeMap<String, String>,
    pub actions_by_id: BTreeMap<String, PlannedAction>,
    pub order: Vec<String>,
    pub skill_counts: BTreeMap<String, u32>,
}

#[derive(Debug, Clone)]
pub struct TurnPlanner {
    actor_id: String,
    layout: Option<SlotLayout>,
    budget: TurnBudget,
    assigned: BTreeMap<SlotKey, String>,
    actions_by_id: BTreeMap<String, PlannedAction>,
    order: Vec<String>,
    skill_counts: BTreeMap<String, u32>,
    next_id: u32,
    locked: Option<&'static str>,
}

impl TurnPlanner {
    pub fn new(actor_id: impl Into<String>, layout: Option<SlotLayout>) -> Self {
        Self {
            actor_id: actor_id.into(),
            layout,
            budget: TurnBudget::default(),
            assigned: BTreeMap::new(),
            actions_by_id: BTreeMap::new(),
            order: Vec::new(),
            skill_counts: BTreeMap::new(),
            next_id: 1,
            locked: None,
        }
    }

    /// Clears every assignment. Layout and budget survive.
    pub fn reset(&mut self) {
        self.assigned.clear();
        self.actions_by_id.clear();
        self.order.clear();
        self.skill_counts.clear();
        self.next_id = 1;
    }

    pub fn set_budget(&mut self, budget: TurnBudget) {
        self.budget = budget;
    }

    pub fn budget(&self) -> &TurnBudget {
        &self.budget
    }

    pub fn layout(&self) -> Option<&SlotLayout> {
        self.layout.as_ref()
    }

    /// Rejects every mutator with [`PlanningError::WrongPhase`] until [`unlock`](Self::unlock).
    pub fn lock(&mut self, phase: &'static str) {
        self.locked = Some(phase);
    }

    pub fn unlock(&mut self) {
        self.locked = None;
    }

    pub fn used_ap(&self) -> u32 {
        self.actions_by_id.values().map(|action| action.cost).sum()
    }

    pub fn remaining_ap(&self) -> u32 {
        self.budget.available_ap.saturating_sub(self.used_ap())
    }

    pub fn placements_for_skill(&self, skill_id: &str) -> u32 {
        self.skill_counts.get(skill_id).copied().unwrap_or(0)
    }

    pub fn action_for_slot(&self, slot: &SlotKey) -> Option<&PlannedAction> {
        self.assigned.get(slot).and_then(|id| self.actions_by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Assignments in insertion order.
    pub fn planned_actions(&self) -> Vec<PlannedAction> {
        self.order
            .iter()
            .filter_map(|id| self.actions_by_id.get(id))
            .cloned()
            .collect()
    }

    pub fn validate_slot(&self, slot: &SlotKey) -> Result<(), PlanningError> {
        self.layout.as_ref().ok_or(PlanningError::NoLayout)?.check(slot)
    }

    fn ensure_unlocked(&self) -> Result<(), PlanningError> {
        match self.locked {
            Some(phase) => Err(PlanningError::WrongPhase(phase)),
            None => Ok(()),
        }
    }

    pub fn assign(
        &mut self,
        request: AssignRequest,
        skills: &impl SkillCatalog,
    ) -> Result<String, PlanningError> {
        self.ensure_unlocked()?;
        self.validate_slot(&request.slot_key)?;
        if self.assigned.contains_key(&request.slot_key) {
            return Err(PlanningError::SlotOccupied(request.slot_key.to_string()));
        }
        let skill = skills
            .skill(&request.skill_id)
            .ok_or_else(|| PlanningError::UnknownSkill(request.skill_id.clone()))?;

        let max = skill.select_count();
        let displaced = if request.replace_if_already_placed && max == 1 {
            self.last_action_for_skill(&request.skill_id)
                .and_then(|id| self.actions_by_id.get(id))
                .cloned()
        } else {
            None
        };

        // Validate as if the displaced placement were already gone.
        let (freed_count, freed_ap) = displaced
            .as_ref()
            .map_or((0, 0), |action| (1, action.cost));
        let placed = self.placements_for_skill(&request.skill_id) - freed_count;
        if placed >= max {
            return Err(PlanningError::MaxPlacements {
                skill_id: request.skill_id,
                max,
            });
        }
        let used = self.used_ap() - freed_ap;
        let available = self.budget.available_ap;
        if used + request.cost > available {
            return Err(PlanningError::InsufficientAp {
                needed: request.cost,
                available: available.saturating_sub(used),
            });
        }

        if let Some(slot) = displaced.and_then(|action| action.slot_key) {
            self.remove_slot(&slot);
        }

        let action_id = format!("a_{}", self.next_id);
        self.next_id += 1;
        let action = PlannedAction {
            action_id: action_id.clone(),
            source: Side::Player,
            source_id: self.actor_id.clone(),
            body_part: request
                .body_part
                .unwrap_or_else(|| request.slot_key.part.clone()),
            skill_id: request.skill_id,
            target_id: request.target_id,
            cost: request.cost,
            speed: request.speed,
            priority: request.priority,
            time: None,
            slot_key: Some(request.slot_key.clone()),
        };
        debug!(slot = %request.slot_key, skill = %action.skill_id, action = %action_id, "slot assigned");

        *self.skill_counts.entry(action.skill_id.clone()).or_insert(0) += 1;
        self.assigned.insert(request.slot_key, action_id.clone());
        self.order.push(action_id.clone());
        self.actions_by_id.insert(action_id.clone(), action);
        Ok(action_id)
    }

    /// Clears one slot. An empty slot is not an error and yields `Ok(None)`.
    pub fn unassign(&mut self, slot: &SlotKey) -> Result<Option<PlannedAction>, PlanningError> {
        self.ensure_unlocked()?;
        self.validate_slot(slot)?;
        Ok(self.remove_slot(slot))
    }

    fn remove_slot(&mut self, slot: &SlotKey) -> Option<PlannedAction> {
        let action_id = self.assigned.remove(slot)?;
        self.order.retain(|id| *id != action_id);
        let action = self.actions_by_id.remove(&action_id)?;
        if let Some(count) = self.skill_counts.get_mut(&action.skill_id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.skill_counts.remove(&action.skill_id);
            }
        }
        debug!(slot = %slot, action = %action_id, "slot cleared");
        Some(action)
    }

    fn last_action_for_skill(&self, skill_id: &str) -> Option<&str> {
        self.order
            .iter()
            .rev()
            .find(|id| {
                self.actions_by_id
                    .get(*id)
                    .is_some_and(|action| action.skill_id == skill_id)
            })
            .map(String::as_str)
    }

    /// Batch placement. Each drafted skill replaces its previous placements,
    /// then places up to `selectCount` of its slots. Per-slot failures are
    /// collected and do not stop the batch.
    pub fn plan_many(&mut self, draft: &PlanningDraft, skills: &impl SkillCatalog) -> PlanManyReport {
        self.plan_many_with(draft, skills, draft_target)
    }

    /// [`plan_many`](Self::plan_many) with a caller-supplied target check.
    /// `resolve` gets the slot and the drafted target id and returns the id
    /// to aim at.
    pub fn plan_many_with<F>(&mut self, draft: &PlanningDraft, skills: &impl SkillCatalog, mut resolve: F) -> PlanManyReport
    where
        F: FnMut(&TurnBudget, &SlotKey, Option<&str>) -> Result<String, PlanningError>,
    {
        let mut report = PlanManyReport::default();
        if let Err(error) = self.ensure_unlocked() {
            report.errors.push(SlotFailure {
                skill_id: String::new(),
                slot_key: String::new(),
                error,
            });
            return report;
        }

        for (skill_id, skill_draft) in &draft.planning_draft_by_skill {
            if skill_draft.placed_slots.is_empty() {
                continue;
            }
            let fail = |slot_key: &str, error| SlotFailure {
                skill_id: skill_id.clone(),
                slot_key: slot_key.to_string(),
                error,
            };

            let Some(skill) = skills.skill(skill_id) else {
                report
                    .errors
                    .extend(skill_draft.placed_slots.iter().map(|slot| fail(slot, PlanningError::UnknownSkill(skill_id.clone()))));
                continue;
            };
            let max = skill.select_count();
            let speed = self.budget.actor_speed + skill.speed;
            let priority = skill.priority;

            let previous: Vec<SlotKey> = self
                .order
                .iter()
                .filter_map(|id| self.actions_by_id.get(id))
                .filter(|action| action.skill_id == *skill_id)
                .filter_map(|action| action.slot_key.clone())
                .collect();
            for slot in &previous {
                self.remove_slot(slot);
            }

            for (i, raw) in skill_draft.placed_slots.iter().enumerate() {
                if i >= max as usize {
                    report.errors.push(fail(
                        raw,
                        PlanningError::ExceedsSelectCount {
                            skill_id: skill_id.clone(),
                            slot: raw.clone(),
                            max,
                        },
                    ));
                    continue;
                }
                let slot = match SlotKey::parse(raw) {
                    Ok(slot) => slot,
                    Err(error) => {
                        report.errors.push(fail(raw, error));
                        continue;
                    }
                };
                let Some(&cost) = self.budget.costs.get(skill_id) else {
                    report
                        .errors
                        .push(fail(raw, PlanningError::SkillNotLearned(skill_id.clone())));
                    continue;
                };
                let target_id = match resolve(&self.budget, &slot, skill_draft.target_id.as_deref()) {
                    Ok(target_id) => target_id,
                    Err(error) => {
                        report.errors.push(fail(raw, error));
                        continue;
                    }
                };

                let mut request = AssignRequest::new(slot, skill_id.clone(), target_id)
                    .cost(cost)
                    .speed(speed);
                request.priority = priority;
                match self.assign(request, skills) {
                    Ok(action_id) => report.placed.push(action_id),
                    Err(error) => report.errors.push(fail(raw, error)),
                }
            }
        }
        report
    }

    pub fn snapshot(&self) -> PlanningSnapshot {
        PlanningSnapshot {
            assigned: self
                .assigned
                .iter()
                .map(|(slot, id)| (slot.to_string(), id.clone()))
                .collect(),
            actions_by_id: self.actions_by_id.clone(),
            order: self.order.clone(),
            skill_counts: self.skill_counts.clone(),
        }
    }
}

/// Drafted target, falling back to the slot side's default.
fn draft_target(budget: &TurnBudget, slot: &SlotKey, target_id: Option<&str>) -> Result<String, PlanningError> {
    target_id
        .map(str::to_string)
        .or_else(|| budget.default_target(slot.side).map(str::to_string))
        .ok_or_else(|| PlanningError::UnknownTarget(slot.side.to_string()))
}
