//! Headless play: a deterministic player planner and a loop that runs a
//! whole battle with it.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::combat::BattleEngine;
use crate::data::SkillCatalog;
use crate::error::BattleError;
use crate::events::EntityStatus;
use crate::planning::{Side, SlotKey};
use crate::timeline::PlayOutcome;

/// Places each learned skill, in bar order, into the first free slots on
/// its target side while AP allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct Autopilot;

impl Autopilot {
    /// Returns how many actions were placed.
    pub fn plan_turn(&self, engine: &mut BattleEngine) -> usize {
        let Some(player) = engine.roster().player() else {
            return 0;
        };
        let learned = player.skills.clone();
        let Some(layout) = engine.planner().layout().cloned() else {
            return 0;
        };

        let mut placed = 0;
        for skill_id in &learned {
            let Some(skill) = engine.data().skill(skill_id).cloned() else {
                continue;
            };
            let Some(&cost) = engine.planner().budget().costs.get(skill_id) else {
                continue;
            };

            let side = skill.target_side();
            let preferred: Vec<&String> = if skill.target.selection.selected_parts.is_empty() {
                skill.target.selection.candidate_parts.iter().collect()
            } else {
                skill.target.selection.selected_parts.iter().collect()
            };
            let mut slots: Vec<SlotKey> = layout.slots(side);
            if !preferred.is_empty() {
                slots.retain(|slot| preferred.contains(&&slot.part));
            }

            let mut uses = engine.planner().placements_for_skill(skill_id);
            for slot in slots {
                if uses >= skill.select_count() || engine.planner().remaining_ap() < cost {
                    break;
                }
                if engine.planner().action_for_slot(&slot).is_some() || !target_has_part(engine, &slot) {
                    continue;
                }
                if engine
                    .assign_skill_to_slot(&slot.to_string(), skill_id, None)
                    .is_ok()
                {
                    uses += 1;
                    placed += 1;
                }
            }
        }
        debug!(turn = engine.turn(), placed, "autopilot planned");
        placed
    }
}

/// Whether the slot side's default target can be hit on `slot.part`.
fn target_has_part(engine: &BattleEngine, slot: &SlotKey) -> bool {
    let budget = engine.planner().budget();
    let target = match slot.side {
        Side::Player => Some(budget.player_target.as_str()),
        Side::Enemy => budget.enemy_target.as_deref(),
    };
    target
        .and_then(|id| engine.roster().get(id))
        .is_some_and(|entity| entity.body_parts.is_empty() || entity.body_parts.contains_key(&slot.part))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BattleSummary {
    pub battle_id: Option<Uuid>,
    pub level_id: String,
    /// `victory`, `defeat` or `timeout`.
    pub result: String,
    pub turns: u32,
    pub seed: u64,
    pub actions: usize,
    pub player: Option<EntityStatus>,
    pub enemies: Vec<EntityStatus>,
    pub started_at: String,
    pub finished_at: String,
}

/// Plays `level_id` to the end with the [`Autopilot`], stopping after
/// `max_turns` turns without a result.
pub async fn run_battle(
    engine: &mut BattleEngine,
    level_id: &str,
    max_turns: u32,
    seed: u64,
) -> Result<BattleSummary, BattleError> {
    let started_at = Utc::now();
    engine.start_battle(level_id)?;
    let pilot = Autopilot;

    while engine.result().is_none() && engine.turn() <= max_turns {
        pilot.plan_turn(engine);
        match engine.commit_turn().await? {
            PlayOutcome::Finished | PlayOutcome::Stopped | PlayOutcome::Halted => {}
            PlayOutcome::Paused => break,
        }
    }

    let result = engine.result().map_or("timeout", |result| result.as_str());
    let turns = engine.turn().min(max_turns);
    info!(level = level_id, result, turns, "autoplay finished");
    Ok(BattleSummary {
        battle_id: engine.battle_id(),
        level_id: level_id.to_string(),
        result: result.to_string(),
        turns,
        seed,
        actions: engine.report_rows().len(),
        player: engine.roster().player().map(|player| player.status()),
        enemies: engine.roster().enemies().map(|enemy| enemy.status()).collect(),
        started_at: started_at.to_rfc3339(),
        finished_at: Utc::now().to_rfc3339(),
    })
}
