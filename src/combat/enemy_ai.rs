//! Deterministic enemy planning: each living enemy uses its first listed
//! skill.

use tracing::{debug, warn};

use crate::combat::engine::checked_cost;
use crate::combat::entity::{Entity, Roster};
use crate::combat::rng::Rng;
use crate::data::{SkillCatalog, SkillConfig, TargetSubject};
use crate::error::ConfigError;
use crate::planning::{PlannedAction, Side};

const FALLBACK_PART: &str = "body";

/// Picks the part a skill hits on `target`: selected parts, then candidate
/// parts, then the target's first armored part. Random modes draw from the
/// filtered list with `rng`.
pub fn choose_part(skill: &SkillConfig, target: &Entity, rng: &mut Rng) -> String {
    let selection = &skill.target.selection;
    let known = |parts: &[String]| -> Vec<String> {
        parts
            .iter()
            .filter(|part| target.body_parts.contains_key(part.as_str()))
            .cloned()
            .collect()
    };

    let mut pool = known(&selection.selected_parts);
    if pool.is_empty() {
        pool = known(&selection.candidate_parts);
    }
    if selection.mode.is_random() && pool.is_empty() {
        pool = target.body_parts.keys().cloned().collect();
    }

    let picked = if selection.mode.is_random() {
        rng.pick(pool.len()).map(|i| pool.swap_remove(i))
    } else {
        pool.into_iter().next()
    };
    picked
        .or_else(|| target.default_part().map(str::to_string))
        .unwrap_or_else(|| FALLBACK_PART.to_string())
}

/// One action per living enemy that knows a usable skill. A skill without a
/// valid AP cost is a data error, same as on the player side.
pub fn plan_enemy_actions(
    roster: &Roster,
    skills: &impl SkillCatalog,
    rng: &mut Rng,
) -> Result<Vec<PlannedAction>, ConfigError> {
    let Some(player) = roster.player() else {
        return Ok(Vec::new());
    };

    let mut actions = Vec::new();
    for enemy in roster.living_enemies() {
        let Some(skill) = enemy.skills.first().and_then(|id| skills.skill(id)) else {
            warn!(enemy = %enemy.id, "enemy has no usable skill");
            continue;
        };
        let target = match skill.target.subject {
            TargetSubject::Caster => enemy,
            TargetSubject::Enemy => player,
        };
        let cost = checked_cost(&skill.id, skill.cost)?;
        let body_part = choose_part(skill, target, rng);
        let action = PlannedAction {
            action_id: format!("e_{}_{}", enemy.id, actions.len() + 1),
            source: Side::Enemy,
            source_id: enemy.id.clone(),
            skill_id: skill.id.clone(),
            target_id: target.id.clone(),
            body_part,
            cost,
            speed: enemy.effective_speed() + skill.speed,
            priority: skill.priority,
            time: None,
            slot_key: None,
        };
        debug!(enemy = %enemy.id, skill = %action.skill_id, part = %action.body_part, "enemy action planned");
        actions.push(action);
    }
    Ok(actions)
}
