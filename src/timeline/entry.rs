//! Timeline entries and the ordering rules applied when a round is loaded.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TimelineError;
use crate::planning::{PlannedAction, Side};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionState {
    #[default]
    Pending,
    Running,
    Done,
    Error,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub state: ExecutionState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One scheduled action. Everything except `execution` is fixed once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub entry_id: String,
    pub round_id: u32,
    pub side: Side,
    pub actor_id: String,
    pub skill_id: String,
    pub time: f64,
    pub priority: i32,
    pub stable_index: usize,
    pub source_action: PlannedAction,
    pub execution: Execution,
}

impl TimelineEntry {
    /// Builds an entry; `time` falls back to `-speed` when the action has none.
    pub fn build(
        action: &PlannedAction,
        side: Side,
        round_id: u32,
        stable_index: usize,
    ) -> Result<Self, TimelineError> {
        let invalid = |reason: &str| TimelineError::InvalidAction {
            index: stable_index,
            reason: reason.to_string(),
        };
        if action.skill_id.is_empty() {
            return Err(invalid("missing skillId"));
        }
        let speed = if action.speed.is_finite() { action.speed } else { 0.0 };
        let time = action.time.unwrap_or(-speed);
        if !time.is_finite() {
            return Err(invalid("time is not a finite number"));
        }
        let actor_id = if action.source_id.is_empty() {
            match side {
                Side::Player => "player".to_string(),
                Side::Enemy => "enemy".to_string(),
            }
        } else {
            action.source_id.clone()
        };

        Ok(Self {
            entry_id: format!("te_{round_id}_{}", stable_index + 1),
            round_id,
            side,
            actor_id,
            skill_id: action.skill_id.clone(),
            time,
            priority: action.priority,
            stable_index,
            source_action: action.clone(),
            execution: Execution::default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TieBreak {
    SelfFirst,
    EnemyFirst,
    /// Favoured side flips every round: self on odd rounds, enemy on even.
    Alternate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRules {
    #[serde(default)]
    pub tie_break: Option<TieBreak>,
    #[serde(default)]
    pub side_priority: Option<Side>,
}

impl RoundRules {
    pub fn tie_break(tie_break: TieBreak) -> Self {
        Self {
            tie_break: Some(tie_break),
            side_priority: None,
        }
    }

    fn favoured_side(&self, round_id: u32) -> Side {
        match (self.tie_break, self.side_priority) {
            (Some(TieBreak::Alternate), _) => {
                if round_id % 2 == 1 {
                    Side::Player
                } else {
                    Side::Enemy
                }
            }
            (Some(TieBreak::SelfFirst), _) => Side::Player,
            (Some(TieBreak::EnemyFirst), _) => Side::Enemy,
            (None, Some(side)) => side,
            (None, None) => Side::Player,
        }
    }

    fn side_rank(&self, side: Side, round_id: u32) -> u8 {
        u8::from(side != self.favoured_side(round_id))
    }
}

/// Total order: time ascending, priority descending, side rank, then
/// insertion order.
pub fn compare_entries(a: &TimelineEntry, b: &TimelineEntry, rules: &RoundRules) -> Ordering {
    a.time
        .total_cmp(&b.time)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| {
            rules
                .side_rank(a.side, a.round_id)
                .cmp(&rules.side_rank(b.side, b.round_id))
        })
        .then_with(|| a.stable_index.cmp(&b.stable_index))
}

pub fn sort_entries(entries: &mut [TimelineEntry], rules: &RoundRules) {
    entries.sort_by(|a, b| compare_entries(a, b, rules));
}
