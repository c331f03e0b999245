use serde::{Deserialize, Serialize};

use crate::planning::{PlannedAction, PlanningSnapshot, SlotLayout};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionQueues {
    pub player: Vec<PlannedAction>,
    pub enemy: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningState {
    pub player: PlanningSnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleRules {
    pub slot_layout_id: Option<String>,
    pub slot_layout: Option<SlotLayout>,
}

/// Value copy of the runtime battle state handed to persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleSnapshot {
    pub turn: u32,
    pub phase: String,
    pub queues: ActionQueues,
    pub planning: PlanningState,
    pub battle_rules: BattleRules,
}
