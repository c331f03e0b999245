//! Typed payloads carried on the event bus.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::buff::BuffRecord;
use crate::combat::CombatContext;
use crate::events::Topic;
use crate::planning::PlannedAction;
use crate::timeline::{TimelineEntry, TimelineSnapshot};

/// One structured reason attached to `PLANNING_COMMIT_FAILED`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_key: Option<String>,
    pub reason: String,
}

/// Current HP/AP of one entity, sent with `DATA_UPDATE`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStatus {
    pub entity_id: String,
    pub hp: f64,
    pub max_hp: f64,
    pub ap: f64,
    pub max_ap: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum BattleEvent {
    #[serde(rename_all = "camelCase")]
    BattleStart {
        battle_id: Uuid,
        level_id: String,
        player_id: String,
        enemy_ids: Vec<String>,
    },
    TurnStart {
        turn: u32,
    },
    #[serde(rename_all = "camelCase")]
    TurnEnd {
        turn: u32,
        expired: Vec<(String, String)>,
    },
    #[serde(rename_all = "camelCase")]
    BattleUpdate {
        turn: u32,
        phase: &'static str,
        used_ap: u32,
        available_ap: u32,
        planned: usize,
    },
    BattleLog {
        text: String,
    },
    /// Pipeline stage broadcast; `topic` is one of the `BATTLE_*` pipeline topics.
    Combat {
        topic: Topic,
        context: CombatContext,
    },
    PlanningCommitted {
        turn: u32,
        actions: Vec<PlannedAction>,
    },
    PlanningCommitFailed {
        turn: u32,
        errors: Vec<CommitFailure>,
    },
    #[serde(rename_all = "camelCase")]
    BuffUpdate {
        owner_id: String,
        buffs: Vec<BuffRecord>,
    },
    #[serde(rename_all = "camelCase")]
    BuffAdded {
        owner_id: String,
        buff_id: String,
        stacks: u32,
        remaining: i32,
        refreshed: bool,
    },
    #[serde(rename_all = "camelCase")]
    BuffRemoved {
        owner_id: String,
        buff_id: String,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    BuffWarn {
        owner_id: String,
        buff_id: String,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    BuffError {
        owner_id: String,
        buff_id: String,
        trigger: String,
        action: String,
        error: String,
    },
    DataUpdate(EntityStatus),
    StateChanged {
        from: String,
        to: String,
        params: Value,
    },
    #[serde(rename_all = "camelCase")]
    TimelineReady {
        round_id: u32,
        count: usize,
    },
    #[serde(rename_all = "camelCase")]
    TimelineStart {
        round_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    TimelinePause {
        round_id: u32,
    },
    #[serde(rename_all = "camelCase")]
    TimelineFinished {
        round_id: u32,
        count: usize,
    },
    TimelineEntryStart {
        entry: Box<TimelineEntry>,
        index: usize,
    },
    TimelineEntryEnd {
        entry: Box<TimelineEntry>,
        index: usize,
        result: Value,
    },
    #[serde(rename_all = "camelCase")]
    TimelineError {
        message: String,
        entry_id: Option<String>,
    },
    TimelineSnapshot(TimelineSnapshot),
}

impl BattleEvent {
    pub fn topic(&self) -> Topic {
        match self {
            Self::BattleStart { .. } => Topic::BattleStart,
            Self::TurnStart { .. } => Topic::TurnStart,
            Self::TurnEnd { .. } => Topic::TurnEnd,
            Self::BattleUpdate { .. } => Topic::BattleUpdate,
            Self::BattleLog { .. } => Topic::BattleLog,
            Self::Combat { topic, .. } => *topic,
            Self::PlanningCommitted { .. } => Topic::PlanningCommitted,
            Self::PlanningCommitFailed { .. } => Topic::PlanningCommitFailed,
            Self::BuffUpdate { .. } => Topic::BuffUpdate,
            Self::BuffAdded { .. } => Topic::BuffAdded,
            Self::BuffRemoved { .. } => Topic::BuffRemoved,
            Self::BuffWarn { .. } => Topic::BuffWarn,
            Self::BuffError { .. } => Topic::BuffError,
            Self::DataUpdate(_) => Topic::DataUpdate,
            Self::StateChanged { .. } => Topic::StateChanged,
            Self::TimelineReady { .. } => Topic::TimelineReady,
            Self::TimelineStart { .. } => Topic::TimelineStart,
            Self::TimelinePause { .. } => Topic::TimelinePause,
            Self::TimelineFinished { .. } => Topic::TimelineFinished,
            Self::TimelineEntryStart { .. } => Topic::TimelineEntryStart,
            Self::TimelineEntryEnd { .. } => Topic::TimelineEntryEnd,
            Self::TimelineError { .. } => Topic::TimelineError,
            Self::TimelineSnapshot(_) => Topic::TimelineSnapshot,
        }
    }

    pub fn log(text: impl Into<String>) -> Self {
        Self::BattleLog { text: text.into() }
    }
}
