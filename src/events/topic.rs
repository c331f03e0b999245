use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Event bus topics. The string names are the contract with UI observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Topic {
    BattleStart,
    TurnStart,
    TurnEnd,
    BattleUpdate,
    BattleLog,
    BattleActionPre,
    BattleAttackPre,
    BattleAttackPost,
    BattleTakeDamagePre,
    BattleTakeDamage,
    BattleDefendPost,
    BattleDeathCheck,
    PlanningCommitted,
    PlanningCommitFailed,
    BuffUpdate,
    BuffAdded,
    BuffRemoved,
    BuffWarn,
    BuffError,
    DataUpdate,
    StateChanged,
    TimelineReady,
    TimelineStart,
    TimelinePause,
    TimelineFinished,
    TimelineEntryStart,
    TimelineEntryEnd,
    TimelineError,
    TimelineSnapshot,
}

impl Topic {
    pub const ALL: [Topic; 29] = [
        Self::BattleStart,
        Self::TurnStart,
        Self::TurnEnd,
        Self::BattleUpdate,
        Self::BattleLog,
        Self::BattleActionPre,
        Self::BattleAttackPre,
        Self::BattleAttackPost,
        Self::BattleTakeDamagePre,
        Self::BattleTakeDamage,
        Self::BattleDefendPost,
        Self::BattleDeathCheck,
        Self::PlanningCommitted,
        Self::PlanningCommitFailed,
        Self::BuffUpdate,
        Self::BuffAdded,
        Self::BuffRemoved,
        Self::BuffWarn,
        Self::BuffError,
        Self::DataUpdate,
        Self::StateChanged,
        Self::TimelineReady,
        Self::TimelineStart,
        Self::TimelinePause,
        Self::TimelineFinished,
        Self::TimelineEntryStart,
        Self::TimelineEntryEnd,
        Self::TimelineError,
        Self::TimelineSnapshot,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BattleStart => "BATTLE_START",
            Self::TurnStart => "TURN_START",
            Self::TurnEnd => "TURN_END",
            Self::BattleUpdate => "BATTLE_UPDATE",
            Self::BattleLog => "BATTLE_LOG",
            Self::BattleActionPre => "BATTLE_ACTION_PRE",
            Self::BattleAttackPre => "BATTLE_ATTACK_PRE",
            Self::BattleAttackPost => "BATTLE_ATTACK_POST",
            Self::BattleTakeDamagePre => "BATTLE_TAKE_DAMAGE_PRE",
            Self::BattleTakeDamage => "BATTLE_TAKE_DAMAGE",
            Self::BattleDefendPost => "BATTLE_DEFEND_POST",
            Self::BattleDeathCheck => "BATTLE_DEATH_CHECK",
            Self::PlanningCommitted => "PLANNING_COMMITTED",
            Self::PlanningCommitFailed => "PLANNING_COMMIT_FAILED",
            Self::BuffUpdate => "BUFF_UPDATE",
            Self::BuffAdded => "BUFF_ADDED",
            Self::BuffRemoved => "BUFF_REMOVED",
            Self::BuffWarn => "BUFF_WARN",
            Self::BuffError => "BUFF_ERROR",
            Self::DataUpdate => "DATA_UPDATE",
            Self::StateChanged => "STATE_CHANGED",
            Self::TimelineReady => "TIMELINE_READY",
            Self::TimelineStart => "TIMELINE_START",
            Self::TimelinePause => "TIMELINE_PAUSE",
            Self::TimelineFinished => "TIMELINE_FINISHED",
            Self::TimelineEntryStart => "TIMELINE_ENTRY_START",
            Self::TimelineEntryEnd => "TIMELINE_ENTRY_END",
            Self::TimelineError => "TIMELINE_ERROR",
            Self::TimelineSnapshot => "TIMELINE_SNAPSHOT",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| format!("unknown topic '{s}'"))
    }
}
