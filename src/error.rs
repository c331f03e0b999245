//! Error types for turnforge.
//!
//! Four families, matching how each is handled:
//! - [`PlanningError`]: user-facing validation, always returned and logged.
//! - [`TimelineError`]: playback faults, surfaced as `TIMELINE_ERROR`.
//! - [`ConfigError`]: authoring/data bugs, fatal to the battle.
//! - [`BuffFault`]: isolated per buff effect, reported and swallowed.

use std::path::PathBuf;

use thiserror::Error;

use crate::planning::Side;

/// Process exit codes used by the CLI.
pub struct ExitCode;

impl ExitCode {
    pub const SUCCESS: i32 = 0;
    pub const ERROR: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
    pub const IO_ERROR: i32 = 3;
    pub const BATTLE_ERROR: i32 = 5;
    pub const USAGE_ERROR: i32 = 64;
}

#[derive(Debug, Error)]
pub enum TurnforgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Battle(#[from] BattleError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl TurnforgeError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) => ExitCode::CONFIG_ERROR,
            Self::Battle(_) => ExitCode::BATTLE_ERROR,
            Self::Io(_) | Self::Csv(_) => ExitCode::IO_ERROR,
        }
    }
}

/// Data or authoring problems. These indicate a broken data set, not a
/// runtime condition, so the engine stops instead of recovering.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("skill '{skill_id}' has no numeric AP cost")]
    MissingApCost { skill_id: String },

    #[error("skill '{skill_id}' has a negative AP cost ({cost})")]
    NegativeApCost { skill_id: String, cost: i64 },

    #[error("unknown level '{0}'")]
    UnknownLevel(String),

    #[error("level '{level_id}' references unknown enemy template '{template_id}'")]
    UnknownEnemyTemplate {
        level_id: String,
        template_id: String,
    },

    #[error("level '{0}' has no enemies in its first wave")]
    EmptyLevel(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Rejections produced while negotiating a plan. Nothing is mutated when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("invalid slot key '{0}'")]
    InvalidSlotKey(String),

    #[error("slot layout not available")]
    NoLayout,

    #[error("no slot capacity for {side}:{part}")]
    NoCapacity { side: Side, part: String },

    #[error("slot index out of range for {side}:{part} (cap {capacity})")]
    SlotIndexOutOfRange {
        side: Side,
        part: String,
        capacity: u32,
    },

    #[error("slot {0} is already occupied")]
    SlotOccupied(String),

    #[error("unknown skill: {0}")]
    UnknownSkill(String),

    #[error("skill '{skill_id}' reached its max placements ({max})")]
    MaxPlacements { skill_id: String, max: u32 },

    #[error("not enough AP: need {needed}, {available} available")]
    InsufficientAp { needed: u32, available: u32 },

    #[error("slot {slot} exceeds select count {max} for skill '{skill_id}'")]
    ExceedsSelectCount {
        skill_id: String,
        slot: String,
        max: u32,
    },

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("target '{target_id}' has no body part '{part}'")]
    UnknownBodyPart { target_id: String, part: String },

    #[error("target '{0}' is already defeated")]
    TargetDefeated(String),

    #[error("skill '{0}' is not learned")]
    SkillNotLearned(String),

    #[error("planning is not allowed during {0}")]
    WrongPhase(&'static str),
}

/// Faults raised by timeline loading or playback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimelineError {
    #[error("invalid action at index {index}: {reason}")]
    InvalidAction { index: usize, reason: String },

    #[error("cannot {operation} timeline in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("entry {entry_id} failed: {message}")]
    EntryFailed { entry_id: String, message: String },
}

/// Errors from the battle orchestrator's turn lifecycle.
#[derive(Debug, Error)]
pub enum BattleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error("planning commit rejected with {} error(s)", .0.len())]
    CommitRejected(Vec<PlanningError>),

    #[error("command rejected: {0}")]
    Rejected(String),

    #[error("no battle in progress")]
    NoBattle,
}

/// A buff effect that could not be applied. Reported, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuffFault {
    #[error("action '{0}' is not supported")]
    UnsupportedAction(String),

    #[error("formula '{formula}' rejected: {message}")]
    Formula { formula: String, message: String },

    #[error("effect is missing parameter '{0}'")]
    MissingParameter(&'static str),

    #[error("buff definition '{0}' not found")]
    UnknownBuff(String),

    #[error("effect target '{0}' is not present in this context")]
    MissingTarget(String),
}

impl BuffFault {
    /// `true` for faults that are data warnings rather than handler errors.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::UnsupportedAction(_) | Self::UnknownBuff(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_family() {
        let config: TurnforgeError = ConfigError::UnknownLevel("x".into()).into();
        assert_eq!(config.exit_code(), ExitCode::CONFIG_ERROR);

        let battle: TurnforgeError = BattleError::NoBattle.into();
        assert_eq!(battle.exit_code(), ExitCode::BATTLE_ERROR);

        let io: TurnforgeError = std::io::Error::other("disk").into();
        assert_eq!(io.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn planning_errors_render_user_facing_reasons() {
        let err = PlanningError::InsufficientAp {
            needed: 5,
            available: 3,
        };
        assert_eq!(err.to_string(), "not enough AP: need 5, 3 available");

        let err = PlanningError::NoCapacity {
            side: Side::Enemy,
            part: "head".into(),
        };
        assert_eq!(err.to_string(), "no slot capacity for enemy:head");
    }
}
