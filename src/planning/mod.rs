//! Planning phase: slot addressing and the per-turn planner.

pub mod planner;
pub mod slot;

pub use planner::{
    AssignRequest, PlanManyReport, PlannedAction, PlanningDraft, PlanningSnapshot, SkillDraft,
    SlotFailure, TurnBudget, TurnPlanner,
};
pub use slot::{Side, SideCapacity, SlotKey, SlotLayout};
