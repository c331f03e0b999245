//! Round timeline: builds a deterministic, speed-ordered sequence of entries
//! from both sides' planned actions and steps through it with an external
//! executor.

pub mod entry;
pub mod manager;

pub use entry::{compare_entries, sort_entries, Execution, ExecutionState, RoundRules, TieBreak, TimelineEntry};
pub use manager::{
    EntryExecutor, EntrySummary, PlayOptions, PlayOutcome, StepOutcome, TimelineControl, TimelineManager,
    TimelinePhase, TimelineSnapshot,
};
