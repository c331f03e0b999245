//! Buffs: definitions, per-entity instances, stacking and trigger dispatch.

pub mod actions;
pub mod formula;
pub mod instance;
pub mod manager;
pub mod registry;
pub mod stacking;
pub mod system;

pub use actions::{ActionKind, EffectCtx};
pub use formula::{Formula, FormulaScope, StatValues};
pub use instance::{AddOptions, BuffInstance};
pub use manager::{AddOutcome, BuffManager, BuffRecord};
pub use registry::{
    BuffDefinition, BuffEffect, BuffRegistry, EffectParams, EffectTarget, EffectValue, Lifecycle, StackStrategy,
    StatModifier, Trigger,
};
pub use stacking::{ModifierContribution, ModifierKind, ModifierStacking, ModifierTotals};
pub use system::{trigger_for, BuffSystem};
