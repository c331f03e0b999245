pub mod context;
pub mod damage;
pub mod enemy_ai;
pub mod engine;
pub mod entity;
pub mod rng;
pub mod snapshot;

pub use context::{CombatContext, CounterHit, TempModifier};
pub use damage::{absorb_armor, ActionOutcome, ArmorHit, DamagePipeline, Fate, ARMOR_MITIGATION_MULT};
pub use enemy_ai::{choose_part, plan_enemy_actions};
pub use engine::{BattleEngine, BattlePhase, BattleResult};
pub use entity::{BodyPart, Entity, Roster, Stats};
pub use rng::Rng;
pub use snapshot::{ActionQueues, BattleRules, BattleSnapshot, PlanningState};
