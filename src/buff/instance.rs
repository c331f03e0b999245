use std::collections::BTreeMap;
use std::rc::Rc;

use crate::buff::registry::{BuffDefinition, StackStrategy, Trigger};

/// Per-add overrides of the definition's lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddOptions {
    pub stacks: Option<u32>,
    pub duration: Option<i32>,
    pub max_stacks: Option<u32>,
    pub strategy: Option<StackStrategy>,
    /// Turns added by the `extend` strategy (default 1).
    pub extend_by: Option<i32>,
}

impl AddOptions {
    pub fn stacks(stacks: u32) -> Self {
        Self {
            stacks: Some(stacks),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct BuffInstance {
    pub id: String,
    pub instance_id: String,
    pub definition: Rc<BuffDefinition>,
    pub duration: i32,
    pub remaining: i32,
    pub stacks: u32,
    pub max_stacks: u32,
    pub strategy: StackStrategy,
    pub tags: Vec<String>,
    trigger_counts: BTreeMap<Trigger, u32>,
}

impl BuffInstance {
    pub fn new(definition: Rc<BuffDefinition>, instance_id: String, options: &AddOptions) -> Self {
        let lifecycle = definition.lifecycle;
        let duration = options.duration.unwrap_or(lifecycle.duration);
        let max_stacks = options.max_stacks.unwrap_or(lifecycle.max_stacks).max(1);
        Self {
            id: definition.id.clone(),
            instance_id,
            duration,
            remaining: duration,
            stacks: options.stacks.unwrap_or(1).clamp(1, max_stacks),
            max_stacks,
            strategy: options.strategy.unwrap_or(lifecycle.stack_strategy),
            tags: definition.tags.clone(),
            definition,
            trigger_counts: BTreeMap::new(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        self.duration == -1
    }

    pub fn is_expired(&self) -> bool {
        !self.is_permanent() && self.remaining <= 0
    }

    pub fn tick(&mut self) {
        if !self.is_permanent() && self.remaining > 0 {
            self.remaining -= 1;
        }
    }

    fn refresh_duration(&mut self) {
        if !self.is_permanent() {
            self.remaining = self.duration;
        }
    }

    /// Re-application of the same buff under `strategy`.
    pub fn restack(&mut self, strategy: StackStrategy, options: &AddOptions) {
        let max_stacks = options.max_stacks.unwrap_or(self.max_stacks).max(1);
        let incoming = options.stacks.unwrap_or(1);
        match strategy {
            StackStrategy::Add => {
                self.stacks = (self.stacks + incoming).min(max_stacks);
                self.refresh_duration();
            }
            StackStrategy::Extend => {
                if !self.is_permanent() {
                    self.remaining += options.extend_by.unwrap_or(1);
                }
            }
            StackStrategy::Replace => {
                self.stacks = incoming.clamp(1, max_stacks);
                self.refresh_duration();
            }
            StackStrategy::Refresh | StackStrategy::Independent => self.refresh_duration(),
        }
        self.max_stacks = max_stacks;
    }

    pub fn record_trigger(&mut self, trigger: Trigger) {
        *self.trigger_counts.entry(trigger).or_insert(0) += 1;
    }

    pub fn trigger_count(&self, trigger: Trigger) -> u32 {
        self.trigger_counts.get(&trigger).copied().unwrap_or(0)
    }
}
