use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::TimelineError;
use crate::events::{BattleEvent, EventBus};
use crate::planning::{PlannedAction, Side};
use crate::timeline::entry::{sort_entries, ExecutionState, RoundRules, TimelineEntry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelinePhase {
    #[default]
    Idle,
    Ready,
    Playing,
    Paused,
    Finished,
    Error,
}

impl TimelinePhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Ready => "READY",
            Self::Playing => "PLAYING",
            Self::Paused => "PAUSED",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }
}

/// Runs one entry on behalf of the timeline.
///
/// `can_continue` is polled before every step; returning `false` pauses
/// playback without treating it as an error.
#[allow(async_fn_in_trait)]
pub trait EntryExecutor {
    async fn execute_entry(&mut self, entry: &TimelineEntry) -> Result<Value, String>;

    fn can_continue(&self) -> bool {
        true
    }
}

/// Cloneable handle for requesting a pause or stop from outside the
/// playback loop. Requests are honoured at the next step boundary.
#[derive(Debug, Clone, Default)]
pub struct TimelineControl {
    pause: Rc<Cell<bool>>,
    stop: Rc<Cell<bool>>,
}

impl TimelineControl {
    pub fn request_pause(&self) {
        self.pause.set(true);
    }

    pub fn request_stop(&self) {
        self.stop.set(true);
    }

    fn clear(&self) {
        self.pause.set(false);
        self.stop.set(false);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    pub step_delay: Duration,
}

impl PlayOptions {
    pub fn with_delay_ms(ms: u64) -> Self {
        Self {
            step_delay: Duration::from_millis(ms),
        }
    }
}

/// How a call to [`TimelineManager::start`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Finished,
    /// The executor's host guard refused to continue; timeline is PAUSED.
    Stopped,
    Paused,
    /// A stop request ended playback; timeline is FINISHED.
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed(usize),
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntrySummary {
    pub entry_id: String,
    pub side: Side,
    pub actor_id: String,
    pub skill_id: String,
    pub time: f64,
    pub priority: i32,
    pub execution_state: ExecutionState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSnapshot {
    pub phase: TimelinePhase,
    pub round_id: Option<u32>,
    pub current_index: Option<usize>,
    pub entries: Vec<EntrySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct TimelineManager {
    bus: EventBus,
    phase: TimelinePhase,
    round_id: Option<u32>,
    current_index: Option<usize>,
    entries: Vec<TimelineEntry>,
    last_error: Option<String>,
    control: TimelineControl,
}

impl TimelineManager {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            phase: TimelinePhase::Idle,
            round_id: None,
            current_index: None,
            entries: Vec::new(),
            last_error: None,
            control: TimelineControl::default(),
        }
    }

    pub fn phase(&self) -> TimelinePhase {
        self.phase
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn control(&self) -> TimelineControl {
        self.control.clone()
    }

    pub fn reset(&mut self) {
        self.phase = TimelinePhase::Idle;
        self.round_id = None;
        self.current_index = None;
        self.entries.clear();
        self.last_error = None;
        self.control.clear();
    }

    pub fn snapshot(&self) -> TimelineSnapshot {
        TimelineSnapshot {
            phase: self.phase,
            round_id: self.round_id,
            current_index: self.current_index,
            entries: self
                .entries
                .iter()
                .map(|entry| EntrySummary {
                    entry_id: entry.entry_id.clone(),
                    side: entry.side,
                    actor_id: entry.actor_id.clone(),
                    skill_id: entry.skill_id.clone(),
                    time: entry.time,
                    priority: entry.priority,
                    execution_state: entry.execution.state,
                })
                .collect(),
            error: self.last_error.clone(),
        }
    }

    fn publish_snapshot(&self) {
        self.bus.emit(BattleEvent::TimelineSnapshot(self.snapshot()));
    }

    fn fail(&mut self, error: TimelineError, entry_id: Option<String>) -> TimelineError {
        warn!(%error, "timeline failed");
        self.phase = TimelinePhase::Error;
        self.last_error = Some(error.to_string());
        self.bus.emit(BattleEvent::TimelineError {
            message: error.to_string(),
            entry_id,
        });
        self.publish_snapshot();
        error
    }

    /// Reports an operation attempted from the wrong phase. The phase is left alone.
    fn reject(&self, operation: &'static str) -> TimelineError {
        let error = TimelineError::InvalidPhase {
            operation,
            phase: self.phase.as_str(),
        };
        warn!(%error, "timeline operation rejected");
        self.bus.emit(BattleEvent::TimelineError {
            message: error.to_string(),
            entry_id: None,
        });
        error
    }

    /// Builds and orders one round's entries; self actions come first in
    /// insertion order. Any bad action moves the timeline to ERROR.
    pub fn load_round_actions(
        &mut self,
        round_id: u32,
        self_plans: &[PlannedAction],
        enemy_plans: &[PlannedAction],
        rules: &RoundRules,
    ) -> Result<usize, TimelineError> {
        let tagged = self_plans
            .iter()
            .map(|action| (action, Side::Player))
            .chain(enemy_plans.iter().map(|action| (action, Side::Enemy)));

        let mut entries = Vec::with_capacity(self_plans.len() + enemy_plans.len());
        for (index, (action, side)) in tagged.enumerate() {
            match TimelineEntry::build(action, side, round_id, index) {
                Ok(entry) => entries.push(entry),
                Err(error) => return Err(self.fail(error, None)),
            }
        }
        sort_entries(&mut entries, rules);

        self.round_id = Some(round_id);
        self.entries = entries;
        self.current_index = None;
        self.last_error = None;
        self.phase = TimelinePhase::Ready;
        self.control.clear();

        let count = self.entries.len();
        info!(round = round_id, count, "timeline ready");
        self.bus.emit(BattleEvent::TimelineReady { round_id, count });
        self.publish_snapshot();
        Ok(count)
    }

    fn has_pending(&self) -> bool {
        self.next_index() < self.entries.len()
    }

    fn next_index(&self) -> usize {
        self.current_index.map_or(0, |i| i + 1)
    }

    fn round(&self) -> u32 {
        self.round_id.unwrap_or(0)
    }

    /// Plays from READY or PAUSED until every entry ran, a pause/stop was
    /// requested, or the executor's host guard says no.
    pub async fn start<E: EntryExecutor>(
        &mut self,
        executor: &mut E,
        options: PlayOptions,
    ) -> Result<PlayOutcome, TimelineError> {
        if !matches!(self.phase, TimelinePhase::Ready | TimelinePhase::Paused) {
            return Err(self.reject("start"));
        }

        self.phase = TimelinePhase::Playing;
        self.bus.emit(BattleEvent::TimelineStart {
            round_id: self.round(),
        });
        self.publish_snapshot();

        while self.has_pending() {
            if self.control.stop.replace(false) {
                self.stop();
                return Ok(PlayOutcome::Halted);
            }
            if self.control.pause.replace(false) {
                self.pause();
                return Ok(PlayOutcome::Paused);
            }
            if !executor.can_continue() {
                debug!(round = self.round(), "host guard stopped playback");
                self.pause();
                return Ok(PlayOutcome::Stopped);
            }

            self.step(executor).await?;

            if self.has_pending() && !options.step_delay.is_zero() {
                tokio::time::sleep(options.step_delay).await;
            }
        }

        if self.phase == TimelinePhase::Playing {
            self.finish();
        }
        Ok(PlayOutcome::Finished)
    }

    pub async fn resume<E: EntryExecutor>(
        &mut self,
        executor: &mut E,
        options: PlayOptions,
    ) -> Result<PlayOutcome, TimelineError> {
        if self.phase != TimelinePhase::Paused {
            return Err(self.reject("resume"));
        }
        self.start(executor, options).await
    }

    pub fn pause(&mut self) {
        if self.phase != TimelinePhase::Playing {
            return;
        }
        self.phase = TimelinePhase::Paused;
        self.bus.emit(BattleEvent::TimelinePause {
            round_id: self.round(),
        });
        self.publish_snapshot();
    }

    /// Idempotent; lands in FINISHED from any non-terminal phase.
    pub fn stop(&mut self) {
        if matches!(
            self.phase,
            TimelinePhase::Ready | TimelinePhase::Playing | TimelinePhase::Paused
        ) {
            self.phase = TimelinePhase::Finished;
            self.publish_snapshot();
        }
    }

    fn finish(&mut self) {
        self.phase = TimelinePhase::Finished;
        info!(round = self.round(), count = self.entries.len(), "timeline finished");
        self.bus.emit(BattleEvent::TimelineFinished {
            round_id: self.round(),
            count: self.entries.len(),
        });
        self.publish_snapshot();
    }

    /// Runs the next pending entry. An executor failure marks the entry and
    /// the whole timeline ERROR; nothing is retried.
    pub async fn step<E: EntryExecutor>(&mut self, executor: &mut E) -> Result<StepOutcome, TimelineError> {
        if !matches!(
            self.phase,
            TimelinePhase::Ready | TimelinePhase::Playing | TimelinePhase::Paused
        ) {
            return Err(self.reject("step"));
        }

        let index = self.next_index();
        if index >= self.entries.len() {
            self.finish();
            return Ok(StepOutcome::Exhausted);
        }

        self.current_index = Some(index);
        self.entries[index].execution.state = ExecutionState::Running;
        let entry = self.entries[index].clone();
        debug!(entry = %entry.entry_id, actor = %entry.actor_id, skill = %entry.skill_id, "timeline step");
        self.bus.emit(BattleEvent::TimelineEntryStart {
            entry: Box::new(entry.clone()),
            index,
        });
        self.publish_snapshot();

        match executor.execute_entry(&entry).await {
            Ok(result) => {
                let slot = &mut self.entries[index];
                slot.execution.state = ExecutionState::Done;
                slot.execution.result = Some(result.clone());
                self.bus.emit(BattleEvent::TimelineEntryEnd {
                    entry: Box::new(slot.clone()),
                    index,
                    result,
                });
                self.publish_snapshot();
                Ok(StepOutcome::Executed(index))
            }
            Err(message) => {
                let slot = &mut self.entries[index];
                slot.execution.state = ExecutionState::Error;
                slot.execution.error = Some(message.clone());
                let entry_id = slot.entry_id.clone();
                Err(self.fail(
                    TimelineError::EntryFailed {
                        entry_id: entry_id.clone(),
                        message,
                    },
                    Some(entry_id),
                ))
            }
        }
    }
}
