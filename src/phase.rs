//! Session phase state machine (login → menus → battle → settlement).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::events::{BattleEvent, EventBus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Init,
    Login,
    MainMenu,
    LevelSelect,
    BattlePrepare,
    BattleLoop,
    BattleSettlement,
}

impl GameState {
    pub const ALL: [GameState; 7] = [
        Self::Init,
        Self::Login,
        Self::MainMenu,
        Self::LevelSelect,
        Self::BattlePrepare,
        Self::BattleLoop,
        Self::BattleSettlement,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Login => "LOGIN",
            Self::MainMenu => "MAIN_MENU",
            Self::LevelSelect => "LEVEL_SELECT",
            Self::BattlePrepare => "BATTLE_PREPARE",
            Self::BattleLoop => "BATTLE_LOOP",
            Self::BattleSettlement => "BATTLE_SETTLEMENT",
        }
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| format!("invalid state: {s}"))
    }
}

type EnterHook = Box<dyn FnMut(&Value)>;
type ExitHook = Box<dyn FnMut()>;

#[derive(Default)]
struct StateHooks {
    on_enter: Vec<EnterHook>,
    on_exit: Vec<ExitHook>,
}

/// Finite state machine over [`GameState`]. Every transition runs the old
/// state's exit hooks, swaps, runs the new state's enter hooks, then
/// broadcasts `STATE_CHANGED`.
pub struct GameFsm {
    current: GameState,
    hooks: HashMap<GameState, StateHooks>,
    bus: EventBus,
}

impl GameFsm {
    pub fn new(bus: EventBus) -> Self {
        Self {
            current: GameState::Init,
            hooks: HashMap::new(),
            bus,
        }
    }

    pub fn current(&self) -> GameState {
        self.current
    }

    pub fn on_enter<F>(&mut self, state: GameState, hook: F)
    where
        F: FnMut(&Value) + 'static,
    {
        self.hooks.entry(state).or_default().on_enter.push(Box::new(hook));
    }

    pub fn on_exit<F>(&mut self, state: GameState, hook: F)
    where
        F: FnMut() + 'static,
    {
        self.hooks.entry(state).or_default().on_exit.push(Box::new(hook));
    }

    pub fn change_state(&mut self, next: GameState, params: Value) {
        let previous = self.current;
        info!(from = %previous, to = %next, "changing state");

        if let Some(hooks) = self.hooks.get_mut(&previous) {
            for hook in &mut hooks.on_exit {
                hook();
            }
        }

        self.current = next;

        if let Some(hooks) = self.hooks.get_mut(&next) {
            for hook in &mut hooks.on_enter {
                hook(&params);
            }
        }

        self.bus.emit(BattleEvent::StateChanged {
            from: previous.as_str().to_string(),
            to: next.as_str().to_string(),
            params,
        });
    }

    /// Transition by wire name. Unknown names are logged and ignored.
    pub fn change_state_named(&mut self, name: &str, params: Value) -> Result<(), String> {
        match name.parse::<GameState>() {
            Ok(state) => {
                self.change_state(state, params);
                Ok(())
            }
            Err(err) => {
                error!(state = name, "rejected transition to unknown state");
                Err(err)
            }
        }
    }
}

impl fmt::Debug for GameFsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GameFsm")
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}
