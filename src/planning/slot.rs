//! Slot addressing: which side, which body part, which capacity unit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlanningError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "self")]
    Player,
    #[serde(rename = "enemy")]
    Enemy,
}

impl Side {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Player => "self",
            Self::Enemy => "enemy",
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Player => Self::Enemy,
            Self::Enemy => Self::Player,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "self" => Ok(Self::Player),
            "enemy" => Ok(Self::Enemy),
            other => Err(format!("unknown side '{other}'")),
        }
    }
}

/// Structured `side:part:index` address. Parsed once at the boundary and
/// never re-parsed internally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SlotKey {
    pub side: Side,
    pub part: String,
    pub index: u32,
}

impl SlotKey {
    pub fn new(side: Side, part: impl Into<String>, index: u32) -> Self {
        Self {
            side,
            part: part.into(),
            index,
        }
    }

    pub fn parse(raw: &str) -> Result<Self, PlanningError> {
        let invalid = || PlanningError::InvalidSlotKey(raw.to_string());
        let mut pieces = raw.split(':');
        let (Some(side), Some(part), Some(index), None) =
            (pieces.next(), pieces.next(), pieces.next(), pieces.next())
        else {
            return Err(invalid());
        };
        let side = side.parse::<Side>().map_err(|_| invalid())?;
        if part.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index = index.parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(side, part, index))
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.side, self.part, self.index)
    }
}

impl FromStr for SlotKey {
    type Err = PlanningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for SlotKey {
    type Error = PlanningError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SlotKey> for String {
    fn from(value: SlotKey) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideCapacity {
    #[serde(rename = "self", default)]
    pub player: u32,
    #[serde(default)]
    pub enemy: u32,
}

impl SideCapacity {
    pub const fn for_side(self, side: Side) -> u32 {
        match side {
            Side::Player => self.player,
            Side::Enemy => self.enemy,
        }
    }
}

/// Per-part, per-side slot capacities. Resolved once per battle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotLayout {
    parts: BTreeMap<String, SideCapacity>,
}

impl SlotLayout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_part(mut self, part: impl Into<String>, player: u32, enemy: u32) -> Self {
        self.parts.insert(part.into(), SideCapacity { player, enemy });
        self
    }

    pub fn capacity(&self, side: Side, part: &str) -> u32 {
        self.parts.get(part).map_or(0, |cap| cap.for_side(side))
    }

    pub fn parts(&self) -> impl Iterator<Item = (&str, SideCapacity)> {
        self.parts.iter().map(|(part, cap)| (part.as_str(), *cap))
    }

    pub fn is_empty(&self) -> bool {
        self.parts.values().all(|cap| cap.player == 0 && cap.enemy == 0)
    }

    /// Every addressable slot on one side, in part order then index order.
    pub fn slots(&self, side: Side) -> Vec<SlotKey> {
        self.parts
            .iter()
            .flat_map(|(part, cap)| (0..cap.for_side(side)).map(move |i| SlotKey::new(side, part.clone(), i)))
            .collect()
    }

    /// Checks that `slot` addresses a declared capacity unit.
    pub fn check(&self, slot: &SlotKey) -> Result<(), PlanningError> {
        let capacity = self.capacity(slot.side, &slot.part);
        if capacity == 0 {
            return Err(PlanningError::NoCapacity {
                side: slot.side,
                part: slot.part.clone(),
            });
        }
        if slot.index >= capacity {
            return Err(PlanningError::SlotIndexOutOfRange {
                side: slot.side,
                part: slot.part.clone(),
                capacity,
            });
        }
        Ok(())
    }
}
