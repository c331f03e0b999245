//! CSV battle reports: one row per resolved timeline entry.

use std::path::Path;

use serde::Serialize;

use crate::combat::ActionOutcome;
use crate::error::TurnforgeError;
use crate::planning::Side;
use crate::timeline::TimelineEntry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub turn: u32,
    pub entry_id: String,
    pub side: Side,
    pub actor_id: String,
    pub skill_id: String,
    pub target_id: String,
    pub body_part: String,
    pub raw_damage: f64,
    pub armor_absorbed: f64,
    pub shield_absorbed: f64,
    pub damage_dealt: f64,
    pub healed: f64,
    pub counter_damage: f64,
    pub part_broken: bool,
    pub target_hp: f64,
    pub target_defeated: bool,
    /// Empty when the action ran.
    pub skipped: String,
}

impl ReportRow {
    pub fn new(turn: u32, entry: &TimelineEntry, outcome: &ActionOutcome) -> Self {
        Self {
            turn,
            entry_id: entry.entry_id.clone(),
            side: entry.side,
            actor_id: outcome.actor_id.clone(),
            skill_id: outcome.skill_id.clone(),
            target_id: outcome.target_id.clone(),
            body_part: outcome.body_part.clone(),
            raw_damage: outcome.raw_damage,
            armor_absorbed: outcome.armor_absorbed,
            shield_absorbed: outcome.shield_absorbed,
            damage_dealt: outcome.damage_dealt,
            healed: outcome.healed,
            counter_damage: outcome.counter_damage,
            part_broken: outcome.part_broken,
            target_hp: outcome.target_hp,
            target_defeated: outcome.target_defeated,
            skipped: outcome.skipped.clone().unwrap_or_default(),
        }
    }
}

pub fn write_report<W: std::io::Write>(writer: W, rows: &[ReportRow]) -> Result<(), TurnforgeError> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_report_file(path: impl AsRef<Path>, rows: &[ReportRow]) -> Result<(), TurnforgeError> {
    let file = std::fs::File::create(path)?;
    write_report(file, rows)
}
