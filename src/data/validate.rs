use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::buff::{ActionKind, BuffEffect, EffectValue, Formula};
use crate::data::game::GameData;
use crate::data::loader::load_game_data;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == ValidationSeverity::Error)
    }

    pub fn count(&self, severity: ValidationSeverity) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == severity)
            .count()
    }
}

pub fn validate_game_data_file(path: impl AsRef<Path>) -> Result<ValidationReport, ConfigError> {
    let data = load_game_data(path)?;
    Ok(validate_game_data(&data))
}

/// Checks cross references and authoring mistakes that would otherwise only
/// surface mid-battle.
pub fn validate_game_data(data: &GameData) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_skills(data, &mut report);
    validate_buffs(data, &mut report);
    validate_roster(data, &mut report);
    validate_levels(data, &mut report);
    report
}

fn validate_skills(data: &GameData, report: &mut ValidationReport) {
    for (key, skill) in &data.skills {
        let context = format!("skills.{key}");
        if skill.id != *key {
            report.push(
                ValidationSeverity::Error,
                &context,
                format!("id '{}' does not match its key", skill.id),
            );
        }
        match skill.cost {
            None => report.push(ValidationSeverity::Error, &context, "missing numeric AP cost"),
            Some(cost) if !cost.is_finite() => {
                report.push(ValidationSeverity::Error, &context, "AP cost is not a finite number")
            }
            Some(cost) if cost < 0.0 => {
                report.push(ValidationSeverity::Error, &context, format!("negative AP cost {cost}"))
            }
            Some(cost) if cost.fract() != 0.0 => report.push(
                ValidationSeverity::Warning,
                &context,
                format!("fractional AP cost {cost} will be rounded"),
            ),
            Some(_) => {}
        }
        if skill.target.selection.select_count == Some(0) {
            report.push(
                ValidationSeverity::Warning,
                &context,
                "selectCount 0 is treated as 1",
            );
        }
        for buff_ref in &skill.buff_refs {
            if !data.buffs.contains_key(&buff_ref.buff_id) {
                report.push(
                    ValidationSeverity::Error,
                    &context,
                    format!("buffRefs names unknown buff '{}'", buff_ref.buff_id),
                );
            }
        }
    }
}

fn validate_buffs(data: &GameData, report: &mut ValidationReport) {
    for (key, buff) in &data.buffs {
        let context = format!("buffs.{key}");
        if let Some(target) = &buff.alias_of {
            match data.buffs.get(target) {
                None => report.push(
                    ValidationSeverity::Error,
                    &context,
                    format!("aliasOf names unknown buff '{target}'"),
                ),
                Some(aliased) if aliased.alias_of.is_some() => {
                    let mut seen = HashSet::from([key.as_str()]);
                    let mut cursor = Some(target.as_str());
                    let mut cycle = false;
                    while let Some(id) = cursor {
                        if !seen.insert(id) {
                            cycle = true;
                            break;
                        }
                        cursor = data.buffs.get(id).and_then(|def| def.alias_of.as_deref());
                    }
                    let message = if cycle {
                        "alias cycle detected"
                    } else {
                        "alias chains are not resolved; point aliasOf at a concrete buff"
                    };
                    report.push(ValidationSeverity::Error, &context, message);
                }
                Some(_) => {}
            }
        }
        if buff.lifecycle.duration < -1 {
            report.push(
                ValidationSeverity::Error,
                &context,
                format!("duration {} is invalid (use -1 for permanent)", buff.lifecycle.duration),
            );
        }
        for (index, effect) in buff.effects.iter().enumerate() {
            validate_effect(data, effect, &format!("{context}.effects[{index}]"), report);
        }
    }
}

fn validate_effect(data: &GameData, effect: &BuffEffect, context: &str, report: &mut ValidationReport) {
    if effect.trigger == crate::buff::Trigger::Unknown {
        report.push(ValidationSeverity::Warning, context, "unknown trigger never fires");
    }
    let kind = match effect.action.parse::<ActionKind>() {
        Ok(kind) => kind,
        Err(err) => {
            report.push(ValidationSeverity::Warning, context, err.to_string());
            return;
        }
    };

    if kind == ActionKind::ApplyBuff {
        match &effect.value {
            Some(EffectValue::Text(buff_id)) if data.buffs.contains_key(buff_id) => {}
            Some(EffectValue::Text(buff_id)) => report.push(
                ValidationSeverity::Error,
                context,
                format!("applyBuff names unknown buff '{buff_id}'"),
            ),
            _ => report.push(ValidationSeverity::Error, context, "applyBuff needs a buff id value"),
        }
        return;
    }

    let values = effect
        .value
        .iter()
        .chain(effect.params.iter().filter_map(|params| params.value.as_ref()));
    for value in values {
        if let EffectValue::Text(text) = value {
            if text.trim().parse::<f64>().is_err() {
                if let Err(message) = Formula::parse(text) {
                    report.push(
                        ValidationSeverity::Error,
                        context,
                        format!("formula '{text}' rejected: {message}"),
                    );
                }
            }
        }
    }
    if kind == ActionKind::ModifyStatTemp
        && effect
            .params
            .as_ref()
            .and_then(|params| params.stat.as_ref())
            .is_none()
    {
        report.push(ValidationSeverity::Error, context, "modifyStatTemp needs params.stat");
    }
}

fn validate_roster(data: &GameData, report: &mut ValidationReport) {
    let mut check_skills = |context: &str, skills: &[String]| {
        for skill_id in skills {
            if !data.skills.contains_key(skill_id) {
                report.push(
                    ValidationSeverity::Error,
                    context,
                    format!("unknown skill '{skill_id}'"),
                );
            }
        }
    };
    check_skills("player", &data.player.skills);
    for (key, enemy) in &data.enemies {
        check_skills(&format!("enemies.{key}"), &enemy.skills);
    }

    for (key, enemy) in &data.enemies {
        let context = format!("enemies.{key}");
        if enemy.skills.is_empty() {
            report.push(ValidationSeverity::Warning, &context, "enemy has no skills and will never act");
        }
        if enemy.stats.max_hp <= 0.0 {
            report.push(ValidationSeverity::Error, &context, "maxHp must be positive");
        }
    }
    for (owner, buffs) in std::iter::once(("player".to_string(), &data.player.buffs))
        .chain(data.enemies.iter().map(|(key, enemy)| (format!("enemies.{key}"), &enemy.buffs)))
    {
        for buff_id in buffs {
            if !data.buffs.contains_key(buff_id) {
                report.push(
                    ValidationSeverity::Error,
                    &owner,
                    format!("starting buff '{buff_id}' is not defined"),
                );
            }
        }
    }
}

fn validate_levels(data: &GameData, report: &mut ValidationReport) {
    for (id, layout) in &data.slot_layouts {
        if layout.is_empty() {
            report.push(
                ValidationSeverity::Warning,
                format!("slotLayouts.{id}"),
                "layout declares no capacity",
            );
        }
    }
    if let Some(id) = &data.default_slot_layout {
        if !data.slot_layouts.contains_key(id) {
            report.push(
                ValidationSeverity::Error,
                "defaultSlotLayout",
                format!("unknown slot layout '{id}'"),
            );
        }
    }

    if data.levels.is_empty() {
        report.push(ValidationSeverity::Warning, "levels", "no levels defined");
    }
    for (key, level) in &data.levels {
        let context = format!("levels.{key}");
        match &level.slot_layout_id {
            Some(layout) if !data.slot_layouts.contains_key(layout) => report.push(
                ValidationSeverity::Error,
                &context,
                format!("unknown slot layout '{layout}'"),
            ),
            None if data.default_slot_layout.is_none() => report.push(
                ValidationSeverity::Warning,
                &context,
                "no slot layout; planning will be rejected",
            ),
            _ => {}
        }
        if level.waves.first().map_or(true, |wave| wave.enemies.is_empty()) {
            report.push(ValidationSeverity::Error, &context, "first wave has no enemies");
        }
        for wave in &level.waves {
            for enemy in &wave.enemies {
                if !data.enemies.contains_key(&enemy.template_id) {
                    report.push(
                        ValidationSeverity::Error,
                        &context,
                        format!("unknown enemy template '{}'", enemy.template_id),
                    );
                }
            }
        }
    }
}
