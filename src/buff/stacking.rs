use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// How a stat modifier contributes to the aggregated value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    #[default]
    Flat,
    #[serde(alias = "percent_base")]
    Percent,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModifierContribution<K> {
    pub key: K,
    pub kind: ModifierKind,
    pub value: f64,
}

impl<K> ModifierContribution<K> {
    pub fn flat(key: K, value: f64) -> Self {
        Self {
            key,
            kind: ModifierKind::Flat,
            value,
        }
    }

    pub fn percent(key: K, value: f64) -> Self {
        Self {
            key,
            kind: ModifierKind::Percent,
            value,
        }
    }

    pub fn overwrite(key: K, value: f64) -> Self {
        Self {
            key,
            kind: ModifierKind::Overwrite,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ModifierTotals {
    pub flat: f64,
    pub percent: f64,
    /// Last overwrite wins.
    pub overwrite: Option<f64>,
}

impl ModifierTotals {
    pub fn apply(&mut self, kind: ModifierKind, value: f64) {
        match kind {
            ModifierKind::Flat => self.flat += value,
            ModifierKind::Percent => self.percent += value,
            ModifierKind::Overwrite => self.overwrite = Some(value),
        }
    }

    /// `overwrite` if present, else `(base + flat) * (1 + percent)`.
    pub fn compose(self, base: f64) -> f64 {
        match self.overwrite {
            Some(value) => value,
            None => (base + self.flat) * (1.0 + self.percent),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifierStacking<K: Ord> {
    totals: BTreeMap<K, ModifierTotals>,
}

impl<K: Ord> ModifierStacking<K> {
    pub fn new() -> Self {
        Self {
            totals: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, contribution: ModifierContribution<K>) {
        self.totals
            .entry(contribution.key)
            .or_default()
            .apply(contribution.kind, contribution.value);
    }

    pub fn add_many<I>(&mut self, contributions: I)
    where
        I: IntoIterator<Item = ModifierContribution<K>>,
    {
        for contribution in contributions {
            self.add(contribution);
        }
    }

    pub fn totals_for<Q>(&self, key: &Q) -> Option<ModifierTotals>
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.totals.get(key).copied()
    }

    /// Effective value for `key`; `base` untouched when nothing modifies it.
    pub fn effective<Q>(&self, key: &Q, base: f64) -> f64
    where
        K: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.totals_for(key).map_or(base, |totals| totals.compose(base))
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }
}
