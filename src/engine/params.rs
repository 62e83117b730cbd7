//! Flattened parameter table.
//!
//! The table concatenates, in order:
//!
//! 1. each registered component's parameter fragment (registry insertion order)
//! 2. the noise model's fragment, when noise is enabled and a noise model exists
//!
//! While building, the table records one `ParameterSlot` per owner: a frozen
//! `owner -> contiguous index range` map. Every consumer that needs "the
//! parameters of X" (simulation, residual noise filtering, accessors) asks the
//! slot map instead of re-deriving offsets, so positional and name-based
//! addressing cannot disagree.
//!
//! Tables are snapshots: `initialize` builds a new one and `solve` replaces it
//! with a copy carrying the optimal column.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::engine::registry::ComponentRegistry;
use crate::error::{ModelError, ModelResult};
use crate::models::NoiseModel;

/// One scalar parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    /// Unique parameter name, e.g. `rain_A`.
    pub name: String,
    /// Component (or noise model) that owns this parameter.
    pub owner: String,
    pub initial: f64,
    pub pmin: Option<f64>,
    pub pmax: Option<f64>,
    /// `false` keeps the parameter fixed at `initial` during calibration.
    pub vary: bool,
    pub optimal: Option<f64>,
}

impl ParameterRow {
    pub fn new(owner: &str, short_name: &str, initial: f64) -> Self {
        Self {
            name: format!("{owner}_{short_name}"),
            owner: owner.to_string(),
            initial,
            pmin: None,
            pmax: None,
            vary: true,
            optimal: None,
        }
    }

    pub fn bounded(mut self, pmin: Option<f64>, pmax: Option<f64>) -> Self {
        self.pmin = pmin;
        self.pmax = pmax;
        self
    }

    pub fn fixed(mut self) -> Self {
        self.vary = false;
        self
    }

    /// Clamp `value` into `[pmin, pmax]`.
    pub fn clamp(&self, value: f64) -> f64 {
        let lo = self.pmin.unwrap_or(f64::NEG_INFINITY);
        let hi = self.pmax.unwrap_or(f64::INFINITY);
        value.max(lo).min(hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Component,
    Noise,
}

/// Contiguous range of the flat vector owned by one component or the noise model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSlot {
    pub owner: String,
    pub kind: SlotKind,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterTable {
    rows: Vec<ParameterRow>,
    slots: Vec<ParameterSlot>,
    /// Registry revision this table was built against.
    revision: u64,
}

impl ParameterTable {
    /// Build a fresh table from the registry and (optionally) the noise model.
    pub fn build(registry: &ComponentRegistry, noise: Option<&dyn NoiseModel>) -> ModelResult<Self> {
        let mut table = ParameterTable {
            rows: Vec::new(),
            slots: Vec::new(),
            revision: registry.revision(),
        };

        for component in registry.iter() {
            table.push_fragment(
                component.name(),
                SlotKind::Component,
                component.nparam(),
                component.parameters(),
            )?;
        }
        if let Some(noise) = noise {
            table.push_fragment(noise.name(), SlotKind::Noise, noise.nparam(), noise.parameters())?;
        }

        if let Some(dup) = first_duplicate(table.rows.iter().map(|r| r.name.as_str())) {
            return Err(ModelError::validation(format!("duplicate parameter name `{dup}`")));
        }
        Ok(table)
    }

    fn push_fragment(
        &mut self,
        owner: &str,
        kind: SlotKind,
        nparam: usize,
        fragment: Vec<ParameterRow>,
    ) -> ModelResult<()> {
        if fragment.len() != nparam {
            return Err(ModelError::validation(format!(
                "`{owner}` declares {nparam} parameters but its fragment has {} rows",
                fragment.len()
            )));
        }
        let start = self.rows.len();
        self.rows.extend(fragment.into_iter().map(|mut row| {
            row.owner = owner.to_string();
            row
        }));
        self.slots.push(ParameterSlot {
            owner: owner.to_string(),
            kind,
            range: start..self.rows.len(),
        });
        Ok(())
    }

    /// Continuation: seed `initial` from a previous solved table.
    ///
    /// The previous table must have exactly the same rows (names, in order);
    /// anything else would silently shift values onto the wrong parameters.
    pub fn continue_from(mut self, previous: &ParameterTable) -> ModelResult<Self> {
        if previous.len() != self.len() {
            return Err(ModelError::validation(format!(
                "cannot continue from a table with {} parameters into one with {}",
                previous.len(),
                self.len()
            )));
        }
        if let Some((new, old)) = self
            .rows
            .iter()
            .zip(previous.rows.iter())
            .find(|(a, b)| a.name != b.name)
        {
            return Err(ModelError::validation(format!(
                "parameter order changed since the previous fit (`{}` where `{}` was)",
                new.name, old.name
            )));
        }
        let optimal = previous.optimal_values().ok_or(ModelError::Unsolved)?;
        for (row, value) in self.rows.iter_mut().zip(optimal) {
            row.initial = value;
        }
        Ok(self)
    }

    /// Replace the optimal column (row-aligned), returning the new snapshot.
    pub fn with_optimal(mut self, optimal: &[f64]) -> ModelResult<Self> {
        self.check_len(optimal)?;
        for (row, &value) in self.rows.iter_mut().zip(optimal) {
            row.optimal = Some(value);
        }
        Ok(self)
    }

    pub fn check_len(&self, values: &[f64]) -> ModelResult<()> {
        if values.len() != self.len() {
            return Err(ModelError::validation(format!(
                "parameter vector has {} entries but the table has {} rows",
                values.len(),
                self.len()
            )));
        }
        Ok(())
    }

    pub fn rows(&self) -> &[ParameterRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn slot(&self, owner: &str) -> Option<&ParameterSlot> {
        self.slots.iter().find(|s| s.owner == owner)
    }

    pub fn component_slots(&self) -> impl Iterator<Item = &ParameterSlot> {
        self.slots.iter().filter(|s| s.kind == SlotKind::Component)
    }

    pub fn noise_slot(&self) -> Option<&ParameterSlot> {
        self.slots.iter().find(|s| s.kind == SlotKind::Noise)
    }

    /// Number of leading entries consumed by components.
    pub fn component_len(&self) -> usize {
        self.component_slots().map(|s| s.range.len()).sum()
    }

    pub fn initial_values(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.initial).collect()
    }

    /// Optimal column, or `None` if any row lacks an optimal value.
    pub fn optimal_values(&self) -> Option<Vec<f64>> {
        self.rows.iter().map(|r| r.optimal).collect()
    }

    /// Entries of `values` owned by `owner`.
    pub fn slice<'a>(&self, owner: &str, values: &'a [f64]) -> ModelResult<&'a [f64]> {
        let slot = self.slot(owner).ok_or_else(|| {
            ModelError::validation(format!("no parameters recorded for `{owner}`"))
        })?;
        values.get(slot.range.clone()).ok_or_else(|| {
            ModelError::validation(format!(
                "parameter vector of length {} does not cover `{owner}` ({:?})",
                values.len(),
                slot.range
            ))
        })
    }
}

fn first_duplicate<'a>(names: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    names.into_iter().find(|n| !seen.insert(*n))
}
