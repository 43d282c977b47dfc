//! Unit and measure registry
//!
//! Canonical list of recognized intensity-measure types with their
//! accepted unit sets and conversion factors to canonical units
//! (PGA/SA -> "%g", PGV/FAS -> "cm/s", DURATION -> "s").
//!
//! The registry is immutable after construction and safe for
//! unsynchronized concurrent reads. It is injected into the validator,
//! aggregator and builder rather than hidden behind a singleton, so tests
//! can supply alternate registries.

use std::collections::BTreeMap;

use crate::app::models::MeasureType;
use crate::constants::{
    CANONICAL_UNIT_DURATION, CANONICAL_UNIT_PGA, CANONICAL_UNIT_PGV, STANDARD_GRAVITY,
};
use crate::{Error, Result};

/// Accepted units and conversion factors for one measure type
#[derive(Debug, Clone)]
struct UnitTable {
    /// Canonical unit all values of this measure convert to
    canonical: String,
    /// Normalized unit string -> multiplicative factor to canonical
    factors: BTreeMap<String, f64>,
}

/// Registry of recognized measure types, unit sets and conversions
#[derive(Debug, Clone)]
pub struct MeasureRegistry {
    tables: BTreeMap<MeasureType, UnitTable>,
}

impl MeasureRegistry {
    /// Create an empty registry; useful as a base for alternate
    /// registries in tests
    pub fn new() -> Self {
        Self {
            tables: BTreeMap::new(),
        }
    }

    /// Build the standard registry used by production ingestion
    pub fn standard() -> Self {
        let mut registry = Self::new();

        // Accelerations convert to percent of standard gravity
        for measure in [MeasureType::Pga, MeasureType::Sa] {
            registry.register_canonical(measure, CANONICAL_UNIT_PGA);
            registry.register_unit(measure, "%g", 1.0);
            registry.register_unit(measure, "g", 100.0);
            registry.register_unit(measure, "mg", 0.1);
            registry.register_unit(measure, "m/s^2", 100.0 / STANDARD_GRAVITY);
            registry.register_unit(measure, "cm/s^2", 100.0 / (STANDARD_GRAVITY * 100.0));
            registry.register_unit(measure, "gal", 100.0 / (STANDARD_GRAVITY * 100.0));
        }

        // Velocities convert to cm/s
        for measure in [MeasureType::Pgv, MeasureType::Fas] {
            registry.register_canonical(measure, CANONICAL_UNIT_PGV);
            registry.register_unit(measure, "cm/s", 1.0);
            registry.register_unit(measure, "m/s", 100.0);
            registry.register_unit(measure, "mm/s", 0.1);
        }

        // Durations convert to seconds
        registry.register_canonical(MeasureType::Duration, CANONICAL_UNIT_DURATION);
        registry.register_unit(MeasureType::Duration, "s", 1.0);
        registry.register_unit(MeasureType::Duration, "sec", 1.0);
        registry.register_unit(MeasureType::Duration, "ms", 0.001);

        registry
    }

    /// Declare the canonical unit for a measure type
    pub fn register_canonical(&mut self, measure: MeasureType, canonical: &str) {
        let canonical = normalize_unit(canonical);
        self.tables
            .entry(measure)
            .and_modify(|t| t.canonical = canonical.clone())
            .or_insert_with(|| UnitTable {
                canonical,
                factors: BTreeMap::new(),
            });
    }

    /// Register an accepted unit with its factor to the canonical unit
    pub fn register_unit(&mut self, measure: MeasureType, unit: &str, factor: f64) {
        let table = self.tables.entry(measure).or_insert_with(|| UnitTable {
            canonical: normalize_unit(unit),
            factors: BTreeMap::new(),
        });
        table.factors.insert(normalize_unit(unit), factor);
    }

    /// Canonical unit for a measure type
    pub fn canonical_unit(&self, measure: MeasureType) -> Result<&str> {
        self.tables
            .get(&measure)
            .map(|t| t.canonical.as_str())
            .ok_or_else(|| no_units_error(measure))
    }

    /// Accepted unit strings for a measure type
    pub fn units_for(&self, measure: MeasureType) -> Result<Vec<&str>> {
        self.tables
            .get(&measure)
            .map(|t| t.factors.keys().map(String::as_str).collect())
            .ok_or_else(|| no_units_error(measure))
    }

    /// Check whether a unit is registered for a measure type
    pub fn supports(&self, measure: MeasureType, unit: &str) -> bool {
        self.tables
            .get(&measure)
            .is_some_and(|t| t.factors.contains_key(&normalize_unit(unit)))
    }

    /// Multiplicative factor converting `unit` to the canonical unit
    pub fn conversion_factor(&self, measure: MeasureType, unit: &str) -> Result<f64> {
        let table = self.tables.get(&measure).ok_or_else(|| no_units_error(measure))?;
        table
            .factors
            .get(&normalize_unit(unit))
            .copied()
            .ok_or_else(|| {
                Error::registry(format!(
                    "Unsupported unit '{}' for measure type {}",
                    unit, measure
                ))
            })
    }

    /// Convert a value from `unit` to the measure's canonical unit
    pub fn convert(&self, measure: MeasureType, unit: &str, value: f64) -> Result<f64> {
        Ok(value * self.conversion_factor(measure, unit)?)
    }
}

impl Default for MeasureRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn no_units_error(measure: MeasureType) -> Error {
    Error::registry(format!("No units registered for measure type {}", measure))
}

/// Unit strings are matched after trim and ASCII lowercasing
fn normalize_unit(unit: &str) -> String {
    unit.trim().to_ascii_lowercase()
}
