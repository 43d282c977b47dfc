//! Ingestion report and structured data-quality defects
//!
//! Every defect found during validation and aggregation is accumulated
//! here and returned to the caller alongside the (possibly partial)
//! station collection; nothing is silently swallowed.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// The kinds of data-quality defects the pipeline can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DefectKind {
    /// Feature carries neither components nor channels
    EmptyRecord,
    /// A required field is absent or of the wrong type
    MissingRequiredField,
    /// A numeric value is outside its permitted range or not finite
    OutOfRangeValue,
    /// A measure name outside the recognized enumeration
    UnknownMeasureType,
    /// A unit not registered for its measure type
    UnsupportedUnit,
    /// An SA/FAS measurement without a positive period
    MissingPeriod,
    /// A DURATION measurement without a recognized interval
    MissingInterval,
    /// A component-convention name outside the recognized enumeration
    UnknownComponentConvention,
    /// A channel amplitude name that does not match the amplitude grammar
    UnrecognizedAmplitudeName,
    /// The same (measure-type, period) reported twice in one component set
    DuplicateMeasurement,
    /// A station identifier already seen earlier in the batch
    DuplicateStation,
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Whether a defect excluded its record or merely annotated it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// The record was excluded from the collection
    Structural,
    /// The record was kept; the defect is a consistency annotation
    Warning,
}

/// One structured data-quality defect tied to a feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Defect {
    /// Identifier of the offending feature, when one could be determined
    pub station_id: Option<String>,

    /// Defect classification
    pub kind: DefectKind,

    /// Whether the record was excluded or kept
    pub severity: Severity,

    /// Human-readable detail
    pub detail: String,
}

impl Defect {
    /// Create a structural defect (record excluded)
    pub fn structural(
        station_id: Option<String>,
        kind: DefectKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            station_id,
            kind,
            severity: Severity::Structural,
            detail: detail.into(),
        }
    }

    /// Create a warning defect (record kept)
    pub fn warning(
        station_id: Option<String>,
        kind: DefectKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            station_id,
            kind,
            severity: Severity::Warning,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.station_id {
            Some(id) => write!(f, "[{}] {}: {}", id, self.kind, self.detail),
            None => write!(f, "[<no id>] {}: {}", self.kind, self.detail),
        }
    }
}

/// Complete account of one ingestion run
///
/// Always returned together with the station collection; a clean report
/// signals a fully accepted batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    /// Every defect found, in deterministic (input) order
    pub defects: Vec<Defect>,

    /// Number of features in the input batch
    pub total_input: usize,

    /// Number of features accepted into the collection
    pub accepted: usize,

    /// Number of features excluded by structural defects
    pub rejected: usize,
}

impl IngestReport {
    /// Check whether the batch ingested without a single defect
    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }

    /// Defects attributed to one station identifier
    pub fn defects_for(&self, station_id: &str) -> Vec<&Defect> {
        self.defects
            .iter()
            .filter(|d| d.station_id.as_deref() == Some(station_id))
            .collect()
    }

    /// Defects of one kind
    pub fn defects_of_kind(&self, kind: DefectKind) -> Vec<&Defect> {
        self.defects.iter().filter(|d| d.kind == kind).collect()
    }

    /// Count defects grouped by kind
    pub fn counts_by_kind(&self) -> BTreeMap<DefectKind, usize> {
        let mut counts = BTreeMap::new();
        for defect in &self.defects {
            *counts.entry(defect.kind).or_insert(0) += 1;
        }
        counts
    }

    /// One-line summary for logging
    pub fn summary(&self) -> String {
        format!(
            "{} features: {} accepted, {} rejected, {} defects",
            self.total_input,
            self.accepted,
            self.rejected,
            self.defects.len()
        )
    }
}
