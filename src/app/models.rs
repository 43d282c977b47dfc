//! Data models for ground-motion station records
//!
//! This module contains the canonical in-memory representation of seismic
//! station records: typed intensity measures, component-convention measure
//! sets, raw channel amplitudes, and the immutable station collection
//! handed to downstream hazard-mapping consumers.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::constants::{self, PERIOD_EPSILON};
use crate::{Error, Result};

// =============================================================================
// Measure Types
// =============================================================================

/// Intensity-measure types recognized by the ingestion pipeline
///
/// This is a closed enumeration: measure names outside this set are a
/// validation defect, never silently carried through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum MeasureType {
    /// Peak ground acceleration (scalar)
    Pga,
    /// Peak ground velocity (scalar)
    Pgv,
    /// Spectral acceleration at an oscillator period (sequence)
    Sa,
    /// Fourier amplitude spectrum value at a period (sequence)
    Fas,
    /// Significant shaking duration over an interval (scalar)
    Duration,
}

impl MeasureType {
    /// All recognized measure types
    pub fn all() -> [MeasureType; 5] {
        [
            MeasureType::Pga,
            MeasureType::Pgv,
            MeasureType::Sa,
            MeasureType::Fas,
            MeasureType::Duration,
        ]
    }

    /// Wire spelling used in `components.<convention>.<measure>` keys
    pub fn wire_name(self) -> &'static str {
        match self {
            MeasureType::Pga => "PGA",
            MeasureType::Pgv => "PGV",
            MeasureType::Sa => "SA",
            MeasureType::Fas => "FAS",
            MeasureType::Duration => "DURATION",
        }
    }

    /// Whether measurements of this type carry an oscillator period
    pub fn is_spectral(self) -> bool {
        matches!(self, MeasureType::Sa | MeasureType::Fas)
    }

    /// Whether at most one measurement of this type may appear per
    /// component set
    pub fn is_scalar(self) -> bool {
        !self.is_spectral()
    }
}

impl FromStr for MeasureType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PGA" => Ok(MeasureType::Pga),
            "PGV" => Ok(MeasureType::Pgv),
            "SA" => Ok(MeasureType::Sa),
            "FAS" => Ok(MeasureType::Fas),
            "DURATION" => Ok(MeasureType::Duration),
            _ => Err(Error::registry(format!(
                "Unknown measure type '{}': must be one of PGA, PGV, SA, FAS, DURATION",
                s
            ))),
        }
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

// =============================================================================
// Component Conventions
// =============================================================================

/// Horizontal-combination conventions under which derived measures are
/// reported
///
/// A closed enumeration mirroring the conventions accepted from
/// contributing networks; names outside this set (e.g. "ROTD100") are a
/// validation defect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Convention {
    /// Larger of the two horizontal-axis recordings
    GreaterOfTwoHorizontals,
    /// Geometric mean of the two horizontals
    GeometricMean,
    /// Arithmetic mean of the two horizontals
    ArithmeticMean,
    /// Median single-component horizontal over all rotation angles
    RotD50,
}

impl Convention {
    /// All recognized conventions
    pub fn all() -> [Convention; 4] {
        [
            Convention::GreaterOfTwoHorizontals,
            Convention::GeometricMean,
            Convention::ArithmeticMean,
            Convention::RotD50,
        ]
    }

    /// Wire spelling used as the key under `components`
    pub fn wire_name(self) -> &'static str {
        match self {
            Convention::GreaterOfTwoHorizontals => "GREATER_OF_TWO_HORIZONTALS",
            Convention::GeometricMean => "GEOMETRIC_MEAN",
            Convention::ArithmeticMean => "ARITHMETIC_MEAN",
            Convention::RotD50 => "ROTD50",
        }
    }
}

impl FromStr for Convention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GREATER_OF_TWO_HORIZONTALS" => Ok(Convention::GreaterOfTwoHorizontals),
            "GEOMETRIC_MEAN" => Ok(Convention::GeometricMean),
            "ARITHMETIC_MEAN" => Ok(Convention::ArithmeticMean),
            "ROTD50" => Ok(Convention::RotD50),
            _ => Err(Error::registry(format!(
                "Unknown component convention '{}'",
                s
            ))),
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

// =============================================================================
// Measurements
// =============================================================================

/// A single observed intensity-measure value
///
/// The original value and unit string from the contributing network are
/// preserved verbatim; unit normalization only adds the derived
/// `canonical_value`/`canonical_units` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measurement {
    /// Observed value in the original units
    pub value: f64,

    /// Original unit string as submitted
    pub units: String,

    /// Quality flag coding: "0" = usable, anything else is
    /// network-defined and preserved verbatim (numeric or letter)
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "flag_to_wire"
    )]
    pub flag: Option<String>,

    /// Logarithmic standard deviation of the value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ln_sigma: Option<f64>,

    /// Oscillator period in seconds (SA/FAS only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<f64>,

    /// Duration interval descriptor, e.g. "5-95" (DURATION only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Value converted to the measure type's canonical unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_value: Option<f64>,

    /// Canonical unit the converted value is expressed in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_units: Option<String>,
}

impl Measurement {
    /// Check whether the contributing network flagged this measurement
    ///
    /// An absent flag counts as usable.
    pub fn is_flagged(&self) -> bool {
        self.flag
            .as_deref()
            .is_some_and(|f| !constants::is_usable_flag(f))
    }

    /// Check whether this measurement's period matches `period` within
    /// floating point tolerance
    pub fn matches_period(&self, period: f64) -> bool {
        match self.period {
            Some(p) => (p - period).abs() <= PERIOD_EPSILON,
            None => false,
        }
    }
}

// =============================================================================
// Measure Sets
// =============================================================================

/// Measurements reported under one component convention
///
/// Scalar measures (PGA, PGV, DURATION) hold at most one measurement;
/// spectral measures (SA, FAS) hold an ordered sequence, one entry per
/// oscillator period in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasureSet {
    #[serde(rename = "PGA", skip_serializing_if = "Option::is_none")]
    pub pga: Option<Measurement>,

    #[serde(rename = "PGV", skip_serializing_if = "Option::is_none")]
    pub pgv: Option<Measurement>,

    #[serde(rename = "SA", skip_serializing_if = "Vec::is_empty")]
    pub sa: Vec<Measurement>,

    #[serde(rename = "FAS", skip_serializing_if = "Vec::is_empty")]
    pub fas: Vec<Measurement>,

    #[serde(rename = "DURATION", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Measurement>,
}

impl MeasureSet {
    /// Check whether any measurement is present
    pub fn is_empty(&self) -> bool {
        self.pga.is_none()
            && self.pgv.is_none()
            && self.sa.is_empty()
            && self.fas.is_empty()
            && self.duration.is_none()
    }

    /// Get the scalar measurement for a scalar measure type
    pub fn scalar(&self, measure: MeasureType) -> Option<&Measurement> {
        match measure {
            MeasureType::Pga => self.pga.as_ref(),
            MeasureType::Pgv => self.pgv.as_ref(),
            MeasureType::Duration => self.duration.as_ref(),
            MeasureType::Sa | MeasureType::Fas => None,
        }
    }

    /// Get the ordered spectral sequence for a spectral measure type
    pub fn spectral(&self, measure: MeasureType) -> &[Measurement] {
        match measure {
            MeasureType::Sa => &self.sa,
            MeasureType::Fas => &self.fas,
            _ => &[],
        }
    }

    /// Look up one measurement by measure type and optional period
    ///
    /// Scalar measures ignore `period`; spectral measures require it and
    /// return the first entry matching within tolerance.
    pub fn get(&self, measure: MeasureType, period: Option<f64>) -> Option<&Measurement> {
        if measure.is_scalar() {
            self.scalar(measure)
        } else {
            let period = period?;
            self.spectral(measure)
                .iter()
                .find(|m| m.matches_period(period))
        }
    }

    /// Iterate every measurement in deterministic order
    pub fn iter(&self) -> impl Iterator<Item = (MeasureType, &Measurement)> {
        self.pga
            .iter()
            .map(|m| (MeasureType::Pga, m))
            .chain(self.pgv.iter().map(|m| (MeasureType::Pgv, m)))
            .chain(self.sa.iter().map(|m| (MeasureType::Sa, m)))
            .chain(self.fas.iter().map(|m| (MeasureType::Fas, m)))
            .chain(self.duration.iter().map(|m| (MeasureType::Duration, m)))
    }
}

// =============================================================================
// Channels and Amplitudes
// =============================================================================

/// Parsed classification of a raw amplitude name
#[derive(Debug, Clone, PartialEq)]
pub enum AmplitudeKind {
    /// A scalar measure ("pga", "pgv")
    Scalar(MeasureType),
    /// A spectral measure with its period ("sa(0.3)", "fas(1.0)")
    Spectral(MeasureType, f64),
    /// A duration with its interval ("duration(5-95)")
    Duration(String),
    /// Name did not match the amplitude grammar; kept as raw evidence
    Unrecognized,
}

/// A single named amplitude reading on a raw channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Amplitude {
    /// Free-form lower-case measure tag as submitted, e.g. "sa(0.3)"
    pub name: String,

    /// Observed value in the original units
    pub value: f64,

    /// Original unit string as submitted
    pub units: String,

    /// Quality flag coding, preserved opaquely
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "flag_to_wire"
    )]
    pub flag: Option<String>,

    /// Logarithmic standard deviation of the value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ln_sigma: Option<f64>,

    /// Parsed (measure-type, period/interval) classification
    #[serde(skip)]
    pub kind: AmplitudeKind,

    /// Value converted to the measure type's canonical unit, when the name
    /// parsed and the unit is registered
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_value: Option<f64>,
}

/// Serialize a preserved flag coding back in its wire form: integer
/// codings as JSON numbers, everything else as strings
///
/// Only called for present flags; absent flags are skipped entirely.
fn flag_to_wire<S>(flag: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match flag {
        Some(coding) => match coding.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(coding),
        },
        None => serializer.serialize_none(),
    }
}

/// A raw recorded trace, independent of component-convention aggregation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Channel {
    /// Instrument-orientation code, e.g. "HNE", "H1"
    pub name: String,

    /// Ordered amplitude readings in input order
    pub amplitudes: Vec<Amplitude>,
}

// =============================================================================
// Stations
// =============================================================================

/// One physical or virtual recording site with its accepted measures
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Unique identifier, `<network>.<code>`
    pub id: String,

    /// Station code within the network
    pub code: String,

    /// Display name
    pub name: String,

    /// Contributing network code
    pub network: String,

    /// Source network / data provider, when distinct from `network`
    pub provider: Option<String>,

    /// Longitude in decimal degrees
    pub longitude: f64,

    /// Latitude in decimal degrees
    pub latitude: f64,

    /// Elevation in meters
    pub elevation: Option<f64>,

    /// Epicentral distance in km
    pub distance: Option<f64>,

    /// Instrument natural period in seconds
    pub instrument_period: Option<f64>,

    /// Instrument damping ratio
    pub damping: Option<f64>,

    /// Instrument sensitivity
    pub sensitivity: Option<f64>,

    /// Source data format tag, e.g. "cosmos"
    pub source_format: Option<String>,

    /// Structure type tag
    pub structure_type: Option<String>,

    /// Free-form location description
    pub location: Option<String>,

    /// Macroseismic intensity observation
    pub intensity: Option<f64>,

    /// Number of responses behind an aggregated intensity
    pub nresp: Option<i64>,

    /// Uncertainty of the intensity observation
    pub intensity_stddev: Option<f64>,

    /// Measures per component convention
    pub components: BTreeMap<Convention, MeasureSet>,

    /// Raw per-instrument channels, kept separate from derived components
    pub channels: Vec<Channel>,
}

impl Station {
    /// Get the measure set for one component convention
    pub fn component(&self, convention: Convention) -> Option<&MeasureSet> {
        self.components.get(&convention)
    }

    /// Look up one measurement by convention, measure type and optional
    /// period
    pub fn measurement(
        &self,
        convention: Convention,
        measure: MeasureType,
        period: Option<f64>,
    ) -> Option<&Measurement> {
        self.component(convention)?.get(measure, period)
    }

    /// Station position as (longitude, latitude)
    pub fn position(&self) -> (f64, f64) {
        (self.longitude, self.latitude)
    }

    /// Render this station back to a GeoJSON feature
    ///
    /// Original property names and values are preserved; unit
    /// normalization only adds `canonical_value`/`canonical_units` fields.
    pub fn to_feature(&self) -> Value {
        let mut props = Map::new();
        props.insert("code".to_string(), json!(self.code));
        props.insert("name".to_string(), json!(self.name));
        props.insert("network".to_string(), json!(self.network));
        if let Some(provider) = &self.provider {
            props.insert("provider".to_string(), json!(provider));
        }
        if let Some(distance) = self.distance {
            props.insert("distance".to_string(), json!(distance));
        }
        if let Some(period) = self.instrument_period {
            props.insert("period".to_string(), json!(period));
        }
        if let Some(damping) = self.damping {
            props.insert("damping".to_string(), json!(damping));
        }
        if let Some(sensitivity) = self.sensitivity {
            props.insert("sensitivity".to_string(), json!(sensitivity));
        }
        if let Some(source_format) = &self.source_format {
            props.insert("source_format".to_string(), json!(source_format));
        }
        if let Some(structure_type) = &self.structure_type {
            props.insert("structure".to_string(), json!(structure_type));
        }
        if let Some(location) = &self.location {
            props.insert("location".to_string(), json!(location));
        }
        if let Some(intensity) = self.intensity {
            props.insert("intensity".to_string(), json!(intensity));
        }
        if let Some(nresp) = self.nresp {
            props.insert("nresp".to_string(), json!(nresp));
        }
        if let Some(stddev) = self.intensity_stddev {
            props.insert("intensity_stddev".to_string(), json!(stddev));
        }

        if !self.components.is_empty() {
            let mut components = Map::new();
            for (convention, measures) in &self.components {
                components.insert(convention.wire_name().to_string(), json!(measures));
            }
            props.insert("components".to_string(), Value::Object(components));
        }
        if !self.channels.is_empty() {
            props.insert("channels".to_string(), json!(self.channels));
        }

        let mut coordinates = vec![json!(self.longitude), json!(self.latitude)];
        if let Some(elevation) = self.elevation {
            coordinates.push(json!(elevation));
        }

        json!({
            "type": "Feature",
            "id": self.id,
            "properties": Value::Object(props),
            "geometry": {
                "type": "Point",
                "coordinates": coordinates,
            },
        })
    }
}

// =============================================================================
// Station Collection
// =============================================================================

/// Insertion-ordered, de-duplicated set of accepted stations
///
/// Built once per ingestion and immutable afterwards; corrections require
/// rebuilding from corrected input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationCollection {
    stations: Vec<Station>,
    index: HashMap<String, usize>,
}

impl StationCollection {
    /// Assemble a collection from stations with unique identifiers,
    /// preserving input order
    ///
    /// Duplicate identifiers must have been resolved by the builder; later
    /// duplicates would be unreachable through the index, so this is a
    /// contract violation.
    pub(crate) fn from_stations(stations: Vec<Station>) -> Self {
        let mut index = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            index.entry(station.id.clone()).or_insert(i);
        }
        Self { stations, index }
    }

    /// Number of stations in the collection
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    /// Check whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Iterate stations in input order
    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    /// Look up a station by identifier
    pub fn get(&self, id: &str) -> Option<&Station> {
        self.index.get(id).map(|&i| &self.stations[i])
    }

    /// Check whether a station identifier is present
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Station identifiers in input order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.stations.iter().map(|s| s.id.as_str())
    }

    /// Look up one canonical-unit measurement by station, convention,
    /// measure type and optional period
    pub fn measurement(
        &self,
        station_id: &str,
        convention: Convention,
        measure: MeasureType,
        period: Option<f64>,
    ) -> Option<&Measurement> {
        self.get(station_id)?.measurement(convention, measure, period)
    }

    /// Render the collection back to a GeoJSON feature collection
    pub fn to_geojson(&self) -> Value {
        let features: Vec<Value> = self.stations.iter().map(Station::to_feature).collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

impl<'a> IntoIterator for &'a StationCollection {
    type Item = &'a Station;
    type IntoIter = std::slice::Iter<'a, Station>;

    fn into_iter(self) -> Self::IntoIter {
        self.stations.iter()
    }
}
