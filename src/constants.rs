//! Application constants for station ingestion
//!
//! Canonical units, recognized component conventions, duration intervals,
//! and quality flag values used throughout the ingestion pipeline.

// =============================================================================
// Canonical Units
// =============================================================================

/// Canonical unit for peak ground acceleration and spectral acceleration
pub const CANONICAL_UNIT_PGA: &str = "%g";

/// Canonical unit for peak ground velocity and Fourier amplitude spectra
pub const CANONICAL_UNIT_PGV: &str = "cm/s";

/// Canonical unit for shaking duration
pub const CANONICAL_UNIT_DURATION: &str = "s";

/// Standard gravity in m/s^2, used for acceleration unit conversions
pub const STANDARD_GRAVITY: f64 = 9.80665;

// =============================================================================
// Component Conventions
// =============================================================================

/// Recognized horizontal-combination convention names (wire spelling)
///
/// Conventions outside this set (e.g. "ROTD100") are a validation error,
/// never silently dropped.
pub const COMPONENT_CONVENTIONS: &[&str] = &[
    "GREATER_OF_TWO_HORIZONTALS",
    "GEOMETRIC_MEAN",
    "ARITHMETIC_MEAN",
    "ROTD50",
];

// =============================================================================
// Duration Intervals
// =============================================================================

/// Recognized significant-duration interval descriptors
pub const DURATION_INTERVALS: &[&str] = &["5-75", "5-95", "20-80"];

/// Default interval assumed by source networks that omit it in spreadsheets
pub const DEFAULT_DURATION_INTERVAL: &str = "5-95";

// =============================================================================
// Quality Flags
// =============================================================================

/// Quality flag codings attached to individual measurements.
///
/// Only "0" has a defined meaning across networks; other codings
/// (numeric or letter, e.g. "T") are owned by the contributing network
/// and are preserved opaquely, never reinterpreted.
pub mod quality_flags {
    /// Measurement passed the contributing network's checks
    pub const USABLE: &str = "0";
}

/// Check whether a flag coding marks a measurement as usable
///
/// An empty coding counts as usable (no flag was set).
pub fn is_usable_flag(flag: &str) -> bool {
    let flag = flag.trim();
    flag.is_empty() || flag == quality_flags::USABLE
}

// =============================================================================
// Geographic Bounds
// =============================================================================

/// Valid longitude range in decimal degrees
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);

/// Valid latitude range in decimal degrees
pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);

/// Valid macroseismic intensity range (modified Mercalli)
pub const INTENSITY_RANGE: (f64, f64) = (1.0, 10.0);

// =============================================================================
// Wire Field Names
// =============================================================================

/// Property names in the GeoJSON wire contract
pub mod fields {
    pub const CODE: &str = "code";
    pub const NAME: &str = "name";
    pub const NETWORK: &str = "network";
    pub const PROVIDER: &str = "provider";
    pub const DISTANCE: &str = "distance";
    pub const COMPONENTS: &str = "components";
    pub const CHANNELS: &str = "channels";
}

// =============================================================================
// Processing Defaults
// =============================================================================

/// Floating point tolerance when matching oscillator periods
pub const PERIOD_EPSILON: f64 = 1e-9;
