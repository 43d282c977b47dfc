//! Station Ingest Library
//!
//! A Rust library for ingesting, validating and normalizing observed
//! ground-motion station data submitted by seismic networks as GeoJSON
//! station lists.
//!
//! This library provides tools for:
//! - Decoding heterogeneous per-network station feature collections
//! - Validating structural and physical consistency of station records
//! - Parsing raw per-channel amplitude names into typed intensity measures
//! - Normalizing intensity-measure units to canonical units while
//!   preserving the originals
//! - Assembling a de-duplicated, insertion-ordered station collection
//! - Surfacing every data-quality defect in a structured ingestion report
//!
//! Record-level data quality problems never abort a batch: the offending
//! record is excluded and the defect is reported. The `Error` type below is
//! reserved for fatal conditions (undecodable input envelope, configuration
//! mistakes, registry contract violations).

pub mod config;
pub mod constants;

// Core application modules
pub mod app {
    pub mod models;
    pub mod services {
        pub mod aggregator;
        pub mod builder;
        pub mod feature;
        pub mod registry;
        pub mod report;
        pub mod validator;
    }
}

// Re-export commonly used types
pub use app::models::{
    Amplitude, Channel, Convention, MeasureSet, MeasureType, Measurement, Station,
    StationCollection,
};
pub use app::services::builder::CollectionBuilder;
pub use app::services::registry::MeasureRegistry;
pub use app::services::report::{Defect, DefectKind, IngestReport, Severity};
pub use config::Config;

/// Result type alias for station ingestion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal error types for station ingestion operations
///
/// These represent failures of the caller's contract rather than data
/// quality problems; per-record data defects are surfaced through
/// [`IngestReport`] instead.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input envelope could not be decoded as JSON
    #[error("JSON decoding error: {message}")]
    JsonDecoding {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The input is not a feature collection of the expected shape
    #[error("Invalid feature collection: {message}")]
    InvalidFeatureCollection { message: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Measure registry contract violation
    #[error("Measure registry error: {message}")]
    Registry { message: String },
}

impl Error {
    /// Create a JSON decoding error with context
    pub fn json_decoding(message: impl Into<String>, source: Option<serde_json::Error>) -> Self {
        Self::JsonDecoding {
            message: message.into(),
            source,
        }
    }

    /// Create an invalid feature collection error
    pub fn invalid_feature_collection(message: impl Into<String>) -> Self {
        Self::InvalidFeatureCollection {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a measure registry error
    pub fn registry(message: impl Into<String>) -> Self {
        Self::Registry {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Self::JsonDecoding {
            message: "JSON decoding failed".to_string(),
            source: Some(error),
        }
    }
}
