//! Configuration management and validation.
//!
//! Provides the configuration structure for the ingestion pipeline along
//! with validation of processing parameters.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of parallel workers for the fan-out validation/aggregation
    /// stage. Only consulted by [`CollectionBuilder::build_parallel`];
    /// the serial build ignores it.
    ///
    /// [`CollectionBuilder::build_parallel`]: crate::CollectionBuilder::build_parallel
    pub parallel_workers: usize,

    /// Emit a `tracing` warning for every rejected record in addition to
    /// recording it in the ingestion report
    pub log_rejections: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            parallel_workers: num_cpus::get(),
            log_rejections: true,
        }
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.parallel_workers == 0 {
            return Err(Error::configuration(
                "parallel_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
