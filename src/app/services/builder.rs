//! Station collection assembly
//!
//! Runs the full ingestion pipeline over a feature batch: per-feature
//! decode, validation and aggregation, then a single serial assembly pass
//! that preserves input order, detects duplicate station identifiers
//! (first occurrence wins) and accumulates the ingestion report.
//!
//! `build` is deterministic: identical input always yields an identical
//! collection and report. The parallel variant fans per-record work out
//! across workers and merges results back by original index before the
//! order-sensitive duplicate detection runs, so it is bit-identical to the
//! serial build at any concurrency degree.

use futures::future::join_all;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::app::models::{Station, StationCollection};
use crate::app::services::aggregator::ComponentAggregator;
use crate::app::services::feature::{decode_feature, feature_id_hint, parse_collection};
use crate::app::services::registry::MeasureRegistry;
use crate::app::services::report::{Defect, DefectKind, IngestReport};
use crate::app::services::validator::RecordValidator;
use crate::config::Config;
use crate::Result;

/// Outcome of validating and aggregating one feature
struct FeatureOutcome {
    /// The canonical station, absent when a structural defect excluded it
    station: Option<Station>,
    defects: Vec<Defect>,
}

/// Builder assembling a validated, de-duplicated station collection
#[derive(Debug, Clone)]
pub struct CollectionBuilder {
    validator: RecordValidator,
    aggregator: ComponentAggregator,
    config: Config,
}

impl CollectionBuilder {
    /// Create a builder over the standard measure registry
    pub fn new() -> Self {
        Self::with_registry(Arc::new(MeasureRegistry::standard()))
    }

    /// Create a builder over an injected measure registry
    pub fn with_registry(registry: Arc<MeasureRegistry>) -> Self {
        Self {
            validator: RecordValidator::new(Arc::clone(&registry)),
            aggregator: ComponentAggregator::new(registry),
            config: Config::default(),
        }
    }

    /// Replace the configuration, validating it first
    pub fn with_config(mut self, config: Config) -> Result<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Parse a GeoJSON feature collection and build from it
    pub fn build_from_json(&self, input: &str) -> Result<(StationCollection, IngestReport)> {
        let features = parse_collection(input)?;
        Ok(self.build(&features))
    }

    /// Build a station collection from decoded feature values
    ///
    /// Always returns both a (possibly partial) collection and the
    /// complete report; record-level defects never abort the batch.
    pub fn build(&self, features: &[Value]) -> (StationCollection, IngestReport) {
        info!("Ingesting {} station features", features.len());
        let outcomes: Vec<FeatureOutcome> = features
            .iter()
            .map(|feature| self.process_feature(feature))
            .collect();
        self.assemble(outcomes, features.len())
    }

    /// Build in parallel across `config.parallel_workers` workers
    ///
    /// Per-record validation and aggregation share no mutable state; only
    /// the final assembly is serial. Results are merged in original input
    /// order, never completion order.
    pub async fn build_parallel(
        &self,
        features: Vec<Value>,
    ) -> (StationCollection, IngestReport) {
        let total = features.len();
        let workers = self.config.parallel_workers.max(1);
        let chunk_size = total.div_ceil(workers).max(1);
        info!(
            "Ingesting {} station features across {} workers",
            total, workers
        );

        let handles: Vec<_> = features
            .chunks(chunk_size)
            .map(|chunk| {
                let builder = self.clone();
                let chunk = chunk.to_vec();
                tokio::spawn(async move {
                    chunk
                        .iter()
                        .map(|feature| builder.process_feature(feature))
                        .collect::<Vec<FeatureOutcome>>()
                })
            })
            .collect();

        // join_all preserves spawn order, so outcomes line up with the
        // original feature order regardless of completion order.
        let mut outcomes = Vec::with_capacity(total);
        for joined in join_all(handles).await {
            match joined {
                Ok(chunk_outcomes) => outcomes.extend(chunk_outcomes),
                Err(e) => {
                    // A panicking worker would desynchronize outcome order;
                    // surface it instead of guessing.
                    panic!("ingestion worker failed: {e}");
                }
            }
        }
        self.assemble(outcomes, total)
    }

    /// Decode, validate and aggregate one feature
    fn process_feature(&self, feature: &Value) -> FeatureOutcome {
        let raw = match decode_feature(feature) {
            Ok(raw) => raw,
            Err(message) => {
                return FeatureOutcome {
                    station: None,
                    defects: vec![Defect::structural(
                        feature_id_hint(feature),
                        DefectKind::MissingRequiredField,
                        format!("feature did not decode: {}", message),
                    )],
                };
            }
        };

        let (validated, defects) = self.validator.validate(&raw);
        match validated {
            Some(record) => {
                let (station, warnings) = self.aggregator.aggregate(record);
                debug!("Accepted station {}", station.id);
                FeatureOutcome {
                    station: Some(station),
                    defects: warnings,
                }
            }
            None => FeatureOutcome {
                station: None,
                defects,
            },
        }
    }

    /// Serial assembly: order preservation, duplicate-identifier
    /// detection and report accumulation
    fn assemble(
        &self,
        outcomes: Vec<FeatureOutcome>,
        total_input: usize,
    ) -> (StationCollection, IngestReport) {
        let mut stations: Vec<Station> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut report = IngestReport {
            total_input,
            ..IngestReport::default()
        };

        for outcome in outcomes {
            match outcome.station {
                Some(station) => {
                    report.defects.extend(outcome.defects);
                    if seen.contains(&station.id) {
                        report.defects.push(Defect::structural(
                            Some(station.id.clone()),
                            DefectKind::DuplicateStation,
                            format!(
                                "station identifier '{}' already present; first occurrence kept",
                                station.id
                            ),
                        ));
                        report.rejected += 1;
                        if self.config.log_rejections {
                            warn!("Rejected duplicate station {}", station.id);
                        }
                    } else {
                        seen.insert(station.id.clone());
                        stations.push(station);
                        report.accepted += 1;
                    }
                }
                None => {
                    if self.config.log_rejections {
                        for defect in &outcome.defects {
                            warn!("Rejected record: {}", defect);
                        }
                    }
                    report.defects.extend(outcome.defects);
                    report.rejected += 1;
                }
            }
        }

        info!("Ingestion complete: {}", report.summary());
        (StationCollection::from_stations(stations), report)
    }
}

impl Default for CollectionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
