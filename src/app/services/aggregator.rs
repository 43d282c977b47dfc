//! Component aggregation and unit normalization
//!
//! Turns a validated record into its canonical station form: explicit
//! component sets are taken as authoritative (never re-derived from
//! channels), raw amplitude names are parsed against the fixed grammar
//! `pga | pgv | sa(<period>) | fas(<period>) | duration(<interval>)`, and
//! every retained measurement is converted to its measure type's canonical
//! unit while keeping the original value and unit for traceability.
//!
//! Duplicate (measure-type, period) pairs within one component set are a
//! consistency defect: the first occurrence is retained deterministically
//! by input order and the duplication is surfaced to the caller. Ties are
//! never resolved by averaging or overwrite.

use regex::Regex;
use std::sync::Arc;

use crate::app::models::{
    Amplitude, AmplitudeKind, Channel, Convention, MeasureSet, MeasureType, Measurement, Station,
};
use crate::app::services::feature::{RawAmplitude, RawChannel, RawMeasurement};
use crate::app::services::registry::MeasureRegistry;
use crate::app::services::report::{Defect, DefectKind};
use crate::app::services::validator::ValidatedRecord;
use crate::constants::{DURATION_INTERVALS, PERIOD_EPSILON};

/// Aggregator for one validated record at a time
///
/// Pure per record; safe to run across records in parallel.
#[derive(Debug, Clone)]
pub struct ComponentAggregator {
    registry: Arc<MeasureRegistry>,
    spectral_name: Regex,
    duration_name: Regex,
}

impl ComponentAggregator {
    /// Create an aggregator over the given measure registry
    pub fn new(registry: Arc<MeasureRegistry>) -> Self {
        // The grammar is fixed; these patterns are compiled once per
        // aggregator, not per record.
        let spectral_name = Regex::new(r"^(sa|fas)\(([0-9]*\.?[0-9]+)\)$")
            .unwrap_or_else(|e| panic!("invalid spectral amplitude pattern: {e}"));
        let duration_name = Regex::new(r"^duration\(([0-9]+-[0-9]+)\)$")
            .unwrap_or_else(|e| panic!("invalid duration amplitude pattern: {e}"));
        Self {
            registry,
            spectral_name,
            duration_name,
        }
    }

    /// Aggregate a validated record into its canonical station
    ///
    /// All defects returned here are warnings: the record stays accepted.
    pub fn aggregate(&self, record: ValidatedRecord) -> (Station, Vec<Defect>) {
        let mut defects = Vec::new();
        let mut station = record.station;
        let station_id = station.id.clone();

        for (convention, measures) in record.components {
            let set = self.build_measure_set(convention, measures, &station_id, &mut defects);
            station.components.insert(convention, set);
        }

        station.channels = record
            .channels
            .into_iter()
            .map(|channel| self.normalize_channel(channel, &station_id, &mut defects))
            .collect();

        (station, defects)
    }

    fn build_measure_set(
        &self,
        convention: Convention,
        measures: Vec<(MeasureType, Vec<RawMeasurement>)>,
        station_id: &str,
        defects: &mut Vec<Defect>,
    ) -> MeasureSet {
        let mut set = MeasureSet::default();

        for (measure, raw_measurements) in measures {
            if measure.is_scalar() {
                if let Some(first) = raw_measurements.first() {
                    let measurement = self.normalize_measurement(first, measure);
                    match measure {
                        MeasureType::Pga => set.pga = Some(measurement),
                        MeasureType::Pgv => set.pgv = Some(measurement),
                        MeasureType::Duration => set.duration = Some(measurement),
                        _ => {}
                    }
                }
                if raw_measurements.len() > 1 {
                    defects.push(Defect::warning(
                        Some(station_id.to_string()),
                        DefectKind::DuplicateMeasurement,
                        format!(
                            "{}.{}: scalar measure reported {} times; first occurrence retained",
                            convention,
                            measure,
                            raw_measurements.len()
                        ),
                    ));
                }
            } else {
                let mut seen_periods: Vec<f64> = Vec::new();
                let mut sequence = Vec::new();
                for raw in &raw_measurements {
                    let Some(period) = raw.period else { continue };
                    if seen_periods
                        .iter()
                        .any(|p| (p - period).abs() <= PERIOD_EPSILON)
                    {
                        defects.push(Defect::warning(
                            Some(station_id.to_string()),
                            DefectKind::DuplicateMeasurement,
                            format!(
                                "{}.{}: duplicate measurement at period {}; first occurrence retained",
                                convention, measure, period
                            ),
                        ));
                        continue;
                    }
                    seen_periods.push(period);
                    sequence.push(self.normalize_measurement(raw, measure));
                }
                match measure {
                    MeasureType::Sa => set.sa = sequence,
                    MeasureType::Fas => set.fas = sequence,
                    _ => {}
                }
            }
        }

        set
    }

    /// Convert one validated raw measurement into its canonical form
    ///
    /// Value and units were checked by the validator; missing pieces here
    /// only leave the canonical fields unset.
    fn normalize_measurement(&self, raw: &RawMeasurement, measure: MeasureType) -> Measurement {
        let value = raw.value.unwrap_or(f64::NAN);
        let units = raw.units.clone().unwrap_or_default();

        let canonical = self
            .registry
            .convert(measure, &units, value)
            .ok()
            .zip(self.registry.canonical_unit(measure).ok());

        Measurement {
            value,
            units,
            flag: raw.flag.clone(),
            ln_sigma: raw.ln_sigma,
            period: raw.period,
            interval: raw.interval.clone(),
            canonical_value: canonical.as_ref().map(|(v, _)| *v),
            canonical_units: canonical.map(|(_, u)| u.to_string()),
        }
    }

    fn normalize_channel(
        &self,
        channel: RawChannel,
        station_id: &str,
        defects: &mut Vec<Defect>,
    ) -> Channel {
        let channel_name = channel.name.unwrap_or_default();
        let amplitudes = channel
            .amplitudes
            .into_iter()
            .map(|raw| self.normalize_amplitude(raw, &channel_name, station_id, defects))
            .collect();
        Channel {
            name: channel_name,
            amplitudes,
        }
    }

    fn normalize_amplitude(
        &self,
        raw: RawAmplitude,
        channel_name: &str,
        station_id: &str,
        defects: &mut Vec<Defect>,
    ) -> Amplitude {
        let name = raw.name.unwrap_or_default();
        let kind = self.parse_amplitude_name(&name);

        if kind == AmplitudeKind::Unrecognized {
            defects.push(Defect::warning(
                Some(station_id.to_string()),
                DefectKind::UnrecognizedAmplitudeName,
                format!(
                    "channel {}: amplitude name '{}' does not match the grammar",
                    channel_name, name
                ),
            ));
        }
        if let AmplitudeKind::Duration(interval) = &kind {
            if !DURATION_INTERVALS.contains(&interval.as_str()) {
                defects.push(Defect::warning(
                    Some(station_id.to_string()),
                    DefectKind::MissingInterval,
                    format!(
                        "channel {}: duration interval '{}' is not recognized",
                        channel_name, interval
                    ),
                ));
            }
        }

        let value = raw.value.unwrap_or(f64::NAN);
        let units = raw.units.clone().unwrap_or_default();

        // Channels are raw evidence: a unit the registry does not carry is
        // reported but keeps the amplitude, with no canonical value.
        let canonical_value = match measure_of(&kind) {
            Some(measure) => {
                if self.registry.supports(measure, &units) {
                    self.registry.convert(measure, &units, value).ok()
                } else {
                    defects.push(Defect::warning(
                        Some(station_id.to_string()),
                        DefectKind::UnsupportedUnit,
                        format!(
                            "channel {}: unit '{}' not registered for {}",
                            channel_name, units, measure
                        ),
                    ));
                    None
                }
            }
            None => None,
        };

        Amplitude {
            name,
            value,
            units,
            flag: raw.flag,
            ln_sigma: raw.ln_sigma,
            kind,
            canonical_value,
        }
    }

    /// Parse an amplitude name against the fixed grammar
    pub fn parse_amplitude_name(&self, name: &str) -> AmplitudeKind {
        let name = name.trim().to_ascii_lowercase();
        match name.as_str() {
            "pga" => return AmplitudeKind::Scalar(MeasureType::Pga),
            "pgv" => return AmplitudeKind::Scalar(MeasureType::Pgv),
            _ => {}
        }

        if let Some(captures) = self.spectral_name.captures(&name) {
            let measure = match &captures[1] {
                "sa" => MeasureType::Sa,
                _ => MeasureType::Fas,
            };
            if let Ok(period) = captures[2].parse::<f64>() {
                if period > 0.0 {
                    return AmplitudeKind::Spectral(measure, period);
                }
            }
            return AmplitudeKind::Unrecognized;
        }

        if let Some(captures) = self.duration_name.captures(&name) {
            return AmplitudeKind::Duration(captures[1].to_string());
        }

        AmplitudeKind::Unrecognized
    }
}

fn measure_of(kind: &AmplitudeKind) -> Option<MeasureType> {
    match kind {
        AmplitudeKind::Scalar(measure) => Some(*measure),
        AmplitudeKind::Spectral(measure, _) => Some(*measure),
        AmplitudeKind::Duration(_) => Some(MeasureType::Duration),
        AmplitudeKind::Unrecognized => None,
    }
}
