//! Record validation
//!
//! Structural and semantic validation of one station feature against the
//! schema: required fields, geographic bounds, per-measurement unit
//! validity and finiteness, SA/FAS period presence, DURATION interval
//! membership, component-convention membership, and range checks on
//! optional numerics.
//!
//! Validation accumulates every defect for a record instead of stopping at
//! the first; a record with any structural defect is excluded from the
//! collection while the batch continues.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::app::models::{Convention, MeasureType, Station};
use crate::app::services::feature::{RawChannel, RawFeature, RawMeasurement};
use crate::app::services::registry::MeasureRegistry;
use crate::app::services::report::{Defect, DefectKind};
use crate::constants::{DURATION_INTERVALS, INTENSITY_RANGE, LATITUDE_RANGE, LONGITUDE_RANGE};

/// A feature that passed structural validation
///
/// Component measurements are still in their original units; unit
/// normalization and duplicate resolution happen in the aggregator.
#[derive(Debug, Clone)]
pub struct ValidatedRecord {
    /// Station scaffold with empty components/channels
    pub station: Station,

    /// Typed component measures in deterministic (sorted-name) order
    pub components: Vec<(Convention, Vec<(MeasureType, Vec<RawMeasurement>)>)>,

    /// Raw channels, passed through for aggregation
    pub channels: Vec<RawChannel>,
}

/// Validator for one station feature at a time
///
/// Pure: distinct records share no mutable state, so validation may run
/// in parallel across records.
#[derive(Debug, Clone)]
pub struct RecordValidator {
    registry: Arc<MeasureRegistry>,
}

impl RecordValidator {
    /// Create a validator over the given measure registry
    pub fn new(registry: Arc<MeasureRegistry>) -> Self {
        Self { registry }
    }

    /// Validate one raw feature
    ///
    /// Returns the validated record when no structural defect was found,
    /// together with every defect discovered (never just the first).
    pub fn validate(&self, feature: &RawFeature) -> (Option<ValidatedRecord>, Vec<Defect>) {
        let mut defects = Vec::new();

        let props = feature.properties.clone().unwrap_or_default();
        let station_id = resolve_id(feature);

        let missing = |field: &str| {
            Defect::structural(
                station_id.clone(),
                DefectKind::MissingRequiredField,
                format!("missing required field '{}'", field),
            )
        };

        // Required scalar fields
        let code = match resolve_code(feature) {
            Some(code) => code,
            None => {
                defects.push(missing("code"));
                String::new()
            }
        };
        let name = match props.name.clone() {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                defects.push(missing("name"));
                String::new()
            }
        };
        let network = match props.network.clone() {
            Some(network) if !network.trim().is_empty() => network,
            _ => {
                defects.push(missing("network"));
                String::new()
            }
        };

        // Geographic position
        let (longitude, latitude, elevation) =
            self.check_geometry(feature, &station_id, &mut defects);

        // A record with neither components nor channels carries no data
        let components = props.components.clone().unwrap_or_default();
        let channels = props.channels.clone().unwrap_or_default();
        if components.is_empty() && channels.is_empty() {
            defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::EmptyRecord,
                "feature has neither components nor channels",
            ));
        }

        let typed_components = self.check_components(&components, &station_id, &mut defects);
        self.check_channels(&channels, &station_id, &mut defects);

        // Optional numerics must be physically plausible when present
        self.check_optional_numerics(&props, &station_id, &mut defects);

        if !defects.is_empty() {
            return (None, defects);
        }

        let station = Station {
            id: station_id.unwrap_or_else(|| format!("{}.{}", network, code)),
            code,
            name,
            network,
            provider: props.provider,
            longitude,
            latitude,
            elevation,
            distance: props.distance,
            instrument_period: props.period,
            damping: props.damping,
            sensitivity: props.sensitivity,
            source_format: props.source_format,
            structure_type: props.structure_type,
            location: props.location,
            intensity: props.intensity,
            nresp: props.nresp,
            intensity_stddev: props.intensity_stddev,
            components: BTreeMap::new(),
            channels: Vec::new(),
        };

        (
            Some(ValidatedRecord {
                station,
                components: typed_components,
                channels,
            }),
            defects,
        )
    }

    fn check_geometry(
        &self,
        feature: &RawFeature,
        station_id: &Option<String>,
        defects: &mut Vec<Defect>,
    ) -> (f64, f64, Option<f64>) {
        let geometry = match &feature.geometry {
            Some(g) => g,
            None => {
                defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::MissingRequiredField,
                    "missing required field 'geometry'",
                ));
                return (0.0, 0.0, None);
            }
        };

        if let Some(kind) = &geometry.geometry_type {
            if kind != "Point" {
                defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::MissingRequiredField,
                    format!("geometry must be a Point, found '{}'", kind),
                ));
            }
        }

        let coordinates = geometry.coordinates.as_deref().unwrap_or(&[]);
        if coordinates.len() < 2 {
            defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::MissingRequiredField,
                "geometry coordinates must carry [longitude, latitude]",
            ));
            return (0.0, 0.0, None);
        }

        let longitude = coordinates[0];
        let latitude = coordinates[1];
        let elevation = coordinates.get(2).copied();

        if !longitude.is_finite() || !(LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&longitude) {
            defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::OutOfRangeValue,
                format!("longitude {} outside [-180, 180]", longitude),
            ));
        }
        if !latitude.is_finite() || !(LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&latitude) {
            defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::OutOfRangeValue,
                format!("latitude {} outside [-90, 90]", latitude),
            ));
        }

        (longitude, latitude, elevation)
    }

    fn check_components(
        &self,
        components: &BTreeMap<String, BTreeMap<String, super::feature::RawMeasureEntry>>,
        station_id: &Option<String>,
        defects: &mut Vec<Defect>,
    ) -> Vec<(Convention, Vec<(MeasureType, Vec<RawMeasurement>)>)> {
        let mut typed = Vec::new();

        for (convention_name, measures) in components {
            let convention = match Convention::from_str(convention_name) {
                Ok(c) => c,
                Err(_) => {
                    defects.push(Defect::structural(
                        station_id.clone(),
                        DefectKind::UnknownComponentConvention,
                        format!("unknown component convention '{}'", convention_name),
                    ));
                    continue;
                }
            };

            let mut typed_measures = Vec::new();
            for (measure_name, entry) in measures {
                let measure = match MeasureType::from_str(measure_name) {
                    Ok(m) => m,
                    Err(_) => {
                        defects.push(Defect::structural(
                            station_id.clone(),
                            DefectKind::UnknownMeasureType,
                            format!(
                                "unknown measure type '{}' under {}",
                                measure_name, convention_name
                            ),
                        ));
                        continue;
                    }
                };

                for measurement in entry.as_slice() {
                    self.check_measurement(measurement, measure, convention, station_id, defects);
                }
                typed_measures.push((measure, entry.as_slice().to_vec()));
            }
            typed.push((convention, typed_measures));
        }

        typed
    }

    fn check_measurement(
        &self,
        measurement: &RawMeasurement,
        measure: MeasureType,
        convention: Convention,
        station_id: &Option<String>,
        defects: &mut Vec<Defect>,
    ) {
        let context = format!("{}.{}", convention, measure);

        match measurement.value {
            None => defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::MissingRequiredField,
                format!("{}: measurement without a value", context),
            )),
            Some(value) if !value.is_finite() => defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::OutOfRangeValue,
                format!("{}: value {} is not finite", context, value),
            )),
            Some(_) => {}
        }

        match measurement.units.as_deref() {
            None => defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::MissingRequiredField,
                format!("{}: measurement without units", context),
            )),
            Some(units) if !self.registry.supports(measure, units) => {
                defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::UnsupportedUnit,
                    format!("{}: unit '{}' not registered for {}", context, units, measure),
                ));
            }
            Some(_) => {}
        }

        if measure.is_spectral() {
            match measurement.period {
                Some(period) if period > 0.0 => {}
                Some(period) => defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::MissingPeriod,
                    format!("{}: period {} must be positive", context, period),
                )),
                None => defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::MissingPeriod,
                    format!("{}: spectral measurement without a period", context),
                )),
            }
        }

        if measure == MeasureType::Duration {
            match measurement.interval.as_deref() {
                Some(interval) if DURATION_INTERVALS.contains(&interval) => {}
                Some(interval) => defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::MissingInterval,
                    format!("{}: interval '{}' is not recognized", context, interval),
                )),
                None => defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::MissingInterval,
                    format!("{}: duration measurement without an interval", context),
                )),
            }
        }

        if let Some(ln_sigma) = measurement.ln_sigma {
            if ln_sigma < 0.0 || !ln_sigma.is_finite() {
                defects.push(Defect::structural(
                    station_id.clone(),
                    DefectKind::OutOfRangeValue,
                    format!("{}: ln_sigma {} must be >= 0", context, ln_sigma),
                ));
            }
        }
    }

    fn check_channels(
        &self,
        channels: &[RawChannel],
        station_id: &Option<String>,
        defects: &mut Vec<Defect>,
    ) {
        for channel in channels {
            let channel_name = match channel.name.as_deref() {
                Some(name) if !name.trim().is_empty() => name,
                _ => {
                    defects.push(Defect::structural(
                        station_id.clone(),
                        DefectKind::MissingRequiredField,
                        "channel without a name",
                    ));
                    continue;
                }
            };

            for amplitude in &channel.amplitudes {
                if amplitude.name.as_deref().is_none_or(|n| n.trim().is_empty()) {
                    defects.push(Defect::structural(
                        station_id.clone(),
                        DefectKind::MissingRequiredField,
                        format!("channel {}: amplitude without a name", channel_name),
                    ));
                }
                match amplitude.value {
                    None => defects.push(Defect::structural(
                        station_id.clone(),
                        DefectKind::MissingRequiredField,
                        format!("channel {}: amplitude without a value", channel_name),
                    )),
                    Some(value) if !value.is_finite() => defects.push(Defect::structural(
                        station_id.clone(),
                        DefectKind::OutOfRangeValue,
                        format!("channel {}: value {} is not finite", channel_name, value),
                    )),
                    Some(_) => {}
                }
                if let Some(ln_sigma) = amplitude.ln_sigma {
                    if ln_sigma < 0.0 || !ln_sigma.is_finite() {
                        defects.push(Defect::structural(
                            station_id.clone(),
                            DefectKind::OutOfRangeValue,
                            format!(
                                "channel {}: ln_sigma {} must be >= 0",
                                channel_name, ln_sigma
                            ),
                        ));
                    }
                }
            }
        }
    }

    fn check_optional_numerics(
        &self,
        props: &super::feature::RawProperties,
        station_id: &Option<String>,
        defects: &mut Vec<Defect>,
    ) {
        let mut out_of_range = |field: &str, value: f64, constraint: &str| {
            defects.push(Defect::structural(
                station_id.clone(),
                DefectKind::OutOfRangeValue,
                format!("{} {} must be {}", field, value, constraint),
            ));
        };

        if let Some(distance) = props.distance {
            if !distance.is_finite() || distance < 0.0 {
                out_of_range("distance", distance, ">= 0");
            }
        }
        if let Some(period) = props.period {
            if !period.is_finite() || period <= 0.0 {
                out_of_range("instrument period", period, "> 0");
            }
        }
        if let Some(damping) = props.damping {
            if !damping.is_finite() || damping <= 0.0 {
                out_of_range("damping", damping, "> 0");
            }
        }
        if let Some(sensitivity) = props.sensitivity {
            if !sensitivity.is_finite() || sensitivity <= 0.0 {
                out_of_range("sensitivity", sensitivity, "> 0");
            }
        }
        if let Some(intensity) = props.intensity {
            if !intensity.is_finite()
                || !(INTENSITY_RANGE.0..=INTENSITY_RANGE.1).contains(&intensity)
            {
                out_of_range("intensity", intensity, "within [1, 10]");
            }
        }
        if let Some(nresp) = props.nresp {
            if nresp < 1 {
                out_of_range("nresp", nresp as f64, ">= 1");
            }
        }
        if let Some(stddev) = props.intensity_stddev {
            if !stddev.is_finite() || stddev < 0.0 {
                out_of_range("intensity_stddev", stddev, ">= 0");
            }
        }
    }
}

/// Resolve the station identifier: an explicit feature id wins, otherwise
/// `<network>.<code>` is composed (the network prefix is not doubled when
/// the code already carries it)
fn resolve_id(feature: &RawFeature) -> Option<String> {
    if let Some(id) = &feature.id {
        return Some(id.clone());
    }
    let props = feature.properties.as_ref()?;
    let code = props.code.as_ref()?;
    match &props.network {
        Some(network) if !code.starts_with(network.as_str()) => {
            Some(format!("{}.{}", network, code))
        }
        _ => Some(code.clone()),
    }
}

/// Resolve the bare station code, falling back to the id's suffix
fn resolve_code(feature: &RawFeature) -> Option<String> {
    if let Some(props) = &feature.properties {
        if let Some(code) = &props.code {
            return Some(code.clone());
        }
    }
    let id = feature.id.as_ref()?;
    Some(match id.split_once('.') {
        Some((_, code)) => code.to_string(),
        None => id.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::services::feature::decode_feature;
    use serde_json::{Value, json};

    fn validator() -> RecordValidator {
        RecordValidator::new(Arc::new(MeasureRegistry::standard()))
    }

    fn valid_feature() -> Value {
        json!({
            "id": "PR.BY02",
            "properties": {
                "code": "BY02",
                "name": "Bayamon 02",
                "network": "PR",
                "distance": 12.5,
                "components": {
                    "ROTD50": {
                        "PGA": {"value": 1.0, "units": "%g", "flag": 0},
                        "SA": [
                            {"value": 1.0, "units": "%g", "flag": 0, "period": 0.3}
                        ]
                    }
                }
            },
            "geometry": {"type": "Point", "coordinates": [-66.15, 18.39, 35.0]}
        })
    }

    fn validate(value: Value) -> (Option<ValidatedRecord>, Vec<Defect>) {
        let feature = decode_feature(&value).unwrap();
        validator().validate(&feature)
    }

    #[test]
    fn test_valid_feature_passes() {
        let (record, defects) = validate(valid_feature());
        assert!(defects.is_empty());
        let record = record.unwrap();
        assert_eq!(record.station.id, "PR.BY02");
        assert_eq!(record.station.longitude, -66.15);
        assert_eq!(record.station.elevation, Some(35.0));
        assert_eq!(record.components.len(), 1);
        assert_eq!(record.components[0].0, Convention::RotD50);
    }

    #[test]
    fn test_missing_name_rejected() {
        let mut value = valid_feature();
        value["properties"].as_object_mut().unwrap().remove("name");
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].kind, DefectKind::MissingRequiredField);
        assert_eq!(defects[0].station_id.as_deref(), Some("PR.BY02"));
    }

    #[test]
    fn test_defects_accumulate() {
        let mut value = valid_feature();
        let props = value["properties"].as_object_mut().unwrap();
        props.remove("name");
        props.remove("network");
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects.len(), 2);
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let mut value = valid_feature();
        value["geometry"]["coordinates"] = json!([-190.0, 95.0]);
        let (record, defects) = validate(value);
        assert!(record.is_none());
        let kinds: Vec<DefectKind> = defects.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![DefectKind::OutOfRangeValue, DefectKind::OutOfRangeValue]
        );
    }

    #[test]
    fn test_empty_record_rejected() {
        let mut value = valid_feature();
        value["properties"].as_object_mut().unwrap().remove("components");
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects[0].kind, DefectKind::EmptyRecord);
    }

    #[test]
    fn test_unknown_convention_rejected() {
        let mut value = valid_feature();
        let components = value["properties"]["components"].as_object_mut().unwrap();
        let measures = components.remove("ROTD50").unwrap();
        components.insert("ROTD100".to_string(), measures);
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].kind, DefectKind::UnknownComponentConvention);
    }

    #[test]
    fn test_unknown_measure_type_rejected() {
        let mut value = valid_feature();
        value["properties"]["components"]["ROTD50"]["ARIAS"] =
            json!({"value": 0.4, "units": "m/s", "flag": 0});
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects[0].kind, DefectKind::UnknownMeasureType);
    }

    #[test]
    fn test_unsupported_unit_rejected() {
        let mut value = valid_feature();
        value["properties"]["components"]["ROTD50"]["PGA"]["units"] = json!("furlongs");
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects[0].kind, DefectKind::UnsupportedUnit);
    }

    #[test]
    fn test_sa_without_period_rejected() {
        let mut value = valid_feature();
        value["properties"]["components"]["ROTD50"]["SA"][0]
            .as_object_mut()
            .unwrap()
            .remove("period");
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects[0].kind, DefectKind::MissingPeriod);
    }

    #[test]
    fn test_nonpositive_period_rejected() {
        let mut value = valid_feature();
        value["properties"]["components"]["ROTD50"]["SA"][0]["period"] = json!(0.0);
        let (_, defects) = validate(value);
        assert_eq!(defects[0].kind, DefectKind::MissingPeriod);
    }

    #[test]
    fn test_duration_interval_membership() {
        let mut value = valid_feature();
        value["properties"]["components"]["ROTD50"]["DURATION"] =
            json!({"value": 10.0, "units": "s", "flag": 0});
        let (_, defects) = validate(value.clone());
        assert_eq!(defects[0].kind, DefectKind::MissingInterval);

        value["properties"]["components"]["ROTD50"]["DURATION"]["interval"] = json!("7-93");
        let (_, defects) = validate(value.clone());
        assert_eq!(defects[0].kind, DefectKind::MissingInterval);

        value["properties"]["components"]["ROTD50"]["DURATION"]["interval"] = json!("5-95");
        let (record, defects) = validate(value);
        assert!(defects.is_empty());
        assert!(record.is_some());
    }

    #[test]
    fn test_negative_distance_rejected() {
        let mut value = valid_feature();
        value["properties"]["distance"] = json!(-1.0);
        let (record, defects) = validate(value);
        assert!(record.is_none());
        assert_eq!(defects[0].kind, DefectKind::OutOfRangeValue);
    }

    #[test]
    fn test_intensity_supplement_range() {
        let mut value = valid_feature();
        value["properties"]["intensity"] = json!(11.5);
        let (_, defects) = validate(value.clone());
        assert_eq!(defects[0].kind, DefectKind::OutOfRangeValue);

        value["properties"]["intensity"] = json!(6.2);
        let (record, defects) = validate(value);
        assert!(defects.is_empty());
        assert_eq!(record.unwrap().station.intensity, Some(6.2));
    }

    #[test]
    fn test_channels_only_record_passes() {
        let value = json!({
            "id": "CI.23920",
            "properties": {
                "code": "23920",
                "name": "Desert site",
                "network": "CI",
                "channels": [
                    {"name": "HNE", "amplitudes": [
                        {"name": "pga", "value": 3.2, "units": "%g", "flag": 0}
                    ]}
                ]
            },
            "geometry": {"type": "Point", "coordinates": [-116.3, 34.1]}
        });
        let (record, defects) = validate(value);
        assert!(defects.is_empty());
        let record = record.unwrap();
        assert_eq!(record.channels.len(), 1);
        assert!(record.components.is_empty());
    }

    #[test]
    fn test_id_composed_from_network_and_code() {
        let mut value = valid_feature();
        value.as_object_mut().unwrap().remove("id");
        let (record, defects) = validate(value);
        assert!(defects.is_empty());
        assert_eq!(record.unwrap().station.id, "PR.BY02");
    }
}
