//! Wire-format decoding for station feature collections
//!
//! Decodes GeoJSON-compatible station submissions into raw, loosely-typed
//! structures. Heterogeneous `components`/`channels` substructures decode
//! into a closed set of tagged variants (scalar measurement vs. periodic
//! measurement sequence) rather than branching on object shape at every
//! access site.
//!
//! All per-feature fields are optional at this layer so that missing or
//! mistyped fields surface as structured validation defects instead of
//! hard decode errors; only an undecodable outer envelope is fatal.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Parse the outer GeoJSON envelope, returning one raw JSON value per
/// feature
///
/// Per-feature decoding is deferred to [`decode_feature`] so that one
/// malformed feature cannot abort the batch.
pub fn parse_collection(input: &str) -> Result<Vec<Value>> {
    let envelope: Value = serde_json::from_str(input)
        .map_err(|e| Error::json_decoding("input is not valid JSON", Some(e)))?;
    features_of(&envelope)
}

/// Extract the feature values from an already-decoded envelope
pub fn features_of(envelope: &Value) -> Result<Vec<Value>> {
    let object = envelope
        .as_object()
        .ok_or_else(|| Error::invalid_feature_collection("top-level value is not an object"))?;

    if let Some(kind) = object.get("type").and_then(Value::as_str) {
        if kind != "FeatureCollection" {
            return Err(Error::invalid_feature_collection(format!(
                "expected type 'FeatureCollection', found '{}'",
                kind
            )));
        }
    }

    let features = object
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid_feature_collection("missing 'features' array"))?;

    Ok(features.to_vec())
}

/// Decode one feature value into the raw representation
///
/// Returns the serde error message on failure; the caller turns it into a
/// per-record defect.
pub fn decode_feature(value: &Value) -> std::result::Result<RawFeature, String> {
    serde_json::from_value(value.clone()).map_err(|e| e.to_string())
}

/// Best-effort identifier extraction for defect attribution when a
/// feature fails to decode or validate
pub fn feature_id_hint(value: &Value) -> Option<String> {
    if let Some(id) = value.get("id") {
        if let Some(s) = id.as_str() {
            return Some(s.to_string());
        }
        if let Some(n) = id.as_i64() {
            return Some(n.to_string());
        }
    }
    let props = value.get("properties")?;
    let code = string_or_number(props.get("code")?)?;
    match props.get("network").and_then(Value::as_str) {
        Some(network) if !code.starts_with(network) => Some(format!("{}.{}", network, code)),
        _ => Some(code),
    }
}

fn string_or_number(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// =============================================================================
// Raw Structures
// =============================================================================

/// One feature as submitted, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct RawFeature {
    /// Station identifier, usually `<network>.<code>`
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,

    #[serde(default)]
    pub properties: Option<RawProperties>,

    #[serde(default)]
    pub geometry: Option<RawGeometry>,
}

/// Point geometry with `[longitude, latitude, elevation?]` coordinates
#[derive(Debug, Clone, Deserialize)]
pub struct RawGeometry {
    #[serde(rename = "type", default)]
    pub geometry_type: Option<String>,

    #[serde(default)]
    pub coordinates: Option<Vec<f64>>,
}

/// Station properties as submitted
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawProperties {
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub network: Option<String>,

    /// Source network / data provider
    #[serde(default)]
    pub provider: Option<String>,

    /// Epicentral distance in km
    #[serde(default)]
    pub distance: Option<f64>,

    /// Instrument natural period in seconds
    #[serde(default)]
    pub period: Option<f64>,

    /// Instrument damping ratio
    #[serde(default)]
    pub damping: Option<f64>,

    /// Instrument sensitivity
    #[serde(default)]
    pub sensitivity: Option<f64>,

    #[serde(default)]
    pub source_format: Option<String>,

    #[serde(default, rename = "structure")]
    pub structure_type: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    /// Macroseismic intensity observation
    #[serde(default)]
    pub intensity: Option<f64>,

    /// Number of responses behind an aggregated intensity
    #[serde(default)]
    pub nresp: Option<i64>,

    #[serde(default)]
    pub intensity_stddev: Option<f64>,

    /// Convention name -> measure name -> scalar or sequence
    #[serde(default)]
    pub components: Option<BTreeMap<String, BTreeMap<String, RawMeasureEntry>>>,

    #[serde(default)]
    pub channels: Option<Vec<RawChannel>>,
}

/// A measure entry under a component convention: either a single scalar
/// measurement or an ordered sequence of periodic measurements
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMeasureEntry {
    Scalar(RawMeasurement),
    Sequence(Vec<RawMeasurement>),
}

impl RawMeasureEntry {
    /// View the entry as an ordered slice regardless of wire shape
    pub fn as_slice(&self) -> &[RawMeasurement] {
        match self {
            RawMeasureEntry::Scalar(m) => std::slice::from_ref(m),
            RawMeasureEntry::Sequence(v) => v.as_slice(),
        }
    }
}

/// One measurement as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct RawMeasurement {
    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub units: Option<String>,

    /// Quality flag; real feeds carry this as an integer, a numeric
    /// string, or a network-defined letter coding
    #[serde(default, deserialize_with = "lenient_flag")]
    pub flag: Option<String>,

    #[serde(default)]
    pub ln_sigma: Option<f64>,

    #[serde(default)]
    pub period: Option<f64>,

    #[serde(default)]
    pub interval: Option<String>,
}

/// One raw channel as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct RawChannel {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub amplitudes: Vec<RawAmplitude>,
}

/// One named amplitude reading as submitted
#[derive(Debug, Clone, Deserialize)]
pub struct RawAmplitude {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub value: Option<f64>,

    #[serde(default)]
    pub units: Option<String>,

    #[serde(default, deserialize_with = "lenient_flag")]
    pub flag: Option<String>,

    #[serde(default)]
    pub ln_sigma: Option<f64>,
}

// =============================================================================
// Lenient Field Deserializers
// =============================================================================

/// Accept strings or numbers for identifier-like fields
fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(string_or_number))
}

/// Accept integers or strings for quality flags, preserving the source
/// coding verbatim; the enumerated meaning of nonzero codings belongs to
/// the contributing network and is never reinterpreted here
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.trim().to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_envelope() {
        let input = r#"{"type":"FeatureCollection","features":[{"id":"PR.BY02"}]}"#;
        let features = parse_collection(input).unwrap();
        assert_eq!(features.len(), 1);
    }

    #[test]
    fn test_envelope_without_features_is_fatal() {
        assert!(parse_collection(r#"{"type":"FeatureCollection"}"#).is_err());
        assert!(parse_collection("[1,2,3]").is_err());
        assert!(parse_collection("not json").is_err());
    }

    #[test]
    fn test_wrong_envelope_type_is_fatal() {
        let input = r#"{"type":"Feature","features":[]}"#;
        assert!(parse_collection(input).is_err());
    }

    #[test]
    fn test_decode_components_scalar_and_sequence() {
        let value = json!({
            "id": "PR.BY02",
            "properties": {
                "code": "BY02",
                "name": "Test",
                "network": "PR",
                "components": {
                    "ROTD50": {
                        "PGA": {"value": 1.0, "units": "%g", "flag": "0"},
                        "SA": [
                            {"value": 1.0, "units": "%g", "flag": 0, "period": 0.3}
                        ]
                    }
                }
            },
            "geometry": {"type": "Point", "coordinates": [-66.1, 18.4]}
        });
        let feature = decode_feature(&value).unwrap();
        let props = feature.properties.unwrap();
        let components = props.components.unwrap();
        let rotd50 = &components["ROTD50"];
        assert!(matches!(rotd50["PGA"], RawMeasureEntry::Scalar(_)));
        assert_eq!(rotd50["SA"].as_slice().len(), 1);
        assert_eq!(rotd50["SA"].as_slice()[0].period, Some(0.3));
    }

    #[test]
    fn test_flag_accepts_number_and_string() {
        let m: RawMeasurement = serde_json::from_value(json!({"value": 1.0, "flag": "2"})).unwrap();
        assert_eq!(m.flag.as_deref(), Some("2"));
        let m: RawMeasurement = serde_json::from_value(json!({"value": 1.0, "flag": 3})).unwrap();
        assert_eq!(m.flag.as_deref(), Some("3"));
        let m: RawMeasurement = serde_json::from_value(json!({"value": 1.0})).unwrap();
        assert_eq!(m.flag, None);
    }

    #[test]
    fn test_letter_flag_coding_preserved() {
        let m: RawMeasurement = serde_json::from_value(json!({"value": 1.0, "flag": "T"})).unwrap();
        assert_eq!(m.flag.as_deref(), Some("T"));
        let m: RawMeasurement =
            serde_json::from_value(json!({"value": 1.0, "flag": " G "})).unwrap();
        assert_eq!(m.flag.as_deref(), Some("G"));
    }

    #[test]
    fn test_numeric_station_code_decodes_as_string() {
        let value = json!({"properties": {"code": 8226}});
        let feature = decode_feature(&value).unwrap();
        assert_eq!(feature.properties.unwrap().code.as_deref(), Some("8226"));
    }

    #[test]
    fn test_id_hint_prefixes_network() {
        let value = json!({"properties": {"code": "BY02", "network": "PR"}});
        assert_eq!(feature_id_hint(&value).as_deref(), Some("PR.BY02"));
        let value = json!({"id": "OK.BY01"});
        assert_eq!(feature_id_hint(&value).as_deref(), Some("OK.BY01"));
        let value = json!({"properties": {"name": "x"}});
        assert_eq!(feature_id_hint(&value), None);
    }
}
