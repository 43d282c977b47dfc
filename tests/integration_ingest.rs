//! Integration tests for end-to-end station ingestion
//!
//! These tests exercise the full pipeline from raw GeoJSON text through
//! decoding, validation, aggregation and collection assembly, using
//! realistic multi-network feature collections.

use serde_json::json;
use station_ingest::{
    CollectionBuilder, Config, Convention, DefectKind, MeasureType, Severity,
};

/// Route pipeline tracing output through the test harness's capture
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A realistic three-network submission: spectral accelerations, scalar
/// peak motions and a significant-duration record
fn reference_collection() -> String {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "id": "PR.BY02",
                "properties": {
                    "code": "BY02",
                    "name": "Bayamon 02",
                    "network": "PR",
                    "provider": "PRSMP",
                    "distance": 12.4,
                    "components": {
                        "ROTD50": {
                            "SA": [
                                {"value": 1.0, "units": "%g", "flag": 0, "period": 0.3},
                                {"value": 0.8, "units": "%g", "flag": 0, "period": 1.0}
                            ]
                        },
                        "GREATER_OF_TWO_HORIZONTALS": {
                            "PGA": {"value": 0.02, "units": "g", "flag": 0}
                        }
                    },
                    "channels": [
                        {
                            "name": "HNE",
                            "amplitudes": [
                                {"name": "pga", "value": 1.9, "units": "%g", "flag": 0},
                                {"name": "sa(0.3)", "value": 2.1, "units": "%g", "flag": 0}
                            ]
                        }
                    ]
                },
                "geometry": {"type": "Point", "coordinates": [-66.15, 18.39, 35.0]}
            },
            {
                "id": "OK.BY01",
                "properties": {
                    "code": "BY01",
                    "name": "Oklahoma 01",
                    "network": "OK",
                    "intensity": 4.2,
                    "nresp": 17,
                    "components": {
                        "GREATER_OF_TWO_HORIZONTALS": {
                            "PGA": {"value": 0.5, "units": "g", "flag": 0},
                            "PGV": {"value": 0.04, "units": "m/s", "flag": 0}
                        }
                    }
                },
                "geometry": {"type": "Point", "coordinates": [-97.5, 35.5]}
            },
            {
                "id": "TE.BY03",
                "properties": {
                    "code": "BY03",
                    "name": "Texas 03",
                    "network": "TE",
                    "components": {
                        "GREATER_OF_TWO_HORIZONTALS": {
                            "DURATION": {"value": 10.0, "units": "s", "flag": 0, "interval": "5-95"}
                        }
                    }
                },
                "geometry": {"type": "Point", "coordinates": [-102.1, 31.8]}
            }
        ]
    })
    .to_string()
}

/// Test end-to-end ingestion of a clean multi-network collection
///
/// Purpose: Validate the complete pipeline from raw GeoJSON text to a
/// canonical station collection
/// Benefit: Ensures the decode, validate, aggregate and assemble stages
/// compose correctly on representative data
#[test]
fn test_ingest_reference_collection() {
    init_tracing();
    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&reference_collection())
        .expect("reference collection should parse");

    assert_eq!(collection.len(), 3);
    assert!(report.is_clean(), "unexpected defects: {:?}", report.defects);
    assert_eq!(report.total_input, 3);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.rejected, 0);

    // Input order is preserved
    let ids: Vec<&str> = collection.ids().collect();
    assert_eq!(ids, vec!["PR.BY02", "OK.BY01", "TE.BY03"]);
}

/// Test canonical normalization of values across source units
///
/// Purpose: Validate unit conversion to %g, cm/s and s during aggregation
/// Benefit: Ensures downstream consumers can compare values across
/// networks without re-deriving conversions
#[test]
fn test_canonical_normalization() {
    init_tracing();
    let builder = CollectionBuilder::new();
    let (collection, _) = builder
        .build_from_json(&reference_collection())
        .expect("reference collection should parse");

    // 0.5 g -> 50 %g
    let pga = collection
        .measurement(
            "OK.BY01",
            Convention::GreaterOfTwoHorizontals,
            MeasureType::Pga,
            None,
        )
        .expect("OK.BY01 PGA present");
    assert_eq!(pga.value, 0.5);
    assert_eq!(pga.units, "g");
    assert_eq!(pga.canonical_value, Some(50.0));
    assert_eq!(pga.canonical_units.as_deref(), Some("%g"));

    // 0.04 m/s -> 4 cm/s
    let pgv = collection
        .measurement(
            "OK.BY01",
            Convention::GreaterOfTwoHorizontals,
            MeasureType::Pgv,
            None,
        )
        .expect("OK.BY01 PGV present");
    assert_eq!(pgv.canonical_value, Some(4.0));
    assert_eq!(pgv.canonical_units.as_deref(), Some("cm/s"));

    // Already-canonical values pass through unchanged
    let duration = collection
        .measurement(
            "TE.BY03",
            Convention::GreaterOfTwoHorizontals,
            MeasureType::Duration,
            None,
        )
        .expect("TE.BY03 DURATION present");
    assert_eq!(duration.canonical_value, Some(10.0));
    assert_eq!(duration.interval.as_deref(), Some("5-95"));

    // Spectral lookup by period
    let sa = collection
        .measurement("PR.BY02", Convention::RotD50, MeasureType::Sa, Some(1.0))
        .expect("PR.BY02 SA(1.0) present");
    assert_eq!(sa.canonical_value, Some(0.8));
}

/// Test that one malformed record never poisons the rest of the batch
///
/// Purpose: Validate record-level rejection with batch continuation
/// Benefit: Ensures a single bad submission from one network cannot block
/// ingestion of every other station in the payload
#[test]
fn test_malformed_record_is_isolated() {
    init_tracing();
    let mut envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    // Strip the station name from the second feature
    envelope["features"][1]["properties"]
        .as_object_mut()
        .expect("properties object")
        .remove("name");

    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&envelope.to_string())
        .expect("envelope still parses");

    assert_eq!(collection.len(), 2);
    assert!(!collection.contains("OK.BY01"));
    assert!(collection.contains("PR.BY02"));
    assert!(collection.contains("TE.BY03"));
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 1);

    let defects = report.defects_of_kind(DefectKind::MissingRequiredField);
    assert_eq!(defects.len(), 1);
    assert_eq!(defects[0].station_id.as_deref(), Some("OK.BY01"));
    assert_eq!(defects[0].severity, Severity::Structural);
}

/// Test rejection of unsupported component conventions
///
/// Purpose: Validate that ROTD100 and other unknown conventions produce
/// an UnknownComponentConvention defect
/// Benefit: Keeps the component vocabulary closed so consumers never see
/// conventions the model does not define
#[test]
fn test_unknown_convention_rejected() {
    init_tracing();
    let mut envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    envelope["features"][0]["properties"]["components"] = json!({
        "ROTD100": {
            "SA": [{"value": 1.0, "units": "%g", "flag": 0, "period": 0.3}]
        }
    });

    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&envelope.to_string())
        .expect("envelope still parses");

    assert_eq!(collection.len(), 2);
    assert!(!collection.contains("PR.BY02"));
    let defects = report.defects_of_kind(DefectKind::UnknownComponentConvention);
    assert_eq!(defects.len(), 1);
    assert_eq!(defects[0].station_id.as_deref(), Some("PR.BY02"));
}

/// Test duplicate station identifier handling across a batch
///
/// Purpose: Validate first-occurrence-wins de-duplication with reporting
/// Benefit: Ensures replayed or doubly-submitted records cannot silently
/// overwrite accepted data
#[test]
fn test_duplicate_station_first_occurrence_wins() {
    init_tracing();
    let mut envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    let mut duplicate = envelope["features"][0].clone();
    duplicate["properties"]["name"] = json!("Bayamon 02 (resubmitted)");
    envelope["features"]
        .as_array_mut()
        .expect("features array")
        .push(duplicate);

    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&envelope.to_string())
        .expect("envelope still parses");

    assert_eq!(collection.len(), 3);
    assert_eq!(report.total_input, 4);
    assert_eq!(report.accepted, 3);
    assert_eq!(report.rejected, 1);
    assert_eq!(
        collection.get("PR.BY02").expect("original kept").name,
        "Bayamon 02"
    );

    let duplicates = report.defects_of_kind(DefectKind::DuplicateStation);
    assert_eq!(duplicates.len(), 1);
    assert_eq!(duplicates[0].station_id.as_deref(), Some("PR.BY02"));
}

/// Test that warning-level defects keep the record in the collection
///
/// Purpose: Validate the severity split between structural rejection and
/// flagged-but-retained aggregation issues
/// Benefit: Preserves raw channel evidence even when individual amplitude
/// names are unrecognized
#[test]
fn test_warning_defects_retain_record() {
    init_tracing();
    let mut envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    envelope["features"][0]["properties"]["channels"] = json!([
        {
            "name": "HNZ",
            "amplitudes": [
                {"name": "mystery_measure", "value": 1.0, "units": "%g", "flag": 0}
            ]
        }
    ]);

    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&envelope.to_string())
        .expect("envelope still parses");

    // Record kept; amplitude preserved; warning recorded
    assert_eq!(collection.len(), 3);
    let station = collection.get("PR.BY02").expect("station retained");
    assert_eq!(station.channels[0].amplitudes[0].name, "mystery_measure");

    let warnings = report.defects_of_kind(DefectKind::UnrecognizedAmplitudeName);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].severity, Severity::Warning);
    assert_eq!(report.rejected, 0);
}

/// Test that ingestion output is deterministic across runs and across
/// serial and parallel execution
///
/// Purpose: Validate bit-identical output regardless of worker count
/// Benefit: Makes ingestion results reproducible and diffable between
/// environments
#[tokio::test]
async fn test_deterministic_and_parallel_consistent() {
    init_tracing();
    let envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    let features = envelope["features"]
        .as_array()
        .expect("features array")
        .clone();

    let serial_builder = CollectionBuilder::new();
    let (first, first_report) = serial_builder.build(&features);
    let (second, second_report) = serial_builder.build(&features);
    assert_eq!(first, second);
    assert_eq!(first_report, second_report);

    for workers in [1, 3, 16] {
        let builder = CollectionBuilder::new()
            .with_config(Config {
                parallel_workers: workers,
                log_rejections: false,
            })
            .expect("config is valid");
        let (parallel, parallel_report) = builder.build_parallel(features.clone()).await;
        assert_eq!(first, parallel, "diverged at {} workers", workers);
        assert_eq!(first_report, parallel_report);
        assert_eq!(
            serde_json::to_string(&first.to_geojson()).expect("serializes"),
            serde_json::to_string(&parallel.to_geojson()).expect("serializes"),
        );
    }
}

/// Test GeoJSON export round-trips through ingestion unchanged
///
/// Purpose: Validate that exporting an ingested collection and ingesting
/// the export yields the same collection
/// Benefit: Guarantees the export format is a faithful, re-ingestable
/// representation of the model
#[test]
fn test_geojson_round_trip() {
    init_tracing();
    let builder = CollectionBuilder::new();
    let (collection, _) = builder
        .build_from_json(&reference_collection())
        .expect("reference collection should parse");

    let exported = serde_json::to_string(&collection.to_geojson()).expect("serializes");
    let (re_ingested, report) = builder
        .build_from_json(&exported)
        .expect("export is a valid collection");

    assert!(report.is_clean(), "round trip defects: {:?}", report.defects);
    assert_eq!(collection, re_ingested);
}

/// Test flagged measurements survive ingestion with their source coding
///
/// Purpose: Validate that nonzero quality flags are preserved opaquely
/// Benefit: Lets consumers apply their own flag policies without the
/// ingester discarding or reinterpreting network-specific codes
#[test]
fn test_flags_preserved_opaquely() {
    init_tracing();
    let mut envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    envelope["features"][2]["properties"]["components"]["GREATER_OF_TWO_HORIZONTALS"]["DURATION"]
        ["flag"] = json!("5");

    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&envelope.to_string())
        .expect("envelope still parses");

    assert!(report.is_clean());
    let duration = collection
        .measurement(
            "TE.BY03",
            Convention::GreaterOfTwoHorizontals,
            MeasureType::Duration,
            None,
        )
        .expect("TE.BY03 DURATION present");
    assert_eq!(duration.flag.as_deref(), Some("5"));
    assert!(duration.is_flagged());
    // Flagged values are still normalized
    assert_eq!(duration.canonical_value, Some(10.0));
}

/// Test that network letter flag codings survive ingestion untouched
///
/// Purpose: Validate that non-numeric codings (e.g. "T") are carried
/// verbatim and mark the measurement as flagged
/// Benefit: Prevents a coding outside the numeric convention from being
/// collapsed onto the usable value and inverting the quality status
#[test]
fn test_letter_flag_coding_not_reinterpreted() {
    init_tracing();
    let mut envelope: serde_json::Value =
        serde_json::from_str(&reference_collection()).expect("fixture is valid JSON");
    envelope["features"][2]["properties"]["components"]["GREATER_OF_TWO_HORIZONTALS"]["DURATION"]
        ["flag"] = json!("T");

    let builder = CollectionBuilder::new();
    let (collection, report) = builder
        .build_from_json(&envelope.to_string())
        .expect("envelope still parses");

    assert!(report.is_clean());
    let duration = collection
        .measurement(
            "TE.BY03",
            Convention::GreaterOfTwoHorizontals,
            MeasureType::Duration,
            None,
        )
        .expect("TE.BY03 DURATION present");
    assert_eq!(duration.flag.as_deref(), Some("T"));
    assert!(duration.is_flagged());

    // The coding keeps its wire form on export
    let exported = collection.get("TE.BY03").expect("station present").to_feature();
    assert_eq!(
        exported["properties"]["components"]["GREATER_OF_TWO_HORIZONTALS"]["DURATION"]["flag"],
        "T"
    );
}
