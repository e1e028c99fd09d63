//! Extraction, loading, filtering and plotting run end to end against a
//! translator that writes canned GeoPackage outputs.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dxf2geo_core::drivers::OutputFormat;
use dxf2geo_core::error::{InputError, TranslationError};
use dxf2geo_core::filters::{
    FeatureFilterOptions, LayerPattern, ModelspaceOptions, ShortLineOptions,
};
use dxf2geo_core::run_log::{ExtractStatus, RunLog};
use dxf2geo_core::translator::{TranslationRequest, Translator};
use dxf2geo_core::{
    ExtractOptions, Extractor, GeometryTable, GeometryType, PipelineConfig,
    filter_modelspace, filter_short_axis_aligned_lines, load_geometries, plot_geometries,
};
use geo_types::{Geometry, LineString, Point, Polygon};
use serde_json::{Value, json};
use tempfile::TempDir;
use vector_gpkg::testing::write_layer;

type Feature = (Option<Geometry<f64>>, serde_json::Map<String, Value>);

fn props(value: Value) -> serde_json::Map<String, Value> {
    value.as_object().cloned().unwrap()
}

/// Stands in for `ogr2ogr` on a small site plan drawing.
struct SitePlan {
    features: BTreeMap<GeometryType, Vec<Feature>>,
}

impl SitePlan {
    fn new() -> Self {
        let mut features = BTreeMap::new();
        features.insert(
            GeometryType::Point,
            vec![
                (
                    Some(Geometry::Point(Point::new(5.0, 5.0))),
                    props(json!({"Layer": "0", "PaperSpace": 0})),
                ),
                (
                    Some(Geometry::Point(Point::new(200.0, 5.0))),
                    props(json!({"Layer": "TITLEBLOCK", "PaperSpace": 1})),
                ),
            ],
        );
        features.insert(
            GeometryType::LineString,
            vec![
                (
                    Some(Geometry::LineString(LineString::from(vec![
                        (0.0, 0.0),
                        (50.0, 0.0),
                    ]))),
                    props(json!({"Layer": "WALLS", "PaperSpace": 0})),
                ),
                (
                    Some(Geometry::LineString(LineString::from(vec![
                        (10.0, 10.0),
                        (10.4, 10.0),
                    ]))),
                    props(json!({"Layer": "GRID", "PaperSpace": 0})),
                ),
                (
                    Some(Geometry::LineString(LineString::from(vec![
                        (20.0, 20.0),
                        (20.3, 20.4),
                    ]))),
                    props(json!({"Layer": "WALLS", "PaperSpace": 0})),
                ),
                (
                    Some(Geometry::LineString(LineString::from(vec![
                        (0.0, 0.0),
                        (0.0, 0.2),
                    ]))),
                    props(json!({"Layer": "VIEWPORT", "PaperSpace": 1})),
                ),
                (None, props(json!({"Layer": "WALLS"}))),
            ],
        );
        features.insert(
            GeometryType::Polygon,
            vec![(
                Some(Geometry::Polygon(Polygon::new(
                    LineString::from(vec![(0.0, 0.0), (30.0, 0.0), (30.0, 20.0), (0.0, 0.0)]),
                    vec![],
                ))),
                props(json!({"Layer": "ROOMS", "PaperSpace": 0, "Name": "Hall"})),
            )],
        );
        Self { features }
    }
}

impl Translator for SitePlan {
    fn name(&self) -> String {
        "site-plan".to_string()
    }

    fn check_readable(&self, input: &Path) -> Result<(), InputError> {
        if input.extension().is_some_and(|ext| ext == "dxf") {
            Ok(())
        } else {
            Err(InputError::Unreadable {
                path: input.to_path_buf(),
                detail: "unsupported drawing".to_string(),
            })
        }
    }

    fn translate(&self, request: &TranslationRequest<'_>) -> Result<(), TranslationError> {
        if request.geometry_type == GeometryType::MultiPolygon {
            return Err(TranslationError::Failed {
                geometry_type: request.geometry_type,
                status: Some(1),
                stderr: "ERROR 1: Attempt to write non-polygon geometry".to_string(),
            });
        }
        let features: Vec<Feature> = match request.geometry_type.single() {
            Some(ty) => self.features.get(&ty).cloned().unwrap_or_default(),
            None => self.features.values().flatten().cloned().collect(),
        };
        write_layer(request.output, "entities", &features).map_err(|e| {
            TranslationError::Failed {
                geometry_type: request.geometry_type,
                status: None,
                stderr: e.to_string(),
            }
        })
    }
}

fn drawing(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("site.dxf");
    fs::write(&path, "0\nSECTION\n0\nEOF\n").unwrap();
    path
}

fn extract(dir: &TempDir) -> PathBuf {
    let output = dir.path().join("out");
    let options = ExtractOptions {
        format: OutputFormat::GeoPackage,
        ..ExtractOptions::default()
    };
    Extractor::new(SitePlan::new(), options)
        .run(&drawing(dir), &output)
        .unwrap();
    output
}

fn modelspace() -> ModelspaceOptions {
    ModelspaceOptions::default()
}

fn short_lines() -> ShortLineOptions {
    ShortLineOptions::default()
}

fn layers(table: &GeometryTable) -> Vec<String> {
    table
        .iter()
        .map(|r| r.property("Layer").and_then(Value::as_str).unwrap().to_string())
        .collect()
}

#[test]
fn test_extract_writes_partitions_and_log() {
    let temp_dir = TempDir::new().unwrap();
    let output = extract(&temp_dir);

    assert!(output.join("point/point.gpkg").is_file());
    assert!(output.join("linestring/linestring.gpkg").is_file());
    assert!(output.join("polygon/polygon.gpkg").is_file());
    // No features and a failure: neither leaves a directory behind.
    assert!(!output.join("multilinestring").exists());
    assert!(!output.join("multipolygon").exists());

    let outcomes = RunLog::read_outcomes(&output.join("export.log")).unwrap();
    assert_eq!(outcomes.len(), GeometryType::DEFAULT.len());
    let failed: Vec<_> = outcomes
        .iter()
        .filter(|o| o.status == ExtractStatus::Failed)
        .filter_map(|o| o.geometry_type.single())
        .collect();
    assert_eq!(failed, vec![GeometryType::MultiPolygon]);
    let lines = outcomes
        .iter()
        .find(|o| o.geometry_type == GeometryType::LineString)
        .unwrap();
    assert_eq!(lines.feature_count, 5);
}

#[test]
fn test_extract_load_filter_plot() {
    let temp_dir = TempDir::new().unwrap();
    let output = extract(&temp_dir);

    let table = load_geometries(&output).unwrap();
    // The line without geometry is dropped on load.
    assert_eq!(table.len(), 7);
    assert_eq!(table.count_by_type()[&GeometryType::LineString], 4);

    let clean =
        filter_short_axis_aligned_lines(&filter_modelspace(&table, &modelspace()), &short_lines());
    // Outputs load in path order: linestring, point, polygon.
    assert_eq!(layers(&clean), vec!["WALLS", "WALLS", "0", "ROOMS"]);

    let map = temp_dir.path().join("map.html");
    let summary = plot_geometries(&clean, &map).unwrap();
    assert_eq!(summary.total(), 4);
    assert_eq!(summary.layers[&GeometryType::LineString], 2);

    let html = fs::read_to_string(&map).unwrap();
    assert!(html.contains("id=\"layer-polygon\""));
    assert!(html.contains("Name: Hall"));
    assert!(!html.contains("TITLEBLOCK"));
}

#[test]
fn test_flattened_filtered_extract_loads_by_own_type() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out");
    let options = ExtractOptions {
        format: OutputFormat::GeoPackage,
        flatten: true,
        filters: Some(FeatureFilterOptions {
            exclude_layer_patterns: vec!["^VIEW".parse::<LayerPattern>().unwrap()],
            ..FeatureFilterOptions::default()
        }),
        ..ExtractOptions::default()
    };
    let summary = Extractor::new(SitePlan::new(), options)
        .run(&drawing(&temp_dir), &output)
        .unwrap();

    // The viewport line and the line without geometry are filtered out.
    assert_eq!(summary.outcomes.len(), 1);
    assert_eq!(summary.total_features(), 6);
    assert!(output.join("all_geometries/all_geometries.gpkg").is_file());

    let table = load_geometries(&output).unwrap();
    assert_eq!(table.len(), 6);
    let counts = table.count_by_type();
    assert_eq!(counts[&GeometryType::Point], 2);
    assert_eq!(counts[&GeometryType::LineString], 3);
    assert_eq!(counts[&GeometryType::Polygon], 1);
    assert!(!layers(&table).contains(&"VIEWPORT".to_string()));
}

#[test]
fn test_filters_commute_and_are_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let table = load_geometries(&extract(&temp_dir)).unwrap();

    let ms = modelspace();
    let sl = short_lines();
    let a = filter_short_axis_aligned_lines(&filter_modelspace(&table, &ms), &sl);
    let b = filter_modelspace(&filter_short_axis_aligned_lines(&table, &sl), &ms);
    assert_eq!(a, b);

    assert_eq!(filter_modelspace(&a, &ms), a);
    assert_eq!(filter_short_axis_aligned_lines(&a, &sl), a);
}

#[test]
fn test_config_chain_matches_direct_calls() {
    let temp_dir = TempDir::new().unwrap();
    let table = load_geometries(&extract(&temp_dir)).unwrap();

    let config = PipelineConfig::parse(
        "[filters.modelspace]\n[filters.short_lines]\n",
        Path::new("dxf2geo.toml"),
    )
    .unwrap();
    let (chained, reports) = config.filters.chain().apply(&table);

    let direct =
        filter_short_axis_aligned_lines(&filter_modelspace(&table, &modelspace()), &short_lines());
    assert_eq!(chained, direct);
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].before, 7);
    assert_eq!(reports[0].after, 5);
    assert_eq!(reports[1].removed(), 1);
}

#[test]
fn test_unreadable_drawing_leaves_output_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("site.dwg");
    fs::write(&input, "binary").unwrap();
    let output = temp_dir.path().join("out");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("notes.txt"), "keep").unwrap();

    let options = ExtractOptions {
        overwrite: true,
        ..ExtractOptions::default()
    };
    let err = Extractor::new(SitePlan::new(), options)
        .run(&input, &output)
        .unwrap_err();
    assert!(err.to_string().contains("site.dwg"));
    assert!(output.join("notes.txt").is_file());
}

#[test]
fn test_empty_collection_plots() {
    let temp_dir = TempDir::new().unwrap();
    let output = extract(&temp_dir);
    let table = load_geometries(&output).unwrap();

    let none = filter_modelspace(
        &table,
        &ModelspaceOptions {
            layers: ["NO-SUCH-LAYER".to_string()].into_iter().collect(),
            ..ModelspaceOptions::default()
        },
    );
    assert!(none.is_empty());

    let map = temp_dir.path().join("empty.html");
    let summary = plot_geometries(&none, &map).unwrap();
    assert_eq!(summary.total(), 0);
    assert!(fs::read_to_string(&map).unwrap().contains("No features"));
}
