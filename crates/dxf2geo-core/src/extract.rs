//! Extraction orchestrator: drawing in, one vector file per geometry type out.
//!
//! A run validates the input, prepares the output directory, then asks the
//! [`Translator`] for each requested geometry type in turn, or once for every
//! feature when flattening. A failing type is logged and skipped; only an
//! unusable input or output directory aborts the run. The run log is written as
//! the run progresses.
//!
//! When feature filters are configured, each written file is read back and
//! rejected features are deleted from it before it is counted.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::drivers::OutputFormat;
use crate::error::{ConfigError, Dxf2GeoError, InputError, Result, TranslationError};
use crate::filters::{FeatureFilter, FeatureFilterOptions};
use crate::geometry_type::GeometryType;
use crate::partition::{
    Partition, PartitionPlan, check_input_outside, create_partition_dir, prepare_output_dir,
    remove_dir,
};
use crate::run_log::{ExtractStatus, GeometryOutcome, LogEntry, RunLog};
use crate::translator::{Ogr2Ogr, TranslationRequest, Translator};

fn default_geometry_types() -> Vec<GeometryType> {
    GeometryType::DEFAULT.to_vec()
}

/// Options for one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Types to extract, in order; duplicates are ignored
    #[serde(default = "default_geometry_types")]
    pub geometry_types: Vec<GeometryType>,
    pub format: OutputFormat,
    /// Replace a non-empty output directory instead of refusing it
    pub overwrite: bool,
    /// Fail the run if any type fails or writes no features
    pub strict: bool,
    /// Keep the subdirectory of a type that wrote no features
    pub keep_empty: bool,
    /// Write every feature to one `all_geometries` layer instead of one file
    /// per type. GeoPackage only; `geometry_types` is ignored.
    pub flatten: bool,
    /// Features failing these rules are removed from the written files
    pub filters: Option<FeatureFilterOptions>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            geometry_types: default_geometry_types(),
            format: OutputFormat::default(),
            overwrite: false,
            strict: false,
            keep_empty: false,
            flatten: false,
            filters: None,
        }
    }
}

impl ExtractOptions {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if no geometry type is requested,
    /// if flattening is asked of the Shapefile format, or if the filters are
    /// invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.flatten {
            if self.format == OutputFormat::Shapefile {
                return Err(ConfigError::InvalidOption {
                    option: "flatten".to_string(),
                    message: "a flattened Shapefile is not supported; use GPKG or disable flatten"
                        .to_string(),
                });
            }
        } else if self.geometry_types.is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "geometry_types".to_string(),
                message: "at least one geometry type is required".to_string(),
            });
        }
        match &self.filters {
            Some(filters) => filters.validate(),
            None => Ok(()),
        }
    }
}

/// In-memory summary of a run. `export.log` remains the authoritative record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub log_path: PathBuf,
    pub format: OutputFormat,
    /// One entry per requested type, in request order
    pub outcomes: Vec<GeometryOutcome>,
}

impl ExtractionSummary {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    #[must_use]
    pub fn total_features(&self) -> usize {
        self.outcomes.iter().map(|o| o.feature_count).sum()
    }

    /// Feature count of a successfully extracted type.
    #[must_use]
    pub fn count(&self, geometry_type: GeometryType) -> Option<usize> {
        self.outcomes
            .iter()
            .find(|o| o.geometry_type == geometry_type && o.is_success())
            .map(|o| o.feature_count)
    }

    /// Number of types that failed or wrote no features.
    #[must_use]
    pub fn incomplete(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success() || o.feature_count == 0)
            .count()
    }
}

/// Drives a [`Translator`] over every requested geometry type.
pub struct Extractor<T: Translator> {
    translator: T,
    options: ExtractOptions,
    filter: Option<FeatureFilter>,
}

impl<T: Translator> Extractor<T> {
    #[must_use]
    pub fn new(translator: T, options: ExtractOptions) -> Self {
        let filter = options.filters.clone().map(FeatureFilter::new);
        Self {
            translator,
            options,
            filter,
        }
    }

    #[must_use]
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Runs the extraction.
    ///
    /// # Errors
    ///
    /// - [`InputError`] if the input is missing or the translator cannot read it
    /// - [`crate::error::OutputError`] if the output directory is refused, holds
    ///   the input, or is unwritable
    /// - [`Dxf2GeoError::IncompleteExtraction`] in strict mode, after the log is complete
    pub fn run(&self, input: &Path, output_dir: &Path) -> Result<ExtractionSummary> {
        self.options.validate()?;
        check_input(input)?;
        self.translator.check_readable(input)?;

        check_input_outside(input, output_dir)?;
        prepare_output_dir(output_dir, self.options.overwrite)?;
        let plan = if self.options.flatten {
            PartitionPlan::flattened(output_dir, self.options.format)
        } else {
            PartitionPlan::new(output_dir, &self.options.geometry_types, self.options.format)
        };
        let mut log = RunLog::create(&plan.log_path)?;

        info!(
            "Extracting {} partition(s) from {} to {}",
            plan.partitions.len(),
            input.display(),
            output_dir.display()
        );
        log.append(&LogEntry::Start {
            timestamp: Utc::now(),
            input: input.to_path_buf(),
            format: self.options.format,
            geometry_types: plan.geometry_types(),
            flatten: self.options.flatten,
            translator: self.translator.name(),
        })?;

        let mut outcomes = Vec::with_capacity(plan.partitions.len());
        for partition in &plan.partitions {
            let outcome = self.extract_one(input, partition);
            log.append(&LogEntry::Geometry {
                timestamp: Utc::now(),
                outcome: outcome.clone(),
            })?;
            outcomes.push(outcome);
        }

        let summary = ExtractionSummary {
            input: input.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            log_path: plan.log_path.clone(),
            format: self.options.format,
            outcomes,
        };
        log.append(&LogEntry::Finish {
            timestamp: Utc::now(),
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            total_features: summary.total_features(),
        })?;
        info!(
            "Extraction finished: {} succeeded, {} failed, {} feature(s)",
            summary.succeeded(),
            summary.failed(),
            summary.total_features()
        );

        if self.options.strict && summary.incomplete() > 0 {
            return Err(Dxf2GeoError::IncompleteExtraction {
                failed: summary.incomplete(),
                requested: summary.outcomes.len(),
                log_path: summary.log_path,
            });
        }
        Ok(summary)
    }

    /// Translates one partition. Any failure, including one on the partition's
    /// own directory, becomes a failed outcome.
    fn extract_one(&self, input: &Path, partition: &Partition) -> GeometryOutcome {
        let ty = partition.geometry_type;
        let started = Instant::now();
        let result = self.write_partition(input, partition);
        let elapsed_ms = elapsed_ms(started.elapsed());

        match result {
            Ok((count, output)) => {
                info!("{ty}: {count} feature(s)");
                GeometryOutcome {
                    geometry_type: ty,
                    status: ExtractStatus::Succeeded,
                    feature_count: count,
                    output,
                    error: None,
                    elapsed_ms,
                }
            },
            Err(err) => {
                warn!("{ty}: {err}");
                GeometryOutcome {
                    geometry_type: ty,
                    status: ExtractStatus::Failed,
                    feature_count: 0,
                    output: None,
                    error: Some(err.to_string()),
                    elapsed_ms,
                }
            },
        }
    }

    /// Returns the feature count and the output file, if it was kept.
    fn write_partition(
        &self,
        input: &Path,
        partition: &Partition,
    ) -> Result<(usize, Option<PathBuf>)> {
        create_partition_dir(partition)?;

        match self.translate_and_count(input, partition) {
            Ok(count) => {
                let keep = count > 0 || self.options.keep_empty;
                if !keep {
                    remove_dir(&partition.dir)?;
                }
                Ok((count, keep.then(|| partition.output.clone())))
            },
            Err(err) => {
                if let Err(cleanup) = remove_dir(&partition.dir) {
                    warn!("{}: {cleanup}", partition.geometry_type);
                }
                Err(err.into())
            },
        }
    }

    fn translate_and_count(
        &self,
        input: &Path,
        partition: &Partition,
    ) -> std::result::Result<usize, TranslationError> {
        let ty = partition.geometry_type;
        self.translator.translate(&TranslationRequest {
            input,
            output: &partition.output,
            geometry_type: ty,
            format: self.options.format,
        })?;

        if !partition.output.is_file() {
            return Err(TranslationError::MissingOutput {
                geometry_type: ty,
                path: partition.output.clone(),
            });
        }
        match &self.filter {
            Some(filter) => self.filter_output(filter, partition),
            None => self
                .options
                .format
                .reader()
                .count_features(&partition.output)
                .map_err(|source| TranslationError::Unreadable {
                    geometry_type: ty,
                    path: partition.output.clone(),
                    source,
                }),
        }
    }

    /// Deletes the features `filter` rejects from the partition's file and
    /// returns how many remain.
    fn filter_output(
        &self,
        filter: &FeatureFilter,
        partition: &Partition,
    ) -> std::result::Result<usize, TranslationError> {
        let ty = partition.geometry_type;
        let path = &partition.output;
        let layers = self
            .options
            .format
            .reader()
            .read_layers(path)
            .map_err(|source| TranslationError::Unreadable {
                geometry_type: ty,
                path: path.clone(),
                source,
            })?;

        let verdicts: BTreeMap<&str, Vec<bool>> = layers
            .iter()
            .map(|layer| {
                let keep = layer
                    .records
                    .iter()
                    .map(|feature| filter.allows(feature.geometry.as_ref(), &feature.properties))
                    .collect();
                (layer.name.as_str(), keep)
            })
            .collect();
        let total: usize = layers.iter().map(|layer| layer.len()).sum();
        let kept = verdicts.values().flatten().filter(|keep| **keep).count();

        if kept < total {
            let removed = self
                .options
                .format
                .retainer()
                .retain_features(path, &mut |layer, index| {
                    verdicts
                        .get(layer)
                        .and_then(|keep| keep.get(index))
                        .copied()
                        .unwrap_or(true)
                })
                .map_err(|source| TranslationError::Filter {
                    geometry_type: ty,
                    path: path.clone(),
                    source,
                })?;
            debug!("{ty}: filters removed {removed} of {total} feature(s)");
        }
        Ok(kept)
    }
}

fn elapsed_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

fn check_input(input: &Path) -> std::result::Result<(), InputError> {
    if !input.exists() {
        return Err(InputError::NotFound {
            path: input.to_path_buf(),
        });
    }
    if !input.is_file() {
        return Err(InputError::NotAFile {
            path: input.to_path_buf(),
        });
    }
    Ok(())
}

/// Extracts every requested geometry type from `input` into `output_dir` with `ogr2ogr`.
///
/// # Errors
///
/// See [`Extractor::run`].
pub fn extract_geometries(
    input: &Path,
    output_dir: &Path,
    options: &ExtractOptions,
) -> Result<ExtractionSummary> {
    Extractor::new(Ogr2Ogr::default(), options.clone()).run(input, output_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OutputError;
    use crate::geometry_type::TypeSelection;
    use geo_types::{Geometry, LineString, Point};
    use serde_json::json;
    use std::cell::RefCell;
    use tempfile::TempDir;
    use vector_gpkg::testing::write_layer;

    /// Writes canned GeoPackage outputs, failing the types it is told to fail.
    #[derive(Default)]
    struct MockTranslator {
        features: BTreeMap<GeometryType, Vec<Geometry<f64>>>,
        fail: Vec<GeometryType>,
        unreadable_input: bool,
        /// Plain file created on the first translation
        clobber: Option<PathBuf>,
        calls: RefCell<Vec<TypeSelection>>,
    }

    impl MockTranslator {
        fn features_for(&self, selection: TypeSelection) -> Vec<Geometry<f64>> {
            match selection.single() {
                Some(ty) => self.features.get(&ty).cloned().unwrap_or_default(),
                None => self.features.values().flatten().cloned().collect(),
            }
        }
    }

    impl Translator for MockTranslator {
        fn name(&self) -> String {
            "mock".to_string()
        }

        fn check_readable(&self, input: &Path) -> std::result::Result<(), InputError> {
            if self.unreadable_input {
                return Err(InputError::Unreadable {
                    path: input.to_path_buf(),
                    detail: "not a DXF".to_string(),
                });
            }
            Ok(())
        }

        fn translate(
            &self,
            request: &TranslationRequest<'_>,
        ) -> std::result::Result<(), TranslationError> {
            self.calls.borrow_mut().push(request.geometry_type);
            if let Some(path) = self.clobber.as_ref().filter(|path| !path.exists()) {
                std::fs::write(path, b"in the way").unwrap();
            }
            if self.fail.iter().any(|ty| request.geometry_type == *ty) {
                std::fs::write(request.output, b"partial").unwrap();
                return Err(TranslationError::Failed {
                    geometry_type: request.geometry_type,
                    status: Some(1),
                    stderr: "ERROR 1: mock failure".to_string(),
                });
            }
            let features: Vec<_> = self
                .features_for(request.geometry_type)
                .into_iter()
                .map(|g| (Some(g), json!({"Layer": "0"}).as_object().cloned().unwrap()))
                .collect();
            write_layer(request.output, request.geometry_type.dir_name(), &features).unwrap();
            Ok(())
        }
    }

    fn input_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("plan.dxf");
        std::fs::write(&path, "0\nEOF\n").unwrap();
        path
    }

    fn gpkg_options(types: &[GeometryType]) -> ExtractOptions {
        ExtractOptions {
            geometry_types: types.to_vec(),
            format: OutputFormat::GeoPackage,
            ..ExtractOptions::default()
        }
    }

    fn line() -> Geometry<f64> {
        horizontal(10.0)
    }

    fn horizontal(length: f64) -> Geometry<f64> {
        Geometry::LineString(LineString::from(vec![(0.0, 0.0), (length, 0.0)]))
    }

    #[test]
    fn test_point_fails_line_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [(GeometryType::LineString, vec![line(), line()])].into(),
            fail: vec![GeometryType::Point],
            ..MockTranslator::default()
        };

        let summary = Extractor::new(
            translator,
            gpkg_options(&[GeometryType::Point, GeometryType::LineString]),
        )
        .run(&input, &out)
        .unwrap();

        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.failed(), 1);
        assert_eq!(summary.count(GeometryType::LineString), Some(2));
        assert_eq!(summary.count(GeometryType::Point), None);

        let outcomes = RunLog::read_outcomes(&summary.log_path).unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].geometry_type, GeometryType::Point);
        assert_eq!(outcomes[0].status, ExtractStatus::Failed);
        assert!(outcomes[0].error.as_deref().unwrap().contains("mock failure"));
        assert_eq!(outcomes[1].status, ExtractStatus::Succeeded);
        assert_eq!(outcomes[1].feature_count, 2);

        assert!(!out.join("point").exists());
        assert!(out.join("linestring/linestring.gpkg").is_file());
    }

    #[test]
    fn test_every_requested_type_is_logged() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [
                (GeometryType::Point, vec![Geometry::Point(Point::new(1.0, 2.0))]),
                (GeometryType::LineString, vec![line()]),
            ]
            .into(),
            fail: vec![GeometryType::MultiPolygon],
            ..MockTranslator::default()
        };

        let summary = Extractor::new(translator, gpkg_options(&GeometryType::DEFAULT))
            .run(&input, &out)
            .unwrap();

        let logged: Vec<GeometryType> = RunLog::read_outcomes(&summary.log_path)
            .unwrap()
            .into_iter()
            .filter_map(|o| o.geometry_type.single())
            .collect();
        assert_eq!(logged, GeometryType::DEFAULT.to_vec());

        let entries = RunLog::read(&summary.log_path).unwrap();
        assert!(matches!(
            entries.first(),
            Some(LogEntry::Start { flatten: false, .. })
        ));
        assert!(matches!(
            entries.last(),
            Some(LogEntry::Finish {
                succeeded: 4,
                failed: 1,
                total_features: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_partition_dir_error_fails_only_that_type() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [(GeometryType::LineString, vec![line()])].into(),
            clobber: Some(out.join("point")),
            ..MockTranslator::default()
        };

        let summary = Extractor::new(
            translator,
            gpkg_options(&[GeometryType::LineString, GeometryType::Point]),
        )
        .run(&input, &out)
        .unwrap();

        assert_eq!(summary.count(GeometryType::LineString), Some(1));
        assert_eq!(summary.outcomes[1].status, ExtractStatus::Failed);
        assert!(summary.outcomes[1].error.as_deref().unwrap().contains("point"));

        let entries = RunLog::read(&summary.log_path).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(matches!(
            entries.last(),
            Some(LogEntry::Finish {
                succeeded: 1,
                failed: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_empty_types_are_removed_unless_kept() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);

        let out = temp_dir.path().join("dropped");
        let summary = Extractor::new(
            MockTranslator::default(),
            gpkg_options(&[GeometryType::Polygon]),
        )
        .run(&input, &out)
        .unwrap();
        assert_eq!(summary.count(GeometryType::Polygon), Some(0));
        assert_eq!(summary.outcomes[0].output, None);
        assert!(!out.join("polygon").exists());

        let out = temp_dir.path().join("kept");
        let options = ExtractOptions {
            keep_empty: true,
            ..gpkg_options(&[GeometryType::Polygon])
        };
        let summary = Extractor::new(MockTranslator::default(), options)
            .run(&input, &out)
            .unwrap();
        assert!(out.join("polygon/polygon.gpkg").is_file());
        assert!(summary.outcomes[0].output.is_some());
    }

    #[test]
    fn test_filters_apply_to_written_files() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [(
                GeometryType::LineString,
                vec![horizontal(10.0), horizontal(4.0), horizontal(12.0)],
            )]
            .into(),
            ..MockTranslator::default()
        };
        let options = ExtractOptions {
            filters: Some(FeatureFilterOptions {
                min_length: Some(10.0),
                ..FeatureFilterOptions::default()
            }),
            ..gpkg_options(&[GeometryType::LineString])
        };

        let summary = Extractor::new(translator, options).run(&input, &out).unwrap();
        assert_eq!(summary.count(GeometryType::LineString), Some(2));

        let path = out.join("linestring/linestring.gpkg");
        let written = OutputFormat::GeoPackage.reader().count_features(&path).unwrap();
        assert_eq!(written, 2);
        let outcomes = RunLog::read_outcomes(&summary.log_path).unwrap();
        assert_eq!(outcomes[0].feature_count, 2);
    }

    #[test]
    fn test_filtered_out_type_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [(GeometryType::LineString, vec![horizontal(1.0)])].into(),
            ..MockTranslator::default()
        };
        let options = ExtractOptions {
            filters: Some(FeatureFilterOptions {
                exclude_layers: vec!["0".to_string()],
                ..FeatureFilterOptions::default()
            }),
            ..gpkg_options(&[GeometryType::LineString])
        };

        let summary = Extractor::new(translator, options).run(&input, &out).unwrap();
        assert_eq!(summary.count(GeometryType::LineString), Some(0));
        assert!(!out.join("linestring").exists());
    }

    #[test]
    fn test_flatten_writes_one_layer() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [
                (GeometryType::Point, vec![Geometry::Point(Point::new(1.0, 2.0))]),
                (GeometryType::LineString, vec![line()]),
            ]
            .into(),
            ..MockTranslator::default()
        };
        let options = ExtractOptions {
            flatten: true,
            ..gpkg_options(&GeometryType::DEFAULT)
        };

        let extractor = Extractor::new(translator, options);
        let summary = extractor.run(&input, &out).unwrap();
        assert_eq!(*extractor.translator.calls.borrow(), vec![TypeSelection::All]);
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(summary.total_features(), 2);
        assert!(out.join("all_geometries/all_geometries.gpkg").is_file());

        let outcomes = RunLog::read_outcomes(&summary.log_path).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].geometry_type.as_str(), "ALL");
        let entries = RunLog::read(&summary.log_path).unwrap();
        assert!(matches!(
            &entries[0],
            LogEntry::Start { flatten: true, geometry_types, .. } if geometry_types.is_empty()
        ));
    }

    #[test]
    fn test_flattened_shapefile_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let options = ExtractOptions {
            flatten: true,
            format: OutputFormat::Shapefile,
            ..ExtractOptions::default()
        };
        let err = Extractor::new(MockTranslator::default(), options)
            .run(&input, &out)
            .unwrap_err();
        assert!(matches!(err, Dxf2GeoError::Config(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_strict_mode_reports_incomplete_run() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = MockTranslator {
            features: [(GeometryType::LineString, vec![line()])].into(),
            fail: vec![GeometryType::Point],
            ..MockTranslator::default()
        };
        let options = ExtractOptions {
            strict: true,
            ..gpkg_options(&[GeometryType::Point, GeometryType::LineString])
        };

        let err = Extractor::new(translator, options)
            .run(&input, &out)
            .unwrap_err();
        assert!(matches!(
            err,
            Dxf2GeoError::IncompleteExtraction {
                failed: 1,
                requested: 2,
                ..
            }
        ));
        // The log is still complete.
        assert_eq!(RunLog::read_outcomes(&out.join("export.log")).unwrap().len(), 2);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        let err = Extractor::new(MockTranslator::default(), ExtractOptions::default())
            .run(&temp_dir.path().join("absent.dxf"), &out)
            .unwrap_err();
        assert!(matches!(err, Dxf2GeoError::Input(InputError::NotFound { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn test_unreadable_input_is_fatal_and_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("previous.txt"), "keep me").unwrap();

        let translator = MockTranslator {
            unreadable_input: true,
            ..MockTranslator::default()
        };
        let options = ExtractOptions {
            overwrite: true,
            ..ExtractOptions::default()
        };
        let err = Extractor::new(translator, options)
            .run(&input, &out)
            .unwrap_err();
        assert!(matches!(err, Dxf2GeoError::Input(InputError::Unreadable { .. })));
        assert!(out.join("previous.txt").exists());
    }

    #[test]
    fn test_overwrite_never_deletes_input_inside_output() {
        let temp_dir = TempDir::new().unwrap();
        let out = temp_dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let input = out.join("plan.dxf");
        std::fs::write(&input, "0\nEOF\n").unwrap();

        let options = ExtractOptions {
            overwrite: true,
            ..gpkg_options(&[GeometryType::Point])
        };
        let err = Extractor::new(MockTranslator::default(), options)
            .run(&input, &out)
            .unwrap_err();
        assert!(matches!(
            err,
            Dxf2GeoError::Output(OutputError::InputInsideOutput { .. })
        ));
        assert!(input.is_file());
    }

    #[test]
    fn test_rerun_refuses_then_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let translator = || MockTranslator {
            features: [(GeometryType::LineString, vec![line()])].into(),
            ..MockTranslator::default()
        };
        let options = gpkg_options(&[GeometryType::LineString]);

        Extractor::new(translator(), options.clone())
            .run(&input, &out)
            .unwrap();
        let err = Extractor::new(translator(), options.clone())
            .run(&input, &out)
            .unwrap_err();
        assert!(matches!(
            err,
            Dxf2GeoError::Output(OutputError::DirectoryNotEmpty { .. })
        ));

        let options = ExtractOptions {
            overwrite: true,
            ..options
        };
        let summary = Extractor::new(translator(), options).run(&input, &out).unwrap();
        assert_eq!(summary.count(GeometryType::LineString), Some(1));
    }

    #[test]
    fn test_duplicate_types_are_translated_once() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let out = temp_dir.path().join("out");
        let extractor = Extractor::new(
            MockTranslator::default(),
            gpkg_options(&[GeometryType::Point, GeometryType::Point]),
        );
        let summary = extractor.run(&input, &out).unwrap();
        assert_eq!(summary.outcomes.len(), 1);
        assert_eq!(
            *extractor.translator.calls.borrow(),
            vec![TypeSelection::Only(GeometryType::Point)]
        );
    }

    #[test]
    fn test_no_types_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = input_file(&temp_dir);
        let err = Extractor::new(MockTranslator::default(), gpkg_options(&[]))
            .run(&input, &temp_dir.path().join("out"))
            .unwrap_err();
        assert!(matches!(err, Dxf2GeoError::Config(_)));
    }
}
