//! Cleanup filters applied to a loaded [`GeometryTable`].
//!
//! Every filter is a predicate over a single record, so filters never mutate
//! their input, keep record order, and compose in any order. [`FilterChain`]
//! runs several of them and reports how many records each one removed.
//!
//! # Examples
//!
//! ```
//! use dxf2geo_core::filters::{FilterChain, ModelspaceFilter, ShortLineFilter};
//! use dxf2geo_core::filters::{ModelspaceOptions, ShortLineOptions};
//! use dxf2geo_core::types::GeometryTable;
//!
//! let chain = FilterChain::new()
//!     .with(ModelspaceFilter::new(ModelspaceOptions::default()))
//!     .with(ShortLineFilter::new(ShortLineOptions::default()));
//!
//! let (cleaned, reports) = chain.apply(&GeometryTable::new());
//! assert!(cleaned.is_empty());
//! assert_eq!(reports.len(), 2);
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use dxf2geo_core_common::{JsonObject, JsonValue};
use geo::{Area, BoundingRect};
use geo_types::{Geometry, Line, LineString, Rect};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::geometry_type::GeometryType;
use crate::types::{GeometryRecord, GeometryTable, is_empty_geometry};

/// A pure, per-record predicate over a geometry table.
pub trait RecordFilter {
    /// Short name used in reports and logs.
    fn name(&self) -> &'static str;

    /// Returns `true` if the record survives this filter.
    fn keep(&self, record: &GeometryRecord) -> bool;

    /// Returns a new table with the surviving records, in order.
    fn apply(&self, table: &GeometryTable) -> GeometryTable {
        table.retain_cloned(|record| self.keep(record))
    }
}

/// Effect of one filter within a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterReport {
    pub name: &'static str,
    /// Records entering the filter
    pub before: usize,
    /// Records leaving the filter
    pub after: usize,
}

impl FilterReport {
    #[must_use]
    pub fn removed(&self) -> usize {
        self.before - self.after
    }
}

/// An ordered sequence of filters.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn RecordFilter>>,
}

impl FilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter to the chain.
    #[must_use]
    pub fn with(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Applies every filter in order, returning the final table and one report per filter.
    #[must_use]
    pub fn apply(&self, table: &GeometryTable) -> (GeometryTable, Vec<FilterReport>) {
        let mut current = table.clone();
        let mut reports = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            let before = current.len();
            current = filter.apply(&current);
            log::info!(
                "Filter {}: {before} -> {} record(s)",
                filter.name(),
                current.len()
            );
            reports.push(FilterReport {
                name: filter.name(),
                before,
                after: current.len(),
            });
        }
        (current, reports)
    }
}

fn default_layer_field() -> String {
    "Layer".to_string()
}

fn default_paperspace_field() -> Option<String> {
    Some("PaperSpace".to_string())
}

/// Options for [`ModelspaceFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelspaceOptions {
    /// Attribute holding the CAD layer name
    pub layer_field: String,
    /// Allowed layer names (exact match); empty accepts any named layer
    pub layers: BTreeSet<String>,
    /// Attribute flagging paperspace entities; `None` disables the check
    pub paperspace_field: Option<String>,
}

impl Default for ModelspaceOptions {
    fn default() -> Self {
        Self {
            layer_field: default_layer_field(),
            layers: BTreeSet::new(),
            paperspace_field: default_paperspace_field(),
        }
    }
}

impl ModelspaceOptions {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if a field name is blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.layer_field.trim().is_empty() {
            return Err(ConfigError::InvalidOption {
                option: "modelspace.layer_field".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self
            .paperspace_field
            .as_deref()
            .is_some_and(|field| field.trim().is_empty())
        {
            return Err(ConfigError::InvalidOption {
                option: "modelspace.paperspace_field".to_string(),
                message: "must not be empty (omit it to disable the check)".to_string(),
            });
        }
        Ok(())
    }
}

/// Interprets DXF-style flag values: non-zero numbers, `true`, `"1"` and `"true"`.
fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(flag) => *flag,
        JsonValue::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        JsonValue::String(s) => {
            let s = s.trim();
            s == "1" || s.eq_ignore_ascii_case("true")
        },
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => false,
    }
}

/// Keeps records that belong to modelspace.
///
/// A record survives when its paperspace flag is not set, it carries a
/// non-empty layer name, and that name is in the configured set (when one is
/// given). Records without a layer tag are dropped.
#[derive(Debug, Clone)]
pub struct ModelspaceFilter {
    options: ModelspaceOptions,
}

impl ModelspaceFilter {
    #[must_use]
    pub fn new(options: ModelspaceOptions) -> Self {
        Self { options }
    }
}

impl RecordFilter for ModelspaceFilter {
    fn name(&self) -> &'static str {
        "modelspace"
    }

    fn keep(&self, record: &GeometryRecord) -> bool {
        let in_paperspace = self
            .options
            .paperspace_field
            .as_deref()
            .and_then(|field| record.property(field))
            .is_some_and(is_truthy);
        if in_paperspace {
            return false;
        }

        match record.property(&self.options.layer_field) {
            Some(JsonValue::String(layer)) if !layer.is_empty() => {
                self.options.layers.is_empty() || self.options.layers.contains(layer)
            },
            _ => false,
        }
    }
}

/// Retains only modelspace records. See [`ModelspaceFilter`].
#[must_use]
pub fn filter_modelspace(table: &GeometryTable, options: &ModelspaceOptions) -> GeometryTable {
    ModelspaceFilter::new(options.clone()).apply(table)
}

/// Options for [`ShortLineFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortLineOptions {
    /// Lines strictly shorter than this are candidates for removal
    pub max_length: f64,
    /// Angular tolerance in degrees around horizontal and vertical
    pub angle_tolerance_deg: f64,
}

impl Default for ShortLineOptions {
    fn default() -> Self {
        Self {
            max_length: 1.0,
            angle_tolerance_deg: 1.0,
        }
    }
}

impl ShortLineOptions {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if `max_length` is negative or not
    /// finite, or the tolerance is outside `0..=45` degrees.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.max_length.is_finite() || self.max_length < 0.0 {
            return Err(ConfigError::InvalidOption {
                option: "short_lines.max_length".to_string(),
                message: format!("must be a finite value >= 0, got {}", self.max_length),
            });
        }
        if !(0.0..=45.0).contains(&self.angle_tolerance_deg) {
            return Err(ConfigError::InvalidOption {
                option: "short_lines.angle_tolerance_deg".to_string(),
                message: format!(
                    "must be between 0 and 45 degrees, got {}",
                    self.angle_tolerance_deg
                ),
            });
        }
        Ok(())
    }
}

/// Every segment of a line geometry; empty for other kinds.
fn segments(geometry: &Geometry<f64>) -> Vec<Line<f64>> {
    match geometry {
        Geometry::Line(line) => vec![*line],
        Geometry::LineString(line) => line.lines().collect(),
        Geometry::MultiLineString(lines) => lines.0.iter().flat_map(LineString::lines).collect(),
        _ => Vec::new(),
    }
}

/// Total Euclidean length of every segment of a (multi)line.
#[must_use]
pub fn line_length(geometry: &Geometry<f64>) -> f64 {
    segments(geometry)
        .into_iter()
        .map(|segment| segment.dx().hypot(segment.dy()))
        .sum()
}

/// `true` when every non-degenerate segment is within `tolerance_deg` of
/// horizontal, or every one is within it of vertical.
fn is_axis_aligned(geometry: &Geometry<f64>, tolerance_deg: f64) -> bool {
    let mut horizontal = true;
    let mut vertical = true;
    for segment in segments(geometry) {
        let (dx, dy) = (segment.dx().abs(), segment.dy().abs());
        if dx == 0.0 && dy == 0.0 {
            continue;
        }
        let angle = dy.atan2(dx).to_degrees();
        horizontal &= angle <= tolerance_deg;
        vertical &= angle >= 90.0 - tolerance_deg;
        if !horizontal && !vertical {
            return false;
        }
    }
    true
}

/// Drops short, axis-aligned lines (typical CAD grid and construction artefacts).
///
/// Only line types are considered; everything else passes through.
#[derive(Debug, Clone, Copy)]
pub struct ShortLineFilter {
    options: ShortLineOptions,
}

impl ShortLineFilter {
    #[must_use]
    pub fn new(options: ShortLineOptions) -> Self {
        Self { options }
    }
}

impl RecordFilter for ShortLineFilter {
    fn name(&self) -> &'static str {
        "short-axis-aligned-lines"
    }

    fn keep(&self, record: &GeometryRecord) -> bool {
        if !record.geometry_type.is_line() {
            return true;
        }
        let short = line_length(&record.geometry) < self.options.max_length;
        !(short && is_axis_aligned(&record.geometry, self.options.angle_tolerance_deg))
    }
}

/// Removes short axis-aligned lines. See [`ShortLineFilter`].
#[must_use]
pub fn filter_short_axis_aligned_lines(
    table: &GeometryTable,
    options: &ShortLineOptions,
) -> GeometryTable {
    ShortLineFilter::new(*options).apply(table)
}

fn default_true() -> bool {
    true
}

/// A regular expression matched against raw layer names.
///
/// Matching is case-sensitive unless the pattern opts out with `(?i)`.
#[derive(Clone)]
pub struct LayerPattern(Regex);

impl LayerPattern {
    #[must_use]
    pub fn is_match(&self, layer: &str) -> bool {
        self.0.is_match(layer)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Debug for LayerPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LayerPattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for LayerPattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl FromStr for LayerPattern {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Regex::new(s)
            .map(LayerPattern)
            .map_err(|err| ConfigError::InvalidOption {
                option: "layer pattern".to_string(),
                message: format!("'{s}' is not a valid regular expression: {err}"),
            })
    }
}

impl Serialize for LayerPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LayerPattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = String::deserialize(deserializer)?;
        pattern.parse().map_err(serde::de::Error::custom)
    }
}

/// Attribute, size and extent filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFilterOptions {
    /// Attribute holding the CAD layer name
    #[serde(default = "default_layer_field")]
    pub layer_field: String,
    /// Keep only these layers (trimmed, case-insensitive); empty keeps all
    pub include_layers: Vec<String>,
    /// Drop these layers (trimmed, case-insensitive); wins over every include rule
    pub exclude_layers: Vec<String>,
    /// Keep layers matching any of these regular expressions, alongside `include_layers`
    pub include_layer_patterns: Vec<LayerPattern>,
    /// Drop layers matching any of these regular expressions
    pub exclude_layer_patterns: Vec<LayerPattern>,
    /// Drop polygons with a smaller area
    pub min_area: Option<f64>,
    /// Drop lines with a smaller length; a line exactly this long is kept
    pub min_length: Option<f64>,
    /// Drop geometries without coordinates
    #[serde(default = "default_true")]
    pub drop_empty: bool,
    /// Drop zero-area polygons and zero-length lines when no explicit minimum is set
    #[serde(default = "default_true")]
    pub drop_zero_geom: bool,
    /// `[minx, miny, maxx, maxy]`; features whose envelope misses it are dropped
    pub bbox: Option<[f64; 4]>,
    /// Field name to disallowed values (exact string match)
    pub exclude_field_values: BTreeMap<String, BTreeSet<String>>,
}

impl Default for FeatureFilterOptions {
    fn default() -> Self {
        Self {
            layer_field: default_layer_field(),
            include_layers: Vec::new(),
            exclude_layers: Vec::new(),
            include_layer_patterns: Vec::new(),
            exclude_layer_patterns: Vec::new(),
            min_area: None,
            min_length: None,
            drop_empty: true,
            drop_zero_geom: true,
            bbox: None,
            exclude_field_values: BTreeMap::new(),
        }
    }
}

impl FeatureFilterOptions {
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] for negative thresholds or an
    /// inverted bounding box.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (option, value) in [("min_area", self.min_area), ("min_length", self.min_length)] {
            if let Some(value) = value.filter(|v| !v.is_finite() || *v < 0.0) {
                return Err(ConfigError::InvalidOption {
                    option: format!("features.{option}"),
                    message: format!("must be a finite value >= 0, got {value}"),
                });
            }
        }
        if let Some([minx, miny, maxx, maxy]) = self.bbox {
            if !(minx <= maxx && miny <= maxy) {
                return Err(ConfigError::InvalidOption {
                    option: "features.bbox".to_string(),
                    message: "expected [minx, miny, maxx, maxy] with min <= max".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn normalise_layer(name: &str) -> String {
    name.trim().to_lowercase()
}

fn value_as_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        JsonValue::Null | JsonValue::Array(_) | JsonValue::Object(_) => None,
    }
}

fn intersects(envelope: Rect<f64>, [minx, miny, maxx, maxy]: [f64; 4]) -> bool {
    !(envelope.max().x < minx
        || envelope.min().x > maxx
        || envelope.max().y < miny
        || envelope.min().y > maxy)
}

/// Filters on layer names, attribute values, geometry size and extent.
#[derive(Debug, Clone)]
pub struct FeatureFilter {
    options: FeatureFilterOptions,
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl FeatureFilter {
    #[must_use]
    pub fn new(options: FeatureFilterOptions) -> Self {
        let include = options.include_layers.iter().map(|l| normalise_layer(l)).collect();
        let exclude = options.exclude_layers.iter().map(|l| normalise_layer(l)).collect();
        Self {
            options,
            include,
            exclude,
        }
    }

    /// Layer, attribute, size and extent rules for one feature. A missing
    /// geometry is treated like an empty one.
    #[must_use]
    pub fn allows(&self, geometry: Option<&Geometry<f64>>, properties: &JsonObject) -> bool {
        self.layer_allowed(properties)
            && self.fields_allowed(properties)
            && self.geometry_allowed(geometry)
    }

    fn layer_allowed(&self, properties: &JsonObject) -> bool {
        let raw = properties
            .get(&self.options.layer_field)
            .and_then(value_as_text)
            .unwrap_or_default();
        let raw = raw.trim();
        let layer = normalise_layer(raw);

        let excluded = self.exclude.contains(&layer)
            || self
                .options
                .exclude_layer_patterns
                .iter()
                .any(|pattern| pattern.is_match(raw));
        if excluded {
            return false;
        }

        let has_include_rules =
            !self.include.is_empty() || !self.options.include_layer_patterns.is_empty();
        !has_include_rules
            || self.include.contains(&layer)
            || self
                .options
                .include_layer_patterns
                .iter()
                .any(|pattern| pattern.is_match(raw))
    }

    fn fields_allowed(&self, properties: &JsonObject) -> bool {
        self.options
            .exclude_field_values
            .iter()
            .all(|(field, disallowed)| {
                properties
                    .get(field)
                    .and_then(value_as_text)
                    .is_none_or(|value| !disallowed.contains(&value))
            })
    }

    fn geometry_allowed(&self, geometry: Option<&Geometry<f64>>) -> bool {
        let opts = &self.options;
        let Some(geometry) = geometry.filter(|g| !is_empty_geometry(g)) else {
            return !opts.drop_empty;
        };
        let kind = GeometryType::of(geometry);

        if kind.is_some_and(GeometryType::is_polygon) {
            let area = geometry.unsigned_area();
            match opts.min_area {
                Some(min) if area < min => return false,
                None if opts.drop_zero_geom && area == 0.0 => return false,
                _ => {},
            }
        }

        if kind.is_some_and(GeometryType::is_line) {
            let length = line_length(geometry);
            match opts.min_length {
                Some(min) if length < min => return false,
                None if opts.drop_zero_geom && length == 0.0 => return false,
                _ => {},
            }
        }

        match (opts.bbox, geometry.bounding_rect()) {
            (Some(bbox), Some(envelope)) => intersects(envelope, bbox),
            _ => true,
        }
    }
}

impl RecordFilter for FeatureFilter {
    fn name(&self) -> &'static str {
        "features"
    }

    fn keep(&self, record: &GeometryRecord) -> bool {
        self.allows(Some(&record.geometry), &record.properties)
    }
}

/// Applies layer, attribute, size and extent filters. See [`FeatureFilter`].
#[must_use]
pub fn filter_features(table: &GeometryTable, options: &FeatureFilterOptions) -> GeometryTable {
    FeatureFilter::new(options.clone()).apply(table)
}
