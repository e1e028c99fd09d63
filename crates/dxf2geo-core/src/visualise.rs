//! Renders a [`GeometryTable`] as a self-contained interactive HTML map.
//!
//! The page embeds one SVG with a `<g>` layer per geometry type, a legend
//! whose checkboxes toggle the layers, wheel zoom, drag pan (double-click
//! resets the view) and a `<title>` tooltip listing each feature's attributes.
//! No external assets are referenced.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use dxf2geo_core_common::JsonValue;
use geo_types::{Coord, Geometry, LineString, Polygon, Rect};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{OutputErrorExt, Result};
use crate::geometry_type::GeometryType;
use crate::types::{GeometryRecord, GeometryTable};

fn default_title() -> String {
    "dxf2geo".to_string()
}

/// Presentation options for [`plot_geometries_with`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapOptions {
    /// Page and header title
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

/// What was drawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSummary {
    pub path: PathBuf,
    /// Features drawn per layer
    pub layers: BTreeMap<GeometryType, usize>,
}

impl MapSummary {
    #[must_use]
    pub fn total(&self) -> usize {
        self.layers.values().sum()
    }
}

const STYLE: &str = r#"
body { margin: 0; font-family: system-ui, sans-serif; display: flex; flex-direction: column; height: 100vh; }
header { display: flex; align-items: baseline; gap: 1em; padding: 0.5em 1em; background: #f4f4f4; border-bottom: 1px solid #ddd; }
header h1 { font-size: 1.1em; margin: 0; }
#legend label { margin-right: 1em; cursor: pointer; }
.swatch { display: inline-block; width: 0.8em; height: 0.8em; margin-right: 0.3em; vertical-align: middle; }
#map { flex: 1; width: 100%; cursor: grab; background: #fff; }
#map.dragging { cursor: grabbing; }
#map path { vector-effect: non-scaling-stroke; }
#map .point { stroke-width: 6; stroke-linecap: round; }
#map .line { fill: none; stroke-width: 1.5; }
#map .polygon { fill-opacity: 0.4; fill-rule: evenodd; stroke-width: 1; }
#map path:hover { stroke: #000; }
.empty { position: absolute; top: 50%; width: 100%; text-align: center; color: #888; }
"#;

const SCRIPT: &str = r#"
(function () {
  const svg = document.getElementById('map');
  const initial = svg.getAttribute('viewBox').split(/\s+/).map(Number);
  let view = initial.slice();
  let drag = null;

  function apply() { svg.setAttribute('viewBox', view.join(' ')); }
  function point(evt) {
    const p = svg.createSVGPoint();
    p.x = evt.clientX;
    p.y = evt.clientY;
    return p.matrixTransform(svg.getScreenCTM().inverse());
  }

  svg.addEventListener('wheel', function (evt) {
    evt.preventDefault();
    const p = point(evt);
    const k = evt.deltaY < 0 ? 0.8 : 1.25;
    view = [p.x - (p.x - view[0]) * k, p.y - (p.y - view[1]) * k, view[2] * k, view[3] * k];
    apply();
  }, { passive: false });
  svg.addEventListener('pointerdown', function (evt) {
    drag = point(evt);
    svg.classList.add('dragging');
    svg.setPointerCapture(evt.pointerId);
  });
  svg.addEventListener('pointermove', function (evt) {
    if (!drag) { return; }
    const p = point(evt);
    view[0] -= p.x - drag.x;
    view[1] -= p.y - drag.y;
    apply();
  });
  function release() { drag = null; svg.classList.remove('dragging'); }
  svg.addEventListener('pointerup', release);
  svg.addEventListener('pointercancel', release);
  svg.addEventListener('dblclick', function () { view = initial.slice(); apply(); });

  document.querySelectorAll('#legend input[data-layer]').forEach(function (box) {
    box.addEventListener('change', function () {
      document.getElementById(box.dataset.layer).style.display = box.checked ? '' : 'none';
    });
  });
})();
"#;

const fn colour(ty: GeometryType) -> &'static str {
    match ty {
        GeometryType::Point => "#d62728",
        GeometryType::MultiPoint => "#ff7f0e",
        GeometryType::LineString => "#1f77b4",
        GeometryType::MultiLineString => "#17becf",
        GeometryType::Polygon => "#2ca02c",
        GeometryType::MultiPolygon => "#9467bd",
    }
}

/// Escapes text for HTML element content and double-quoted attributes.
fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn push_coord(d: &mut String, command: char, c: Coord<f64>) {
    // SVG y grows downwards; the map is flipped so north is up.
    let _ = write!(d, "{command}{} {} ", c.x, -c.y);
}

fn push_path(d: &mut String, line: &LineString<f64>, close: bool) {
    for (i, c) in line.0.iter().enumerate() {
        push_coord(d, if i == 0 { 'M' } else { 'L' }, *c);
    }
    if close && !line.0.is_empty() {
        d.push_str("Z ");
    }
}

fn push_polygon(d: &mut String, polygon: &Polygon<f64>) {
    push_path(d, polygon.exterior(), true);
    for ring in polygon.interiors() {
        push_path(d, ring, true);
    }
}

fn push_point(d: &mut String, c: Coord<f64>) {
    push_coord(d, 'M', c);
    d.push_str("l0 0 ");
}

/// SVG path data and CSS class for a geometry.
fn path_data(geometry: &Geometry<f64>) -> (String, &'static str) {
    let mut d = String::new();
    let class = match geometry {
        Geometry::Point(p) => {
            push_point(&mut d, p.0);
            "point"
        },
        Geometry::MultiPoint(points) => {
            for p in &points.0 {
                push_point(&mut d, p.0);
            }
            "point"
        },
        Geometry::Line(line) => {
            push_coord(&mut d, 'M', line.start);
            push_coord(&mut d, 'L', line.end);
            "line"
        },
        Geometry::LineString(line) => {
            push_path(&mut d, line, false);
            "line"
        },
        Geometry::MultiLineString(lines) => {
            for line in &lines.0 {
                push_path(&mut d, line, false);
            }
            "line"
        },
        Geometry::Polygon(polygon) => {
            push_polygon(&mut d, polygon);
            "polygon"
        },
        Geometry::MultiPolygon(polygons) => {
            for polygon in &polygons.0 {
                push_polygon(&mut d, polygon);
            }
            "polygon"
        },
        Geometry::Rect(rect) => {
            push_polygon(&mut d, &rect.to_polygon());
            "polygon"
        },
        Geometry::Triangle(triangle) => {
            push_polygon(&mut d, &triangle.to_polygon());
            "polygon"
        },
        Geometry::GeometryCollection(collection) => {
            let mut class = "line";
            for member in &collection.0 {
                let (member_d, member_class) = path_data(member);
                d.push_str(&member_d);
                class = member_class;
            }
            class
        },
    };
    (d.trim_end().to_string(), class)
}

fn tooltip(record: &GeometryRecord) -> String {
    let mut text = format!("{} ({})", record.geometry_type, record.source);
    for (key, value) in &record.properties {
        let value = match value {
            JsonValue::Null => continue,
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = write!(text, "\n{key}: {value}");
    }
    escape(&text)
}

/// Padded `min-x min-y width height` in flipped SVG coordinates.
fn view_box(bounds: Option<Rect<f64>>) -> String {
    let Some(bounds) = bounds else {
        return "0 0 100 100".to_string();
    };
    let (w, h) = (bounds.width(), bounds.height());
    let pad = match w.max(h) * 0.05 {
        pad if pad > 0.0 => pad,
        _ => 1.0,
    };
    format!(
        "{} {} {} {}",
        bounds.min().x - pad,
        -bounds.max().y - pad,
        w + 2.0 * pad,
        h + 2.0 * pad
    )
}

/// Builds the HTML page for a table.
#[must_use]
pub fn render_html(table: &GeometryTable, options: &MapOptions) -> String {
    let groups = table.by_type();
    let title = escape(&options.title);

    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <header><h1>{title}</h1><span id=\"count\">{} feature(s)</span><div id=\"legend\">",
        table.len()
    );
    for (ty, records) in &groups {
        let _ = write!(
            html,
            "<label><input type=\"checkbox\" data-layer=\"layer-{}\" checked>\
             <span class=\"swatch\" style=\"background:{}\"></span>{ty} ({})</label>",
            ty.dir_name(),
            colour(*ty),
            records.len()
        );
    }
    html.push_str("</div></header>\n");

    let _ = writeln!(
        html,
        "<svg id=\"map\" xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{}\" \
         preserveAspectRatio=\"xMidYMid meet\">",
        view_box(table.bounds())
    );
    for (ty, records) in &groups {
        let _ = writeln!(
            html,
            "<g id=\"layer-{}\" data-type=\"{ty}\" stroke=\"{c}\" fill=\"{c}\">",
            ty.dir_name(),
            c = colour(*ty)
        );
        for record in records {
            let (d, class) = path_data(&record.geometry);
            let _ = writeln!(
                html,
                "<path class=\"{class}\" d=\"{d}\"><title>{}</title></path>",
                tooltip(record)
            );
        }
        html.push_str("</g>\n");
    }
    html.push_str("</svg>\n");

    if table.is_empty() {
        html.push_str("<p class=\"empty\">No features</p>\n");
    }
    let _ = write!(html, "<script>{SCRIPT}</script>\n</body>\n</html>\n");
    html
}

/// Writes `table` to `output` as an interactive map with default options.
///
/// An existing file is replaced. An empty table produces a valid page with a
/// "No features" note.
///
/// # Errors
///
/// Returns an [`crate::error::OutputError::Write`] if the file cannot be written.
pub fn plot_geometries(table: &GeometryTable, output: &Path) -> Result<MapSummary> {
    plot_geometries_with(table, output, &MapOptions::default())
}

/// Like [`plot_geometries`], with explicit presentation options.
///
/// # Errors
///
/// Returns an [`crate::error::OutputError::Write`] if the file cannot be written.
pub fn plot_geometries_with(
    table: &GeometryTable,
    output: &Path,
    options: &MapOptions,
) -> Result<MapSummary> {
    fs::write(output, render_html(table, options)).with_write_context(output)?;
    let summary = MapSummary {
        path: output.to_path_buf(),
        layers: table.count_by_type(),
    };
    info!(
        "Wrote map with {} feature(s) in {} layer(s) to {}",
        summary.total(),
        summary.layers.len(),
        output.display()
    );
    Ok(summary)
}
