//! GeoPackage geometry blob decoding.
//!
//! A blob is the `GP` header (magic, version, flags, SRS id, optional envelope)
//! followed by standard WKB.

use geo_types::{
    Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon, Polygon,
};
use geozero::ToGeo;
use geozero::wkb::Wkb;

const MAGIC: &[u8; 2] = b"GP";
const HEADER_LEN: usize = 8;
const EMPTY_FLAG: u8 = 0b0001_0000;

/// Errors produced while decoding a geometry blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The blob is shorter than its header claims.
    Truncated { len: usize, needed: usize },
    /// The blob does not start with the `GP` magic bytes.
    BadMagic,
    /// The envelope indicator is outside the range defined by the standard.
    BadEnvelope(u8),
    /// The WKB payload could not be decoded.
    Wkb(String),
}

impl std::fmt::Display for BlobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobError::Truncated { len, needed } => {
                write!(f, "geometry blob truncated ({len} bytes, need {needed})")
            },
            BlobError::BadMagic => f.write_str("geometry blob does not start with 'GP'"),
            BlobError::BadEnvelope(code) => write!(f, "invalid envelope indicator {code}"),
            BlobError::Wkb(message) => write!(f, "invalid WKB payload: {message}"),
        }
    }
}

impl std::error::Error for BlobError {}

/// Size in bytes of the envelope announced by the header flags.
fn envelope_len(flags: u8) -> Result<usize, BlobError> {
    match (flags >> 1) & 0b111 {
        0 => Ok(0),
        1 => Ok(32),
        2 | 3 => Ok(48),
        4 => Ok(64),
        code => Err(BlobError::BadEnvelope(code)),
    }
}

/// Returns the WKB payload of a GeoPackage blob and whether the header flags
/// it as empty.
///
/// # Errors
///
/// Returns a [`BlobError`] if the header is malformed.
pub fn wkb_payload(blob: &[u8]) -> Result<(&[u8], bool), BlobError> {
    if blob.len() < HEADER_LEN {
        return Err(BlobError::Truncated {
            len: blob.len(),
            needed: HEADER_LEN,
        });
    }
    if &blob[..2] != MAGIC {
        return Err(BlobError::BadMagic);
    }

    let flags = blob[3];
    let start = HEADER_LEN + envelope_len(flags)?;
    if blob.len() < start {
        return Err(BlobError::Truncated {
            len: blob.len(),
            needed: start,
        });
    }
    Ok((&blob[start..], flags & EMPTY_FLAG != 0))
}

/// Base geometry type code of a WKB payload (ISO Z/M offsets and EWKB flags stripped).
fn wkb_type_code(wkb: &[u8]) -> Result<u32, BlobError> {
    let Some(header) = wkb.get(..5) else {
        return Err(BlobError::Truncated {
            len: wkb.len(),
            needed: 5,
        });
    };
    let bytes = [header[1], header[2], header[3], header[4]];
    let code = match header[0] {
        0 => u32::from_be_bytes(bytes),
        _ => u32::from_le_bytes(bytes),
    };
    Ok((code & 0x0FFF_FFFF) % 1000)
}

/// An empty geometry of the kind named by the WKB header.
///
/// `geo-types` has no empty point, so an empty `POINT` becomes an empty
/// multipoint.
fn empty_geometry(wkb: &[u8]) -> Result<Geometry<f64>, BlobError> {
    let geometry = match wkb_type_code(wkb)? {
        1 | 4 => Geometry::MultiPoint(MultiPoint::new(vec![])),
        2 => Geometry::LineString(LineString::new(vec![])),
        3 => Geometry::Polygon(Polygon::new(LineString::new(vec![]), vec![])),
        5 => Geometry::MultiLineString(MultiLineString::new(vec![])),
        6 => Geometry::MultiPolygon(MultiPolygon::new(vec![])),
        7 => Geometry::GeometryCollection(GeometryCollection(vec![])),
        code => return Err(BlobError::Wkb(format!("unknown geometry type code {code}"))),
    };
    Ok(geometry)
}

/// Decodes a GeoPackage blob into a planar geometry.
///
/// A blob flagged as empty decodes to an empty geometry of its header's type.
///
/// # Errors
///
/// Returns a [`BlobError`] if the header or the WKB payload is malformed.
pub fn decode_geometry(blob: &[u8]) -> Result<Geometry<f64>, BlobError> {
    let (wkb, empty) = wkb_payload(blob)?;
    if empty {
        return empty_geometry(wkb);
    }
    Wkb(wkb.to_vec())
        .to_geo()
        .map_err(|err| BlobError::Wkb(err.to_string()))
}
