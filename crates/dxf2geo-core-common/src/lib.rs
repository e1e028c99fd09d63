//! Common types and traits shared across `dxf2geo` crates.
//!
//! This crate provides the abstractions that are shared between
//! `dxf2geo-core` and the format reader crates, preventing circular dependencies.

pub mod drivers;
pub mod io;

// Re-export commonly used types
pub use drivers::{Driver, DriverCapabilities, SupportStatus};
pub use io::{VectorReader, VectorRetainer};
pub use vector_shared::{
    FeatureRecord, JsonObject, JsonValue, SourcePosition, VectorLayer, VectorReadError,
    VectorReadResult,
};
