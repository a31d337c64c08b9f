//! Coordinate reference system transformations.
//!
//! Currently the polar stereographic projection of the DWD radar composites,
//! with forward and inverse transforms and grid cell lookup.

pub mod polar;

pub use polar::{PolarStereographic, ProjectionError};
