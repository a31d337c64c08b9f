//! Polar Stereographic projection on the WGS84 ellipsoid.
//!
//! This is the projection of the DWD RADOLAN composite grids. The plane is
//! tangent at the north pole with true scale at a standard parallel, and
//! grid cells are square in plane coordinates.
//!
//! The projection parameters include:
//! - Ellipsoid semi-axes (a, b)
//! - Latitude of true scale (lat_ts)
//! - Central meridian (lon0)
//! - False easting/northing (x0, y0) in meters
//! - Cell size in meters and a row offset locating the grid origin

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use radar_common::GridCoordinate;
use thiserror::Error;

/// Errors mapping a location onto the grid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("coordinates must be finite, got lat={lat}, lon={lon}")]
    NonFinite { lat: f64, lon: f64 },

    #[error("lat={lat}, lon={lon} maps before the grid origin at column {column:.1}, row {row:.1}")]
    BeforeOrigin {
        lat: f64,
        lon: f64,
        column: f64,
        row: f64,
    },
}

/// Polar Stereographic (north polar aspect) projection parameters.
#[derive(Debug, Clone)]
pub struct PolarStereographic {
    /// Semi-major axis (meters)
    pub a: f64,
    /// Semi-minor axis (meters)
    pub b: f64,
    /// Latitude of true scale in radians
    pub lat_ts: f64,
    /// Central meridian in radians
    pub lon0: f64,
    /// False easting (meters)
    pub x0: f64,
    /// False northing (meters)
    pub y0: f64,
    /// Grid cell edge length (meters)
    pub cell_size: f64,
    /// Rows added after scaling to move the origin to the grid's first row
    pub row_offset: f64,
    /// First eccentricity
    e: f64,
    /// a * m(lat_ts) / t(lat_ts), the radius scale
    k: f64,
}

impl PolarStereographic {
    /// Create a projection from degrees and meters.
    ///
    /// # Arguments
    /// * `a` - Semi-major axis (meters)
    /// * `b` - Semi-minor axis (meters)
    /// * `lat_ts_deg` - Latitude of true scale (degrees)
    /// * `lon0_deg` - Central meridian (degrees)
    /// * `x0` - False easting (meters)
    /// * `y0` - False northing (meters)
    /// * `cell_size` - Grid cell size (meters)
    /// * `row_offset` - Row index of the plane's y = 0 line
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        a: f64,
        b: f64,
        lat_ts_deg: f64,
        lon0_deg: f64,
        x0: f64,
        y0: f64,
        cell_size: f64,
        row_offset: f64,
    ) -> Self {
        let e2 = 1.0 - (b * b) / (a * a);
        let e = e2.sqrt();
        let lat_ts = lat_ts_deg.to_radians();

        let m = a * lat_ts.cos() / (1.0 - e2 * lat_ts.sin().powi(2)).sqrt();
        let k = m / isometric_factor(lat_ts, e);

        Self {
            a,
            b,
            lat_ts,
            lon0: lon0_deg.to_radians(),
            x0,
            y0,
            cell_size,
            row_offset,
            e,
            k,
        }
    }

    /// Create the RADOLAN DE1200 projection.
    ///
    /// RADOLAN uses Polar Stereographic with:
    /// - Ellipsoid: WGS84
    /// - True scale at 60°N, central meridian 10°E
    /// - False origin: x0 = 543696.835 m, y0 = 3622088.862 m
    /// - Grid: 1 km cells, 1200 row offset
    pub fn radolan() -> Self {
        Self::new(
            6378137.0,          // a
            6356752.3142451802, // b
            60.0,               // lat_ts
            10.0,               // lon0
            543696.83521776402, // x0
            3622088.8619310018, // y0
            1000.0,             // cell size
            1200.0,             // row offset
        )
    }

    /// Eccentricity of the ellipsoid.
    pub fn eccentricity(&self) -> f64 {
        self.e
    }

    /// Convert geographic coordinates (degrees) to plane coordinates (meters).
    pub fn geo_to_plane(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let dlon = lon_deg.to_radians() - self.lon0;

        let rho = self.k * isometric_factor(lat, self.e);

        let x = self.x0 + rho * dlon.sin();
        let y = self.y0 - rho * dlon.cos();

        (x, y)
    }

    /// Convert plane coordinates (meters) back to geographic coordinates.
    ///
    /// Returns (lat, lon) in degrees.
    pub fn plane_to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        let dx = x - self.x0;
        let dy = self.y0 - y;

        let rho = (dx * dx + dy * dy).sqrt();
        let t = rho / self.k;

        // Latitude has no closed form on the ellipsoid; a few fixed-point
        // steps converge well below a millimeter.
        let half_e = self.e / 2.0;
        let mut lat = FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let es = self.e * lat.sin();
            let next = FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(half_e)).atan();
            if (next - lat).abs() < 1e-12 {
                lat = next;
                break;
            }
            lat = next;
        }

        let mut lon = self.lon0 + dx.atan2(dy);
        if lon > PI {
            lon -= 2.0 * PI;
        } else if lon < -PI {
            lon += 2.0 * PI;
        }

        (lat.to_degrees(), lon.to_degrees())
    }

    /// Convert geographic coordinates (degrees) to fractional grid indices.
    ///
    /// Returns (column, row).
    pub fn geo_to_grid(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let (x, y) = self.geo_to_plane(lat_deg, lon_deg);
        (x / self.cell_size, y / self.cell_size + self.row_offset)
    }

    /// Convert fractional grid indices back to geographic coordinates.
    pub fn grid_to_geo(&self, column: f64, row: f64) -> (f64, f64) {
        let x = column * self.cell_size;
        let y = (row - self.row_offset) * self.cell_size;
        self.plane_to_geo(x, y)
    }

    /// Map a location to the nearest grid cell.
    ///
    /// Halfway cases round to the even index. The upper bound is not
    /// checked here; it depends on the frame being read.
    pub fn project(&self, lat_deg: f64, lon_deg: f64) -> Result<GridCoordinate, ProjectionError> {
        if !lat_deg.is_finite() || !lon_deg.is_finite() {
            return Err(ProjectionError::NonFinite {
                lat: lat_deg,
                lon: lon_deg,
            });
        }

        let (column, row) = self.geo_to_grid(lat_deg, lon_deg);
        let (x, y) = (column.round_ties_even(), row.round_ties_even());

        if !(x >= 0.0 && y >= 0.0 && x <= u32::MAX as f64 && y <= u32::MAX as f64) {
            return Err(ProjectionError::BeforeOrigin {
                lat: lat_deg,
                lon: lon_deg,
                column,
                row,
            });
        }

        Ok(GridCoordinate::new(x as u32, y as u32))
    }
}

/// t(φ) = tan(π/4 − φ/2) / ((1 − e·sinφ) / (1 + e·sinφ))^(e/2)
fn isometric_factor(lat: f64, e: f64) -> f64 {
    let es = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}
