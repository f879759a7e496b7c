//! Longitude trust weights.
//!
//! Every source gets a triangular kernel centred on its sub-satellite
//! longitude, decaying linearly to a small positive floor. Neighbouring
//! kernels overlap so that every column has a strictly positive total.

use cloudmap_common::{OutputGrid, Raster, SourceConfig, SourceProjection};

/// Smallest weight any cell can carry.
pub const WEIGHT_FLOOR: f64 = 1e-7;

/// Shortest angular distance between two longitudes (degrees, 0..=180).
#[inline]
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = a - b;
    d.abs().min((d + 360.0).abs()).min((d - 360.0).abs())
}

/// Triangular trust kernel: `max((width - dist) / 180, floor)`.
#[inline]
pub fn trust_weight(source_lon: f64, column_lon: f64, width: f64) -> f64 {
    ((width - angular_distance(source_lon, column_lon)) / 180.0).max(WEIGHT_FLOOR)
}

/// Kernel evaluated at every output column longitude.
pub fn column_weights(source_lon: f64, grid: OutputGrid, width: f64) -> Vec<f64> {
    grid.column_longitudes()
        .into_iter()
        .map(|lon| trust_weight(source_lon, lon, width))
        .collect()
}

/// Damping towards the poles for geostationary sources whose limb data is
/// unreliable: `max(floor, 1 - 9/7 * |row - H/2| / H * 2)^0.5`.
#[inline]
pub fn latitude_taper(row: usize, height: usize) -> f64 {
    let h = height as f64;
    let offset = (row as f64 - h / 2.0).abs() / h * 2.0;
    (1.0 - 9.0 / 7.0 * offset).max(WEIGHT_FLOOR).sqrt()
}

/// Ramp for polar sources: zero-ish below about 55 degrees and rising
/// to 1 at their pole.
///
/// `(9 / 2.5) * max(floor, -sign(pole) * (row - H/2) / H * 2 - 6.5/9)`
#[inline]
pub fn pole_ramp(row: usize, height: usize, pole_latitude: f64) -> f64 {
    let h = height as f64;
    let signed = -pole_latitude.signum() * (row as f64 - h / 2.0) / h * 2.0;
    (signed - 6.5 / 9.0).max(WEIGHT_FLOOR) / (2.5 / 9.0)
}

/// Full weight raster of one source on `grid`.
///
/// Geostationary weights depend on the column only (unless the source
/// asks for a latitude taper); polar weights depend on row and column.
/// Every cell is at least [`WEIGHT_FLOOR`].
pub fn weight_raster(source: &SourceConfig, grid: OutputGrid, default_width: f64) -> Raster {
    let columns = column_weights(source.longitude, grid, source.trust_width_or(default_width));

    let row_factor: Box<dyn Fn(usize) -> f64> = match source.projection {
        SourceProjection::PolarStereographic { latitude, .. } => {
            Box::new(move |row| pole_ramp(row, grid.height, latitude))
        }
        SourceProjection::Geostationary { .. } if source.latitude_taper => {
            Box::new(move |row| latitude_taper(row, grid.height))
        }
        SourceProjection::Geostationary { .. } => Box::new(|_| 1.0),
    };

    let mut raster = Raster::zeros(grid.width, grid.height);
    for row in 0..grid.height {
        let factor = row_factor(row);
        for (cell, w) in raster.row_mut(row).iter_mut().zip(&columns) {
            *cell = (w * factor).max(WEIGHT_FLOOR) as f32;
        }
    }
    raster
}
