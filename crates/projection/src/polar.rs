//! Polar stereographic projection (ellipsoidal, true scale at the pole).
//!
//! Reference: Snyder, "Map Projections: A Working Manual", eqs. 21-33 to 21-39.

use std::f64::consts::FRAC_PI_4;

use crate::error::{ProjectionError, Result};

/// WGS84 semi-major axis (meters).
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 first eccentricity.
pub const WGS84_E: f64 = 0.081_819_190_842_621_5;

/// Polar stereographic image area.
#[derive(Debug, Clone)]
pub struct PolarStereographic {
    /// Central meridian (radians)
    pub lambda_0: f64,
    /// true for the north pole aspect
    pub north: bool,
    /// Semi-major axis (meters)
    pub a: f64,
    /// Eccentricity
    pub e: f64,
    /// (min_x, min_y, max_x, max_y) in projection meters
    pub extent: [f64; 4],
    pub nx: usize,
    pub ny: usize,
}

impl PolarStereographic {
    /// Create a WGS84 polar stereographic area.
    ///
    /// `latitude_deg` selects the pole (+90 or -90).
    pub fn wgs84(
        longitude_deg: f64,
        latitude_deg: f64,
        extent: [f64; 4],
        nx: usize,
        ny: usize,
    ) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(ProjectionError::EmptyGrid { width: nx, height: ny });
        }
        if latitude_deg.abs() != 90.0 {
            return Err(ProjectionError::InvalidParameters(format!(
                "polar stereographic needs latitude +90 or -90, got {}",
                latitude_deg
            )));
        }
        if extent[0] >= extent[2] || extent[1] >= extent[3] {
            return Err(ProjectionError::InvalidParameters(format!(
                "invalid extent {:?}",
                extent
            )));
        }

        Ok(Self {
            lambda_0: longitude_deg.to_radians(),
            north: latitude_deg > 0.0,
            a: WGS84_A,
            e: WGS84_E,
            extent,
            nx,
            ny,
        })
    }

    /// Scale term `2a / sqrt((1+e)^(1+e) (1-e)^(1-e))`.
    fn rho_scale(&self) -> f64 {
        let e = self.e;
        2.0 * self.a / ((1.0 + e).powf(1.0 + e) * (1.0 - e).powf(1.0 - e)).sqrt()
    }

    /// Convert geographic coordinates (degrees) to projection meters.
    ///
    /// Returns None for the opposite pole, which projects to infinity.
    pub fn geo_to_xy(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let phi = if self.north {
            lat_deg.to_radians()
        } else {
            -lat_deg.to_radians()
        };
        if phi <= -std::f64::consts::FRAC_PI_2 + 1e-10 {
            return None;
        }
        let dlam = lon_deg.to_radians() - self.lambda_0;

        let e_sin = self.e * phi.sin();
        let t = (FRAC_PI_4 - phi / 2.0).tan() / ((1.0 - e_sin) / (1.0 + e_sin)).powf(self.e / 2.0);
        let rho = self.rho_scale() * t;
        if !rho.is_finite() {
            return None;
        }

        if self.north {
            Some((rho * dlam.sin(), -rho * dlam.cos()))
        } else {
            Some((rho * dlam.sin(), rho * dlam.cos()))
        }
    }

    /// Convert projection meters back to geographic coordinates (degrees).
    pub fn xy_to_geo(&self, x: f64, y: f64) -> (f64, f64) {
        let rho = x.hypot(y);
        let t = rho / self.rho_scale();

        // Iterate for latitude (converges in a handful of steps)
        let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();
        for _ in 0..15 {
            let e_sin = self.e * phi.sin();
            let next = std::f64::consts::FRAC_PI_2
                - 2.0 * (t * ((1.0 - e_sin) / (1.0 + e_sin)).powf(self.e / 2.0)).atan();
            if (next - phi).abs() < 1e-12 {
                phi = next;
                break;
            }
            phi = next;
        }

        let (lam, phi) = if self.north {
            (self.lambda_0 + x.atan2(-y), phi)
        } else {
            (self.lambda_0 + x.atan2(y), -phi)
        };
        (lam.to_degrees(), phi.to_degrees())
    }

    /// Convert geographic coordinates (degrees) to fractional pixel
    /// coordinates `(col, row)`, row 0 at the top (max y).
    pub fn geo_to_pixel(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let (x, y) = self.geo_to_xy(lon_deg, lat_deg)?;
        let [min_x, min_y, max_x, max_y] = self.extent;
        let pixel_w = (max_x - min_x) / self.nx as f64;
        let pixel_h = (max_y - min_y) / self.ny as f64;
        Some(((x - min_x) / pixel_w, (max_y - y) / pixel_h))
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTENT: [f64; 4] = [-5_000_000.0, -5_000_000.0, 5_000_000.0, 5_000_000.0];

    #[test]
    fn test_pole_is_origin() {
        let north = PolarStereographic::wgs84(0.0, 90.0, EXTENT, 100, 100).unwrap();
        let (x, y) = north.geo_to_xy(123.0, 90.0).unwrap();
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);

        let south = PolarStereographic::wgs84(0.0, -90.0, EXTENT, 100, 100).unwrap();
        let (x, y) = south.geo_to_xy(-45.0, -90.0).unwrap();
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
    }

    #[test]
    fn test_roundtrip() {
        for pole in [90.0, -90.0] {
            let proj = PolarStereographic::wgs84(-45.0, pole, EXTENT, 100, 100).unwrap();
            let sign: f64 = if pole > 0.0 { 1.0 } else { -1.0 };
            for (lon, lat) in [(-45.0, 70.0), (10.0, 60.0), (170.0, 80.0)] {
                let (x, y) = proj.geo_to_xy(lon, sign * lat).unwrap();
                let (lon2, lat2) = proj.xy_to_geo(x, y);
                assert!((lat * sign - lat2).abs() < 1e-6, "lat {} vs {}", lat * sign, lat2);
                let dlon = (lon - lon2 + 540.0).rem_euclid(360.0) - 180.0;
                assert!(dlon.abs() < 1e-6, "lon {} vs {}", lon, lon2);
            }
        }
    }

    #[test]
    fn test_central_meridian_points_down_from_north_pole() {
        let proj = PolarStereographic::wgs84(0.0, 90.0, EXTENT, 100, 100).unwrap();
        let (col, row) = proj.geo_to_pixel(0.0, 70.0).unwrap();
        assert!((col - 50.0).abs() < 1e-6);
        assert!(row > 50.0);
    }

    #[test]
    fn test_opposite_pole_not_projected() {
        let proj = PolarStereographic::wgs84(0.0, 90.0, EXTENT, 100, 100).unwrap();
        assert!(proj.geo_to_xy(0.0, -90.0).is_none());
    }

    #[test]
    fn test_rejects_non_polar_latitude() {
        assert!(PolarStereographic::wgs84(0.0, 45.0, EXTENT, 10, 10).is_err());
    }
}
