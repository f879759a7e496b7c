//! Geostationary satellite projection.
//!
//! The satellite views Earth from a fixed position above the equator.
//! Projection coordinates are scan angles (radians) scaled by the
//! perspective height, which is what full-disk image extents are given in.
//!
//! Reference: PROJ `geos` projection with `sweep=y`, the Meteosat and
//! Himawari convention.

use crate::error::{ProjectionError, Result};

/// Geostationary full-disk image area.
#[derive(Debug, Clone)]
pub struct Geostationary {
    /// Perspective point height above Earth surface (meters)
    pub perspective_point_height: f64,
    /// Semi-major axis of Earth ellipsoid (meters)
    pub req: f64,
    /// Semi-minor axis of Earth ellipsoid (meters)
    pub rpol: f64,
    /// Longitude of satellite nadir point (radians)
    pub lambda_0: f64,
    /// False northing added to projected y (meters)
    pub false_y: f64,
    /// Half-width of the square image extent (projection meters)
    pub extent: f64,
    /// Number of pixels in X direction
    pub nx: usize,
    /// Number of pixels in Y direction
    pub ny: usize,
}

impl Geostationary {
    /// Create a full-disk area for an image of `nx` x `ny` pixels covering
    /// `(-extent, -extent, extent, extent)` in projection meters.
    ///
    /// # Arguments
    /// * `longitude_deg` - Satellite longitude (degrees, negative for west)
    /// * `semi_major_axis` - Earth equatorial radius (meters)
    /// * `semi_minor_axis` - Earth polar radius (meters)
    /// * `perspective_point_height` - Satellite altitude above Earth surface (meters)
    /// * `extent` - Half-width of the image in projection meters
    /// * `false_y` - False northing (meters)
    /// * `nx`, `ny` - Image dimensions
    #[allow(clippy::too_many_arguments)]
    pub fn full_disk(
        longitude_deg: f64,
        semi_major_axis: f64,
        semi_minor_axis: f64,
        perspective_point_height: f64,
        extent: f64,
        false_y: f64,
        nx: usize,
        ny: usize,
    ) -> Result<Self> {
        if nx == 0 || ny == 0 {
            return Err(ProjectionError::EmptyGrid { width: nx, height: ny });
        }
        if !(extent > 0.0) || !(perspective_point_height > 0.0) {
            return Err(ProjectionError::InvalidParameters(format!(
                "extent ({}) and satellite height ({}) must be positive",
                extent, perspective_point_height
            )));
        }
        if !(semi_minor_axis > 0.0) || semi_minor_axis > semi_major_axis {
            return Err(ProjectionError::InvalidParameters(format!(
                "invalid ellipsoid a={} b={}",
                semi_major_axis, semi_minor_axis
            )));
        }

        Ok(Self {
            perspective_point_height,
            req: semi_major_axis,
            rpol: semi_minor_axis,
            lambda_0: longitude_deg.to_radians(),
            false_y,
            extent,
            nx,
            ny,
        })
    }

    /// Satellite distance from Earth center (meters).
    #[inline]
    fn h(&self) -> f64 {
        self.perspective_point_height + self.req
    }

    /// Convert geographic coordinates (degrees) to scan angles (radians).
    ///
    /// Returns None if the point is not visible from the satellite.
    pub fn geo_to_scan(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        // Work in units of the semi-major axis, as PROJ does.
        let radius_p = self.rpol / self.req;
        let radius_p2 = radius_p * radius_p;
        let radius_g = self.h() / self.req;

        let lam = lon_deg.to_radians() - self.lambda_0;
        // Geocentric latitude (accounting for Earth's oblateness)
        let phi_c = (radius_p2 * lat_deg.to_radians().tan()).atan();

        let r = radius_p / (radius_p * phi_c.cos()).hypot(phi_c.sin());
        let vx = r * lam.cos() * phi_c.cos();
        let vy = r * lam.sin() * phi_c.cos();
        let vz = r * phi_c.sin();

        // Point is beyond Earth's limb as seen from the satellite
        if (radius_g - vx) * vx - vy * vy - vz * vz / radius_p2 < 0.0 {
            return None;
        }

        let tmp = radius_g - vx;
        Some(((vy / tmp).atan(), (vz / vy.hypot(tmp)).atan()))
    }

    /// Convert geographic coordinates (degrees) to fractional pixel
    /// coordinates `(col, row)` of the image, row 0 at the top.
    ///
    /// Returns None if the point is not visible. The result may lie
    /// outside the image; callers check bounds.
    pub fn geo_to_pixel(&self, lon_deg: f64, lat_deg: f64) -> Option<(f64, f64)> {
        let (x_rad, y_rad) = self.geo_to_scan(lon_deg, lat_deg)?;
        let x = x_rad * self.perspective_point_height;
        let y = y_rad * self.perspective_point_height + self.false_y;

        let pixel_w = 2.0 * self.extent / self.nx as f64;
        let pixel_h = 2.0 * self.extent / self.ny as f64;
        Some(((x + self.extent) / pixel_w, (self.extent - y) / pixel_h))
    }

    /// Get grid dimensions.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.nx, self.ny)
    }
}
