//! Common test fixtures for cloudmap tests.
//!
//! Satellite source descriptors modelled on the real providers, with
//! URLs pointing at a non-routable test host.

use chrono::{DateTime, TimeZone, Utc};

use cloudmap_common::{
    Footprint, NamingScheme, Rescale, ResolutionTier, SourceConfig, SourceProjection,
    GEOSTATIONARY_HEIGHT,
};

/// Base URL used by fixture sources.
pub const TEST_BASE_URL: &str = "http://cloudmap.test/";

/// A fixed reference time for tests (2013-11-19T20:47:00Z).
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2013, 11, 19, 20, 47, 0).unwrap()
}

fn geostationary(extent: f64) -> SourceProjection {
    SourceProjection::Geostationary {
        extent,
        semi_major_axis: 6_378_169.0,
        semi_minor_axis: 6_356_584.0,
        false_y: 0.0,
        satellite_height: GEOSTATIONARY_HEIGHT,
    }
}

/// Dundee-style 3-hourly geostationary source using the whole image.
pub fn dundee_source(name: &str, longitude: f64) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        longitude,
        footprint: Footprint::Full,
        rescale: Rescale::Identity,
        base_url: format!("{}{}/", TEST_BASE_URL, name),
        suffix: format!("_{}_9_", name),
        extension: "jpeg".to_string(),
        naming: NamingScheme::Dundee,
        projection: geostationary(5_433_878.562),
        channel: Default::default(),
        tier: ResolutionTier::Low,
        tier_tokens: None,
        tier_multipliers: None,
        requires_login: true,
        polar_mirror: true,
        latitude_taper: false,
        smooth_grid: false,
        trust_width: None,
    }
}

/// JMA-style hourly geostationary source.
pub fn jma_source(name: &str, longitude: f64) -> SourceConfig {
    SourceConfig {
        naming: NamingScheme::Jma,
        base_url: format!("{}jma/", TEST_BASE_URL),
        suffix: "-00".to_string(),
        extension: "png".to_string(),
        projection: SourceProjection::Geostationary {
            extent: 5_568_742.4 * 0.964,
            semi_major_axis: 6_378_137.0,
            semi_minor_axis: 6_356_752.3,
            false_y: 0.0,
            satellite_height: GEOSTATIONARY_HEIGHT,
        },
        channel: cloudmap_common::Channel::Red,
        requires_login: false,
        latitude_taper: true,
        ..dundee_source(name, longitude)
    }
}

/// Polar stereographic source over the given pole (+90 or -90).
pub fn polar_source(name: &str, longitude: f64, latitude: f64) -> SourceConfig {
    SourceConfig {
        projection: SourceProjection::PolarStereographic {
            latitude,
            extent: [-4_000_000.0, -4_000_000.0, 4_000_000.0, 4_000_000.0],
        },
        polar_mirror: false,
        requires_login: false,
        ..dundee_source(name, longitude)
    }
}

/// The five geostationary satellites of the Dundee receiving station.
pub fn dundee_satellites() -> Vec<SourceConfig> {
    [
        ("MTSAT2", 145.0),
        ("MET7", 57.0),
        ("MSG3", 0.0),
        ("GOES13", -75.0),
        ("GOES15", -135.0),
    ]
    .iter()
    .map(|&(name, lon)| dundee_source(name, lon))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloudmap_common::validate_sources;

    #[test]
    fn test_fixture_sources_are_valid() {
        validate_sources(&dundee_satellites()).unwrap();
        validate_sources(&[jma_source("HIMAWARI8", 140.7), polar_source("NORTH", 0.0, 90.0)]).unwrap();
    }

    #[test]
    fn test_jma_fixture_cadence() {
        assert_eq!(jma_source("H8", 140.7).cadence().hours(), 1);
        assert_eq!(dundee_source("MSG3", 0.0).cadence().hours(), 3);
    }
}
