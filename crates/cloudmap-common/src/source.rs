//! Static per-satellite configuration.
//!
//! A [`SourceConfig`] is plain data: it is cloned into every projection
//! worker, so it carries no callables and no shared state.

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CloudmapError, Result};
use crate::time::Cadence;

/// Height of a geostationary orbit above the surface used by the
/// image providers (meters).
pub const GEOSTATIONARY_HEIGHT: f64 = 35_785_831.0;

/// Default half-width of the longitude trust kernel (degrees).
pub const DEFAULT_TRUST_WIDTH: f64 = 55.0;

/// Which remote image variant to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Low,
    #[default]
    Medium,
    High,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for ResolutionTier {
    type Err = CloudmapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CloudmapError::config(format!(
                "unknown resolution '{}', valid values are: low, medium, high",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One value per resolution tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable<T> {
    pub low: T,
    pub medium: T,
    pub high: T,
}

impl<T> TierTable<T> {
    pub fn get(&self, tier: ResolutionTier) -> &T {
        match tier {
            ResolutionTier::Low => &self.low,
            ResolutionTier::Medium => &self.medium,
            ResolutionTier::High => &self.high,
        }
    }
}

/// File naming / publication convention of an image provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingScheme {
    /// `YYYY/M/D/H00/YYYY_M_D_H00<suffix>`, zero-stripped fields, 3-hourly.
    Dundee,
    /// `YYYYmmddHH00<suffix>`, hourly.
    Jma,
}

impl NamingScheme {
    pub fn cadence(&self) -> Cadence {
        match self {
            Self::Dundee => Cadence::THREE_HOURLY,
            Self::Jma => Cadence::HOURLY,
        }
    }

    /// Remote variant token for each tier when the source does not override it.
    pub fn default_tokens(&self) -> TierTable<String> {
        match self {
            Self::Dundee => TierTable {
                low: "S4".to_string(),
                medium: "S2".to_string(),
                high: "S1".to_string(),
            },
            Self::Jma => TierTable {
                low: "1/".to_string(),
                medium: "1/".to_string(),
                high: "0/".to_string(),
            },
        }
    }

    /// Crop-limit multiplier for each tier when the source does not override it.
    pub fn default_multipliers(&self) -> TierTable<u32> {
        match self {
            Self::Dundee => TierTable {
                low: 1,
                medium: 2,
                high: 4,
            },
            Self::Jma => TierTable {
                low: 1,
                medium: 1,
                high: 1,
            },
        }
    }
}

/// Crop rectangle in raw-image pixels at the lowest resolution tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropLimits {
    pub top: u32,
    pub bottom: u32,
    pub left: u32,
    pub right: u32,
}

impl CropLimits {
    /// Limits multiplied by `multiplier`, or `None` on overflow.
    pub fn scaled(&self, multiplier: u32) -> Option<Self> {
        Some(Self {
            top: self.top.checked_mul(multiplier)?,
            bottom: self.bottom.checked_mul(multiplier)?,
            left: self.left.checked_mul(multiplier)?,
            right: self.right.checked_mul(multiplier)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Valid data area of a raw image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Footprint {
    /// Explicit crop limits, scaled by the tier multiplier.
    Limits {
        top: u32,
        bottom: u32,
        left: u32,
        right: u32,
    },
    /// Strip the white annotation border found on each edge.
    AutoBorder,
    /// Use the whole image.
    Full,
}

impl Footprint {
    pub fn limits(&self) -> Option<CropLimits> {
        match *self {
            Footprint::Limits {
                top,
                bottom,
                left,
                right,
            } => Some(CropLimits {
                top,
                bottom,
                left,
                right,
            }),
            _ => None,
        }
    }
}

/// Monotonic intensity mapping applied after resampling.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rescale {
    #[default]
    Identity,
    /// `min(v * 255 / max_input, 255)`; stretches sources that never reach white.
    Linear { max_input: f32 },
}

impl Rescale {
    #[inline]
    pub fn apply(&self, value: f32) -> f32 {
        match *self {
            Rescale::Identity => value,
            Rescale::Linear { max_input } => (value * 255.0 / max_input).min(255.0),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match *self {
            Rescale::Linear { max_input } if !(max_input > 0.0) => {
                Err(format!("rescale max_input must be > 0, got {}", max_input))
            }
            _ => Ok(()),
        }
    }
}

/// Which image channel holds the infrared intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Convert to greyscale.
    #[default]
    Luma,
    /// Take the red channel of an RGB image.
    Red,
}

/// Native projection of a source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceProjection {
    Geostationary {
        /// Half-width of the square image extent in projection meters.
        extent: f64,
        #[serde(default = "default_semi_major")]
        semi_major_axis: f64,
        #[serde(default = "default_semi_minor")]
        semi_minor_axis: f64,
        #[serde(default)]
        false_y: f64,
        #[serde(default = "default_satellite_height")]
        satellite_height: f64,
    },
    PolarStereographic {
        /// +90 or -90.
        latitude: f64,
        /// (min_x, min_y, max_x, max_y) in projection meters.
        extent: [f64; 4],
    },
}

fn default_semi_major() -> f64 {
    6_378_169.0
}

fn default_semi_minor() -> f64 {
    6_356_584.0
}

fn default_satellite_height() -> f64 {
    GEOSTATIONARY_HEIGHT
}

impl SourceProjection {
    pub fn is_geostationary(&self) -> bool {
        matches!(self, SourceProjection::Geostationary { .. })
    }
}

fn default_extension() -> String {
    "jpeg".to_string()
}

fn default_true() -> bool {
    true
}

/// Immutable description of one satellite image source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Short identifier used in logs and errors (e.g. "MSG3").
    pub name: String,
    /// Sub-satellite longitude in degrees, -180..180.
    pub longitude: f64,
    pub footprint: Footprint,
    #[serde(default)]
    pub rescale: Rescale,
    pub base_url: String,
    /// Filename suffix before the tier token and extension (e.g. "_MSG3_9_").
    pub suffix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    pub naming: NamingScheme,
    pub projection: SourceProjection,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub tier: ResolutionTier,
    #[serde(default)]
    pub tier_tokens: Option<TierTable<String>>,
    #[serde(default)]
    pub tier_multipliers: Option<TierTable<u32>>,
    /// Send HTTP basic credentials with requests.
    #[serde(default)]
    pub requires_login: bool,
    /// Synthesize polar rows by mirroring (geostationary sources only).
    #[serde(default = "default_true")]
    pub polar_mirror: bool,
    /// Damp weights towards the poles.
    #[serde(default)]
    pub latitude_taper: bool,
    /// Median-filter the cropped image and fill its white grid lines
    /// before resampling (polar mosaics).
    #[serde(default)]
    pub smooth_grid: bool,
    /// Per-source override of the trust kernel half-width (degrees).
    #[serde(default)]
    pub trust_width: Option<f64>,
}

impl SourceConfig {
    pub fn cadence(&self) -> Cadence {
        self.naming.cadence()
    }

    /// Copy of this source fetching the given tier.
    pub fn with_tier(mut self, tier: ResolutionTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn tier_token(&self) -> String {
        match &self.tier_tokens {
            Some(table) => table.get(self.tier).clone(),
            None => self.naming.default_tokens().get(self.tier).clone(),
        }
    }

    pub fn tier_multiplier(&self) -> u32 {
        self.multiplier_for(self.tier)
    }

    fn multiplier_for(&self, tier: ResolutionTier) -> u32 {
        match &self.tier_multipliers {
            Some(table) => *table.get(tier),
            None => *self.naming.default_multipliers().get(tier),
        }
    }

    /// Crop limits for the configured tier, if the footprint is explicit
    /// and the scaled limits fit in `u32`.
    pub fn scaled_limits(&self) -> Option<CropLimits> {
        self.footprint
            .limits()
            .and_then(|l| l.scaled(self.tier_multiplier()))
    }

    pub fn trust_width_or(&self, default: f64) -> f64 {
        self.trust_width.unwrap_or(default)
    }

    /// Check the fields of a single source.
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(CloudmapError::config(format!("source '{}': {}", self.name, msg)));

        if self.name.trim().is_empty() {
            return Err(CloudmapError::config("source name must not be empty"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return fail(format!("longitude {} outside -180..180", self.longitude));
        }
        if let Some(limits) = self.footprint.limits() {
            if limits.width() == 0 || limits.height() == 0 {
                return fail(format!("empty crop limits {:?}", limits));
            }
            // The download resolution may pick any tier, so check them all
            for tier in [ResolutionTier::Low, ResolutionTier::Medium, ResolutionTier::High] {
                let multiplier = self.multiplier_for(tier);
                if multiplier == 0 {
                    return fail(format!("{} tier multiplier must be > 0", tier));
                }
                if limits.scaled(multiplier).is_none() {
                    return fail(format!(
                        "crop limits {:?} overflow at {} tier (x{})",
                        limits, tier, multiplier
                    ));
                }
            }
        }
        if let Err(msg) = self.rescale.validate() {
            return fail(msg);
        }
        if let Some(w) = self.trust_width {
            if !(w > 0.0) {
                return fail(format!("trust_width must be > 0, got {}", w));
            }
        }
        match self.projection {
            SourceProjection::Geostationary { extent, .. } if !(extent > 0.0) => {
                fail(format!("geostationary extent must be > 0, got {}", extent))
            }
            SourceProjection::PolarStereographic { latitude, extent } => {
                if latitude.abs() != 90.0 {
                    return fail(format!("polar latitude must be +90 or -90, got {}", latitude));
                }
                if extent[0] >= extent[2] || extent[1] >= extent[3] {
                    return fail(format!("invalid polar extent {:?}", extent));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Validate a whole source set: each source individually, plus unique
/// names and unique longitudes.
pub fn validate_sources(sources: &[SourceConfig]) -> Result<()> {
    if sources.is_empty() {
        return Err(CloudmapError::config("no satellite sources configured"));
    }

    let mut names = HashSet::new();
    let mut longitudes: Vec<(f64, &str)> = Vec::with_capacity(sources.len());

    for source in sources {
        source.validate()?;

        if !names.insert(source.name.as_str()) {
            return Err(CloudmapError::config(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }

        // Polar sources are centered on a pole, not on their longitude.
        if !source.projection.is_geostationary() {
            continue;
        }
        if let Some((_, other)) = longitudes
            .iter()
            .find(|(lon, _)| (*lon - source.longitude).abs() < 1e-9)
        {
            return Err(CloudmapError::config(format!(
                "sources '{}' and '{}' share longitude {}",
                other, source.name, source.longitude
            )));
        }
        longitudes.push((source.longitude, &source.name));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg3() -> SourceConfig {
        SourceConfig {
            name: "MSG3".to_string(),
            longitude: 0.0,
            footprint: Footprint::Limits {
                top: 16,
                bottom: 913,
                left: 16,
                right: 913,
            },
            rescale: Rescale::Identity,
            base_url: "http://example.com/000.0E/MSG/".to_string(),
            suffix: "_MSG3_9_".to_string(),
            extension: "jpeg".to_string(),
            naming: NamingScheme::Dundee,
            projection: SourceProjection::Geostationary {
                extent: 5_433_878.562,
                semi_major_axis: 6_378_169.0,
                semi_minor_axis: 6_356_584.0,
                false_y: 0.0,
                satellite_height: GEOSTATIONARY_HEIGHT,
            },
            channel: Channel::Luma,
            tier: ResolutionTier::Medium,
            tier_tokens: None,
            tier_multipliers: None,
            requires_login: true,
            polar_mirror: true,
            latitude_taper: false,
            smooth_grid: false,
            trust_width: None,
        }
    }

    #[test]
    fn test_tier_scaling() {
        let source = msg3().with_tier(ResolutionTier::High);
        assert_eq!(source.tier_token(), "S1");
        assert_eq!(source.tier_multiplier(), 4);
        let limits = source.scaled_limits().unwrap();
        assert_eq!(limits.bottom, 913 * 4);
        assert_eq!(limits.left, 16 * 4);
    }

    #[test]
    fn test_overflowing_limits_rejected() {
        let mut source = msg3();
        source.footprint = Footprint::Limits {
            top: 0,
            bottom: u32::MAX / 2,
            left: 0,
            right: 100,
        };
        source.tier = ResolutionTier::Low;
        assert!(source.scaled_limits().is_some());
        assert!(source.clone().with_tier(ResolutionTier::High).scaled_limits().is_none());

        let err = source.validate().unwrap_err();
        assert!(err.to_string().contains("overflow at high tier"), "{}", err);

        source.footprint = msg3().footprint;
        source.tier_multipliers = Some(TierTable {
            low: 1,
            medium: 0,
            high: 4,
        });
        assert!(source.validate().is_err());
    }

    #[test]
    fn test_rescale_linear_clamps() {
        let curve = Rescale::Linear { max_input: 193.0 };
        assert_eq!(curve.apply(0.0), 0.0);
        assert!((curve.apply(193.0) - 255.0).abs() < 1e-4);
        assert_eq!(curve.apply(250.0), 255.0);
        assert_eq!(Rescale::Identity.apply(42.0), 42.0);
    }

    #[test]
    fn test_duplicate_longitude_rejected() {
        let a = msg3();
        let mut b = msg3();
        b.name = "MSG4".to_string();
        let err = validate_sources(&[a, b]).unwrap_err();
        assert!(err.to_string().contains("share longitude"));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let a = msg3();
        let mut b = msg3();
        b.longitude = 57.0;
        assert!(validate_sources(&[a, b]).is_err());
    }

    #[test]
    fn test_parse_resolution_tier() {
        assert_eq!("HIGH".parse::<ResolutionTier>().unwrap(), ResolutionTier::High);
        assert!("ultra".parse::<ResolutionTier>().is_err());
    }

    #[test]
    fn test_deserialize_source_yaml() {
        let yaml = r#"
name: MTSAT2
longitude: 145.0
footprint: { mode: limits, top: 12, bottom: 683, left: 9, right: 680 }
rescale: { kind: linear, max_input: 193.0 }
base_url: "http://example.com/145.0E/MTSAT/"
suffix: "_MTSAT2_4_"
naming: dundee
projection: { type: geostationary, extent: 5488217.35, false_y: 50000.0 }
"#;
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(source.rescale, Rescale::Linear { max_input: 193.0 });
        assert_eq!(source.extension, "jpeg");
        assert!(source.polar_mirror);
        assert_eq!(source.cadence(), Cadence::THREE_HOURLY);
        assert!(source.validate().is_ok());
    }
}
