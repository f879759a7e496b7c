//! Remote URL and cache file naming for each provider convention.

use chrono::{DateTime, Datelike, Timelike, Utc};

use cloudmap_common::{NamingScheme, SourceConfig};

/// Names derived from a source and a resolved timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub url: String,
    /// Cache file name (no directory).
    pub file_name: String,
    /// Glob pattern (`*`, `?`) matching every cache file of this source.
    pub purge_pattern: String,
}

/// Build the remote URL, cache file name and purge pattern of `source` for
/// an already truncated `timestamp`.
pub fn resolve_name(source: &SourceConfig, timestamp: DateTime<Utc>) -> ResolvedName {
    let token = source.tier_token();
    match source.naming {
        NamingScheme::Dundee => {
            let (year, month, day) = (timestamp.year(), timestamp.month(), timestamp.day());
            // Midnight keeps a bare "0" rather than "000"
            let hour = match timestamp.hour() {
                0 => "0".to_string(),
                h => format!("{}00", h),
            };
            let dir = format!("{}/{}/{}/{}/", year, month, day, hour);
            let stem = format!("{}_{}_{}_{}", year, month, day, hour);
            let tail = format!("{}{}.{}", source.suffix, token, source.extension);

            ResolvedName {
                url: format!("{}{}{}{}", source.base_url, dir, stem, tail),
                file_name: format!("{}{}", stem, tail),
                purge_pattern: format!("*_*_*_*{}", tail),
            }
        }
        NamingScheme::Jma => {
            let stamp = timestamp.format("%Y%m%d%H00").to_string();
            let tail = format!("{}.{}", source.suffix, source.extension);

            ResolvedName {
                url: format!("{}{}{}{}", source.base_url, token, stamp, tail),
                file_name: format!("{}{}", stamp, tail),
                purge_pattern: format!("????????????{}", tail),
            }
        }
    }
}
