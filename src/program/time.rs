//! Catalog timestamps.
//!
//! The catalog expresses start/end as fixed-width `YYYYMMDDhhmmss` strings in
//! Japan Standard Time. All scheduling decisions happen in that zone.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use super::ProgramError;

/// Zone the catalog's wall-clock timestamps are expressed in.
pub const CATALOG_TZ: Tz = chrono_tz::Asia::Tokyo;

/// `YYYYMMDDhhmmss`, as used by the catalog and the playlist API.
pub const CATALOG_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

/// `YYYYMMDDhhmm`, as used in output file names.
pub const OUTPUT_TIME_FORMAT: &str = "%Y%m%d%H%M";

/// Parses a catalog timestamp into an instant in [`CATALOG_TZ`].
///
/// # Errors
///
/// Returns [`ProgramError::InvalidTime`] when the value is not a valid
/// fixed-width timestamp.
pub fn parse_catalog_time(value: &str) -> Result<DateTime<Tz>, ProgramError> {
    let naive = NaiveDateTime::parse_from_str(value, CATALOG_TIME_FORMAT)
        .map_err(|_| ProgramError::invalid_time(value))?;
    CATALOG_TZ
        .from_local_datetime(&naive)
        .single()
        .ok_or_else(|| ProgramError::invalid_time(value))
}

/// Current time in [`CATALOG_TZ`].
#[must_use]
pub fn now() -> DateTime<Tz> {
    Utc::now().with_timezone(&CATALOG_TZ)
}
