//! Program catalog fetching.
//!
//! Each station publishes a weekly schedule as XML: one `<progs>` block per
//! broadcast day, each holding `<prog>` entries with start/end attributes and
//! descriptive children. [`fetch_weekly_programs`] flattens that document into
//! an ordered list of [`Program`]s.

mod error;
pub mod time;

pub use error::ProgramError;
pub use time::{CATALOG_TZ, parse_catalog_time};

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::download::HttpClient;
use crate::endpoints::Endpoints;

/// Genre labels attached to a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Genre {
    /// Personality genre (e.g. "タレント").
    pub personality: String,
    /// Program genre (e.g. "トーク").
    pub program: String,
}

/// A single scheduled broadcast, immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    /// Station airing the program.
    pub station_id: String,
    /// Start, catalog timestamp (`YYYYMMDDhhmmss`, JST).
    pub start: String,
    /// End, catalog timestamp.
    pub end: String,
    pub title: String,
    pub description: String,
    pub info: String,
    pub performer: String,
    pub genre: Genre,
    /// Free-form tags.
    pub tags: Vec<String>,
}

impl Program {
    /// Parsed start time.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::InvalidTime`] if `start` is malformed.
    pub fn start_time(&self) -> Result<DateTime<Tz>, ProgramError> {
        parse_catalog_time(&self.start)
    }

    /// Parsed end time.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::InvalidTime`] if `end` is malformed.
    pub fn end_time(&self) -> Result<DateTime<Tz>, ProgramError> {
        parse_catalog_time(&self.end)
    }
}

#[derive(Debug, Deserialize)]
struct WeeklyDocument {
    stations: WeeklyStations,
}

#[derive(Debug, Deserialize)]
struct WeeklyStations {
    #[serde(rename = "station", default)]
    stations: Vec<WeeklyStation>,
}

#[derive(Debug, Deserialize)]
struct WeeklyStation {
    #[serde(rename = "@id")]
    id: String,
    #[serde(rename = "progs", default)]
    days: Vec<WeeklyDay>,
}

#[derive(Debug, Deserialize)]
struct WeeklyDay {
    #[serde(rename = "prog", default)]
    programs: Vec<RawProgram>,
}

#[derive(Debug, Deserialize)]
struct RawProgram {
    #[serde(rename = "@ft")]
    ft: String,
    #[serde(rename = "@to")]
    to: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    info: String,
    #[serde(default)]
    pfm: String,
    #[serde(default)]
    tag: RawTags,
    #[serde(default)]
    genre: RawGenre,
}

#[derive(Debug, Default, Deserialize)]
struct RawTags {
    #[serde(rename = "item", default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGenre {
    #[serde(default)]
    personality: RawItem,
    #[serde(default)]
    program: RawItem,
}

#[derive(Debug, Default, Deserialize)]
struct RawItem {
    #[serde(default)]
    name: String,
}

/// Decodes a weekly catalog document.
///
/// `station_id` is only used for error context; the station recorded on each
/// program comes from the document itself.
///
/// # Errors
///
/// Returns [`ProgramError::Decode`] if the XML doesn't have the catalog shape.
pub fn decode_weekly_programs(station_id: &str, xml: &str) -> Result<Vec<Program>, ProgramError> {
    let document: WeeklyDocument =
        quick_xml::de::from_str(xml).map_err(|e| ProgramError::decode(station_id, e))?;

    let mut programs = Vec::new();
    for station in document.stations.stations {
        for day in station.days {
            programs.extend(day.programs.into_iter().map(|raw| Program {
                station_id: station.id.clone(),
                start: raw.ft,
                end: raw.to,
                title: raw.title,
                description: raw.desc,
                info: raw.info,
                performer: raw.pfm,
                genre: Genre {
                    personality: raw.genre.personality.name,
                    program: raw.genre.program.name,
                },
                tags: raw.tag.items.into_iter().map(|item| item.name).collect(),
            }));
        }
    }
    Ok(programs)
}

/// Fetches and decodes the weekly catalog of `station_id`.
///
/// # Errors
///
/// Returns [`ProgramError::Fetch`] on transport failure and
/// [`ProgramError::Decode`] on a malformed document.
#[instrument(skip(client, endpoints))]
pub async fn fetch_weekly_programs(
    client: &HttpClient,
    endpoints: &Endpoints,
    station_id: &str,
) -> Result<Vec<Program>, ProgramError> {
    let url = endpoints.weekly_programs(station_id);
    let body = client
        .get_text(&url)
        .await
        .map_err(|e| ProgramError::fetch(station_id, e))?;
    let programs = decode_weekly_programs(station_id, &body)?;
    debug!(count = programs.len(), "decoded weekly programs");
    Ok(programs)
}
