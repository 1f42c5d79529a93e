//! Reference catalog: static data the recorder consults but never mutates.
//!
//! - Regions and their areas (`regions.json`)
//! - A reference coordinate per area (`coordinates.json`, keyed by area name)
//! - Pools of app/SDK/model versions used to build device fingerprints
//!   (`versions.json`)
//! - The station → area topology, fetched from the service's region XML
//!
//! The whole catalog is reloaded at the start of every scheduler cycle.

mod error;

pub use error::CatalogError;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::download::HttpClient;
use crate::endpoints::Endpoints;

/// Smallest geographic unit the service authorizes against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Area {
    /// Area id, e.g. `JP13`.
    pub id: String,
    /// Display name, e.g. `TOKYO`.
    pub name: String,
}

/// Reference point of an area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// One Android SDK level and the build ids published for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Sdk {
    /// SDK level, e.g. `"30"`.
    #[serde(rename = "sdk")]
    pub id: String,
    pub builds: Vec<String>,
}

/// Pools every device fingerprint component is drawn from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionPools {
    /// App versions.
    pub apps: Vec<String>,
    /// Device models.
    pub models: Vec<String>,
    /// Android version → SDK. Ordered so seeded draws are reproducible.
    pub sdks: BTreeMap<String, Sdk>,
}

/// A broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Station {
    pub id: String,
    pub name: String,
    /// Areas the station broadcasts into; the first one is the primary area.
    pub areas: Vec<String>,
}

impl Station {
    /// The area sessions for this station are authorized against.
    #[must_use]
    pub fn primary_area(&self) -> Option<&str> {
        self.areas.first().map(String::as_str)
    }
}

/// Loaded reference data.
#[derive(Debug, Clone, Default)]
pub struct ReferenceCatalog {
    regions: BTreeMap<String, Vec<Area>>,
    coordinates: HashMap<String, Coordinate>,
    versions: VersionPools,
    stations: BTreeMap<String, Station>,
}

const REGIONS_FILE: &str = "regions.json";
const COORDINATES_FILE: &str = "coordinates.json";
const VERSIONS_FILE: &str = "versions.json";

impl ReferenceCatalog {
    /// Builds a catalog from already-parsed parts.
    #[must_use]
    pub fn from_parts(
        regions: BTreeMap<String, Vec<Area>>,
        coordinates: HashMap<String, Coordinate>,
        versions: VersionPools,
        stations: Vec<Station>,
    ) -> Self {
        Self {
            regions,
            coordinates,
            versions,
            stations: stations.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// Loads the JSON reference files from `assets_dir` and fetches the
    /// station topology.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if any file is missing or malformed, or the
    /// station topology can't be fetched.
    #[instrument(skip(client, endpoints), fields(assets_dir = %assets_dir.display()))]
    pub async fn load(
        assets_dir: &Path,
        client: &HttpClient,
        endpoints: &Endpoints,
    ) -> Result<Self, CatalogError> {
        let regions_path = assets_dir.join(REGIONS_FILE);
        let regions = parse_regions(&read_file(&regions_path).await?)
            .map_err(|e| CatalogError::json(&regions_path, e))?;

        let coordinates_path = assets_dir.join(COORDINATES_FILE);
        let coordinates = parse_coordinates(&read_file(&coordinates_path).await?, &regions)
            .map_err(|e| match e {
                CoordinateParseError::Json(e) => CatalogError::json(&coordinates_path, e),
                CoordinateParseError::Shape { area, len } => CatalogError::Coordinate { area, len },
            })?;

        let versions_path = assets_dir.join(VERSIONS_FILE);
        let versions: VersionPools = serde_json::from_str(&read_file(&versions_path).await?)
            .map_err(|e| CatalogError::json(&versions_path, e))?;

        let xml = client
            .get_text(&endpoints.region_full())
            .await
            .map_err(CatalogError::Fetch)?;
        let stations = decode_station_topology(&xml)?;

        debug!(
            regions = regions.len(),
            coordinates = coordinates.len(),
            stations = stations.len(),
            apps = versions.apps.len(),
            models = versions.models.len(),
            sdks = versions.sdks.len(),
            "reference catalog loaded"
        );

        Ok(Self::from_parts(regions, coordinates, versions, stations))
    }

    /// Every (region id, area) pair.
    pub fn regions(&self) -> impl Iterator<Item = (&str, &Area)> {
        self.regions
            .iter()
            .flat_map(|(region, areas)| areas.iter().map(move |area| (region.as_str(), area)))
    }

    /// Reference coordinate of `area_id`.
    #[must_use]
    pub fn coordinate(&self, area_id: &str) -> Option<Coordinate> {
        self.coordinates.get(area_id).copied()
    }

    /// Version pools for device fingerprints.
    #[must_use]
    pub fn version_pools(&self) -> &VersionPools {
        &self.versions
    }

    /// All stations, ordered by id.
    pub fn stations(&self) -> impl Iterator<Item = &Station> {
        self.stations.values()
    }

    /// Looks up one station.
    #[must_use]
    pub fn station(&self, station_id: &str) -> Option<&Station> {
        self.stations.get(station_id)
    }

    /// Primary area of `station_id`.
    #[must_use]
    pub fn primary_area(&self, station_id: &str) -> Option<&str> {
        self.station(station_id).and_then(Station::primary_area)
    }

    /// Ids of the stations broadcasting into `area_id`, ordered by id.
    #[must_use]
    pub fn stations_in_area(&self, area_id: &str) -> Vec<String> {
        self.stations
            .values()
            .filter(|s| s.areas.iter().any(|a| a == area_id))
            .map(|s| s.id.clone())
            .collect()
    }
}

async fn read_file(path: &Path) -> Result<String, CatalogError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CatalogError::read(path, e))
}

/// Parses `regions.json`: region id → list of areas.
///
/// # Errors
///
/// Returns the JSON error on malformed input.
pub fn parse_regions(json: &str) -> Result<BTreeMap<String, Vec<Area>>, serde_json::Error> {
    serde_json::from_str(json)
}

#[derive(Debug)]
enum CoordinateParseError {
    Json(serde_json::Error),
    Shape { area: String, len: usize },
}

/// Parses `coordinates.json` (area name → `[lat, lng]`) into a map keyed by
/// area id. Names that match no area are ignored.
fn parse_coordinates(
    json: &str,
    regions: &BTreeMap<String, Vec<Area>>,
) -> Result<HashMap<String, Coordinate>, CoordinateParseError> {
    let by_name: HashMap<String, Vec<f64>> =
        serde_json::from_str(json).map_err(CoordinateParseError::Json)?;

    let mut coordinates = HashMap::new();
    for area in regions.values().flatten() {
        let Some(latlng) = by_name.get(&area.name) else {
            continue;
        };
        let [lat, lng] = latlng.as_slice() else {
            return Err(CoordinateParseError::Shape {
                area: area.name.clone(),
                len: latlng.len(),
            });
        };
        coordinates.insert(area.id.clone(), Coordinate { lat: *lat, lng: *lng });
    }
    Ok(coordinates)
}

#[derive(Debug, Deserialize)]
struct RegionDocument {
    #[serde(rename = "stations", default)]
    regions: Vec<RawRegion>,
}

#[derive(Debug, Deserialize)]
struct RawRegion {
    #[serde(rename = "station", default)]
    stations: Vec<RawStation>,
}

#[derive(Debug, Deserialize)]
struct RawStation {
    id: String,
    #[serde(default)]
    name: String,
    area_id: String,
}

/// Decodes the region XML into stations, merging repeated ids so a station
/// serving several areas keeps them in document order.
///
/// # Errors
///
/// Returns [`CatalogError::Decode`] on a malformed document.
pub fn decode_station_topology(xml: &str) -> Result<Vec<Station>, CatalogError> {
    let document: RegionDocument = quick_xml::de::from_str(xml).map_err(CatalogError::Decode)?;

    let mut stations: Vec<Station> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for raw in document.regions.into_iter().flat_map(|r| r.stations) {
        if let Some(&i) = index.get(&raw.id) {
            let station = &mut stations[i];
            if !station.areas.contains(&raw.area_id) {
                station.areas.push(raw.area_id);
            }
            continue;
        }
        index.insert(raw.id.clone(), stations.len());
        stations.push(Station {
            id: raw.id,
            name: raw.name,
            areas: vec![raw.area_id],
        });
    }
    Ok(stations)
}

/// Asks the service which area the caller is in.
///
/// The probe answers with a script fragment such as
/// `document.write('<span class="JP13">TOKYO JAPAN</span>');`.
///
/// # Errors
///
/// Returns [`CatalogError::Fetch`] on transport failure and
/// [`CatalogError::AreaUndetected`] if no area id is present.
#[instrument(skip(client, endpoints))]
pub async fn detect_area_id(
    client: &HttpClient,
    endpoints: &Endpoints,
) -> Result<String, CatalogError> {
    let body = client
        .get_text(&endpoints.area())
        .await
        .map_err(CatalogError::Fetch)?;
    parse_area_probe(&body).ok_or(CatalogError::AreaUndetected)
}

fn parse_area_probe(body: &str) -> Option<String> {
    let (_, rest) = body.split_once("class=\"")?;
    let (id, _) = rest.split_once('"')?;
    (id.starts_with("JP") && id.len() > 2).then(|| id.to_string())
}
