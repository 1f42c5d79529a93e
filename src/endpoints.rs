//! URLs of the remote service.
//!
//! All endpoints hang off one configurable base so tests can point the whole
//! recorder at a mock server.

use url::Url;

use crate::download::constants::PLAYLIST_PAGE_SIZE;

/// Default service base.
pub const DEFAULT_API_BASE: &str = "https://radiko.jp";

/// Endpoint builder rooted at the service base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    base: Url,
}

impl Default for Endpoints {
    /// Endpoints rooted at [`DEFAULT_API_BASE`].
    ///
    /// # Panics
    ///
    /// Panics if [`DEFAULT_API_BASE`] is not an absolute URL.
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE).expect("default API base is a static absolute URL")
    }
}

impl Endpoints {
    /// Creates endpoints rooted at `base` (scheme + host, any path is replaced).
    ///
    /// # Errors
    ///
    /// Returns the parse error if `base` is not an absolute URL.
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base: Url::parse(base)?,
        })
    }

    fn at(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path(path);
        url.set_query(None);
        url
    }

    /// Token issuance (first handshake step).
    #[must_use]
    pub fn auth1(&self) -> String {
        self.at("/v2/api/auth1").into()
    }

    /// Token authorization (second handshake step).
    #[must_use]
    pub fn auth2(&self) -> String {
        self.at("/v2/api/auth2").into()
    }

    /// Timeshift master playlist for one program.
    #[must_use]
    pub fn timeshift_playlist(&self, station_id: &str, start: &str, end: &str) -> String {
        let mut url = self.at("/v2/api/ts/playlist.m3u8");
        url.query_pairs_mut()
            .append_pair("station_id", station_id)
            .append_pair("ft", start)
            .append_pair("to", end)
            .append_pair("l", PLAYLIST_PAGE_SIZE);
        url.into()
    }

    /// Weekly program catalog for one station.
    #[must_use]
    pub fn weekly_programs(&self, station_id: &str) -> String {
        self.at(&format!("/v3/program/station/weekly/{station_id}.xml"))
            .into()
    }

    /// Full region → station topology.
    #[must_use]
    pub fn region_full(&self) -> String {
        self.at("/v3/station/region/full.xml").into()
    }

    /// Area probe used to detect the caller's area.
    #[must_use]
    pub fn area(&self) -> String {
        self.at("/area").into()
    }
}
