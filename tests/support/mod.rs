//! Shared helpers for integration tests: a scratch workspace holding the
//! reference assets and a config file, and wiremock mounts for every service
//! endpoint the recorder talks to.

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Token handed out by the mocked `auth1`.
pub const TOKEN: &str = "token-0123456789abcdef";

/// Partial key of `fixtures/assets/fullkey.b64` at offset 128, length 16.
pub const PARTIAL_KEY: &str = "i7DV+h9EaY6z2P0iR2yRtg==";

/// Directory of the checked-in fixtures.
#[must_use]
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[must_use]
pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixtures_dir().join(name)).expect("fixture should be readable")
}

/// Temporary working directory with `assets/` copied from the fixtures.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    #[must_use]
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).expect("failed to create assets dir");
        for name in ["regions.json", "coordinates.json", "versions.json", "fullkey.b64"] {
            std::fs::copy(fixtures_dir().join("assets").join(name), assets.join(name))
                .expect("failed to copy asset");
        }
        Self { dir }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn assets_dir(&self) -> PathBuf {
        self.dir.path().join("assets")
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    #[must_use]
    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config.yml")
    }

    /// Writes a config pointing at `server` with the concat assembler; `extra`
    /// is appended verbatim (rules, area, sizes).
    pub fn write_config(&self, server: &MockServer, extra: &str) -> PathBuf {
        let config = format!(
            "api-base: '{}'\nassets-dir: '{}'\noutput-dir: '{}'\nassembler: concat\n{extra}",
            server.uri(),
            self.assets_dir().display(),
            self.output_dir().display(),
        );
        let path = self.config_path();
        std::fs::write(&path, config).expect("failed to write config");
        path
    }

    /// Files directly under the output directory, sorted.
    #[must_use]
    pub fn output_entries(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(self.output_dir()) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .map(|e| e.expect("dir entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// One catalog entry served by [`mount_weekly`].
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    pub ft: &'a str,
    pub to: &'a str,
    pub title: &'a str,
    pub pfm: &'a str,
}

impl<'a> Entry<'a> {
    #[must_use]
    pub fn new(ft: &'a str, to: &'a str, title: &'a str) -> Self {
        Self {
            ft,
            to,
            title,
            pfm: "",
        }
    }

    #[must_use]
    pub fn with_pfm(mut self, pfm: &'a str) -> Self {
        self.pfm = pfm;
        self
    }
}

/// Weekly catalog document for `station` with every entry in one day block.
#[must_use]
pub fn weekly_xml(station: &str, entries: &[Entry<'_>]) -> String {
    let mut progs = String::new();
    for entry in entries {
        write!(
            progs,
            "        <prog ft=\"{}\" to=\"{}\">\n          <title>{}</title>\n          <pfm>{}</pfm>\n          <info>info of {}</info>\n        </prog>\n",
            entry.ft, entry.to, entry.title, entry.pfm, entry.title
        )
        .expect("write to string");
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<radiko>\n  <stations>\n    <station id=\"{station}\">\n      <name>{station}</name>\n      <progs>\n        <date>20230625</date>\n{progs}      </progs>\n    </station>\n  </stations>\n</radiko>\n"
    )
}

/// Serves the station topology fixture.
pub async fn mount_region_full(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v3/station/region/full.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture("region-full.xml")))
        .mount(server)
        .await;
}

/// Serves both handshake steps for `area`; `auth2` only answers when the
/// token, partial key and area match.
pub async fn mount_auth(server: &MockServer, area: &str) {
    Mock::given(method("GET"))
        .and(path("/v2/api/auth1"))
        .and(header("x-radiko-app", "aSmartPhone7a"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-radiko-authtoken", TOKEN)
                .insert_header("x-radiko-keyoffset", "128")
                .insert_header("x-radiko-keylength", "16"),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/api/auth2"))
        .and(header("x-radiko-authtoken", TOKEN))
        .and(header("x-radiko-partialkey", PARTIAL_KEY))
        .and(header("x-radiko-areaid", area))
        .and(header("x-radiko-connection", "wifi"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("{area},TOKYO,tokyo Japan")))
        .mount(server)
        .await;
}

/// Serves the weekly catalog of `station`.
pub async fn mount_weekly(server: &MockServer, station: &str, entries: &[Entry<'_>]) {
    Mock::given(method("GET"))
        .and(path(format!("/v3/program/station/weekly/{station}.xml")))
        .respond_with(ResponseTemplate::new(200).set_body_string(weekly_xml(station, entries)))
        .mount(server)
        .await;
}

/// Path of segment `index` of the program starting at `ft`.
#[must_use]
pub fn segment_path(station: &str, ft: &str, index: usize) -> String {
    format!("/sound/{station}/{ft}/{index:03}.aac")
}

/// Serves the master and media playlists of the program starting at `ft`
/// with `count` segments. Segments themselves are not mounted.
pub async fn mount_playlists(server: &MockServer, station: &str, ft: &str, count: usize) {
    let chunklist = format!("/v2/api/ts/chunklist/{station}_{ft}.m3u8");
    let master = format!(
        "#EXTM3U\n#EXT-X-VERSION:6\n#EXT-X-STREAM-INF:BANDWIDTH=52973,CODECS=\"mp4a.40.5\"\n{chunklist}\n"
    );
    Mock::given(method("POST"))
        .and(path("/v2/api/ts/playlist.m3u8"))
        .and(query_param("station_id", station))
        .and(query_param("ft", ft))
        .and(query_param("l", "15"))
        .and(header("x-radiko-authtoken", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(master))
        .mount(server)
        .await;

    let mut media =
        String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:5\n#EXT-X-MEDIA-SEQUENCE:1\n");
    for index in 0..count {
        writeln!(media, "#EXTINF:5,\n{}", segment_path(station, ft, index)).expect("write to string");
    }
    media.push_str("#EXT-X-ENDLIST\n");
    Mock::given(method("GET"))
        .and(path(chunklist))
        .and(header("x-radiko-authtoken", TOKEN))
        .respond_with(ResponseTemplate::new(200).set_body_string(media))
        .mount(server)
        .await;
}

/// Serves playlists plus one segment per body.
pub async fn mount_recording(server: &MockServer, station: &str, ft: &str, bodies: &[&[u8]]) {
    mount_playlists(server, station, ft, bodies.len()).await;
    for (index, body) in bodies.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(segment_path(station, ft, index)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }
}
