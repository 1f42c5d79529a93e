//! YAML configuration, re-read at the start of every cycle.
//!
//! ```yaml
//! area-id: JP13
//! file-format: mp3
//! minimum-output-size: 2
//! rules:
//!   morning-news:
//!     station-id: TBS
//!     title: ニュース
//!     dow: [mon, tue, wed, thu, fri]
//!     window: 48h
//!   anything-by:
//!     pfm: 山崎怜奈
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::download::constants::{
    DEFAULT_MAX_CONCURRENCY, DEFAULT_MINIMUM_OUTPUT_MB, MAX_CONCURRENCY_LIMIT,
};
use crate::endpoints::{DEFAULT_API_BASE, Endpoints};
use crate::media::{Assembler, AudioFormat, ConcatAssembler, FfmpegAssembler};
use crate::rules::{Rule, RuleFields, RuleSet};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

const DEFAULT_OUTPUT_DIR: &str = "downloads";
const DEFAULT_ASSETS_DIR: &str = "assets";
const FULL_KEY_FILE: &str = "fullkey.b64";
const DEFAULT_FFMPEG: &str = "ffmpeg";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// The file as written, before defaults and validation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileConfig {
    area_id: Option<String>,
    #[serde(default)]
    extra_stations: Vec<String>,
    #[serde(default)]
    ignore_stations: Vec<String>,
    file_format: Option<String>,
    minimum_output_size: Option<u64>,
    max_concurrency: Option<usize>,
    output_dir: Option<PathBuf>,
    assets_dir: Option<PathBuf>,
    full_key_file: Option<PathBuf>,
    api_base: Option<String>,
    assembler: Option<String>,
    ffmpeg_path: Option<PathBuf>,
    #[serde(default)]
    rules: BTreeMap<String, FileRule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileRule {
    #[serde(default)]
    station_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    pfm: String,
    #[serde(default)]
    keyword: String,
    #[serde(default)]
    window: String,
    #[serde(default)]
    dow: Vec<String>,
}

impl From<FileRule> for RuleFields {
    fn from(rule: FileRule) -> Self {
        Self {
            station_id: rule.station_id,
            title: rule.title,
            performer: rule.pfm,
            keyword: rule.keyword,
            window: rule.window,
            days: rule.dow,
        }
    }
}

/// How segments are joined into one recording.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssemblerKind {
    /// External `ffmpeg`, supports every output format.
    #[default]
    Ffmpeg,
    /// Byte-wise concatenation, source format only.
    Concat,
}

impl AssemblerKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg),
            "concat" => Ok(Self::Concat),
            other => bail!("Invalid config value for `assembler`: {other}. Expected ffmpeg or concat"),
        }
    }
}

/// Validated configuration with every default applied.
#[derive(Debug, Clone)]
pub struct Config {
    /// Area to record from; detected from the service when absent.
    pub area_id: Option<String>,
    pub extra_stations: Vec<String>,
    pub ignore_stations: Vec<String>,
    pub format: AudioFormat,
    /// Recordings below this size are discarded.
    pub minimum_output_bytes: u64,
    /// Ceiling on in-flight segment downloads.
    pub max_concurrency: usize,
    pub output_dir: PathBuf,
    /// Directory holding `regions.json`, `coordinates.json` and `versions.json`.
    pub assets_dir: PathBuf,
    pub full_key_file: PathBuf,
    pub endpoints: Endpoints,
    pub assembler: AssemblerKind,
    pub ffmpeg_path: PathBuf,
    pub rules: RuleSet,
}

impl Config {
    /// Reads and validates the configuration at `path`.
    ///
    /// # Errors
    ///
    /// Fails if the file can't be read, isn't valid YAML of the expected
    /// shape, or holds an invalid value.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_yaml(&raw)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))
    }

    /// Parses and validates configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Fails on malformed YAML or an invalid value.
    pub fn from_yaml(raw: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(raw).context("Invalid config syntax")?;
        Self::resolve(file)
    }

    fn resolve(file: FileConfig) -> Result<Self> {
        let format = match file.file_format.as_deref() {
            None => AudioFormat::default(),
            Some(value) => value
                .parse::<AudioFormat>()
                .map_err(|e| anyhow::anyhow!("Invalid config value for `file-format`: {e}"))?,
        };

        let minimum_mb = file.minimum_output_size.unwrap_or(DEFAULT_MINIMUM_OUTPUT_MB);
        let Some(minimum_output_bytes) = minimum_mb.checked_mul(BYTES_PER_MB) else {
            bail!("Invalid config value for `minimum-output-size`: {minimum_mb}. Value too large");
        };

        let max_concurrency = file.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if !(1..=MAX_CONCURRENCY_LIMIT).contains(&max_concurrency) {
            bail!(
                "Invalid config value for `max-concurrency`: {max_concurrency}. Expected range: 1..={MAX_CONCURRENCY_LIMIT}"
            );
        }

        let api_base = file.api_base.as_deref().unwrap_or(DEFAULT_API_BASE);
        let endpoints = Endpoints::new(api_base)
            .with_context(|| format!("Invalid config value for `api-base`: {api_base}"))?;

        let assembler = file
            .assembler
            .as_deref()
            .map(AssemblerKind::parse)
            .transpose()?
            .unwrap_or_default();
        if assembler == AssemblerKind::Concat && format != AudioFormat::source() {
            bail!(
                "Invalid config: the concat assembler can't produce `{format}`, use ffmpeg or file-format {}",
                AudioFormat::source()
            );
        }

        if file.rules.is_empty() {
            bail!("Invalid config: no rules defined");
        }
        let mut rules = Vec::with_capacity(file.rules.len());
        for (name, fields) in file.rules {
            let rule = Rule::new(name, fields.into())?;
            if rule.is_catch_all() {
                warn!(rule = %rule.name(), "rule has no station, title, pfm or keyword and matches every program");
            }
            rules.push(rule);
        }

        let area_id = file
            .area_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
        let assets_dir = file
            .assets_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR));
        let full_key_file = file
            .full_key_file
            .unwrap_or_else(|| assets_dir.join(FULL_KEY_FILE));

        let config = Self {
            area_id,
            extra_stations: file.extra_stations,
            ignore_stations: file.ignore_stations,
            format,
            minimum_output_bytes,
            max_concurrency,
            output_dir: file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            assets_dir,
            full_key_file,
            endpoints,
            assembler,
            ffmpeg_path: file
                .ffmpeg_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_FFMPEG)),
            rules: RuleSet::new(rules),
        };
        debug!(
            area = ?config.area_id,
            format = %config.format,
            rules = config.rules.len(),
            max_concurrency = config.max_concurrency,
            "configuration loaded"
        );
        Ok(config)
    }

    /// The configured assembler implementation.
    #[must_use]
    pub fn build_assembler(&self) -> Arc<dyn Assembler> {
        match self.assembler {
            AssemblerKind::Ffmpeg => Arc::new(FfmpegAssembler::new(&self.ffmpeg_path)),
            AssemblerKind::Concat => Arc::new(ConcatAssembler),
        }
    }
}
