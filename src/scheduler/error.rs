//! Error types for scheduler cycles.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::CATALOG_RETRY_DELAY;
use crate::catalog::CatalogError;

/// Errors that end a cycle before any station is checked.
///
/// Per-station, per-program and per-segment failures never surface here;
/// they are logged and counted in the cycle report.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configuration file is missing or invalid.
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),

    /// The output root can't be created.
    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        /// Configured output root.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The shared secret can't be read.
    #[error("cannot read full key {path}: {source}")]
    FullKey {
        /// Configured key file.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reference files or station topology failed to load.
    #[error("failed to load the reference catalog: {0}")]
    Catalog(#[source] CatalogError),

    /// No area configured and the probe failed.
    #[error("failed to detect the area id: {0}")]
    AreaDetection(#[source] CatalogError),
}

impl SchedulerError {
    /// How long to wait before the next attempt, or `None` if the loop must
    /// stop.
    #[must_use]
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::Catalog(_) | Self::AreaDetection(_) => Some(CATALOG_RETRY_DELAY),
            Self::Config(_) | Self::OutputDir { .. } | Self::FullKey { .. } => None,
        }
    }
}
