//! Error types for reference data loading.

use std::path::PathBuf;

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while loading the reference catalog.
///
/// Any of these abandons the current scheduler cycle.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A reference file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the file.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A reference JSON file is malformed.
    #[error("failed to parse {path}: {source}")]
    Json {
        /// Path of the file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The station topology could not be fetched.
    #[error("failed to fetch the station list: {0}")]
    Fetch(#[source] DownloadError),

    /// The station topology document is malformed.
    #[error("failed to decode the station list: {0}")]
    Decode(#[source] quick_xml::de::DeError),

    /// A coordinate entry doesn't hold exactly `[lat, lng]`.
    #[error("coordinate for {area} must be [lat, lng], got {len} values")]
    Coordinate {
        /// Area display name.
        area: String,
        /// Number of values found.
        len: usize,
    },

    /// The area probe response has no recognisable area id.
    #[error("could not detect the current area from the area probe")]
    AreaUndetected,
}

impl CatalogError {
    /// Creates a read error for `path`.
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// Creates a JSON error for `path`.
    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }
}
