//! Error types for the program catalog.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while fetching or reading a station's program catalog.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The weekly catalog could not be fetched.
    #[error("failed to fetch the {station} program: {source}")]
    Fetch {
        /// Station whose catalog was requested.
        station: String,
        /// Underlying transport error.
        #[source]
        source: DownloadError,
    },

    /// The catalog document is not the expected XML shape.
    #[error("failed to decode the {station} program: {source}")]
    Decode {
        /// Station whose catalog was decoded.
        station: String,
        /// Underlying XML error.
        #[source]
        source: quick_xml::de::DeError,
    },

    /// A start/end timestamp is not a valid catalog timestamp.
    #[error("invalid catalog timestamp '{value}'")]
    InvalidTime {
        /// The offending value.
        value: String,
    },
}

impl ProgramError {
    /// Creates a fetch error for `station`.
    pub fn fetch(station: impl Into<String>, source: DownloadError) -> Self {
        Self::Fetch {
            station: station.into(),
            source,
        }
    }

    /// Creates a decode error for `station`.
    pub fn decode(station: impl Into<String>, source: quick_xml::de::DeError) -> Self {
        Self::Decode {
            station: station.into(),
            source,
        }
    }

    /// Creates an invalid timestamp error.
    pub fn invalid_time(value: impl Into<String>) -> Self {
        Self::InvalidTime {
            value: value.into(),
        }
    }
}
