//! Error types for playlist resolution.

use thiserror::Error;

use crate::auth::AuthError;
use crate::download::DownloadError;

/// Errors that can occur while resolving a program's segment list.
#[derive(Debug, Error)]
pub enum PlaylistError {
    /// Session headers could not be built.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A playlist could not be fetched.
    #[error("failed to fetch playlist: {0}")]
    Fetch(#[source] DownloadError),

    /// A playlist document is not valid M3U8.
    #[error("malformed playlist at {url}: {message}")]
    Malformed {
        /// Playlist URL.
        url: String,
        /// Parser message.
        message: String,
    },

    /// The master playlist doesn't name exactly one variant.
    #[error("master playlist at {url} has {count} variants, expected exactly 1")]
    VariantCount {
        /// Playlist URL.
        url: String,
        /// Variants found.
        count: usize,
    },

    /// A master playlist was expected but a media playlist came back, or the
    /// other way around.
    #[error("expected a {expected} playlist at {url}")]
    WrongKind {
        /// Playlist URL.
        url: String,
        /// `master` or `media`.
        expected: &'static str,
    },

    /// A URI in the playlist can't be resolved.
    #[error("invalid URI '{uri}' in playlist: {source}")]
    InvalidUri {
        /// The URI as written.
        uri: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },

    /// The media playlist lists no segments.
    #[error("media playlist at {url} has no segments")]
    Empty {
        /// Playlist URL.
        url: String,
    },
}

impl PlaylistError {
    /// Creates a malformed playlist error.
    pub fn malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a wrong kind error.
    pub fn wrong_kind(url: impl Into<String>, expected: &'static str) -> Self {
        Self::WrongKind {
            url: url.into(),
            expected,
        }
    }
}
