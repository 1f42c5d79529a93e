//! Error types for the authentication handshake.

use thiserror::Error;

use crate::download::DownloadError;

/// Errors that can occur while authorizing a session.
///
/// None of these are retried inside the handshake; the owning program
/// download is aborted and the next scheduler cycle tries again.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A handshake request failed in transport or was refused.
    #[error("{step} failed: {source}")]
    Handshake {
        /// `auth1` or `auth2`.
        step: &'static str,
        /// Underlying transport error.
        #[source]
        source: DownloadError,
    },

    /// A response header required by the handshake is absent.
    #[error("{step} response is missing the {header} header")]
    MissingHeader {
        /// Handshake step.
        step: &'static str,
        /// Header name.
        header: &'static str,
    },

    /// A numeric response header could not be parsed.
    #[error("invalid {header} header value '{value}'")]
    MalformedHeader {
        /// Header name.
        header: &'static str,
        /// Raw value.
        value: String,
    },

    /// A value can't be sent as an HTTP header.
    #[error("value for {header} is not a valid header value")]
    InvalidHeaderValue {
        /// Header name.
        header: &'static str,
    },

    /// The full key is not valid base64.
    #[error("full key is not valid base64: {0}")]
    KeyDecode(#[from] base64::DecodeError),

    /// The offset/length window falls outside the full key.
    #[error("key window {offset}+{length} exceeds the {key_len}-byte full key")]
    KeyWindow {
        /// Byte offset requested by the server.
        offset: usize,
        /// Byte length requested by the server.
        length: usize,
        /// Decoded full key length.
        key_len: usize,
    },

    /// The area has no reference coordinate.
    #[error("no coordinate known for area {0}")]
    UnknownArea(String),

    /// A version pool in the reference catalog is empty.
    #[error("the {0} version pool is empty")]
    EmptyPool(&'static str),
}

impl AuthError {
    /// Creates a handshake error for `step`.
    pub fn handshake(step: &'static str, source: DownloadError) -> Self {
        Self::Handshake { step, source }
    }

    /// Creates a malformed header error.
    pub fn malformed_header(header: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedHeader {
            header,
            value: value.into(),
        }
    }
}
