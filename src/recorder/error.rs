//! Error types for program recording.

use std::path::PathBuf;

use thiserror::Error;

use crate::auth::AuthError;
use crate::download::DownloadError;
use crate::media::MediaError;
use crate::playlist::PlaylistError;
use crate::program::ProgramError;

/// Errors that abort one program's recording.
///
/// Other programs and the scheduler loop are unaffected.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Start or end time is malformed.
    #[error(transparent)]
    Program(#[from] ProgramError),

    /// The station isn't in the topology, so no area can be authorized.
    #[error("no area known for station {0}")]
    UnknownStation(String),

    /// Authorization failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Playlist resolution failed.
    #[error(transparent)]
    Playlist(#[from] PlaylistError),

    /// A segment failed on every attempt.
    #[error("segment {index} failed after {attempts} attempts: {source}")]
    Segment {
        /// Position in the playlist.
        index: usize,
        /// Attempts made.
        attempts: u32,
        /// Last error.
        #[source]
        source: DownloadError,
    },

    /// The segment admission pool was closed.
    #[error("segment admission pool closed")]
    PoolClosed,

    /// A segment task panicked or was cancelled.
    #[error("segment task failed: {0}")]
    Task(#[source] tokio::task::JoinError),

    /// Assembly or transcoding failed.
    #[error(transparent)]
    Media(#[from] MediaError),

    /// Filesystem failure around the output file.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RecordError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
