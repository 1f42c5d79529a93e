//! Error types for assembly and tagging.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while assembling, transcoding or tagging audio.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Filesystem failure.
    #[error("IO error at {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The external tool could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Binary that was invoked.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The external tool exited unsuccessfully.
    #[error("{program} exited with status {code}: {stderr}")]
    ToolFailed {
        /// Binary that was invoked.
        program: String,
        /// Exit code, `-1` if killed by a signal.
        code: i32,
        /// Last lines of its error output.
        stderr: String,
    },

    /// The assembler can't produce the requested format.
    #[error("{assembler} assembler cannot transcode to {format}")]
    UnsupportedFormat {
        /// Assembler name.
        assembler: &'static str,
        /// Requested format.
        format: String,
    },

    /// Nothing to assemble.
    #[error("no segments to assemble")]
    NoSegments,

    /// Tag reading or writing failed.
    #[error("failed to tag {path}: {source}")]
    Tag {
        /// Tagged file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: lofty::error::LoftyError,
    },

    /// A blocking worker panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl MediaError {
    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
