//! Segment assembly, transcoding and tagging.
//!
//! Both concerns sit behind traits so the recorder can be driven with the
//! external `ffmpeg` binary in production and a pure byte concatenation in
//! environments without it.

mod concat;
mod error;
mod ffmpeg;
mod tags;

pub use concat::ConcatAssembler;
pub use error::MediaError;
pub use ffmpeg::FfmpegAssembler;
pub use tags::{LoftyTagWriter, TagWriter, TrackTags};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

/// Output audio format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// ADTS AAC, the format segments are delivered in.
    #[default]
    Aac,
    Mp3,
}

impl AudioFormat {
    /// File extension without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
        }
    }

    /// Format the segments arrive in.
    #[must_use]
    pub fn source() -> Self {
        Self::Aac
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aac" => Ok(Self::Aac),
            "mp3" => Ok(Self::Mp3),
            other => Err(format!("unsupported file format '{other}' (expected aac or mp3)")),
        }
    }
}

/// Joins downloaded segments and converts the result.
#[async_trait]
pub trait Assembler: Send + Sync {
    /// Concatenates `segments` in the given order into one file inside
    /// `scratch_dir`, in the source format, and returns its path.
    async fn concatenate(&self, scratch_dir: &Path, segments: &[PathBuf])
    -> Result<PathBuf, MediaError>;

    /// Converts `input` into `output` encoded as `format`.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), MediaError>;
}
