//! Byte-level concatenation.
//!
//! ADTS AAC is a sequence of self-delimiting frames, so appending segment
//! files yields a playable stream without any codec work. Transcoding is not
//! available.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::{Assembler, AudioFormat, MediaError};

/// Assembler that appends segment bytes in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatAssembler;

#[async_trait]
impl Assembler for ConcatAssembler {
    async fn concatenate(
        &self,
        scratch_dir: &Path,
        segments: &[PathBuf],
    ) -> Result<PathBuf, MediaError> {
        if segments.is_empty() {
            return Err(MediaError::NoSegments);
        }
        let joined = scratch_dir.join(format!("joined.{}", AudioFormat::source().extension()));
        let file = File::create(&joined)
            .await
            .map_err(|e| MediaError::io(&joined, e))?;
        let mut writer = BufWriter::new(file);
        for segment in segments {
            let bytes = tokio::fs::read(segment)
                .await
                .map_err(|e| MediaError::io(segment, e))?;
            writer
                .write_all(&bytes)
                .await
                .map_err(|e| MediaError::io(&joined, e))?;
        }
        writer.flush().await.map_err(|e| MediaError::io(&joined, e))?;
        debug!(segments = segments.len(), path = %joined.display(), "segments concatenated");
        Ok(joined)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), MediaError> {
        if format != AudioFormat::source() {
            return Err(MediaError::UnsupportedFormat {
                assembler: "concat",
                format: format.to_string(),
            });
        }
        tokio::fs::copy(input, output)
            .await
            .map_err(|e| MediaError::io(output, e))?;
        Ok(())
    }
}
