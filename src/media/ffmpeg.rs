//! Assembly through the external `ffmpeg` binary.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{Assembler, AudioFormat, MediaError};

const STDERR_TAIL_LINES: usize = 5;

/// Drives `ffmpeg`: concat demuxer with stream copy, then an optional
/// `libmp3lame` transcode.
#[derive(Debug, Clone)]
pub struct FfmpegAssembler {
    binary: PathBuf,
}

impl Default for FfmpegAssembler {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegAssembler {
    /// Uses the `ffmpeg` at `binary` (a bare name is looked up on `PATH`).
    #[must_use]
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), MediaError> {
        let program = self.binary.display().to_string();
        debug!(%program, ?args, "running ffmpeg");
        let output = Command::new(&self.binary)
            .args(&args)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                program: program.clone(),
                source,
            })?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
        let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
        Err(MediaError::ToolFailed {
            program,
            code: output.status.code().unwrap_or(-1),
            stderr: tail,
        })
    }
}

/// One `file '<path>'` line per segment, with single quotes escaped the way
/// the concat demuxer expects.
fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| {
            let escaped = p.display().to_string().replace('\'', r"'\''");
            format!("file '{escaped}'\n")
        })
        .collect()
}

fn codec_args(format: AudioFormat) -> [&'static str; 2] {
    match format {
        AudioFormat::Aac => ["-c", "copy"],
        AudioFormat::Mp3 => ["-c:a", "libmp3lame"],
    }
}

#[async_trait]
impl Assembler for FfmpegAssembler {
    async fn concatenate(
        &self,
        scratch_dir: &Path,
        segments: &[PathBuf],
    ) -> Result<PathBuf, MediaError> {
        if segments.is_empty() {
            return Err(MediaError::NoSegments);
        }
        let list = scratch_dir.join("segments.txt");
        tokio::fs::write(&list, concat_list(segments))
            .await
            .map_err(|e| MediaError::io(&list, e))?;

        let joined = scratch_dir.join(format!("joined.{}", AudioFormat::source().extension()));
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.extend(["-f", "concat", "-safe", "0", "-i"].map(OsString::from));
        args.push(list.into_os_string());
        args.extend(codec_args(AudioFormat::source()).map(OsString::from));
        args.push(joined.clone().into_os_string());
        self.run(args).await?;
        Ok(joined)
    }

    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        format: AudioFormat,
    ) -> Result<(), MediaError> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_owned());
        args.extend(codec_args(format).map(OsString::from));
        args.push(output.as_os_str().to_owned());
        self.run(args).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a/00000.aac"), PathBuf::from("/tmp/it's/00001.aac")]);
        assert_eq!(
            list,
            "file '/tmp/a/00000.aac'\nfile '/tmp/it'\\''s/00001.aac'\n"
        );
    }

    #[test]
    fn test_codec_args() {
        assert_eq!(codec_args(AudioFormat::Aac), ["-c", "copy"]);
        assert_eq!(codec_args(AudioFormat::Mp3), ["-c:a", "libmp3lame"]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let segment = dir.path().join("00000.aac");
        tokio::fs::write(&segment, b"x").await.unwrap();
        let err = FfmpegAssembler::new(dir.path().join("no-such-ffmpeg"))
            .concatenate(dir.path(), &[segment])
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Spawn { .. }));
    }
}
