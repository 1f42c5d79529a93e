//! Output file naming.

use std::path::{Path, PathBuf};

use crate::media::AudioFormat;
use crate::program::time::OUTPUT_TIME_FORMAT;
use crate::program::{Program, ProgramError};

/// Longest title kept in a file name, in bytes.
const MAX_TITLE_BYTES: usize = 200;

/// Where a program's recording goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    dir: PathBuf,
    stem: String,
    format: AudioFormat,
}

impl OutputTarget {
    /// Target for `program` under `dir`:
    /// `<YYYYMMDDhhmm>_<station>_<title>.<ext>`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::InvalidTime`] if the start time is malformed.
    pub fn for_program(
        program: &Program,
        dir: impl Into<PathBuf>,
        format: AudioFormat,
    ) -> Result<Self, ProgramError> {
        let start = program.start_time()?.format(OUTPUT_TIME_FORMAT);
        Ok(Self {
            dir: dir.into(),
            stem: format!(
                "{start}_{}_{}",
                sanitize_component(&program.station_id),
                sanitize_component(&program.title)
            ),
            format,
        })
    }

    /// Directory the file is written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name without extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        &self.stem
    }

    #[must_use]
    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Full path of the recording.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.stem, self.format.extension()))
    }
}

/// Makes `value` safe as part of a file name: path separators, reserved
/// characters and control characters become `_`, runs of `_` collapse, and
/// leading/trailing dots, spaces and underscores are dropped.
pub(crate) fn sanitize_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
            }
            prev_sep = true;
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    let trimmed = out.trim_matches(|c: char| c == '_' || c == '.' || c.is_whitespace());
    truncate_at_char_boundary(trimmed, MAX_TITLE_BYTES).to_string()
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
