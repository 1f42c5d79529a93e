//! Metadata tagging of finished recordings.

use std::path::Path;

use async_trait::async_trait;
use lofty::config::WriteOptions;
use lofty::id3::v2::Id3v2Tag;
use lofty::prelude::*;

use super::MediaError;
use crate::program::Program;

/// Tag values written to a recording.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub year: Option<u32>,
    pub comment: String,
}

impl TrackTags {
    /// Tags for `program` saved as a file named `file_stem`.
    ///
    /// The track title is the file stem; the program title becomes the album.
    #[must_use]
    pub fn for_program(program: &Program, file_stem: &str) -> Self {
        Self {
            title: file_stem.to_string(),
            artist: program.performer.clone(),
            album: program.title.clone(),
            year: program.start.get(..4).and_then(|y| y.parse().ok()),
            comment: program.info.clone(),
        }
    }
}

/// Writes [`TrackTags`] into an audio file.
#[async_trait]
pub trait TagWriter: Send + Sync {
    async fn write_tags(&self, path: &Path, tags: &TrackTags) -> Result<(), MediaError>;
}

/// Writes an ID3v2 tag with lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagWriter;

fn id3v2(tags: &TrackTags) -> Id3v2Tag {
    let mut tag = Id3v2Tag::new();
    tag.set_title(tags.title.clone());
    if !tags.artist.is_empty() {
        tag.set_artist(tags.artist.clone());
    }
    if !tags.album.is_empty() {
        tag.set_album(tags.album.clone());
    }
    if let Some(year) = tags.year {
        tag.set_year(year);
    }
    if !tags.comment.is_empty() {
        tag.set_comment(tags.comment.clone());
    }
    tag
}

#[async_trait]
impl TagWriter for LoftyTagWriter {
    async fn write_tags(&self, path: &Path, tags: &TrackTags) -> Result<(), MediaError> {
        let tag = id3v2(tags);
        let owned = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            tag.save_to_path(&owned, WriteOptions::default())
                .map_err(|source| MediaError::Tag {
                    path: owned.clone(),
                    source,
                })
        })
        .await?
    }
}
