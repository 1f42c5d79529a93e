//! Timeshift playlist resolution.
//!
//! A program's audio is published as a two-level HLS manifest: the timeshift
//! endpoint answers with a master playlist naming one variant, and that
//! variant's media playlist lists the AAC segments in assembly order.

mod error;

pub use error::PlaylistError;

use m3u8_rs::{Playlist, parse_playlist_res};
use tracing::{debug, instrument};
use url::Url;

use crate::auth::Session;
use crate::download::{HttpClient, read_text};
use crate::endpoints::Endpoints;
use crate::program::Program;

/// Extracts the single variant URI of a master playlist, resolved against
/// `url`.
///
/// # Errors
///
/// Returns [`PlaylistError::VariantCount`] unless there is exactly one
/// variant, and [`PlaylistError::WrongKind`] for a media playlist.
pub fn parse_master(url: &Url, body: &[u8]) -> Result<Url, PlaylistError> {
    match parse_playlist_res(body) {
        Ok(Playlist::MasterPlaylist(master)) => {
            let [variant] = master.variants.as_slice() else {
                return Err(PlaylistError::VariantCount {
                    url: url.to_string(),
                    count: master.variants.len(),
                });
            };
            resolve(url, &variant.uri)
        }
        // A document with no variant tags parses as a media playlist.
        Ok(Playlist::MediaPlaylist(media)) if media.segments.is_empty() => {
            Err(PlaylistError::VariantCount {
                url: url.to_string(),
                count: 0,
            })
        }
        Ok(Playlist::MediaPlaylist(_)) => Err(PlaylistError::wrong_kind(url.as_str(), "master")),
        Err(e) => Err(PlaylistError::malformed(url.as_str(), e.to_string())),
    }
}

/// Lists the segment URIs of a media playlist in playlist order, resolved
/// against `url`.
///
/// # Errors
///
/// Returns [`PlaylistError`] for a master playlist, an unparsable document,
/// an unresolvable URI or an empty segment list.
pub fn parse_media(url: &Url, body: &[u8]) -> Result<Vec<Url>, PlaylistError> {
    match parse_playlist_res(body) {
        Ok(Playlist::MediaPlaylist(media)) => {
            if media.segments.is_empty() {
                return Err(PlaylistError::Empty {
                    url: url.to_string(),
                });
            }
            media
                .segments
                .iter()
                .map(|segment| resolve(url, &segment.uri))
                .collect()
        }
        Ok(Playlist::MasterPlaylist(_)) => Err(PlaylistError::wrong_kind(url.as_str(), "media")),
        Err(e) => Err(PlaylistError::malformed(url.as_str(), e.to_string())),
    }
}

fn resolve(base: &Url, uri: &str) -> Result<Url, PlaylistError> {
    base.join(uri.trim()).map_err(|source| PlaylistError::InvalidUri {
        uri: uri.to_string(),
        source,
    })
}

/// Resolves the ordered segment list of `program` under `session`.
///
/// # Errors
///
/// Returns [`PlaylistError`] on transport or format failures. Nothing is
/// retried.
#[instrument(skip(client, endpoints, session, program), fields(station = %program.station_id, start = %program.start))]
pub async fn resolve_segments(
    client: &HttpClient,
    endpoints: &Endpoints,
    session: &Session,
    program: &Program,
) -> Result<Vec<Url>, PlaylistError> {
    let master_url = endpoints.timeshift_playlist(&program.station_id, &program.start, &program.end);
    let response = client
        .post(&master_url, session.request_headers()?)
        .await
        .map_err(PlaylistError::Fetch)?;
    let body = read_text(&master_url, response)
        .await
        .map_err(PlaylistError::Fetch)?;
    let master_url =
        Url::parse(&master_url).map_err(|e| PlaylistError::malformed(&master_url, e.to_string()))?;
    let media_url = parse_master(&master_url, body.as_bytes())?;
    debug!(media = %media_url, "resolved media playlist");

    let response = client
        .get(media_url.as_str(), session.request_headers()?)
        .await
        .map_err(PlaylistError::Fetch)?;
    let body = read_text(media_url.as_str(), response)
        .await
        .map_err(PlaylistError::Fetch)?;
    let segments = parse_media(&media_url, body.as_bytes())?;
    debug!(segments = segments.len(), "resolved segment list");
    Ok(segments)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MASTER: &str = include_str!("../../tests/fixtures/master.m3u8");
    const MEDIA: &str = include_str!("../../tests/fixtures/chunklist.m3u8");

    fn base() -> Url {
        Url::parse("https://radiko.jp/v2/api/ts/playlist.m3u8?station_id=FMT").unwrap()
    }

    #[test]
    fn test_master_with_one_variant() {
        let url = parse_master(&base(), MASTER.as_bytes()).unwrap();
        assert_eq!(
            url.as_str(),
            "https://radiko.jp/v2/api/ts/chunklist/NejwZpMj.m3u8"
        );
    }

    #[test]
    fn test_master_with_relative_variant() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=52973,CODECS=\"mp4a.40.5\"\nchunklist/abc.m3u8\n";
        let url = parse_master(&base(), body.as_bytes()).unwrap();
        assert_eq!(url.as_str(), "https://radiko.jp/v2/api/ts/chunklist/abc.m3u8");
    }

    #[test]
    fn test_master_with_two_variants() {
        let body = "#EXTM3U\n\
            #EXT-X-STREAM-INF:BANDWIDTH=52973\n/a.m3u8\n\
            #EXT-X-STREAM-INF:BANDWIDTH=96000\n/b.m3u8\n";
        let err = parse_master(&base(), body.as_bytes()).unwrap_err();
        assert!(matches!(err, PlaylistError::VariantCount { count: 2, .. }));
    }

    #[test]
    fn test_master_with_no_variant() {
        let err = parse_master(&base(), b"#EXTM3U\n#EXT-X-VERSION:6\n").unwrap_err();
        assert!(matches!(
            err,
            PlaylistError::VariantCount { count: 0, .. } | PlaylistError::Malformed { .. }
        ));
    }

    #[test]
    fn test_media_instead_of_master() {
        let err = parse_master(&base(), MEDIA.as_bytes()).unwrap_err();
        assert!(matches!(err, PlaylistError::WrongKind { expected: "master", .. }));
    }

    #[test]
    fn test_media_segments_keep_order() {
        let url = Url::parse("https://radiko.jp/v2/api/ts/chunklist/NejwZpMj.m3u8").unwrap();
        let segments = parse_media(&url, MEDIA.as_bytes()).unwrap();
        let names: Vec<_> = segments
            .iter()
            .map(|u| u.path_segments().unwrap().next_back().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            [
                "20230605_130000_Aa1.aac",
                "20230605_130005_Bb2.aac",
                "20230605_130010_Cc3.aac",
            ]
        );
        assert_eq!(segments[0].host_str(), Some("media.radiko.jp"));
    }

    #[test]
    fn test_media_with_no_segments() {
        let url = base();
        let err =
            parse_media(&url, b"#EXTM3U\n#EXT-X-TARGETDURATION:5\n#EXT-X-ENDLIST\n").unwrap_err();
        assert!(matches!(err, PlaylistError::Empty { .. }));
    }

    #[test]
    fn test_master_instead_of_media() {
        let err = parse_media(&base(), MASTER.as_bytes()).unwrap_err();
        assert!(matches!(err, PlaylistError::WrongKind { expected: "media", .. }));
    }
}
