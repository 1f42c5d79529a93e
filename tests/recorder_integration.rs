//! Integration tests for program recording against a mocked service.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::TimeZone;
use timeshift_core::download::{HttpClient, RetryPolicy};
use timeshift_core::media::{ConcatAssembler, MediaError, TagWriter, TrackTags};
use timeshift_core::program::CATALOG_TZ;
use timeshift_core::{
    Authenticator, AudioFormat, CycleContext, Dispatch, Endpoints, LedgerEntry, Program,
    RecordOutcome, Recorder, RecorderSettings, ReferenceCatalog,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

mod support;

use support::{Workspace, fixtures_dir, mount_auth, mount_playlists, mount_recording, mount_region_full, segment_path};

const START: &str = "20230625050000";
const END: &str = "20230625055500";

/// Captures tags instead of writing them.
#[derive(Debug, Default)]
struct CapturingTagWriter {
    written: Mutex<Vec<(PathBuf, TrackTags)>>,
}

#[async_trait]
impl TagWriter for CapturingTagWriter {
    async fn write_tags(&self, path: &Path, tags: &TrackTags) -> Result<(), MediaError> {
        self.written
            .lock()
            .unwrap()
            .push((path.to_path_buf(), tags.clone()));
        Ok(())
    }
}

struct Harness {
    server: MockServer,
    workspace: Workspace,
    recorder: Recorder,
    tagger: Arc<CapturingTagWriter>,
    slots: Arc<Semaphore>,
}

async fn harness(minimum_output_bytes: u64) -> Harness {
    let server = MockServer::start().await;
    mount_region_full(&server).await;
    mount_auth(&server, "JP13").await;

    let workspace = Workspace::new();
    let client = HttpClient::new();
    let endpoints = Endpoints::new(&server.uri()).unwrap();
    let catalog = Arc::new(
        ReferenceCatalog::load(&fixtures_dir().join("assets"), &client, &endpoints)
            .await
            .expect("catalog should load"),
    );
    let full_key = std::fs::read_to_string(fixtures_dir().join("assets/fullkey.b64")).unwrap();
    let auth = Arc::new(Authenticator::new(
        client.clone(),
        endpoints.clone(),
        Arc::clone(&catalog),
        full_key.trim(),
    ));
    let slots = Arc::new(Semaphore::new(2));
    let tagger = Arc::new(CapturingTagWriter::default());
    let recorder = Recorder::new(
        client,
        endpoints,
        catalog,
        auth,
        Arc::clone(&slots),
        RecorderSettings {
            output_dir: workspace.output_dir(),
            format: AudioFormat::Aac,
            minimum_output_bytes,
            retry_policy: RetryPolicy::immediate(3),
        },
    )
    .with_assembler(Arc::new(ConcatAssembler))
    .with_tag_writer(tagger.clone());

    Harness {
        server,
        workspace,
        recorder,
        tagger,
        slots,
    }
}

fn program(station: &str, start: &str, end: &str, title: &str) -> Program {
    Program {
        station_id: station.to_string(),
        start: start.to_string(),
        end: end.to_string(),
        title: title.to_string(),
        performer: "山崎怜奈".to_string(),
        info: "メッセージ募集中".to_string(),
        ..Program::default()
    }
}

fn context() -> Arc<CycleContext> {
    Arc::new(CycleContext::new(
        CATALOG_TZ.with_ymd_and_hms(2023, 6, 25, 6, 0, 0).unwrap(),
    ))
}

async fn drain(tasks: &mut JoinSet<RecordOutcome>) -> Vec<RecordOutcome> {
    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        outcomes.push(joined.expect("recording task should not panic"));
    }
    outcomes
}

#[tokio::test]
async fn test_program_is_recorded_once_and_tagged() {
    let h = harness(0).await;
    mount_recording(&h.server, "FMT", START, &[b"AAA", b"BBB", b"CCC"]).await;

    let ctx = context();
    let mut tasks = JoinSet::new();
    let p = program("FMT", START, END, "Title");

    assert_eq!(h.recorder.dispatch(&ctx, p.clone(), &mut tasks), Dispatch::Spawned);
    assert_eq!(h.recorder.dispatch(&ctx, p.clone(), &mut tasks), Dispatch::Duplicate);
    assert!(ctx.ledger().contains(&LedgerEntry::for_program(&p)));
    assert_eq!(ctx.ledger().len(), 1);

    let outcomes = drain(&mut tasks).await;
    let expected = h.workspace.output_dir().join("202306250500_FMT_Title.aac");
    assert_eq!(outcomes, [RecordOutcome::Saved(expected.clone())]);
    assert_eq!(std::fs::read(&expected).unwrap(), b"AAABBBCCC");
    assert_eq!(h.workspace.output_entries(), ["202306250500_FMT_Title.aac"]);

    let written = h.tagger.written.lock().unwrap();
    assert_eq!(written.len(), 1);
    let (path, tags) = &written[0];
    assert_eq!(path, &expected);
    assert_eq!(tags.title, "202306250500_FMT_Title");
    assert_eq!(tags.artist, "山崎怜奈");
    assert_eq!(tags.album, "Title");
    assert_eq!(tags.year, Some(2023));
    assert_eq!(tags.comment, "メッセージ募集中");

    assert_eq!(h.recorder.stats().saved(), 1);
    assert_eq!(h.slots.available_permits(), 2);
}

#[tokio::test]
async fn test_same_title_on_another_station_is_duplicate() {
    let h = harness(0).await;
    mount_recording(&h.server, "FMT", START, &[b"AAA"]).await;

    let ctx = context();
    let mut tasks = JoinSet::new();
    assert_eq!(
        h.recorder.dispatch(&ctx, program("FMT", START, END, "Title"), &mut tasks),
        Dispatch::Spawned
    );
    assert_eq!(
        h.recorder.dispatch(&ctx, program("TBS", "20230624100000", "20230624110000", "Title"), &mut tasks),
        Dispatch::Duplicate
    );
    assert_eq!(drain(&mut tasks).await.len(), 1);
}

#[tokio::test]
async fn test_segment_order_survives_scrambled_arrival() {
    let h = harness(0).await;
    let bodies: [&[u8]; 5] = [b"00", b"11", b"22", b"33", b"44"];
    mount_playlists(&h.server, "FMT", START, bodies.len()).await;
    // Earlier segments answer later.
    for (index, body) in bodies.iter().enumerate() {
        let delay = Duration::from_millis(50 * (bodies.len() - index) as u64);
        Mock::given(method("GET"))
            .and(path(segment_path("FMT", START, index)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()).set_delay(delay))
            .mount(&h.server)
            .await;
    }

    let ctx = context();
    let outcome = h.recorder.record(&program("FMT", START, END, "Title"), &ctx).await.unwrap();
    let RecordOutcome::Saved(path) = outcome else {
        panic!("expected a saved recording, got {outcome:?}");
    };
    assert_eq!(std::fs::read(path).unwrap(), b"0011223344");
}

#[tokio::test]
async fn test_failed_segment_aborts_without_output() {
    let h = harness(0).await;
    mount_playlists(&h.server, "FMT", START, 3).await;
    for index in [0, 2] {
        Mock::given(method("GET"))
            .and(path(segment_path("FMT", START, index)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&h.server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(segment_path("FMT", START, 1)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&h.server)
        .await;

    let ctx = context();
    let mut tasks = JoinSet::new();
    h.recorder.dispatch(&ctx, program("FMT", START, END, "Title"), &mut tasks);
    assert_eq!(drain(&mut tasks).await, [RecordOutcome::Failed]);

    // Neither the output file nor the scratch directory is left behind.
    assert!(h.workspace.output_entries().is_empty(), "{:?}", h.workspace.output_entries());
    assert_eq!(h.recorder.stats().failed(), 1);
    assert_eq!(h.slots.available_permits(), 2);
}

#[tokio::test]
async fn test_transient_segment_failure_is_retried() {
    let h = harness(0).await;
    mount_playlists(&h.server, "FMT", START, 2).await;
    Mock::given(method("GET"))
        .and(path(segment_path("FMT", START, 0)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"first".to_vec()))
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(segment_path("FMT", START, 1)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&h.server)
        .await;
    Mock::given(method("GET"))
        .and(path(segment_path("FMT", START, 1)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"second".to_vec()))
        .mount(&h.server)
        .await;

    let ctx = context();
    let outcome = h.recorder.record(&program("FMT", START, END, "Title"), &ctx).await.unwrap();
    let RecordOutcome::Saved(path) = outcome else {
        panic!("expected a saved recording, got {outcome:?}");
    };
    assert_eq!(std::fs::read(path).unwrap(), b"firstsecond");
    assert_eq!(h.recorder.stats().retried(), 2);
}

#[tokio::test]
async fn test_too_small_recording_is_discarded_for_later() {
    let h = harness(1024).await;
    mount_recording(&h.server, "FMT", START, &[b"tiny"]).await;

    let ctx = context();
    let mut tasks = JoinSet::new();
    h.recorder.dispatch(&ctx, program("FMT", START, END, "Title"), &mut tasks);
    let outcomes = drain(&mut tasks).await;

    assert!(
        matches!(&outcomes[..], [RecordOutcome::TooSmall { size: 4, .. }]),
        "{outcomes:?}"
    );
    assert!(h.workspace.output_entries().is_empty());
    assert!(h.tagger.written.lock().unwrap().is_empty());
    assert!(ctx.next_wake().is_some());
}

#[tokio::test]
async fn test_existing_file_is_skipped_without_requests() {
    let h = harness(0).await;
    Mock::given(method("POST"))
        .and(path("/v2/api/ts/playlist.m3u8"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.server)
        .await;

    std::fs::create_dir_all(h.workspace.output_dir()).unwrap();
    let existing = h.workspace.output_dir().join("202306250500_FMT_Title.aac");
    std::fs::write(&existing, b"previous run").unwrap();

    let ctx = context();
    let outcome = h.recorder.record(&program("FMT", START, END, "Title"), &ctx).await.unwrap();
    assert_eq!(outcome, RecordOutcome::AlreadyExists(existing.clone()));
    assert_eq!(std::fs::read(existing).unwrap(), b"previous run");
}

#[tokio::test]
async fn test_future_program_sets_wake_time() {
    let h = harness(0).await;
    let ctx = context();
    let mut tasks = JoinSet::new();

    let later = program("FMT", "20230625090000", "20230625100000", "Later");
    let sooner = program("FMT", "20230625070000", "20230625080000", "Sooner");
    assert_eq!(h.recorder.dispatch(&ctx, later, &mut tasks), Dispatch::Deferred);
    assert_eq!(h.recorder.dispatch(&ctx, sooner, &mut tasks), Dispatch::Deferred);

    assert!(tasks.is_empty());
    assert!(ctx.ledger().is_empty());
    assert_eq!(
        ctx.next_wake(),
        Some(CATALOG_TZ.with_ymd_and_hms(2023, 6, 25, 8, 1, 0).unwrap())
    );
}

#[tokio::test]
async fn test_malformed_start_is_invalid() {
    let h = harness(0).await;
    let ctx = context();
    let mut tasks = JoinSet::new();
    assert_eq!(
        h.recorder.dispatch(&ctx, program("FMT", "tomorrow", END, "Title"), &mut tasks),
        Dispatch::Invalid
    );
    assert!(ctx.ledger().is_empty());
}

#[tokio::test]
async fn test_station_without_area_fails() {
    let h = harness(0).await;
    let ctx = context();
    let err = h
        .recorder
        .record(&program("NOPE", START, END, "Title"), &ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("NOPE"), "{err}");
}

#[tokio::test]
async fn test_wrong_variant_count_fails_program() {
    let h = harness(0).await;
    Mock::given(method("POST"))
        .and(path("/v2/api/ts/playlist.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1\n/a.m3u8\n#EXT-X-STREAM-INF:BANDWIDTH=2\n/b.m3u8\n",
        ))
        .mount(&h.server)
        .await;

    let ctx = context();
    let err = h
        .recorder
        .record(&program("FMT", START, END, "Title"), &ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("has 2 variants"), "{err}");
    assert!(h.workspace.output_entries().is_empty());
}

/// Serves a fixed body after `delay`, logging when each request arrived.
struct TimedSegment {
    arrivals: Arc<Mutex<Vec<Instant>>>,
    delay: Duration,
}

impl Respond for TimedSegment {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.arrivals.lock().unwrap().push(Instant::now());
        ResponseTemplate::new(200)
            .set_body_bytes(b"seg".to_vec())
            .set_delay(self.delay)
    }
}

/// Most requests whose response could not yet have been sent when another
/// one arrived.
fn peak_in_flight(arrivals: &[Instant], delay: Duration) -> usize {
    arrivals
        .iter()
        .map(|&at| {
            arrivals
                .iter()
                .filter(|&&other| other <= at && at < other + delay)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test]
async fn test_segment_ceiling_is_shared_across_programs() {
    const SEGMENTS: usize = 5;
    let h = harness(0).await;
    let delay = Duration::from_millis(150);
    let arrivals = Arc::new(Mutex::new(Vec::new()));

    let programs = [
        program("FMT", START, END, "Morning"),
        program("TBS", START, END, "Talk"),
        program("JOAK", START, END, "News"),
    ];
    for p in &programs {
        mount_playlists(&h.server, &p.station_id, START, SEGMENTS).await;
        for index in 0..SEGMENTS {
            Mock::given(method("GET"))
                .and(path(segment_path(&p.station_id, START, index)))
                .respond_with(TimedSegment {
                    arrivals: Arc::clone(&arrivals),
                    delay,
                })
                .mount(&h.server)
                .await;
        }
    }

    let ctx = context();
    let mut tasks = JoinSet::new();
    for p in programs {
        assert_eq!(h.recorder.dispatch(&ctx, p, &mut tasks), Dispatch::Spawned);
    }
    let outcomes = drain(&mut tasks).await;
    assert_eq!(outcomes.len(), 3);
    assert!(outcomes.iter().all(|o| matches!(o, RecordOutcome::Saved(_))), "{outcomes:?}");

    let arrivals = arrivals.lock().unwrap();
    assert_eq!(arrivals.len(), 3 * SEGMENTS);
    let peak = peak_in_flight(&arrivals, delay);
    assert!(peak <= 2, "{peak} segment requests in flight with 2 permits");
    assert_eq!(h.slots.available_permits(), 2);
}
