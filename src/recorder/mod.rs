//! Program recording.
//!
//! [`Recorder::dispatch`] runs the cheap, synchronous guards for a matched
//! program and spawns the actual recording into the caller's [`JoinSet`]:
//!
//! 1. future programs are not recorded; their end (plus a buffer) becomes a
//!    wake time candidate
//! 2. the program is claimed in the cycle ledger, duplicates stop here
//! 3. the spawned task resolves the playlist under the session of the
//!    station's primary area, fetches every segment through the shared
//!    admission pool, assembles, transcodes, checks the size and tags
//!
//! Only the segment fan-out is concurrent inside a program, and its bound is
//! the semaphore handed in at construction, shared by every program.

mod error;
mod segments;
mod stats;

pub use error::RecordError;
pub use stats::RecordStats;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::auth::Authenticator;
use crate::catalog::ReferenceCatalog;
use crate::cycle::CycleContext;
use crate::download::constants::{TOO_SMALL_RETRY_BUFFER, WAKE_BUFFER};
use crate::download::{HttpClient, RetryPolicy};
use crate::endpoints::Endpoints;
use crate::ledger::LedgerEntry;
use crate::media::{Assembler, AudioFormat, FfmpegAssembler, LoftyTagWriter, TagWriter, TrackTags};
use crate::output::OutputTarget;
use crate::playlist;
use crate::program::{Program, time};

/// Output and retry settings of a recorder.
#[derive(Debug, Clone)]
pub struct RecorderSettings {
    /// Directory recordings are written to.
    pub output_dir: PathBuf,
    pub format: AudioFormat,
    /// Recordings smaller than this are discarded.
    pub minimum_output_bytes: u64,
    /// Per-segment retry policy.
    pub retry_policy: RetryPolicy,
}

/// What [`Recorder::dispatch`] did with a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The program hasn't started yet.
    Deferred,
    /// The ledger already holds it.
    Duplicate,
    /// A recording task was spawned.
    Spawned,
    /// Its start or end time is malformed.
    Invalid,
}

/// Final state of one recording task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Saved(PathBuf),
    AlreadyExists(PathBuf),
    /// Discarded for being under the minimum size.
    TooSmall { path: PathBuf, size: u64 },
    Failed,
}

/// Records matched programs. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Recorder {
    client: HttpClient,
    endpoints: Endpoints,
    catalog: Arc<ReferenceCatalog>,
    auth: Arc<Authenticator>,
    slots: Arc<Semaphore>,
    assembler: Arc<dyn Assembler>,
    tagger: Arc<dyn TagWriter>,
    settings: Arc<RecorderSettings>,
    stats: Arc<RecordStats>,
}

impl fmt::Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recorder")
            .field("endpoints", &self.endpoints)
            .field("available_slots", &self.slots.available_permits())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Recorder {
    /// Creates a recorder using `ffmpeg` for assembly and lofty for tags.
    ///
    /// `slots` bounds in-flight segment downloads across every program of
    /// every recorder sharing it.
    pub fn new(
        client: HttpClient,
        endpoints: Endpoints,
        catalog: Arc<ReferenceCatalog>,
        auth: Arc<Authenticator>,
        slots: Arc<Semaphore>,
        settings: RecorderSettings,
    ) -> Self {
        Self {
            client,
            endpoints,
            catalog,
            auth,
            slots,
            assembler: Arc::new(FfmpegAssembler::default()),
            tagger: Arc::new(LoftyTagWriter),
            settings: Arc::new(settings),
            stats: Arc::new(RecordStats::new()),
        }
    }

    #[must_use]
    pub fn with_assembler(mut self, assembler: Arc<dyn Assembler>) -> Self {
        self.assembler = assembler;
        self
    }

    #[must_use]
    pub fn with_tag_writer(mut self, tagger: Arc<dyn TagWriter>) -> Self {
        self.tagger = tagger;
        self
    }

    /// Counters of every task spawned by this recorder and its clones.
    #[must_use]
    pub fn stats(&self) -> &RecordStats {
        &self.stats
    }

    /// Applies the future and duplicate guards to `program` and, if it
    /// passes, spawns its recording into `tasks`.
    ///
    /// The ledger claim happens here, before any I/O, so two rules matching
    /// the same program can't both spawn it.
    pub fn dispatch(
        &self,
        ctx: &Arc<CycleContext>,
        program: Program,
        tasks: &mut JoinSet<RecordOutcome>,
    ) -> Dispatch {
        let start = match program.start_time() {
            Ok(start) => start,
            Err(e) => {
                warn!(station = %program.station_id, title = %program.title, error = %e, "skip program");
                return Dispatch::Invalid;
            }
        };

        if start > ctx.now() {
            let end = match program.end_time() {
                Ok(end) => end,
                Err(e) => {
                    warn!(station = %program.station_id, title = %program.title, error = %e, "skip program");
                    return Dispatch::Invalid;
                }
            };
            if ctx.propose_wake(end + WAKE_BUFFER) {
                debug!(station = %program.station_id, title = %program.title, end = %program.end, "next wake moved to program end");
            }
            return Dispatch::Deferred;
        }

        if !ctx.ledger().claim(LedgerEntry::for_program(&program)) {
            info!(station = %program.station_id, title = %program.title, start = %program.start, "skip duplicate");
            return Dispatch::Duplicate;
        }

        let recorder = self.clone();
        let ctx = Arc::clone(ctx);
        tasks.spawn(async move { recorder.run(&program, &ctx).await });
        Dispatch::Spawned
    }

    async fn run(&self, program: &Program, ctx: &CycleContext) -> RecordOutcome {
        match self.record(program, ctx).await {
            Ok(outcome) => {
                match &outcome {
                    RecordOutcome::Saved(_) => self.stats.increment_saved(),
                    RecordOutcome::AlreadyExists(_) => self.stats.increment_existing(),
                    RecordOutcome::TooSmall { .. } => self.stats.increment_too_small(),
                    RecordOutcome::Failed => self.stats.increment_failed(),
                }
                outcome
            }
            Err(e) => {
                error!(
                    station = %program.station_id,
                    title = %program.title,
                    start = %program.start,
                    error = %e,
                    "recording failed"
                );
                self.stats.increment_failed();
                RecordOutcome::Failed
            }
        }
    }

    /// Records `program` unconditionally: no future or duplicate guard.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for any failure that leaves no recording.
    /// A tagging failure is only logged.
    #[instrument(skip(self, program, ctx), fields(station = %program.station_id, title = %program.title, start = %program.start))]
    pub async fn record(
        &self,
        program: &Program,
        ctx: &CycleContext,
    ) -> Result<RecordOutcome, RecordError> {
        let target =
            OutputTarget::for_program(program, &self.settings.output_dir, self.settings.format)?;
        tokio::fs::create_dir_all(target.dir())
            .await
            .map_err(|e| RecordError::io(target.dir(), e))?;
        let path = target.path();
        if tokio::fs::try_exists(&path)
            .await
            .map_err(|e| RecordError::io(&path, e))?
        {
            info!(path = %path.display(), "skip, already exists");
            return Ok(RecordOutcome::AlreadyExists(path));
        }

        let area = self
            .catalog
            .primary_area(&program.station_id)
            .ok_or_else(|| RecordError::UnknownStation(program.station_id.clone()))?;
        let session = self.auth.session(area).await?;
        let segments =
            playlist::resolve_segments(&self.client, &self.endpoints, &session, program).await?;
        info!(segments = segments.len(), area, "start downloading");

        let scratch = tempfile::Builder::new()
            .prefix(".timeshift-")
            .tempdir_in(target.dir())
            .map_err(|e| RecordError::io(target.dir(), e))?;
        let assembled = self.assemble(&target, &segments, scratch.path()).await;
        let scratch_path = scratch.path().to_path_buf();
        if let Err(e) = scratch.close() {
            warn!(path = %scratch_path.display(), error = %e, "failed to remove scratch directory");
        }
        assembled?;

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| RecordError::io(&path, e))?
            .len();
        if size < self.settings.minimum_output_bytes {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| RecordError::io(&path, e))?;
            let retry_at = time::now() + TOO_SMALL_RETRY_BUFFER;
            ctx.propose_wake(retry_at);
            warn!(
                size,
                minimum = self.settings.minimum_output_bytes,
                retry_at = %retry_at,
                "recording too small, discarded for a later cycle"
            );
            return Ok(RecordOutcome::TooSmall { path, size });
        }

        let tags = TrackTags::for_program(program, target.stem());
        if let Err(e) = self.tagger.write_tags(&path, &tags).await {
            warn!(path = %path.display(), error = %e, "failed to write tags");
        }

        info!(path = %path.display(), size, "file saved");
        Ok(RecordOutcome::Saved(path))
    }

    async fn assemble(
        &self,
        target: &OutputTarget,
        segments: &[Url],
        scratch: &Path,
    ) -> Result<(), RecordError> {
        let files = segments::fetch_segments(
            &self.client,
            &self.slots,
            &self.settings.retry_policy,
            &self.stats,
            segments,
            scratch,
        )
        .await?;

        let joined = self.assembler.concatenate(scratch, &files).await?;
        let staged = if target.format() == AudioFormat::source() {
            joined
        } else {
            let staged = scratch.join(format!("output.{}", target.format().extension()));
            self.assembler
                .transcode(&joined, &staged, target.format())
                .await?;
            staged
        };

        let path = target.path();
        tokio::fs::rename(&staged, &path)
            .await
            .map_err(|e| RecordError::io(&path, e))
    }
}
