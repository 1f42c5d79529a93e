//! The polling loop.
//!
//! Each cycle reloads the configuration and reference catalog, walks the
//! available stations, dispatches every matching program to the
//! [`Recorder`] and waits for all of them before computing when to wake up
//! next. Only one cycle runs at a time.

mod error;

pub use error::SchedulerError;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::auth::Authenticator;
use crate::catalog::{self, ReferenceCatalog};
use crate::config::Config;
use crate::cycle::CycleContext;
use crate::download::{HttpClient, RetryPolicy};
use crate::program::{self, time};
use crate::recorder::{Dispatch, RecordOutcome, Recorder, RecorderSettings};

/// Sleep used when a cycle found no future program.
pub const DEFAULT_WAKE_INTERVAL: TimeDelta = TimeDelta::days(1);

/// Wait before retrying a cycle whose reference catalog failed to load.
pub const CATALOG_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Summary of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Area whose stations were checked.
    pub area_id: String,
    /// Catalogs fetched and evaluated.
    pub stations_checked: usize,
    /// Catalogs that failed to fetch.
    pub stations_failed: usize,
    /// Recording tasks spawned.
    pub dispatched: usize,
    /// Matched programs that haven't started.
    pub deferred: usize,
    /// Matched programs rejected by the ledger.
    pub duplicates: usize,
    /// Matched programs with malformed times.
    pub invalid: usize,
    pub saved: usize,
    /// Programs whose file was already on disk.
    pub existing: usize,
    pub too_small: usize,
    pub failed: usize,
    /// When the next cycle should start.
    pub next_wake: DateTime<Tz>,
}

impl CycleReport {
    fn new(area_id: String, now: DateTime<Tz>) -> Self {
        Self {
            area_id,
            stations_checked: 0,
            stations_failed: 0,
            dispatched: 0,
            deferred: 0,
            duplicates: 0,
            invalid: 0,
            saved: 0,
            existing: 0,
            too_small: 0,
            failed: 0,
            next_wake: now + DEFAULT_WAKE_INTERVAL,
        }
    }

    fn count_dispatch(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Spawned => self.dispatched += 1,
            Dispatch::Deferred => self.deferred += 1,
            Dispatch::Duplicate => self.duplicates += 1,
            Dispatch::Invalid => self.invalid += 1,
        }
    }

    fn count_outcome(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Saved(_) => self.saved += 1,
            RecordOutcome::AlreadyExists(_) => self.existing += 1,
            RecordOutcome::TooSmall { .. } => self.too_small += 1,
            RecordOutcome::Failed => self.failed += 1,
        }
    }
}

/// Runs cycles until shutdown.
#[derive(Debug)]
pub struct Scheduler {
    config_path: PathBuf,
    client: HttpClient,
    retry_policy: RetryPolicy,
    slots: Option<Arc<Semaphore>>,
    slots_size: usize,
    shutdown: watch::Receiver<bool>,
}

impl Scheduler {
    /// Creates a scheduler reading `config_path` every cycle.
    ///
    /// Setting `shutdown` to `true` stops new stations from being checked;
    /// recordings already dispatched always run to completion.
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            config_path: config_path.into(),
            client: HttpClient::new(),
            retry_policy: RetryPolicy::default(),
            slots: None,
            slots_size: 0,
            shutdown,
        }
    }

    /// Uses `client` for every request.
    #[must_use]
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    /// Uses `policy` for segment retries.
    #[must_use]
    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Cycles until shutdown is requested or a fatal error occurs.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchedulerError`] without a retry delay.
    pub async fn run(mut self) -> Result<(), SchedulerError> {
        info!(config = %self.config_path.display(), "scheduler started");
        loop {
            let wake = match self.run_cycle().await {
                Ok(report) => report.next_wake,
                Err(e) => {
                    let Some(delay) = e.retry_delay() else {
                        return Err(e);
                    };
                    warn!(error = %e, retry_in_secs = delay.as_secs(), "cycle abandoned");
                    time::now() + TimeDelta::from_std(delay).unwrap_or(TimeDelta::zero())
                }
            };

            if self.shutdown_requested() {
                info!("all recordings completed, exiting");
                return Ok(());
            }

            let delay = (wake - time::now()).to_std().unwrap_or(Duration::ZERO);
            info!(wake = %wake, "sleeping until the next cycle");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                _ = self.shutdown.changed() => {
                    info!("shutdown requested while idle, exiting");
                    return Ok(());
                }
            }
        }
    }

    /// Runs one cycle at the current time.
    ///
    /// # Errors
    ///
    /// See [`Scheduler::run_cycle_at`].
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SchedulerError> {
        self.run_cycle_at(time::now()).await
    }

    /// Runs one cycle treating `now` as the current time for every matching
    /// and future-program decision.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError`] if the configuration, output root,
    /// reference catalog, area or key can't be established. Nothing is
    /// dispatched in that case.
    #[instrument(skip(self), fields(config = %self.config_path.display()))]
    pub async fn run_cycle_at(&mut self, now: DateTime<Tz>) -> Result<CycleReport, SchedulerError> {
        let config = Config::load(&self.config_path).map_err(SchedulerError::Config)?;
        tokio::fs::create_dir_all(&config.output_dir)
            .await
            .map_err(|source| SchedulerError::OutputDir {
                path: config.output_dir.clone(),
                source,
            })?;

        let catalog = Arc::new(
            ReferenceCatalog::load(&config.assets_dir, &self.client, &config.endpoints)
                .await
                .map_err(SchedulerError::Catalog)?,
        );
        let area_id = match &config.area_id {
            Some(area_id) => area_id.clone(),
            None => {
                let detected = catalog::detect_area_id(&self.client, &config.endpoints)
                    .await
                    .map_err(SchedulerError::AreaDetection)?;
                info!(area = %detected, "area detected");
                detected
            }
        };
        let full_key = tokio::fs::read_to_string(&config.full_key_file)
            .await
            .map_err(|source| SchedulerError::FullKey {
                path: config.full_key_file.clone(),
                source,
            })?;

        let auth = Arc::new(Authenticator::new(
            self.client.clone(),
            config.endpoints.clone(),
            Arc::clone(&catalog),
            full_key.trim(),
        ));
        let recorder = Recorder::new(
            self.client.clone(),
            config.endpoints.clone(),
            Arc::clone(&catalog),
            auth,
            self.admission_pool(config.max_concurrency),
            RecorderSettings {
                output_dir: config.output_dir.clone(),
                format: config.format,
                minimum_output_bytes: config.minimum_output_bytes,
                retry_policy: self.retry_policy.clone(),
            },
        )
        .with_assembler(config.build_assembler());

        let stations = available_stations(&catalog, &area_id, &config);
        info!(area = %area_id, stations = stations.len(), rules = config.rules.len(), "cycle started");

        let ctx = Arc::new(CycleContext::new(now));
        let mut report = CycleReport::new(area_id, now);
        let mut tasks = JoinSet::new();

        for station in &stations {
            if self.shutdown_requested() {
                info!("shutdown requested, no further stations this cycle");
                break;
            }
            if !config.rules.wants_station(station) {
                debug!(%station, "no rule for station, skipped");
                continue;
            }

            let programs =
                match program::fetch_weekly_programs(&self.client, &config.endpoints, station).await
                {
                    Ok(programs) => programs,
                    Err(e) => {
                        warn!(%station, error = %e, "station skipped this cycle");
                        report.stations_failed += 1;
                        continue;
                    }
                };
            report.stations_checked += 1;
            info!(%station, programs = programs.len(), "checking the program");

            for program in programs {
                if config.rules.any_matches(station, &program, now) {
                    report.count_dispatch(recorder.dispatch(&ctx, program, &mut tasks));
                }
            }
        }

        info!(tasks = tasks.len(), "waiting for all the recordings to complete");
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.count_outcome(&outcome),
                Err(e) => {
                    error!(error = %e, "recording task aborted");
                    report.failed += 1;
                }
            }
        }

        if let Some(wake) = ctx.next_wake() {
            report.next_wake = wake;
        }
        info!(
            checked = report.stations_checked,
            failed_stations = report.stations_failed,
            dispatched = report.dispatched,
            deferred = report.deferred,
            duplicates = report.duplicates,
            saved = report.saved,
            existing = report.existing,
            too_small = report.too_small,
            failed = report.failed,
            segment_retries = recorder.stats().retried(),
            next_wake = %report.next_wake,
            "cycle completed"
        );
        Ok(report)
    }

    /// The process-wide segment pool, rebuilt only when its size changes.
    ///
    /// Cycles don't overlap, so no permit is outstanding when it is replaced.
    fn admission_pool(&mut self, size: usize) -> Arc<Semaphore> {
        match &self.slots {
            Some(slots) if self.slots_size == size => Arc::clone(slots),
            _ => {
                debug!(size, "segment admission pool sized");
                let slots = Arc::new(Semaphore::new(size));
                self.slots = Some(Arc::clone(&slots));
                self.slots_size = size;
                slots
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }
}

/// Stations of `area_id` plus extras, minus ignored ones, plus every station a
/// rule names explicitly.
#[must_use]
pub fn available_stations(catalog: &ReferenceCatalog, area_id: &str, config: &Config) -> Vec<String> {
    let mut stations = catalog.stations_in_area(area_id);
    for extra in &config.extra_stations {
        if !stations.contains(extra) {
            stations.push(extra.clone());
        }
    }
    stations.retain(|station| !config.ignore_stations.contains(station));
    for named in config.rules.named_stations() {
        if !stations.iter().any(|s| s == named) {
            stations.push(named.to_string());
        }
    }
    stations
}
