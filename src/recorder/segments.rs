//! Bounded, retried segment transfers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{RecordError, RecordStats};
use crate::download::{HttpClient, RetryDecision, RetryPolicy, classify_error};
use crate::media::AudioFormat;

/// Downloads every segment into `dir` and returns their paths in playlist
/// order.
///
/// Each attempt holds one permit of `slots`, the pool shared by all
/// programs. The first segment to exhaust its attempts aborts the rest.
#[instrument(skip_all, fields(segments = urls.len(), dir = %dir.display()))]
pub(crate) async fn fetch_segments(
    client: &HttpClient,
    slots: &Arc<Semaphore>,
    policy: &RetryPolicy,
    stats: &Arc<RecordStats>,
    urls: &[Url],
    dir: &Path,
) -> Result<Vec<PathBuf>, RecordError> {
    let extension = AudioFormat::source().extension();
    let paths: Vec<PathBuf> = (0..urls.len())
        .map(|index| dir.join(format!("{index:05}.{extension}")))
        .collect();

    let mut tasks = JoinSet::new();
    for (index, (url, path)) in urls.iter().zip(&paths).enumerate() {
        let client = client.clone();
        let slots = Arc::clone(slots);
        let policy = policy.clone();
        let stats = Arc::clone(stats);
        let url = url.to_string();
        let path = path.clone();
        tasks.spawn(async move {
            fetch_with_retry(&client, &slots, &policy, &stats, index, &url, &path).await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let failure = match joined {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e,
            Err(e) => RecordError::Task(e),
        };
        tasks.abort_all();
        while tasks.join_next().await.is_some() {}
        return Err(failure);
    }

    debug!("all segments downloaded");
    Ok(paths)
}

async fn fetch_with_retry(
    client: &HttpClient,
    slots: &Semaphore,
    policy: &RetryPolicy,
    stats: &RecordStats,
    index: usize,
    url: &str,
    path: &Path,
) -> Result<(), RecordError> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let result = {
            let _permit = slots.acquire().await.map_err(|_| RecordError::PoolClosed)?;
            client.download_to_path(url, path).await
        };

        let error = match result {
            Ok(_) => return Ok(()),
            Err(e) => e,
        };
        match policy.should_retry(classify_error(&error), attempt) {
            RetryDecision::Retry { delay, attempt: next } => {
                debug!(index, %url, attempt = next, error = %error, "retrying segment");
                stats.increment_retried();
                tokio::time::sleep(delay).await;
            }
            RetryDecision::DoNotRetry { reason } => {
                warn!(index, %url, attempts = attempt, %reason, error = %error, "segment failed");
                return Err(RecordError::Segment {
                    index,
                    attempts: attempt,
                    source: error,
                });
            }
        }
    }
}
