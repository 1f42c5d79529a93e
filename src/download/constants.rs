//! Constants for the download module (timeouts, admission pool, retries).

use chrono::TimeDelta;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Default ceiling on in-flight segment downloads across all programs.
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

/// Upper bound accepted for the segment admission ceiling.
pub const MAX_CONCURRENCY_LIMIT: usize = 256;

/// Attempts per segment (including the first) before the program is aborted.
pub const SEGMENT_MAX_ATTEMPTS: u32 = 4;

/// Page-size parameter the timeshift playlist endpoint expects.
pub const PLAYLIST_PAGE_SIZE: &str = "15";

/// Delay after a future program's end before its timeshift is fetched.
pub const WAKE_BUFFER: TimeDelta = TimeDelta::minutes(1);

/// How far the wake time moves when a recording came out too small.
pub const TOO_SMALL_RETRY_BUFFER: TimeDelta = TimeDelta::minutes(10);

/// Default minimum accepted recording size in megabytes.
pub const DEFAULT_MINIMUM_OUTPUT_MB: u64 = 1;
