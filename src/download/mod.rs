//! HTTP transport shared by every network step.
//!
//! Handshake, catalog, playlist and segment requests all go through one
//! [`HttpClient`] and report failures as [`DownloadError`]. Segment fetches are
//! the only ones retried in place, through [`RetryPolicy`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use timeshift_core::download::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new();
//! let bytes = client
//!     .download_to_path("https://media.example/seg.aac", Path::new("00000.aac"))
//!     .await?;
//! println!("wrote {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod retry;

pub(crate) use client::read_text;
pub use client::HttpClient;
pub use error::DownloadError;
pub use retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
