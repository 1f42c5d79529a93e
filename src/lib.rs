//! Timeshift Recorder Core Library
//!
//! Records aired radio programs from a timeshift streaming service according
//! to user-defined rules.
//!
//! # Architecture
//!
//! - [`auth`] - device emulation and the two-step handshake, one session per area
//! - [`catalog`] - reference data (regions, coordinates, versions, station topology)
//! - [`program`] - weekly program catalogs
//! - [`rules`] - rule matching
//! - [`ledger`] - per-cycle duplicate detection
//! - [`playlist`] - master/media playlist resolution
//! - [`recorder`] - per-program download, assembly and tagging
//! - [`scheduler`] - the polling loop
//! - [`download`] - shared HTTP transport and segment retry policy
//! - [`media`] - assembly, transcoding and tag writing backends

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod catalog;
pub mod config;
pub mod cycle;
pub mod download;
pub mod endpoints;
pub mod ledger;
pub mod media;
pub mod output;
pub mod playlist;
pub mod program;
pub mod recorder;
pub mod rules;
pub mod scheduler;
mod user_agent;

// Re-export commonly used types
pub use auth::{AuthError, Authenticator, DeviceFingerprint, Session, partial_key};
pub use catalog::{CatalogError, ReferenceCatalog};
pub use config::Config;
pub use cycle::CycleContext;
pub use download::{DownloadError, HttpClient, RetryPolicy};
pub use endpoints::Endpoints;
pub use ledger::{Ledger, LedgerEntry};
pub use media::{Assembler, AudioFormat, TagWriter};
pub use program::{Program, ProgramError};
pub use recorder::{Dispatch, RecordError, RecordOutcome, Recorder, RecorderSettings};
pub use rules::{Rule, RuleSet};
pub use scheduler::{CycleReport, Scheduler, SchedulerError};
