//! # media-dl
//!
//! Backend library that finds the media embedded in arbitrary web pages and
//! downloads it as managed, observable, cancellable jobs.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Heuristic but bounded** - Several independent strategies probe a page; none can fail the whole extraction
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or HTTP server, purely a Rust crate for embedding
//! - **Observable** - Every job is pollable, and consumers can subscribe to events
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, MediaDownloader};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MediaDownloader::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let started = downloader
//!         .select_and_start("https://example.com/watch/42", Some("best"))
//!         .await?;
//!     println!("downloading {} as {}", started.selected_source.url, started.job_id);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Media source extraction strategies and pipeline
pub mod extraction;
/// Compiled pattern tables used by the extraction strategies
pub mod patterns;
/// Candidate normalization and ranking
pub mod ranking;
/// Source selection policy
pub mod selection;
/// Browser-like HTTP session
pub mod session;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, DownloadConfig, ExtractionConfig, ResolverConfig, SelectionConfig, TieBreak};
pub use downloader::{JobRegistry, MediaDownloader};
pub use error::{ApiError, Error, ErrorDetail, Result, ToHttpStatus};
pub use extraction::{MediaResolver, NoOpResolver, YtDlpResolver};
pub use types::{
    DiscoveryMethod, DownloadJob, Event, JobId, JobStatus, QualityPreference, RankedSource,
    RawCandidate, StartedDownload, StrategyKind,
};
