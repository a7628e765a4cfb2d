//! Download orchestration split into focused submodules.
//!
//! The `MediaDownloader` struct and its methods are organized by domain:
//! - [`sources`] - Extraction, ranking and selection entry points
//! - [`tasks`] - Job spawning, progress publication and supervision
//! - [`transfer`] - Streaming transfer with header-strategy fallback
//! - [`control`] - Poll, cancel, location and eviction
//! - [`lifecycle`] - Shutdown coordination
//! - [`registry`] - The shared job registry

mod control;
mod lifecycle;
mod registry;
mod sources;
mod tasks;
mod transfer;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use registry::JobRegistry;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::extraction::{ExtractionPipeline, MediaResolver, YtDlpResolver};
use crate::session;
use crate::types::Event;
use std::sync::Arc;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader instance (cloneable - all fields are Arc-wrapped or cheap handles)
#[derive(Clone)]
pub struct MediaDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Cookie-sharing clients for page probes and media transfers
    pub(crate) clients: session::HttpClients,
    /// Strategy set run for every extraction
    pub(crate) pipeline: Arc<ExtractionPipeline>,
    /// Job records and cancellation tokens
    pub(crate) registry: JobRegistry,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl MediaDownloader {
    /// Create a new MediaDownloader instance
    ///
    /// Validates the configuration, creates the scratch directory, builds the
    /// HTTP clients and resolves yt-dlp according to
    /// [`ResolverConfig`](crate::config::ResolverConfig).
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] for invalid settings
    /// - [`Error::Io`] if the scratch directory cannot be created
    pub async fn new(config: Config) -> Result<Self> {
        let resolver = YtDlpResolver::from_config(&config.extraction.resolver);
        Self::with_parts(config, resolver, JobRegistry::new()).await
    }

    /// Create a MediaDownloader around an explicit resolver and registry
    ///
    /// Useful when the registry is owned by the embedding service, or to run
    /// without an external resolver ([`NoOpResolver`](crate::extraction::NoOpResolver)).
    pub async fn with_parts(
        config: Config,
        resolver: Arc<dyn MediaResolver>,
        registry: JobRegistry,
    ) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(config.scratch_dir())
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create scratch directory '{}': {}",
                        config.scratch_dir().display(),
                        e
                    ),
                ))
            })?;

        let clients = session::build_clients(&config.extraction, config.download.connect_timeout)?;
        let pipeline =
            ExtractionPipeline::with_resolver(clients.page.clone(), &config.extraction, resolver);

        let (event_tx, _rx) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            scratch_dir = %config.scratch_dir().display(),
            strategies = ?pipeline.strategy_kinds(),
            "media downloader initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            clients,
            pipeline: Arc::new(pipeline),
            registry,
            event_tx,
        })
    }

    /// Subscribe to download events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use media_dl::{Config, Event, MediaDownloader};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let downloader = MediaDownloader::new(Config::default()).await?;
    ///
    ///     let mut events = downloader.subscribe();
    ///     tokio::spawn(async move {
    ///         while let Ok(event) = events.recv().await {
    ///             if let Event::Completed { id, path, .. } = event {
    ///                 println!("{} saved to {}", id, path.display());
    ///             }
    ///         }
    ///     });
    ///
    ///     downloader
    ///         .select_and_start("https://example.com/watch/42", Some("720p"))
    ///         .await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The configuration this downloader runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The job registry backing this downloader
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }
}
