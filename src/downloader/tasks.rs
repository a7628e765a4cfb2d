//! Download task spawning, progress publication and supervision.

use super::MediaDownloader;
use super::registry::JobRegistry;
use super::transfer::{Outcome, Transfer};
use crate::config::DownloadConfig;
use crate::types::{DownloadJob, Event, JobId, JobStatus, RankedSource};
use crate::utils;
use chrono::Utc;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Percentage of `total` covered by `bytes`, 0 when the size is unknown
pub(crate) fn percent(bytes: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((bytes as f64 / total as f64) * 100.0).min(100.0) as f32
}

/// Publishes a job's transfer progress to the registry and the event stream
///
/// The registry record is updated on every chunk; events are throttled to one
/// per interval. Published bytes never go backwards while downloading, even
/// when a fallback attempt has to restart the file.
pub(crate) struct ProgressReporter {
    id: JobId,
    registry: JobRegistry,
    event_tx: broadcast::Sender<Event>,
    interval: Duration,
    last_event: Option<Instant>,
    high_water: u64,
}

impl ProgressReporter {
    pub(crate) fn new(
        id: JobId,
        registry: JobRegistry,
        event_tx: broadcast::Sender<Event>,
        interval: Duration,
    ) -> Self {
        Self {
            id,
            registry,
            event_tx,
            interval,
            last_event: None,
            high_water: 0,
        }
    }

    pub(crate) fn id(&self) -> JobId {
        self.id
    }

    /// A response head arrived for `strategy`
    pub(crate) async fn begin(&mut self, strategy: &'static str, total: u64) {
        let message = if total > 0 {
            format!(
                "Downloading... (Size: {:.2} MB)",
                total as f64 / (1024.0 * 1024.0)
            )
        } else {
            "Downloading... (Size: unknown)".to_string()
        };

        self.registry
            .update(self.id, |job| {
                job.strategy = Some(strategy.to_string());
                job.total_bytes = total;
                job.message = message;
            })
            .await;
    }

    /// Bytes on disk changed
    pub(crate) async fn report(&mut self, written: u64, total: u64) {
        self.high_water = self.high_water.max(written);
        let bytes = self.high_water;
        let pct = percent(bytes, total);

        self.registry
            .update(self.id, |job| {
                job.bytes_downloaded = bytes;
                job.total_bytes = total;
                job.progress_percent = pct;
            })
            .await;

        let due = self
            .last_event
            .is_none_or(|last| last.elapsed() >= self.interval);
        if due {
            self.last_event = Some(Instant::now());
            self.event_tx
                .send(Event::Progress {
                    id: self.id,
                    bytes,
                    total,
                    percent: pct,
                })
                .ok();
        }
    }
}

/// Everything a spawned download task owns
struct JobContext {
    id: JobId,
    url: String,
    referer: Option<String>,
    output_path: PathBuf,
    client: reqwest::Client,
    config: DownloadConfig,
    registry: JobRegistry,
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl MediaDownloader {
    /// Start downloading a ranked source
    ///
    /// Registers the job in `initializing`, spawns its task and returns at
    /// once. Progress is observed with [`poll`](Self::poll) or
    /// [`subscribe`](Self::subscribe).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader, source: RankedSource) -> Result<()> {
    /// let id = downloader.start(source).await;
    /// let job = downloader.poll(id).await?;
    /// println!("{}: {}", job.status, job.message);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn start(&self, source: RankedSource) -> JobId {
        self.start_with_referer(source, None).await
    }

    /// Start downloading a source found on `page_url`, sent as `Referer`
    pub async fn start_from_page(&self, source: RankedSource, page_url: &str) -> JobId {
        self.start_with_referer(source, Some(page_url.to_string()))
            .await
    }

    async fn start_with_referer(&self, source: RankedSource, referer: Option<String>) -> JobId {
        let id = JobId::new();
        let output_path = self.config.scratch_dir().join(utils::output_file_name(
            &source.title,
            &id.short(),
            &source.format,
        ));
        let url = source.url.clone();

        let record = DownloadJob {
            id,
            source,
            status: JobStatus::Initializing,
            progress_percent: 0.0,
            bytes_downloaded: 0,
            total_bytes: 0,
            started_at: Utc::now(),
            completed_at: None,
            cancel_requested: false,
            error_detail: None,
            message: "Initializing download...".to_string(),
            output_path: output_path.clone(),
            strategy: None,
        };
        let cancel = self.registry.insert(record).await;

        tracing::info!(job_id = %id, url = %url, path = %output_path.display(), "download accepted");
        self.emit(Event::Started {
            id,
            url: url.clone(),
        });

        let ctx = JobContext {
            id,
            url,
            referer,
            output_path,
            client: self.clients.transfer.clone(),
            config: self.config.download.clone(),
            registry: self.registry.clone(),
            event_tx: self.event_tx.clone(),
            cancel,
        };

        let handle = tokio::spawn(run_job(ctx));
        tokio::spawn(supervise(
            id,
            handle,
            self.registry.clone(),
            self.event_tx.clone(),
        ));

        id
    }
}

/// Drive one job from `initializing` to a terminal state
async fn run_job(ctx: JobContext) {
    let id = ctx.id;
    ctx.registry
        .update(id, |job| {
            job.status = JobStatus::Downloading;
            job.message = "Starting download...".to_string();
        })
        .await;

    let mut reporter = ProgressReporter::new(
        id,
        ctx.registry.clone(),
        ctx.event_tx.clone(),
        Duration::from_millis(ctx.config.progress_interval_ms),
    );
    let transfer = Transfer {
        url: &ctx.url,
        referer: ctx.referer.as_deref(),
        output_path: &ctx.output_path,
        client: &ctx.client,
        config: &ctx.config,
        cancel: &ctx.cancel,
    };

    match transfer.run(&mut reporter).await {
        Ok(Outcome::Completed { bytes, strategy }) => {
            ctx.registry
                .finish(id, JobStatus::Completed, |job| {
                    job.bytes_downloaded = bytes;
                    job.progress_percent = 100.0;
                    if job.total_bytes == 0 {
                        job.total_bytes = bytes;
                    }
                    job.strategy = Some(strategy.to_string());
                    job.message = "Download completed successfully!".to_string();
                })
                .await;
            tracing::info!(job_id = %id, bytes, strategy, "download completed");
            ctx.event_tx
                .send(Event::Completed {
                    id,
                    path: ctx.output_path.clone(),
                    bytes,
                })
                .ok();
        }
        Ok(Outcome::Cancelled { bytes }) => {
            discard_partial(id, &ctx.output_path).await;
            ctx.registry
                .finish(id, JobStatus::Cancelled, |job| {
                    job.message = "Download cancelled".to_string();
                })
                .await;
            tracing::info!(job_id = %id, bytes, "download cancelled");
            ctx.event_tx.send(Event::Cancelled { id }).ok();
        }
        Err(e) => {
            discard_partial(id, &ctx.output_path).await;
            let detail = e.to_string();
            ctx.registry
                .finish(id, JobStatus::Failed, |job| {
                    job.message = format!("Download failed: {}", detail);
                    job.error_detail = Some(detail);
                })
                .await;
            tracing::error!(job_id = %id, error = %e, "download failed");
            ctx.event_tx
                .send(Event::Failed {
                    id,
                    error: e.to_string(),
                })
                .ok();
        }
    }
}

async fn discard_partial(id: JobId, path: &std::path::Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(job_id = %id, path = %path.display(), "removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(job_id = %id, error = %e, "failed to remove partial output"),
    }
}

/// Wait for a job task and fail the job if the task died without finishing it
pub(crate) async fn supervise(
    id: JobId,
    handle: tokio::task::JoinHandle<()>,
    registry: JobRegistry,
    event_tx: broadcast::Sender<Event>,
) {
    let Err(join_error) = handle.await else {
        return;
    };

    let detail = if join_error.is_panic() {
        "download task panicked".to_string()
    } else {
        format!("download task aborted: {}", join_error)
    };

    let marked = registry
        .finish(id, JobStatus::Failed, |job| {
            job.message = format!("Download failed: {}", detail);
            job.error_detail = Some(detail.clone());
        })
        .await;

    if marked {
        tracing::error!(job_id = %id, error = %detail, "download task died");
        event_tx
            .send(Event::Failed {
                id,
                error: detail.clone(),
            })
            .ok();
    }
}

impl MediaDownloader {
    pub(crate) fn emit(&self, event: Event) {
        // no subscribers is fine
        self.event_tx.send(event).ok();
    }
}
