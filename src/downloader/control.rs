//! Job control: poll, cancel, locate and evict downloads.

use crate::error::{Error, Result};
use crate::types::{DownloadJob, JobId, JobStatus};
use std::path::PathBuf;

use super::MediaDownloader;

impl MediaDownloader {
    /// Current snapshot of a job
    ///
    /// Polling never mutates the job; once terminal, every poll returns the
    /// same record.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown (or evicted) job.
    pub async fn poll(&self, id: JobId) -> Result<DownloadJob> {
        self.registry
            .snapshot(id)
            .await
            .ok_or_else(|| Error::NotFound(format!("download {} not found", id)))
    }

    /// Request cancellation of an active job
    ///
    /// The transfer notices the request before writing its next chunk, then
    /// moves the job to `cancelled` and removes the partial file.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown job
    /// - [`Error::NotActive`] if the job already reached a terminal state
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use media_dl::*;
    /// # async fn example(downloader: MediaDownloader, id: JobId) -> Result<()> {
    /// downloader.cancel(id).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        self.registry.request_cancel(id).await?;
        tracing::info!(job_id = %id, "cancellation requested");
        Ok(())
    }

    /// Path of a completed job's output file
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] unless the job exists, completed, and its file is
    /// still on disk.
    pub async fn location(&self, id: JobId) -> Result<PathBuf> {
        let job = self.poll(id).await?;
        if job.status != JobStatus::Completed {
            return Err(Error::NotFound(format!(
                "download {} has no file (status: {})",
                id, job.status
            )));
        }

        match tokio::fs::try_exists(&job.output_path).await {
            Ok(true) => Ok(job.output_path),
            _ => Err(Error::NotFound(format!(
                "file for download {} no longer exists",
                id
            ))),
        }
    }

    /// Forget a finished job and delete its output file
    ///
    /// The crate never evicts on its own; the embedding service decides when
    /// records and files have outlived their use.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] for an unknown job
    /// - [`Error::JobActive`] if the job has not finished yet
    pub async fn evict(&self, id: JobId) -> Result<DownloadJob> {
        let job = self.registry.evict(id).await?;

        match tokio::fs::remove_file(&job.output_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "failed to remove evicted output file");
            }
        }

        tracing::info!(job_id = %id, status = %job.status, "download evicted");
        Ok(job)
    }

    /// All known jobs, oldest first
    pub async fn list_jobs(&self) -> Vec<DownloadJob> {
        self.registry.list().await
    }
}
