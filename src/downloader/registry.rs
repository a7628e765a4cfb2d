//! In-memory job registry shared by the facade and the download tasks.

use crate::error::{Error, Result};
use crate::types::{DownloadJob, JobId, JobStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// One registered job and the token its task watches
struct JobEntry {
    record: DownloadJob,
    cancel: CancellationToken,
}

/// Registry of download jobs (cloneable, all clones share state)
///
/// Writers are limited to: [`insert`](Self::insert), the owning download task
/// through [`update`](Self::update) and [`finish`](Self::finish), the cancel
/// flag and explicit eviction. Once a job is terminal its record is frozen.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobId, JobEntry>>>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job, returning the token its task should watch
    pub(crate) async fn insert(&self, record: DownloadJob) -> CancellationToken {
        let cancel = CancellationToken::new();
        let entry = JobEntry {
            record,
            cancel: cancel.clone(),
        };
        self.jobs.write().await.insert(entry.record.id, entry);
        cancel
    }

    /// Copy of a job's current record
    pub async fn snapshot(&self, id: JobId) -> Option<DownloadJob> {
        self.jobs.read().await.get(&id).map(|e| e.record.clone())
    }

    /// All jobs, oldest first
    pub async fn list(&self) -> Vec<DownloadJob> {
        let mut jobs: Vec<DownloadJob> = self
            .jobs
            .read()
            .await
            .values()
            .map(|e| e.record.clone())
            .collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    /// Number of registered jobs
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether no jobs are registered
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Mutate a non-terminal job; returns false if the job is unknown or frozen
    pub(crate) async fn update<F>(&self, id: JobId, f: F) -> bool
    where
        F: FnOnce(&mut DownloadJob),
    {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(entry) if !entry.record.status.is_terminal() => {
                f(&mut entry.record);
                true
            }
            _ => false,
        }
    }

    /// Move a job into a terminal state
    ///
    /// Only the first terminal transition wins; later calls return false and
    /// leave the record untouched.
    pub(crate) async fn finish<F>(&self, id: JobId, status: JobStatus, f: F) -> bool
    where
        F: FnOnce(&mut DownloadJob),
    {
        debug_assert!(status.is_terminal());
        self.update(id, |job| {
            job.status = status;
            job.completed_at = Some(Utc::now());
            f(job);
        })
        .await
    }

    /// Flag a job for cancellation
    ///
    /// The owning task observes the token between chunks and performs the
    /// terminal transition itself.
    pub(crate) async fn request_cancel(&self, id: JobId) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("download {} not found", id)))?;

        if entry.record.status.is_terminal() {
            return Err(Error::NotActive {
                id,
                status: entry.record.status,
            });
        }

        entry.record.cancel_requested = true;
        entry.record.message = "Cancellation requested...".to_string();
        entry.cancel.cancel();
        Ok(())
    }

    /// Flag every non-terminal job; returns how many were flagged
    pub(crate) async fn cancel_all(&self) -> usize {
        let mut jobs = self.jobs.write().await;
        let mut flagged = 0;
        for entry in jobs.values_mut() {
            if !entry.record.status.is_terminal() {
                entry.record.cancel_requested = true;
                entry.cancel.cancel();
                flagged += 1;
            }
        }
        flagged
    }

    /// Remove a terminal job's record
    pub(crate) async fn evict(&self, id: JobId) -> Result<DownloadJob> {
        let mut jobs = self.jobs.write().await;
        let status = jobs
            .get(&id)
            .map(|e| e.record.status)
            .ok_or_else(|| Error::NotFound(format!("download {} not found", id)))?;

        if !status.is_terminal() {
            return Err(Error::JobActive { id, status });
        }

        jobs.remove(&id)
            .map(|e| e.record)
            .ok_or_else(|| Error::NotFound(format!("download {} not found", id)))
    }
}
