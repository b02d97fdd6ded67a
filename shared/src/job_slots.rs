/// Bounded pool of extraction/download slots.
///
/// Every info or download request runs inside a slot; at most
/// `max_concurrent` yt-dlp processes or media fetches are in flight at once,
/// further requests wait for a slot to free up.
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::models::Platform;

/// What a job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Info,
    Download,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Running,
    Done,
    Failed,
}

/// A job known to the pool.
#[derive(Debug, Clone)]
pub struct TrackedJob {
    pub job_id: String,
    pub platform: Platform,
    pub kind: JobKind,
    pub state: JobState,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Pool with concurrency control and job bookkeeping.
#[derive(Clone)]
pub struct JobSlots {
    semaphore: Arc<Semaphore>,
    jobs: Arc<Mutex<HashMap<String, TrackedJob>>>,
    max_concurrent: usize,
}

/// Marks its job failed if dropped before completion (e.g. the client went away).
struct JobGuard {
    job_id: String,
    jobs: Arc<Mutex<HashMap<String, TrackedJob>>>,
    finished: bool,
}

impl JobGuard {
    fn finish(mut self, state: JobState) {
        set_finished(&self.jobs, &self.job_id, state);
        self.finished = true;
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Job {} abandoned before completion", self.job_id);
            set_finished(&self.jobs, &self.job_id, JobState::Failed);
        }
    }
}

fn set_finished(jobs: &Mutex<HashMap<String, TrackedJob>>, job_id: &str, state: JobState) {
    if let Ok(mut jobs) = jobs.lock() {
        if let Some(job) = jobs.get_mut(job_id) {
            job.state = state;
            job.finished_at = Some(Utc::now());
        }
    }
}

impl JobSlots {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            max_concurrent,
        }
    }

    /// Run `job` once a slot is free. The slot is held until `job` resolves.
    pub async fn run<F, T, E>(&self, platform: Platform, kind: JobKind, job: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.track(&job_id, platform, kind);

        let guard = JobGuard {
            job_id: job_id.clone(),
            jobs: self.jobs.clone(),
            finished: false,
        };

        // The semaphore is never closed, so acquisition only fails on shutdown.
        let _permit = self.semaphore.clone().acquire_owned().await.ok();
        self.mark_running(&job_id);
        debug!("Job {} ({} {:?}) acquired slot", job_id, platform, kind);

        let result = job.await;
        guard.finish(if result.is_ok() { JobState::Done } else { JobState::Failed });
        debug!("Job {} finished, slot released", job_id);
        result
    }

    fn track(&self, job_id: &str, platform: Platform, kind: JobKind) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.insert(
                job_id.to_string(),
                TrackedJob {
                    job_id: job_id.to_string(),
                    platform,
                    kind,
                    state: JobState::Waiting,
                    enqueued_at: Utc::now(),
                    started_at: None,
                    finished_at: None,
                },
            );
        }
    }

    fn mark_running(&self, job_id: &str) {
        if let Ok(mut jobs) = self.jobs.lock() {
            if let Some(job) = jobs.get_mut(job_id) {
                job.state = JobState::Running;
                job.started_at = Some(Utc::now());
            }
        }
    }

    /// Pool statistics.
    pub fn stats(&self) -> SlotStats {
        let jobs = match self.jobs.lock() {
            Ok(jobs) => jobs,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = |state: JobState| jobs.values().filter(|j| j.state == state).count();
        SlotStats {
            max_concurrent: self.max_concurrent,
            running: count(JobState::Running),
            waiting: count(JobState::Waiting),
            completed: count(JobState::Done),
            failed: count(JobState::Failed),
        }
    }

    /// Forget finished jobs older than `max_age_secs`. Returns how many were dropped.
    pub fn cleanup_old(&self, max_age_secs: i64) -> usize {
        let cutoff = Utc::now() - chrono::Duration::seconds(max_age_secs);
        let Ok(mut jobs) = self.jobs.lock() else {
            return 0;
        };
        let before = jobs.len();
        jobs.retain(|_, j| match j.finished_at {
            Some(finished) => finished > cutoff,
            None => true,
        });
        before - jobs.len()
    }
}

/// Pool statistics snapshot.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SlotStats {
    pub max_concurrent: usize,
    pub running: usize,
    pub waiting: usize,
    pub completed: usize,
    pub failed: usize,
}
