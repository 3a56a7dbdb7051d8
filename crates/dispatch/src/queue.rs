//! Idempotent job execution facility.
//!
//! Submission claims `confab:job:<id>` in the shared store with
//! `set_if_absent`, so a redelivered provider event is a no-op in every
//! worker process, not just this one. The claim outlives the job by the
//! dedup TTL; there is no un-claim on failure — a failed job is not
//! retried by redelivery either.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use {
    serde_json::Value,
    tracing::{debug, error, info},
};

use {confab_config::DispatchMode, confab_store::KvStore};

use crate::Result;

const JOB_PREFIX: &str = "confab:job:";

/// Boxed job body.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Fired with the job id at the job boundary.
pub type JobHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submit {
    Scheduled,
    /// The id was already claimed; the job was dropped.
    Duplicate,
}

pub struct JobQueue {
    store: Arc<dyn KvStore>,
    mode: DispatchMode,
    dedup_ttl: Duration,
    on_success: Option<JobHook>,
    on_failure: Option<JobHook>,
}

impl JobQueue {
    pub fn new(store: Arc<dyn KvStore>, mode: DispatchMode, dedup_ttl: Duration) -> Self {
        Self {
            store,
            mode,
            dedup_ttl,
            on_success: None,
            on_failure: None,
        }
    }

    pub fn on_success(mut self, hook: JobHook) -> Self {
        self.on_success = Some(hook);
        self
    }

    pub fn on_failure(mut self, hook: JobHook) -> Self {
        self.on_failure = Some(hook);
        self
    }

    /// Claim `job_id` and run the job, either spawned or in-place
    /// depending on the configured mode. A duplicate id drops the job
    /// without running it.
    pub async fn submit(&self, job_id: &str, job: JobFuture) -> Result<Submit> {
        let key = format!("{JOB_PREFIX}{job_id}");
        let claimed = self
            .store
            .set_if_absent(&key, &Value::Bool(true), self.dedup_ttl)
            .await?;
        if !claimed {
            info!(job_id, "duplicate delivery dropped");
            return Ok(Submit::Duplicate);
        }

        let job_id = job_id.to_string();
        let on_success = self.on_success.clone();
        let on_failure = self.on_failure.clone();
        match self.mode {
            DispatchMode::Inline => run(job_id, job, on_success, on_failure).await,
            DispatchMode::Background => {
                tokio::spawn(run(job_id, job, on_success, on_failure));
            },
        }
        Ok(Submit::Scheduled)
    }
}

/// The job boundary: failures are logged with full context and never
/// propagate into the worker.
async fn run(
    job_id: String,
    job: JobFuture,
    on_success: Option<JobHook>,
    on_failure: Option<JobHook>,
) {
    match job.await {
        Ok(()) => {
            debug!(job_id, "job completed");
            if let Some(hook) = on_success {
                hook(&job_id);
            }
        },
        Err(e) => {
            error!(job_id, error = ?e, "job failed");
            if let Some(hook) = on_failure {
                hook(&job_id);
            }
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use confab_store::MemoryKv;

    use super::*;

    fn queue(mode: DispatchMode) -> JobQueue {
        JobQueue::new(Arc::new(MemoryKv::new()), mode, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn same_job_id_runs_once() {
        let queue = queue(DispatchMode::Inline);
        let runs = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let runs = Arc::clone(&runs);
            queue
                .submit(
                    "wh:u1:m1",
                    Box::pin(async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .await
                .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_job_ids_both_run() {
        let queue = queue(DispatchMode::Inline);
        let runs = Arc::new(AtomicUsize::new(0));

        for id in ["wh:u1:m1", "wh:u1:m2"] {
            let runs = Arc::clone(&runs);
            queue
                .submit(
                    id,
                    Box::pin(async move {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }),
                )
                .await
                .unwrap();
        }

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn submit_reports_duplicate() {
        let queue = queue(DispatchMode::Inline);

        let first = queue.submit("wh:u1:m1", Box::pin(async { Ok(()) })).await.unwrap();
        let second = queue.submit("wh:u1:m1", Box::pin(async { Ok(()) })).await.unwrap();

        assert_eq!(first, Submit::Scheduled);
        assert_eq!(second, Submit::Duplicate);
    }

    #[tokio::test]
    async fn hooks_fire_at_the_job_boundary() {
        let succeeded = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        let queue = {
            let succeeded = Arc::clone(&succeeded);
            let failed = Arc::clone(&failed);
            queue(DispatchMode::Inline)
                .on_success(Arc::new(move |_| {
                    succeeded.fetch_add(1, Ordering::SeqCst);
                }))
                .on_failure(Arc::new(move |_| {
                    failed.fetch_add(1, Ordering::SeqCst);
                }))
        };

        queue.submit("ok", Box::pin(async { Ok(()) })).await.unwrap();
        queue
            .submit("boom", Box::pin(async { anyhow::bail!("engine exploded") }))
            .await
            .unwrap();

        assert_eq!(succeeded.load(Ordering::SeqCst), 1);
        assert_eq!(failed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_job_does_not_poison_the_queue() {
        let queue = queue(DispatchMode::Inline);

        queue
            .submit("boom", Box::pin(async { anyhow::bail!("engine exploded") }))
            .await
            .unwrap();

        let ran = Arc::new(AtomicUsize::new(0));
        let runs = Arc::clone(&ran);
        queue
            .submit(
                "next",
                Box::pin(async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            )
            .await
            .unwrap();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
