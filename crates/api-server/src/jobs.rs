//! Background dispatch jobs started through the API.
//!
//! Each job runs one `Dispatcher::run` in its own task under a supervisor.
//! The supervisor relays running snapshots to the job's public progress
//! channel and publishes the terminal snapshot only after the per-recipient
//! results are attached. A run that panics ends the job as `aborted`.
//! Finished jobs are evicted oldest first once more than the configured
//! number are retained.

use academy_core::types::{DispatchProgress, DispatchState, Recipient};
use academy_messaging::{DeliveryRecord, Dispatcher, TemplateValues};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_MAX_FINISHED_JOBS: usize = 100;

struct DispatchJob {
    seq: u64,
    template_id: Option<Uuid>,
    selection: String,
    created_at: DateTime<Utc>,
    progress: watch::Receiver<DispatchProgress>,
    cancel: CancellationToken,
    deliveries: Option<Vec<DeliveryRecord>>,
    error: Option<String>,
}

/// Client-facing view of a dispatch job.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DispatchJobView {
    pub id: Uuid,
    pub template_id: Option<Uuid>,
    pub selection: String,
    pub created_at: DateTime<Utc>,
    pub progress: DispatchProgress,
    /// Present once the job has reached a terminal state.
    pub deliveries: Option<Vec<DeliveryRecord>>,
    /// Why an `aborted` job stopped.
    pub error: Option<String>,
}

/// Parameters of one job.
pub struct JobSpec {
    pub template_id: Option<Uuid>,
    pub selection: String,
    pub recipients: Vec<Recipient>,
    pub body: String,
    pub globals: TemplateValues,
}

pub struct DispatchJobRegistry {
    dispatcher: Arc<Dispatcher>,
    jobs: DashMap<Uuid, DispatchJob>,
    seq: AtomicU64,
    max_finished: usize,
}

impl DispatchJobRegistry {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self::with_retention(dispatcher, DEFAULT_MAX_FINISHED_JOBS)
    }

    /// Keep at most `max_finished` terminal jobs between two starts.
    pub fn with_retention(dispatcher: Arc<Dispatcher>, max_finished: usize) -> Self {
        Self {
            dispatcher,
            jobs: DashMap::new(),
            seq: AtomicU64::new(0),
            max_finished,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Register a job and start it in the background. The returned view
    /// reflects the job before its first send.
    pub fn start(self: &Arc<Self>, spec: JobSpec) -> DispatchJobView {
        self.evict_finished();

        let id = Uuid::new_v4();
        let initial = DispatchProgress {
            total: spec.recipients.len(),
            ..DispatchProgress::idle()
        };
        let (tx, rx) = watch::channel(initial);
        let cancel = CancellationToken::new();
        let view = DispatchJobView {
            id,
            template_id: spec.template_id,
            selection: spec.selection.clone(),
            created_at: Utc::now(),
            progress: initial,
            deliveries: None,
            error: None,
        };

        self.jobs.insert(
            id,
            DispatchJob {
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
                template_id: view.template_id,
                selection: view.selection.clone(),
                created_at: view.created_at,
                progress: rx,
                cancel: cancel.clone(),
                deliveries: None,
                error: None,
            },
        );
        info!(
            job_id = %id,
            selection = %spec.selection,
            recipients = spec.recipients.len(),
            "Dispatch job started"
        );

        let registry = Arc::clone(self);
        tokio::spawn(async move { registry.supervise(id, spec, tx, cancel).await });

        view
    }

    async fn supervise(
        self: Arc<Self>,
        id: Uuid,
        spec: JobSpec,
        public: watch::Sender<DispatchProgress>,
        cancel: CancellationToken,
    ) {
        let (run_tx, mut run_rx) = watch::channel(*public.borrow());
        let dispatcher = Arc::clone(&self.dispatcher);
        let mut run = tokio::spawn(async move {
            dispatcher
                .run(&spec.recipients, &spec.body, &spec.globals, &run_tx, &cancel)
                .await
        });

        let result = loop {
            tokio::select! {
                biased;
                result = &mut run => break result,
                changed = run_rx.changed() => match changed {
                    Ok(()) => {
                        let snapshot = *run_rx.borrow_and_update();
                        if !snapshot.state.is_terminal() {
                            public.send_replace(snapshot);
                        }
                    }
                    // Run is finishing; its sender went away with it.
                    Err(_) => break (&mut run).await,
                },
            }
        };

        let (progress, deliveries, failure) = match result {
            Ok(outcome) => (outcome.progress, outcome.deliveries, None),
            Err(e) => {
                let mut last = *run_rx.borrow();
                last.state = DispatchState::Aborted;
                error!(job_id = %id, error = %e, "Dispatch job aborted");
                metrics::counter!("api.dispatches.aborted").increment(1);
                (last, Vec::new(), Some(format!("dispatch task failed: {e}")))
            }
        };

        if let Some(mut job) = self.jobs.get_mut(&id) {
            job.deliveries = Some(deliveries);
            job.error = failure;
        }
        public.send_replace(progress);
        debug!(job_id = %id, state = ?progress.state, "Dispatch job finished");
    }

    /// Drop the oldest terminal jobs beyond the retention bound.
    fn evict_finished(&self) {
        let mut finished: Vec<(u64, Uuid)> = self
            .jobs
            .iter()
            .filter(|entry| entry.progress.borrow().state.is_terminal())
            .map(|entry| (entry.seq, *entry.key()))
            .collect();
        if finished.len() <= self.max_finished {
            return;
        }

        finished.sort_unstable();
        let excess = finished.len() - self.max_finished;
        for (_, id) in finished.into_iter().take(excess) {
            self.jobs.remove(&id);
        }
        debug!(evicted = excess, "Evicted finished dispatch jobs");
    }

    pub fn get(&self, id: Uuid) -> Option<DispatchJobView> {
        self.jobs.get(&id).map(|job| Self::view(id, &job))
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<DispatchJobView> {
        let mut views: Vec<(u64, DispatchJobView)> = self
            .jobs
            .iter()
            .map(|entry| (entry.seq, Self::view(*entry.key(), entry.value())))
            .collect();
        views.sort_by(|a, b| b.0.cmp(&a.0));
        views.into_iter().map(|(_, view)| view).collect()
    }

    /// Request cooperative cancellation. The job stops before its next
    /// recipient; a send already in flight completes.
    pub fn cancel(&self, id: Uuid) -> Option<DispatchJobView> {
        let job = self.jobs.get(&id)?;
        if !job.progress.borrow().state.is_terminal() {
            job.cancel.cancel();
            info!(job_id = %id, "Dispatch job cancellation requested");
        }
        Some(Self::view(id, &job))
    }

    /// Resolve once the job reaches a terminal state, or its supervisor is
    /// gone.
    pub async fn wait(&self, id: Uuid) -> Option<DispatchJobView> {
        let mut rx = self.jobs.get(&id)?.progress.clone();
        if rx.wait_for(|p| p.state.is_terminal()).await.is_err() {
            warn!(job_id = %id, "Dispatch job supervisor ended without a terminal state");
        }
        self.get(id)
    }

    fn view(id: Uuid, job: &DispatchJob) -> DispatchJobView {
        DispatchJobView {
            id,
            template_id: job.template_id,
            selection: job.selection.clone(),
            created_at: job.created_at,
            progress: *job.progress.borrow(),
            deliveries: job.deliveries.clone(),
            error: job.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use academy_core::error::AcademyResult;
    use academy_core::types::StudentStatus;
    use academy_messaging::{DispatchConfig, MessageSender, SimulatedSender};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Succeeds for every phone except the one it panics on.
    struct PanickingSender {
        panic_on: String,
    }

    #[async_trait]
    impl MessageSender for PanickingSender {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn send(&self, to: &str, _body: &str) -> AcademyResult<String> {
            if to == self.panic_on {
                panic!("provider client crashed");
            }
            Ok(format!("ok-{to}"))
        }
    }

    fn registry(pacing: Duration) -> Arc<DispatchJobRegistry> {
        let dispatcher = Dispatcher::new(Arc::new(SimulatedSender::new()), DispatchConfig { pacing });
        Arc::new(DispatchJobRegistry::new(Arc::new(dispatcher)))
    }

    fn spec(n: usize) -> JobSpec {
        JobSpec {
            template_id: None,
            selection: "all".to_string(),
            recipients: (0..n)
                .map(|i| Recipient {
                    id: Uuid::new_v4(),
                    name: format!("Student {i}"),
                    phone: format!("551190000{i:04}"),
                    course: None,
                    status: StudentStatus::Active,
                })
                .collect(),
            body: "Hi {name}".to_string(),
            globals: TemplateValues::new(),
        }
    }

    #[tokio::test]
    async fn test_job_runs_to_completion() {
        let registry = registry(Duration::ZERO);
        let started = registry.start(spec(3));
        assert_eq!(started.progress.total, 3);

        let done = registry.wait(started.id).await.unwrap();
        assert_eq!(done.progress.state, DispatchState::Completed);
        assert_eq!(done.progress.succeeded, 3);
        assert_eq!(done.deliveries.unwrap().len(), 3);
        assert_eq!(registry.list().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_running_job() {
        let registry = registry(Duration::from_secs(60));
        let started = registry.start(spec(5));
        tokio::task::yield_now().await;

        registry.cancel(started.id).unwrap();
        let done = registry.wait(started.id).await.unwrap();
        assert_eq!(done.progress.state, DispatchState::Cancelled);
        assert!(done.progress.processed() < 5);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let registry = registry(Duration::ZERO);
        assert!(registry.get(Uuid::new_v4()).is_none());
        assert!(registry.cancel(Uuid::new_v4()).is_none());
    }

    #[tokio::test]
    async fn test_terminal_state_is_published_with_deliveries() {
        let registry = registry(Duration::ZERO);
        let id = registry.start(spec(4)).id;

        loop {
            let view = registry.get(id).unwrap();
            if view.progress.state.is_terminal() {
                assert_eq!(view.progress.state, DispatchState::Completed);
                assert_eq!(view.deliveries.unwrap().len(), 4);
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_panicking_sender_aborts_job() {
        let dispatcher = Dispatcher::new(
            Arc::new(PanickingSender {
                panic_on: "5511900000001".to_string(),
            }),
            DispatchConfig {
                pacing: Duration::ZERO,
            },
        );
        let registry = Arc::new(DispatchJobRegistry::new(Arc::new(dispatcher)));
        let id = registry.start(spec(3)).id;

        let done = tokio::time::timeout(Duration::from_secs(5), registry.wait(id))
            .await
            .expect("wait must resolve for an aborted job")
            .unwrap();
        assert_eq!(done.progress.state, DispatchState::Aborted);
        assert_eq!(done.progress.succeeded, 1);
        assert!(done.error.is_some());
        assert!(done.deliveries.is_some());

        // A terminal job can no longer be cancelled.
        assert_eq!(
            registry.cancel(id).unwrap().progress.state,
            DispatchState::Aborted
        );
    }

    #[tokio::test]
    async fn test_finished_jobs_are_evicted_oldest_first() {
        let dispatcher = Dispatcher::new(
            Arc::new(SimulatedSender::new()),
            DispatchConfig {
                pacing: Duration::ZERO,
            },
        );
        let registry = Arc::new(DispatchJobRegistry::with_retention(Arc::new(dispatcher), 2));

        let mut ids = Vec::new();
        for _ in 0..5 {
            let id = registry.start(spec(1)).id;
            registry.wait(id).await.unwrap();
            ids.push(id);
        }

        // Two finished jobs survive the last start, plus the last job itself.
        let listed: Vec<Uuid> = registry.list().into_iter().map(|v| v.id).collect();
        assert_eq!(listed, vec![ids[4], ids[3], ids[2]]);
        assert!(registry.get(ids[0]).is_none());
        assert!(registry.get(ids[1]).is_none());
    }
}
