// Cron scheduler
//
// Owns a cron wheel and keeps it consistent with the store: reconcile()
// drops every current binding and rebuilds the set from
// list_enabled_scheduled(). Each binding captures its own Workflow snapshot,
// so a later mutation of the stored workflow never leaks into an already
// registered binding; convergence happens at the next reconcile.

use std::sync::Arc;

use camshaft_core::Workflow;
use camshaft_storage::{StoreError, WorkflowStore};
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use uuid::Uuid;

use crate::executor;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("cron wheel error: {0}")]
    Wheel(#[from] JobSchedulerError),
}

/// Cron-driven dispatcher for scheduled workflows
pub struct Scheduler {
    wheel: RwLock<JobScheduler>,
    /// Job ids currently registered; also serializes reconciles
    bindings: Mutex<Vec<Uuid>>,
    store: Arc<dyn WorkflowStore>,
    http: reqwest::Client,
}

impl Scheduler {
    pub async fn new(
        store: Arc<dyn WorkflowStore>,
        http: reqwest::Client,
    ) -> Result<Self, SchedulerError> {
        let wheel = JobScheduler::new().await?;
        Ok(Self {
            wheel: RwLock::new(wheel),
            bindings: Mutex::new(Vec::new()),
            store,
            http,
        })
    }

    /// Load the current binding set and start the wheel's tick loop
    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.reconcile().await?;
        let wheel = self.wheel.read().await;
        wheel.start().await?;
        tracing::info!("scheduler started");
        Ok(())
    }

    /// Fence off new firings; in-flight executions finish on their own tasks
    /// and still write their terminal state.
    pub async fn stop(&self) -> Result<(), SchedulerError> {
        let mut wheel = self.wheel.write().await;
        wheel.shutdown().await?;
        tracing::info!("scheduler stopped");
        Ok(())
    }

    /// Rebuild the binding set from the store
    ///
    /// Called once at startup and after every successful API mutation. A
    /// workflow whose cron spec is missing or does not parse is logged and
    /// skipped; it simply never fires.
    pub async fn reconcile(&self) -> Result<(), SchedulerError> {
        let mut bindings = self.bindings.lock().await;

        {
            let wheel = self.wheel.read().await;
            for job_id in bindings.drain(..) {
                if let Err(err) = wheel.remove(&job_id).await {
                    tracing::warn!("failed to remove cron binding {}: {}", job_id, err);
                }
            }
        }

        let workflows = self.store.list_enabled_scheduled().await?;
        let total = workflows.len();

        for workflow in workflows {
            let spec = match workflow.trigger.cron_spec() {
                Some(spec) if !spec.trim().is_empty() => normalize_cron(spec),
                _ => {
                    tracing::warn!(
                        workflow_id = %workflow.id,
                        name = %workflow.name,
                        "schedule trigger has missing or empty cron spec, skipping"
                    );
                    continue;
                }
            };

            let job = match make_binding(&spec, workflow.clone(), self.store.clone(), self.http.clone())
            {
                Ok(job) => job,
                Err(err) => {
                    tracing::warn!(
                        workflow_id = %workflow.id,
                        name = %workflow.name,
                        cron = %spec,
                        "invalid cron spec, skipping: {}",
                        err
                    );
                    continue;
                }
            };

            let wheel = self.wheel.read().await;
            match wheel.add(job).await {
                Ok(job_id) => bindings.push(job_id),
                Err(err) => {
                    tracing::warn!(
                        workflow_id = %workflow.id,
                        "failed to register cron binding: {}",
                        err
                    );
                }
            }
        }

        tracing::info!(
            scheduled = bindings.len(),
            candidates = total,
            "scheduler reconciled"
        );
        Ok(())
    }

    /// Number of live bindings
    pub async fn binding_count(&self) -> usize {
        self.bindings.lock().await.len()
    }
}

/// The wheel is seconds-based; classic 5-field specs gain a zero seconds
/// field so they keep their minute precision.
fn normalize_cron(spec: &str) -> String {
    let trimmed = spec.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// Build one cron binding for a workflow snapshot
///
/// The closure takes ownership of its own Workflow clone. The overlap guard
/// lives with the binding: a firing that cannot acquire it is dropped, so at
/// most one execution of this binding runs at a time, and a re-added binding
/// starts with a fresh guard.
fn make_binding(
    spec: &str,
    workflow: Workflow,
    store: Arc<dyn WorkflowStore>,
    http: reqwest::Client,
) -> Result<Job, JobSchedulerError> {
    let guard = Arc::new(Mutex::new(()));

    Job::new_async(spec, move |_job_id, _wheel| {
        let workflow = workflow.clone();
        let store = store.clone();
        let http = http.clone();
        let guard = guard.clone();

        Box::pin(async move {
            fire(workflow, store, http, guard).await;
        })
    })
}

/// One cron firing: apply the overlap policy, then hand off to the executor
async fn fire(
    workflow: Workflow,
    store: Arc<dyn WorkflowStore>,
    http: reqwest::Client,
    guard: Arc<Mutex<()>>,
) {
    let _running = match guard.try_lock() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!(
                workflow_id = %workflow.id,
                name = %workflow.name,
                "previous execution still running, dropping this firing"
            );
            return;
        }
    };

    tracing::info!(
        workflow_id = %workflow.id,
        name = %workflow.name,
        "triggering scheduled workflow"
    );
    executor::execute_workflow(workflow, store, http).await;
}
