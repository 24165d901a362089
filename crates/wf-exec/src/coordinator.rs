//! Run coordinator
//!
//! Drives one run of a [`TaskGraph`]. A task is dispatched once every
//! predecessor has succeeded; at most `workers` tasks are in flight. A task
//! that fails after its retries marks every downstream task UpstreamFailed
//! while independent branches keep running.

use crate::context::RunContext;
use crate::error::OperatorError;
use crate::events::{EventSink, LogEventSink};
use crate::operators::Execute;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::{Id, JoinError, JoinSet};
use wf_core::{
    NodeFailure, NodeState, Operator, RetryDecision, RetryPolicy, RunResult, RunStatus,
    StateTransition, TaskGraph, TaskName,
};
use wf_db::Warehouse;

/// Coordinator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorOptions {
    /// Maximum tasks in flight
    pub workers: usize,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            workers: 4,
            retry: RetryPolicy::default(),
        }
    }
}

/// Cooperative cancellation shared between the host and a run.
///
/// Once set, no new task is dispatched, pending tasks end Skipped, in-flight
/// attempts finish, and no new retry attempt starts.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Result of running one task to completion, retries included
struct TaskOutcome {
    task: TaskName,
    attempts: u32,
    result: Result<(), OperatorError>,
}

/// Executes task graphs against one warehouse
pub struct RunCoordinator {
    warehouse: Arc<dyn Warehouse>,
    options: CoordinatorOptions,
    events: Arc<dyn EventSink>,
    cancel: CancelSignal,
}

impl RunCoordinator {
    pub fn new(warehouse: Arc<dyn Warehouse>, options: CoordinatorOptions) -> Self {
        Self {
            warehouse,
            options,
            events: Arc::new(LogEventSink),
            cancel: CancelSignal::new(),
        }
    }

    /// Send state transitions to `events` instead of the log
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Handle the host uses to cancel runs of this coordinator
    pub fn cancel_signal(&self) -> CancelSignal {
        self.cancel.clone()
    }

    /// Run every task of `graph` once and report the outcome.
    ///
    /// Task failures never abort the call; they are recorded in the returned
    /// [`RunResult`].
    pub async fn execute(&self, graph: &TaskGraph, ctx: &RunContext) -> RunResult {
        let started_at = Utc::now();
        let workers = self.options.workers.max(1);
        let shared_ctx = Arc::new(ctx.clone());
        let mut tracker = RunTracker::new(graph, &ctx.run_id, self.events.as_ref());

        let mut ready: VecDeque<TaskName> = graph.roots().into();
        let mut queued: HashSet<TaskName> = ready.iter().cloned().collect();
        let mut in_flight: JoinSet<TaskOutcome> = JoinSet::new();
        let mut task_ids: HashMap<Id, TaskName> = HashMap::new();

        log::info!(
            "Starting run {} ({} tasks, {} workers, logical date {})",
            ctx.run_id,
            graph.len(),
            workers,
            ctx.logical_date
        );

        loop {
            while in_flight.len() < workers && !self.cancel.is_cancelled() {
                let Some(name) = ready.pop_front() else {
                    break;
                };
                let Some(operator) = graph.operator(&name) else {
                    continue;
                };
                tracker.transition(&name, NodeState::Running, None);
                let handle = in_flight.spawn(run_with_retries(
                    Arc::new(operator.clone()),
                    Arc::clone(&self.warehouse),
                    Arc::clone(&shared_ctx),
                    self.options.retry.clone(),
                    self.cancel.clone(),
                ));
                task_ids.insert(handle.id(), name);
            }

            let Some(joined) = in_flight.join_next_with_id().await else {
                break;
            };
            let Some(outcome) = joined_outcome(joined, &mut task_ids) else {
                continue;
            };

            tracker.record_attempts(&outcome.task, outcome.attempts);
            match outcome.result {
                Ok(()) => {
                    tracker.transition(&outcome.task, NodeState::Succeeded, None);
                    for successor in graph.successors_of(&outcome.task) {
                        let runnable = tracker.state(&successor) == NodeState::Pending
                            && graph
                                .predecessors_of(&successor)
                                .iter()
                                .all(|p| tracker.state(p) == NodeState::Succeeded);
                        if runnable && queued.insert(successor.clone()) {
                            ready.push_back(successor);
                        }
                    }
                }
                Err(err) => {
                    tracker.transition(&outcome.task, NodeState::Failed, Some(err.to_string()));
                    let reason = format!("upstream task '{}' did not succeed", outcome.task);
                    for descendant in graph.descendants(&outcome.task) {
                        if tracker.state(&descendant) == NodeState::Pending {
                            tracker.transition(
                                &descendant,
                                NodeState::UpstreamFailed,
                                Some(reason.clone()),
                            );
                        }
                    }
                }
            }
        }

        let cancelled = self.cancel.is_cancelled();
        for name in graph.topological_order() {
            match tracker.state(&name) {
                NodeState::Pending => {
                    let reason = if cancelled {
                        "run cancelled"
                    } else {
                        "never became runnable"
                    };
                    tracker.transition(&name, NodeState::Skipped, Some(reason.to_string()));
                }
                NodeState::Running => {
                    tracker.transition(
                        &name,
                        NodeState::Failed,
                        Some("task was aborted".to_string()),
                    );
                }
                _ => {}
            }
        }

        let result = tracker.into_result(graph, ctx.logical_date, started_at, cancelled);
        let summary = result.summary();
        log::info!(
            "Run {} {}: {} succeeded, {} failed, {} upstream failed, {} skipped in {}ms",
            result.run_id,
            result.status,
            summary.succeeded,
            summary.failed,
            summary.upstream_failed,
            summary.skipped,
            summary.duration_ms
        );
        result
    }
}

/// Run one task, retrying per `policy`; attempts never overlap
async fn run_with_retries(
    operator: Arc<Operator>,
    warehouse: Arc<dyn Warehouse>,
    ctx: Arc<RunContext>,
    policy: RetryPolicy,
    cancel: CancelSignal,
) -> TaskOutcome {
    let mut attempt = 0;
    loop {
        attempt += 1;
        log::debug!(
            "Task '{}' ({}) attempt {}",
            operator.name,
            operator.kind_name(),
            attempt
        );
        let err = match run_attempt(&operator, &warehouse, &ctx).await {
            Ok(()) => {
                return TaskOutcome {
                    task: operator.name.clone(),
                    attempts: attempt,
                    result: Ok(()),
                }
            }
            Err(err) => err,
        };

        match policy.decide(attempt, &err) {
            RetryDecision::Retry(delay) if !cancel.is_cancelled() => {
                log::warn!(
                    "Task '{}' attempt {}/{} failed, retrying in {:?}: {}",
                    operator.name,
                    attempt,
                    policy.max_attempts,
                    delay,
                    err
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        log::warn!("Task '{}' not retried: run cancelled", operator.name);
                        return TaskOutcome {
                            task: operator.name.clone(),
                            attempts: attempt,
                            result: Err(err),
                        };
                    }
                }
            }
            _ => {
                return TaskOutcome {
                    task: operator.name.clone(),
                    attempts: attempt,
                    result: Err(err),
                }
            }
        }
    }
}

/// Outcome of a finished worker. A worker that died without reporting fails
/// its task, so descendants still become UpstreamFailed.
fn joined_outcome(
    joined: Result<(Id, TaskOutcome), JoinError>,
    task_ids: &mut HashMap<Id, TaskName>,
) -> Option<TaskOutcome> {
    match joined {
        Ok((id, outcome)) => {
            task_ids.remove(&id);
            Some(outcome)
        }
        Err(e) => {
            let Some(task) = task_ids.remove(&e.id()) else {
                log::error!("Join error for an untracked worker: {}", e);
                return None;
            };
            log::error!("Worker for task '{}' died: {}", task, e);
            Some(TaskOutcome {
                result: Err(OperatorError::Panicked {
                    task: task.to_string(),
                    message: panic_message(e),
                }),
                task,
                attempts: 0,
            })
        }
    }
}

/// One attempt on its own tokio task so a panic becomes an error
async fn run_attempt(
    operator: &Arc<Operator>,
    warehouse: &Arc<dyn Warehouse>,
    ctx: &Arc<RunContext>,
) -> Result<(), OperatorError> {
    let op = Arc::clone(operator);
    let warehouse = Arc::clone(warehouse);
    let ctx = Arc::clone(ctx);
    match tokio::spawn(async move { op.execute(warehouse.as_ref(), &ctx).await }).await {
        Ok(result) => result,
        Err(e) => Err(OperatorError::Panicked {
            task: operator.name.to_string(),
            message: panic_message(e),
        }),
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Node states of one run plus the events they produce
struct RunTracker<'a> {
    run_id: String,
    states: HashMap<TaskName, NodeState>,
    attempts: HashMap<TaskName, u32>,
    errors: HashMap<TaskName, String>,
    events: &'a dyn EventSink,
}

impl<'a> RunTracker<'a> {
    fn new(graph: &TaskGraph, run_id: &str, events: &'a dyn EventSink) -> Self {
        Self {
            run_id: run_id.to_string(),
            states: graph
                .names()
                .into_iter()
                .map(|name| (name, NodeState::Pending))
                .collect(),
            attempts: HashMap::new(),
            errors: HashMap::new(),
            events,
        }
    }

    fn state(&self, task: &str) -> NodeState {
        self.states.get(task).copied().unwrap_or(NodeState::Pending)
    }

    fn record_attempts(&mut self, task: &TaskName, attempts: u32) {
        self.attempts.insert(task.clone(), attempts);
    }

    fn transition(&mut self, task: &TaskName, to: NodeState, error: Option<String>) {
        let from = self.state(task);
        if !from.can_transition_to(to) {
            log::warn!("Ignoring illegal transition of '{}': {} -> {}", task, from, to);
            return;
        }
        self.states.insert(task.clone(), to);
        if let Some(error) = &error {
            self.errors.insert(task.clone(), error.clone());
        }
        self.events.emit(&StateTransition {
            run_id: self.run_id.clone(),
            task: task.clone(),
            from,
            to,
            timestamp: Utc::now(),
            error,
        });
    }

    fn into_result(
        mut self,
        graph: &TaskGraph,
        logical_date: DateTime<Utc>,
        started_at: DateTime<Utc>,
        cancelled: bool,
    ) -> RunResult {
        let failures: Vec<NodeFailure> = graph
            .topological_order()
            .into_iter()
            .filter_map(|task| {
                let state = self
                    .states
                    .get(&task)
                    .copied()
                    .unwrap_or(NodeState::Pending);
                if !state.blocks_successors() {
                    return None;
                }
                Some(NodeFailure {
                    error: self.errors.remove(&task).unwrap_or_default(),
                    attempts: self.attempts.get(&task).copied().unwrap_or(0),
                    task,
                    state,
                })
            })
            .collect();

        let status = if failures.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };

        RunResult {
            run_id: self.run_id,
            logical_date,
            status,
            started_at,
            finished_at: Utc::now(),
            nodes: self.states.into_iter().collect(),
            failures,
            cancelled,
        }
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
