//! Level-ordered execution of a compiled plan.
//!
//! The runner walks [`ExecutablePlan::levels`] in order. Nodes within a level
//! share only an immutable state snapshot and run concurrently; their patches
//! are merged back in stable level order, so a run is deterministic given
//! deterministic executors. The session is checkpointed after every merged
//! level, and the idle timer is cleared on entry and rearmed on every exit
//! path that leaves the session alive, including cancellation.
//!
//! Every run owns its own event channel: [`FlowRunner::spawn`] hands the
//! receiver back through the [`RunHandle`], so streams from different runs
//! never interleave. Event contract per run: `flow_start` first, then per
//! node `node_start` followed by any `node_streaming` chunks and one
//! `node_complete` or `node_error`; exactly one terminal event
//! (`flow_complete` or `flow_error`) closes the stream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use rustc_hash::FxHashSet;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::engine::config::EngineConfig;
use crate::engine::session::SessionStore;
use crate::events::{EventBus, FlowEvent};
use crate::executors::{ExecContext, ExecutorError};
use crate::graph::compiler::ExecutablePlan;
use crate::state::{NodeOutput, RunState, StatePatch};
use crate::types::SessionId;
use crate::utils::IdGenerator;

/// Why a run could not start or finish.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Session state is exclusively owned by one active run.
    #[error("session {0} already has an active run")]
    SessionBusy(SessionId),

    #[error("session {session_id} exceeded the invocation limit (count {current_count})")]
    RateLimited {
        session_id: SessionId,
        current_count: u32,
    },

    /// A fatal executor error aborted the run. Accumulated node outputs stay
    /// inspectable in the checkpointed state.
    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error("run was cancelled")]
    Cancelled,

    #[error("run task panicked: {0}")]
    Join(String),
}

/// Drives compiled plans against a session store, emitting flow events.
pub struct FlowRunner {
    plan: Arc<ExecutablePlan>,
    store: Arc<dyn SessionStore>,
    config: EngineConfig,
    active: Arc<Mutex<FxHashSet<SessionId>>>,
}

impl FlowRunner {
    #[must_use]
    pub fn new(plan: ExecutablePlan, store: Arc<dyn SessionStore>, config: EngineConfig) -> Self {
        Self {
            plan: Arc::new(plan),
            store,
            config,
            active: Arc::new(Mutex::new(FxHashSet::default())),
        }
    }

    /// Execute the plan to completion for one session, discarding events.
    /// Use [`spawn`](Self::spawn) to consume the run's event stream.
    pub async fn run(&self, session_id: &str, state: RunState) -> Result<RunState, RunnerError> {
        let bus = EventBus::new();
        self.run_on(session_id, state, &bus).await
    }

    /// Run in a background task with a dedicated event channel. The handle
    /// exposes the run's receiver and aborts the run when dropped.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, session_id: &str, state: RunState) -> RunHandle {
        let bus = EventBus::new();
        let events = bus.receiver();
        let runner = Arc::clone(self);
        let session_id = session_id.to_string();
        let task = tokio::spawn(async move { runner.run_on(&session_id, state, &bus).await });
        RunHandle {
            task: Some(task),
            events,
        }
    }

    #[tracing::instrument(skip(self, state, bus), fields(session_id = %session_id))]
    async fn run_on(
        &self,
        session_id: &str,
        state: RunState,
        bus: &EventBus,
    ) -> Result<RunState, RunnerError> {
        let _slot = ActiveSlot::claim(&self.active, session_id)?;
        let run_id = IdGenerator.run_id();
        tracing::info!(%run_id, levels = self.plan.levels.len(), "run admitted");

        let admission = self.store.begin_invocation(session_id).await;
        if !admission.allowed {
            tracing::warn!(count = admission.current_count, "invocation rejected by rate limit");
            return Err(RunnerError::RateLimited {
                session_id: session_id.to_string(),
                current_count: admission.current_count,
            });
        }

        // Timer resets on every access. The guard covers cancellation: if
        // this future is dropped mid-run, the session must still be able to
        // idle-expire rather than live until an explicit delete.
        self.store.clear_idle_timer(session_id).await;
        let mut rearm = RearmGuard::new(
            Arc::clone(&self.store),
            session_id,
            self.config.idle_timeout,
        );

        let emitter = bus.emitter();
        emitter.emit(FlowEvent::flow_start(session_id));

        let outcome = match self.drive(session_id, state, bus).await {
            Ok(state) => {
                emitter.emit(FlowEvent::flow_complete(state.final_result.clone()));
                self.store.set(session_id, state.clone()).await;
                Ok(state)
            }
            Err((state, err)) => {
                emitter.emit(FlowEvent::flow_error(&err.to_string()));
                // Partial outputs stay inspectable after a fatal error.
                self.store.set(session_id, state).await;
                Err(err.into())
            }
        };

        self.store
            .set_idle_timer(session_id, self.config.idle_timeout)
            .await;
        rearm.disarm();
        outcome
    }

    /// The level loop. On fatal error returns the state accumulated so far
    /// together with the error, so the caller can checkpoint before
    /// surfacing it.
    async fn drive(
        &self,
        session_id: &str,
        mut state: RunState,
        bus: &EventBus,
    ) -> Result<RunState, (RunState, ExecutorError)> {
        let emitter = bus.emitter();
        self.store.set(session_id, state.clone()).await;

        for level in &self.plan.levels {
            for node_id in level {
                let planned = &self.plan.nodes[node_id];
                emitter.emit(FlowEvent::node_start(node_id, planned.node_type.clone()));
            }

            let snapshot = &state;
            let invocations = level.iter().map(|node_id| {
                let planned = &self.plan.nodes[node_id];
                let ctx = ExecContext::new(
                    node_id.clone(),
                    planned.outgoing.clone(),
                    planned.incoming.clone(),
                    bus.emitter(),
                );
                async move { (node_id, planned.executor.run(snapshot, &ctx).await) }
            });
            let results = join_all(invocations).await;

            // Merge in stable level order.
            let mut fatal: Option<ExecutorError> = None;
            for (node_id, result) in results {
                let planned = &self.plan.nodes[node_id];
                match result {
                    Ok(patch) => {
                        state.apply(patch);
                        let data = state
                            .node_outputs
                            .get(node_id)
                            .and_then(|output| serde_json::to_value(output).ok());
                        emitter.emit(FlowEvent::node_complete(
                            node_id,
                            planned.node_type.clone(),
                            data,
                        ));
                    }
                    Err(err @ ExecutorError::Recoverable { .. }) => {
                        tracing::warn!(node_id = %node_id, error = %err, "recoverable node failure");
                        state.apply(StatePatch::output_only(
                            node_id,
                            NodeOutput::error(&planned.node_type.encode(), &err.to_string()),
                        ));
                        emitter.emit(FlowEvent::node_error(
                            node_id,
                            planned.node_type.clone(),
                            &err.to_string(),
                        ));
                    }
                    Err(err) => {
                        tracing::error!(node_id = %node_id, error = %err, "fatal node failure");
                        emitter.emit(FlowEvent::node_error(
                            node_id,
                            planned.node_type.clone(),
                            &err.to_string(),
                        ));
                        if fatal.is_none() {
                            fatal = Some(err);
                        }
                    }
                }
            }
            if let Some(err) = fatal {
                return Err((state, err));
            }

            self.store.set(session_id, state.clone()).await;
        }
        Ok(state)
    }
}

/// Ownership marker for a session's single active run. Dropping it releases
/// the slot, including when the run's task is aborted mid-flight.
struct ActiveSlot {
    active: Arc<Mutex<FxHashSet<SessionId>>>,
    session_id: SessionId,
}

impl ActiveSlot {
    fn claim(
        active: &Arc<Mutex<FxHashSet<SessionId>>>,
        session_id: &str,
    ) -> Result<Self, RunnerError> {
        let mut guard = match active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !guard.insert(session_id.to_string()) {
            return Err(RunnerError::SessionBusy(session_id.to_string()));
        }
        Ok(Self {
            active: Arc::clone(active),
            session_id: session_id.to_string(),
        })
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let mut guard = match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(&self.session_id);
    }
}

/// Rearms the session's idle timer when the run is torn down without
/// reaching a normal exit. Disarmed once the exit path has rearmed the timer
/// itself.
struct RearmGuard {
    store: Arc<dyn SessionStore>,
    session_id: SessionId,
    timeout: Duration,
    armed: bool,
}

impl RearmGuard {
    fn new(store: Arc<dyn SessionStore>, session_id: &str, timeout: Duration) -> Self {
        Self {
            store,
            session_id: session_id.to_string(),
            timeout,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RearmGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let store = Arc::clone(&self.store);
        let session_id = std::mem::take(&mut self.session_id);
        let timeout = self.timeout;
        // Drop cannot await; arming on an already-deleted session is a no-op
        // inside the store.
        tokio::spawn(async move {
            store.set_idle_timer(&session_id, timeout).await;
        });
    }
}

/// Handle to a spawned run: the run's own event receiver plus the task.
/// Aborts the task when dropped, so an unawaited run cannot outlive its
/// owner.
pub struct RunHandle {
    task: Option<JoinHandle<Result<RunState, RunnerError>>>,
    events: flume::Receiver<FlowEvent>,
}

impl RunHandle {
    /// This run's event receiver. Carries only this run's events, closed by
    /// its single terminal event.
    #[must_use]
    pub fn events(&self) -> flume::Receiver<FlowEvent> {
        self.events.clone()
    }

    /// Cancel the run. Idempotent; joining afterwards yields
    /// [`RunnerError::Cancelled`].
    pub fn abort(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }

    /// Wait for the run to finish.
    pub async fn join(mut self) -> Result<RunState, RunnerError> {
        let Some(task) = self.task.take() else {
            return Err(RunnerError::Cancelled);
        };
        match task.await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Err(RunnerError::Cancelled),
            Err(err) => Err(RunnerError::Join(err.to_string())),
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if let Some(task) = &self.task {
            task.abort();
        }
    }
}
