use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::CompactionDeps;
use super::lock::SegmentLockCoordinator;
use super::plan_builder::CompactionPlanBuilder;
use crate::engine::errors::{CompactionError, SessionError};
use crate::engine::meta::CompactionMeta;
use crate::engine::session::NodeSessionManager;
use crate::engine::types::{
    CompactionPlan, CompactionPlanResult, CompactionTaskRecord, CompactionTaskState,
    NULL_NODE_ID, WorkerPlanState,
};
use crate::shared::config::CompactionConfig;
use crate::shared::time::{elapsed_since_millis, now_millis};

/// State machine driving one compaction plan from dispatch to a terminal state.
///
/// ```text
/// pipelined -> executing -> meta_saved -> completed
///     |            |-> failed
///     |            `-> cleaned   (deadline or cancel)
///     `-> failed                 (build, lock or dispatch error)
/// ```
///
/// Only this type changes `record.state`; the store just persists it. Every terminal
/// transition is written to the store before the locks are released.
pub struct CompactionTask {
    record: CompactionTaskRecord,
    plan: Option<CompactionPlan>,
    builder: CompactionPlanBuilder,
    locks: SegmentLockCoordinator,
    meta: Arc<dyn CompactionMeta>,
    sessions: Arc<dyn NodeSessionManager>,
    config: CompactionConfig,
    unreachable_polls: u32,
    /// Set when pipelining failed but the `failed` record is not durable yet.
    pending_failure: Option<CompactionError>,
}

impl CompactionTask {
    pub fn new(record: CompactionTaskRecord, deps: &CompactionDeps, config: CompactionConfig) -> Self {
        let mut locks = SegmentLockCoordinator::new(record.plan_id, Arc::clone(&deps.meta));
        // A task recovered mid-flight still owns the flags its earlier incarnation set.
        if matches!(
            record.state,
            CompactionTaskState::Executing | CompactionTaskState::MetaSaved
        ) {
            locks.adopt(&record.input_segments);
        }

        Self {
            builder: CompactionPlanBuilder::new(Arc::clone(&deps.meta), Arc::clone(&deps.allocator)),
            locks,
            meta: Arc::clone(&deps.meta),
            sessions: Arc::clone(&deps.sessions),
            record,
            plan: None,
            config,
            unreachable_polls: 0,
            pending_failure: None,
        }
    }

    pub fn plan_id(&self) -> i64 {
        self.record.plan_id
    }

    pub fn get_task_state(&self) -> CompactionTaskState {
        self.record.state
    }

    pub fn get_task_record(&self) -> &CompactionTaskRecord {
        &self.record
    }

    pub fn get_plan(&self) -> Option<&CompactionPlan> {
        self.plan.as_ref()
    }

    pub fn held_segments(&self) -> Vec<i64> {
        self.locks.held()
    }

    /// Builds a plan for this task's inputs. Allocates new result IDs on every call and
    /// does not touch task state; `process_pipelining` builds once and caches the plan.
    pub async fn build_compaction_request(&self) -> Result<CompactionPlan, CompactionError> {
        self.builder
            .build(&self.record, self.config.result_segments_per_plan)
            .await
    }

    /// Attaches a plan built for this task, e.g. after recovering an executing record.
    pub fn attach_plan(&mut self, plan: CompactionPlan) -> Result<(), CompactionError> {
        if self.plan.is_some() {
            return Err(CompactionError::InvalidState {
                expected: "no cached plan",
                actual: self.record.state.as_str(),
            });
        }
        self.plan = Some(plan);
        Ok(())
    }

    /// Runs whatever step the current state calls for. Returns `true` once the task is terminal.
    pub async fn process(&mut self) -> bool {
        match self.record.state {
            CompactionTaskState::Pipelined if self.pending_failure.is_some() => {
                self.persist_pending_failure().await
            }
            CompactionTaskState::Pipelined => match self.process_pipelining().await {
                Ok(()) => false,
                Err(err) => {
                    if err.is_build_time() {
                        // The driver reschedules these with a fresh task.
                        warn!(
                            target: "compaction_task::process",
                            plan_id = self.record.plan_id,
                            error = %err,
                            "Compaction task could not start"
                        );
                    } else {
                        err.log_error(self.record.plan_id);
                    }
                    self.record.state.is_terminal()
                }
            },
            CompactionTaskState::Executing => self.process_executing().await,
            CompactionTaskState::MetaSaved => self.process_meta_saved().await,
            CompactionTaskState::Completed
            | CompactionTaskState::Failed
            | CompactionTaskState::Cleaned => true,
        }
    }

    /// Build, lock and dispatch. On success the task is `executing`; on any error it is
    /// `failed` and the error is returned to the caller. If the `failed` record could not
    /// be written the task stays `pipelined` and the next call retries only that write.
    pub async fn process_pipelining(&mut self) -> Result<(), CompactionError> {
        if let Some(err) = self.pending_failure.clone() {
            self.persist_pending_failure().await;
            return Err(err);
        }
        if self.record.state != CompactionTaskState::Pipelined {
            return Err(CompactionError::InvalidState {
                expected: CompactionTaskState::Pipelined.as_str(),
                actual: self.record.state.as_str(),
            });
        }
        if self.record.node_id == NULL_NODE_ID {
            return Err(self.fail_pipelining(CompactionError::NodeNotAssigned).await);
        }

        let plan = match self.plan.clone() {
            Some(plan) => plan,
            None => match self.build_compaction_request().await {
                Ok(plan) => {
                    self.plan = Some(plan.clone());
                    plan
                }
                Err(err) => return Err(self.fail_pipelining(err).await),
            },
        };

        let inputs = plan.input_segment_ids();
        if let Err(err) = self.locks.acquire(&inputs).await {
            return Err(self.fail_pipelining(err).await);
        }

        if let Err(err) = self.sessions.dispatch(self.record.node_id, &plan).await {
            return Err(self.fail_pipelining(err.into()).await);
        }

        let mut next = self.record.clone();
        next.state = CompactionTaskState::Executing;
        next.start_time = now_millis();
        next.result_segments = plan.result_segment_ids.clone();
        if let Err(err) = self.meta.save_compaction_task(&next).await {
            // The worker already has the plan; the terminal write will catch the store up.
            // Until then a restart sees a `pipelined` record whose inputs are still flagged.
            warn!(
                target: "compaction_task::process_pipelining",
                plan_id = next.plan_id,
                error = %err,
                "Failed to persist executing state"
            );
        }
        self.record = next;

        info!(
            target: "compaction_task::process_pipelining",
            plan_id = self.record.plan_id,
            node_id = self.record.node_id,
            inputs = ?inputs,
            results = ?self.record.result_segments,
            "Dispatched compaction plan"
        );
        Ok(())
    }

    /// One poll of an executing task. Returns `true` when the task left the active set.
    pub async fn process_executing(&mut self) -> bool {
        match self.record.state {
            CompactionTaskState::Executing => {}
            CompactionTaskState::MetaSaved => return self.process_meta_saved().await,
            CompactionTaskState::Pipelined => return false,
            CompactionTaskState::Completed
            | CompactionTaskState::Failed
            | CompactionTaskState::Cleaned => return true,
        }

        // Checked before the worker so an unresponsive node cannot hold the task open.
        if let Some(elapsed) = self.deadline_exceeded() {
            let reason = CompactionError::DeadlineExceeded {
                elapsed_ms: elapsed.as_millis(),
                timeout_secs: self.record.timeout_in_seconds,
            };
            warn!(
                target: "compaction_task::process_executing",
                plan_id = self.record.plan_id,
                node_id = self.record.node_id,
                elapsed_ms = elapsed.as_millis() as u64,
                timeout_secs = self.record.timeout_in_seconds,
                "Compaction timed out, cleaning task"
            );
            return self
                .finish(CompactionTaskState::Cleaned, Some(reason))
                .await;
        }

        let result = match self
            .sessions
            .get_plan_result(self.record.node_id, self.record.plan_id)
            .await
        {
            Ok(result) => {
                self.unreachable_polls = 0;
                result
            }
            Err(err) => return self.on_poll_error(err).await,
        };

        match result.state {
            WorkerPlanState::Queued | WorkerPlanState::Executing => {
                debug!(
                    target: "compaction_task::process_executing",
                    plan_id = self.record.plan_id,
                    worker_state = ?result.state,
                    "Compaction still running"
                );
                false
            }
            WorkerPlanState::Completed => self.save_segment_meta(result).await,
            WorkerPlanState::Failed => {
                let reason = result
                    .error
                    .unwrap_or_else(|| "worker gave no reason".to_string());
                warn!(
                    target: "compaction_task::process_executing",
                    plan_id = self.record.plan_id,
                    node_id = self.record.node_id,
                    %reason,
                    "Worker reported compaction failure"
                );
                self.finish(
                    CompactionTaskState::Failed,
                    Some(CompactionError::WorkerReportedFailure(reason)),
                )
                .await
            }
        }
    }

    /// Abandons the task without waiting for the worker. Returns `true` once it is `cleaned`
    /// (or was already terminal).
    pub async fn cancel(&mut self, reason: &str) -> bool {
        if self.record.state.is_terminal() {
            return true;
        }
        info!(target: "compaction_task::cancel", plan_id = self.record.plan_id, %reason, "Cancelling compaction task");
        self.finish(
            CompactionTaskState::Cleaned,
            Some(CompactionError::Cancelled(reason.to_string())),
        )
        .await
    }

    fn deadline_exceeded(&self) -> Option<Duration> {
        if !self.record.has_deadline() {
            return None;
        }
        let elapsed = elapsed_since_millis(self.record.start_time);
        let timeout = Duration::from_secs(self.record.timeout_in_seconds as u64);
        (elapsed >= timeout).then_some(elapsed)
    }

    async fn on_poll_error(&mut self, err: SessionError) -> bool {
        self.unreachable_polls = self.unreachable_polls.saturating_add(1);
        warn!(
            target: "compaction_task::process_executing",
            plan_id = self.record.plan_id,
            node_id = self.record.node_id,
            attempts = self.unreachable_polls,
            error = %err,
            "Failed to fetch plan result, will retry"
        );

        match self.config.unreachable_poll_limit {
            Some(limit) if self.unreachable_polls >= limit => {
                self.finish(CompactionTaskState::Failed, Some(err.into())).await
            }
            _ => false,
        }
    }

    async fn save_segment_meta(&mut self, result: CompactionPlanResult) -> bool {
        if let Err(reason) = self.validate_result(&result) {
            error!(
                target: "compaction_task::save_segment_meta",
                plan_id = self.record.plan_id,
                %reason,
                "Rejecting compaction result"
            );
            return self
                .finish(
                    CompactionTaskState::Failed,
                    Some(CompactionError::IllegalPlanResult(reason)),
                )
                .await;
        }

        let added = match self
            .meta
            .complete_compaction_mutation(&self.record, &result)
            .await
        {
            Ok(added) => added,
            Err(err) => {
                warn!(
                    target: "compaction_task::save_segment_meta",
                    plan_id = self.record.plan_id,
                    error = %err,
                    "Failed to apply compaction mutation, will retry"
                );
                return false;
            }
        };

        let mut next = self.record.clone();
        next.state = CompactionTaskState::MetaSaved;
        next.result_segments = added.iter().map(|s| s.id).collect();
        if let Err(err) = self.meta.save_compaction_task(&next).await {
            warn!(
                target: "compaction_task::save_segment_meta",
                plan_id = next.plan_id,
                error = %err,
                "Failed to persist meta_saved state"
            );
        }
        self.record = next;
        info!(
            target: "compaction_task::save_segment_meta",
            plan_id = self.record.plan_id,
            results = ?self.record.result_segments,
            "Saved compaction result segments"
        );

        self.process_meta_saved().await
    }

    async fn process_meta_saved(&mut self) -> bool {
        self.finish(CompactionTaskState::Completed, None).await
    }

    /// Outputs must be non-empty and drawn from the IDs allocated for this plan.
    fn validate_result(&self, result: &CompactionPlanResult) -> Result<(), String> {
        if result.plan_id != self.record.plan_id {
            return Err(format!(
                "result for plan {} returned to plan {}",
                result.plan_id, self.record.plan_id
            ));
        }
        if result.segments.is_empty() {
            return Err("worker reported success without result segments".to_string());
        }

        let allocated: HashSet<i64> = match &self.plan {
            Some(plan) => plan.result_segment_ids.iter().copied().collect(),
            None => self.record.result_segments.iter().copied().collect(),
        };
        let mut seen = HashSet::new();
        for id in result.segment_ids() {
            if !allocated.contains(&id) {
                return Err(format!("result segment {id} was not allocated to this plan"));
            }
            if !seen.insert(id) {
                return Err(format!("result segment {id} reported twice"));
            }
        }
        Ok(())
    }

    /// Persists a terminal state, then releases locks. If the write fails the task stays in
    /// its current state and `false` is returned so the next poll retries the transition.
    async fn finish(
        &mut self,
        state: CompactionTaskState,
        reason: Option<CompactionError>,
    ) -> bool {
        let mut next = self.record.clone();
        next.state = state;
        if let Some(reason) = &reason {
            next.fail_reason = reason.to_string();
        }

        if let Err(err) = self.meta.save_compaction_task(&next).await {
            warn!(
                target: "compaction_task::finish",
                plan_id = next.plan_id,
                target_state = %state,
                error = %err,
                "Failed to persist terminal state, will retry"
            );
            return false;
        }

        self.record = next;
        self.locks.release_all().await;
        info!(
            target: "compaction_task::finish",
            plan_id = self.record.plan_id,
            state = %self.record.state,
            reason = %self.record.fail_reason,
            "Compaction task finished"
        );
        true
    }

    /// Moves a task that never reached `executing` to `failed` and hands the error back.
    /// Locks are released only once the `failed` record is durable.
    async fn fail_pipelining(&mut self, err: CompactionError) -> CompactionError {
        self.pending_failure = Some(err.clone());
        self.persist_pending_failure().await;
        err
    }

    async fn persist_pending_failure(&mut self) -> bool {
        let Some(reason) = self.pending_failure.clone() else {
            return self.record.state.is_terminal();
        };
        if self.finish(CompactionTaskState::Failed, Some(reason)).await {
            self.pending_failure = None;
            return true;
        }
        false
    }
}
