use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::CompactionDeps;
use super::task::CompactionTask;
use crate::engine::errors::CompactionError;
use crate::engine::types::{CompactionTaskRecord, CompactionTaskState};
use crate::shared::config::{CONFIG, CompactionConfig};

/// Keeps the set of in-flight compaction tasks and advances each of them once per tick.
///
/// Tasks are independent: one tick drives all of them concurrently, and a task that
/// reports itself finished is dropped from the set.
pub struct CompactionInspector {
    tasks: HashMap<i64, CompactionTask>,
    deps: CompactionDeps,
    config: CompactionConfig,
}

impl CompactionInspector {
    pub fn new(deps: CompactionDeps) -> Self {
        Self::with_config(deps, CONFIG.compaction.clone())
    }

    pub fn with_config(deps: CompactionDeps, config: CompactionConfig) -> Self {
        Self {
            tasks: HashMap::new(),
            deps,
            config,
        }
    }

    /// Starts tracking a task record. Records without a positive timeout get the
    /// configured default.
    pub fn enqueue(&mut self, mut record: CompactionTaskRecord) -> Result<(), CompactionError> {
        if self.tasks.contains_key(&record.plan_id) {
            return Err(CompactionError::DuplicatePlan(record.plan_id));
        }
        if self.tasks.len() >= self.config.max_concurrent_tasks {
            return Err(CompactionError::InspectorFull(self.tasks.len()));
        }
        if record.timeout_in_seconds <= 0 {
            record.timeout_in_seconds = self.config.default_timeout_secs;
        }

        debug!(
            target: "compaction_inspector::enqueue",
            plan_id = record.plan_id,
            state = %record.state,
            timeout_secs = record.timeout_in_seconds,
            "Tracking compaction task"
        );
        let task = CompactionTask::new(record, &self.deps, self.config.clone());
        self.tasks.insert(task.plan_id(), task);
        Ok(())
    }

    /// Drives every tracked task one step. Returns the plans that finished, with their final state.
    pub async fn tick(&mut self) -> Vec<(i64, CompactionTaskState)> {
        let steps = self.tasks.values_mut().map(|task| async move {
            let done = task.process().await;
            (task.plan_id(), done, task.get_task_state())
        });
        let outcomes = join_all(steps).await;

        let mut finished = Vec::new();
        for (plan_id, done, state) in outcomes {
            if done {
                self.tasks.remove(&plan_id);
                finished.push((plan_id, state));
            }
        }
        if !finished.is_empty() {
            info!(
                target: "compaction_inspector::tick",
                finished = ?finished,
                remaining = self.tasks.len(),
                "Compaction tasks left the active set"
            );
        }
        finished
    }

    /// Cancels a tracked task. Returns its state if it was tracked.
    pub async fn cancel(&mut self, plan_id: i64, reason: &str) -> Option<CompactionTaskState> {
        let task = self.tasks.get_mut(&plan_id)?;
        let done = task.cancel(reason).await;
        let state = task.get_task_state();
        if done {
            self.tasks.remove(&plan_id);
        } else {
            warn!(target: "compaction_inspector::cancel", plan_id, "Cancel not yet persisted, will retry on tick");
        }
        Some(state)
    }

    pub fn state_of(&self, plan_id: i64) -> Option<CompactionTaskState> {
        self.tasks.get(&plan_id).map(|t| t.get_task_state())
    }

    pub fn get_task(&self, plan_id: i64) -> Option<&CompactionTask> {
        self.tasks.get(&plan_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Ticks every `poll_interval_ms` until `shutdown` flips to true or its sender is dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            target: "compaction_inspector::run",
            poll_interval_ms = self.config.poll_interval_ms,
            "Compaction inspector started"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(
            target: "compaction_inspector::run",
            in_flight = self.tasks.len(),
            "Compaction inspector stopped"
        );
    }
}
