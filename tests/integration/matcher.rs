use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error};

use compaction_coord::engine::meta::{CompactionMeta, MemoryCompactionMeta};
use compaction_coord::engine::types::SegmentState;

/// Final store state a scenario must leave behind.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Expectation {
    /// Persisted task state per plan, keyed by plan id.
    pub states: HashMap<String, String>,
    pub dropped: Vec<i64>,
    pub healthy: Vec<i64>,
    pub compacting: Vec<i64>,
    pub not_compacting: Vec<i64>,
    /// Tasks still tracked by the inspector.
    pub active: Option<usize>,
}

impl Expectation {
    /// Returns a description of every mismatch.
    pub async fn check(&self, meta: &MemoryCompactionMeta, active: usize) -> Vec<String> {
        let mut failures = Vec::new();

        for (plan_id, expected) in &self.states {
            let actual = plan_id
                .parse::<i64>()
                .ok()
                .and_then(|id| meta.task(id))
                .map(|t| t.state.as_str().to_string());
            debug!("Plan {} state: {:?}, expected {}", plan_id, actual, expected);
            if actual.as_deref() != Some(expected.as_str()) {
                failures.push(format!("plan {plan_id}: expected {expected}, found {actual:?}"));
            }
        }

        for id in &self.dropped {
            if meta.segment(*id).map(|s| s.state) != Some(SegmentState::Dropped) {
                failures.push(format!("segment {id} should be dropped"));
            }
        }
        for id in &self.healthy {
            if meta.get_healthy_segment(*id).await.is_none() {
                failures.push(format!("segment {id} should be healthy"));
            }
        }
        for id in &self.compacting {
            if !meta.is_compacting(*id) {
                failures.push(format!("segment {id} should be compacting"));
            }
        }
        for id in &self.not_compacting {
            if meta.is_compacting(*id) {
                failures.push(format!("segment {id} should not be compacting"));
            }
        }
        if let Some(expected) = self.active {
            if expected != active {
                failures.push(format!("expected {expected} active tasks, found {active}"));
            }
        }

        for failure in &failures {
            error!("{}", failure);
        }
        failures
    }
}
