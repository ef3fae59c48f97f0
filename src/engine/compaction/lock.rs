use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::engine::errors::CompactionError;
use crate::engine::meta::CompactionMeta;

/// Claims and releases the compacting flag on behalf of one task.
///
/// The coordinator remembers which segments it claimed, so a release only clears
/// flags this task set. Releasing twice, or after another task has claimed the
/// same segment, leaves the other task's lock alone.
pub struct SegmentLockCoordinator {
    plan_id: i64,
    meta: Arc<dyn CompactionMeta>,
    held: BTreeSet<i64>,
}

impl SegmentLockCoordinator {
    pub fn new(plan_id: i64, meta: Arc<dyn CompactionMeta>) -> Self {
        Self {
            plan_id,
            meta,
            held: BTreeSet::new(),
        }
    }

    /// Takes ownership of locks claimed by an earlier incarnation of the same task.
    pub fn adopt(&mut self, segment_ids: &[i64]) {
        self.held.extend(segment_ids.iter().copied());
    }

    /// Marks every listed segment compacting, or none of them.
    pub async fn acquire(&mut self, segment_ids: &[i64]) -> Result<(), CompactionError> {
        let to_lock: Vec<i64> = segment_ids
            .iter()
            .copied()
            .filter(|id| !self.held.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if to_lock.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.meta.set_segments_compacting(&to_lock, true).await {
            let err = CompactionError::from(err);
            warn!(
                target: "segment_lock::acquire",
                plan_id = self.plan_id,
                segment_ids = ?to_lock,
                error = %err,
                "Failed to lock segments"
            );
            return Err(err);
        }

        self.held.extend(to_lock.iter().copied());
        debug!(target: "segment_lock::acquire", plan_id = self.plan_id, segment_ids = ?to_lock, "Locked segments");
        Ok(())
    }

    /// Clears the flag on the listed segments this task holds. Never fails; a store
    /// error keeps the segments in the held set so a later release can retry.
    pub async fn release(&mut self, segment_ids: &[i64]) {
        let to_release: Vec<i64> = segment_ids
            .iter()
            .copied()
            .filter(|id| self.held.contains(id))
            .collect();
        if to_release.is_empty() {
            debug!(target: "segment_lock::release", plan_id = self.plan_id, ?segment_ids, "Nothing held, release is a no-op");
            return;
        }

        match self.meta.set_segments_compacting(&to_release, false).await {
            Ok(()) => {
                for id in &to_release {
                    self.held.remove(id);
                }
                debug!(target: "segment_lock::release", plan_id = self.plan_id, segment_ids = ?to_release, "Released segments");
            }
            Err(err) => {
                warn!(
                    target: "segment_lock::release",
                    plan_id = self.plan_id,
                    segment_ids = ?to_release,
                    error = %err,
                    "Failed to release segments"
                );
            }
        }
    }

    pub async fn release_all(&mut self) {
        if !self.is_holding() {
            return;
        }
        let held: Vec<i64> = self.held.iter().copied().collect();
        self.release(&held).await;
    }

    pub fn held(&self) -> Vec<i64> {
        self.held.iter().copied().collect()
    }

    pub fn is_holding(&self) -> bool {
        !self.held.is_empty()
    }
}
