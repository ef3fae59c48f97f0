use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::engine::allocator::Allocator;
use crate::engine::errors::{AllocatorError, CompactionError};
use crate::engine::meta::CompactionMeta;
use crate::engine::types::{
    CompactionPlan, CompactionSegmentBinlogs, CompactionTaskRecord, CompactionType,
};

/// Turns a task's declared inputs into a dispatch-ready plan.
///
/// Every call allocates fresh result IDs, so callers build once per attempt and keep the plan.
#[derive(Clone)]
pub struct CompactionPlanBuilder {
    meta: Arc<dyn CompactionMeta>,
    allocator: Arc<dyn Allocator>,
}

impl CompactionPlanBuilder {
    pub fn new(meta: Arc<dyn CompactionMeta>, allocator: Arc<dyn Allocator>) -> Self {
        Self { meta, allocator }
    }

    pub async fn build(
        &self,
        task: &CompactionTaskRecord,
        result_count: usize,
    ) -> Result<CompactionPlan, CompactionError> {
        match task.compaction_type {
            CompactionType::Mix => self.build_mix(task, result_count).await,
        }
    }

    async fn build_mix(
        &self,
        task: &CompactionTaskRecord,
        result_count: usize,
    ) -> Result<CompactionPlan, CompactionError> {
        if task.input_segments.is_empty() {
            return Err(CompactionError::EmptyInput);
        }

        let mut seen = HashSet::with_capacity(task.input_segments.len());
        let mut segment_binlogs = Vec::with_capacity(task.input_segments.len());
        for &segment_id in &task.input_segments {
            if !seen.insert(segment_id) {
                warn!(target: "plan_builder::build", plan_id = task.plan_id, segment_id, "Skipping duplicate input segment");
                continue;
            }
            let segment = self
                .meta
                .get_healthy_segment(segment_id)
                .await
                .ok_or(CompactionError::SegmentNotFound(segment_id))?;
            debug!(
                target: "plan_builder::build",
                plan_id = task.plan_id,
                segment_id,
                fields = segment.binlogs.len(),
                "Collected input binlogs"
            );
            segment_binlogs.push(CompactionSegmentBinlogs {
                segment_id,
                level: segment.level,
                insert_channel: segment.insert_channel,
                collection_id: segment.collection_id,
                partition_id: segment.partition_id,
                field_binlogs: segment.binlogs,
            });
        }

        let result_segment_ids = self.allocate_result_ids(result_count).await?;

        info!(
            target: "plan_builder::build",
            plan_id = task.plan_id,
            inputs = segment_binlogs.len(),
            results = ?result_segment_ids,
            "Built mix compaction plan"
        );

        Ok(CompactionPlan {
            plan_id: task.plan_id,
            compaction_type: task.compaction_type,
            channel: task.channel.clone(),
            segment_binlogs,
            result_segment_ids,
            timeout_in_seconds: task.timeout_in_seconds,
        })
    }

    async fn allocate_result_ids(&self, count: usize) -> Result<Vec<i64>, CompactionError> {
        if count == 0 {
            return Err(AllocatorError::InvalidCount(count).into());
        }
        let (start, end) = self.allocator.alloc_n(count).await?;
        let available = end.saturating_sub(start);
        if available < count as i64 {
            return Err(AllocatorError::ShortRange {
                start,
                end,
                requested: count,
            }
            .into());
        }
        Ok((start..end).take(count).collect())
    }
}
