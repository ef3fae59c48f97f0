use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{debug, info};

use super::CompactionMeta;
use crate::engine::errors::MetaError;
use crate::engine::types::{
    CompactionPlanResult, CompactionTaskRecord, SegmentInfo, SegmentLevel, SegmentState,
};

/// In-process metadata store.
///
/// Segments live behind a single lock so multi-segment flag changes and compaction
/// mutations are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryCompactionMeta {
    segments: RwLock<HashMap<i64, SegmentInfo>>,
    tasks: DashMap<i64, CompactionTaskRecord>,
}

impl MemoryCompactionMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = SegmentInfo>,
    {
        let meta = Self::new();
        for segment in segments {
            meta.add_segment(segment);
        }
        meta
    }

    pub fn add_segment(&self, segment: SegmentInfo) {
        self.segments.write().insert(segment.id, segment);
    }

    /// Segment in any lifecycle state.
    pub fn segment(&self, segment_id: i64) -> Option<SegmentInfo> {
        self.segments.read().get(&segment_id).cloned()
    }

    pub fn is_compacting(&self, segment_id: i64) -> bool {
        self.segments
            .read()
            .get(&segment_id)
            .map(|s| s.is_compacting)
            .unwrap_or(false)
    }

    pub fn task(&self, plan_id: i64) -> Option<CompactionTaskRecord> {
        self.tasks.get(&plan_id).map(|entry| entry.value().clone())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }
}

#[async_trait]
impl CompactionMeta for MemoryCompactionMeta {
    async fn get_healthy_segment(&self, segment_id: i64) -> Option<SegmentInfo> {
        self.segments
            .read()
            .get(&segment_id)
            .filter(|s| s.is_healthy())
            .cloned()
    }

    async fn set_segments_compacting(
        &self,
        segment_ids: &[i64],
        compacting: bool,
    ) -> Result<(), MetaError> {
        let mut segments = self.segments.write();

        if !compacting {
            for id in segment_ids {
                if let Some(segment) = segments.get_mut(id) {
                    segment.is_compacting = false;
                }
            }
            return Ok(());
        }

        let mut conflicts = Vec::new();
        for id in segment_ids {
            match segments.get(id) {
                Some(segment) if segment.is_healthy() => {
                    if segment.is_compacting {
                        conflicts.push(*id);
                    }
                }
                _ => return Err(MetaError::SegmentNotFound(*id)),
            }
        }
        if !conflicts.is_empty() {
            return Err(MetaError::SegmentCompacting(conflicts));
        }

        for id in segment_ids {
            if let Some(segment) = segments.get_mut(id) {
                segment.is_compacting = true;
            }
        }
        debug!(target: "memory_meta::set_compacting", ?segment_ids, "Marked segments compacting");
        Ok(())
    }

    async fn save_compaction_task(&self, task: &CompactionTaskRecord) -> Result<(), MetaError> {
        self.tasks.insert(task.plan_id, task.clone());
        Ok(())
    }

    async fn complete_compaction_mutation(
        &self,
        task: &CompactionTaskRecord,
        result: &CompactionPlanResult,
    ) -> Result<Vec<SegmentInfo>, MetaError> {
        let mut segments = self.segments.write();

        let already_applied = !result.segments.is_empty()
            && result.segments.iter().all(|out| {
                segments
                    .get(&out.segment_id)
                    .is_some_and(|s| s.compaction_from == task.input_segments)
            });
        if already_applied {
            debug!(target: "memory_meta::complete_mutation", plan_id = task.plan_id, "Compaction mutation already applied");
            return Ok(result
                .segments
                .iter()
                .filter_map(|out| segments.get(&out.segment_id).cloned())
                .collect());
        }

        let mut template: Option<SegmentInfo> = None;
        for id in &task.input_segments {
            match segments.get(id) {
                Some(segment) if segment.is_healthy() => {
                    template.get_or_insert_with(|| segment.clone());
                }
                _ => {
                    return Err(MetaError::IllegalMutation(format!(
                        "input segment {id} is missing or dropped"
                    )));
                }
            }
        }
        let Some(template) = template else {
            return Err(MetaError::IllegalMutation("task has no inputs".to_string()));
        };
        if let Some(reused) = result
            .segments
            .iter()
            .find(|out| segments.contains_key(&out.segment_id))
        {
            return Err(MetaError::IllegalMutation(format!(
                "result segment {} already exists",
                reused.segment_id
            )));
        }

        for id in &task.input_segments {
            if let Some(segment) = segments.get_mut(id) {
                segment.state = SegmentState::Dropped;
                segment.is_compacting = false;
            }
        }

        let mut added = Vec::with_capacity(result.segments.len());
        for out in &result.segments {
            let segment = SegmentInfo {
                id: out.segment_id,
                collection_id: template.collection_id,
                partition_id: template.partition_id,
                insert_channel: template.insert_channel.clone(),
                level: SegmentLevel::L1,
                state: SegmentState::Flushed,
                num_rows: out.num_rows,
                binlogs: out.insert_logs.clone(),
                is_compacting: false,
                compaction_from: task.input_segments.clone(),
            };
            segments.insert(segment.id, segment.clone());
            added.push(segment);
        }

        info!(
            target: "memory_meta::complete_mutation",
            plan_id = task.plan_id,
            inputs = ?task.input_segments,
            outputs = ?result.segment_ids(),
            "Applied compaction mutation"
        );
        Ok(added)
    }
}
