pub mod memory;

pub use memory::MemoryCompactionMeta;

use async_trait::async_trait;

use crate::engine::errors::MetaError;
use crate::engine::types::{CompactionPlanResult, CompactionTaskRecord, SegmentInfo};

/// Durable store of segment and compaction task records.
///
/// The store never initiates task transitions; it persists what the task tells it to.
#[async_trait]
pub trait CompactionMeta: Send + Sync {
    /// Returns the segment only if it exists and is not dropped.
    async fn get_healthy_segment(&self, segment_id: i64) -> Option<SegmentInfo>;

    /// Sets or clears the compacting flag on every listed segment.
    ///
    /// Setting is all-or-nothing: if any segment is already compacting the call fails with
    /// [`MetaError::SegmentCompacting`] and no flag is changed. Clearing never fails on
    /// segments that are already clear.
    async fn set_segments_compacting(
        &self,
        segment_ids: &[i64],
        compacting: bool,
    ) -> Result<(), MetaError>;

    async fn save_compaction_task(&self, task: &CompactionTaskRecord) -> Result<(), MetaError>;

    /// Atomically retires the task's inputs and registers the worker's outputs.
    ///
    /// Re-applying a mutation that already landed returns the recorded outputs.
    async fn complete_compaction_mutation(
        &self,
        task: &CompactionTaskRecord,
        result: &CompactionPlanResult,
    ) -> Result<Vec<SegmentInfo>, MetaError>;
}
