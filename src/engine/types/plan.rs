use serde::{Deserialize, Serialize};

use super::segment::{FieldBinlog, SegmentLevel};
use super::task::CompactionType;

/// Binlogs of one input segment, as shipped to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSegmentBinlogs {
    pub segment_id: i64,
    pub level: SegmentLevel,
    pub insert_channel: String,
    pub collection_id: i64,
    pub partition_id: i64,
    pub field_binlogs: Vec<FieldBinlog>,
}

/// Dispatch-ready request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionPlan {
    pub plan_id: i64,
    pub compaction_type: CompactionType,
    pub channel: String,
    pub segment_binlogs: Vec<CompactionSegmentBinlogs>,
    /// Pre-allocated IDs the worker must use for its outputs, in allocation order.
    pub result_segment_ids: Vec<i64>,
    pub timeout_in_seconds: i64,
}

impl CompactionPlan {
    pub fn input_segment_ids(&self) -> Vec<i64> {
        self.segment_binlogs.iter().map(|b| b.segment_id).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerPlanState {
    /// Accepted but not started.
    Queued,
    Executing,
    Completed,
    Failed,
}

/// One output segment reported by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSegment {
    pub segment_id: i64,
    pub num_rows: i64,
    pub insert_logs: Vec<FieldBinlog>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionPlanResult {
    pub plan_id: i64,
    pub state: WorkerPlanState,
    pub segments: Vec<CompactionSegment>,
    pub error: Option<String>,
}

impl CompactionPlanResult {
    pub fn segment_ids(&self) -> Vec<i64> {
        self.segments.iter().map(|s| s.segment_id).collect()
    }
}
