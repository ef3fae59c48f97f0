pub mod plan;
pub mod segment;
pub mod task;

pub use plan::{
    CompactionPlan, CompactionPlanResult, CompactionSegment, CompactionSegmentBinlogs,
    WorkerPlanState,
};
pub use segment::{Binlog, FieldBinlog, SegmentInfo, SegmentLevel, SegmentState};
pub use task::{CompactionTaskRecord, CompactionTaskState, CompactionType, NULL_NODE_ID};
