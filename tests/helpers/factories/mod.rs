pub mod segment_factory;

pub use plan_result_factory::PlanResultFactory;
pub use segment_factory::{SegmentFactory, field_binlog_ids};
pub use task_record_factory::TaskRecordFactory;
