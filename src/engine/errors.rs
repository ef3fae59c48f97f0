use thiserror::Error;
use tracing::{debug, error, warn};

/// Failures reported by the metadata store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MetaError {
    #[error("Segment {0} not found")]
    SegmentNotFound(i64),

    #[error("Segments already compacting: {0:?}")]
    SegmentCompacting(Vec<i64>),

    #[error("Task record write failed: {0}")]
    Persist(String),

    #[error("Illegal compaction mutation: {0}")]
    IllegalMutation(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocatorError {
    #[error("ID allocator unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid allocation size: {0}")]
    InvalidCount(usize),

    #[error("Allocator returned range [{start}, {end}) for {requested} ids")]
    ShortRange { start: i64, end: i64, requested: usize },
}

/// Failures talking to a worker node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Node {0} not found")]
    NodeNotFound(i64),

    #[error("Plan {0} unknown to worker")]
    PlanNotFound(i64),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompactionError {
    #[error("Segment not found: {0}")]
    SegmentNotFound(i64),

    #[error("ID allocation failed: {0}")]
    AllocationFailed(#[from] AllocatorError),

    #[error("Segments locked by another compaction: {segment_ids:?}")]
    LockConflict { segment_ids: Vec<i64> },

    #[error("Worker transport error: {0}")]
    Transport(#[from] SessionError),

    #[error("Worker reported failure: {0}")]
    WorkerReportedFailure(String),

    #[error("Deadline exceeded: {elapsed_ms}ms elapsed, timeout {timeout_secs}s")]
    DeadlineExceeded { elapsed_ms: u128, timeout_secs: i64 },

    #[error("Compaction task has no input segments")]
    EmptyInput,

    #[error("Compaction task has no assigned worker node")]
    NodeNotAssigned,

    #[error("Illegal plan result: {0}")]
    IllegalPlanResult(String),

    #[error("Metadata error: {0}")]
    Meta(MetaError),

    #[error("Invalid task state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Plan {0} already tracked")]
    DuplicatePlan(i64),

    #[error("Inspector full: {0} tasks in flight")]
    InspectorFull(usize),
}

impl From<MetaError> for CompactionError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::SegmentNotFound(id) => CompactionError::SegmentNotFound(id),
            MetaError::SegmentCompacting(segment_ids) => {
                CompactionError::LockConflict { segment_ids }
            }
            other => CompactionError::Meta(other),
        }
    }
}

impl CompactionError {
    /// Errors that end a build or lock attempt without any worker involvement.
    pub fn is_build_time(&self) -> bool {
        matches!(
            self,
            CompactionError::SegmentNotFound(_)
                | CompactionError::AllocationFailed(_)
                | CompactionError::EmptyInput
                | CompactionError::NodeNotAssigned
                | CompactionError::LockConflict { .. }
        )
    }

    pub fn log_error(&self, plan_id: i64) {
        match self {
            CompactionError::Transport(e) => {
                warn!(target: "compaction::errors", plan_id, "Worker transport error: {}", e);
                debug!(target: "compaction::errors", plan_id, "Transport error details: {:?}", e);
            }
            CompactionError::LockConflict { segment_ids } => {
                warn!(target: "compaction::errors", plan_id, ?segment_ids, "Segment lock conflict");
            }
            CompactionError::DeadlineExceeded { .. } | CompactionError::Cancelled(_) => {
                warn!(target: "compaction::errors", plan_id, "Compaction abandoned: {}", self);
            }
            other => {
                error!(target: "compaction::errors", plan_id, "Compaction error: {}", other);
                debug!(target: "compaction::errors", plan_id, "Compaction error details: {:?}", other);
            }
        }
    }
}
