use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Node id carried by a task that has not been assigned to a worker yet.
pub const NULL_NODE_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionTaskState {
    Pipelined,
    Executing,
    MetaSaved,
    Completed,
    Failed,
    Cleaned,
}

impl CompactionTaskState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CompactionTaskState::Completed
                | CompactionTaskState::Failed
                | CompactionTaskState::Cleaned
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompactionTaskState::Pipelined => "pipelined",
            CompactionTaskState::Executing => "executing",
            CompactionTaskState::MetaSaved => "meta_saved",
            CompactionTaskState::Completed => "completed",
            CompactionTaskState::Failed => "failed",
            CompactionTaskState::Cleaned => "cleaned",
        }
    }
}

impl Display for CompactionTaskState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of plan kinds understood by the builder and the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompactionType {
    /// Merge several segments of one channel into fewer, denser ones.
    Mix,
}

/// Durable description of a compaction task, as persisted by the metadata store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionTaskRecord {
    pub plan_id: i64,
    /// Groups tasks issued by the same trigger.
    pub trigger_id: i64,
    pub collection_id: i64,
    pub partition_id: i64,
    pub channel: String,
    pub compaction_type: CompactionType,
    pub node_id: i64,
    pub state: CompactionTaskState,
    pub input_segments: Vec<i64>,
    pub result_segments: Vec<i64>,
    /// Local deadline measured from `start_time`; `<= 0` disables it.
    pub timeout_in_seconds: i64,
    /// Unix milliseconds at which the task entered `executing`.
    pub start_time: i64,
    /// Why the task ended in `failed` or `cleaned`.
    pub fail_reason: String,
}

impl CompactionTaskRecord {
    pub fn has_deadline(&self) -> bool {
        self.timeout_in_seconds > 0
    }
}
