use serde::{Deserialize, Serialize};

/// Containment tier of a segment. Mix compaction reads and writes `L1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentLevel {
    Legacy,
    L0,
    L1,
    L2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentState {
    Growing,
    Sealed,
    Flushing,
    Flushed,
    Dropped,
}

impl SegmentState {
    /// Dropped segments are waiting for garbage collection and must never be read again.
    #[inline]
    pub fn is_healthy(&self) -> bool {
        !matches!(self, SegmentState::Dropped)
    }
}

/// One physical log file of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binlog {
    pub log_id: i64,
    pub entries_num: i64,
}

/// All log files of one field of a segment, in write order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBinlog {
    pub field_id: i64,
    pub binlogs: Vec<Binlog>,
}

impl FieldBinlog {
    pub fn log_ids(&self) -> Vec<i64> {
        self.binlogs.iter().map(|b| b.log_id).collect()
    }

    pub fn entries_num(&self) -> i64 {
        self.binlogs.iter().map(|b| b.entries_num).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub id: i64,
    pub collection_id: i64,
    pub partition_id: i64,
    pub insert_channel: String,
    pub level: SegmentLevel,
    pub state: SegmentState,
    pub num_rows: i64,
    pub binlogs: Vec<FieldBinlog>,
    /// Set while the segment is the input of an in-flight compaction.
    pub is_compacting: bool,
    /// Inputs this segment was produced from, empty for flushed originals.
    pub compaction_from: Vec<i64>,
}

impl SegmentInfo {
    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.state.is_healthy()
    }
}
