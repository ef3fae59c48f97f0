use crate::engine::types::{Binlog, FieldBinlog, SegmentInfo, SegmentLevel, SegmentState};

/// One field with `count` log files numbered from 1.
pub fn field_binlog_ids(field_id: i64, count: i64) -> FieldBinlog {
    FieldBinlog {
        field_id,
        binlogs: (1..=count)
            .map(|log_id| Binlog {
                log_id,
                entries_num: 100,
            })
            .collect(),
    }
}

pub struct SegmentFactory {
    segment: SegmentInfo,
}

impl SegmentFactory {
    pub fn new() -> Self {
        Self {
            segment: SegmentInfo {
                id: 200,
                collection_id: 1,
                partition_id: 10,
                insert_channel: "Ch-1".to_string(),
                level: SegmentLevel::L1,
                state: SegmentState::Flushed,
                num_rows: 300,
                binlogs: vec![field_binlog_ids(101, 3)],
                is_compacting: false,
                compaction_from: Vec::new(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.segment.id = id;
        self
    }

    pub fn with_state(mut self, state: SegmentState) -> Self {
        self.segment.state = state;
        self
    }

    pub fn with_channel(mut self, channel: &str) -> Self {
        self.segment.insert_channel = channel.to_string();
        self
    }

    pub fn with_binlogs(mut self, binlogs: Vec<FieldBinlog>) -> Self {
        self.segment.binlogs = binlogs;
        self
    }

    pub fn compacting(mut self) -> Self {
        self.segment.is_compacting = true;
        self
    }

    pub fn create(self) -> SegmentInfo {
        self.segment
    }

    /// Same template, one segment per id.
    pub fn create_list(self, ids: &[i64]) -> Vec<SegmentInfo> {
        ids.iter()
            .map(|id| {
                let mut segment = self.segment.clone();
                segment.id = *id;
                segment
            })
            .collect()
    }
}
