use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use compaction_coord::engine::allocator::MemoryAllocator;
use compaction_coord::engine::compaction::{CompactionDeps, CompactionInspector};
use compaction_coord::engine::meta::MemoryCompactionMeta;
use compaction_coord::engine::types::{
    Binlog, CompactionTaskRecord, CompactionTaskState, CompactionType, FieldBinlog, SegmentInfo,
    SegmentLevel, SegmentState,
};
use compaction_coord::shared::config::CompactionConfig;

use crate::integration::scenarios::{ScenarioTask, Step, TestScenario};
use crate::integration::worker::ScriptedWorkers;

fn segment(id: i64, compacting: bool) -> SegmentInfo {
    SegmentInfo {
        id,
        collection_id: 1,
        partition_id: 10,
        insert_channel: "by-dev-rootcoord-dml_0".to_string(),
        level: SegmentLevel::L1,
        state: SegmentState::Flushed,
        num_rows: 500,
        binlogs: vec![FieldBinlog {
            field_id: 101,
            binlogs: vec![Binlog {
                log_id: id * 10,
                entries_num: 500,
            }],
        }],
        is_compacting: compacting,
        compaction_from: Vec::new(),
    }
}

fn record(task: &ScenarioTask) -> CompactionTaskRecord {
    CompactionTaskRecord {
        plan_id: task.plan_id,
        trigger_id: 1,
        collection_id: 1,
        partition_id: 10,
        channel: "by-dev-rootcoord-dml_0".to_string(),
        compaction_type: CompactionType::Mix,
        node_id: task.node_id,
        state: CompactionTaskState::Pipelined,
        input_segments: task.inputs.clone(),
        result_segments: Vec::new(),
        timeout_in_seconds: task.timeout_secs,
        start_time: 0,
        fail_reason: String::new(),
    }
}

pub async fn run_scenario(scenario: &TestScenario) {
    info!("▶ Running scenario: {}", scenario.name);

    let meta = Arc::new(MemoryCompactionMeta::with_segments(
        scenario
            .segments
            .iter()
            .map(|&id| segment(id, scenario.compacting.contains(&id))),
    ));
    let workers = Arc::new(ScriptedWorkers::default());
    let deps = CompactionDeps::new(
        meta.clone(),
        Arc::new(MemoryAllocator::new(10_000)),
        workers.clone(),
    );
    let config = CompactionConfig {
        default_timeout_secs: 60,
        ..CompactionConfig::default()
    };
    let mut inspector = CompactionInspector::with_config(deps, config);

    for task in &scenario.tasks {
        inspector
            .enqueue(record(task))
            .unwrap_or_else(|e| panic!("[{}] enqueue failed: {}", scenario.name, e));
    }

    for step in &scenario.steps {
        debug!("[{}] step {:?}", scenario.name, step);
        match step {
            Step::Tick(n) => {
                for _ in 0..*n {
                    inspector.tick().await;
                }
            }
            Step::SleepMs(ms) => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Worker { plan_id, reply } => workers.reply(*plan_id, *reply),
            Step::Cancel { plan_id, reason } => {
                inspector.cancel(*plan_id, reason).await;
            }
        }
    }

    let failures = scenario.expect.check(&meta, inspector.len()).await;
    assert!(
        failures.is_empty(),
        "Scenario '{}' failed:\n{}",
        scenario.name,
        failures.join("\n")
    );
    info!("✔ Scenario passed: {}", scenario.name);
}
