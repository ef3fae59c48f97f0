use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::engine::allocator::Allocator;
use crate::engine::errors::{AllocatorError, MetaError, SessionError};
use crate::engine::meta::{CompactionMeta, MemoryCompactionMeta};
use crate::engine::session::NodeSessionManager;
use crate::engine::types::{
    CompactionPlan, CompactionPlanResult, CompactionTaskRecord, SegmentInfo, WorkerPlanState,
};

/// Allocator returning a fixed range, or a fixed error.
pub struct StubAllocator {
    response: Result<(i64, i64), AllocatorError>,
    requests: Mutex<Vec<usize>>,
}

impl StubAllocator {
    pub fn returning(start: i64, end: i64) -> Self {
        Self {
            response: Ok((start, end)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: AllocatorError) -> Self {
        Self {
            response: Err(err),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<usize> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Allocator for StubAllocator {
    async fn alloc_n(&self, count: usize) -> Result<(i64, i64), AllocatorError> {
        self.requests.lock().push(count);
        self.response.clone()
    }
}

/// Scripted worker sessions. Plans without a scripted result report `executing`.
#[derive(Default)]
pub struct StubSessionManager {
    dispatch_error: Mutex<Option<SessionError>>,
    results: Mutex<HashMap<i64, Result<CompactionPlanResult, SessionError>>>,
    dispatched: Mutex<Vec<(i64, CompactionPlan)>>,
    polls: AtomicUsize,
}

impl StubSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_dispatch(&self, err: SessionError) {
        *self.dispatch_error.lock() = Some(err);
    }

    pub fn set_result(&self, plan_id: i64, result: CompactionPlanResult) {
        self.results.lock().insert(plan_id, Ok(result));
    }

    pub fn set_error(&self, plan_id: i64, err: SessionError) {
        self.results.lock().insert(plan_id, Err(err));
    }

    pub fn dispatched(&self) -> Vec<(i64, CompactionPlan)> {
        self.dispatched.lock().clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeSessionManager for StubSessionManager {
    async fn dispatch(&self, node_id: i64, plan: &CompactionPlan) -> Result<(), SessionError> {
        if let Some(err) = self.dispatch_error.lock().clone() {
            return Err(err);
        }
        self.dispatched.lock().push((node_id, plan.clone()));
        Ok(())
    }

    async fn get_plan_result(
        &self,
        _node_id: i64,
        plan_id: i64,
    ) -> Result<CompactionPlanResult, SessionError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.results
            .lock()
            .get(&plan_id)
            .cloned()
            .unwrap_or_else(|| {
                Ok(CompactionPlanResult {
                    plan_id,
                    state: WorkerPlanState::Executing,
                    segments: Vec::new(),
                    error: None,
                })
            })
    }
}

/// Memory store whose task writes and compaction mutations can be made to fail.
pub struct FlakyMeta {
    pub inner: Arc<MemoryCompactionMeta>,
    failing_saves: AtomicUsize,
    failing_mutations: AtomicUsize,
    saves: AtomicUsize,
}

impl FlakyMeta {
    pub fn new(inner: Arc<MemoryCompactionMeta>) -> Self {
        Self {
            inner,
            failing_saves: AtomicUsize::new(0),
            failing_mutations: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    /// The next `count` task writes fail.
    pub fn fail_next_saves(&self, count: usize) {
        self.failing_saves.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_mutations(&self, count: usize) {
        self.failing_mutations.store(count, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CompactionMeta for FlakyMeta {
    async fn get_healthy_segment(&self, segment_id: i64) -> Option<SegmentInfo> {
        self.inner.get_healthy_segment(segment_id).await
    }

    async fn set_segments_compacting(
        &self,
        segment_ids: &[i64],
        compacting: bool,
    ) -> Result<(), MetaError> {
        self.inner
            .set_segments_compacting(segment_ids, compacting)
            .await
    }

    async fn save_compaction_task(&self, task: &CompactionTaskRecord) -> Result<(), MetaError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if Self::take(&self.failing_saves) {
            return Err(MetaError::Persist("injected save failure".to_string()));
        }
        self.inner.save_compaction_task(task).await
    }

    async fn complete_compaction_mutation(
        &self,
        task: &CompactionTaskRecord,
        result: &CompactionPlanResult,
    ) -> Result<Vec<SegmentInfo>, MetaError> {
        if Self::take(&self.failing_mutations) {
            return Err(MetaError::Persist("injected mutation failure".to_string()));
        }
        self.inner.complete_compaction_mutation(task, result).await
    }
}
