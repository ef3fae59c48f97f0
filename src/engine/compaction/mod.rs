pub mod inspector;
pub mod lock;
pub mod plan_builder;
pub mod task;

pub use inspector::CompactionInspector;
pub use lock::SegmentLockCoordinator;
pub use plan_builder::CompactionPlanBuilder;
pub use task::CompactionTask;

use std::sync::Arc;

use crate::engine::allocator::Allocator;
use crate::engine::meta::CompactionMeta;
use crate::engine::session::NodeSessionManager;

/// Collaborators shared by every task of one coordinator.
#[derive(Clone)]
pub struct CompactionDeps {
    pub meta: Arc<dyn CompactionMeta>,
    pub allocator: Arc<dyn Allocator>,
    pub sessions: Arc<dyn NodeSessionManager>,
}

impl CompactionDeps {
    pub fn new(
        meta: Arc<dyn CompactionMeta>,
        allocator: Arc<dyn Allocator>,
        sessions: Arc<dyn NodeSessionManager>,
    ) -> Self {
        Self {
            meta,
            allocator,
            sessions,
        }
    }
}
