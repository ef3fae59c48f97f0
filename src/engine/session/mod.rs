use async_trait::async_trait;

use crate::engine::errors::SessionError;
use crate::engine::types::{CompactionPlan, CompactionPlanResult};

/// RPC sessions to worker nodes. Timeouts on the calls themselves are the
/// implementation's concern; the task's own deadline is evaluated locally.
#[async_trait]
pub trait NodeSessionManager: Send + Sync {
    /// Submits a plan to the given worker.
    async fn dispatch(&self, node_id: i64, plan: &CompactionPlan) -> Result<(), SessionError>;

    /// Fetches the worker's current view of a plan.
    async fn get_plan_result(
        &self,
        node_id: i64,
        plan_id: i64,
    ) -> Result<CompactionPlanResult, SessionError>;
}
