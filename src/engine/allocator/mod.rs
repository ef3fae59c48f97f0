pub mod memory;

pub use memory::MemoryAllocator;

use async_trait::async_trait;

use crate::engine::errors::AllocatorError;

/// Issues globally unique, monotonically increasing IDs.
#[async_trait]
pub trait Allocator: Send + Sync {
    /// Reserves `count` consecutive unused IDs, returned as `[start, end)`.
    ///
    /// The range may be wider than requested; callers consume it left to right.
    async fn alloc_n(&self, count: usize) -> Result<(i64, i64), AllocatorError>;

    async fn alloc_id(&self) -> Result<i64, AllocatorError> {
        let (start, _) = self.alloc_n(1).await?;
        Ok(start)
    }
}
