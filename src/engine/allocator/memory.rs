use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};

use super::Allocator;
use crate::engine::errors::AllocatorError;

/// Process-local allocator handing out IDs from a single atomic counter.
#[derive(Debug)]
pub struct MemoryAllocator {
    next_id: AtomicI64,
}

impl MemoryAllocator {
    pub fn new(start_id: i64) -> Self {
        Self {
            next_id: AtomicI64::new(start_id),
        }
    }

    /// The ID the next allocation will start at.
    pub fn peek(&self) -> i64 {
        self.next_id.load(Ordering::SeqCst)
    }
}

impl Default for MemoryAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl Allocator for MemoryAllocator {
    async fn alloc_n(&self, count: usize) -> Result<(i64, i64), AllocatorError> {
        if count == 0 {
            return Err(AllocatorError::InvalidCount(count));
        }
        let count = i64::try_from(count).map_err(|_| AllocatorError::InvalidCount(count))?;
        let start = self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |next| {
                next.checked_add(count)
            })
            .map_err(|_| AllocatorError::Unavailable("id space exhausted".to_string()))?;
        Ok((start, start + count))
    }
}
