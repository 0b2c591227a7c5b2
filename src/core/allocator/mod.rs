//! Block allocation for container files
//!
//! Blocks are tracked by a single bitmap (see [`bitmap::AllocationTable`])
//! persisted right after the container descriptor.

pub mod bitmap;

use crate::error::Result;

/// Block allocator trait
///
/// Finding free blocks and marking them are separate steps: callers first
/// ask for candidate indices, write their blocks, then commit the indices.
pub trait BlockAllocator {
    /// Find `count` free blocks without marking them
    ///
    /// Returned indices are unique and strictly ascending.
    fn available_blocks(&self, count: usize) -> Result<Vec<u32>>;

    /// Mark blocks as occupied (already-occupied blocks are skipped)
    fn allocate(&mut self, blocks: &[u32]) -> Result<()>;

    /// Mark blocks as free (already-free blocks are skipped)
    fn free(&mut self, blocks: &[u32]) -> Result<()>;

    /// Check whether a block is occupied
    fn is_allocated(&self, block: u32) -> bool;

    /// Get total number of blocks managed
    fn total_blocks(&self) -> usize;

    /// Get number of free blocks available
    fn free_blocks(&self) -> usize;

    /// Get number of occupied blocks
    fn occupied_blocks(&self) -> usize {
        self.total_blocks() - self.free_blocks()
    }
}
