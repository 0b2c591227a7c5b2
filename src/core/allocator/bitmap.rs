//! Bitmap allocation table
//!
//! One bit per block, `1` = occupied. Persisted as `block_count / 8` bytes,
//! least significant bit first: block `i` lives in byte `i / 8`, bit `i % 8`.

use crate::allocator::BlockAllocator;
use crate::error::{ContainerError, Result};

/// Allocation table over every block in the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationTable {
    /// Bitmap words (each word = 64 bits = 64 blocks)
    bitmap: Vec<u64>,

    /// Total number of blocks tracked
    total_blocks: usize,

    /// Number of free blocks available
    free_blocks: usize,
}

impl AllocationTable {
    /// Create an empty table (every block free)
    pub fn new(total_blocks: usize) -> Self {
        let num_words = (total_blocks + 63) / 64;
        AllocationTable {
            bitmap: vec![0u64; num_words],
            total_blocks,
            free_blocks: total_blocks,
        }
    }

    /// Size of the persisted table in bytes
    pub fn byte_len(&self) -> usize {
        self.total_blocks / 8
    }

    /// Serialize to the on-disk bit-packed form
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = self
            .bitmap
            .iter()
            .flat_map(|word| word.to_le_bytes())
            .collect();
        bytes.truncate(self.byte_len());
        bytes
    }

    /// Deserialize; the block count is `bytes.len() * 8`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let total_blocks = bytes.len() * 8;
        let bitmap: Vec<u64> = bytes
            .chunks(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word[..chunk.len()].copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();

        let occupied: usize = bitmap.iter().map(|w| w.count_ones() as usize).sum();

        AllocationTable {
            bitmap,
            total_blocks,
            free_blocks: total_blocks - occupied,
        }
    }

    fn check_range(&self, block: u32) -> Result<()> {
        if block as usize >= self.total_blocks {
            return Err(ContainerError::InvalidBlockId(block));
        }
        Ok(())
    }

    fn position(block: u32) -> (usize, u64) {
        let block = block as usize;
        (block / 64, 1u64 << (block % 64))
    }
}

impl BlockAllocator for AllocationTable {
    fn available_blocks(&self, count: usize) -> Result<Vec<u32>> {
        if count > self.free_blocks {
            return Err(ContainerError::OutOfSpace {
                requested: count,
                available: self.free_blocks,
            });
        }

        let mut found = Vec::with_capacity(count);
        if count == 0 {
            return Ok(found);
        }

        'outer: for (word_idx, &word) in self.bitmap.iter().enumerate() {
            if word == u64::MAX {
                continue; // All bits set (all occupied)
            }

            for bit_idx in 0..64 {
                let block = word_idx * 64 + bit_idx;
                if block >= self.total_blocks {
                    break 'outer;
                }

                if word & (1u64 << bit_idx) == 0 {
                    found.push(block as u32);
                    if found.len() == count {
                        break 'outer;
                    }
                }
            }
        }

        if found.len() != count {
            // free_blocks disagrees with the bitmap
            return Err(ContainerError::OutOfSpace {
                requested: count,
                available: found.len(),
            });
        }

        Ok(found)
    }

    fn allocate(&mut self, blocks: &[u32]) -> Result<()> {
        for &block in blocks {
            self.check_range(block)?;
        }

        for &block in blocks {
            let (word_idx, mask) = Self::position(block);
            if self.bitmap[word_idx] & mask == 0 {
                self.bitmap[word_idx] |= mask;
                self.free_blocks -= 1;
            }
        }

        Ok(())
    }

    fn free(&mut self, blocks: &[u32]) -> Result<()> {
        for &block in blocks {
            self.check_range(block)?;
        }

        for &block in blocks {
            let (word_idx, mask) = Self::position(block);

            if self.bitmap[word_idx] & mask == 0 {
                tracing::warn!("Double-free detected for block {}", block);
                continue;
            }

            self.bitmap[word_idx] &= !mask;
            self.free_blocks += 1;
        }

        Ok(())
    }

    fn is_allocated(&self, block: u32) -> bool {
        if block as usize >= self.total_blocks {
            return false;
        }

        let (word_idx, mask) = Self::position(block);
        self.bitmap[word_idx] & mask != 0
    }

    fn total_blocks(&self) -> usize {
        self.total_blocks
    }

    fn free_blocks(&self) -> usize {
        self.free_blocks
    }
}
