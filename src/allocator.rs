//! Block allocation driven by the per-block `FREE` attribute.
//!
//! Scans start from a caller-supplied block so that a file's chain lands right
//! after the block that asked for more room.

use std::fmt;

use parking_lot::Mutex;
use tracing::debug;

use crate::block::{read_block, write_block};
use crate::config::ROOT_BLOCK_ID;
use crate::structs::{Block, BlockAttributes, SuperBlock};
use crate::{BlockDevice, Error, Result};

pub trait BlockAllocator: Send + Sync + fmt::Debug {
    /// Returns the first free block in `start..num_blocks`, if any.
    fn find_next_free(
        &self,
        device: &dyn BlockDevice,
        superblock: &SuperBlock,
        start: u32,
    ) -> Result<Option<u32>>;

    /// Claims a free block close after `hint` and writes `block` into it with `FREE` cleared.
    /// Returns the claimed block ID.
    fn allocate(
        &self,
        device: &dyn BlockDevice,
        superblock: &SuperBlock,
        hint: u32,
        block: Block,
    ) -> Result<u32>;
}

/// Linear first-fit scan. Finding and claiming a block happen under one lock,
/// so concurrent allocations never hand out the same block.
#[derive(Debug, Default)]
pub struct LinearScan {
    claim: Mutex<()>,
}

impl LinearScan {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlockAllocator for LinearScan {
    fn find_next_free(
        &self,
        device: &dyn BlockDevice,
        superblock: &SuperBlock,
        start: u32,
    ) -> Result<Option<u32>> {
        for block_id in start..superblock.num_blocks() {
            if read_block(device, block_id)?.is_free() {
                return Ok(Some(block_id));
            }
        }
        Ok(None)
    }

    fn allocate(
        &self,
        device: &dyn BlockDevice,
        superblock: &SuperBlock,
        hint: u32,
        mut block: Block,
    ) -> Result<u32> {
        let _claim = self.claim.lock();

        let first_data_block = ROOT_BLOCK_ID + 1;
        let found = match self.find_next_free(device, superblock, hint.max(first_data_block))? {
            Some(block_id) => Some(block_id),
            // Nothing after the hint; blocks before it may still be free.
            None if hint > first_data_block => {
                self.find_next_free(device, superblock, first_data_block)?
            }
            None => None,
        };
        let block_id = found.ok_or(Error::OutOfSpace)?;

        block.header.attributes.remove(BlockAttributes::FREE);
        write_block(device, block_id, &block)?;
        debug!(block = block_id, hint, "allocated block");
        Ok(block_id)
    }
}

/// Counts blocks still marked `FREE`.
pub fn count_free(device: &dyn BlockDevice, superblock: &SuperBlock) -> Result<u32> {
    let mut free = 0;
    for block_id in 0..superblock.num_blocks() {
        if read_block(device, block_id)?.is_free() {
            free += 1;
        }
    }
    Ok(free)
}
