//! Common utilities for tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use flatfs::{
    Block, BlockAllocator, BlockAttributes, BlockDevice, Error, FileSystem, Result, SuperBlock,
    BLOCK_SIZE, read_block, write_block,
};

pub const ORANGE: &str = "\x1b[38;5;214m";
pub const RESET: &str = "\x1b[0m";

pub const MIB: u64 = 1024 * 1024;

/// Provides a macro for logging messages during tests.
/// e.g. log!("placeholder") -> println!("[test] placeholder");
#[macro_export]
macro_rules! log {
    ($msg:expr, $($arg:tt)*) => {
        println!("{}[test] {}{}", crate::common::ORANGE, format!($msg, $($arg)*), crate::common::RESET)
    };
}

pub struct RamDisk {
    inner: Arc<Mutex<Vec<u8>>>,
    num_blocks: usize,
}

impl RamDisk {
    /// Creates a new RamDisk with the specified number of blocks.
    /// Each block is BLOCK_SIZE bytes.
    pub fn new(num_blocks: usize) -> Self {
        let size = num_blocks * BLOCK_SIZE;
        let inner = Arc::new(Mutex::new(vec![0u8; size]));
        RamDisk { inner, num_blocks }
    }
}

impl BlockDevice for RamDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id as u32));
        }
        if buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidArgument("short buffer"));
        }
        let start = block_id * BLOCK_SIZE;
        let end = start + BLOCK_SIZE;
        let data = self.inner.lock().unwrap();
        buf.copy_from_slice(&data[start..end]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(Error::InvalidBlockId(block_id as u32));
        }
        if buf.len() != BLOCK_SIZE {
            return Err(Error::InvalidArgument("short buffer"));
        }
        let start = block_id * BLOCK_SIZE;
        let end = start + BLOCK_SIZE;
        let mut data = self.inner.lock().unwrap();
        data[start..end].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        // In a RAM disk, flushing is a no-op since data is already in memory.
        Ok(())
    }
}

/// Formats a fresh RAM disk of `size` bytes.
pub fn ram_fs(size: u64) -> FileSystem<RamDisk> {
    let rd = RamDisk::new((size / BLOCK_SIZE as u64) as usize);
    FileSystem::format(Arc::new(rd), size).unwrap()
}

/// Next-fit allocator: resumes scanning where the last allocation ended.
/// Keeps tests that create many nodes from rescanning the whole image each time.
#[derive(Debug, Default)]
pub struct NextFit {
    cursor: AtomicU32,
    claim: Mutex<()>,
}

impl BlockAllocator for NextFit {
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
        let _claim = self.claim.lock().unwrap();
        let start = hint.max(self.cursor.load(Ordering::Relaxed)).max(2);
        let block_id = self
            .find_next_free(device, superblock, start)?
            .ok_or(Error::OutOfSpace)?;
        block.header.attributes.remove(BlockAttributes::FREE);
        write_block(device, block_id, &block)?;
        self.cursor.store(block_id + 1, Ordering::Relaxed);
        Ok(block_id)
    }
}

/// Counts the blocks of a chain starting at `home`.
pub fn chain_len(fs: &FileSystem<RamDisk>, home: u32) -> (u32, u32) {
    let dev = fs.device();
    let mut count = 1;
    let mut last = home;
    let mut block = read_block(&*dev, home).unwrap();
    while let Some(next) = block.next() {
        count += 1;
        last = next;
        block = read_block(&*dev, next).unwrap();
    }
    (count, last)
}
