use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::config::BLOCK_SIZE;
use crate::error::FsError;

pub trait BlockDevice: Send + Sync {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads a block of data from the block device.
    /// buf.len() must be equal to block_size().
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), FsError>;

    /// Writes a block of data to the block device.
    /// buf.len() must be equal to block_size().
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), FsError>;

    /// Flushes any buffered data to the block device.
    fn flush(&self) -> Result<(), FsError>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}

/// A filesystem image stored in a regular host file.
/// Every access is a fresh seek followed by an exact read or write.
#[derive(Debug)]
pub struct ImageFile {
    inner: Mutex<File>,
    num_blocks: usize,
}

impl ImageFile {
    /// Opens an existing image. Trailing bytes past the last whole block are ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FsError> {
        let file = File::options().read(true).write(true).open(path)?;
        Self::from_file(file)
    }

    /// Creates (or truncates) an image of `size` bytes.
    pub fn create(path: impl AsRef<Path>, size: u64) -> Result<Self, FsError> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(size)?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> Result<Self, FsError> {
        let len = file.metadata()?.len();
        let num_blocks = usize::try_from(len / BLOCK_SIZE as u64)
            .map_err(|_| FsError::InvalidArgument("image too large"))?;
        Ok(Self {
            inner: Mutex::new(file),
            num_blocks,
        })
    }

    fn offset_of(&self, block_id: usize, len: usize) -> Result<u64, FsError> {
        if block_id >= self.num_blocks {
            return Err(FsError::InvalidBlockId(block_id as u32));
        }
        if len != BLOCK_SIZE {
            return Err(FsError::InvalidArgument("buffer is not one block long"));
        }
        Ok(block_id as u64 * BLOCK_SIZE as u64)
    }
}

impl BlockDevice for ImageFile {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), FsError> {
        let offset = self.offset_of(block_id, buf.len())?;
        let mut file = self.inner.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), FsError> {
        let offset = self.offset_of(block_id, buf.len())?;
        let mut file = self.inner.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<(), FsError> {
        let mut file = self.inner.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }
}
