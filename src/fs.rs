use std::fmt::{self, Write as _};
use std::sync::Arc;

use tracing::debug;

use crate::allocator::{BlockAllocator, LinearScan, count_free};
use crate::check::{CheckReport, check};
use crate::config::*;
use crate::directory::read_dir;
use crate::file::{self, File, OpenMode};
use crate::lock::NodeLocks;
use crate::node::{mknode, read_node};
use crate::path::{Lookup, find_node, join};
use crate::structs::*;
use crate::superblock::{format_fs, read_superblock};
use crate::{BlockDevice, Error, Result};

/// A mounted image. All methods take `&self`; structural changes are
/// serialized by per-node guards and the allocator's own lock, so one
/// instance can be shared across threads.
pub struct FileSystem<D: BlockDevice> {
    device: Arc<D>,
    superblock: SuperBlock,
    allocator: Box<dyn BlockAllocator>,
    locks: NodeLocks,
}

impl<D: BlockDevice> fmt::Debug for FileSystem<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSystem")
            .field("superblock", &self.superblock)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}

impl<D: BlockDevice> FileSystem<D> {
    /// Formats `size` bytes of the device and creates `/dev`, `/dev/stdout` and `/dev/stdin`.
    pub fn format(device: Arc<D>, size: u64) -> Result<Self> {
        Self::format_with(device, size, Box::new(LinearScan::new()))
    }

    pub fn format_with(device: Arc<D>, size: u64, allocator: Box<dyn BlockAllocator>) -> Result<Self> {
        let superblock = format_fs(&*device, size)?;
        let fs = Self::with_parts(device, superblock, allocator);
        fs.mknode("/dev", NodeType::DIRECTORY)?;
        fs.mknode("/dev/stdout", NodeType::CHAR_DEVICE)?;
        fs.mknode("/dev/stdin", NodeType::CHAR_DEVICE)?;
        fs.flush()?;
        debug!(size, "filesystem ready");
        Ok(fs)
    }

    pub fn mount(device: Arc<D>) -> Result<Self> {
        Self::mount_with(device, Box::new(LinearScan::new()))
    }

    pub fn mount_with(device: Arc<D>, allocator: Box<dyn BlockAllocator>) -> Result<Self> {
        let superblock = read_superblock(&*device)?;
        read_node(&*device, ROOT_BLOCK_ID)?;
        debug!(size = superblock.size, "mounted filesystem");
        Ok(Self::with_parts(device, superblock, allocator))
    }

    fn with_parts(device: Arc<D>, superblock: SuperBlock, allocator: Box<dyn BlockAllocator>) -> Self {
        Self {
            device,
            superblock,
            allocator,
            locks: NodeLocks::new(),
        }
    }

    fn dev(&self) -> &dyn BlockDevice {
        &*self.device
    }

    /// Resolves `path` to a node whose type intersects `ntype`.
    /// `Ok(None)` means some component did not resolve.
    pub fn find_node(&self, path: &str, ntype: NodeType) -> Result<Option<(u32, Node)>> {
        find_node(self.dev(), path, ntype, Lookup::Target)
    }

    /// Resolves the directory that holds (or would hold) the last component of `path`.
    pub fn find_parent(&self, path: &str) -> Result<Option<(u32, Node)>> {
        find_node(self.dev(), path, NodeType::DIRECTORY, Lookup::Parent)
    }

    /// Resolves a node of any type, failing with `NotFound`.
    pub fn stat(&self, path: &str) -> Result<(u32, Node)> {
        self.find_node(path, NodeType::all())?.ok_or(Error::NotFound)
    }

    pub fn mknode(&self, path: &str, ntype: NodeType) -> Result<(u32, Node)> {
        mknode(self.dev(), &self.superblock, &*self.allocator, &self.locks, path, ntype)
    }

    pub fn mknode_in(&self, parent: &str, name: &str, ntype: NodeType) -> Result<(u32, Node)> {
        validate_name(name)?;
        self.mknode(&join(parent, name), ntype)
    }

    pub fn mkdir(&self, path: &str) -> Result<(u32, Node)> {
        self.mknode(path, NodeType::DIRECTORY)
    }

    /// Like `mknode`, but fails with `AlreadyExists` when the parent already has a child of that name.
    pub fn create(&self, path: &str, ntype: NodeType) -> Result<(u32, Node)> {
        if self.find_node(path, NodeType::all())?.is_some() {
            return Err(Error::AlreadyExists);
        }
        self.mknode(path, ntype)
    }

    pub fn read_dir(&self, path: &str) -> Result<Vec<(u32, Node)>> {
        let (dir_id, _) = self.find_node(path, NodeType::DIRECTORY)?.ok_or(Error::NotFound)?;
        read_dir(self.dev(), dir_id)
    }

    /// Opens with kernel privilege.
    pub fn open(&self, path: &str, mode: OpenMode) -> Result<File> {
        self.open_as(path, mode, Privilege::Kernel)
    }

    pub fn open_as(&self, path: &str, mode: OpenMode, privilege: Privilege) -> Result<File> {
        file::open(
            self.dev(),
            &self.superblock,
            &*self.allocator,
            &self.locks,
            path,
            mode,
            privilege,
        )
    }

    pub fn read(&self, file: &mut File, buf: &mut [u8]) -> Result<usize> {
        file::read(self.dev(), &self.superblock, &self.locks, file, buf)
    }

    /// Reads from the cursor to the end of content.
    pub fn read_to_end(&self, file: &mut File) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; BLOCK_DATA_SIZE];
        loop {
            let n = self.read(file, &mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    pub fn write(&self, file: &mut File, buf: &[u8]) -> Result<usize> {
        file::write(self.dev(), &self.superblock, &*self.allocator, &self.locks, file, buf)
    }

    pub fn check(&self) -> Result<CheckReport> {
        check(self.dev(), &self.superblock)
    }

    pub fn free_blocks(&self) -> Result<u32> {
        count_free(self.dev(), &self.superblock)
    }

    pub fn flush(&self) -> Result<()> {
        self.device.flush()
    }

    pub fn root_block_id(&self) -> u32 {
        ROOT_BLOCK_ID
    }

    pub fn superblock(&self) -> &SuperBlock {
        &self.superblock
    }

    pub fn device(&self) -> Arc<D> {
        Arc::clone(&self.device)
    }

    /// Renders the directory tree, one node per line.
    pub fn dump(&self) -> Result<String> {
        let mut out = String::new();
        let (_, root) = read_node(self.dev(), ROOT_BLOCK_ID)?;
        let _ = writeln!(out, "/ [{}] {} blocks", root.mode, self.superblock.num_blocks());
        self.dump_dir(ROOT_BLOCK_ID, 1, &mut out)?;
        Ok(out)
    }

    fn dump_dir(&self, dir_id: u32, depth: usize, out: &mut String) -> Result<()> {
        for (child_id, child) in read_dir(self.dev(), dir_id)? {
            let _ = writeln!(
                out,
                "{:indent$}{} [{}] {} @{}",
                "",
                child.name(),
                child.mode,
                child.size,
                child_id,
                indent = depth * 2
            );
            if child.is_dir() {
                self.dump_dir(child_id, depth + 1, out)?;
            }
        }
        Ok(())
    }
}
