//! File streams over a node's block chain.
//!
//! Content starts right after the node record in the home block and continues
//! through the `next` chain. A handle's cursor only moves forward.

use bitflags::bitflags;
use tracing::debug;

use crate::allocator::BlockAllocator;
use crate::block::{read_block, write_block};
use crate::config::*;
use crate::lock::NodeLocks;
use crate::node::{corrupt, mknode, read_node, write_node};
use crate::path::{Lookup, find_node};
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

bitflags! {
    /// Requested access. `WRITE` wins over `APPEND` for cursor placement.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
    }
}

impl OpenMode {
    pub fn readable(self) -> bool {
        self.contains(OpenMode::READ)
    }

    pub fn writable(self) -> bool {
        self.intersects(OpenMode::WRITE | OpenMode::APPEND)
    }
}

/// An open handle on a file or character device.
#[derive(Debug)]
pub struct File {
    node: Node,
    mode: OpenMode,
    /// Bytes from the start of content.
    pos: u32,
    /// Block under the cursor and offset into its data region.
    /// The offset may sit at `BLOCK_DATA_SIZE`; the next I/O moves on first.
    block: u32,
    offset: usize,
}

impl File {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn home_block(&self) -> u32 {
        self.node.first_block
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Content length as of the last operation on this handle.
    pub fn size(&self) -> u32 {
        self.node.size
    }

    pub fn position(&self) -> u32 {
        self.pos
    }

    /// Absolute byte offset in the image where the next I/O lands.
    pub fn global_offset(&self) -> u64 {
        self.block as u64 * BLOCK_SIZE as u64 + (BLOCK_HEADER_SIZE + self.offset) as u64
    }

    pub fn close(self) {}
}

/// Validates a `next` pointer read from `block_id` and returns it.
fn chain_next(superblock: &SuperBlock, block_id: u32, block: &Block) -> Result<u32> {
    let next = block.next().ok_or(Error::CorruptChain { block: block_id })?;
    if next <= ROOT_BLOCK_ID || next >= superblock.num_blocks() {
        return Err(corrupt(block_id, "next pointer out of range"));
    }
    Ok(next)
}

/// Reads a block reached through a chain; it must be an allocated content block.
fn read_chained(device: &dyn BlockDevice, block_id: u32) -> Result<Block> {
    let block = read_block(device, block_id)?;
    if block.is_free() {
        return Err(corrupt(block_id, "free block inside a chain"));
    }
    if block.is_metadata() {
        return Err(corrupt(block_id, "metadata block inside a chain"));
    }
    Ok(block)
}

/// Finds the block and data offset holding content byte `pos`, walking the chain from `home`.
fn locate(device: &dyn BlockDevice, superblock: &SuperBlock, home: u32, pos: u32) -> Result<(u32, usize)> {
    let pos = pos as usize;
    if pos <= HOME_DATA_CAPACITY {
        return Ok((home, NODE_SIZE + pos));
    }
    let rest = pos - HOME_DATA_CAPACITY;
    let hops = rest.div_ceil(BLOCK_DATA_SIZE);
    let offset = rest - (hops - 1) * BLOCK_DATA_SIZE;

    let mut block_id = home;
    let mut block = read_block(device, home)?;
    for _ in 0..hops {
        block_id = chain_next(superblock, block_id, &block)?;
        block = read_chained(device, block_id)?;
    }
    Ok((block_id, offset))
}

/// Opens the file or character device at `path`.
///
/// Write and append modes create a missing file (never a directory). Read
/// mode places the cursor at the start of content, as does write mode;
/// append places it at the current end.
pub fn open(
    device: &dyn BlockDevice,
    superblock: &SuperBlock,
    allocator: &dyn BlockAllocator,
    locks: &NodeLocks,
    path: &str,
    mode: OpenMode,
    privilege: Privilege,
) -> Result<File> {
    if mode.is_empty() {
        return Err(Error::InvalidArgument("open mode is empty"));
    }

    let streamable = NodeType::FILE | NodeType::CHAR_DEVICE;
    let (home, node) = match find_node(device, path, streamable, Lookup::Target)? {
        Some(found) => found,
        None if find_node(device, path, NodeType::DIRECTORY, Lookup::Target)?.is_some() => {
            return Err(Error::IsDirectory);
        }
        None if mode.writable() => mknode(device, superblock, allocator, locks, path, NodeType::FILE)?,
        None => return Err(Error::NotFound),
    };

    if mode.readable() && !node.mode.can_read(privilege) {
        return Err(Error::PermissionDenied);
    }
    if mode.writable() && !node.mode.can_write(privilege) {
        return Err(Error::PermissionDenied);
    }

    let mut file = File {
        node,
        mode,
        pos: 0,
        block: home,
        offset: NODE_SIZE,
    };
    if mode.contains(OpenMode::APPEND) && !mode.contains(OpenMode::WRITE) {
        let _guard = locks.lock(home);
        let (_, node) = read_node(device, home)?;
        let (block, offset) = locate(device, superblock, home, node.size)?;
        file.node = node;
        file.pos = node.size;
        file.block = block;
        file.offset = offset;
    }

    debug!(path, home, ?mode, pos = file.pos, "opened file");
    Ok(file)
}

/// Reads up to `buf.len()` bytes at the cursor.
/// Returns 0 at end of content. Either the whole clamped length is produced or an error is returned.
pub fn read(
    device: &dyn BlockDevice,
    superblock: &SuperBlock,
    locks: &NodeLocks,
    file: &mut File,
    buf: &mut [u8],
) -> Result<usize> {
    if !file.mode.readable() {
        return Err(Error::NotReadable);
    }

    let home = file.home_block();
    let _guard = locks.lock(home);
    let (_, node) = read_node(device, home)?;
    file.node = node;

    let remaining = node.size.saturating_sub(file.pos) as usize;
    let len = buf.len().min(remaining);
    if len == 0 {
        return Ok(0);
    }

    let mut block_id = file.block;
    let mut offset = file.offset;
    let mut block = read_block(device, block_id)?;
    let mut done = 0;
    while done < len {
        if offset == BLOCK_DATA_SIZE {
            block_id = chain_next(superblock, block_id, &block)?;
            block = read_chained(device, block_id)?;
            offset = 0;
        }
        let n = (len - done).min(BLOCK_DATA_SIZE - offset);
        buf[done..done + n].copy_from_slice(&block.data[offset..offset + n]);
        done += n;
        offset += n;
    }

    file.block = block_id;
    file.offset = offset;
    file.pos += len as u32;
    Ok(len)
}

/// Writes all of `buf` at the cursor, extending the chain as needed.
/// New blocks are scanned for starting at the block that ran out of room.
pub fn write(
    device: &dyn BlockDevice,
    superblock: &SuperBlock,
    allocator: &dyn BlockAllocator,
    locks: &NodeLocks,
    file: &mut File,
    buf: &[u8],
) -> Result<usize> {
    if !file.mode.writable() {
        return Err(Error::NotWritable);
    }
    if buf.is_empty() {
        return Ok(0);
    }
    let end = u32::try_from(buf.len())
        .ok()
        .and_then(|len| file.pos.checked_add(len))
        .ok_or(Error::InvalidArgument("write exceeds the maximum file size"))?;

    let home = file.home_block();
    let _guard = locks.lock(home);
    let (_, mut node) = read_node(device, home)?;

    let mut block_id = file.block;
    let mut offset = file.offset;
    let mut block = read_block(device, block_id)?;
    let mut done = 0;
    loop {
        let n = (buf.len() - done).min(BLOCK_DATA_SIZE - offset);
        block.data[offset..offset + n].copy_from_slice(&buf[done..done + n]);
        done += n;
        offset += n;
        if done == buf.len() {
            write_block(device, block_id, &block)?;
            break;
        }

        // This block is full; move to the next one, growing the chain if it ends here.
        let next = match block.next() {
            Some(_) => chain_next(superblock, block_id, &block)?,
            None => {
                let new_id = allocator.allocate(
                    device,
                    superblock,
                    block_id,
                    Block::new(BlockAttributes::empty()),
                )?;
                block.header.next = new_id;
                debug!(home, from = block_id, to = new_id, "extended chain");
                new_id
            }
        };
        write_block(device, block_id, &block)?;
        block_id = next;
        block = read_chained(device, block_id)?;
        offset = 0;
    }

    if end > node.size {
        node.size = end;
        write_node(device, &node)?;
    }

    file.node = node;
    file.block = block_id;
    file.offset = offset;
    file.pos = end;
    Ok(buf.len())
}
