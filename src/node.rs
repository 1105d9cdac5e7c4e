//! Node records: loading, persisting, and creation.

use tracing::{debug, warn};

use crate::allocator::BlockAllocator;
use crate::block::{read_block, write_block};
use crate::config::*;
use crate::directory::dir_add_child;
use crate::lock::NodeLocks;
use crate::path::{Lookup, find_node, split};
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

/// Loads the node whose home block is `block_id`, validating what the block claims to be.
pub fn read_node(device: &dyn BlockDevice, block_id: u32) -> Result<(Block, Node)> {
    if block_id == SUPERBLOCK_ID {
        return Err(corrupt(block_id, "node pointer is zero"));
    }
    let block = match read_block(device, block_id) {
        Ok(block) => block,
        Err(Error::InvalidBlockId(_)) => return Err(corrupt(block_id, "node pointer out of range")),
        Err(e) => return Err(e),
    };
    if !block.is_metadata() || block.is_free() {
        return Err(corrupt(block_id, "block does not hold a node"));
    }
    let node = block.node();
    if !node.is_valid() {
        return Err(corrupt(block_id, "bad node magic or type"));
    }
    if node.first_block != block_id {
        return Err(corrupt(block_id, "node does not live in its home block"));
    }
    Ok((block, node))
}

/// Rewrites the node record in its home block, keeping the rest of the block as it is on disk.
pub fn write_node(device: &dyn BlockDevice, node: &Node) -> Result<()> {
    let mut block = read_block(device, node.first_block)?;
    block.set_node(node);
    write_block(device, node.first_block, &block)
}

pub(crate) fn corrupt(block: u32, detail: &'static str) -> Error {
    warn!(block, detail, "corruption detected");
    Error::CorruptImage { block, detail }
}

/// Creates a node at `path`, linking it into the parent directory.
///
/// The node gets its own freshly allocated home block, scanned for starting at
/// the parent's home block. Names are not checked for uniqueness; lookups
/// resolve to the first match.
/// Returns the new node's home block and record.
pub fn mknode(
    device: &dyn BlockDevice,
    superblock: &SuperBlock,
    allocator: &dyn BlockAllocator,
    locks: &NodeLocks,
    path: &str,
    ntype: NodeType,
) -> Result<(u32, Node)> {
    if ntype.bits().count_ones() != 1 {
        return Err(Error::InvalidArgument("node must have exactly one type"));
    }
    let name = split(path).last().copied().ok_or(Error::InvalidName)?;
    validate_name(name)?;

    let (parent_id, _) = find_node(device, path, NodeType::DIRECTORY, Lookup::Parent)?
        .ok_or(Error::ParentNotFound)?;

    let _guard = locks.lock(parent_id);
    // Reload under the guard; another creation may have grown the child list.
    let (_, parent) = read_node(device, parent_id)?;
    if parent.size as usize >= MAX_DIR_CHILDREN {
        return Err(Error::TooManyChildren);
    }

    let block_id = allocator.allocate(
        device,
        superblock,
        parent_id,
        Block::new(BlockAttributes::METADATA),
    )?;
    let node = Node::new(ntype, Mode::default_for(ntype), block_id, name)?;
    write_block(device, block_id, &Block::with_node(&node))?;
    dir_add_child(device, parent_id, block_id)?;

    debug!(path, block = block_id, parent = parent_id, ?ntype, "created node");
    Ok((block_id, node))
}
