//! Directory child lists.
//!
//! A directory's children are block IDs stored right after its node record,
//! inside its single home block. `size` tells how many are in use.

use tracing::trace;

use crate::block::write_block;
use crate::config::*;
use crate::node::{corrupt, read_node};
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

/// Reads child pointer `index` of a directory, rejecting the zero pointer.
fn child_at(dir_block: &Block, dir: &Node, index: usize) -> Result<u32> {
    let child = dir_block.child(index).map_err(|_| corrupt(dir.first_block, "child count exceeds capacity"))?;
    if child == SUPERBLOCK_ID {
        return Err(corrupt(dir.first_block, "zero child pointer"));
    }
    Ok(child)
}

fn check_dir(dir: &Node) -> Result<()> {
    if !dir.is_dir() {
        return Err(Error::NotFound);
    }
    if dir.size as usize > MAX_DIR_CHILDREN {
        return Err(corrupt(dir.first_block, "child count exceeds capacity"));
    }
    Ok(())
}

/// Returns the child block IDs of a directory in list order.
pub fn dir_children(dir_block: &Block, dir: &Node) -> Result<Vec<u32>> {
    check_dir(dir)?;
    (0..dir.size as usize)
        .map(|i| child_at(dir_block, dir, i))
        .collect()
}

/// Finds the first child named `name` whose type intersects `ntype`.
/// Every child visited before the match must be a valid node.
pub fn dir_lookup(
    device: &dyn BlockDevice,
    dir_block: &Block,
    dir: &Node,
    name: &str,
    ntype: NodeType,
) -> Result<Option<(u32, Node)>> {
    check_dir(dir)?;
    for i in 0..dir.size as usize {
        let child_id = child_at(dir_block, dir, i)?;
        let (_, child) = read_node(device, child_id)?;
        trace!(dir = dir.first_block, child = child_id, name = %child.name(), "checking entry");
        if child.ntype.intersects(ntype) && child.name_eq(name) {
            return Ok(Some((child_id, child)));
        }
    }
    Ok(None)
}

/// Appends `child_id` to a directory's child list and bumps its count.
/// Caller holds the directory's node guard.
pub fn dir_add_child(device: &dyn BlockDevice, dir_id: u32, child_id: u32) -> Result<Node> {
    let (mut dir_block, mut dir) = read_node(device, dir_id)?;
    check_dir(&dir)?;
    let index = dir.size as usize;
    if index >= MAX_DIR_CHILDREN {
        return Err(Error::TooManyChildren);
    }
    dir_block.set_child(index, child_id)?;
    dir.size += 1;
    dir_block.set_node(&dir);
    write_block(device, dir_id, &dir_block)?;
    Ok(dir)
}

/// Lists a directory's children as (home block, node) pairs.
pub fn read_dir(device: &dyn BlockDevice, dir_id: u32) -> Result<Vec<(u32, Node)>> {
    let (dir_block, dir) = read_node(device, dir_id)?;
    dir_children(&dir_block, &dir)?
        .into_iter()
        .map(|child_id| read_node(device, child_id).map(|(_, node)| (child_id, node)))
        .collect()
}
