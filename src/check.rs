//! Read-only consistency check of a whole image.
//!
//! Walks every node reachable from the root, cross-checks each file's size
//! against the length of its chain, and accounts for every block: a block is
//! either the superblock, reachable, or free. Anything else is leaked.

use std::fmt;

use tracing::{debug, warn};

use crate::block::read_block;
use crate::config::*;
use crate::directory::dir_children;
use crate::node::read_node;
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Problem {
    /// A pointer leads to something that is not a valid node.
    BadNode { block: u32, detail: String },
    /// A block is reached from two places.
    SharedBlock { block: u32 },
    /// A chain pointer leaves the image or lands on a free block or a node.
    BadChain { file: u32, block: u32 },
    /// The chain holds fewer blocks than the file's size needs.
    ChainTooShort { file: u32, expected: u32, found: u32 },
    /// The chain holds more blocks than the size needs, e.g. after an interrupted write.
    ChainTooLong { file: u32, expected: u32, found: u32 },
    /// Allocated, but no node reaches it.
    Leaked { block: u32 },
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Problem::BadNode { block, detail } => write!(f, "block {block}: bad node ({detail})"),
            Problem::SharedBlock { block } => write!(f, "block {block}: reached more than once"),
            Problem::BadChain { file, block } => {
                write!(f, "file at block {file}: broken chain at block {block}")
            }
            Problem::ChainTooShort { file, expected, found } => write!(
                f,
                "file at block {file}: chain has {found} blocks, size needs {expected}"
            ),
            Problem::ChainTooLong { file, expected, found } => write!(
                f,
                "file at block {file}: chain has {found} blocks, size needs only {expected}"
            ),
            Problem::Leaked { block } => write!(f, "block {block}: allocated but unreachable"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub directories: u32,
    pub files: u32,
    pub char_devices: u32,
    pub used_blocks: u32,
    pub free_blocks: u32,
    pub problems: Vec<Problem>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Number of blocks a file of `size` content bytes occupies, home block included.
pub fn blocks_for_size(size: u32) -> u32 {
    let size = size as usize;
    if size <= HOME_DATA_CAPACITY {
        return 1;
    }
    (1 + (size - HOME_DATA_CAPACITY).div_ceil(BLOCK_DATA_SIZE)) as u32
}

pub fn check(device: &dyn BlockDevice, superblock: &SuperBlock) -> Result<CheckReport> {
    let num_blocks = superblock.num_blocks();
    let mut seen = vec![false; num_blocks as usize];
    seen[SUPERBLOCK_ID as usize] = true;
    let mut report = CheckReport::default();
    let mut pending = vec![ROOT_BLOCK_ID];

    while let Some(block_id) = pending.pop() {
        if block_id >= num_blocks {
            report.problems.push(Problem::BadNode {
                block: block_id,
                detail: "pointer out of range".into(),
            });
            continue;
        }
        if seen[block_id as usize] {
            report.problems.push(Problem::SharedBlock { block: block_id });
            continue;
        }
        let (block, node) = match read_node(device, block_id) {
            Ok(found) => found,
            Err(e @ Error::CorruptImage { .. }) => {
                report.problems.push(Problem::BadNode { block: block_id, detail: e.to_string() });
                continue;
            }
            Err(e) => return Err(e),
        };
        seen[block_id as usize] = true;

        if node.is_dir() {
            report.directories += 1;
            match dir_children(&block, &node) {
                // Children are pushed in reverse so they are visited in list order.
                Ok(children) => pending.extend(children.into_iter().rev()),
                Err(e) => report.problems.push(Problem::BadNode { block: block_id, detail: e.to_string() }),
            }
            continue;
        }

        if node.ntype == NodeType::CHAR_DEVICE {
            report.char_devices += 1;
        } else {
            report.files += 1;
        }
        let found = walk_chain(device, num_blocks, &mut seen, &mut report, block_id, &block)?;
        let expected = blocks_for_size(node.size);
        if found < expected {
            report.problems.push(Problem::ChainTooShort { file: block_id, expected, found });
        } else if found > expected {
            report.problems.push(Problem::ChainTooLong { file: block_id, expected, found });
        }
    }

    for block_id in 0..num_blocks {
        if seen[block_id as usize] {
            report.used_blocks += 1;
        } else if read_block(device, block_id)?.is_free() {
            report.free_blocks += 1;
        } else {
            report.problems.push(Problem::Leaked { block: block_id });
        }
    }

    for problem in &report.problems {
        warn!(%problem, "check found a problem");
    }
    debug!(
        used = report.used_blocks,
        free = report.free_blocks,
        problems = report.problems.len(),
        "check finished"
    );
    Ok(report)
}

/// Marks a file's chain as seen and returns its length in blocks.
fn walk_chain(
    device: &dyn BlockDevice,
    num_blocks: u32,
    seen: &mut [bool],
    report: &mut CheckReport,
    home: u32,
    home_block: &Block,
) -> Result<u32> {
    let mut count = 1;
    let mut next = home_block.next();
    while let Some(block_id) = next {
        if block_id >= num_blocks {
            report.problems.push(Problem::BadChain { file: home, block: block_id });
            break;
        }
        if seen[block_id as usize] {
            report.problems.push(Problem::SharedBlock { block: block_id });
            break;
        }
        let block = read_block(device, block_id)?;
        if block.is_free() || block.is_metadata() {
            report.problems.push(Problem::BadChain { file: home, block: block_id });
            break;
        }
        seen[block_id as usize] = true;
        count += 1;
        next = block.next();
    }
    Ok(count)
}
