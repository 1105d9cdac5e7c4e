use tracing::debug;

use crate::block::{read_block, write_block};
use crate::config::*;
use crate::structs::*;
use crate::{BlockDevice, Error, Result};

pub fn read_superblock(device: &(impl BlockDevice + ?Sized)) -> Result<SuperBlock> {
    let block = read_block(device, SUPERBLOCK_ID)?;
    let superblock = SuperBlock::decode(block.data.as_slice());

    if superblock.magic != *FS_MAGIC {
        return Err(Error::InvalidSuperBlock("bad magic"));
    }
    if superblock.block_size != BLOCK_SIZE as u32 {
        return Err(Error::InvalidSuperBlock("unsupported block size"));
    }
    if superblock.size % BLOCK_SIZE as u64 != 0 {
        return Err(Error::InvalidSuperBlock("size is not block aligned"));
    }
    let num_blocks = superblock.size / BLOCK_SIZE as u64;
    if num_blocks < MIN_BLOCKS as u64
        || num_blocks > device.num_blocks() as u64
        || num_blocks > u32::MAX as u64
    {
        return Err(Error::InvalidSuperBlock("size does not fit the device"));
    }

    Ok(superblock)
}

pub fn write_superblock(device: &(impl BlockDevice + ?Sized), superblock: &SuperBlock) -> Result<()> {
    let mut block = Block::new(BlockAttributes::METADATA);
    superblock.encode(block.data.as_mut_slice());
    write_block(device, SUPERBLOCK_ID, &block)?;
    device.flush()?;
    Ok(())
}

/// Lays down an empty image: superblock, root directory, and free blocks.
/// `/dev` and its devices are created afterwards by the caller.
pub fn format_fs(device: &(impl BlockDevice + ?Sized), size: u64) -> Result<SuperBlock> {
    if size % BLOCK_SIZE as u64 != 0 {
        return Err(Error::InvalidArgument("size must be a multiple of the block size"));
    }
    let num_blocks = size / BLOCK_SIZE as u64;
    if num_blocks < MIN_BLOCKS as u64 {
        return Err(Error::InvalidArgument("image too small"));
    }
    if num_blocks > device.num_blocks() as u64 || num_blocks > u32::MAX as u64 {
        return Err(Error::InvalidArgument("image larger than the device"));
    }

    let superblock = SuperBlock::new(size);
    write_superblock(device, &superblock)?;

    let root = Node::new(NodeType::DIRECTORY, Mode::ROOT_DEFAULT, ROOT_BLOCK_ID, ROOT_NAME)?;
    write_block(device, ROOT_BLOCK_ID, &Block::with_node(&root))?;

    let free = Block::free();
    for block_id in ROOT_BLOCK_ID + 1..num_blocks as u32 {
        write_block(device, block_id, &free)?;
    }
    device.flush()?;

    debug!(size, num_blocks, "formatted image");
    Ok(superblock)
}
