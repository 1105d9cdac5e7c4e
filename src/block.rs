//! Block store: typed block reads and writes on top of a raw device.
//! No caching; every call goes to the device.

use tracing::trace;

use crate::config::BLOCK_SIZE;
use crate::structs::Block;
use crate::{BlockDevice, Error, Result};

fn check_block_id(device: &(impl BlockDevice + ?Sized), block_id: u32) -> Result<usize> {
    let id = block_id as usize;
    if id >= device.num_blocks() {
        return Err(Error::InvalidBlockId(block_id));
    }
    Ok(id)
}

pub fn read_block(device: &(impl BlockDevice + ?Sized), block_id: u32) -> Result<Block> {
    let id = check_block_id(device, block_id)?;
    let mut buf = vec![0u8; BLOCK_SIZE];
    device.read_block(id, &mut buf)?;
    trace!(block = block_id, "read block");
    Ok(Block::decode(&buf))
}

pub fn write_block(device: &(impl BlockDevice + ?Sized), block_id: u32, block: &Block) -> Result<()> {
    let id = check_block_id(device, block_id)?;
    let mut buf = vec![0u8; BLOCK_SIZE];
    block.encode(&mut buf);
    device.write_block(id, &buf)?;
    trace!(block = block_id, "wrote block");
    Ok(())
}
