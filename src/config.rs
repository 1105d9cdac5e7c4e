pub const FS_MAGIC: &[u8; 8] = b"FLATFS\0\x01";
pub const NODE_MAGIC: u32 = 0x4E4F4445; // "NODE" in ASCII

pub const BLOCK_SIZE: usize = 4096;
pub const BLOCK_HEADER_SIZE: usize = 8; // next (4) + attributes (1) + reserved (3)
pub const BLOCK_DATA_SIZE: usize = BLOCK_SIZE - BLOCK_HEADER_SIZE;

pub const SUPERBLOCK_ID: u32 = 0; // Block ID for the superblock
pub const ROOT_BLOCK_ID: u32 = 1; // Home block of the root directory
pub const CHAIN_END: u32 = 0; // `next` value terminating a chain; block 0 is never part of one
pub const MIN_BLOCKS: usize = 3; // Superblock, root, and at least one free block

pub const NODE_SIZE: usize = 48; // Serialized node record
pub const NAME_LEN: usize = 32; // Name field, NUL padded
pub const MAX_NAME_LEN: usize = NAME_LEN - 1; // Room for the terminating NUL
pub const ROOT_NAME: &str = "ROOT";

pub const CHILD_PTR_SIZE: usize = 4;
/// Number of child pointers that fit after the node record in a directory's home block.
pub const MAX_DIR_CHILDREN: usize = (BLOCK_DATA_SIZE - NODE_SIZE) / CHILD_PTR_SIZE;
/// Content bytes a file's home block holds after its node record.
pub const HOME_DATA_CAPACITY: usize = BLOCK_DATA_SIZE - NODE_SIZE;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_layout_constants() {
        assert_eq!(BLOCK_DATA_SIZE, 4088);
        assert_eq!(MAX_DIR_CHILDREN, 1010);
        assert_eq!(HOME_DATA_CAPACITY, 4040);
        assert!(NODE_SIZE + MAX_DIR_CHILDREN * CHILD_PTR_SIZE <= BLOCK_DATA_SIZE);
    }
}
