//! Typed views of everything stored on disk.
//!
//! All records are little-endian and decoded field by field from the block's
//! data region; nothing is reinterpreted in place.

use std::fmt;

use bitflags::bitflags;

use crate::config::*;
use crate::Error;
use crate::Result;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockAttributes: u8 {
        const FREE = 1 << 0;
        const METADATA = 1 << 1;
    }
}

bitflags! {
    /// Node type. A stored node carries exactly one flag; lookups may pass a union.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeType: u8 {
        const DIRECTORY = 1 << 0;
        const FILE = 1 << 1;
        const CHAR_DEVICE = 1 << 2;
    }
}

bitflags! {
    /// Permission byte: `user << 3 | kernel`, each triple laid out as `rwx`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mode: u8 {
        const USER_READ = 1 << 5;
        const USER_WRITE = 1 << 4;
        const USER_EXEC = 1 << 3;
        const KERNEL_READ = 1 << 2;
        const KERNEL_WRITE = 1 << 1;
        const KERNEL_EXEC = 1 << 0;
    }
}

/// Whose permission triple an access is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    #[default]
    Kernel,
    User,
}

impl Mode {
    pub const FILE_DEFAULT: Mode = Mode::all(); // rwx rwx
    pub const DIR_DEFAULT: Mode = Mode::USER_READ
        .union(Mode::USER_WRITE)
        .union(Mode::KERNEL_READ)
        .union(Mode::KERNEL_WRITE); // rw- rw-
    pub const CHAR_DEVICE_DEFAULT: Mode = Mode::USER_READ
        .union(Mode::KERNEL_READ)
        .union(Mode::KERNEL_WRITE); // r-- rw-
    pub const ROOT_DEFAULT: Mode = Mode::CHAR_DEVICE_DEFAULT;

    /// Builds a mode from two `rwx` triples (`r = 4, w = 2, x = 1`).
    pub fn from_triples(user: u8, kernel: u8) -> Mode {
        Mode::from_bits_truncate((user & 0b111) << 3 | (kernel & 0b111))
    }

    pub fn default_for(ntype: NodeType) -> Mode {
        if ntype.contains(NodeType::DIRECTORY) {
            Mode::DIR_DEFAULT
        } else if ntype.contains(NodeType::CHAR_DEVICE) {
            Mode::CHAR_DEVICE_DEFAULT
        } else {
            Mode::FILE_DEFAULT
        }
    }

    pub fn can_read(self, privilege: Privilege) -> bool {
        match privilege {
            Privilege::Kernel => self.contains(Mode::KERNEL_READ),
            Privilege::User => self.contains(Mode::USER_READ),
        }
    }

    pub fn can_write(self, privilege: Privilege) -> bool {
        match privilege {
            Privilege::Kernel => self.contains(Mode::KERNEL_WRITE),
            Privilege::User => self.contains(Mode::USER_WRITE),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (Mode::USER_READ, 'r'),
            (Mode::USER_WRITE, 'w'),
            (Mode::USER_EXEC, 'x'),
            (Mode::KERNEL_READ, 'r'),
            (Mode::KERNEL_WRITE, 'w'),
            (Mode::KERNEL_EXEC, 'x'),
        ];
        for (flag, c) in flags {
            write!(f, "{}", if self.contains(flag) { c } else { '-' })?;
        }
        Ok(())
    }
}

fn le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub next: u32,
    pub attributes: BlockAttributes,
}

/// One block split into its header and data region.
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub data: Box<[u8; BLOCK_DATA_SIZE]>,
}

impl Block {
    pub fn new(attributes: BlockAttributes) -> Self {
        Self {
            header: BlockHeader {
                next: CHAIN_END,
                attributes,
            },
            data: Box::new([0u8; BLOCK_DATA_SIZE]),
        }
    }

    /// A zero-filled unallocated block, as laid down by format.
    pub fn free() -> Self {
        Self::new(BlockAttributes::FREE)
    }

    /// A block whose data region holds `node` followed by zeroes.
    pub fn with_node(node: &Node) -> Self {
        let mut block = Self::new(BlockAttributes::METADATA);
        block.set_node(node);
        block
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut data = Box::new([0u8; BLOCK_DATA_SIZE]);
        data.copy_from_slice(&buf[BLOCK_HEADER_SIZE..BLOCK_SIZE]);
        Self {
            header: BlockHeader {
                next: le_u32(buf, 0),
                attributes: BlockAttributes::from_bits_retain(buf[4]),
            },
            data,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[..BLOCK_HEADER_SIZE].fill(0);
        put_u32(buf, 0, self.header.next);
        buf[4] = self.header.attributes.bits();
        buf[BLOCK_HEADER_SIZE..BLOCK_SIZE].copy_from_slice(self.data.as_slice());
    }

    pub fn is_free(&self) -> bool {
        self.header.attributes.contains(BlockAttributes::FREE)
    }

    pub fn is_metadata(&self) -> bool {
        self.header.attributes.contains(BlockAttributes::METADATA)
    }

    pub fn next(&self) -> Option<u32> {
        match self.header.next {
            CHAIN_END => None,
            next => Some(next),
        }
    }

    /// Decodes the node record at the start of the data region without validating it.
    pub fn node(&self) -> Node {
        Node::decode(&self.data[..NODE_SIZE])
    }

    pub fn set_node(&mut self, node: &Node) {
        node.encode(&mut self.data[..NODE_SIZE]);
    }

    /// Reads child pointer `index` of a directory home block.
    pub fn child(&self, index: usize) -> Result<u32> {
        let offset = child_offset(index)?;
        Ok(le_u32(self.data.as_slice(), offset))
    }

    pub fn set_child(&mut self, index: usize, block_id: u32) -> Result<()> {
        let offset = child_offset(index)?;
        put_u32(self.data.as_mut_slice(), offset, block_id);
        Ok(())
    }
}

fn child_offset(index: usize) -> Result<usize> {
    if index >= MAX_DIR_CHILDREN {
        return Err(Error::TooManyChildren);
    }
    Ok(NODE_SIZE + index * CHILD_PTR_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub magic: [u8; 8],
    pub size: u64,       // Total image size in bytes
    pub block_size: u32, // Fixed to BLOCK_SIZE
}

impl SuperBlock {
    pub fn new(size: u64) -> Self {
        Self {
            magic: *FS_MAGIC,
            size,
            block_size: BLOCK_SIZE as u32,
        }
    }

    pub fn num_blocks(&self) -> u32 {
        (self.size / self.block_size.max(1) as u64) as u32
    }

    pub fn decode(data: &[u8]) -> Self {
        let mut magic = [0u8; 8];
        magic.copy_from_slice(&data[..8]);
        let mut size = [0u8; 8];
        size.copy_from_slice(&data[8..16]);
        Self {
            magic,
            size: u64::from_le_bytes(size),
            block_size: le_u32(data, 16),
        }
    }

    pub fn encode(&self, data: &mut [u8]) {
        data[..8].copy_from_slice(&self.magic);
        data[8..16].copy_from_slice(&self.size.to_le_bytes());
        put_u32(data, 16, self.block_size);
    }
}

/// Metadata record of a directory, file, or character device.
///
/// `size` counts children for a directory and content bytes otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub magic: u32,
    pub ntype: NodeType,
    pub mode: Mode,
    pub size: u32,
    pub first_block: u32,
    pub name: [u8; NAME_LEN],
}

impl Node {
    pub fn new(ntype: NodeType, mode: Mode, first_block: u32, name: &str) -> Result<Self> {
        validate_name(name)?;
        let mut raw = [0u8; NAME_LEN];
        raw[..name.len()].copy_from_slice(name.as_bytes());
        Ok(Self {
            magic: NODE_MAGIC,
            ntype,
            mode,
            size: 0,
            first_block,
            name: raw,
        })
    }

    pub fn decode(buf: &[u8]) -> Self {
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&buf[16..16 + NAME_LEN]);
        Self {
            magic: le_u32(buf, 0),
            ntype: NodeType::from_bits_retain(buf[4]),
            mode: Mode::from_bits_retain(buf[5]),
            size: le_u32(buf, 8),
            first_block: le_u32(buf, 12),
            name,
        }
    }

    pub fn encode(&self, buf: &mut [u8]) {
        buf[..NODE_SIZE].fill(0);
        put_u32(buf, 0, self.magic);
        buf[4] = self.ntype.bits();
        buf[5] = self.mode.bits();
        put_u32(buf, 8, self.size);
        put_u32(buf, 12, self.first_block);
        buf[16..16 + NAME_LEN].copy_from_slice(&self.name);
    }

    /// Checks the record's identity: magic and exactly one known type flag.
    pub fn is_valid(&self) -> bool {
        self.magic == NODE_MAGIC
            && NodeType::from_bits(self.ntype.bits()).is_some()
            && self.ntype.bits().count_ones() == 1
    }

    pub fn is_dir(&self) -> bool {
        self.ntype == NodeType::DIRECTORY
    }

    pub fn name_bytes(&self) -> &[u8] {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_LEN);
        &self.name[..end]
    }

    /// The stored name; bytes that are not UTF-8 are replaced.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.name_bytes()).into_owned()
    }

    pub fn name_eq(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }
}

/// A name must be one non-empty path component that fits the name field with its NUL.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(Error::InvalidName);
    }
    if name.bytes().any(|c| c == b'/' || c == 0) {
        return Err(Error::InvalidName);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_modes_match_triples() {
        assert_eq!(Mode::FILE_DEFAULT.bits(), 0o77);
        assert_eq!(Mode::DIR_DEFAULT.bits(), 0o66);
        assert_eq!(Mode::CHAR_DEVICE_DEFAULT.bits(), 0o46);
        assert_eq!(Mode::from_triples(4, 6), Mode::CHAR_DEVICE_DEFAULT);
        assert_eq!(Mode::DIR_DEFAULT.to_string(), "rw-rw-");
    }

    #[test]
    fn test_mode_privileges() {
        let mode = Mode::CHAR_DEVICE_DEFAULT;
        assert!(mode.can_read(Privilege::User));
        assert!(!mode.can_write(Privilege::User));
        assert!(mode.can_write(Privilege::Kernel));
    }

    #[test]
    fn test_node_encoding() {
        let node = Node::new(NodeType::FILE, Mode::FILE_DEFAULT, 7, "notes.txt").unwrap();
        let mut block = Block::with_node(&node);
        block.header.next = 9;
        let mut raw = vec![0u8; BLOCK_SIZE];
        block.encode(&mut raw);
        assert_eq!(raw[4], BlockAttributes::METADATA.bits());
        assert_eq!(&raw[8..12], &NODE_MAGIC.to_le_bytes());

        let decoded = Block::decode(&raw);
        assert_eq!(decoded.next(), Some(9));
        assert!(decoded.is_metadata());
        assert_eq!(decoded.node(), node);
        assert_eq!(decoded.node().name(), "notes.txt");
    }

    #[test]
    fn test_child_pointers() {
        let mut block = Block::new(BlockAttributes::METADATA);
        block.set_child(0, 12).unwrap();
        block.set_child(MAX_DIR_CHILDREN - 1, 34).unwrap();
        assert_eq!(block.child(0).unwrap(), 12);
        assert_eq!(block.child(MAX_DIR_CHILDREN - 1).unwrap(), 34);
        assert!(matches!(block.child(MAX_DIR_CHILDREN), Err(Error::TooManyChildren)));
    }

    #[test]
    fn test_invalid_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN)).is_ok());
        assert!(validate_name(&"x".repeat(NAME_LEN)).is_err());
    }

    #[test]
    fn test_node_validity() {
        let mut node = Node::new(NodeType::DIRECTORY, Mode::DIR_DEFAULT, 1, "d").unwrap();
        assert!(node.is_valid());
        node.ntype = NodeType::DIRECTORY | NodeType::FILE;
        assert!(!node.is_valid());
        node.ntype = NodeType::DIRECTORY;
        node.magic = 0;
        assert!(!node.is_valid());
    }
}
