//! FlatFS is a minimal filesystem living entirely inside one flat image.
//! No journaling, no deletion, no symbolic links; permissions are a stored mode byte.
//!
//! FlatFS's linear layout:
//! - Block 0: Superblock
//! - Block 1: Root directory
//! - Blocks 2..N: free, or claimed by nodes and file content
//!
//! Every block starts with a header holding the next block of its chain and
//! a `FREE`/`METADATA` attribute byte. A node lives at the start of its home
//! block; a directory's child pointers follow its record in that same block,
//! and a file's first content bytes do too.
//!
//! FlatFS's layers (from bottom to top):
//! 1. Block Device: raw fixed-size block I/O.                  | User implemented, or `ImageFile`
//! 2. Block Store: typed blocks, bounds checked, no caching.   | Fs implemented
//! 3. Allocator: first-fit scan over the `FREE` flag.          | Fs implemented (swappable)
//! 4. Directory/Path: child lists and path resolution.         | Fs implemented
//! 5. Node: node records and node creation.                    | Fs implemented
//! 6. File: open handles, streaming read and write.            | Fs implemented (per-node guards)
//! 7. FileSystem: the interface for users.                     | Fs implemented

mod config;
mod block_dev;
mod structs;
mod block;
mod superblock;
mod allocator;
mod lock;
mod directory;
mod path;
mod node;
mod file;
mod check;
mod fs;
mod error;

pub use block_dev::{BlockDevice, ImageFile};
pub use config::*;
pub use structs::*;
pub use block::{read_block, write_block};
pub use superblock::{read_superblock, write_superblock};
pub use allocator::{BlockAllocator, LinearScan};
pub use path::{Lookup, join, split};
pub use file::{File, OpenMode};
pub use check::{CheckReport, Problem, blocks_for_size};
pub use fs::*;
pub use error::FsError as Error;
pub use error::Result;
