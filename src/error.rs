use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// Raw I/O failure from the backing image, including short reads and writes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block {0} is out of range")]
    InvalidBlockId(u32),
    #[error("invalid superblock: {0}")]
    InvalidSuperBlock(&'static str),
    #[error("not found")]
    NotFound,
    #[error("parent directory not found")]
    ParentNotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("is a directory")]
    IsDirectory,
    #[error("permission denied")]
    PermissionDenied,
    /// The parent's home block has no room for another child pointer.
    #[error("directory is full")]
    TooManyChildren,
    #[error("no free blocks left")]
    OutOfSpace,
    /// A structural invariant of the image does not hold at `block`.
    #[error("corrupt image at block {block}: {detail}")]
    CorruptImage { block: u32, detail: &'static str },
    /// A file's chain ends before the bytes its size promises.
    #[error("block chain ends early at block {block}")]
    CorruptChain { block: u32 },
    #[error("invalid name")]
    InvalidName,
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("file not opened for reading")]
    NotReadable,
    #[error("file not opened for writing")]
    NotWritable,
}

impl FsError {
    /// Whether this error means the image itself is damaged.
    pub fn is_corruption(&self) -> bool {
        matches!(self, FsError::CorruptImage { .. } | FsError::CorruptChain { .. })
    }
}

pub type Result<T> = core::result::Result<T, FsError>;
