use alloc::string::String;

use block_dev::DeviceError;

use crate::layout::{BitmapError, BitmapKind};

pub type Result<T, E = FsError> = core::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("partition {0} not found")]
    PartitionNotFound(usize),

    #[error("failed to read sector {sector}")]
    DeviceRead {
        sector: u32,
        #[source]
        source: DeviceError,
    },

    #[error("failed to write sector {sector}")]
    DeviceWrite {
        sector: u32,
        #[source]
        source: DeviceError,
    },

    #[error("partition has {blocks} blocks, at least {required} are needed")]
    TooFewBlocks { blocks: u32, required: u32 },

    #[error("superblock checksum mismatch")]
    ChecksumMismatch,

    #[error("not a T2FS partition")]
    UnknownFormat,

    #[error("bitmap error: {0}")]
    Bitmap(#[from] BitmapError),

    #[error("no free {0} left")]
    SpaceExhausted(BitmapKind),

    #[error("index {0} out of range")]
    OutOfRange(u32),

    #[error("inode {0} does not exist")]
    NoSuchInode(u32),

    #[error("{0:?} already exists")]
    AlreadyExists(String),

    #[error("{0:?} not found")]
    NotFound(String),

    #[error("name is longer than {0} bytes")]
    NameTooLong(usize),

    #[error("{0:?} is a directory")]
    IsADirectory(String),

    #[error("too many levels of symbolic links at {0:?}")]
    LinkLoop(String),

    #[error("bad file handle {0}")]
    BadHandle(usize),

    #[error("too many open files")]
    TooManyOpenFiles,

    #[error("{0:?} is still open")]
    Busy(String),

    #[error("directory is not open")]
    DirNotOpen,
}
