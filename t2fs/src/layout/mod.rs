//! # 磁盘数据结构层
//!
//! T2FS 分区的布局，以块为单位：
//! 超级块 | 空闲块位图 | 空闲 inode 位图 | inode 区域 | 数据块区域

mod super_block;
pub use super_block::{MAGIC, SuperBlock, VERSION};

mod bitmap;
pub use bitmap::{BitmapError, BitmapKind, BitmapScope, BitmapStore, SectorBitmap};

mod inode;
pub use inode::{DIRECT_COUNT, DiskInode, REF_SIZE};

/// 目录项，也属于磁盘文件系统数据结构
mod dir_entry;
pub use dir_entry::{DirEntry, EntryKind, NAME_MAX_LEN};
