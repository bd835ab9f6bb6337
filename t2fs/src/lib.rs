#![no_std]

extern crate alloc;

/* T2FS 的整体架构，自上而下 */

// 会话层：打开文件表、读写游标以及目录遍历
mod vfs;
pub use vfs::{DirEntryInfo, Handle, MAX_OPEN_FILES, SeekPos, T2fs};

// 根目录：目录项的查找、创建与删除
mod dir;
pub use dir::ROOT_INODE;

// 按字节读写 inode 的内容
mod file;

// 空间分配器：块与 inode 的位图分配
mod space;

// 磁盘块管理器层：格式化、挂载以及 inode 表
mod volume;
pub use volume::Volume;

// 磁盘数据结构层：表示磁盘文件系统的数据结构
pub mod layout;

mod error;
pub use error::{FsError, Result};

// 磁盘块设备接口层
pub use block_dev::{SECTOR_SIZE, Sector, SectorDevice};
