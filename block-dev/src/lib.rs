//! # 扇区设备接口层
//!
//! 扇区设备是以**扇区**为单位存储数据的设备；
//! [`SectorDevice`] 就是对读写扇区设备的抽象，
//! 实现了此特质的类型称为**扇区设备驱动**。
//!
//! 设备只提供整扇区的读写，不做缓存，也不支持部分扇区访问。

#![no_std]

extern crate alloc;

pub mod mbr;
mod ram_disk;

use core::any::Any;

pub use self::ram_disk::RamDisk;

/// 扇区字节数
pub const SECTOR_SIZE: usize = 256;

/// 一个扇区的数据
pub type Sector = [u8; SECTOR_SIZE];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("sector {0} is beyond the end of the device")]
    OutOfRange(u32),

    #[error("I/O failure at sector {0}")]
    Io(u32),

    #[error("device is read-only")]
    ReadOnly,
}

/// 扇区设备驱动特质，扇区号为设备上的绝对编号
pub trait SectorDevice: Send + Sync + Any {
    fn read_sector(&self, sector: u32, buf: &mut Sector) -> Result<(), DeviceError>;
    fn write_sector(&self, sector: u32, buf: &Sector) -> Result<(), DeviceError>;

    /// 设备的扇区总数
    fn sector_count(&self) -> u32;
}
