//! # 分区表
//!
//! 位于设备的 0 号扇区，小端序：
//!
//! | 字节 | 含义 |
//! |------|------|
//! | 0..2 | 版本 |
//! | 2..4 | 扇区字节数 |
//! | 4..6 | 首个分区描述符的字节偏移 |
//! | 6..8 | 分区数量 |
//!
//! 每个分区描述符占 32 字节：首扇区 `u32`、末扇区 `u32`（闭区间），其余为分区名。

use crate::{DeviceError, SECTOR_SIZE, Sector, SectorDevice};

pub const MBR_VERSION: u16 = 0x7E32;
/// 分区描述符表的默认偏移
pub const TABLE_OFFSET: usize = 8;
pub const DESCRIPTOR_SIZE: usize = 32;
/// 0 号扇区能容纳的分区描述符数量
pub const MAX_PARTITIONS: usize = (SECTOR_SIZE - TABLE_OFFSET) / DESCRIPTOR_SIZE;

const NAME_LEN: usize = DESCRIPTOR_SIZE - 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub first_sector: u32,
    /// 包含在分区内
    pub last_sector: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MbrError {
    #[error("cannot read the partition table: {0}")]
    Device(#[from] DeviceError),

    #[error("partition {index} not found, the disk has {count}")]
    NotFound { index: usize, count: usize },

    #[error("malformed partition table")]
    Malformed,
}

impl Partition {
    #[inline]
    pub fn new(first_sector: u32, last_sector: u32) -> Self {
        Self {
            first_sector,
            last_sector,
        }
    }

    /// 分区的扇区数
    #[inline]
    pub fn sectors(&self) -> u32 {
        self.last_sector - self.first_sector + 1
    }
}

fn word(sector: &Sector, at: usize) -> u16 {
    u16::from_le_bytes([sector[at], sector[at + 1]])
}

fn dword(sector: &Sector, at: usize) -> u32 {
    u32::from_le_bytes([sector[at], sector[at + 1], sector[at + 2], sector[at + 3]])
}

/// 分区数量
pub fn partition_count(dev: &dyn SectorDevice) -> Result<usize, MbrError> {
    let mut mbr = [0; SECTOR_SIZE];
    dev.read_sector(0, &mut mbr)?;
    Ok(word(&mbr, 6) as usize)
}

/// 读取第`index`个分区的扇区范围
pub fn read_partition(dev: &dyn SectorDevice, index: usize) -> Result<Partition, MbrError> {
    let mut mbr = [0; SECTOR_SIZE];
    dev.read_sector(0, &mut mbr)?;

    let count = word(&mbr, 6) as usize;
    if index >= count {
        return Err(MbrError::NotFound { index, count });
    }

    let at = word(&mbr, 4) as usize + DESCRIPTOR_SIZE * index;
    if at + 8 > SECTOR_SIZE {
        return Err(MbrError::Malformed);
    }

    let partition = Partition::new(dword(&mbr, at), dword(&mbr, at + 4));
    if partition.last_sector < partition.first_sector || partition.first_sector == 0 {
        return Err(MbrError::Malformed);
    }

    Ok(partition)
}

/// 写入分区表，分区之间不允许重叠，也不能覆盖 0 号扇区
pub fn write_table(dev: &dyn SectorDevice, partitions: &[Partition]) -> Result<(), MbrError> {
    if partitions.len() > MAX_PARTITIONS {
        return Err(MbrError::Malformed);
    }

    let mut prev_end = 0;
    for p in partitions {
        if p.first_sector <= prev_end
            || p.last_sector < p.first_sector
            || p.last_sector >= dev.sector_count()
        {
            return Err(MbrError::Malformed);
        }
        prev_end = p.last_sector;
    }

    let mut mbr = [0; SECTOR_SIZE];
    mbr[0..2].copy_from_slice(&MBR_VERSION.to_le_bytes());
    mbr[2..4].copy_from_slice(&(SECTOR_SIZE as u16).to_le_bytes());
    mbr[4..6].copy_from_slice(&(TABLE_OFFSET as u16).to_le_bytes());
    mbr[6..8].copy_from_slice(&(partitions.len() as u16).to_le_bytes());

    for (i, p) in partitions.iter().enumerate() {
        let at = TABLE_OFFSET + DESCRIPTOR_SIZE * i;
        mbr[at..at + 4].copy_from_slice(&p.first_sector.to_le_bytes());
        mbr[at + 4..at + 8].copy_from_slice(&p.last_sector.to_le_bytes());

        // 分区名形如 "part0"
        let name = &mut mbr[at + 8..at + 8 + NAME_LEN];
        name[..4].copy_from_slice(b"part");
        name[4] = b'0' + i as u8;
    }

    dev.write_sector(0, &mbr)?;
    Ok(())
}

/// 把`sectors`个扇区均分为`count`个分区，0 号扇区留给分区表
pub fn split_evenly(sectors: u32, count: usize) -> alloc::vec::Vec<Partition> {
    if count == 0 || sectors < 1 + count as u32 {
        return alloc::vec::Vec::new();
    }

    let each = (sectors - 1) / count as u32;
    (0..count as u32)
        .map(|i| Partition::new(1 + i * each, i * each + each))
        .collect()
}
