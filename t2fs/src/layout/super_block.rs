use core::mem;

use block_dev::{SECTOR_SIZE, Sector};
use bytemuck::{Pod, Zeroable};

use crate::layout::DiskInode;
use crate::{FsError, Result};

pub const MAGIC: [u8; 4] = *b"T2FS";
pub const VERSION: u16 = 0x7E32;

/// 一个扇区的位数
const SECTOR_BITS: u64 = SECTOR_SIZE as u64 * 8;
/// inode 区域占总块数的十分之一
const INODE_AREA_RATIO: u64 = 10;

/// 超级块：
/// - 提供文件系统合法性校验；
/// - 定位其它连续区域
///
/// 前五个 32 位字参与校验和的计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct SuperBlock {
    /// 魔数 "T2FS"
    magic: [u8; 4],
    version: u16,
    /// 超级块占用块数，恒为 1
    pub superblock_size: u16,
    /// 空闲块位图占用块数
    pub block_bitmap_size: u16,
    /// 空闲 inode 位图占用块数
    pub inode_bitmap_size: u16,
    /// inode 区域占用块数
    pub inode_area_size: u16,
    /// 一个块的扇区数
    pub block_size: u16,
    /// 分区的总块数
    pub disk_size: u32,
    checksum: u32,
}

impl SuperBlock {
    pub const SIZE: usize = mem::size_of::<Self>();

    /// 按分区扇区数规划布局并计算校验和
    pub fn plan(partition_sectors: u32, sectors_per_block: u32) -> Result<Self> {
        if sectors_per_block == 0 {
            return Err(FsError::InvalidArgument("sectors per block must be positive"));
        }
        let block_size = u16::try_from(sectors_per_block)
            .map_err(|_| FsError::InvalidArgument("too many sectors per block"))?;

        let blocks = partition_sectors / sectors_per_block;
        let block_bitmap = u64::from(blocks).div_ceil(SECTOR_BITS);
        let inode_area = u64::from(blocks).div_ceil(INODE_AREA_RATIO);
        let inode_bitmap = (inode_area * u64::from(sectors_per_block))
            .div_ceil(DiskInode::SIZE as u64 * 8);

        let required = required_blocks(block_bitmap, inode_bitmap, inode_area);
        if u64::from(blocks) < required {
            return Err(FsError::TooFewBlocks {
                blocks,
                required: required as u32,
            });
        }

        let narrow = |blocks: u64| {
            u16::try_from(blocks).map_err(|_| FsError::InvalidArgument("partition too large"))
        };

        let mut sb = Self {
            magic: MAGIC,
            version: VERSION,
            superblock_size: 1,
            block_bitmap_size: narrow(block_bitmap)?,
            inode_bitmap_size: narrow(inode_bitmap)?,
            inode_area_size: narrow(inode_area)?,
            block_size,
            disk_size: blocks,
            checksum: 0,
        };
        sb.checksum = sb.compute_checksum();

        Ok(sb)
    }

    #[inline]
    pub fn read_from(sector: &Sector) -> Self {
        bytemuck::pod_read_unaligned(&sector[..Self::SIZE])
    }

    #[inline]
    pub fn write_to(&self, sector: &mut Sector) {
        sector[..Self::SIZE].copy_from_slice(bytemuck::bytes_of(self));
    }

    /// 前五个字之和取反
    pub fn compute_checksum(&self) -> u32 {
        !fold(&self.words()[..5])
    }

    /// 六个字（含校验和）之和取反应为 0
    #[inline]
    pub fn verify(&self) -> bool {
        !fold(&self.words()) == 0
    }

    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// 挂载前的完整校验
    pub fn validate(&self, partition_sectors: u32) -> Result<()> {
        if !self.verify() {
            return Err(FsError::ChecksumMismatch);
        }

        if self.magic != MAGIC
            || self.version != VERSION
            || self.superblock_size != 1
            || self.block_size == 0
            || u64::from(self.disk_size) * u64::from(self.block_size) > u64::from(partition_sectors)
            || u64::from(self.disk_size)
                < required_blocks(
                    self.block_bitmap_size.into(),
                    self.inode_bitmap_size.into(),
                    self.inode_area_size.into(),
                )
        {
            return Err(FsError::UnknownFormat);
        }

        Ok(())
    }

    #[inline]
    pub fn sectors_per_block(&self) -> u32 {
        self.block_size as u32
    }

    #[inline]
    pub fn block_bytes(&self) -> usize {
        self.block_size as usize * SECTOR_SIZE
    }

    /// 空闲块位图的起始块
    #[inline]
    pub fn block_bitmap_start(&self) -> u32 {
        self.superblock_size as u32
    }

    /// 空闲 inode 位图的起始块
    #[inline]
    pub fn inode_bitmap_start(&self) -> u32 {
        self.block_bitmap_start() + self.block_bitmap_size as u32
    }

    /// inode 区域的起始块，此前皆为元数据
    #[inline]
    pub fn inode_area_start(&self) -> u32 {
        self.inode_bitmap_start() + self.inode_bitmap_size as u32
    }

    /// 数据块区域的起始块
    #[inline]
    pub fn data_area_start(&self) -> u32 {
        self.inode_area_start() + self.inode_area_size as u32
    }

    /// 可分配的数据块数量
    #[inline]
    pub fn data_blocks(&self) -> u32 {
        self.disk_size.saturating_sub(self.data_area_start())
    }

    /// inode 槽位总数
    #[inline]
    pub fn inode_slots(&self) -> u32 {
        (self.inode_area_size as usize * self.block_bytes() / DiskInode::SIZE) as u32
    }

    /// 间接索引块的编号容量
    #[inline]
    pub fn indirect_entries(&self) -> usize {
        self.block_bytes() / super::REF_SIZE
    }

    /// 单个文件最多拥有的数据块数
    pub fn max_file_blocks(&self) -> u64 {
        let m = self.indirect_entries() as u64;
        super::DIRECT_COUNT as u64 + m + m * m
    }
}

impl SuperBlock {
    #[inline]
    fn words(&self) -> [u32; 6] {
        bytemuck::cast(*self)
    }
}

/// 分区至少需要的块数：超级块、位图、inode 区域之外还要有一个数据块
fn required_blocks(block_bitmap: u64, inode_bitmap: u64, inode_area: u64) -> u64 {
    2 + block_bitmap + inode_bitmap + inode_area
}

/// 反码求和：64 位累加，高位不断回卷到低 32 位
fn fold(words: &[u32]) -> u32 {
    let mut sum: u64 = words.iter().map(|&w| u64::from(w)).sum();
    while sum >> 32 != 0 {
        sum = (sum & 0xFFFF_FFFF) + (sum >> 32);
    }
    sum as u32
}
