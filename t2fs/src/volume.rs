//! # 磁盘块管理器层
//!
//! 构建出分区的布局并使用：格式化、挂载、按块读写扇区以及 inode 表的读写。

use alloc::boxed::Box;
use alloc::sync::Arc;

use block_dev::mbr::{self, MbrError, Partition};
use block_dev::{SECTOR_SIZE, Sector, SectorDevice};

use crate::ROOT_INODE;
use crate::layout::*;
use crate::{FsError, Result};

/// 一个扇区容纳的 inode 数量
const INODES_PER_SECTOR: u32 = (SECTOR_SIZE / DiskInode::SIZE) as u32;

/// 一个已挂载的分区
pub struct Volume {
    dev: Arc<dyn SectorDevice>,
    partition: Partition,
    sb: SuperBlock,
    pub(crate) bitmap: Box<dyn BitmapStore>,
}

impl Volume {
    /// 格式化第`partition`个分区，返回写入的超级块。
    ///
    /// 写入超级块后将分区剩余的扇区全部清零，再分配 0 号 inode 作为空的根目录。
    pub fn format(
        dev: &Arc<dyn SectorDevice>,
        partition: usize,
        sectors_per_block: u32,
    ) -> Result<SuperBlock> {
        // 参数检查先于读取分区表
        if sectors_per_block == 0 {
            return Err(FsError::InvalidArgument("sectors per block must be positive"));
        }

        let part = find_partition(dev.as_ref(), partition)?;
        let sb = SuperBlock::plan(part.sectors(), sectors_per_block)?;
        log::info!(
            "formatting partition {partition}: {} blocks of {} sectors, inode area {} blocks",
            sb.disk_size,
            sb.block_size,
            sb.inode_area_size
        );

        let mut sector = [0; SECTOR_SIZE];
        sb.write_to(&mut sector);
        write_sector(dev.as_ref(), part.first_sector, &sector)?;

        let zero = [0; SECTOR_SIZE];
        for sid in part.first_sector + 1..=part.last_sector {
            write_sector(dev.as_ref(), sid, &zero)?;
        }

        let mut vol = Self::open(dev.clone(), partition)?;
        let root = vol.alloc_inode()?;
        debug_assert_eq!(ROOT_INODE, root);
        vol.write_inode(root, &DiskInode::new())?;

        Ok(sb)
    }

    /// 使用默认的扇区位图打开分区
    pub fn open(dev: Arc<dyn SectorDevice>, partition: usize) -> Result<Self> {
        let bitmap = Box::new(SectorBitmap::new(dev.clone()));
        Self::open_with(dev, partition, bitmap)
    }

    /// 打开分区并校验超级块，位图由调用者提供
    pub fn open_with(
        dev: Arc<dyn SectorDevice>,
        partition: usize,
        bitmap: Box<dyn BitmapStore>,
    ) -> Result<Self> {
        let part = find_partition(dev.as_ref(), partition)?;

        let mut sector = [0; SECTOR_SIZE];
        read_sector(dev.as_ref(), part.first_sector, &mut sector)?;
        let sb = SuperBlock::read_from(&sector);
        sb.validate(part.sectors())?;

        log::info!(
            "opened partition {partition}: {} data blocks, {} inode slots",
            sb.data_blocks(),
            sb.inode_slots()
        );

        Ok(Self {
            dev,
            partition: part,
            sb,
            bitmap,
        })
    }

    #[inline]
    pub fn super_block(&self) -> &SuperBlock {
        &self.sb
    }

    #[inline]
    pub fn partition(&self) -> Partition {
        self.partition
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn SectorDevice> {
        &self.dev
    }

    /// 读取块内第`nth`个扇区
    pub fn read_block_sector(&self, block_id: u32, nth: u32, buf: &mut Sector) -> Result<()> {
        read_sector(self.dev.as_ref(), self.sector_of(block_id, nth), buf)
    }

    pub fn write_block_sector(&self, block_id: u32, nth: u32, buf: &Sector) -> Result<()> {
        write_sector(self.dev.as_ref(), self.sector_of(block_id, nth), buf)
    }

    pub fn zero_block(&self, block_id: u32) -> Result<()> {
        let zero = [0; SECTOR_SIZE];
        for nth in 0..self.sb.sectors_per_block() {
            self.write_block_sector(block_id, nth, &zero)?;
        }
        Ok(())
    }

    /// 通过编号读取 inode，只读取其所在的扇区
    pub fn read_inode(&self, inode_id: u32) -> Result<DiskInode> {
        let (sid, offset) = self.inode_pos(inode_id)?;
        let mut sector = [0; SECTOR_SIZE];
        read_sector(self.dev.as_ref(), sid, &mut sector)?;
        Ok(bytemuck::pod_read_unaligned(
            &sector[offset..offset + DiskInode::SIZE],
        ))
    }

    /// 读-改-写 inode 所在的扇区，只替换这一条记录
    pub fn write_inode(&self, inode_id: u32, inode: &DiskInode) -> Result<()> {
        let (sid, offset) = self.inode_pos(inode_id)?;
        let mut sector = [0; SECTOR_SIZE];
        read_sector(self.dev.as_ref(), sid, &mut sector)?;
        sector[offset..offset + DiskInode::SIZE].copy_from_slice(bytemuck::bytes_of(inode));
        write_sector(self.dev.as_ref(), sid, &sector)
    }
}

impl Volume {
    #[inline]
    fn sector_of(&self, block_id: u32, nth: u32) -> u32 {
        self.partition.first_sector + block_id * self.sb.sectors_per_block() + nth
    }

    /// 通过编号获取 inode 在磁盘上的位置：**扇区号**以及**扇区内偏移**
    fn inode_pos(&self, inode_id: u32) -> Result<(u32, usize)> {
        if inode_id >= self.sb.inode_slots() {
            return Err(FsError::NoSuchInode(inode_id));
        }

        let sid = self.sector_of(self.sb.inode_area_start(), 0) + inode_id / INODES_PER_SECTOR;
        let offset = (inode_id % INODES_PER_SECTOR) as usize * DiskInode::SIZE;
        Ok((sid, offset))
    }
}

fn find_partition(dev: &dyn SectorDevice, index: usize) -> Result<Partition> {
    mbr::read_partition(dev, index).map_err(|e| match e {
        MbrError::Device(source) => FsError::DeviceRead { sector: 0, source },
        MbrError::NotFound { index, .. } => FsError::PartitionNotFound(index),
        MbrError::Malformed => FsError::InvalidArgument("malformed partition table"),
    })
}

fn read_sector(dev: &dyn SectorDevice, sector: u32, buf: &mut Sector) -> Result<()> {
    dev.read_sector(sector, buf)
        .map_err(|source| FsError::DeviceRead { sector, source })
}

fn write_sector(dev: &dyn SectorDevice, sector: u32, buf: &Sector) -> Result<()> {
    dev.write_sector(sector, buf)
        .map_err(|source| FsError::DeviceWrite { sector, source })
}
