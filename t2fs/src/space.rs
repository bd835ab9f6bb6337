//! 空间分配器：在位图上分配、回收块与 inode。
//!
//! 位被置 1 表示对应的块或 inode 正在使用。块位图的位号相对于数据块区域，
//! 对外的块编号则是分区内的绝对块号。

use crate::layout::{BitmapKind, BitmapScope};
use crate::{FsError, Result, Volume};

impl Volume {
    /// 线性扫描位图，占用第一个空闲位。
    ///
    /// 对块而言返回分区内的块号，且返回前已将块清零。
    pub fn allocate(&mut self, kind: BitmapKind) -> Result<u32> {
        let limit = self.limit(kind);
        let start = self.partition().first_sector;

        let mut scope = BitmapScope::open(self.bitmap.as_mut(), start)?;
        let mut found = None;
        for bit in 0..limit {
            if !scope.get(kind, bit)? {
                scope.set(kind, bit, true)?;
                found = Some(bit);
                break;
            }
        }
        scope.finish()?;

        let bit = found.ok_or(FsError::SpaceExhausted(kind))?;
        match kind {
            BitmapKind::Inode => Ok(bit),
            BitmapKind::Block => {
                let block_id = self.super_block().data_area_start() + bit;
                if let Err(e) = self.zero_block(block_id) {
                    self.free(kind, block_id)?;
                    return Err(e);
                }
                log::debug!("allocated block {block_id}");
                Ok(block_id)
            }
        }
    }

    /// 清除对应的位。重复释放不会被察觉。
    pub fn free(&mut self, kind: BitmapKind, id: u32) -> Result<()> {
        let bit = self.bit_of(kind, id)?;
        let start = self.partition().first_sector;

        let mut scope = BitmapScope::open(self.bitmap.as_mut(), start)?;
        scope.set(kind, bit, false)?;
        scope.finish()?;
        Ok(())
    }

    pub fn is_in_use(&mut self, kind: BitmapKind, id: u32) -> Result<bool> {
        let bit = self.bit_of(kind, id)?;
        let start = self.partition().first_sector;

        let mut scope = BitmapScope::open(self.bitmap.as_mut(), start)?;
        let used = scope.get(kind, bit)?;
        scope.finish()?;
        Ok(used)
    }

    /// 统计空闲的块或 inode
    pub fn count_free(&mut self, kind: BitmapKind) -> Result<u32> {
        let limit = self.limit(kind);
        let start = self.partition().first_sector;

        let mut scope = BitmapScope::open(self.bitmap.as_mut(), start)?;
        let mut free = 0;
        for bit in 0..limit {
            if !scope.get(kind, bit)? {
                free += 1;
            }
        }
        scope.finish()?;
        Ok(free)
    }

    #[inline]
    pub fn alloc_block(&mut self) -> Result<u32> {
        self.allocate(BitmapKind::Block)
    }

    #[inline]
    pub fn alloc_inode(&mut self) -> Result<u32> {
        self.allocate(BitmapKind::Inode)
    }

    #[inline]
    pub fn free_block(&mut self, block_id: u32) -> Result<()> {
        log::debug!("freeing block {block_id}");
        self.free(BitmapKind::Block, block_id)
    }

    #[inline]
    pub fn free_inode(&mut self, inode_id: u32) -> Result<()> {
        self.free(BitmapKind::Inode, inode_id)
    }
}

impl Volume {
    /// 可分配的位数
    fn limit(&self, kind: BitmapKind) -> u32 {
        match kind {
            BitmapKind::Block => self.super_block().data_blocks(),
            BitmapKind::Inode => self.super_block().inode_slots(),
        }
    }

    fn bit_of(&self, kind: BitmapKind, id: u32) -> Result<u32> {
        let bit = match kind {
            BitmapKind::Inode => id,
            BitmapKind::Block => id
                .checked_sub(self.super_block().data_area_start())
                .ok_or(FsError::OutOfRange(id))?,
        };

        if bit >= self.limit(kind) {
            return Err(FsError::OutOfRange(id));
        }
        Ok(bit)
    }
}
