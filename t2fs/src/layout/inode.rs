//! 间接索引块
//! - 单间接：整个块连续存储**块编号**，每个编号都指向一个**数据块**
//! - 双间接：整个块连续存储**块编号**，每个编号都指向一个单间接索引块
//!
//! 编号为 0 表示未分配。索引块按需分配：第一次用到时才向分配器申请。
//!
//! ## 块索引编码
//!
//! 设间接索引块的编号容量为 `M`：
//! - `[0, 2)`：直接索引
//! - `[2, 2 + M)`：单间接索引，块内位置为 `index - 2`
//! - `[2 + M, 2 + M + M²)`：双间接索引，`index - 2 - M` 除以 `M` 得外层位置，模 `M` 得内层位置

use alloc::vec::Vec;
use core::mem;

use block_dev::SECTOR_SIZE;
use bytemuck::{Pod, Zeroable};

use crate::{FsError, Result, Volume};

/// 直接索引数量
pub const DIRECT_COUNT: usize = 2;
/// 块编号的字节数
pub const REF_SIZE: usize = mem::size_of::<u32>();

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DiskInode {
    /// 拥有的数据块数，驱动寻址
    pub blocks: u32,
    /// 文件的字节数
    pub size: u32,
    pub direct: [u32; DIRECT_COUNT],
    /// 指向一个单间接索引块
    pub single_indirect: u32,
    /// 指向一个双间接索引块
    pub double_indirect: u32,
    /// 硬链接个数，即引用此 inode 的目录项数
    pub links: u32,
    _reserved: u32,
}

/// 逻辑块在索引结构中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockPos {
    Direct(usize),
    Single(usize),
    Double(usize, usize),
}

impl BlockPos {
    fn locate(index: u32, entries: usize) -> Option<Self> {
        let mut index = index as usize;
        if index < DIRECT_COUNT {
            return Some(Self::Direct(index));
        }

        index -= DIRECT_COUNT;
        if index < entries {
            return Some(Self::Single(index));
        }

        index -= entries;
        (index < entries * entries).then(|| Self::Double(index / entries, index % entries))
    }
}

impl DiskInode {
    pub const SIZE: usize = mem::size_of::<Self>();

    /// 空文件，被一个目录项引用
    #[inline]
    pub fn new() -> Self {
        Self {
            links: 1,
            ..Default::default()
        }
    }

    /// 逻辑上 inode 指向一系列数据块，此处传入的是这些数据块的索引（逻辑索引），
    /// 然后返回其在分区内的块编号
    pub fn resolve(&self, index: u32, vol: &Volume) -> Result<u32> {
        if index >= self.blocks {
            return Err(FsError::OutOfRange(index));
        }

        match BlockPos::locate(index, vol.super_block().indirect_entries()) {
            Some(BlockPos::Direct(i)) => Ok(self.direct[i]),
            Some(BlockPos::Single(i)) => entry(vol, self.single_indirect, i),
            Some(BlockPos::Double(outer, inner)) => {
                let indirect1 = entry(vol, self.double_indirect, outer)?;
                entry(vol, indirect1, inner)
            }
            None => Err(FsError::OutOfRange(index)),
        }
    }

    /// 将`block_id`接在文件末尾，成为第`blocks`个逻辑块。
    ///
    /// 索引块在首次使用时分配，并先于`blocks`的更新写入磁盘。
    /// 调用者负责把更新后的 inode 写回。
    pub fn grow(&mut self, block_id: u32, vol: &mut Volume) -> Result<()> {
        let index = self.blocks;

        match BlockPos::locate(index, vol.super_block().indirect_entries()) {
            Some(BlockPos::Direct(i)) => self.direct[i] = block_id,
            Some(BlockPos::Single(i)) => {
                if self.single_indirect == 0 {
                    self.single_indirect = vol.alloc_block()?;
                    log::debug!("single indirect block {}", self.single_indirect);
                }
                set_entry(vol, self.single_indirect, i, block_id)?;
            }
            Some(BlockPos::Double(outer, inner)) => {
                if self.double_indirect == 0 {
                    self.double_indirect = vol.alloc_block()?;
                    log::debug!("double indirect block {}", self.double_indirect);
                }

                let mut indirect1 = entry(vol, self.double_indirect, outer)?;
                if indirect1 == 0 {
                    indirect1 = vol.alloc_block()?;
                    set_entry(vol, self.double_indirect, outer, indirect1)?;
                    log::debug!("second-level block {indirect1} at {outer}");
                }
                set_entry(vol, indirect1, inner, block_id)?;
            }
            None => return Err(FsError::OutOfRange(index)),
        }

        self.blocks += 1;
        Ok(())
    }

    /// 释放 inode 拥有的全部块，从最后一个逻辑块倒序走到第 0 块。
    ///
    /// 索引块在其最后一个编号被释放后才释放，
    /// 所以尚未释放的块始终可以经由其索引块找到。
    pub fn shrink_to_empty(&mut self, vol: &mut Volume) -> Result<()> {
        let entries = vol.super_block().indirect_entries();
        self.release_spare(vol, entries)?;

        while self.blocks > 0 {
            let index = self.blocks - 1;
            match BlockPos::locate(index, entries) {
                Some(BlockPos::Direct(i)) => {
                    release(vol, self.direct[i])?;
                    self.direct[i] = 0;
                }
                Some(BlockPos::Single(i)) => {
                    let block_id = entry(vol, self.single_indirect, i)?;
                    release(vol, block_id)?;
                    if i == 0 {
                        release(vol, self.single_indirect)?;
                        self.single_indirect = 0;
                    }
                }
                Some(BlockPos::Double(outer, inner)) => {
                    // 先取出二级块的编号，再释放它指向的数据块
                    let indirect1 = entry(vol, self.double_indirect, outer)?;
                    if indirect1 != 0 {
                        let block_id = entry(vol, indirect1, inner)?;
                        release(vol, block_id)?;
                        if inner == 0 {
                            vol.free_block(indirect1)?;
                        }
                    }
                    if outer == 0 && inner == 0 {
                        release(vol, self.double_indirect)?;
                        self.double_indirect = 0;
                    }
                }
                None => return Err(FsError::OutOfRange(index)),
            }
            self.blocks = index;
        }

        self.size = 0;
        Ok(())
    }

    /// inode 拥有的全部块，包括索引块，按逻辑顺序排列
    pub fn owned_blocks(&self, vol: &Volume) -> Result<Vec<u32>> {
        let entries = vol.super_block().indirect_entries();
        let mut blocks = Vec::with_capacity(self.blocks as usize + 2);

        for index in 0..self.blocks {
            match BlockPos::locate(index, entries) {
                Some(BlockPos::Single(0)) => blocks.push(self.single_indirect),
                Some(BlockPos::Double(outer, 0)) => {
                    if outer == 0 {
                        blocks.push(self.double_indirect);
                    }
                    blocks.push(entry(vol, self.double_indirect, outer)?);
                }
                _ => {}
            }
            blocks.push(self.resolve(index, vol)?);
        }

        Ok(blocks)
    }
}

impl DiskInode {
    /// 释放增长失败后残留的索引块：它们已分配，但还没有编号指向数据块
    fn release_spare(&mut self, vol: &mut Volume, entries: usize) -> Result<()> {
        match BlockPos::locate(self.blocks, entries) {
            Some(BlockPos::Single(0)) if self.single_indirect != 0 => {
                log::warn!("releasing spare single indirect block {}", self.single_indirect);
                vol.free_block(self.single_indirect)?;
                self.single_indirect = 0;
            }
            Some(BlockPos::Double(outer, 0)) if self.double_indirect != 0 => {
                let indirect1 = entry(vol, self.double_indirect, outer)?;
                if indirect1 != 0 {
                    log::warn!("releasing spare second-level block {indirect1}");
                    vol.free_block(indirect1)?;
                    set_entry(vol, self.double_indirect, outer, 0)?;
                }
                if outer == 0 {
                    vol.free_block(self.double_indirect)?;
                    self.double_indirect = 0;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// 编号为 0 的块未分配，跳过
fn release(vol: &mut Volume, block_id: u32) -> Result<()> {
    if block_id == 0 {
        return Ok(());
    }
    vol.free_block(block_id)
}

/// 读取索引块内第`i`个编号，只读取编号所在的扇区
fn entry(vol: &Volume, block_id: u32, i: usize) -> Result<u32> {
    let offset = i * REF_SIZE;
    let mut sector = [0; SECTOR_SIZE];
    vol.read_block_sector(block_id, (offset / SECTOR_SIZE) as u32, &mut sector)?;

    let at = offset % SECTOR_SIZE;
    Ok(u32::from_le_bytes([
        sector[at],
        sector[at + 1],
        sector[at + 2],
        sector[at + 3],
    ]))
}

fn set_entry(vol: &Volume, block_id: u32, i: usize, value: u32) -> Result<()> {
    let offset = i * REF_SIZE;
    let nth = (offset / SECTOR_SIZE) as u32;
    let mut sector = [0; SECTOR_SIZE];
    vol.read_block_sector(block_id, nth, &mut sector)?;

    let at = offset % SECTOR_SIZE;
    sector[at..at + REF_SIZE].copy_from_slice(&value.to_le_bytes());
    vol.write_block_sector(block_id, nth, &sector)
}
