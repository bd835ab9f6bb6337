//! 位图区域，记录其指示区域的块/inode 分配情况
//!
//! [`BitmapStore`] 只提供单个位的读写，必须先`open`再`close`；
//! 分配器通过 [`BitmapScope`] 使用它，保证任何出口都会关闭位图。

use alloc::sync::Arc;

use block_dev::{DeviceError, SECTOR_SIZE, Sector, SectorDevice};
use derive_more::Display;

use crate::layout::SuperBlock;

/// 一个扇区的位数
const SECTOR_BITS: u32 = SECTOR_SIZE as u32 * 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BitmapKind {
    #[display(fmt = "block")]
    Block,
    #[display(fmt = "inode")]
    Inode,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    #[error("bitmap is not open")]
    NotOpen,

    #[error("bitmap is already open")]
    AlreadyOpen,

    #[error("bit {1} is outside the {0} bitmap")]
    OutOfRange(BitmapKind, u32),

    #[error("no formatted partition at sector {0}")]
    Unformatted(u32),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// 位图驱动特质，位号为位图区域内的逻辑编号
pub trait BitmapStore: Send {
    /// 打开`start_sector`处超级块所描述的位图
    fn open(&mut self, start_sector: u32) -> Result<(), BitmapError>;
    fn get(&mut self, kind: BitmapKind, bit: u32) -> Result<bool, BitmapError>;
    fn set(&mut self, kind: BitmapKind, bit: u32, value: bool) -> Result<(), BitmapError>;
    fn close(&mut self) -> Result<(), BitmapError>;
}

/// 一次打开位图的作用域，离开作用域时关闭位图
pub struct BitmapScope<'a> {
    store: &'a mut dyn BitmapStore,
    open: bool,
}

impl<'a> BitmapScope<'a> {
    pub fn open(store: &'a mut dyn BitmapStore, start_sector: u32) -> Result<Self, BitmapError> {
        store.open(start_sector)?;
        Ok(Self { store, open: true })
    }

    #[inline]
    pub fn get(&mut self, kind: BitmapKind, bit: u32) -> Result<bool, BitmapError> {
        self.store.get(kind, bit)
    }

    #[inline]
    pub fn set(&mut self, kind: BitmapKind, bit: u32, value: bool) -> Result<(), BitmapError> {
        self.store.set(kind, bit, value)
    }

    /// 关闭位图并报告关闭时的错误
    pub fn finish(mut self) -> Result<(), BitmapError> {
        self.open = false;
        self.store.close()
    }
}

impl Drop for BitmapScope<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.store.close() {
                log::warn!("closing bitmap on an error path failed: {e}");
            }
        }
    }
}

/// 位于扇区设备上的位图
pub struct SectorBitmap {
    dev: Arc<dyn SectorDevice>,
    state: Option<OpenBitmap>,
}

/// 打开期间的状态，仅在`open`与`close`之间缓存一个扇区
struct OpenBitmap {
    /// 块位图与 inode 位图
    areas: [Area; 2],
    buf: Sector,
    cached: Option<u32>,
    dirty: bool,
}

#[derive(Clone, Copy)]
struct Area {
    /// 位图的起始扇区（绝对扇区号）
    start: u32,
    /// 位图能记录的位数
    bits: u32,
}

impl SectorBitmap {
    pub fn new(dev: Arc<dyn SectorDevice>) -> Self {
        Self { dev, state: None }
    }

    fn state(&mut self) -> Result<(&dyn SectorDevice, &mut OpenBitmap), BitmapError> {
        let state = self.state.as_mut().ok_or(BitmapError::NotOpen)?;
        Ok((self.dev.as_ref(), state))
    }
}

impl BitmapStore for SectorBitmap {
    fn open(&mut self, start_sector: u32) -> Result<(), BitmapError> {
        if self.state.is_some() {
            return Err(BitmapError::AlreadyOpen);
        }

        let mut sector = [0; SECTOR_SIZE];
        self.dev.read_sector(start_sector, &mut sector)?;
        let sb = SuperBlock::read_from(&sector);
        if !sb.verify() {
            return Err(BitmapError::Unformatted(start_sector));
        }

        let spb = sb.sectors_per_block();
        let area = |start_block: u32, blocks: u16| Area {
            start: start_sector + start_block * spb,
            bits: blocks as u32 * spb * SECTOR_BITS,
        };

        self.state = Some(OpenBitmap {
            areas: [
                area(sb.block_bitmap_start(), sb.block_bitmap_size),
                area(sb.inode_bitmap_start(), sb.inode_bitmap_size),
            ],
            buf: [0; SECTOR_SIZE],
            cached: None,
            dirty: false,
        });

        Ok(())
    }

    fn get(&mut self, kind: BitmapKind, bit: u32) -> Result<bool, BitmapError> {
        let (dev, state) = self.state()?;
        let (sector, byte, mask) = state.locate(kind, bit)?;
        state.load(dev, sector)?;
        Ok(state.buf[byte] & mask != 0)
    }

    fn set(&mut self, kind: BitmapKind, bit: u32, value: bool) -> Result<(), BitmapError> {
        let (dev, state) = self.state()?;
        let (sector, byte, mask) = state.locate(kind, bit)?;
        state.load(dev, sector)?;
        if value {
            state.buf[byte] |= mask;
        } else {
            state.buf[byte] &= !mask;
        }
        state.dirty = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BitmapError> {
        let mut state = self.state.take().ok_or(BitmapError::NotOpen)?;
        state.flush(self.dev.as_ref())
    }
}

impl OpenBitmap {
    /// 返回位所在扇区、扇区内字节偏移以及掩码，位序为字节内低位在前
    fn locate(&self, kind: BitmapKind, bit: u32) -> Result<(u32, usize, u8), BitmapError> {
        let area = match kind {
            BitmapKind::Block => self.areas[0],
            BitmapKind::Inode => self.areas[1],
        };
        if bit >= area.bits {
            return Err(BitmapError::OutOfRange(kind, bit));
        }

        let inner = bit % SECTOR_BITS;
        Ok((
            area.start + bit / SECTOR_BITS,
            (inner / 8) as usize,
            1 << (inner % 8),
        ))
    }

    fn load(&mut self, dev: &dyn SectorDevice, sector: u32) -> Result<(), BitmapError> {
        if self.cached == Some(sector) {
            return Ok(());
        }
        self.flush(dev)?;
        dev.read_sector(sector, &mut self.buf)?;
        self.cached = Some(sector);
        Ok(())
    }

    fn flush(&mut self, dev: &dyn SectorDevice) -> Result<(), BitmapError> {
        if let (true, Some(sector)) = (self.dirty, self.cached) {
            dev.write_sector(sector, &self.buf)?;
            self.dirty = false;
        }
        Ok(())
    }
}
