//! # 会话层
//!
//! 一次挂载对应一个 [`T2fs`]：持有分区、打开文件表以及目录游标，
//! 所有操作都经由它完成。

use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;

use block_dev::SectorDevice;
use derive_more::{Display, From, Into};

use crate::layout::{DirEntry, EntryKind, SuperBlock};
use crate::{FsError, Result, Volume};

/// 同时打开的文件数上限
pub const MAX_OPEN_FILES: usize = 10;
/// 打开文件时最多跟随的符号链接层数
const MAX_LINK_DEPTH: usize = 8;

/// 打开文件表的下标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, From, Into, Display)]
pub struct Handle(usize);

#[derive(Debug, Clone, Copy)]
struct OpenFile {
    inode: u32,
    /// 读写游标（字节）
    pos: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPos {
    Start(u32),
    /// 文件末尾，之后的写入都是追加
    End,
}

/// `readdir`返回的目录项信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub size: u32,
}

pub struct T2fs {
    vol: Volume,
    files: [Option<OpenFile>; MAX_OPEN_FILES],
    /// 下一次`readdir`开始扫描的槽位
    dir_cursor: Option<u32>,
}

impl T2fs {
    #[inline]
    pub fn format(
        dev: &Arc<dyn SectorDevice>,
        partition: usize,
        sectors_per_block: u32,
    ) -> Result<SuperBlock> {
        Volume::format(dev, partition, sectors_per_block)
    }

    pub fn mount(dev: Arc<dyn SectorDevice>, partition: usize) -> Result<Self> {
        Ok(Self::with_volume(Volume::open(dev, partition)?))
    }

    pub fn with_volume(vol: Volume) -> Self {
        Self {
            vol,
            files: [None; MAX_OPEN_FILES],
            dir_cursor: None,
        }
    }

    /// 卸载分区，所有句柄随之失效
    pub fn umount(self) {
        let open = self.files.iter().flatten().count();
        log::info!("unmounting partition with {open} open files");
    }

    #[inline]
    pub fn superblock(&self) -> &SuperBlock {
        self.vol.super_block()
    }

    #[inline]
    pub fn volume(&self) -> &Volume {
        &self.vol
    }

    #[inline]
    pub fn volume_mut(&mut self) -> &mut Volume {
        &mut self.vol
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Result<Option<DirEntry>> {
        self.vol.lookup(name)
    }

    /// 新建普通文件并打开
    pub fn create(&mut self, name: &str) -> Result<Handle> {
        let slot = self.free_slot()?;
        let inode = self.vol.create(name, EntryKind::Regular)?;
        self.files[slot] = Some(OpenFile { inode, pos: 0 });
        Ok(Handle(slot))
    }

    /// 打开已有文件，游标位于开头
    pub fn open(&mut self, name: &str) -> Result<Handle> {
        let slot = self.free_slot()?;
        let inode = self.follow(name)?;
        self.files[slot] = Some(OpenFile { inode, pos: 0 });
        Ok(Handle(slot))
    }

    pub fn close(&mut self, handle: Handle) -> Result<()> {
        self.file(handle)?;
        self.files[handle.0] = None;
        Ok(())
    }

    /// 从游标处读取，返回值小于`buf`的长度说明到达了文件末尾
    pub fn read(&mut self, handle: Handle, buf: &mut [u8]) -> Result<usize> {
        let file = self.file(handle)?;
        let inode = self.vol.read_inode(file.inode)?;
        let n = self.vol.read_at(&inode, file.pos, buf)?;
        self.advance(handle, n);
        Ok(n)
    }

    pub fn write(&mut self, handle: Handle, buf: &[u8]) -> Result<usize> {
        let file = self.file(handle)?;
        let mut inode = self.vol.read_inode(file.inode)?;
        let n = self.vol.write_at(file.inode, &mut inode, file.pos, buf)?;
        self.advance(handle, n);
        Ok(n)
    }

    pub fn seek(&mut self, handle: Handle, to: SeekPos) -> Result<()> {
        let file = self.file(handle)?;
        let size = self.vol.read_inode(file.inode)?.size;
        let pos = match to {
            SeekPos::Start(pos) if pos > size => return Err(FsError::OutOfRange(pos)),
            SeekPos::Start(pos) => pos,
            SeekPos::End => size,
        };

        if let Some(file) = &mut self.files[handle.0] {
            file.pos = pos;
        }
        Ok(())
    }

    /// 删除目录项；仍被打开的文件不能删除
    pub fn delete(&mut self, name: &str) -> Result<()> {
        let entry = self
            .vol
            .lookup(name)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;
        if self.files.iter().flatten().any(|f| f.inode == entry.inode()) {
            return Err(FsError::Busy(name.to_string()));
        }
        self.vol.unlink(name)
    }

    pub fn opendir(&mut self) {
        self.dir_cursor = Some(0);
    }

    /// 下一个有效目录项，`None`表示已经读完
    pub fn readdir(&mut self) -> Result<Option<DirEntryInfo>> {
        let from = self.dir_cursor.ok_or(FsError::DirNotOpen)?;
        let Some((slot, entry)) = self.vol.next_entry(from)? else {
            self.dir_cursor = Some(self.vol.slot_count()?);
            return Ok(None);
        };

        self.dir_cursor = Some(slot + 1);
        let size = self.vol.read_inode(entry.inode())?.size;
        Ok(Some(DirEntryInfo {
            name: entry.name().to_string(),
            kind: entry.kind(),
            size,
        }))
    }

    pub fn closedir(&mut self) -> Result<()> {
        self.dir_cursor.take().map(|_| ()).ok_or(FsError::DirNotOpen)
    }

    #[inline]
    pub fn hard_link(&mut self, link: &str, target: &str) -> Result<()> {
        self.vol.link(link, target)
    }

    #[inline]
    pub fn soft_link(&mut self, link: &str, target: &str) -> Result<()> {
        self.vol.symlink(link, target)
    }
}

impl T2fs {
    fn free_slot(&self) -> Result<usize> {
        self.files
            .iter()
            .position(Option::is_none)
            .ok_or(FsError::TooManyOpenFiles)
    }

    fn file(&self, handle: Handle) -> Result<OpenFile> {
        self.files
            .get(handle.0)
            .copied()
            .flatten()
            .ok_or(FsError::BadHandle(handle.0))
    }

    fn advance(&mut self, handle: Handle, n: usize) {
        if let Some(file) = &mut self.files[handle.0] {
            file.pos += n as u32;
        }
    }

    /// 跟随符号链接，得到最终普通文件的 inode 编号
    fn follow(&self, name: &str) -> Result<u32> {
        let mut current = name.to_string();
        for _ in 0..=MAX_LINK_DEPTH {
            let entry = self
                .vol
                .lookup(&current)?
                .ok_or_else(|| FsError::NotFound(current.clone()))?;

            match entry.kind() {
                EntryKind::Regular => return Ok(entry.inode()),
                EntryKind::Directory => return Err(FsError::IsADirectory(current)),
                EntryKind::SymLink => {
                    let inode = self.vol.read_inode(entry.inode())?;
                    let mut target = vec![0; inode.size as usize];
                    self.vol.read_at(&inode, 0, &mut target)?;
                    current = String::from_utf8(target)
                        .map_err(|_| FsError::InvalidArgument("link target is not UTF-8"))?;
                    log::debug!("following link {:?} to {current:?}", entry.name());
                }
                EntryKind::Invalid => return Err(FsError::NotFound(current)),
            }
        }

        Err(FsError::LinkLoop(name.to_string()))
    }
}
