//! 根目录：0 号 inode 的数据是一串紧密排列的 [`DirEntry`]。
//!
//! 删除只把槽位标记为空闲，新建时优先复用第一个空闲槽位，
//! 所以目录的大小只增不减。

use alloc::string::ToString;
use alloc::vec::Vec;

use block_dev::SECTOR_SIZE;

use crate::layout::{DirEntry, DiskInode, EntryKind};
use crate::{FsError, Result, Volume};

/// 根目录的 inode 编号
pub const ROOT_INODE: u32 = 0;

const ENTRY_SIZE: u32 = DirEntry::SIZE as u32;

impl Volume {
    #[inline]
    pub fn root_inode(&self) -> Result<DiskInode> {
        self.read_inode(ROOT_INODE)
    }

    /// 目录中的槽位数，包括空闲槽位
    pub fn slot_count(&self) -> Result<u32> {
        Ok(self.root_inode()?.size / ENTRY_SIZE)
    }

    /// 读取第`slot`个目录项
    pub fn entry_at(&self, slot: u32) -> Result<DirEntry> {
        let root = self.root_inode()?;
        if slot >= root.size / ENTRY_SIZE {
            return Err(FsError::OutOfRange(slot));
        }

        let (block_id, nth, at) = self.slot_pos(&root, slot)?;
        let mut sector = [0; SECTOR_SIZE];
        self.read_block_sector(block_id, nth, &mut sector)?;
        Ok(DirEntry::read_from(&sector[at..]))
    }

    /// 覆写已有的第`slot`个目录项
    fn put_entry(&self, root: &DiskInode, slot: u32, entry: &DirEntry) -> Result<()> {
        let (block_id, nth, at) = self.slot_pos(root, slot)?;
        let mut sector = [0; SECTOR_SIZE];
        self.read_block_sector(block_id, nth, &mut sector)?;
        sector[at..at + DirEntry::SIZE].copy_from_slice(entry.as_bytes());
        self.write_block_sector(block_id, nth, &sector)
    }

    /// 目录项不会跨扇区，因为扇区大小是目录项大小的整数倍
    fn slot_pos(&self, root: &DiskInode, slot: u32) -> Result<(u32, u32, usize)> {
        let offset = (slot * ENTRY_SIZE) as usize;
        let block_bytes = self.super_block().block_bytes();
        let block_id = root.resolve((offset / block_bytes) as u32, self)?;
        let within = offset % block_bytes;
        Ok((
            block_id,
            (within / SECTOR_SIZE) as u32,
            within % SECTOR_SIZE,
        ))
    }

    /// 按名字查找，跳过空闲槽位
    pub fn lookup(&self, name: &str) -> Result<Option<DirEntry>> {
        Ok(self.find(name)?.map(|(_, entry)| entry))
    }

    fn find(&self, name: &str) -> Result<Option<(u32, DirEntry)>> {
        for slot in 0..self.slot_count()? {
            let entry = self.entry_at(slot)?;
            if !entry.is_free() && entry.name() == name {
                return Ok(Some((slot, entry)));
            }
        }
        Ok(None)
    }

    /// 从`from`开始的第一个有效目录项及其槽位
    pub fn next_entry(&self, from: u32) -> Result<Option<(u32, DirEntry)>> {
        for slot in from..self.slot_count()? {
            let entry = self.entry_at(slot)?;
            if !entry.is_free() {
                return Ok(Some((slot, entry)));
            }
        }
        Ok(None)
    }

    /// 全部有效目录项
    pub fn entries(&self) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut slot = 0;
        while let Some((at, entry)) = self.next_entry(slot)? {
            entries.push(entry);
            slot = at + 1;
        }
        Ok(entries)
    }

    /// 放入第一个空闲槽位，没有空闲槽位时追加到目录末尾
    fn insert(&mut self, entry: &DirEntry) -> Result<u32> {
        let mut root = self.root_inode()?;
        let slots = root.size / ENTRY_SIZE;

        for slot in 0..slots {
            if self.entry_at(slot)?.is_free() {
                self.put_entry(&root, slot, entry)?;
                return Ok(slot);
            }
        }

        let block_bytes = self.super_block().block_bytes() as u32;
        if root.blocks * block_bytes < root.size + ENTRY_SIZE {
            let before = root;
            let grown = self.append_block(&mut root);
            // 增长失败时新分配的索引块也要落盘，否则无从回收
            if root != before {
                self.write_inode(ROOT_INODE, &root)?;
            }
            grown?;
        }
        root.size += ENTRY_SIZE;
        self.put_entry(&root, slots, entry)?;
        self.write_inode(ROOT_INODE, &root)?;
        Ok(slots)
    }

    /// 新建一个空文件，返回其 inode 编号
    pub fn create(&mut self, name: &str, kind: EntryKind) -> Result<u32> {
        // 先检查名字，免得分配了 inode 再失败
        DirEntry::new(name, kind, 0)?;
        if self.find(name)?.is_some() {
            return Err(FsError::AlreadyExists(name.to_string()));
        }

        let inode_id = self.alloc_inode()?;
        self.write_inode(inode_id, &DiskInode::new())?;

        let entry = DirEntry::new(name, kind, inode_id)?;
        if let Err(e) = self.insert(&entry) {
            self.write_inode(inode_id, &DiskInode::default())?;
            self.free_inode(inode_id)?;
            return Err(e);
        }

        log::info!("created {name:?} as inode {inode_id}");
        Ok(inode_id)
    }

    /// 移除目录项。inode 的最后一个链接被移除时，释放它的全部块以及 inode 本身。
    pub fn unlink(&mut self, name: &str) -> Result<()> {
        let (slot, entry) = self
            .find(name)?
            .ok_or_else(|| FsError::NotFound(name.to_string()))?;

        let root = self.root_inode()?;
        self.put_entry(&root, slot, &DirEntry::default())?;

        let inode_id = entry.inode();
        let mut inode = self.read_inode(inode_id)?;
        inode.links = inode.links.saturating_sub(1);
        if inode.links > 0 {
            return self.write_inode(inode_id, &inode);
        }

        inode.shrink_to_empty(self)?;
        self.write_inode(inode_id, &DiskInode::default())?;
        self.free_inode(inode_id)?;

        log::info!("removed {name:?}, inode {inode_id} released");
        Ok(())
    }

    /// 硬链接：新的目录项与`target`共用同一个 inode
    pub fn link(&mut self, link: &str, target: &str) -> Result<()> {
        let entry = self
            .lookup(target)?
            .ok_or_else(|| FsError::NotFound(target.to_string()))?;
        if entry.kind() == EntryKind::Directory {
            return Err(FsError::IsADirectory(target.to_string()));
        }
        if self.find(link)?.is_some() {
            return Err(FsError::AlreadyExists(link.to_string()));
        }

        let inode_id = entry.inode();
        self.insert(&DirEntry::new(link, entry.kind(), inode_id)?)?;

        let mut inode = self.read_inode(inode_id)?;
        inode.links += 1;
        self.write_inode(inode_id, &inode)
    }

    /// 软链接：新文件的内容是`target`的名字，目标可以不存在
    pub fn symlink(&mut self, link: &str, target: &str) -> Result<()> {
        if target.is_empty() {
            return Err(FsError::InvalidArgument("empty link target"));
        }

        let inode_id = self.create(link, EntryKind::SymLink)?;
        let mut inode = self.read_inode(inode_id)?;
        self.write_at(inode_id, &mut inode, 0, target.as_bytes())?;
        Ok(())
    }
}
