//! 按字节偏移读写 inode 的内容，逐扇区进行

use block_dev::SECTOR_SIZE;

use crate::layout::DiskInode;
use crate::{FsError, Result, Volume};

impl Volume {
    /// 从`offset`处读取到`buf`，不越过文件末尾，返回读取的字节数
    pub fn read_at(&self, inode: &DiskInode, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let mut start = offset as usize;
        let end = (start + buf.len()).min(inode.size as usize);
        if start >= end {
            return Ok(0);
        }

        let block_bytes = self.super_block().block_bytes();
        let mut sector = [0; SECTOR_SIZE];
        // 已读取多少字节
        let mut read_size = 0;
        while start < end {
            let block_id = inode.resolve((start / block_bytes) as u32, self)?;
            let within = start % block_bytes;
            // 当前扇区的末地址(字节)
            let sector_end = (start - within % SECTOR_SIZE + SECTOR_SIZE).min(end);
            let len = sector_end - start;

            self.read_block_sector(block_id, (within / SECTOR_SIZE) as u32, &mut sector)?;
            let at = within % SECTOR_SIZE;
            buf[read_size..read_size + len].copy_from_slice(&sector[at..at + len]);

            read_size += len;
            start = sector_end;
        }

        Ok(read_size)
    }

    /// 将`buf`写入`offset`处，必要时为文件追加数据块。
    ///
    /// 新的数据块与 inode 在写入数据前持久化；只覆盖扇区一部分时先读出原内容。
    /// 写入后文件大小为原大小与写入末尾的较大者。
    pub fn write_at(
        &mut self,
        inode_id: u32,
        inode: &mut DiskInode,
        offset: u32,
        buf: &[u8],
    ) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let end = u32::try_from(buf.len())
            .ok()
            .and_then(|len| offset.checked_add(len))
            .ok_or(FsError::OutOfRange(offset))?;
        self.reserve(inode_id, inode, end)?;

        let block_bytes = self.super_block().block_bytes();
        let mut sector = [0; SECTOR_SIZE];
        let mut start = offset as usize;
        let end = end as usize;
        let mut written = 0;
        while start < end {
            let block_id = inode.resolve((start / block_bytes) as u32, self)?;
            let within = start % block_bytes;
            let sector_end = (start - within % SECTOR_SIZE + SECTOR_SIZE).min(end);
            let len = sector_end - start;
            let nth = (within / SECTOR_SIZE) as u32;

            if len < SECTOR_SIZE {
                self.read_block_sector(block_id, nth, &mut sector)?;
            }
            let at = within % SECTOR_SIZE;
            sector[at..at + len].copy_from_slice(&buf[written..written + len]);
            self.write_block_sector(block_id, nth, &sector)?;

            written += len;
            start = sector_end;
        }

        if end as u32 > inode.size {
            inode.size = end as u32;
            self.write_inode(inode_id, inode)?;
        }

        Ok(written)
    }

    /// 追加数据块，直到文件能容纳`size`个字节
    fn reserve(&mut self, inode_id: u32, inode: &mut DiskInode, size: u32) -> Result<()> {
        let block_bytes = self.super_block().block_bytes() as u64;
        let needed = (size as u64).div_ceil(block_bytes);
        if needed > self.super_block().max_file_blocks() {
            return Err(FsError::OutOfRange(size));
        }

        let before = *inode;
        let mut result = Ok(());
        while (inode.blocks as u64) < needed {
            result = self.append_block(inode);
            if result.is_err() {
                break;
            }
        }

        // 即便中途失败，也要把已经接上的块与索引块记录下来
        if *inode != before {
            self.write_inode(inode_id, inode)?;
        }
        result
    }

    /// 分配一个数据块接在文件末尾，失败时归还这个块
    pub(crate) fn append_block(&mut self, inode: &mut DiskInode) -> Result<()> {
        let block_id = self.alloc_block()?;
        if let Err(e) = inode.grow(block_id, self) {
            self.free_block(block_id)?;
            return Err(e);
        }
        Ok(())
    }
}
