use core::mem;

use bytemuck::{Pod, Zeroable};

use crate::{FsError, Result};

/// 名字字段的容量，最后一字节留给 \0
const NAME_CAP: usize = 59;
pub const NAME_MAX_LEN: usize = NAME_CAP - 1;

/// 目录项的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EntryKind {
    /// 空闲槽位
    #[default]
    Invalid = 0,
    Regular = 1,
    Directory = 2,
    SymLink = 3,
}

impl From<u8> for EntryKind {
    fn from(raw: u8) -> Self {
        match raw {
            1 => Self::Regular,
            2 => Self::Directory,
            3 => Self::SymLink,
            _ => Self::Invalid,
        }
    }
}

/// 文件系统项的元信息，紧密排列于根目录的数据块中
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct DirEntry {
    name: [u8; NAME_CAP],
    kind: u8,
    inode: u32,
}

impl Default for DirEntry {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl DirEntry {
    /// 元信息大小恒为64字节
    pub const SIZE: usize = mem::size_of::<Self>();

    /// 名字须非空、不含 \0 与 `/`，且不超过 [`NAME_MAX_LEN`] 字节
    pub fn new(name: &str, kind: EntryKind, inode: u32) -> Result<Self> {
        check_name(name)?;

        let mut raw = [0; NAME_CAP];
        raw[..name.len()].copy_from_slice(name.as_bytes());

        Ok(Self {
            name: raw,
            kind: kind as u8,
            inode,
        })
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&c| c == 0).unwrap_or(NAME_CAP);
        // 名字只经由 `new` 写入，必为合法 UTF-8；损坏的记录当作空名
        core::str::from_utf8(&self.name[..len]).unwrap_or_default()
    }

    #[inline]
    pub fn kind(&self) -> EntryKind {
        self.kind.into()
    }

    #[inline]
    pub fn inode(&self) -> u32 {
        self.inode
    }

    #[inline]
    pub fn is_free(&self) -> bool {
        self.kind() == EntryKind::Invalid
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    #[inline]
    pub fn read_from(bytes: &[u8]) -> Self {
        bytemuck::pod_read_unaligned(&bytes[..Self::SIZE])
    }
}

fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.bytes().any(|c| c == 0 || c == b'/') {
        return Err(FsError::InvalidArgument("bad file name"));
    }
    if name.len() > NAME_MAX_LEN {
        return Err(FsError::NameTooLong(NAME_MAX_LEN));
    }
    Ok(())
}
