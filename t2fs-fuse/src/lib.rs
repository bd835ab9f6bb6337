#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use block_dev::{DeviceError, SECTOR_SIZE, Sector, SectorDevice};

/// 以宿主机上的文件作为磁盘镜像
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    sectors: u32,
}

impl BlockFile {
    /// 新建`sectors`个扇区的空白镜像，已有的文件会被截断
    pub fn create(path: impl AsRef<Path>, sectors: u32) -> io::Result<Self> {
        let fd = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        fd.set_len(sectors as u64 * SECTOR_SIZE as u64)?;

        Ok(Self {
            file: Mutex::new(fd),
            sectors,
        })
    }

    /// 打开已有镜像，末尾不足一个扇区的部分被忽略
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let fd = OpenOptions::new().read(true).write(true).open(path)?;
        let sectors = u32::try_from(fd.metadata()?.len() / SECTOR_SIZE as u64)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "image too large"))?;

        Ok(Self {
            file: Mutex::new(fd),
            sectors,
        })
    }

    fn seek_to(&self, file: &mut File, sector: u32) -> Result<(), DeviceError> {
        if sector >= self.sectors {
            return Err(DeviceError::OutOfRange(sector));
        }
        file.seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE as u64))
            .map_err(|_| DeviceError::Io(sector))?;
        Ok(())
    }
}

impl SectorDevice for BlockFile {
    fn read_sector(&self, sector: u32, buf: &mut Sector) -> Result<(), DeviceError> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        self.seek_to(&mut file, sector)?;
        file.read_exact(buf).map_err(|e| {
            log::error!("reading sector {sector}: {e}");
            DeviceError::Io(sector)
        })
    }

    fn write_sector(&self, sector: u32, buf: &Sector) -> Result<(), DeviceError> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        self.seek_to(&mut file, sector)?;
        file.write_all(buf).map_err(|e| {
            log::error!("writing sector {sector}: {e}");
            DeviceError::Io(sector)
        })
    }

    fn sector_count(&self) -> u32 {
        self.sectors
    }
}
