use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::{DeviceError, SECTOR_SIZE, Sector, SectorDevice};

/// 内存中的扇区设备，可注入故障
#[derive(Debug)]
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    sectors: u32,
    read_only: AtomicBool,
    /// 出错的扇区，以及出错前还能成功访问的次数
    faulty: Mutex<Vec<(u32, u32)>>,
}

impl RamDisk {
    pub fn new(sectors: u32) -> Self {
        Self {
            data: Mutex::new(vec![0; sectors as usize * SECTOR_SIZE]),
            sectors,
            read_only: AtomicBool::new(false),
            faulty: Mutex::new(Vec::new()),
        }
    }

    /// 以现成镜像构造，不足一个扇区的尾部会被丢弃
    pub fn from_image(mut image: Vec<u8>) -> Self {
        let sectors = (image.len() / SECTOR_SIZE) as u32;
        image.truncate(sectors as usize * SECTOR_SIZE);
        Self {
            data: Mutex::new(image),
            sectors,
            read_only: AtomicBool::new(false),
            faulty: Mutex::new(Vec::new()),
        }
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }

    /// 此后对`sector`的读写都会失败
    pub fn fail_sector(&self, sector: u32) {
        self.fail_sector_after(sector, 0);
    }

    /// 对`sector`的前`accesses`次读写仍然成功，之后都会失败
    pub fn fail_sector_after(&self, sector: u32, accesses: u32) {
        self.faulty.lock().push((sector, accesses));
    }

    pub fn heal(&self) {
        self.faulty.lock().clear();
    }

    pub fn image(&self) -> Vec<u8> {
        self.data.lock().clone()
    }

    fn check(&self, sector: u32) -> Result<usize, DeviceError> {
        if sector >= self.sectors {
            return Err(DeviceError::OutOfRange(sector));
        }
        let mut faulty = self.faulty.lock();
        if let Some((_, left)) = faulty.iter_mut().find(|(s, _)| *s == sector) {
            if *left == 0 {
                return Err(DeviceError::Io(sector));
            }
            *left -= 1;
        }
        Ok(sector as usize * SECTOR_SIZE)
    }
}

impl SectorDevice for RamDisk {
    fn read_sector(&self, sector: u32, buf: &mut Sector) -> Result<(), DeviceError> {
        let start = self.check(sector)?;
        buf.copy_from_slice(&self.data.lock()[start..start + SECTOR_SIZE]);
        Ok(())
    }

    fn write_sector(&self, sector: u32, buf: &Sector) -> Result<(), DeviceError> {
        if self.read_only.load(Ordering::Relaxed) {
            return Err(DeviceError::ReadOnly);
        }
        let start = self.check(sector)?;
        self.data.lock()[start..start + SECTOR_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn sector_count(&self) -> u32 {
        self.sectors
    }
}
