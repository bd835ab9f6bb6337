#![allow(dead_code)]

use std::sync::Arc;

use block_dev::RamDisk;
use block_dev::mbr::{self, Partition};
use t2fs::{SectorDevice, T2fs, Volume};

/// 一块只有一个分区的磁盘，分区占据 1 号扇区起的`sectors`个扇区
pub fn blank_disk(sectors: u32) -> Arc<RamDisk> {
    let disk = Arc::new(RamDisk::new(sectors + 1));
    mbr::write_table(&*disk, &[Partition::new(1, sectors)]).unwrap();
    disk
}

pub fn as_dev(disk: &Arc<RamDisk>) -> Arc<dyn SectorDevice> {
    disk.clone()
}

pub fn formatted(sectors: u32, sectors_per_block: u32) -> (Arc<RamDisk>, Volume) {
    let disk = blank_disk(sectors);
    Volume::format(&as_dev(&disk), 0, sectors_per_block).unwrap();
    let vol = Volume::open(as_dev(&disk), 0).unwrap();
    (disk, vol)
}

pub fn mounted(sectors: u32, sectors_per_block: u32) -> (Arc<RamDisk>, T2fs) {
    let disk = blank_disk(sectors);
    T2fs::format(&as_dev(&disk), 0, sectors_per_block).unwrap();
    let fs = T2fs::mount(as_dev(&disk), 0).unwrap();
    (disk, fs)
}

/// 可辨认的字节序列
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}
