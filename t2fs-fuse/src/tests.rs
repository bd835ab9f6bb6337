use std::path::PathBuf;
use std::sync::Arc;

use block_dev::mbr;
use t2fs::layout::EntryKind;
use t2fs::{SeekPos, T2fs};

use super::*;

/// 每个测试使用自己的镜像文件，结束时删除
struct TempImage(PathBuf);

impl TempImage {
    fn new(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!("t2fs-{}-{name}.img", std::process::id()));
        Self(path)
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

#[test]
fn sectors_round_trip() {
    let image = TempImage::new("sectors");
    let dev = BlockFile::create(&image.0, 16).unwrap();
    assert_eq!(16, dev.sector_count());

    let mut sector = [0; SECTOR_SIZE];
    sector[0] = 0x5A;
    sector[SECTOR_SIZE - 1] = 0xA5;
    dev.write_sector(15, &sector).unwrap();

    let reopened = BlockFile::open(&image.0).unwrap();
    let mut buf = [0; SECTOR_SIZE];
    reopened.read_sector(15, &mut buf).unwrap();
    assert_eq!(sector, buf);
    reopened.read_sector(0, &mut buf).unwrap();
    assert_eq!([0; SECTOR_SIZE], buf);

    assert_eq!(Err(DeviceError::OutOfRange(16)), reopened.read_sector(16, &mut buf));
    assert_eq!(Err(DeviceError::OutOfRange(99)), reopened.write_sector(99, &buf));
}

#[test]
fn file_system_on_image() {
    let image = TempImage::new("fs");
    {
        let dev: Arc<dyn SectorDevice> = Arc::new(BlockFile::create(&image.0, 1025).unwrap());
        mbr::write_table(dev.as_ref(), &mbr::split_evenly(1025, 2)).unwrap();
        T2fs::format(&dev, 1, 2).unwrap();

        let mut fs = T2fs::mount(dev, 1).unwrap();
        let file = fs.create("hello.txt").unwrap();
        fs.write(file, b"hello, t2fs").unwrap();
        fs.umount();
    }

    let dev: Arc<dyn SectorDevice> = Arc::new(BlockFile::open(&image.0).unwrap());
    assert!(T2fs::mount(dev.clone(), 0).is_err());

    let mut fs = T2fs::mount(dev, 1).unwrap();
    let entry = fs.lookup("hello.txt").unwrap().unwrap();
    assert_eq!(EntryKind::Regular, entry.kind());

    let file = fs.open("hello.txt").unwrap();
    fs.seek(file, SeekPos::Start(7)).unwrap();
    let mut buf = [0; 16];
    let n = fs.read(file, &mut buf).unwrap();
    assert_eq!(b"t2fs", &buf[..n]);
}
