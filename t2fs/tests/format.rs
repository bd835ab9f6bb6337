mod common;

use block_dev::{DeviceError, SECTOR_SIZE, SectorDevice};
use common::*;
use proptest::prelude::*;
use t2fs::layout::{EntryKind, SuperBlock};
use t2fs::{FsError, T2fs, Volume};

#[test]
fn scenario_2048_sectors() {
    let disk = blank_disk(2048);
    let sb = T2fs::format(&as_dev(&disk), 0, 4).unwrap();

    assert_eq!(512, sb.disk_size);
    assert_eq!(4, sb.block_size);
    assert_eq!(1, sb.block_bitmap_size);
    assert_eq!(52, sb.inode_area_size);
    assert_eq!(1, sb.inode_bitmap_size);
    assert_eq!(55, sb.data_area_start());
    assert_eq!(457, sb.data_blocks());
    assert_eq!(1664, sb.inode_slots());
    assert_eq!(256, sb.indirect_entries());

    let mut fs = T2fs::mount(as_dev(&disk), 0).unwrap();
    assert_eq!(&sb, fs.superblock());

    let handle = fs.create("x").unwrap();
    fs.close(handle).unwrap();

    let entry = fs.lookup("x").unwrap().unwrap();
    assert_eq!(EntryKind::Regular, entry.kind());
    assert_eq!(1, entry.inode());
}

#[test]
fn superblock_lands_on_first_partition_sector() {
    let disk = blank_disk(2048);
    let sb = Volume::format(&as_dev(&disk), 0, 4).unwrap();

    let mut sector = [0; SECTOR_SIZE];
    disk.read_sector(1, &mut sector).unwrap();
    assert_eq!(b"T2FS", &sector[..4]);
    assert_eq!(sb, SuperBlock::read_from(&sector));
    assert!(sb.verify());
    assert!(sector[SuperBlock::SIZE..].iter().all(|&b| b == 0));
}

#[test]
fn format_zero_fills_the_partition() {
    let disk = blank_disk(256);
    for sid in 1..=256 {
        disk.write_sector(sid, &[0xA5; SECTOR_SIZE]).unwrap();
    }

    let vol = {
        Volume::format(&as_dev(&disk), 0, 2).unwrap();
        Volume::open(as_dev(&disk), 0).unwrap()
    };

    let root = vol.root_inode().unwrap();
    assert_eq!(0, root.size);
    assert_eq!(0, root.blocks);
    assert_eq!(1, root.links);

    // 128 个块：超级块、块位图、inode 位图各占一块，之后是 inode 区域
    let inode_bitmap = 1 + 2 * 2;
    let inode_area = 1 + 3 * 2;

    let mut sector = [0; SECTOR_SIZE];
    disk.read_sector(inode_bitmap, &mut sector).unwrap();
    assert_eq!(0b1, sector[0]);
    assert!(sector[1..].iter().all(|&b| b == 0));

    disk.read_sector(inode_area, &mut sector).unwrap();
    assert_eq!(&1u32.to_le_bytes(), &sector[24..28]);

    for sid in (2..=256).filter(|&sid| sid != inode_bitmap && sid != inode_area) {
        disk.read_sector(sid, &mut sector).unwrap();
        assert!(sector.iter().all(|&b| b == 0), "sector {sid}");
    }
}

#[test]
fn rejects_bad_arguments() {
    let disk = blank_disk(2048);
    assert!(matches!(
        T2fs::format(&as_dev(&disk), 0, 0),
        Err(FsError::InvalidArgument(_))
    ));
    assert!(matches!(
        T2fs::format(&as_dev(&disk), 1, 4),
        Err(FsError::PartitionNotFound(1))
    ));

    let tiny = blank_disk(4);
    assert!(matches!(
        T2fs::format(&as_dev(&tiny), 0, 1),
        Err(FsError::TooFewBlocks {
            blocks: 4,
            required: 5
        })
    ));
}

#[test]
fn device_faults_are_reported() {
    let disk = blank_disk(2048);
    disk.fail_sector(0);
    assert!(matches!(
        T2fs::format(&as_dev(&disk), 0, 4),
        Err(FsError::DeviceRead {
            sector: 0,
            source: DeviceError::Io(0)
        })
    ));

    disk.heal();
    disk.set_read_only(true);
    assert!(matches!(
        T2fs::format(&as_dev(&disk), 0, 4),
        Err(FsError::DeviceWrite {
            sector: 1,
            source: DeviceError::ReadOnly
        })
    ));
}

#[test]
fn mount_rejects_unformatted_partition() {
    let disk = blank_disk(2048);
    assert!(matches!(
        T2fs::mount(as_dev(&disk), 0),
        Err(FsError::ChecksumMismatch)
    ));
    assert!(matches!(
        T2fs::mount(as_dev(&disk), 3),
        Err(FsError::PartitionNotFound(3))
    ));
}

#[test]
fn mount_rejects_foreign_superblock() {
    let disk = blank_disk(2048);
    T2fs::format(&as_dev(&disk), 0, 4).unwrap();

    // 校验和正确但描述的分区比实际更大
    let mut sb = SuperBlock::plan(4096, 4).unwrap();
    let mut sector = [0; SECTOR_SIZE];
    sb.write_to(&mut sector);
    disk.write_sector(1, &sector).unwrap();
    assert!(matches!(
        T2fs::mount(as_dev(&disk), 0),
        Err(FsError::UnknownFormat)
    ));

    sb = SuperBlock::plan(2048, 4).unwrap();
    sb.write_to(&mut sector);
    disk.write_sector(1, &sector).unwrap();
    assert!(T2fs::mount(as_dev(&disk), 0).is_ok());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sizing_is_deterministic(sectors in 64u32..3000, spb in 1u32..=8) {
        let Ok(planned) = SuperBlock::plan(sectors, spb) else {
            return Ok(());
        };

        for _ in 0..2 {
            let disk = blank_disk(sectors);
            let written = T2fs::format(&as_dev(&disk), 0, spb).unwrap();
            let vol = Volume::open(as_dev(&disk), 0).unwrap();

            prop_assert_eq!(planned, written);
            prop_assert_eq!(&planned, vol.super_block());
        }
    }

    #[test]
    fn any_bit_flip_is_detected(spb in 1u32..=4, bit in 0usize..SuperBlock::SIZE * 8) {
        let disk = blank_disk(512);
        T2fs::format(&as_dev(&disk), 0, spb).unwrap();

        let mut sector = [0; SECTOR_SIZE];
        disk.read_sector(1, &mut sector).unwrap();
        sector[bit / 8] ^= 1 << (bit % 8);
        disk.write_sector(1, &sector).unwrap();

        prop_assert!(!SuperBlock::read_from(&sector).verify());
        prop_assert!(matches!(
            T2fs::mount(as_dev(&disk), 0),
            Err(FsError::ChecksumMismatch)
        ));
    }
}
