use block_dev::mbr::{self, MbrError, Partition};
use block_dev::{RamDisk, SECTOR_SIZE, SectorDevice};

#[test]
fn table_round_trip() {
    let disk = RamDisk::new(4097);
    let parts = mbr::split_evenly(disk.sector_count(), 2);
    assert_eq!(
        parts,
        [Partition::new(1, 2048), Partition::new(2049, 4096)]
    );

    mbr::write_table(&disk, &parts).unwrap();
    assert_eq!(2, mbr::partition_count(&disk).unwrap());
    assert_eq!(parts[0], mbr::read_partition(&disk, 0).unwrap());
    assert_eq!(parts[1], mbr::read_partition(&disk, 1).unwrap());
    assert_eq!(2048, parts[1].sectors());
}

#[test]
fn missing_partition() {
    let disk = RamDisk::new(64);
    mbr::write_table(&disk, &[Partition::new(1, 63)]).unwrap();
    assert_eq!(
        Err(MbrError::NotFound { index: 1, count: 1 }),
        mbr::read_partition(&disk, 1)
    );
}

#[test]
fn overlapping_partitions_are_rejected() {
    let disk = RamDisk::new(64);
    let parts = [Partition::new(1, 40), Partition::new(40, 63)];
    assert_eq!(Err(MbrError::Malformed), mbr::write_table(&disk, &parts));
    assert_eq!(
        Err(MbrError::Malformed),
        mbr::write_table(&disk, &[Partition::new(0, 10)])
    );
}

#[test]
fn unreadable_sector_zero() {
    let disk = RamDisk::new(64);
    disk.fail_sector(0);
    assert!(matches!(
        mbr::read_partition(&disk, 0),
        Err(MbrError::Device(_))
    ));
}

#[test]
fn ram_disk_faults() {
    let disk = RamDisk::new(4);
    let mut buf = [0xA5; SECTOR_SIZE];
    disk.write_sector(3, &buf).unwrap();
    assert!(disk.write_sector(4, &buf).is_err());

    disk.set_read_only(true);
    assert!(disk.write_sector(1, &buf).is_err());
    disk.set_read_only(false);

    buf.fill(0);
    disk.read_sector(3, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0xA5));
}

#[test]
fn delayed_sector_fault() {
    let disk = RamDisk::new(4);
    let buf = [0x5A; SECTOR_SIZE];
    disk.fail_sector_after(2, 2);

    disk.write_sector(2, &buf).unwrap();
    let mut read = [0; SECTOR_SIZE];
    disk.read_sector(2, &mut read).unwrap();
    assert_eq!(buf, read);
    assert!(disk.read_sector(2, &mut read).is_err());
    assert!(disk.write_sector(2, &buf).is_err());
    disk.read_sector(1, &mut read).unwrap();

    disk.heal();
    disk.read_sector(2, &mut read).unwrap();
}
