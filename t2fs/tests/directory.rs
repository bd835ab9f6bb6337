mod common;

use common::*;
use t2fs::layout::{BitmapKind, DirEntry, EntryKind, NAME_MAX_LEN};
use t2fs::{FsError, ROOT_INODE};

#[test]
fn create_then_lookup() {
    let (_, mut vol) = formatted(2048, 4);
    assert_eq!(None, vol.lookup("a.txt").unwrap());

    let inode = vol.create("a.txt", EntryKind::Regular).unwrap();
    assert_eq!(1, inode);

    let entry = vol.lookup("a.txt").unwrap().unwrap();
    assert_eq!("a.txt", entry.name());
    assert_eq!(EntryKind::Regular, entry.kind());
    assert_eq!(inode, entry.inode());
    assert_eq!(inode, vol.lookup("a.txt").unwrap().unwrap().inode());

    assert!(matches!(
        vol.create("a.txt", EntryKind::Regular),
        Err(FsError::AlreadyExists(name)) if name == "a.txt"
    ));

    let root = vol.read_inode(ROOT_INODE).unwrap();
    assert_eq!(DirEntry::SIZE as u32, root.size);
    assert_eq!(1, root.blocks);
}

#[test]
fn names_are_checked_before_allocation() {
    let (_, mut vol) = formatted(2048, 4);
    let free = vol.count_free(BitmapKind::Inode).unwrap();

    let longest = "n".repeat(NAME_MAX_LEN);
    assert!(matches!(
        vol.create(&format!("{longest}n"), EntryKind::Regular),
        Err(FsError::NameTooLong(NAME_MAX_LEN))
    ));
    assert!(matches!(
        vol.create("", EntryKind::Regular),
        Err(FsError::InvalidArgument(_))
    ));
    assert_eq!(free, vol.count_free(BitmapKind::Inode).unwrap());

    vol.create(&longest, EntryKind::Regular).unwrap();
    assert!(vol.lookup(&longest).unwrap().is_some());
}

#[test]
fn entries_span_many_blocks() {
    // 每块 256 字节，容纳 4 个目录项
    let (_, mut vol) = formatted(1024, 1);
    let names: Vec<String> = (0..90).map(|i| format!("file-{i:02}")).collect();
    for (i, name) in names.iter().enumerate() {
        assert_eq!(i as u32 + 1, vol.create(name, EntryKind::Regular).unwrap());
    }

    let root = vol.root_inode().unwrap();
    assert_eq!(90 * DirEntry::SIZE as u32, root.size);
    // 23 个数据块，跨过了两个直接索引进入单间接索引
    assert_eq!(23, root.blocks);
    assert_ne!(0, root.single_indirect);

    for (i, name) in names.iter().enumerate() {
        assert_eq!(i as u32 + 1, vol.lookup(name).unwrap().unwrap().inode());
    }
    let listed: Vec<String> = vol
        .entries()
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(names, listed);
}

#[test]
fn unlink_frees_slot_and_inode() {
    let (_, mut vol) = formatted(2048, 4);
    for name in ["a", "b", "c"] {
        vol.create(name, EntryKind::Regular).unwrap();
    }
    let free_blocks = vol.count_free(BitmapKind::Block).unwrap();

    let mut inode = vol.read_inode(2).unwrap();
    vol.write_at(2, &mut inode, 0, &pattern(5000)).unwrap();
    assert!(vol.count_free(BitmapKind::Block).unwrap() < free_blocks);

    vol.unlink("b").unwrap();
    assert_eq!(None, vol.lookup("b").unwrap());
    assert_eq!(free_blocks, vol.count_free(BitmapKind::Block).unwrap());
    assert!(!vol.is_in_use(BitmapKind::Inode, 2).unwrap());

    // 第一个空闲槽位与 inode 都被复用，目录大小不变
    assert_eq!(2, vol.create("d", EntryKind::Regular).unwrap());
    let names: Vec<String> = vol
        .entries()
        .unwrap()
        .iter()
        .map(|e| e.name().to_string())
        .collect();
    assert_eq!(["a", "d", "c"], names.as_slice());
    assert_eq!(3 * DirEntry::SIZE as u32, vol.root_inode().unwrap().size);
    assert_eq!(0, vol.read_inode(2).unwrap().size);

    assert!(matches!(vol.unlink("b"), Err(FsError::NotFound(name)) if name == "b"));
}

#[test]
fn hard_links_share_the_inode() {
    let (_, mut vol) = formatted(2048, 4);
    let ino = vol.create("a", EntryKind::Regular).unwrap();
    let mut inode = vol.read_inode(ino).unwrap();
    vol.write_at(ino, &mut inode, 0, b"shared").unwrap();

    vol.link("b", "a").unwrap();
    assert_eq!(ino, vol.lookup("b").unwrap().unwrap().inode());
    assert_eq!(2, vol.read_inode(ino).unwrap().links);

    vol.unlink("a").unwrap();
    let inode = vol.read_inode(ino).unwrap();
    assert_eq!(1, inode.links);
    let mut buf = [0; 6];
    assert_eq!(6, vol.read_at(&inode, 0, &mut buf).unwrap());
    assert_eq!(b"shared", &buf);

    vol.unlink("b").unwrap();
    assert!(!vol.is_in_use(BitmapKind::Inode, ino).unwrap());

    assert!(matches!(vol.link("c", "a"), Err(FsError::NotFound(_))));
    vol.create("dir", EntryKind::Directory).unwrap();
    assert!(matches!(vol.link("c", "dir"), Err(FsError::IsADirectory(_))));
    vol.create("c", EntryKind::Regular).unwrap();
    assert!(matches!(vol.link("c", "c"), Err(FsError::AlreadyExists(_))));
}

#[test]
fn symlink_stores_target_name() {
    let (_, mut vol) = formatted(2048, 4);
    vol.symlink("link", "nowhere").unwrap();

    let entry = vol.lookup("link").unwrap().unwrap();
    assert_eq!(EntryKind::SymLink, entry.kind());

    let inode = vol.read_inode(entry.inode()).unwrap();
    assert_eq!(7, inode.size);
    let mut buf = vec![0; 16];
    let n = vol.read_at(&inode, 0, &mut buf).unwrap();
    assert_eq!(b"nowhere", &buf[..n]);
}

#[test]
fn failed_directory_growth_keeps_indirect_block() {
    // 每块 4 个目录项，8 个目录项正好填满两个直接块
    let (disk, mut vol) = formatted(1024, 1);
    for i in 0..8 {
        vol.create(&format!("f{i}"), EntryKind::Regular).unwrap();
    }
    let free = vol.count_free(BitmapKind::Block).unwrap();

    // 下一次增长依次分配数据块与单间接索引块
    let next = [vol.alloc_block().unwrap(), vol.alloc_block().unwrap()];
    for block in next {
        vol.free_block(block).unwrap();
    }
    let sector = vol.partition().first_sector + next[1];
    disk.fail_sector_after(sector, 1);
    assert!(matches!(
        vol.create("f8", EntryKind::Regular),
        Err(FsError::DeviceRead { sector: s, .. }) if s == sector
    ));
    disk.heal();

    let root = vol.root_inode().unwrap();
    assert_eq!(2, root.blocks);
    assert_eq!(8 * DirEntry::SIZE as u32, root.size);
    assert_eq!(next[1], root.single_indirect);
    assert_eq!(free - 1, vol.count_free(BitmapKind::Block).unwrap());
    assert!(!vol.is_in_use(BitmapKind::Inode, 9).unwrap());

    // 再次增长时沿用已经落盘的索引块
    assert_eq!(9, vol.create("f8", EntryKind::Regular).unwrap());
    let root = vol.root_inode().unwrap();
    assert_eq!(3, root.blocks);
    assert_eq!(next[1], root.single_indirect);
    assert_eq!(free - 2, vol.count_free(BitmapKind::Block).unwrap());
}
