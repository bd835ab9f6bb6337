mod cli;

use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use block_dev::{SectorDevice, mbr};
use clap::Parser;
use cli::{Cli, Command};
use t2fs::T2fs;
use t2fs::layout::BitmapKind;
use t2fs_fuse::BlockFile;

type Result<T = ()> = std::result::Result<T, Box<dyn Error>>;

fn main() -> Result {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Mkdisk {
            sectors,
            partitions,
        } => mkdisk(&cli.image, sectors, partitions),
        Command::Format { sectors_per_block } => {
            let dev = open(&cli.image)?;
            let sb = T2fs::format(&dev, cli.partition, sectors_per_block)?;
            println!(
                "formatted partition {}: {} blocks of {} bytes",
                cli.partition,
                sb.disk_size,
                sb.block_bytes()
            );
            Ok(())
        }
        command => {
            let mut fs = T2fs::mount(open(&cli.image)?, cli.partition)?;
            run(&mut fs, command)?;
            fs.umount();
            Ok(())
        }
    }
}

fn open(image: &Path) -> Result<Arc<dyn SectorDevice>> {
    Ok(Arc::new(BlockFile::open(image)?))
}

fn mkdisk(image: &Path, sectors: u32, partitions: usize) -> Result {
    let table = mbr::split_evenly(sectors, partitions);
    if table.is_empty() {
        return Err("too few sectors for the requested partitions".into());
    }

    let dev = BlockFile::create(image, sectors)?;
    mbr::write_table(&dev, &table)?;
    for (i, p) in table.iter().enumerate() {
        println!("partition {i}: sectors {}..={}", p.first_sector, p.last_sector);
    }
    Ok(())
}

/// 在已挂载的分区上执行命令
fn run(fs: &mut T2fs, command: Command) -> Result {
    match command {
        Command::Info => {
            let sb = *fs.superblock();
            let vol = fs.volume_mut();
            println!("blocks:           {}", sb.disk_size);
            println!("sectors/block:    {}", sb.block_size);
            println!("block bitmap:     {} blocks", sb.block_bitmap_size);
            println!("inode bitmap:     {} blocks", sb.inode_bitmap_size);
            println!("inode area:       {} blocks", sb.inode_area_size);
            println!("data area start:  {}", sb.data_area_start());
            println!(
                "free data blocks: {}/{}",
                vol.count_free(BitmapKind::Block)?,
                sb.data_blocks()
            );
            println!(
                "free inodes:      {}/{}",
                vol.count_free(BitmapKind::Inode)?,
                sb.inode_slots()
            );
            println!("checksum:         {:#010x}", sb.checksum());
        }
        Command::Ls => {
            fs.opendir();
            while let Some(info) = fs.readdir()? {
                let kind = format!("{:?}", info.kind);
                println!("{kind:<10} {:>10} {}", info.size, info.name);
            }
            fs.closedir()?;
        }
        Command::Put { source, name } => {
            let name = match name {
                Some(name) => name,
                None => source
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or("source has no usable file name")?
                    .to_owned(),
            };
            let data = fs::read(&source)?;

            log::info!("put {source:?} as {name:?}, {} bytes", data.len());
            let file = fs.create(&name)?;
            fs.write(file, &data)?;
            fs.close(file)?;
        }
        Command::Cat { name } => {
            let file = fs.open(&name)?;
            let mut buf = [0; 4096];
            let mut stdout = io::stdout().lock();
            loop {
                let n = fs.read(file, &mut buf)?;
                if n == 0 {
                    break;
                }
                stdout.write_all(&buf[..n])?;
            }
            fs.close(file)?;
        }
        Command::Rm { name } => fs.delete(&name)?,
        Command::Ln {
            target,
            link,
            symbolic: true,
        } => fs.soft_link(&link, &target)?,
        Command::Ln { target, link, .. } => fs.hard_link(&link, &target)?,
        Command::Mkdisk { .. } | Command::Format { .. } => {
            return Err("command does not need a mounted partition".into());
        }
    }
    Ok(())
}
