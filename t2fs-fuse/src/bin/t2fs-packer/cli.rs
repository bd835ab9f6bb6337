use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Build and inspect T2FS disk images", long_about = None)]
pub struct Cli {
    /// Disk image file
    #[arg(long, short, default_value = "t2fs.img")]
    pub image: PathBuf,

    /// Partition to operate on
    #[arg(long, short, default_value_t = 0)]
    pub partition: usize,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a blank image with a partition table
    Mkdisk {
        /// Image size in sectors, including the partition table sector
        #[arg(long, default_value_t = 2049)]
        sectors: u32,

        /// Number of equally sized partitions
        #[arg(long, default_value_t = 1)]
        partitions: usize,
    },

    /// Format the partition
    Format {
        /// Sectors per block
        #[arg(long, short = 'b', default_value_t = 4)]
        sectors_per_block: u32,
    },

    /// Print the superblock and free space
    Info,

    /// List the root directory
    Ls,

    /// Copy a host file into the partition
    Put {
        /// Host file
        source: PathBuf,

        /// Name in the partition, defaults to the host file name
        name: Option<String>,
    },

    /// Print a file to stdout
    Cat { name: String },

    /// Remove a directory entry
    Rm { name: String },

    /// Create a link named `link` to `target`
    Ln {
        target: String,
        link: String,

        /// Make a symbolic link instead of a hard link
        #[arg(long, short)]
        symbolic: bool,
    },
}
