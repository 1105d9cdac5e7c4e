//! flatfs - create and inspect FlatFS images
//!
//! Usage:
//!   flatfs format disk.img -s 1M           # Create a 1 MiB image with /dev populated
//!   flatfs ls disk.img /dev
//!   flatfs put disk.img notes.txt /notes.txt
//!   flatfs cat disk.img /notes.txt
//!   flatfs check disk.img

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use flatfs::{BLOCK_SIZE, FileSystem, ImageFile, NodeType, OpenMode};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flatfs")]
#[command(about = "Create and inspect FlatFS disk images")]
struct Args {
    /// Verbose output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new image, overwriting any existing file
    Format {
        image: PathBuf,
        /// Image size (e.g., 512K, 1M)
        #[arg(short, long, default_value = "1M")]
        size: String,
    },
    /// List a directory
    Ls {
        image: PathBuf,
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print a file's content to stdout
    Cat { image: PathBuf, path: String },
    /// Copy a host file (or stdin with `-`) into the image
    Put {
        image: PathBuf,
        source: PathBuf,
        path: String,
        /// Append instead of writing from the start
        #[arg(short, long)]
        append: bool,
    },
    /// Create a directory
    Mkdir { image: PathBuf, path: String },
    /// Create a character device node
    Mknod { image: PathBuf, path: String },
    /// Check the image for structural problems
    Check { image: PathBuf },
    /// Print the whole tree
    Tree { image: PathBuf },
}

fn parse_size(s: &str) -> Option<u64> {
    let s = s.trim().to_uppercase();
    let (num_str, mult) = if s.ends_with('G') || s.ends_with("GB") {
        (s.trim_end_matches("GB").trim_end_matches('G'), 1024 * 1024 * 1024)
    } else if s.ends_with('M') || s.ends_with("MB") {
        (s.trim_end_matches("MB").trim_end_matches('M'), 1024 * 1024)
    } else if s.ends_with('K') || s.ends_with("KB") {
        (s.trim_end_matches("KB").trim_end_matches('K'), 1024)
    } else {
        (s.as_str(), 1)
    };

    num_str.parse::<u64>().ok().and_then(|n| n.checked_mul(mult))
}

fn mount(image: &PathBuf) -> Result<FileSystem<ImageFile>> {
    let device = ImageFile::open(image).with_context(|| format!("opening {}", image.display()))?;
    FileSystem::mount(Arc::new(device)).with_context(|| format!("mounting {}", image.display()))
}

fn main() {
    let args = Args::parse();
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(error) = run(args.command) {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Format { image, size } => {
            let Some(size) = parse_size(&size) else {
                bail!("invalid size: {size}");
            };
            if size % BLOCK_SIZE as u64 != 0 {
                bail!("size must be a multiple of {} KiB", BLOCK_SIZE / 1024);
            }
            let device = ImageFile::create(&image, size)
                .with_context(|| format!("creating {}", image.display()))?;
            let fs = FileSystem::format(Arc::new(device), size)?;
            println!(
                "formatted {}: {} blocks of {} bytes, {} free",
                image.display(),
                fs.superblock().num_blocks(),
                BLOCK_SIZE,
                fs.free_blocks()?
            );
        }
        Command::Ls { image, path } => {
            let fs = mount(&image)?;
            for (block_id, node) in fs.read_dir(&path).with_context(|| format!("listing {path}"))? {
                let kind = if node.is_dir() {
                    'd'
                } else if node.ntype == NodeType::CHAR_DEVICE {
                    'c'
                } else {
                    '-'
                };
                println!("{kind}{} {:>8} @{:<6} {}", node.mode, node.size, block_id, node.name());
            }
        }
        Command::Cat { image, path } => {
            let fs = mount(&image)?;
            let mut file = fs.open(&path, OpenMode::READ).with_context(|| format!("opening {path}"))?;
            let content = fs.read_to_end(&mut file)?;
            io::stdout().write_all(&content)?;
        }
        Command::Put { image, source, path, append } => {
            let mut content = Vec::new();
            if source.as_os_str() == "-" {
                io::stdin().read_to_end(&mut content)?;
            } else {
                content = std::fs::read(&source)
                    .with_context(|| format!("reading {}", source.display()))?;
            }
            let fs = mount(&image)?;
            let mode = if append { OpenMode::APPEND } else { OpenMode::WRITE };
            let mut file = fs.open(&path, mode).with_context(|| format!("opening {path}"))?;
            fs.write(&mut file, &content)?;
            fs.flush()?;
        }
        Command::Mkdir { image, path } => {
            let fs = mount(&image)?;
            fs.create(&path, NodeType::DIRECTORY).with_context(|| format!("creating {path}"))?;
            fs.flush()?;
        }
        Command::Mknod { image, path } => {
            let fs = mount(&image)?;
            fs.create(&path, NodeType::CHAR_DEVICE).with_context(|| format!("creating {path}"))?;
            fs.flush()?;
        }
        Command::Check { image } => {
            let fs = mount(&image)?;
            let report = fs.check()?;
            println!(
                "{} directories, {} files, {} char devices; {} blocks used, {} free",
                report.directories,
                report.files,
                report.char_devices,
                report.used_blocks,
                report.free_blocks
            );
            for problem in &report.problems {
                println!("  {problem}");
            }
            if !report.is_clean() {
                bail!("{} problems found", report.problems.len());
            }
        }
        Command::Tree { image } => {
            let fs = mount(&image)?;
            print!("{}", fs.dump()?);
        }
    }
    Ok(())
}
