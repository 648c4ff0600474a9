// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use sfs_cli::commands::{format, inspect, reserve, verify};
use sfs_cli::telemetry;
use sfs_kernel::FsConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sfs")]
#[command(about = "Flash image tool for the sfs metadata-block store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new image and lay down an empty filesystem
    Format {
        image: PathBuf,

        #[arg(long, default_value_t = 4096)]
        block_size: u32,

        #[arg(long, default_value_t = 4)]
        blocks: u32,

        #[arg(long, default_value_t = 16)]
        max_files: u32,

        #[arg(long, default_value_t = 1024)]
        max_file_size: u32,

        /// Simulate flash that erases to 0x00 instead of 0xFF
        #[arg(long)]
        erase_zero: bool,

        /// Skip re-validating metadata from flash on every read
        #[arg(long)]
        no_validate: bool,
    },
    /// Show the active metadata block without modifying the image
    Inspect {
        image: PathBuf,

        /// Emit a JSON report instead of tables
        #[arg(long)]
        json: bool,
    },
    /// Reserve space for a new file
    Reserve {
        image: PathBuf,

        /// File id, up to 12 bytes
        id: String,

        #[arg(long, short)]
        size: u32,

        #[arg(long, default_value_t = 0)]
        flags: u32,

        /// Allow the last free file slot to be used
        #[arg(long)]
        use_spare: bool,

        /// Initial file contents
        #[arg(long)]
        data: Option<String>,
    },
    /// Check headers, checksum and every record of an image
    Verify {
        image: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    telemetry::init_telemetry();
    let cli = Cli::parse();

    match cli.command {
        Commands::Format {
            image,
            block_size,
            blocks,
            max_files,
            max_file_size,
            erase_zero,
            no_validate,
        } => {
            let config = FsConfig {
                block_size,
                num_blocks: blocks,
                max_files,
                max_file_size,
                erase_value: if erase_zero { 0x00 } else { 0xFF },
                validate_from_flash: !no_validate,
            };
            format::run(&image, config)
        }
        Commands::Inspect { image, json } => inspect::run(&image, json),
        Commands::Reserve {
            image,
            id,
            size,
            flags,
            use_spare,
            data,
        } => reserve::run(&image, &id, size, flags, use_spare, data.as_deref().map(str::as_bytes)).map(|_| ()),
        Commands::Verify { image } => verify::run(&image).map(|_| ()),
    }
}
