// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::Context;
use sfs_image::FlashImage;
use sfs_kernel::{layout, FileSystem, FormatVersion, FsConfig};
use std::path::Path;

/// Creates a blank image and lays down an empty filesystem.
pub fn run(path: &Path, config: FsConfig) -> anyhow::Result<()> {
    let image = FlashImage::create(path, config)
        .with_context(|| format!("Failed to create image {}", path.display()))?;

    let mut fs = FileSystem::new(config, image);
    fs.reset().context("Failed to format filesystem")?;
    tracing::info!(path = %path.display(), "image formatted");

    println!("\nFormatted {}", path.display());
    println!("Blocks:         {} x {} bytes", config.num_blocks, config.block_size);
    println!("Logical blocks: {}", layout::num_lblocks(&config));
    println!("File slots:     {}", config.max_files);
    println!(
        "Block 0 data:   {} bytes free",
        (config.block_size as usize).saturating_sub(layout::metadata_end(&config, FormatVersion::Current))
    );
    println!("Generation:     {:#04x}\n", fs.header().swap_count);
    Ok(())
}
