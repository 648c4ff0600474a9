// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod format;
pub mod inspect;
pub mod reserve;
pub mod verify;

use anyhow::Context;
use sfs_image::FlashImage;
use sfs_kernel::FileSystem;
use std::path::Path;

/// Opens an image and mounts the filesystem on it.
pub(crate) fn mount(path: &Path, validate: Option<bool>) -> anyhow::Result<FileSystem<FlashImage>> {
    let image = FlashImage::open(path).with_context(|| format!("Failed to open image {}", path.display()))?;
    let mut config = *image.config();
    if let Some(validate) = validate {
        config.validate_from_flash = validate;
    }

    let mut fs = FileSystem::new(config, image);
    fs.init().context("Failed to mount filesystem")?;
    Ok(fs)
}
