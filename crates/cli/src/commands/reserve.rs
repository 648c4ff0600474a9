// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::{bail, Context};
use sfs_kernel::{FileId, SlotPolicy, StorageError};
use std::path::Path;

/// Reserves space for a new file and optionally writes its initial contents.
pub fn run(path: &Path, id: &str, size: u32, flags: u32, use_spare: bool, data: Option<&[u8]>) -> anyhow::Result<u32> {
    let mut fs = super::mount(path, None)?;
    let config = *fs.config();

    if size > config.max_file_size {
        bail!("Requested size {} exceeds the maximum file size {}", size, config.max_file_size);
    }
    if data.is_some_and(|data| data.len() > size as usize) {
        bail!("Initial data does not fit the reserved size");
    }
    let file_id = FileId::from_bytes(id.as_bytes()).context("File id must be 1 to 12 bytes and not all zero")?;
    match fs.find_file_slot(&file_id) {
        Ok(slot) => bail!("File {id} already exists in slot {slot}"),
        Err(StorageError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let policy = if use_spare { SlotPolicy::UseSpare } else { SlotPolicy::KeepSpare };
    let (slot, meta, block) = fs.reserve_file(file_id, size, flags, policy).context("Reservation failed")?;
    tracing::info!(id, slot, lblock = meta.lblock, phy = block.phy_id, "file reserved");

    if let Some(data) = data.filter(|data| !data.is_empty()) {
        fs.write_file_data(slot, 0, data).context("Failed to stage file data")?;
        fs.finalize_transaction().context("Failed to commit file data")?;
    }

    println!(
        "Reserved {id} in slot {slot}: logical block {}, offset {}, {} bytes",
        meta.lblock, meta.data_offset, meta.max_size
    );
    Ok(slot)
}
