// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Legacy format migration.
//!
//! The current header is four bytes longer than the legacy one, so every
//! record moves up by that delta and logical block 0's file data moves with
//! it. The move is one ordinary copy-on-write transaction: if power fails
//! before the commit the legacy block stays active and the migration runs
//! again at the next mount.

use crate::error::{Corruption, Result, StorageError};
use crate::flash::FlashDriver;
use crate::integrity;
use crate::layout;
use crate::mblock::FileSystem;
use crate::types::{BlockMeta, FileMeta, FormatVersion};

const HEADER_DELTA: u32 =
    (FormatVersion::Current.header_size() - FormatVersion::Legacy.header_size()) as u32;

pub(crate) fn migrate_to_current<F: FlashDriver>(fs: &mut FileSystem<F>) -> Result<()> {
    let cfg = fs.config;
    let old_end = layout::metadata_end(&cfg, FormatVersion::Legacy) as u32;
    let new_end = layout::metadata_end(&cfg, FormatVersion::Current) as u32;

    let block0 = fs.load_block_meta(fs.active, FormatVersion::Legacy, 0)?;
    integrity::check_block_meta(&cfg, FormatVersion::Legacy, 0, &block0, fs.active)?;
    if block0.free_size < HEADER_DELTA {
        tracing::warn!(
            free = block0.free_size,
            needed = HEADER_DELTA,
            "logical block 0 has no room to grow the header"
        );
        return Err(StorageError::InsufficientStorage);
    }

    // Validate every record before anything is staged.
    let mut shifted = 0u32;
    for slot in 0..cfg.max_files {
        let file = fs.load_file_meta(fs.active, FormatVersion::Legacy, slot)?;
        integrity::check_file_meta(&cfg, FormatVersion::Legacy, slot, &file)?;
        if !file.is_free() && file.lblock == 0 {
            let end = file.data_offset + file.max_size;
            if end > block0.used_end(cfg.block_size) {
                return Err(StorageError::DataCorrupt(Corruption::FileMeta { slot }));
            }
            shifted += 1;
        }
    }

    fs.begin_txn()?;
    let result = relocate(fs, block0, old_end, new_end);
    fs.abandon_on_err(result)?;

    tracing::info!(
        active = fs.active,
        files_moved = shifted,
        "metadata migrated to the current format"
    );
    Ok(())
}

fn relocate<F: FlashDriver>(
    fs: &mut FileSystem<F>,
    block0: BlockMeta,
    old_end: u32,
    new_end: u32,
) -> Result<()> {
    let cfg = fs.config;
    let used_end = block0.used_end(cfg.block_size);

    fs.block_to_block_copy(fs.scratch, new_end, fs.active, old_end, used_end - old_end)?;
    fs.stage_block_meta(
        0,
        &BlockMeta {
            phy_id: fs.scratch,
            data_start: new_end,
            free_size: block0.free_size - HEADER_DELTA,
        },
    )?;

    for slot in 0..cfg.max_files {
        let file = fs.load_file_meta(fs.active, FormatVersion::Legacy, slot)?;
        if !file.is_free() && file.lblock == 0 {
            fs.stage_file_meta(
                slot,
                &FileMeta {
                    data_offset: file.data_offset + HEADER_DELTA,
                    ..file
                },
            )?;
        }
    }

    fs.commit()
}
