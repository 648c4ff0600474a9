// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Block layout calculator.
//!
//! A metadata block holds `[header][block records][file records]`, and
//! logical block 0 keeps its file data in the rest of the same block.
//! With exactly two flash blocks there is no other data block. With more,
//! one block serves as the data scratch block and every remaining block is
//! a dedicated data block.

use core::ops::Range;

use crate::config::{FsConfig, INIT_SCRATCH_DBLOCK};
use crate::types::{BlockMeta, FileMeta, FormatVersion};

/// Whether a separate data scratch block exists.
pub fn has_data_scratch(cfg: &FsConfig) -> bool {
    cfg.num_blocks > 2
}

/// Logical data blocks, including logical block 0 inside the metadata block.
pub fn num_lblocks(cfg: &FsConfig) -> u32 {
    if has_data_scratch(cfg) {
        // Two metadata blocks and one data scratch block are not addressable.
        cfg.num_blocks - 2
    } else {
        1
    }
}

/// Flash blocks that hold nothing but file data.
pub fn num_dedicated_dblocks(cfg: &FsConfig) -> u32 {
    num_lblocks(cfg) - 1
}

/// Data scratch block right after a reset. Unused without a data scratch block.
pub fn initial_scratch_dblock(cfg: &FsConfig) -> u32 {
    if has_data_scratch(cfg) {
        INIT_SCRATCH_DBLOCK
    } else {
        0
    }
}

/// Physical block of a dedicated logical block right after a reset.
pub fn initial_phy_id(lblock: u32) -> u32 {
    lblock + INIT_SCRATCH_DBLOCK
}

pub fn block_meta_offset(cfg: &FsConfig, version: FormatVersion, lblock: u32) -> usize {
    debug_assert!(lblock < num_lblocks(cfg));
    version.header_size() + lblock as usize * BlockMeta::SIZE
}

pub fn file_meta_offset(cfg: &FsConfig, version: FormatVersion, idx: u32) -> usize {
    debug_assert!(idx < cfg.max_files);
    version.header_size()
        + num_lblocks(cfg) as usize * BlockMeta::SIZE
        + idx as usize * FileMeta::SIZE
}

/// First byte after the file table, where logical block 0's data begins.
pub fn metadata_end(cfg: &FsConfig, version: FormatVersion) -> usize {
    version.header_size()
        + num_lblocks(cfg) as usize * BlockMeta::SIZE
        + cfg.max_files as usize * FileMeta::SIZE
}

/// Bytes covered by the metadata checksum.
pub fn records_range(cfg: &FsConfig, version: FormatVersion) -> Range<usize> {
    version.header_size()..metadata_end(cfg, version)
}
