// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Integrity validator.
//!
//! The checksum is a single XOR byte over every block and file record in a
//! metadata block. It is stamped into the header when a scratch block is
//! committed and recomputed whenever a header is trusted.

use crate::config::{FsConfig, COPY_BUF_SIZE, METADATA_BLOCK1};
use crate::error::{Corruption, Result, StorageError};
use crate::flash::FlashDriver;
use crate::layout;
use crate::types::{BlockMeta, FileMeta, FormatVersion, MetaHeader};

pub fn xor_bytes(acc: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(acc, |acc, b| acc ^ b)
}

/// XOR of all metadata records currently stored in `block`.
pub fn metadata_xor<F: FlashDriver + ?Sized>(
    flash: &F,
    cfg: &FsConfig,
    block: u32,
    version: FormatVersion,
) -> Result<u8> {
    let mut buf = [0u8; COPY_BUF_SIZE];
    let range = layout::records_range(cfg, version);
    let mut pos = range.start;
    let mut acc = 0u8;

    while pos < range.end {
        let len = (range.end - pos).min(COPY_BUF_SIZE);
        flash.read(cfg, block, pos, &mut buf[..len])?;
        acc = xor_bytes(acc, &buf[..len]);
        pos += len;
    }

    Ok(acc)
}

/// Structural checks on a header read from a candidate block. The checksum
/// is verified separately because it needs the block contents.
pub fn header_is_sane(cfg: &FsConfig, header: &MetaHeader) -> bool {
    if header.swap_count() == cfg.sentinel() {
        return false;
    }

    if layout::has_data_scratch(cfg) {
        let scratch = header.scratch_dblock();
        if scratch <= METADATA_BLOCK1 || scratch >= cfg.num_blocks {
            return false;
        }
    }

    match header {
        MetaHeader::Legacy(_) => true,
        MetaHeader::Current(h) => {
            h.num_lblocks as u32 == layout::num_lblocks(cfg) && h.max_files as u32 == cfg.max_files
        }
    }
}

/// Bounds checks on a block record read from the active metadata block.
pub fn check_block_meta(
    cfg: &FsConfig,
    version: FormatVersion,
    lblock: u32,
    meta: &BlockMeta,
    active_block: u32,
) -> Result<()> {
    let corrupt = || StorageError::DataCorrupt(Corruption::BlockMeta { lblock });

    let end = meta.data_start.checked_add(meta.free_size).ok_or_else(corrupt)?;
    if end > cfg.block_size {
        return Err(corrupt());
    }

    if lblock == 0 {
        if meta.phy_id != active_block
            || meta.data_start as usize != layout::metadata_end(cfg, version)
        {
            return Err(corrupt());
        }
    } else if meta.phy_id <= METADATA_BLOCK1 || meta.phy_id >= cfg.num_blocks {
        return Err(corrupt());
    }

    Ok(())
}

/// Bounds checks on a file record. Free slots are not checked.
pub fn check_file_meta(
    cfg: &FsConfig,
    version: FormatVersion,
    slot: u32,
    meta: &FileMeta,
) -> Result<()> {
    if meta.is_free() {
        return Ok(());
    }

    let corrupt = || StorageError::DataCorrupt(Corruption::FileMeta { slot });

    if meta.lblock >= layout::num_lblocks(cfg) || meta.cur_size > meta.max_size {
        return Err(corrupt());
    }

    let end = meta.data_offset.checked_add(meta.max_size).ok_or_else(corrupt)?;
    if end > cfg.block_size {
        return Err(corrupt());
    }

    if meta.lblock == 0 && (meta.data_offset as usize) < layout::metadata_end(cfg, version) {
        return Err(corrupt());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileId, Header, LegacyHeader};

    fn cfg() -> FsConfig {
        FsConfig {
            block_size: 512,
            num_blocks: 4,
            max_files: 4,
            max_file_size: 64,
            ..FsConfig::default()
        }
    }

    fn file(lblock: u32, data_offset: u32, cur_size: u32, max_size: u32) -> FileMeta {
        FileMeta {
            id: FileId::from_bytes(b"f").unwrap(),
            lblock,
            data_offset,
            cur_size,
            max_size,
            flags: 0,
        }
    }

    #[test]
    fn test_xor_accumulates() {
        assert_eq!(xor_bytes(0, &[]), 0);
        assert_eq!(xor_bytes(0, &[0x0F, 0xF0]), 0xFF);
        assert_eq!(xor_bytes(0xFF, &[0x0F, 0xF0]), 0x00);
    }

    #[test]
    fn test_file_meta_bounds() {
        let c = cfg();
        let meta_end = layout::metadata_end(&c, FormatVersion::Current) as u32;

        assert!(check_file_meta(&c, FormatVersion::Current, 0, &FileMeta::empty()).is_ok());
        assert!(check_file_meta(&c, FormatVersion::Current, 0, &file(1, 0, 10, 32)).is_ok());
        assert!(check_file_meta(&c, FormatVersion::Current, 0, &file(0, meta_end, 0, 32)).is_ok());

        let bad = [
            file(1, 0, 33, 32),          // cur > max
            file(2, 0, 0, 32),           // lblock out of range
            file(1, 500, 0, 32),         // runs past the block
            file(1, u32::MAX, 0, 32),    // offset overflow
            file(0, meta_end - 1, 0, 8), // overlaps the file table
        ];
        for (i, meta) in bad.iter().enumerate() {
            assert_eq!(
                check_file_meta(&c, FormatVersion::Current, i as u32, meta),
                Err(StorageError::DataCorrupt(Corruption::FileMeta { slot: i as u32 }))
            );
        }
    }

    #[test]
    fn test_block_meta_bounds() {
        let c = cfg();
        let meta_end = layout::metadata_end(&c, FormatVersion::Current) as u32;
        let b0 = BlockMeta { phy_id: 1, data_start: meta_end, free_size: 512 - meta_end };
        assert!(check_block_meta(&c, FormatVersion::Current, 0, &b0, 1).is_ok());
        // Block 0 must live in the active metadata block.
        assert!(check_block_meta(&c, FormatVersion::Current, 0, &b0, 0).is_err());

        let b1 = BlockMeta { phy_id: 3, data_start: 0, free_size: 512 };
        assert!(check_block_meta(&c, FormatVersion::Current, 1, &b1, 1).is_ok());
        let too_free = BlockMeta { free_size: 513, ..b1 };
        assert!(check_block_meta(&c, FormatVersion::Current, 1, &too_free, 1).is_err());
        let meta_phy = BlockMeta { phy_id: 0, ..b1 };
        assert!(check_block_meta(&c, FormatVersion::Current, 1, &meta_phy, 1).is_err());
    }

    #[test]
    fn test_header_sanity() {
        let c = cfg();
        let good = Header { scratch_dblock: 2, swap_count: 3, metadata_xor: 0, num_lblocks: 2, max_files: 4 };
        assert!(header_is_sane(&c, &MetaHeader::Current(good)));

        let unwritten = Header { swap_count: 0xFF, ..good };
        assert!(!header_is_sane(&c, &MetaHeader::Current(unwritten)));

        let other_geometry = Header { max_files: 8, ..good };
        assert!(!header_is_sane(&c, &MetaHeader::Current(other_geometry)));

        let bad_scratch = LegacyHeader { scratch_dblock: 9, swap_count: 1 };
        assert!(!header_is_sane(&c, &MetaHeader::Legacy(bad_scratch)));
    }
}
