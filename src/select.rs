// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Metadata block selector.
//!
//! Decides at boot which of the two metadata blocks carries the most
//! recently committed generation.

use crate::config::{FsConfig, METADATA_BLOCK0, METADATA_BLOCK1};
use crate::error::{Result, StorageError};
use crate::flash::FlashDriver;
use crate::integrity;
use crate::types::MetaHeader;

/// Picks the latest of two valid headers from their swap counts.
///
/// `rollover` is the first value the counter takes after wrapping past the
/// sentinel. A block holding it is the latest unless the other block already
/// moved one step further.
pub fn latest_block(swap0: u8, swap1: u8, rollover: u8) -> u32 {
    let after_rollover = rollover.wrapping_add(1);

    if swap1 == rollover && swap0 != after_rollover {
        METADATA_BLOCK1
    } else if swap0 == rollover && swap1 != after_rollover {
        METADATA_BLOCK0
    } else if swap1 > swap0 {
        METADATA_BLOCK1
    } else {
        METADATA_BLOCK0
    }
}

/// Reads and validates the header of one candidate block.
///
/// Returns `Ok(None)` for a block that is erased, torn, from another
/// geometry or fails its checksum. Flash errors are propagated.
pub fn read_candidate<F: FlashDriver + ?Sized>(
    flash: &F,
    cfg: &FsConfig,
    block: u32,
) -> Result<Option<MetaHeader>> {
    let mut buf = [0u8; MetaHeader::MAX_SIZE];
    flash.read(cfg, block, 0, &mut buf)?;

    let header = match MetaHeader::decode(&buf) {
        Some(h) => h,
        None => {
            tracing::debug!(block, tag = buf[5], "metadata block has no recognised header");
            return Ok(None);
        }
    };

    if !integrity::header_is_sane(cfg, &header) {
        tracing::debug!(block, ?header, "metadata block header rejected");
        return Ok(None);
    }

    if let MetaHeader::Current(h) = &header {
        let found = integrity::metadata_xor(flash, cfg, block, header.version())?;
        if found != h.metadata_xor {
            tracing::warn!(
                block,
                expected = h.metadata_xor,
                found,
                "metadata block checksum mismatch"
            );
            return Ok(None);
        }
    }

    Ok(Some(header))
}

/// Returns the active block and its header.
pub fn select_active<F: FlashDriver + ?Sized>(flash: &F, cfg: &FsConfig) -> Result<(u32, MetaHeader)> {
    let h0 = read_candidate(flash, cfg, METADATA_BLOCK0)?;
    let h1 = read_candidate(flash, cfg, METADATA_BLOCK1)?;

    let selected = match (h0, h1) {
        (Some(h0), Some(h1)) => {
            match latest_block(h0.swap_count(), h1.swap_count(), cfg.rollover()) {
                METADATA_BLOCK0 => (METADATA_BLOCK0, h0),
                _ => (METADATA_BLOCK1, h1),
            }
        }
        (Some(h0), None) => (METADATA_BLOCK0, h0),
        (None, Some(h1)) => (METADATA_BLOCK1, h1),
        (None, None) => {
            tracing::error!("no valid metadata block found");
            return Err(StorageError::GenericError);
        }
    };

    tracing::debug!(
        active = selected.0,
        swap_count = selected.1.swap_count(),
        version = ?selected.1.version(),
        "selected metadata block"
    );
    Ok(selected)
}
