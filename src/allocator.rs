// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! File and block allocator.
//!
//! Space is handed out first-fit across logical blocks. Files are packed
//! upward from each block's data start and never move once reserved, so a
//! block's free space is always the tail of the block.

use crate::error::{Corruption, Result, StorageError};
use crate::flash::FlashDriver;
use crate::layout;
use crate::mblock::FileSystem;
use crate::types::{BlockMeta, FileId, FileMeta};

/// How the free-slot search treats the first free slot in the file table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlotPolicy {
    /// Hold the first free slot back so an atomic replace always finds one.
    #[default]
    KeepSpare,
    /// Take the first free slot, e.g. for the new half of an atomic replace.
    UseSpare,
}

impl<F: FlashDriver> FileSystem<F> {
    /// Reserves `size` bytes for a new file and commits it.
    ///
    /// Returns the slot, the committed file record and the committed record
    /// of the block the file was placed in. Uniqueness of `id` is left to
    /// the caller.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn reserve_file(
        &mut self,
        id: FileId,
        size: u32,
        flags: u32,
        policy: SlotPolicy,
    ) -> Result<(u32, FileMeta, BlockMeta)> {
        self.ensure_initialized()?;
        if id.is_free() || self.transaction_open() {
            return Err(StorageError::InvalidArgument);
        }
        if self.config.validate_from_flash {
            self.verify_integrity()?;
        }

        let (lblock, mut block) = self.first_fit(size)?;
        let slot = self.free_slot(policy)?;

        // Records are not bounds checked with validation off.
        let data_offset = self
            .config
            .block_size
            .checked_sub(block.free_size)
            .ok_or(StorageError::DataCorrupt(Corruption::BlockMeta { lblock }))?;

        // Block 0 moves with the metadata, so its existing files move too.
        if lblock == 0 {
            self.carry_block0_data(&block)?;
        }

        let file = FileMeta {
            id,
            lblock,
            data_offset,
            cur_size: 0,
            max_size: size,
            flags,
        };
        block.free_size -= size;

        self.update_scratch_block_meta(lblock, &block)?;
        self.update_scratch_file_meta(slot, &file)?;
        self.finalize_transaction()?;

        if lblock == 0 {
            block.phy_id = self.active;
        }
        tracing::debug!(slot, lblock, offset = file.data_offset, "file reserved");
        Ok((slot, file, block))
    }

    /// Slot holding `id`.
    pub fn find_file_slot(&self, id: &FileId) -> Result<u32> {
        self.ensure_initialized()?;
        if id.is_free() {
            return Err(StorageError::InvalidArgument);
        }
        if self.config.validate_from_flash {
            self.verify_integrity()?;
        }

        for slot in 0..self.config.max_files {
            if self.checked_file_meta(slot)?.id == *id {
                return Ok(slot);
            }
        }
        Err(StorageError::NotFound)
    }

    /// First live slot whose flags share a bit with `mask`.
    pub fn find_file_slot_by_flags(&self, mask: u32) -> Result<u32> {
        self.ensure_initialized()?;
        if self.config.validate_from_flash {
            self.verify_integrity()?;
        }

        for slot in 0..self.config.max_files {
            let meta = self.checked_file_meta(slot)?;
            if !meta.is_free() && meta.flags & mask != 0 {
                return Ok(slot);
            }
        }
        Err(StorageError::NotFound)
    }

    fn first_fit(&self, size: u32) -> Result<(u32, BlockMeta)> {
        for lblock in 0..layout::num_lblocks(&self.config) {
            let block = self.checked_block_meta(lblock)?;
            if block.free_size >= size {
                return Ok((lblock, block));
            }
        }

        tracing::warn!(size, "no logical block has room for the reservation");
        Err(StorageError::InsufficientStorage)
    }

    fn free_slot(&self, policy: SlotPolicy) -> Result<u32> {
        let mut skip_spare = policy == SlotPolicy::KeepSpare;

        for slot in 0..self.config.max_files {
            if !self.checked_file_meta(slot)?.is_free() {
                continue;
            }
            if skip_spare {
                skip_spare = false;
                continue;
            }
            return Ok(slot);
        }

        tracing::warn!(?policy, "file table has no free slot");
        Err(StorageError::InsufficientStorage)
    }
}
