// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Data block helpers.
//!
//! File contents are rewritten the same way as metadata: into a scratch
//! block, with the untouched bytes of the block copied around the new data.
//! Logical block 0 uses the scratch metadata block. Every other logical
//! block uses the data scratch block, and its old physical block becomes
//! the data scratch block once the transaction commits.

use crate::config::{COPY_BUF_SIZE, METADATA_BLOCK1};
use crate::error::{Corruption, Result, StorageError};
use crate::flash::FlashDriver;
use crate::layout;
use crate::mblock::FileSystem;
use crate::types::{BlockMeta, FileMeta};

impl<F: FlashDriver> FileSystem<F> {
    /// Copies `len` bytes between two different blocks through a bounded
    /// stack buffer. A copy into a scratch block joins the open transaction.
    pub fn block_to_block_copy(
        &mut self,
        dst_block: u32,
        dst_offset: u32,
        src_block: u32,
        src_offset: u32,
        len: u32,
    ) -> Result<()> {
        self.ensure_initialized()?;
        let cfg = self.config;

        let in_block = |offset: u32| offset.checked_add(len).is_some_and(|end| end <= cfg.block_size);
        if dst_block == src_block
            || dst_block >= cfg.num_blocks
            || src_block >= cfg.num_blocks
            || !in_block(dst_offset)
            || !in_block(src_offset)
        {
            return Err(StorageError::InvalidArgument);
        }

        let result = self.copy_range(dst_block, dst_offset as usize, src_block, src_offset as usize, len as usize);
        self.abandon_on_err(result)
    }

    fn copy_range(
        &mut self,
        dst_block: u32,
        dst_offset: usize,
        src_block: u32,
        src_offset: usize,
        len: usize,
    ) -> Result<()> {
        if self.is_scratch(dst_block) {
            self.begin_txn()?;
        }

        let mut buf = [0u8; COPY_BUF_SIZE];
        let mut done = 0;
        while done < len {
            let chunk = (len - done).min(COPY_BUF_SIZE);
            self.flash.read(&self.config, src_block, src_offset + done, &mut buf[..chunk])?;
            self.flash.write(&self.config, dst_block, dst_offset + done, &buf[..chunk])?;
            done += chunk;
        }

        Ok(())
    }

    fn is_scratch(&self, block: u32) -> bool {
        block == self.scratch
            || (layout::has_data_scratch(&self.config) && block == self.header.scratch_dblock)
    }

    /// Block that receives the rewritten contents of `lblock` in the
    /// current transaction.
    pub fn data_scratch_block(&self, lblock: u32) -> Result<u32> {
        self.ensure_initialized()?;
        if lblock >= layout::num_lblocks(&self.config) {
            return Err(StorageError::InvalidArgument);
        }

        if lblock == 0 {
            Ok(self.scratch)
        } else {
            Ok(self.header.scratch_dblock)
        }
    }

    /// Records `phy_id` as the data scratch block of the next generation.
    ///
    /// Called after `lblock` has been rewritten into the data scratch block,
    /// with `phy_id` its previous physical block. A no-op for logical block
    /// 0, whose scratch is always the other metadata block.
    pub fn set_data_scratch(&mut self, phy_id: u32, lblock: u32) -> Result<()> {
        self.ensure_initialized()?;
        if lblock >= layout::num_lblocks(&self.config) {
            return Err(StorageError::InvalidArgument);
        }
        if lblock == 0 {
            return Ok(());
        }
        if phy_id <= METADATA_BLOCK1 || phy_id >= self.config.num_blocks {
            return Err(StorageError::InvalidArgument);
        }
        if self.pending.is_some_and(|p| p.data_scratch_taken) {
            return Err(StorageError::InvalidArgument);
        }

        let result = self.begin_txn();
        self.abandon_on_err(result)?;
        if let Some(pending) = self.pending.as_mut() {
            pending.header.scratch_dblock = phy_id;
            pending.data_scratch_taken = true;
        }
        Ok(())
    }

    /// Physical block currently holding logical block `lblock`.
    pub fn physical_block(&self, lblock: u32) -> Result<u32> {
        self.ensure_initialized()?;
        if lblock >= layout::num_lblocks(&self.config) {
            return Err(StorageError::InvalidArgument);
        }
        if lblock == 0 {
            return Ok(self.active);
        }
        Ok(self.checked_block_meta(lblock)?.phy_id)
    }

    /// Reads committed file data. The range must lie within the file's
    /// current size.
    pub fn read_file_data(&self, meta: &FileMeta, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.ensure_initialized()?;
        if meta.is_free() || meta.lblock >= layout::num_lblocks(&self.config) {
            return Err(StorageError::InvalidArgument);
        }
        let len = u32::try_from(buf.len()).map_err(|_| StorageError::InvalidArgument)?;
        match offset.checked_add(len) {
            Some(end) if end <= meta.cur_size && meta.cur_size <= meta.max_size => {}
            _ => return Err(StorageError::InvalidArgument),
        }
        let start = meta
            .data_offset
            .checked_add(offset)
            .filter(|&start| start.checked_add(len).is_some_and(|end| end <= self.config.block_size))
            .ok_or(StorageError::InvalidArgument)?;

        let phy = self.physical_block(meta.lblock)?;
        self.flash.read(&self.config, phy, start as usize, buf)?;
        Ok(())
    }

    /// Stages a rewrite of `data` at `offset` inside the file in `slot`.
    ///
    /// The owning block is rebuilt in its scratch block and both records are
    /// staged with the file's size extended to cover the write. Nothing is
    /// visible until [`finalize_transaction`](Self::finalize_transaction).
    /// Writes may not leave a gap past the current size.
    pub fn write_file_data(&mut self, slot: u32, offset: u32, data: &[u8]) -> Result<FileMeta> {
        self.ensure_initialized()?;
        if slot >= self.config.max_files || self.file_staged(slot) {
            return Err(StorageError::InvalidArgument);
        }

        let file = self.read_file_meta(slot)?;
        if file.is_free() {
            return Err(StorageError::NotFound);
        }

        let len = u32::try_from(data.len()).map_err(|_| StorageError::InvalidArgument)?;
        let end = offset.checked_add(len).ok_or(StorageError::InvalidArgument)?;
        if offset > file.cur_size || end > file.max_size {
            return Err(StorageError::InvalidArgument);
        }
        if self.block_staged(file.lblock) {
            return Err(StorageError::InvalidArgument);
        }
        if file.lblock != 0 && self.pending.is_some_and(|p| p.data_scratch_taken) {
            return Err(StorageError::InvalidArgument);
        }

        let block = self.checked_block_meta(file.lblock)?;
        let result = self.stage_file_write(slot, file, block, offset, data);
        self.abandon_on_err(result)
    }

    fn stage_file_write(
        &mut self,
        slot: u32,
        file: FileMeta,
        block: BlockMeta,
        offset: u32,
        data: &[u8],
    ) -> Result<FileMeta> {
        let corrupt = || StorageError::DataCorrupt(Corruption::FileMeta { slot });
        self.begin_txn()?;

        let src = if file.lblock == 0 { self.active } else { block.phy_id };
        let dst = self.data_scratch_block(file.lblock)?;
        let used_end = block.used_end(self.config.block_size);

        let write_at = file.data_offset.checked_add(offset).ok_or_else(corrupt)?;
        let write_end = write_at.checked_add(data.len() as u32).ok_or_else(corrupt)?;
        if file.data_offset < block.data_start || write_end > used_end {
            return Err(corrupt());
        }

        self.copy_range(dst, block.data_start as usize, src, block.data_start as usize, (write_at - block.data_start) as usize)?;
        self.flash.write(&self.config, dst, write_at as usize, data)?;
        self.copy_range(dst, write_end as usize, src, write_end as usize, (used_end - write_end) as usize)?;

        if file.lblock != 0 {
            self.set_data_scratch(block.phy_id, file.lblock)?;
        }
        self.stage_block_meta(file.lblock, &BlockMeta { phy_id: dst, ..block })?;

        let updated = FileMeta {
            cur_size: file.cur_size.max(offset + data.len() as u32),
            ..file
        };
        self.stage_file_meta(slot, &updated)?;

        tracing::debug!(slot, lblock = file.lblock, offset, len = data.len(), "file data staged");
        Ok(updated)
    }
}
