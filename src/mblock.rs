// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Copy-on-write transaction engine.
//!
//! A transaction opens with the first record staged into the scratch
//! metadata block. `finalize_transaction` copies every record that was not
//! staged forward from the active block, stamps a header with the next swap
//! count and the records' checksum, and flushes it. That header write is the
//! only commit point: until it lands the active block is untouched, and once
//! it lands the selector prefers the scratch block at the next boot.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::{FsConfig, METADATA_BLOCK0, METADATA_BLOCK1};
use crate::error::{Corruption, Result, StorageError};
use crate::flash::FlashDriver;
use crate::integrity;
use crate::layout;
use crate::migrate;
use crate::select;
use crate::types::{BlockMeta, FileMeta, FormatVersion, Header, MetaHeader};

/// State of the transaction being assembled in the scratch blocks.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Pending {
    /// Header that will be stamped at commit. Only `scratch_dblock` is
    /// edited while staging; the counter and checksum are filled in last.
    pub header: Header,
    /// A dedicated data block was rewritten into the data scratch block.
    pub data_scratch_taken: bool,
}

/// One storage instance: configuration, flash driver and the metadata
/// block bookkeeping.
pub struct FileSystem<F: FlashDriver> {
    pub(crate) config: FsConfig,
    pub(crate) flash: F,
    pub(crate) active: u32,
    pub(crate) scratch: u32,
    /// Format of the active block. Only legacy until migration commits.
    pub(crate) version: FormatVersion,
    /// In-memory copy of the committed header.
    pub(crate) header: Header,
    pub(crate) pending: Option<Pending>,
    pub(crate) staged_files: Vec<bool>,
    pub(crate) staged_blocks: Vec<bool>,
    /// Scratch blocks may hold bytes written since their last erase.
    pub(crate) scratch_dirty: bool,
    pub(crate) initialized: bool,
    flash_ready: bool,
}

impl<F: FlashDriver> FileSystem<F> {
    /// Binds a configuration to a driver. No flash is touched until
    /// [`init`](Self::init) or [`reset`](Self::reset).
    pub fn new(config: FsConfig, flash: F) -> Self {
        Self {
            config,
            flash,
            active: METADATA_BLOCK0,
            scratch: METADATA_BLOCK1,
            version: FormatVersion::Current,
            header: Header::default(),
            pending: None,
            staged_files: Vec::new(),
            staged_blocks: Vec::new(),
            scratch_dirty: false,
            initialized: false,
            flash_ready: false,
        }
    }

    /// Mounts the filesystem.
    ///
    /// Selects the latest valid metadata block, erases both scratch blocks
    /// to finish any interrupted transaction, and migrates a legacy block to
    /// the current format. Fails with [`StorageError::GenericError`] when
    /// neither metadata block is valid; [`reset`](Self::reset) is then the
    /// only way forward.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn init(&mut self) -> Result<()> {
        self.prepare()?;
        self.initialized = false;
        self.pending = None;

        let (active, on_flash) = select::select_active(&self.flash, &self.config)?;
        self.active = active;
        self.scratch = Self::other_block(active);
        self.version = on_flash.version();
        self.header = match on_flash {
            MetaHeader::Current(h) => h,
            MetaHeader::Legacy(h) => Header {
                scratch_dblock: h.scratch_dblock,
                swap_count: h.swap_count,
                metadata_xor: 0,
                num_lblocks: layout::num_lblocks(&self.config) as u16,
                max_files: self.config.max_files as u16,
            },
        };
        self.initialized = true;

        if let Err(err) = self.erase_scratch_blocks() {
            self.initialized = false;
            return Err(err);
        }

        if self.version == FormatVersion::Legacy {
            let result = migrate::migrate_to_current(self);
            if result.is_err() {
                self.pending = None;
                self.initialized = false;
            }
            result?;
        }

        tracing::info!(
            active = self.active,
            swap_count = self.header.swap_count,
            "filesystem mounted"
        );
        Ok(())
    }

    /// Erases every block and commits empty tables into metadata block 0.
    ///
    /// Afterwards block 0 is active carrying the first generation after
    /// the sentinel and block 1 is the erased scratch block.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn reset(&mut self) -> Result<()> {
        self.prepare()?;
        let cfg = self.config;

        // The newest generation must be the last metadata block erased, so
        // an interrupted reset never falls back to an older one.
        let newest = self.newest_block()?;
        self.initialized = false;
        self.flash.erase(&cfg, Self::other_block(newest))?;
        self.flash.erase(&cfg, newest)?;
        for block in (METADATA_BLOCK1 + 1)..cfg.num_blocks {
            self.flash.erase(&cfg, block)?;
        }

        // Commit lands in block 0 and moves the counter off the sentinel.
        self.active = METADATA_BLOCK1;
        self.scratch = METADATA_BLOCK0;
        self.version = FormatVersion::Current;
        self.header = Header {
            scratch_dblock: layout::initial_scratch_dblock(&cfg),
            swap_count: cfg.sentinel(),
            metadata_xor: 0,
            num_lblocks: layout::num_lblocks(&cfg) as u16,
            max_files: cfg.max_files as u16,
        };
        self.pending = None;
        self.scratch_dirty = false;
        self.initialized = true;

        let result = self.format_tables();
        if result.is_err() {
            self.pending = None;
            self.initialized = false;
        }
        result?;

        tracing::info!(active = self.active, "filesystem reset");
        Ok(())
    }

    /// Metadata block holding the newest generation, if any block is valid.
    fn newest_block(&self) -> Result<u32> {
        if self.initialized {
            return Ok(self.active);
        }
        match select::select_active(&self.flash, &self.config) {
            Ok((block, _)) => Ok(block),
            Err(StorageError::GenericError) => Ok(METADATA_BLOCK0),
            Err(err) => Err(err),
        }
    }

    fn format_tables(&mut self) -> Result<()> {
        let cfg = self.config;
        let meta_end = layout::metadata_end(&cfg, FormatVersion::Current) as u32;

        self.stage_block_meta(
            0,
            &BlockMeta {
                phy_id: self.scratch,
                data_start: meta_end,
                free_size: cfg.block_size - meta_end,
            },
        )?;
        for lblock in 1..layout::num_lblocks(&cfg) {
            self.stage_block_meta(
                lblock,
                &BlockMeta {
                    phy_id: layout::initial_phy_id(lblock),
                    data_start: 0,
                    free_size: cfg.block_size,
                },
            )?;
        }
        for slot in 0..cfg.max_files {
            self.stage_file_meta(slot, &FileMeta::empty())?;
        }

        self.commit()
    }

    /// Erases the scratch metadata block, then the data scratch block.
    ///
    /// Safe to repeat. Discards any transaction being assembled.
    pub fn erase_scratch_blocks(&mut self) -> Result<()> {
        if !self.flash_ready {
            return Err(StorageError::GenericError);
        }
        self.pending = None;

        self.flash.erase(&self.config, self.scratch)?;
        if layout::has_data_scratch(&self.config) {
            self.flash.erase(&self.config, self.header.scratch_dblock)?;
        }
        self.scratch_dirty = false;

        tracing::debug!(
            scratch = self.scratch,
            data_scratch = self.header.scratch_dblock,
            "scratch blocks erased"
        );
        Ok(())
    }

    /// Stages a file record into the scratch metadata block.
    ///
    /// Each record can be staged once per transaction.
    pub fn update_scratch_file_meta(&mut self, slot: u32, meta: &FileMeta) -> Result<()> {
        self.ensure_initialized()?;
        if slot >= self.config.max_files || self.file_staged(slot) {
            return Err(StorageError::InvalidArgument);
        }
        integrity::check_file_meta(&self.config, FormatVersion::Current, slot, meta)
            .map_err(|_| StorageError::InvalidArgument)?;

        let result = self.stage_file_meta(slot, meta);
        self.abandon_on_err(result)
    }

    /// Stages a block record into the scratch metadata block.
    ///
    /// The physical location of logical block 0 is always rewritten to the
    /// scratch metadata block, which becomes active at commit.
    pub fn update_scratch_block_meta(&mut self, lblock: u32, meta: &BlockMeta) -> Result<()> {
        self.ensure_initialized()?;
        if lblock >= layout::num_lblocks(&self.config) || self.block_staged(lblock) {
            return Err(StorageError::InvalidArgument);
        }

        let mut meta = *meta;
        if lblock == 0 {
            meta.phy_id = self.scratch;
        }
        integrity::check_block_meta(&self.config, FormatVersion::Current, lblock, &meta, self.scratch)
            .map_err(|_| StorageError::InvalidArgument)?;

        let result = self.stage_block_meta(lblock, &meta);
        self.abandon_on_err(result)
    }

    /// Commits the staged records as the next metadata generation.
    ///
    /// Without any staged record this rewrites the current tables under a
    /// new generation.
    pub fn finalize_transaction(&mut self) -> Result<()> {
        self.ensure_initialized()?;
        let result = self.commit();
        self.abandon_on_err(result)
    }

    pub(crate) fn commit(&mut self) -> Result<()> {
        self.begin_txn()?;
        let cfg = self.config;

        if !self.staged_blocks[0] {
            self.carry_block0()?;
        }
        self.copy_forward_block_meta()?;
        self.copy_forward_file_meta()?;

        let mut pending = self.pending.ok_or(StorageError::GenericError)?;
        let mut next = self.header.swap_count.wrapping_add(1);
        if next == cfg.sentinel() {
            next = next.wrapping_add(1);
        }
        pending.header.swap_count = next;
        pending.header.num_lblocks = layout::num_lblocks(&cfg) as u16;
        pending.header.max_files = cfg.max_files as u16;
        pending.header.metadata_xor =
            integrity::metadata_xor(&self.flash, &cfg, self.scratch, FormatVersion::Current)?;

        if pending.data_scratch_taken {
            self.flash.flush(&cfg, self.header.scratch_dblock)?;
        }

        self.flash.write(&cfg, self.scratch, 0, &pending.header.to_bytes())?;
        self.flash.flush(&cfg, self.scratch)?;

        core::mem::swap(&mut self.active, &mut self.scratch);
        self.header = pending.header;
        self.version = FormatVersion::Current;
        self.pending = None;

        tracing::debug!(
            active = self.active,
            swap_count = next,
            xor = pending.header.metadata_xor,
            "metadata generation committed"
        );

        self.erase_scratch_blocks()
    }

    /// Moves logical block 0's data area into the scratch block and stages
    /// its record there.
    fn carry_block0(&mut self) -> Result<()> {
        let cfg = self.config;
        if self.version != FormatVersion::Current {
            return Err(StorageError::GenericError);
        }

        let block0 = self.load_block_meta(self.active, self.version, 0)?;
        integrity::check_block_meta(&cfg, self.version, 0, &block0, self.active)?;

        self.carry_block0_data(&block0)?;
        self.stage_block_meta(0, &BlockMeta { phy_id: self.scratch, ..block0 })
    }

    /// Copies the packed file data of logical block 0 into the scratch
    /// metadata block at the same offsets.
    pub(crate) fn carry_block0_data(&mut self, block0: &BlockMeta) -> Result<()> {
        let used_end = block0.used_end(self.config.block_size);
        self.block_to_block_copy(
            self.scratch,
            block0.data_start,
            self.active,
            block0.data_start,
            used_end.saturating_sub(block0.data_start),
        )
    }

    fn copy_forward_block_meta(&mut self) -> Result<()> {
        let count = layout::num_lblocks(&self.config);
        let mut lblock = 0;

        while lblock < count {
            if self.staged_blocks[lblock as usize] {
                lblock += 1;
                continue;
            }
            let start = lblock;
            while lblock < count && !self.staged_blocks[lblock as usize] {
                lblock += 1;
            }

            let src = layout::block_meta_offset(&self.config, self.version, start) as u32;
            let dst = layout::block_meta_offset(&self.config, FormatVersion::Current, start) as u32;
            let len = (lblock - start) * BlockMeta::SIZE as u32;
            self.block_to_block_copy(self.scratch, dst, self.active, src, len)?;
        }

        Ok(())
    }

    fn copy_forward_file_meta(&mut self) -> Result<()> {
        let count = self.config.max_files;
        let mut slot = 0;

        while slot < count {
            if self.staged_files[slot as usize] {
                slot += 1;
                continue;
            }
            let start = slot;
            while slot < count && !self.staged_files[slot as usize] {
                slot += 1;
            }

            let src = layout::file_meta_offset(&self.config, self.version, start) as u32;
            let dst = layout::file_meta_offset(&self.config, FormatVersion::Current, start) as u32;
            let len = (slot - start) * FileMeta::SIZE as u32;
            self.block_to_block_copy(self.scratch, dst, self.active, src, len)?;
        }

        Ok(())
    }

    /// Reads a committed file record.
    pub fn read_file_meta(&self, slot: u32) -> Result<FileMeta> {
        self.ensure_initialized()?;
        if slot >= self.config.max_files {
            return Err(StorageError::InvalidArgument);
        }
        if self.config.validate_from_flash {
            self.verify_integrity()?;
        }
        self.checked_file_meta(slot)
    }

    /// Reads a committed block record.
    pub fn read_block_meta(&self, lblock: u32) -> Result<BlockMeta> {
        self.ensure_initialized()?;
        if lblock >= layout::num_lblocks(&self.config) {
            return Err(StorageError::InvalidArgument);
        }
        if self.config.validate_from_flash {
            self.verify_integrity()?;
        }
        self.checked_block_meta(lblock)
    }

    /// Re-reads the active header and recomputes the record checksum.
    pub fn verify_integrity(&self) -> Result<()> {
        self.ensure_initialized()?;

        let mut buf = [0u8; MetaHeader::MAX_SIZE];
        self.flash.read(&self.config, self.active, 0, &mut buf)?;

        let matches = match (MetaHeader::decode(&buf), self.version) {
            (Some(MetaHeader::Current(h)), FormatVersion::Current) => h == self.header,
            (Some(MetaHeader::Legacy(h)), FormatVersion::Legacy) => {
                h.scratch_dblock == self.header.scratch_dblock && h.swap_count == self.header.swap_count
            }
            _ => false,
        };
        if !matches {
            tracing::warn!(block = self.active, "active header changed on flash");
            return Err(StorageError::DataCorrupt(Corruption::HeaderMismatch));
        }

        if self.version == FormatVersion::Current {
            let found = integrity::metadata_xor(&self.flash, &self.config, self.active, self.version)?;
            if found != self.header.metadata_xor {
                tracing::warn!(
                    block = self.active,
                    expected = self.header.metadata_xor,
                    found,
                    "active metadata checksum mismatch"
                );
                return Err(StorageError::DataCorrupt(Corruption::Checksum {
                    expected: self.header.metadata_xor,
                    found,
                }));
            }
        }

        Ok(())
    }

    /// Committed file record, bounds checked when validation is on.
    pub(crate) fn checked_file_meta(&self, slot: u32) -> Result<FileMeta> {
        let meta = self.load_file_meta(self.active, self.version, slot)?;
        if self.config.validate_from_flash {
            integrity::check_file_meta(&self.config, self.version, slot, &meta)?;
        }
        Ok(meta)
    }

    /// Committed block record, bounds checked when validation is on.
    pub(crate) fn checked_block_meta(&self, lblock: u32) -> Result<BlockMeta> {
        let meta = self.load_block_meta(self.active, self.version, lblock)?;
        if self.config.validate_from_flash {
            integrity::check_block_meta(&self.config, self.version, lblock, &meta, self.active)?;
        }
        Ok(meta)
    }

    pub(crate) fn load_file_meta(&self, block: u32, version: FormatVersion, slot: u32) -> Result<FileMeta> {
        let mut buf = [0u8; FileMeta::SIZE];
        let offset = layout::file_meta_offset(&self.config, version, slot);
        self.flash.read(&self.config, block, offset, &mut buf)?;
        Ok(FileMeta::from_bytes(&buf))
    }

    pub(crate) fn load_block_meta(&self, block: u32, version: FormatVersion, lblock: u32) -> Result<BlockMeta> {
        let mut buf = [0u8; BlockMeta::SIZE];
        let offset = layout::block_meta_offset(&self.config, version, lblock);
        self.flash.read(&self.config, block, offset, &mut buf)?;
        Ok(BlockMeta::from_bytes(&buf))
    }

    pub(crate) fn stage_file_meta(&mut self, slot: u32, meta: &FileMeta) -> Result<()> {
        self.begin_txn()?;
        let offset = layout::file_meta_offset(&self.config, FormatVersion::Current, slot);
        self.flash.write(&self.config, self.scratch, offset, &meta.to_bytes())?;
        self.staged_files[slot as usize] = true;
        Ok(())
    }

    pub(crate) fn stage_block_meta(&mut self, lblock: u32, meta: &BlockMeta) -> Result<()> {
        self.begin_txn()?;
        let offset = layout::block_meta_offset(&self.config, FormatVersion::Current, lblock);
        self.flash.write(&self.config, self.scratch, offset, &meta.to_bytes())?;
        self.staged_blocks[lblock as usize] = true;
        Ok(())
    }

    /// Opens a transaction unless one is already being assembled.
    pub(crate) fn begin_txn(&mut self) -> Result<()> {
        if self.pending.is_some() {
            return Ok(());
        }
        if self.scratch_dirty {
            tracing::debug!("clearing scratch blocks left by an abandoned transaction");
            self.erase_scratch_blocks()?;
        }

        self.staged_files.fill(false);
        self.staged_blocks.fill(false);
        self.pending = Some(Pending { header: self.header, data_scratch_taken: false });
        self.scratch_dirty = true;
        Ok(())
    }

    pub(crate) fn abandon_on_err<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            if self.pending.take().is_some() {
                tracing::warn!(error = %err, "transaction abandoned");
            }
        }
        result
    }

    pub(crate) fn file_staged(&self, slot: u32) -> bool {
        self.pending.is_some() && self.staged_files.get(slot as usize).copied().unwrap_or(false)
    }

    pub(crate) fn block_staged(&self, lblock: u32) -> bool {
        self.pending.is_some() && self.staged_blocks.get(lblock as usize).copied().unwrap_or(false)
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(StorageError::GenericError)
        }
    }

    fn prepare(&mut self) -> Result<()> {
        if self.flash_ready {
            return Ok(());
        }
        self.config.validate()?;
        self.flash.init(&self.config)?;

        self.staged_files = vec![false; self.config.max_files as usize];
        self.staged_blocks = vec![false; layout::num_lblocks(&self.config) as usize];
        self.flash_ready = true;
        Ok(())
    }

    fn other_block(block: u32) -> u32 {
        if block == METADATA_BLOCK0 {
            METADATA_BLOCK1
        } else {
            METADATA_BLOCK0
        }
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn active_block(&self) -> u32 {
        self.active
    }

    pub fn scratch_block(&self) -> u32 {
        self.scratch
    }

    /// The committed header as held in memory.
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Whether staged records are waiting for `finalize_transaction`.
    pub fn transaction_open(&self) -> bool {
        self.pending.is_some()
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn into_flash(self) -> F {
        self.flash
    }
}
