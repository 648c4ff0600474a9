// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Configuration constants and the immutable filesystem configuration.

use crate::error::{Result, StorageError};
use crate::layout;
use crate::types::FormatVersion;

/// Size of the stack buffer used for every flash-to-flash copy.
pub const COPY_BUF_SIZE: usize = 128;

/// Physical index of the first metadata block.
pub const METADATA_BLOCK0: u32 = 0;

/// Physical index of the second metadata block.
pub const METADATA_BLOCK1: u32 = 1;

/// Physical index of the data scratch block right after a reset.
pub const INIT_SCRATCH_DBLOCK: u32 = 2;

/// Physical index of logical block 1 right after a reset.
pub const INIT_DBLOCK_START: u32 = 3;

/// Erase value of NOR flash.
pub const ERASE_VALUE_ONES: u8 = 0xFF;

/// Erase value of flash parts that erase to zero.
pub const ERASE_VALUE_ZEROS: u8 = 0x00;

/// Storage geometry and policy, fixed for the lifetime of a filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FsConfig {
    /// Size of one erasable flash block in bytes.
    pub block_size: u32,
    /// Total number of flash blocks available to the filesystem.
    pub num_blocks: u32,
    /// Number of slots in the file table.
    pub max_files: u32,
    /// Largest size a single file may reserve.
    pub max_file_size: u32,
    /// Value every byte holds after an erase (0xFF or 0x00).
    pub erase_value: u8,
    /// Re-check the active header, checksum and record bounds on every read.
    pub validate_from_flash: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            block_size: 4096,
            num_blocks: 4,
            max_files: 16,
            max_file_size: 1024,
            erase_value: ERASE_VALUE_ONES,
            validate_from_flash: true,
        }
    }
}

impl FsConfig {
    /// The "not yet written" generation value.
    pub fn sentinel(&self) -> u8 {
        self.erase_value
    }

    /// The first generation value after the counter wraps past the sentinel.
    pub fn rollover(&self) -> u8 {
        self.erase_value.wrapping_add(1)
    }

    /// Checks that the geometry can hold the current on-flash format.
    pub fn validate(&self) -> Result<()> {
        if self.erase_value != ERASE_VALUE_ONES && self.erase_value != ERASE_VALUE_ZEROS {
            return Err(StorageError::InvalidArgument);
        }
        if self.num_blocks < 2 || self.max_files == 0 || self.block_size == 0 {
            return Err(StorageError::InvalidArgument);
        }
        // Header geometry fields are 16 bits wide.
        if layout::num_lblocks(self) > u16::MAX as u32 || self.max_files > u16::MAX as u32 {
            return Err(StorageError::InvalidArgument);
        }

        let meta_end = layout::metadata_end(self, FormatVersion::Current) as u64;
        if meta_end > self.block_size as u64 {
            return Err(StorageError::InvalidArgument);
        }

        let largest_area = if layout::has_data_scratch(self) {
            self.block_size as u64
        } else {
            self.block_size as u64 - meta_end
        };
        if self.max_file_size as u64 > largest_area {
            return Err(StorageError::InvalidArgument);
        }

        Ok(())
    }
}
