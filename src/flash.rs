// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! The flash driver contract.

use crate::config::FsConfig;
use crate::error::FlashError;

/// Raw flash access required by the metadata manager.
///
/// Blocks are the smallest erasable unit and are addressed by their
/// physical index, counted from zero. Offsets are relative to the start of
/// the block. A write may only target bytes that are still erased; the
/// manager never programs the same byte twice between erases.
///
/// A minimal implementation looks like this:
///
/// ```rust
/// use sfs_kernel::{FlashDriver, FlashError, FsConfig};
///
/// struct Ram(Vec<u8>);
///
/// impl FlashDriver for Ram {
///     fn init(&mut self, _config: &FsConfig) -> Result<(), FlashError> {
///         Ok(())
///     }
///
///     fn read(&self, config: &FsConfig, block: u32, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
///         let start = block as usize * config.block_size as usize + offset;
///         buf.copy_from_slice(&self.0[start..start + buf.len()]);
///         Ok(())
///     }
///
///     fn write(&mut self, config: &FsConfig, block: u32, offset: usize, buf: &[u8]) -> Result<(), FlashError> {
///         let start = block as usize * config.block_size as usize + offset;
///         self.0[start..start + buf.len()].copy_from_slice(buf);
///         Ok(())
///     }
///
///     fn erase(&mut self, config: &FsConfig, block: u32) -> Result<(), FlashError> {
///         let size = config.block_size as usize;
///         let start = block as usize * size;
///         self.0[start..start + size].fill(config.erase_value);
///         Ok(())
///     }
///
///     fn flush(&mut self, _config: &FsConfig, _block: u32) -> Result<(), FlashError> {
///         Ok(())
///     }
/// }
/// ```
pub trait FlashDriver {
    /// Prepares the device. Called once before any other operation.
    fn init(&mut self, config: &FsConfig) -> Result<(), FlashError>;

    /// Reads `buf.len()` bytes from `block` starting at `offset`.
    fn read(&self, config: &FsConfig, block: u32, offset: usize, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Programs `buf` into `block` starting at `offset`.
    fn write(&mut self, config: &FsConfig, block: u32, offset: usize, buf: &[u8]) -> Result<(), FlashError>;

    /// Erases the whole of `block` to the configured erase value.
    fn erase(&mut self, config: &FsConfig, block: u32) -> Result<(), FlashError>;

    /// Makes every earlier write to `block` durable.
    fn flush(&mut self, config: &FsConfig, block: u32) -> Result<(), FlashError>;
}

impl<T: FlashDriver + ?Sized> FlashDriver for &mut T {
    fn init(&mut self, config: &FsConfig) -> Result<(), FlashError> {
        (**self).init(config)
    }

    fn read(&self, config: &FsConfig, block: u32, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(config, block, offset, buf)
    }

    fn write(&mut self, config: &FsConfig, block: u32, offset: usize, buf: &[u8]) -> Result<(), FlashError> {
        (**self).write(config, block, offset, buf)
    }

    fn erase(&mut self, config: &FsConfig, block: u32) -> Result<(), FlashError> {
        (**self).erase(config, block)
    }

    fn flush(&mut self, config: &FsConfig, block: u32) -> Result<(), FlashError> {
        (**self).flush(config, block)
    }
}
