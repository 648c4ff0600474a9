// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Memory-mapped flash image.
//!
//! The file holds an [`ImageHeader`] followed by `num_blocks` raw blocks.
//! Programming follows NOR semantics: on 0xFF flash a write can only clear
//! bits, on 0x00 flash it can only set them.

use crate::error::{ImageError, Result};
use crate::header::ImageHeader;
use memmap2::MmapMut;
use sfs_kernel::{FlashDriver, FlashError, FsConfig};
use std::fs::{File, OpenOptions};
use std::path::Path;

pub struct FlashImage {
    config: FsConfig,
    map: MmapMut,
    _file: File,
}

impl FlashImage {
    /// Creates an image filled with the erase value.
    pub fn create(path: impl AsRef<Path>, config: FsConfig) -> Result<Self> {
        config.validate()?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.set_len(image_len(&config))?;

        let mut map = unsafe { MmapMut::map_mut(&file)? };
        map[..ImageHeader::SIZE].copy_from_slice(&ImageHeader::new(config).to_bytes());
        map[ImageHeader::SIZE..].fill(config.erase_value);
        map.flush()?;

        tracing::debug!(path = %path.as_ref().display(), ?config, "flash image created");
        Ok(Self { config, map, _file: file })
    }

    /// Opens an existing image and checks its header and length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;
        let header = ImageHeader::read_from(&file)?;
        let config = header.config;

        let len = file.metadata()?.len();
        if len != image_len(&config) {
            return Err(ImageError::InvalidFormat(format!(
                "image is {} bytes, geometry needs {}",
                len,
                image_len(&config)
            )));
        }

        let map = unsafe { MmapMut::map_mut(&file)? };
        tracing::debug!(path = %path.as_ref().display(), ?config, "flash image opened");
        Ok(Self { config, map, _file: file })
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    /// Contents of one block, or `None` past the last block.
    pub fn raw_block(&self, block: u32) -> Option<&[u8]> {
        if block >= self.config.num_blocks {
            return None;
        }
        let start = self.block_start(block);
        Some(&self.map[start..start + self.config.block_size as usize])
    }

    fn block_start(&self, block: u32) -> usize {
        ImageHeader::SIZE + block as usize * self.config.block_size as usize
    }

    fn range(&self, block: u32, offset: usize, len: usize) -> std::result::Result<usize, FlashError> {
        if block >= self.config.num_blocks {
            return Err(FlashError::BlockOutOfRange { block });
        }
        match offset.checked_add(len) {
            Some(end) if end <= self.config.block_size as usize => Ok(self.block_start(block) + offset),
            _ => Err(FlashError::OutOfBounds { block, offset, len }),
        }
    }
}

fn image_len(config: &FsConfig) -> u64 {
    ImageHeader::SIZE as u64 + config.block_size as u64 * config.num_blocks as u64
}

impl FlashDriver for FlashImage {
    fn init(&mut self, config: &FsConfig) -> std::result::Result<(), FlashError> {
        if config.block_size != self.config.block_size
            || config.num_blocks != self.config.num_blocks
            || config.erase_value != self.config.erase_value
        {
            return Err(FlashError::Geometry);
        }
        Ok(())
    }

    fn read(&self, _config: &FsConfig, block: u32, offset: usize, buf: &mut [u8]) -> std::result::Result<(), FlashError> {
        let start = self.range(block, offset, buf.len())?;
        buf.copy_from_slice(&self.map[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, _config: &FsConfig, block: u32, offset: usize, buf: &[u8]) -> std::result::Result<(), FlashError> {
        let start = self.range(block, offset, buf.len())?;
        let erased_high = self.config.erase_value == 0xFF;
        for (cell, byte) in self.map[start..start + buf.len()].iter_mut().zip(buf) {
            *cell = if erased_high { *cell & byte } else { *cell | byte };
        }
        Ok(())
    }

    fn erase(&mut self, _config: &FsConfig, block: u32) -> std::result::Result<(), FlashError> {
        let start = self.range(block, 0, self.config.block_size as usize)?;
        let end = start + self.config.block_size as usize;
        self.map[start..end].fill(self.config.erase_value);
        Ok(())
    }

    fn flush(&mut self, _config: &FsConfig, block: u32) -> std::result::Result<(), FlashError> {
        let start = self.range(block, 0, self.config.block_size as usize)?;
        self.map
            .flush_range(start, self.config.block_size as usize)
            .map_err(|err| {
                tracing::error!(block, error = %err, "flush failed");
                FlashError::Device { block }
            })
    }
}
