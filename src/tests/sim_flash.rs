// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! RAM-backed flash for tests.
//!
//! Enforces erase-before-write and can lose power after a chosen number of
//! mutating operations. An operation that hits the cut does nothing.

use crate::config::FsConfig;
use crate::error::FlashError;
use crate::flash::FlashDriver;
use std::vec;
use std::vec::Vec;

#[derive(Clone, Debug)]
pub struct SimFlash {
    block_size: usize,
    num_blocks: u32,
    erase_value: u8,
    data: Vec<u8>,
    ops: usize,
    budget: Option<usize>,
    fail_next_erase: bool,
    powered: bool,
}

impl SimFlash {
    /// A device matching `cfg`, fully erased.
    pub fn new(cfg: &FsConfig) -> Self {
        Self {
            block_size: cfg.block_size as usize,
            num_blocks: cfg.num_blocks,
            erase_value: cfg.erase_value,
            data: vec![cfg.erase_value; cfg.block_size as usize * cfg.num_blocks as usize],
            ops: 0,
            budget: None,
            fail_next_erase: false,
            powered: true,
        }
    }

    /// Mutating operations (write, erase, flush) completed so far.
    pub fn ops(&self) -> usize {
        self.ops
    }

    /// Lets `n` more mutating operations complete, then cuts power.
    pub fn cut_power_after(&mut self, n: usize) {
        self.budget = Some(n);
    }

    /// Cuts power at the next erase.
    pub fn cut_power_at_erase(&mut self) {
        self.fail_next_erase = true;
    }

    pub fn restore_power(&mut self) {
        self.budget = None;
        self.fail_next_erase = false;
        self.powered = true;
    }

    pub fn block(&self, block: u32) -> &[u8] {
        let start = block as usize * self.block_size;
        &self.data[start..start + self.block_size]
    }

    /// Direct access for tampering, bypassing erase-before-write.
    pub fn block_mut(&mut self, block: u32) -> &mut [u8] {
        let start = block as usize * self.block_size;
        &mut self.data[start..start + self.block_size]
    }

    pub fn is_erased(&self, block: u32) -> bool {
        self.block(block).iter().all(|&b| b == self.erase_value)
    }

    fn spend(&mut self, block: u32) -> Result<(), FlashError> {
        if !self.powered {
            return Err(FlashError::Device { block });
        }
        if let Some(left) = self.budget.as_mut() {
            if *left == 0 {
                self.powered = false;
                return Err(FlashError::Device { block });
            }
            *left -= 1;
        }
        self.ops += 1;
        Ok(())
    }

    fn range(&self, block: u32, offset: usize, len: usize) -> Result<usize, FlashError> {
        if block >= self.num_blocks {
            return Err(FlashError::BlockOutOfRange { block });
        }
        if offset + len > self.block_size {
            return Err(FlashError::OutOfBounds { block, offset, len });
        }
        Ok(block as usize * self.block_size + offset)
    }
}

impl FlashDriver for SimFlash {
    fn init(&mut self, config: &FsConfig) -> Result<(), FlashError> {
        if config.block_size as usize != self.block_size
            || config.num_blocks != self.num_blocks
            || config.erase_value != self.erase_value
        {
            return Err(FlashError::Geometry);
        }
        Ok(())
    }

    fn read(&self, _config: &FsConfig, block: u32, offset: usize, buf: &mut [u8]) -> Result<(), FlashError> {
        let start = self.range(block, offset, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, _config: &FsConfig, block: u32, offset: usize, buf: &[u8]) -> Result<(), FlashError> {
        let start = self.range(block, offset, buf.len())?;
        if let Some(pos) = self.data[start..start + buf.len()]
            .iter()
            .position(|&b| b != self.erase_value)
        {
            return Err(FlashError::NotErased { block, offset: offset + pos });
        }
        self.spend(block)?;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        Ok(())
    }

    fn erase(&mut self, _config: &FsConfig, block: u32) -> Result<(), FlashError> {
        let start = self.range(block, 0, self.block_size)?;
        if self.fail_next_erase {
            self.fail_next_erase = false;
            self.powered = false;
            return Err(FlashError::Device { block });
        }
        self.spend(block)?;
        let end = start + self.block_size;
        self.data[start..end].fill(self.erase_value);
        Ok(())
    }

    fn flush(&mut self, _config: &FsConfig, block: u32) -> Result<(), FlashError> {
        self.range(block, 0, 0)?;
        self.spend(block)
    }
}
