// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Image file header.
//!
//! Layout (32 bytes, little-endian):
//! [u8; 4] Magic "SFSI"
//! [u16]   Image format version
//! [u8]    Flash erase value
//! [u8]    Flags (bit 0: validate from flash)
//! [u32]   Block size
//! [u32]   Block count
//! [u32]   File slots
//! [u32]   Maximum file size
//! [u64]   CRC-64 of the preceding 24 bytes

use crate::error::{ImageError, Result};
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use crc64fast::Digest;
use sfs_kernel::FsConfig;
use std::io::{Cursor, Read};

const FLAG_VALIDATE: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHeader {
    pub version: u16,
    pub config: FsConfig,
}

impl ImageHeader {
    pub const SIZE: usize = 32;
    pub const MAGIC: [u8; 4] = *b"SFSI";
    pub const VERSION: u16 = 1;
    const BODY: usize = Self::SIZE - 8;

    pub fn new(config: FsConfig) -> Self {
        Self {
            version: Self::VERSION,
            config,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let cfg = &self.config;
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&Self::MAGIC);
        LittleEndian::write_u16(&mut buf[4..6], self.version);
        buf[6] = cfg.erase_value;
        buf[7] = if cfg.validate_from_flash { FLAG_VALIDATE } else { 0 };
        LittleEndian::write_u32(&mut buf[8..12], cfg.block_size);
        LittleEndian::write_u32(&mut buf[12..16], cfg.num_blocks);
        LittleEndian::write_u32(&mut buf[16..20], cfg.max_files);
        LittleEndian::write_u32(&mut buf[20..24], cfg.max_file_size);
        let crc = checksum(&buf[..Self::BODY]);
        LittleEndian::write_u64(&mut buf[Self::BODY..], crc);
        buf
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader.read_exact(&mut buf)?;
        Self::decode(&buf)
    }

    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self> {
        if buf[0..4] != Self::MAGIC {
            return Err(ImageError::InvalidMagic);
        }

        let mut cur = Cursor::new(&buf[4..]);
        let version = cur.read_u16::<LittleEndian>()?;
        if version != Self::VERSION {
            return Err(ImageError::UnsupportedVersion(version));
        }
        let erase_value = cur.read_u8()?;
        let flags = cur.read_u8()?;
        let block_size = cur.read_u32::<LittleEndian>()?;
        let num_blocks = cur.read_u32::<LittleEndian>()?;
        let max_files = cur.read_u32::<LittleEndian>()?;
        let max_file_size = cur.read_u32::<LittleEndian>()?;
        let expected = cur.read_u64::<LittleEndian>()?;

        let found = checksum(&buf[..Self::BODY]);
        if expected != found {
            return Err(ImageError::ChecksumMismatch { expected, found });
        }

        Ok(Self {
            version,
            config: FsConfig {
                block_size,
                num_blocks,
                max_files,
                max_file_size,
                erase_value,
                validate_from_flash: flags & FLAG_VALIDATE != 0,
            },
        })
    }
}

fn checksum(bytes: &[u8]) -> u64 {
    let mut digest = Digest::new();
    digest.write(bytes);
    digest.sum64()
}
