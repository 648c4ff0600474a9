// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Metadata block headers.
//!
//! Two formats exist on flash. Both start with the scratch data block
//! pointer, the swap count and the version tag, so the tag can be read
//! before the rest of the header is interpreted:
//!
//! Legacy (tag 0x01), 8 bytes:
//! [u32] Scratch data block
//! [u8]  Swap count
//! [u8]  Version tag
//! [u8; 2] Reserved
//!
//! Current (tag 0x02), 12 bytes:
//! [u32] Scratch data block
//! [u8]  Swap count
//! [u8]  Version tag
//! [u8]  XOR of all metadata records
//! [u8]  Reserved
//! [u16] Logical block count
//! [u16] File slot count

use byteorder::{ByteOrder, LittleEndian};

pub const VERSION_LEGACY: u8 = 0x01;
pub const VERSION_CURRENT: u8 = 0x02;

pub const SWAP_COUNT_OFFSET: usize = 4;
pub const VERSION_OFFSET: usize = 5;
pub const XOR_OFFSET: usize = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatVersion {
    Legacy,
    Current,
}

impl FormatVersion {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            VERSION_LEGACY => Some(FormatVersion::Legacy),
            VERSION_CURRENT => Some(FormatVersion::Current),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            FormatVersion::Legacy => VERSION_LEGACY,
            FormatVersion::Current => VERSION_CURRENT,
        }
    }

    /// Bytes the header occupies at the start of a metadata block.
    pub const fn header_size(self) -> usize {
        match self {
            FormatVersion::Legacy => LegacyHeader::SIZE,
            FormatVersion::Current => Header::SIZE,
        }
    }
}

/// Header of the current format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Header {
    pub scratch_dblock: u32,
    pub swap_count: u8,
    pub metadata_xor: u8,
    pub num_lblocks: u16,
    pub max_files: u16,
}

impl Header {
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.scratch_dblock);
        buf[SWAP_COUNT_OFFSET] = self.swap_count;
        buf[VERSION_OFFSET] = VERSION_CURRENT;
        buf[XOR_OFFSET] = self.metadata_xor;
        buf[7] = 0;
        LittleEndian::write_u16(&mut buf[8..10], self.num_lblocks);
        LittleEndian::write_u16(&mut buf[10..12], self.max_files);
        buf
    }

    fn from_bytes(buf: &[u8; MetaHeader::MAX_SIZE]) -> Self {
        Self {
            scratch_dblock: LittleEndian::read_u32(&buf[0..4]),
            swap_count: buf[SWAP_COUNT_OFFSET],
            metadata_xor: buf[XOR_OFFSET],
            num_lblocks: LittleEndian::read_u16(&buf[8..10]),
            max_files: LittleEndian::read_u16(&buf[10..12]),
        }
    }
}

/// Header of the legacy format: no checksum and no geometry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LegacyHeader {
    pub scratch_dblock: u32,
    pub swap_count: u8,
}

impl LegacyHeader {
    pub const SIZE: usize = 8;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.scratch_dblock);
        buf[SWAP_COUNT_OFFSET] = self.swap_count;
        buf[VERSION_OFFSET] = VERSION_LEGACY;
        buf
    }

    fn from_bytes(buf: &[u8; MetaHeader::MAX_SIZE]) -> Self {
        Self {
            scratch_dblock: LittleEndian::read_u32(&buf[0..4]),
            swap_count: buf[SWAP_COUNT_OFFSET],
        }
    }
}

/// A header as found on flash, decoded by its version tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetaHeader {
    Legacy(LegacyHeader),
    Current(Header),
}

impl MetaHeader {
    /// Bytes to read to decode any supported header.
    pub const MAX_SIZE: usize = Header::SIZE;

    /// Returns `None` if the version tag is not recognised.
    pub fn decode(buf: &[u8; Self::MAX_SIZE]) -> Option<Self> {
        match FormatVersion::from_tag(buf[VERSION_OFFSET])? {
            FormatVersion::Legacy => Some(MetaHeader::Legacy(LegacyHeader::from_bytes(buf))),
            FormatVersion::Current => Some(MetaHeader::Current(Header::from_bytes(buf))),
        }
    }

    pub fn version(&self) -> FormatVersion {
        match self {
            MetaHeader::Legacy(_) => FormatVersion::Legacy,
            MetaHeader::Current(_) => FormatVersion::Current,
        }
    }

    pub fn swap_count(&self) -> u8 {
        match self {
            MetaHeader::Legacy(h) => h.swap_count,
            MetaHeader::Current(h) => h.swap_count,
        }
    }

    pub fn scratch_dblock(&self) -> u32 {
        match self {
            MetaHeader::Legacy(h) => h.scratch_dblock,
            MetaHeader::Current(h) => h.scratch_dblock,
        }
    }
}
