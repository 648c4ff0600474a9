// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Block and file metadata records.
//!
//! Both records have the same encoding in every supported format version;
//! only their position inside the metadata block moves.

use byteorder::{ByteOrder, LittleEndian};

use crate::types::id::{FileId, FILE_ID_SIZE};

/// Bookkeeping for one logical data block.
///
/// Layout:
/// [u32] Physical block id
/// [u32] Start of the data area
/// [u32] Free bytes at the end of the block
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockMeta {
    pub phy_id: u32,
    pub data_start: u32,
    pub free_size: u32,
}

impl BlockMeta {
    pub const SIZE: usize = 12;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.phy_id);
        LittleEndian::write_u32(&mut buf[4..8], self.data_start);
        LittleEndian::write_u32(&mut buf[8..12], self.free_size);
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        Self {
            phy_id: LittleEndian::read_u32(&buf[0..4]),
            data_start: LittleEndian::read_u32(&buf[4..8]),
            free_size: LittleEndian::read_u32(&buf[8..12]),
        }
    }

    /// Offset where free space begins, i.e. the end of the packed file data.
    pub fn used_end(&self, block_size: u32) -> u32 {
        block_size.saturating_sub(self.free_size)
    }
}

/// One slot of the file table.
///
/// Layout:
/// [u32] Logical block
/// [u32] Data offset inside the block
/// [u32] Current size
/// [u32] Reserved (maximum) size
/// [u32] Flags
/// [u8; 12] File id
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FileMeta {
    pub id: FileId,
    pub lblock: u32,
    pub data_offset: u32,
    pub cur_size: u32,
    pub max_size: u32,
    pub flags: u32,
}

impl FileMeta {
    pub const SIZE: usize = 20 + FILE_ID_SIZE;

    /// The record written into a free slot.
    pub const fn empty() -> Self {
        Self {
            id: FileId::FREE,
            lblock: 0,
            data_offset: 0,
            cur_size: 0,
            max_size: 0,
            flags: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.id.is_free()
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32(&mut buf[0..4], self.lblock);
        LittleEndian::write_u32(&mut buf[4..8], self.data_offset);
        LittleEndian::write_u32(&mut buf[8..12], self.cur_size);
        LittleEndian::write_u32(&mut buf[12..16], self.max_size);
        LittleEndian::write_u32(&mut buf[16..20], self.flags);
        buf[20..].copy_from_slice(self.id.as_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; Self::SIZE]) -> Self {
        let mut id = [0u8; FILE_ID_SIZE];
        id.copy_from_slice(&buf[20..]);
        Self {
            id: FileId(id),
            lblock: LittleEndian::read_u32(&buf[0..4]),
            data_offset: LittleEndian::read_u32(&buf[4..8]),
            cur_size: LittleEndian::read_u32(&buf[8..12]),
            max_size: LittleEndian::read_u32(&buf[12..16]),
            flags: LittleEndian::read_u32(&buf[16..20]),
        }
    }
}
