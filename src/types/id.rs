// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! File identifiers.

use crate::error::{Result, StorageError};

/// Width of a file identifier on flash.
pub const FILE_ID_SIZE: usize = 12;

/// Opaque, fixed-width file identifier. All-zero marks a free slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub [u8; FILE_ID_SIZE]);

impl FileId {
    pub const FREE: FileId = FileId([0; FILE_ID_SIZE]);

    /// Builds an identifier from up to [`FILE_ID_SIZE`] bytes, zero padded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > FILE_ID_SIZE {
            return Err(StorageError::InvalidArgument);
        }
        let mut id = [0u8; FILE_ID_SIZE];
        id[..bytes.len()].copy_from_slice(bytes);

        let id = FileId(id);
        if id.is_free() {
            return Err(StorageError::InvalidArgument);
        }
        Ok(id)
    }

    pub fn is_free(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; FILE_ID_SIZE] {
        &self.0
    }
}
