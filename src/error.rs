// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Error types.

use thiserror::Error;

/// Failure reported by a flash driver.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    #[error("Block {block} out of range")]
    BlockOutOfRange { block: u32 },

    #[error("Access past end of block {block}: offset {offset}, length {len}")]
    OutOfBounds { block: u32, offset: usize, len: usize },

    #[error("Write to non-erased flash in block {block} at offset {offset}")]
    NotErased { block: u32, offset: usize },

    #[error("Driver geometry does not match the filesystem configuration")]
    Geometry,

    #[error("Flash driver not initialised")]
    NotInitialized,

    #[error("Device error on block {block}")]
    Device { block: u32 },
}

/// What an integrity check found wrong.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Corruption {
    #[error("metadata checksum mismatch: expected {expected:#04x}, found {found:#04x}")]
    Checksum { expected: u8, found: u8 },

    #[error("active header on flash differs from the committed copy")]
    HeaderMismatch,

    #[error("file record {slot} fails bounds check")]
    FileMeta { slot: u32 },

    #[error("block record {lblock} fails bounds check")]
    BlockMeta { lblock: u32 },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Malformed request. No flash was touched.
    #[error("Invalid argument")]
    InvalidArgument,

    /// Lookup failed.
    #[error("Not found")]
    NotFound,

    /// No block or file slot can satisfy the reservation.
    #[error("Insufficient storage")]
    InsufficientStorage,

    /// Metadata failed a checksum or bounds check. Requires a reset.
    #[error("Data corrupt: {0}")]
    DataCorrupt(Corruption),

    /// The flash driver reported an error.
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] FlashError),

    /// Internal invariant violated, e.g. no valid metadata block at boot.
    #[error("Generic error")]
    GenericError,
}

pub type Result<T> = core::result::Result<T, StorageError>;
