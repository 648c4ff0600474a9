// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use sfs_kernel::StorageError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid magic bytes in image header")]
    InvalidMagic,
    #[error("Unsupported image version {0}")]
    UnsupportedVersion(u16),
    #[error("Checksum mismatch: expected {expected:#018x}, found {found:#018x}")]
    ChecksumMismatch {
        expected: u64,
        found: u64,
    },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Invalid image format: {0}")]
    InvalidFormat(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ImageError>;
