// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! sfs-kernel: the metadata-block manager of a crash-consistent, small-file
//! store built directly on raw flash.
//!
//! Two physical blocks alternate as the *active* and *scratch* metadata
//! block. Every mutation is staged into the scratch block, the untouched
//! records are copied forward, and a single header write commits the new
//! generation. After a power loss [`select`] picks whichever block carries
//! the latest valid header.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod flash;
pub mod types;
pub mod layout;
pub mod integrity;
pub mod select;
pub mod mblock;
pub mod allocator;
pub mod dblock;
pub mod migrate;

pub use allocator::SlotPolicy;
pub use config::FsConfig;
pub use error::{Corruption, FlashError, Result, StorageError};
pub use flash::FlashDriver;
pub use mblock::FileSystem;
pub use types::{BlockMeta, FileId, FileMeta, FormatVersion, Header, MetaHeader};

#[cfg(test)]
pub mod tests;
