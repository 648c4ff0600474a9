// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! On-flash record types.

pub mod id;
pub mod meta;
pub mod header;

pub use header::{FormatVersion, Header, LegacyHeader, MetaHeader};
pub use id::{FileId, FILE_ID_SIZE};
pub use meta::{BlockMeta, FileMeta};
