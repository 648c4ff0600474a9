// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Host-side flash images for sfs-kernel.

pub mod error;
pub mod header;
pub mod image;

pub use error::{ImageError, Result};
pub use header::ImageHeader;
pub use image::FlashImage;
