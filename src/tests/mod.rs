// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod sim_flash;
pub mod power_cut_tests;

use crate::config::FsConfig;
use crate::error::Result;
use crate::mblock::FileSystem;
use crate::types::FileId;
use sim_flash::SimFlash;

/// 512-byte blocks, 4 file slots, 64-byte files.
pub fn small_config(num_blocks: u32) -> FsConfig {
    FsConfig {
        block_size: 512,
        num_blocks,
        max_files: 4,
        max_file_size: 64,
        ..FsConfig::default()
    }
}

/// A freshly reset filesystem on erased simulated flash.
pub fn formatted(cfg: FsConfig) -> FileSystem<SimFlash> {
    let mut fs = FileSystem::new(cfg, SimFlash::new(&cfg));
    fs.reset().unwrap();
    fs
}

/// Power-cycles the device and mounts it again.
pub fn reboot(fs: FileSystem<SimFlash>) -> (FileSystem<SimFlash>, Result<()>) {
    let cfg = *fs.config();
    let mut flash = fs.into_flash();
    flash.restore_power();
    let mut fs = FileSystem::new(cfg, flash);
    let mounted = fs.init();
    (fs, mounted)
}

pub fn fid(name: &str) -> FileId {
    FileId::from_bytes(name.as_bytes()).unwrap()
}
