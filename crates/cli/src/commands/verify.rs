// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use anyhow::bail;
use rustc_hash::FxHashSet;
use sfs_kernel::{layout, FileId};
use std::path::Path;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct VerifyReport {
    pub files: u32,
    pub blocks: u32,
    pub duplicates: Vec<FileId>,
}

/// Mounts with flash validation forced on and checks every record.
pub fn run(path: &Path) -> anyhow::Result<VerifyReport> {
    let result = check(path);
    match &result {
        Ok(report) => {
            println!("\n✅ VERIFIED\n");
            println!("Logical blocks: {}", report.blocks);
            println!("Files:          {}\n", report.files);
        }
        Err(err) => {
            println!("\n❌ CORRUPTED\n");
            println!("Reason: {err:#}\n");
        }
    }
    result
}

fn check(path: &Path) -> anyhow::Result<VerifyReport> {
    let fs = super::mount(path, Some(true))?;
    fs.verify_integrity()?;
    let config = *fs.config();

    let mut report = VerifyReport::default();
    for lblock in 0..layout::num_lblocks(&config) {
        fs.read_block_meta(lblock)?;
        report.blocks += 1;
    }

    let mut seen = FxHashSet::default();
    for slot in 0..config.max_files {
        let meta = fs.read_file_meta(slot)?;
        if meta.is_free() {
            continue;
        }
        report.files += 1;
        if !seen.insert(meta.id) {
            tracing::warn!(slot, id = %super::inspect::display_id(meta.id.as_bytes()), "duplicate file id");
            report.duplicates.push(meta.id);
        }
    }

    if !report.duplicates.is_empty() {
        bail!("{} duplicate file id(s) in the file table", report.duplicates.len());
    }
    Ok(report)
}
