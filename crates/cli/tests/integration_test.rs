// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use sfs_cli::commands::{format, inspect, reserve, verify};
use sfs_image::FlashImage;
use sfs_kernel::{FlashDriver, FsConfig};
use std::path::Path;
use tempfile::tempdir;

fn config() -> FsConfig {
    FsConfig {
        block_size: 1024,
        num_blocks: 4,
        max_files: 6,
        max_file_size: 128,
        ..FsConfig::default()
    }
}

fn corrupt_active_record(path: &Path) {
    let report = inspect::build_report(path).unwrap();
    let mut image = FlashImage::open(path).unwrap();
    let cfg = *image.config();
    // Clearing bits is always a legal NOR write.
    image.write(&cfg, report.active_block, 12, &[0x00]).unwrap();
}

#[test]
fn test_integration_workflow() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("flash.img");

    format::run(&path, config()).unwrap();
    let slot = reserve::run(&path, "boot.cfg", 64, 0x1, false, Some(b"hello")).unwrap();
    reserve::run(&path, "keys", 32, 0x2, false, None).unwrap();

    let report = inspect::build_report(&path).unwrap();
    assert_eq!(report.format, "current");
    assert_eq!(report.files.len(), 2);
    let boot = report.files.iter().find(|f| f.id == "boot.cfg").unwrap();
    assert_eq!(boot.slot, slot);
    assert_eq!(boot.cur_size, 5);
    assert_eq!(boot.max_size, 64);

    let verified = verify::run(&path).unwrap();
    assert_eq!(verified.files, 2);
    assert_eq!(verified.blocks, 2);
    assert!(verified.duplicates.is_empty());

    assert!(inspect::run(&path, true).is_ok());
    assert!(inspect::run(&path, false).is_ok());
}

#[test]
fn test_inspect_is_read_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ro.img");
    format::run(&path, config()).unwrap();

    let before = std::fs::read(&path).unwrap();
    let first = inspect::build_report(&path).unwrap();
    let second = inspect::build_report(&path).unwrap();
    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(before, std::fs::read(&path).unwrap());
}

#[test]
fn test_reserve_rejects_bad_requests() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.img");
    format::run(&path, config()).unwrap();

    assert!(reserve::run(&path, "big", 129, 0, false, None).is_err());
    assert!(reserve::run(&path, "this-id-is-too-long", 8, 0, false, None).is_err());
    assert!(reserve::run(&path, "small", 4, 0, false, Some(b"too long")).is_err());

    reserve::run(&path, "dup", 8, 0, false, None).unwrap();
    assert!(reserve::run(&path, "dup", 8, 0, false, None).is_err());
    assert_eq!(inspect::build_report(&path).unwrap().files.len(), 1);
}

#[test]
fn test_verify_detects_corruption() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.img");
    format::run(&path, config()).unwrap();
    reserve::run(&path, "victim", 16, 0, false, None).unwrap();

    corrupt_active_record(&path);
    assert!(verify::run(&path).is_err());
}

#[test]
fn test_unformatted_image_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("blank.img");
    FlashImage::create(&path, config()).unwrap();

    assert!(inspect::build_report(&path).is_err());
    assert!(verify::run(&path).is_err());
}

#[test]
fn test_scratch_block_erased_after_commit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scratch.img");
    format::run(&path, config()).unwrap();

    let report = inspect::build_report(&path).unwrap();
    assert_eq!(report.active_block, 0);
    assert_eq!(report.scratch_block, 1);
    assert!(report.scratch_erased);

    reserve::run(&path, "next", 8, 0, false, None).unwrap();
    let report = inspect::build_report(&path).unwrap();
    assert_eq!(report.active_block, 1);
    assert!(report.scratch_erased);
}
