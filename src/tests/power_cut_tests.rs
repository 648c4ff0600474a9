// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use super::sim_flash::SimFlash;
use super::{fid, formatted, reboot, small_config};
use crate::allocator::SlotPolicy;
use crate::config::{FsConfig, METADATA_BLOCK0, METADATA_BLOCK1};
use crate::error::StorageError;
use crate::layout;
use crate::mblock::FileSystem;
use crate::select::read_candidate;

fn mount(cfg: FsConfig, flash: SimFlash) -> FileSystem<SimFlash> {
    let mut fs = FileSystem::new(cfg, flash);
    fs.init().unwrap();
    fs
}

fn valid_blocks(fs: &FileSystem<SimFlash>) -> usize {
    [METADATA_BLOCK0, METADATA_BLOCK1]
        .iter()
        .filter(|&&b| read_candidate(fs.flash(), fs.config(), b).unwrap().is_some())
        .count()
}

/// Mutating operations a transaction performs after its header write:
/// the flush and the scratch erases.
fn ops_after_header(cfg: &FsConfig) -> usize {
    if layout::has_data_scratch(cfg) {
        3
    } else {
        2
    }
}

#[test]
fn test_reserve_commits_only_after_header_write() {
    for num_blocks in [2, 3, 4] {
        let cfg = small_config(num_blocks);
        let mut base = formatted(cfg);
        base.reserve_file(fid("A"), 16, 0, SlotPolicy::UseSpare).unwrap();
        let base = base.into_flash();

        let mut probe = mount(cfg, base.clone());
        let before = probe.flash().ops();
        probe.reserve_file(fid("B"), 16, 0, SlotPolicy::UseSpare).unwrap();
        let total = probe.flash().ops() - before;
        let commit_point = total - ops_after_header(&cfg);

        for n in 0..total {
            let mut fs = mount(cfg, base.clone());
            fs.flash.cut_power_after(n);
            assert!(fs.reserve_file(fid("B"), 16, 0, SlotPolicy::UseSpare).is_err());

            let (fs, mounted) = reboot(fs);
            mounted.unwrap();
            assert_eq!(valid_blocks(&fs), 1, "blocks {} cut after {}", num_blocks, n);
            assert_eq!(fs.find_file_slot(&fid("A")), Ok(0));

            let found = fs.find_file_slot(&fid("B"));
            if n >= commit_point {
                assert_eq!(found, Ok(1), "blocks {} cut after {}", num_blocks, n);
            } else {
                assert_eq!(found, Err(StorageError::NotFound), "blocks {} cut after {}", num_blocks, n);
            }
        }
    }
}

#[test]
fn test_data_write_commits_atomically() {
    let cfg = small_config(4);
    let mut base = formatted(cfg);
    let free = base.read_block_meta(0).unwrap().free_size;
    base.reserve_file(fid("filler"), free, 0, SlotPolicy::UseSpare).unwrap();
    let (slot, _, _) = base.reserve_file(fid("A"), 32, 0, SlotPolicy::UseSpare).unwrap();
    base.write_file_data(slot, 0, b"old!").unwrap();
    base.finalize_transaction().unwrap();
    let base = base.into_flash();

    let rewrite = |fs: &mut FileSystem<SimFlash>| -> Result<(), StorageError> {
        fs.write_file_data(slot, 0, b"new data")?;
        fs.finalize_transaction()
    };

    let mut probe = mount(cfg, base.clone());
    let before = probe.flash().ops();
    rewrite(&mut probe).unwrap();
    let total = probe.flash().ops() - before;
    let commit_point = total - ops_after_header(&cfg);

    for n in 0..total {
        let mut fs = mount(cfg, base.clone());
        fs.flash.cut_power_after(n);
        assert!(rewrite(&mut fs).is_err());

        let (fs, mounted) = reboot(fs);
        mounted.unwrap();
        let meta = fs.read_file_meta(slot).unwrap();
        let mut buf = std::vec![0u8; meta.cur_size as usize];
        fs.read_file_data(&meta, 0, &mut buf).unwrap();

        if n >= commit_point {
            assert_eq!(buf, b"new data", "cut after {}", n);
        } else {
            assert_eq!(buf, b"old!", "cut after {}", n);
        }
    }
}

#[test]
fn test_generation_rollover_both_erase_values() {
    for erase_value in [0xFF, 0x00] {
        let cfg = FsConfig { erase_value, ..small_config(3) };
        let mut fs = formatted(cfg);
        fs.reserve_file(fid("A"), 16, 0, SlotPolicy::UseSpare).unwrap();

        // Leave both blocks valid at every reboot so the selector has to
        // order neighbouring generations, including across the wrap.
        for _ in 0..600 {
            let previous = fs.header().swap_count;
            let mut expected = previous.wrapping_add(1);
            if expected == cfg.sentinel() {
                expected = expected.wrapping_add(1);
            }
            let target = fs.scratch_block();

            fs.flash.cut_power_at_erase();
            assert!(fs.finalize_transaction().is_err());

            let (next, mounted) = reboot(fs);
            mounted.unwrap();
            assert_eq!(next.header().swap_count, expected, "erase {:#04x}", erase_value);
            assert_eq!(next.active_block(), target);
            assert_ne!(next.header().swap_count, cfg.sentinel());
            fs = next;
        }

        assert_eq!(fs.find_file_slot(&fid("A")), Ok(0));
    }
}

/// Both metadata blocks valid: the newest generation holds "A", the older
/// one survived because the erase after the commit was cut.
fn with_stale_generation(cfg: FsConfig) -> FileSystem<SimFlash> {
    let mut fs = formatted(cfg);
    fs.finalize_transaction().unwrap();
    fs.flash.cut_power_at_erase();
    assert!(fs.reserve_file(fid("A"), 16, 0, SlotPolicy::UseSpare).is_err());
    fs.flash.restore_power();
    fs
}

#[test]
fn test_interrupted_reset_never_restores_older_generation() {
    for num_blocks in [2, 3, 4] {
        let cfg = small_config(num_blocks);
        let newest = cfg.rollover().wrapping_add(2);
        let stale = cfg.rollover().wrapping_add(1);

        let mut probe = with_stale_generation(cfg);
        assert_eq!(valid_blocks(&probe), 2);
        let before = probe.flash().ops();
        probe.reset().unwrap();
        let total = probe.flash().ops() - before;

        for mounted in [true, false] {
            for n in 0..total {
                let mut fs = with_stale_generation(cfg);
                if !mounted {
                    fs = FileSystem::new(cfg, fs.into_flash());
                }
                fs.flash.cut_power_after(n);
                assert!(fs.reset().is_err());

                let (fs, result) = reboot(fs);
                let ctx = (num_blocks, mounted, n);
                match result {
                    Err(err) => assert_eq!(err, StorageError::GenericError, "{:?}", ctx),
                    Ok(()) => {
                        let generation = fs.header().swap_count;
                        assert_ne!(generation, stale, "{:?}", ctx);
                        if generation == newest {
                            assert_eq!(fs.find_file_slot(&fid("A")), Ok(0), "{:?}", ctx);
                        } else {
                            assert_eq!(generation, cfg.rollover(), "{:?}", ctx);
                            assert_eq!(fs.find_file_slot(&fid("A")), Err(StorageError::NotFound), "{:?}", ctx);
                        }
                    }
                }
            }
        }
    }
}
