// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Read-only dump of the active metadata block.

use anyhow::Context;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;
use sfs_image::FlashImage;
use sfs_kernel::types::FILE_ID_SIZE;
use sfs_kernel::{layout, select, BlockMeta, FileMeta, FlashDriver, FormatVersion, FsConfig, MetaHeader};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct InspectReport {
    pub config: FsConfig,
    pub active_block: u32,
    pub format: &'static str,
    pub swap_count: u8,
    pub scratch_dblock: u32,
    pub scratch_block: u32,
    /// The scratch block header still reads as erased flash.
    pub scratch_erased: bool,
    pub fingerprint: String,
    pub blocks: Vec<BlockRow>,
    pub files: Vec<FileRow>,
}

#[derive(Debug, Serialize)]
pub struct BlockRow {
    pub lblock: u32,
    #[serde(flatten)]
    pub meta: BlockMeta,
}

#[derive(Debug, Serialize)]
pub struct FileRow {
    pub slot: u32,
    pub id: String,
    pub lblock: u32,
    pub data_offset: u32,
    pub cur_size: u32,
    pub max_size: u32,
    pub flags: u32,
}

impl FileRow {
    fn new(slot: u32, meta: &FileMeta) -> Self {
        Self {
            slot,
            id: display_id(meta.id.as_bytes()),
            lblock: meta.lblock,
            data_offset: meta.data_offset,
            cur_size: meta.cur_size,
            max_size: meta.max_size,
            flags: meta.flags,
        }
    }
}

pub fn run(path: &Path, json: bool) -> anyhow::Result<()> {
    let report = build_report(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_tables(&report);
    }
    Ok(())
}

/// Reads the image without mounting it, so nothing on flash changes.
pub fn build_report(path: &Path) -> anyhow::Result<InspectReport> {
    let image = FlashImage::open(path).with_context(|| format!("Failed to open image {}", path.display()))?;
    let config = *image.config();
    let (active, header) = select::select_active(&image, &config).context("No valid metadata block")?;
    let version = header.version();

    let scratch = if active == 0 { 1 } else { 0 };
    let mut scratch_header = [0u8; MetaHeader::MAX_SIZE];
    image.read(&config, scratch, 0, &mut scratch_header)?;

    let range = layout::records_range(&config, version);
    let mut records = vec![0u8; range.len()];
    image.read(&config, active, range.start, &mut records)?;

    let blocks = (0..layout::num_lblocks(&config))
        .map(|lblock| {
            let at = layout::block_meta_offset(&config, version, lblock) - range.start;
            let mut buf = [0u8; BlockMeta::SIZE];
            buf.copy_from_slice(&records[at..at + BlockMeta::SIZE]);
            BlockRow { lblock, meta: BlockMeta::from_bytes(&buf) }
        })
        .collect();

    let files = (0..config.max_files)
        .filter_map(|slot| {
            let at = layout::file_meta_offset(&config, version, slot) - range.start;
            let mut buf = [0u8; FileMeta::SIZE];
            buf.copy_from_slice(&records[at..at + FileMeta::SIZE]);
            let meta = FileMeta::from_bytes(&buf);
            (!meta.is_free()).then(|| FileRow::new(slot, &meta))
        })
        .collect();

    Ok(InspectReport {
        config,
        active_block: active,
        format: match version {
            FormatVersion::Legacy => "legacy",
            FormatVersion::Current => "current",
        },
        swap_count: header.swap_count(),
        scratch_dblock: header.scratch_dblock(),
        scratch_block: scratch,
        scratch_erased: scratch_header.iter().all(|&b| b == config.erase_value),
        fingerprint: blake3::hash(&records).to_hex().to_string(),
        blocks,
        files,
    })
}

fn print_tables(report: &InspectReport) {
    println!("\nFlash Image Report");
    println!("------------------");
    println!("Active block:  {}", report.active_block);
    println!("Format:        {}", report.format);
    println!("Generation:    {:#04x}", report.swap_count);
    println!("Data scratch:  {}", report.scratch_dblock);
    println!(
        "Scratch block: {} ({})",
        report.scratch_block,
        if report.scratch_erased { "erased" } else { "written" }
    );
    println!("Fingerprint:   {}", report.fingerprint);

    let mut blocks = Table::new();
    blocks
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Logical", "Physical", "Data Start", "Free"]);
    for row in &report.blocks {
        blocks.add_row(vec![
            row.lblock.to_string(),
            row.meta.phy_id.to_string(),
            row.meta.data_start.to_string(),
            row.meta.free_size.to_string(),
        ]);
    }
    println!("{blocks}");

    if report.files.is_empty() {
        println!("No files.\n");
        return;
    }

    let mut files = Table::new();
    files
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Slot", "Id", "Block", "Offset", "Size", "Max", "Flags"]);
    for row in &report.files {
        files.add_row(vec![
            row.slot.to_string(),
            row.id.clone(),
            row.lblock.to_string(),
            row.data_offset.to_string(),
            row.cur_size.to_string(),
            row.max_size.to_string(),
            format!("{:#x}", row.flags),
        ]);
    }
    println!("{files}\n");
}

/// Printable ids are shown as text, anything else as hex.
pub(crate) fn display_id(id: &[u8; FILE_ID_SIZE]) -> String {
    let len = id.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let trimmed = &id[..len];
    if trimmed.iter().all(|b| b.is_ascii_graphic()) {
        String::from_utf8_lossy(trimmed).into_owned()
    } else {
        trimmed.iter().map(|b| format!("{b:02x}")).collect()
    }
}

