//! Workspace bundles: a zip holding the records database plus a manifest.
//! Import also accepts a bare SQLite file.

use crate::db::DB_FILE_NAME;
use anyhow::{anyhow, bail, Context};
use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/records.sqlite3";
const META_WORKSPACE_ENTRY: &str = "meta/workspace.json";
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";
pub const BUNDLE_FORMAT_V1: &str = "studentd-workspace-v1";
pub const RAW_SQLITE_FORMAT: &str = "raw-sqlite3";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
}

fn write_json_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, opts)
        .with_context(|| format!("failed to start {name}"))?;
    let text = serde_json::to_string_pretty(value).with_context(|| format!("failed to serialize {name}"))?;
    zip.write_all(text.as_bytes())
        .with_context(|| format!("failed to write {name}"))?;
    Ok(())
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE_NAME);
    if !db_path.is_file() {
        bail!("workspace database not found: {}", db_path.display());
    }
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let out_file = File::create(out_path)
        .with_context(|| format!("failed to create output file {}", out_path.display()))?;
    let mut zip = ZipWriter::new(out_file);

    write_json_entry(
        &mut zip,
        MANIFEST_ENTRY,
        &json!({
            "format": BUNDLE_FORMAT_V1,
            "version": 1,
            "appVersion": env!("CARGO_PKG_VERSION"),
            "exportedAt": chrono::Utc::now().to_rfc3339(),
        }),
    )?;

    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;

    write_json_entry(
        &mut zip,
        META_WORKSPACE_ENTRY,
        &json!({ "sourceWorkspace": workspace_path.to_string_lossy() }),
    )?;
    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 3,
    })
}

fn read_magic<const N: usize>(path: &Path) -> anyhow::Result<Option<[u8; N]>> {
    let mut f = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut buf = [0u8; N];
    match f.read_exact(&mut buf) {
        Ok(()) => Ok(Some(buf)),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(anyhow::Error::new(e).context(format!("failed to read {}", path.display()))),
    }
}

fn ensure_sqlite(path: &Path) -> anyhow::Result<()> {
    match read_magic::<16>(path)? {
        Some(magic) if &magic == SQLITE_MAGIC => Ok(()),
        _ => Err(anyhow!("{} is not a SQLite database", path.display())),
    }
}

/// Write the database from `in_path` next to `dst`, check it, then swap it
/// in. The existing database survives any failure.
fn stage_database(
    in_path: &Path,
    dst: &Path,
    fill: impl FnOnce(&mut File) -> anyhow::Result<()>,
) -> anyhow::Result<()> {
    let staged = dst.with_file_name(format!("{DB_FILE_NAME}.importing"));
    let mut out = File::create(&staged)
        .with_context(|| format!("failed to create {}", staged.display()))?;
    let staged_ok = fill(&mut out)
        .and_then(|()| out.flush().context("failed to flush staged database"))
        .and_then(|()| ensure_sqlite(&staged));
    drop(out);
    if let Err(e) = staged_ok {
        let _ = std::fs::remove_file(&staged);
        return Err(e.context(format!("cannot import {}", in_path.display())));
    }
    if dst.exists() {
        std::fs::remove_file(dst)
            .with_context(|| format!("failed to remove existing database {}", dst.display()))?;
    }
    std::fs::rename(&staged, dst)
        .with_context(|| format!("failed to move staged database to {}", dst.display()))
}

/// Restore a bundle (or a bare SQLite file) into `workspace_path`,
/// replacing any existing database.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path)
        .with_context(|| format!("failed to create workspace {}", workspace_path.display()))?;
    let dst = workspace_path.join(DB_FILE_NAME);

    if read_magic::<4>(in_path)? != Some(ZIP_MAGIC) {
        stage_database(in_path, &dst, |out| {
            let mut src = File::open(in_path)
                .with_context(|| format!("failed to open {}", in_path.display()))?;
            std::io::copy(&mut src, out).context("failed to copy sqlite file")?;
            Ok(())
        })?;
        return Ok(ImportSummary {
            bundle_format_detected: RAW_SQLITE_FORMAT.to_string(),
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.display()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if format != BUNDLE_FORMAT_V1 {
        bail!("unsupported bundle format: {format:?}");
    }

    stage_database(in_path, &dst, |out| {
        let mut entry = archive
            .by_name(DB_ENTRY)
            .with_context(|| format!("bundle missing {DB_ENTRY}"))?;
        std::io::copy(&mut entry, out).context("failed to extract database entry")?;
        Ok(())
    })?;

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
    })
}
