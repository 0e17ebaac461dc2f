//! JSON Lines export of the ledger.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::model::{ExportRecord, LedgerEntry};

pub const CONTENT_TYPE: &str = "application/x-jsonlines";

/// A serialized export, ready to be delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBatch {
    pub file_name: String,
    pub payload: String,
    pub count: usize,
}

impl ExportBatch {
    pub fn build(entries: &[LedgerEntry], at: DateTime<Utc>) -> serde_json::Result<Self> {
        Ok(ExportBatch {
            file_name: file_name(at),
            payload: to_jsonl(entries)?,
            count: entries.len(),
        })
    }
}

/// `2024-05-01T12:00:00.000Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `processed-links-2024-05-01T12-00-00-000Z.jsonl`
pub fn file_name(at: DateTime<Utc>) -> String {
    let stamp = iso_timestamp(at).replace([':', '.'], "-");
    format!("processed-links-{}.jsonl", stamp)
}

/// One object per line, no enclosing array, no trailing newline.
pub fn to_jsonl(entries: &[LedgerEntry]) -> serde_json::Result<String> {
    let lines = entries
        .iter()
        .map(|entry| serde_json::to_string(&ExportRecord::from(entry)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(lines.join("\n"))
}

pub fn write_batch(dir: &Path, batch: &ExportBatch) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(&batch.file_name);
    fs::write(&path, &batch.payload)?;
    Ok(path)
}
