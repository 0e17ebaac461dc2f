use serde::{Deserialize, Serialize};

/// One normalized row from an imported CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub author_id: String,
    pub author: String,
    pub date: String, // as exported, not validated
    pub content: String,
}

/// A classified link as kept in the durable ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub message_id: String,
    pub link: String,
    pub reason: String,
    pub deletion_time: String, // ISO-8601 UTC, millisecond precision
}

/// The exported view of a ledger entry. `messageId` stays internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub link: String,
    pub reason: String,
    pub deletion_time: String,
}

impl From<&LedgerEntry> for ExportRecord {
    fn from(entry: &LedgerEntry) -> Self {
        ExportRecord {
            link: entry.link.clone(),
            reason: entry.reason.clone(),
            deletion_time: entry.deletion_time.clone(),
        }
    }
}

pub const OTHER_REASON: &str = "Other";

pub const DELETION_REASONS: &[&str] = &[
    "Spam",
    "Inappropriate Content",
    "Malicious Link",
    "Expired Link",
    "Broken Link",
    "Duplicate Content",
    "Copyright Violation",
    OTHER_REASON,
];

/// Resolve a reason choice into the text stored in the ledger.
///
/// `choice` is either a preset name (case-insensitive) or its 1-based number.
/// `Other` requires a non-empty `custom` text, which is what gets stored.
pub fn resolve_reason(choice: &str, custom: Option<&str>) -> Option<String> {
    let choice = choice.trim();
    let preset = match choice.parse::<usize>() {
        Ok(n) if n >= 1 => DELETION_REASONS.get(n - 1).copied(),
        Ok(_) => None,
        Err(_) => DELETION_REASONS
            .iter()
            .copied()
            .find(|r| r.eq_ignore_ascii_case(choice)),
    }?;

    if preset == OTHER_REASON {
        let custom = custom.map(str::trim).unwrap_or_default();
        if custom.is_empty() {
            return None;
        }
        return Some(custom.to_string());
    }
    Some(preset.to_string())
}
