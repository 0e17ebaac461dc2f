use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::ImportError;
use crate::model::Message;
use crate::parser::csv;

/// How imported records are identified across files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    /// Keep the parser's `msg-<index>`. Two files collide on every index.
    Positional,
    /// `msg-<hash>` over author id, date and content. Repeats of the same
    /// row within one file also hash their occurrence number.
    #[default]
    Content,
}

/// The message records loaded in the current session.
///
/// Files are parsed independently and appended in order; a record whose id
/// is already loaded is dropped, so the first import wins.
#[derive(Debug)]
pub struct Inbox {
    scheme: IdScheme,
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl Inbox {
    pub fn new(scheme: IdScheme) -> Self {
        Inbox {
            scheme,
            messages: Vec::new(),
            ids: HashSet::new(),
        }
    }

    /// Check, read, parse and append one file. Returns how many records were
    /// added. Nothing is added when any step fails.
    pub async fn import_file(&mut self, path: &Path) -> Result<usize, ImportError> {
        if !is_csv(path) {
            return Err(ImportError::InputType {
                path: path.to_path_buf(),
            });
        }

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ImportError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let parsed = csv::parse(&text)?;
        let total = parsed.len();
        let added = self.add_batch(parsed);

        info!(path = ?path, total, added, "imported CSV export");
        Ok(added)
    }

    /// Import several files in order; one outcome per file.
    pub async fn import_files(
        &mut self,
        paths: &[PathBuf],
    ) -> Vec<(PathBuf, Result<usize, ImportError>)> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let outcome = self.import_file(path).await;
            if let Err(e) = &outcome {
                warn!(path = ?path, error = %e, "import failed");
            }
            outcomes.push((path.clone(), outcome));
        }
        outcomes
    }

    /// Re-tag `batch` per the id scheme and append the records not yet seen.
    /// Identical rows inside one batch stay distinct records.
    pub fn add_batch(&mut self, batch: Vec<Message>) -> usize {
        let before = self.messages.len();
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        for mut message in batch {
            if self.scheme == IdScheme::Content {
                let base = content_id(&message, 0);
                let seen = occurrences.entry(base.clone()).or_insert(0);
                message.id = if *seen == 0 {
                    base
                } else {
                    content_id(&message, *seen)
                };
                *seen += 1;
            }
            if self.ids.insert(message.id.clone()) {
                self.messages.push(message);
            }
        }
        self.messages.len() - before
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn find(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn content_id(message: &Message, occurrence: usize) -> String {
    let mut hasher = Sha256::new();
    for part in [&message.author_id, &message.date, &message.content] {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    if occurrence > 0 {
        hasher.update(occurrence.to_string().as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("msg-{}", &digest[..12])
}
