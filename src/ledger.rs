use std::collections::HashSet;
use std::io;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::export::{self, ExportBatch};
use crate::model::{LedgerEntry, Message};
use crate::parser::links;
use crate::store::KvStore;

/// Storage key the ledger lives under unless configured otherwise.
pub const DEFAULT_KEY: &str = "deletedLinks";

/// Classified links, in append order, mirrored to a durable store.
///
/// Every mutation is written through to the store; a failed write leaves
/// the in-memory state as it was.
pub struct Ledger<S> {
    store: S,
    key: String,
    entries: Vec<LedgerEntry>,
    links: HashSet<String>,
}

impl<S: KvStore> Ledger<S> {
    /// Load the ledger stored under `key`. Missing or unreadable state starts
    /// an empty ledger rather than failing.
    pub fn open(store: S, key: &str) -> Self {
        let entries = match store.load(key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<LedgerEntry>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(key, error = %e, "stored ledger is not valid JSON, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(key, error = %e, "failed to load ledger, starting empty");
                Vec::new()
            }
        };

        let links = entries.iter().map(|e| e.link.clone()).collect();
        debug!(key, entries = entries.len(), "ledger loaded");

        Ledger {
            store,
            key: key.to_string(),
            entries,
            links,
        }
    }

    pub fn is_processed(&self, link: &str) -> bool {
        self.links.contains(link)
    }

    /// True once the message has links and every one of them is classified.
    pub fn all_processed(&self, message: &Message) -> bool {
        let found = links::extract(&message.content);
        !found.is_empty() && found.iter().all(|link| self.is_processed(link))
    }

    /// Messages still needing attention, in input order. Messages without
    /// links stay here for good.
    pub fn unprocessed_messages<'a>(&self, messages: &'a [Message]) -> Vec<&'a Message> {
        messages.iter().filter(|m| !self.all_processed(m)).collect()
    }

    pub fn processed_messages<'a>(&self, messages: &'a [Message]) -> Vec<&'a Message> {
        messages.iter().filter(|m| self.all_processed(m)).collect()
    }

    /// Distinct links of `message` not yet classified, in order of appearance.
    pub fn pending_links(&self, message: &Message) -> Vec<String> {
        let mut seen = HashSet::new();
        links::extract(&message.content)
            .into_iter()
            .filter(|link| !self.is_processed(link) && seen.insert(link.clone()))
            .collect()
    }

    /// Record a classification for `link`, stamped with the current time.
    /// A link can be classified only once.
    pub fn classify(
        &mut self,
        message_id: &str,
        link: &str,
        reason: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        if self.is_processed(link) {
            return Err(LedgerError::DuplicateClassification(link.to_string()));
        }

        let entry = LedgerEntry {
            message_id: message_id.to_string(),
            link: link.to_string(),
            reason: reason.to_string(),
            deletion_time: export::iso_timestamp(Utc::now()),
        };

        self.entries.push(entry.clone());
        if let Err(e) = self.persist() {
            self.entries.pop();
            return Err(e);
        }
        self.links.insert(entry.link.clone());

        info!(message_id, link, reason, "link classified");
        Ok(entry)
    }

    /// Export and clear the ledger.
    pub fn export(&mut self) -> Result<ExportBatch, LedgerError> {
        self.export_with(|_| Ok(()))
    }

    /// Serialize the ledger, hand it to `deliver`, and clear both the store
    /// and memory only once delivery succeeded. If the store cannot be
    /// cleared afterwards, `Reset` names the delivered file and the entries
    /// are kept.
    pub fn export_with<F>(&mut self, deliver: F) -> Result<ExportBatch, LedgerError>
    where
        F: FnOnce(&ExportBatch) -> io::Result<()>,
    {
        let batch = ExportBatch::build(&self.entries, Utc::now())?;
        deliver(&batch).map_err(LedgerError::Delivery)?;

        if let Err(source) = self.store.remove(&self.key) {
            warn!(file = %batch.file_name, error = %source, "export delivered but ledger not cleared");
            return Err(LedgerError::Reset {
                file_name: batch.file_name,
                source,
            });
        }
        self.entries.clear();
        self.links.clear();

        info!(count = batch.count, file = %batch.file_name, "ledger exported and cleared");
        Ok(batch)
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<(), LedgerError> {
        let raw = serde_json::to_string(&self.entries)?;
        self.store.save(&self.key, &raw)?;
        Ok(())
    }
}
