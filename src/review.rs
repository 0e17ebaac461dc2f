use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::ledger::Ledger;
use crate::model::Message;
use crate::store::KvStore;

pub const DEFAULT_FADE_DELAY: Duration = Duration::from_secs(5);

/// Interactive view over the messages still being worked on.
///
/// Once every link of a visible message is classified, the message is
/// announced and a timer is started; when it fires, the message id is sent
/// on the channel returned by [`Review::new`] and the caller removes it.
/// Dropping the view aborts all pending timers.
pub struct Review {
    visible: Vec<Message>,
    fading: HashMap<String, JoinHandle<()>>,
    delay: Duration,
    faded_tx: mpsc::UnboundedSender<String>,
}

impl Review {
    pub fn new(messages: Vec<Message>, delay: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (faded_tx, faded_rx) = mpsc::unbounded_channel();
        let review = Review {
            visible: messages,
            fading: HashMap::new(),
            delay,
            faded_tx,
        };
        (review, faded_rx)
    }

    /// Start a fade for each visible message that just became fully
    /// processed. Returns the ids scheduled by this call.
    pub fn refresh<S: KvStore>(&mut self, ledger: &Ledger<S>) -> Vec<String> {
        let ready: Vec<String> = self
            .visible
            .iter()
            .filter(|m| !self.fading.contains_key(&m.id) && ledger.all_processed(m))
            .map(|m| m.id.clone())
            .collect();

        for id in &ready {
            self.schedule(id);
        }
        ready
    }

    fn schedule(&mut self, id: &str) {
        let tx = self.faded_tx.clone();
        let delay = self.delay;
        let message_id = id.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message_id);
        });

        debug!(message_id = id, delay_ms = delay.as_millis() as u64, "fade scheduled");
        self.fading.insert(id.to_string(), handle);
    }

    /// Drop a faded message from the view.
    pub fn remove(&mut self, id: &str) -> Option<Message> {
        self.fading.remove(id);
        let pos = self.visible.iter().position(|m| m.id == id)?;
        Some(self.visible.remove(pos))
    }

    pub fn is_fading(&self, id: &str) -> bool {
        self.fading.contains_key(id)
    }

    pub fn pending_fades(&self) -> usize {
        self.fading.len()
    }

    pub fn visible(&self) -> &[Message] {
        &self.visible
    }
}

impl Drop for Review {
    fn drop(&mut self) {
        for (_, handle) in self.fading.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DEFAULT_KEY;
    use crate::store::MemoryStore;

    fn message(id: &str, content: &str) -> Message {
        Message {
            id: id.into(),
            author_id: "1".into(),
            author: "alice".into(),
            date: "2024-01-01".into(),
            content: content.into(),
        }
    }

    fn fixture() -> Vec<Message> {
        vec![
            message("msg-0", "https://a.io and https://b.io"),
            message("msg-1", "nothing to see"),
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn fades_after_delay_once_all_links_classified() {
        let mut ledger = Ledger::open(MemoryStore::new(), DEFAULT_KEY);
        let (mut review, mut faded) = Review::new(fixture(), DEFAULT_FADE_DELAY);

        ledger.classify("msg-0", "https://a.io", "Spam").unwrap();
        assert!(review.refresh(&ledger).is_empty());

        ledger.classify("msg-0", "https://b.io", "Spam").unwrap();
        let start = tokio::time::Instant::now();
        assert_eq!(review.refresh(&ledger), vec!["msg-0"]);
        assert!(review.is_fading("msg-0"));
        assert!(review.refresh(&ledger).is_empty());

        let early = tokio::time::timeout(Duration::from_secs(4), faded.recv()).await;
        assert!(early.is_err());

        let id = faded.recv().await.unwrap();
        assert_eq!(id, "msg-0");
        assert!(start.elapsed() >= DEFAULT_FADE_DELAY);

        assert_eq!(review.remove(&id).unwrap().id, "msg-0");
        assert_eq!(review.visible().len(), 1);
        assert_eq!(review.pending_fades(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn message_without_links_never_fades() {
        let ledger = Ledger::open(MemoryStore::new(), DEFAULT_KEY);
        let (mut review, _faded) = Review::new(vec![message("msg-1", "plain")], DEFAULT_FADE_DELAY);
        assert!(review.refresh(&ledger).is_empty());
        assert!(!review.is_fading("msg-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_view_cancels_timers() {
        let mut ledger = Ledger::open(MemoryStore::new(), DEFAULT_KEY);
        let (mut review, mut faded) = Review::new(fixture(), DEFAULT_FADE_DELAY);
        ledger.classify("msg-0", "https://a.io", "Spam").unwrap();
        ledger.classify("msg-0", "https://b.io", "Spam").unwrap();
        review.refresh(&ledger);

        drop(review);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(faded.recv().await, None);
    }
}
