//! Fixed-capacity chat history.

use std::collections::VecDeque;

use blockbot_types::{ChatRecord, MessageId};
use tokio::sync::Mutex;

/// Ring buffer of the most recent chat records.
///
/// When full, pushing a record evicts the oldest one.
#[derive(Debug)]
pub struct ChatLog {
    inner: Mutex<Ring>,
}

#[derive(Debug)]
struct Ring {
    capacity: usize,
    records: VecDeque<ChatRecord>,
}

impl Ring {
    fn evict(&mut self) {
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
    }
}

impl ChatLog {
    /// Create an empty log holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Ring {
                capacity,
                records: VecDeque::with_capacity(capacity),
            }),
        }
    }

    /// Append a record, returning its ID.
    pub async fn push(&self, record: ChatRecord) -> MessageId {
        let id = record.id;
        let mut ring = self.inner.lock().await;
        ring.records.push_back(record);
        ring.evict();
        id
    }

    /// All records, oldest first.
    pub async fn history(&self) -> Vec<ChatRecord> {
        self.inner.lock().await.records.iter().cloned().collect()
    }

    /// Up to `n` records, newest first.
    pub async fn recent(&self, n: usize) -> Vec<ChatRecord> {
        self.inner
            .lock()
            .await
            .records
            .iter()
            .rev()
            .take(n)
            .cloned()
            .collect()
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.records.is_empty()
    }

    /// Change the capacity, evicting the oldest records if it shrank.
    pub async fn set_capacity(&self, capacity: usize) {
        let mut ring = self.inner.lock().await;
        ring.capacity = capacity;
        ring.evict();
    }
}

#[cfg(test)]
mod tests {
    use blockbot_types::ChatOrigin;

    use super::*;

    fn line(n: usize) -> ChatRecord {
        ChatRecord::new(ChatOrigin::Player, "Steve", format!("line {n}"))
    }

    #[tokio::test]
    async fn evicts_oldest_when_full() {
        let log = ChatLog::new(3);
        for n in 0..5 {
            log.push(line(n)).await;
        }
        let history = log.history().await;
        let texts: Vec<&str> = history.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(texts, vec!["line 2", "line 3", "line 4"]);
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let log = ChatLog::new(50);
        for n in 0..4 {
            log.push(line(n)).await;
        }
        let recent = log.recent(2).await;
        let texts: Vec<&str> = recent.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(texts, vec!["line 3", "line 2"]);
    }

    #[tokio::test]
    async fn push_returns_record_id() {
        let log = ChatLog::new(5);
        let record = line(0);
        let expected = record.id;
        assert_eq!(log.push(record).await, expected);
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn shrinking_capacity_evicts() {
        let log = ChatLog::new(10);
        for n in 0..6 {
            log.push(line(n)).await;
        }
        log.set_capacity(2).await;
        assert_eq!(log.len().await, 2);
        assert!(!log.is_empty().await);
    }
}
