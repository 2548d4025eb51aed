//! Bounded sink for recent relay output.
//!
//! The buffer keeps the most recent `capacity` lines in a ring and fans new lines out over
//! a `tokio::broadcast` channel. Readers copy entries under a short lock; no IO happens
//! while the lock is held, so a slow reader never stalls the drain task.
//!
//! Writer and readers share one `std::sync::Mutex`. An `append` can wait for a reader
//! that is mid-copy, bounded by cloning at most `capacity` entries; it never waits on a
//! reader's IO or on a lagging subscriber.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::broadcast;

use crate::model::{LogEntry, LogId};

/// Number of lines retained when no capacity is configured.
pub const DEFAULT_LOG_CAPACITY: usize = 25;

/// Shared, append-only buffer of recent relay lines.
#[derive(Clone)]
pub struct LogBuffer {
    sender: broadcast::Sender<LogEntry>,
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl LogBuffer {
    /// Construct a buffer retaining at most `capacity` lines.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "log buffer capacity must be positive");
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity,
        }
    }

    /// Construct a buffer with [`DEFAULT_LOG_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// Maximum number of retained lines.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a line, evicting the oldest entry when full.
    pub fn append(&self, line: impl Into<String>) -> LogId {
        let mut entries = self.lock();
        // Assigned under the lock so ids and ring order agree.
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = LogEntry {
            id,
            timestamp: Utc::now(),
            line: line.into(),
        };
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        drop(entries);

        let _ = self.sender.send(entry);
        id
    }

    /// Retained entries, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    /// Retained entries with an id greater than `since`, oldest first.
    #[must_use]
    pub fn since(&self, since: LogId) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .filter(|entry| entry.id > since)
            .cloned()
            .collect()
    }

    /// Subscribe to new lines, replaying retained entries newer than `since` first.
    #[must_use]
    pub fn subscribe(&self, since: Option<LogId>) -> LogStream {
        // Subscribe before copying the backlog so no line falls between the two.
        let receiver = self.sender.subscribe();
        let backlog: VecDeque<LogEntry> = since.map_or_else(VecDeque::new, |cursor| {
            self.since(cursor).into_iter().collect()
        });
        let cursor = backlog.back().map_or(since.unwrap_or(0), |entry| entry.id);
        LogStream {
            backlog,
            receiver,
            cursor,
        }
    }

    /// Drop retained entries. Identifiers keep increasing across clears.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Identifier of the newest retained entry.
    #[must_use]
    pub fn last_id(&self) -> Option<LogId> {
        self.lock().back().map(|entry| entry.id)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of log entries: replayed backlog first, then live lines.
pub struct LogStream {
    backlog: VecDeque<LogEntry>,
    receiver: broadcast::Receiver<LogEntry>,
    cursor: LogId,
}

impl LogStream {
    /// Receive the next entry. Returns `None` once the buffer is dropped.
    ///
    /// When the subscriber falls behind, the skipped lines are lost and delivery resumes
    /// with the oldest line still queued.
    pub async fn next(&mut self) -> Option<LogEntry> {
        if let Some(entry) = self.backlog.pop_front() {
            return Some(entry);
        }

        loop {
            match self.receiver.recv().await {
                Ok(entry) if entry.id <= self.cursor => {}
                Ok(entry) => {
                    self.cursor = entry.id;
                    return Some(entry);
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    const RECV_TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn snapshot_keeps_last_capacity_entries() {
        let buffer = LogBuffer::with_capacity(3);
        for index in 0..5 {
            buffer.append(format!("line {index}"));
        }
        let lines: Vec<String> = buffer.snapshot().into_iter().map(|entry| entry.line).collect();
        assert_eq!(lines, vec!["line 2", "line 3", "line 4"]);
        assert_eq!(buffer.last_id(), Some(5));
    }

    #[test]
    fn never_exceeds_capacity() {
        let buffer = LogBuffer::with_capacity(25);
        for index in 0..100 {
            buffer.append(index.to_string());
            assert!(buffer.snapshot().len() <= 25);
        }
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 25);
        assert_eq!(snapshot.first().map(|entry| entry.id), Some(76));
        assert!(snapshot.windows(2).all(|pair| pair[0].id + 1 == pair[1].id));
    }

    #[test]
    fn since_filters_by_cursor() {
        let buffer = LogBuffer::with_capacity(10);
        for index in 0..4 {
            buffer.append(format!("line {index}"));
        }
        let newer = buffer.since(2);
        assert_eq!(newer.iter().map(|entry| entry.id).collect::<Vec<_>>(), vec![3, 4]);
        assert!(buffer.since(4).is_empty());
    }

    #[test]
    fn clear_keeps_ids_monotonic() {
        let buffer = LogBuffer::with_capacity(4);
        buffer.append("before");
        buffer.clear();
        assert!(buffer.snapshot().is_empty());
        assert_eq!(buffer.last_id(), None);
        assert_eq!(buffer.append("after"), 2);
    }

    #[test]
    fn append_progresses_alongside_readers() {
        let buffer = LogBuffer::with_capacity(25);
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buffer = buffer.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(buffer.snapshot().len() <= 25);
                        let _ = buffer.since(0);
                    }
                })
            })
            .collect();

        for index in 0..1_000 {
            buffer.append(format!("line {index}"));
        }
        for reader in readers {
            reader.join().expect("reader thread");
        }
        assert_eq!(buffer.last_id(), Some(1_000));
        assert_eq!(buffer.snapshot().len(), 25);
    }

    #[test]
    #[should_panic(expected = "capacity must be positive")]
    fn zero_capacity_is_rejected() {
        let _ = LogBuffer::with_capacity(0);
    }

    #[tokio::test]
    async fn subscribe_replays_then_follows() {
        let buffer = LogBuffer::with_capacity(8);
        buffer.append("one");
        buffer.append("two");

        let mut stream = buffer.subscribe(Some(1));
        buffer.append("three");

        let mut lines = Vec::new();
        for _ in 0..2 {
            let entry = timeout(RECV_TIMEOUT, stream.next())
                .await
                .expect("entry in time")
                .expect("stream open");
            lines.push(entry.line);
        }
        assert_eq!(lines, vec!["two", "three"]);
    }

    #[tokio::test]
    async fn subscriber_without_cursor_sees_only_new_lines() {
        let buffer = LogBuffer::with_capacity(8);
        buffer.append("old");
        let mut stream = buffer.subscribe(None);
        buffer.append("new");

        let entry = timeout(RECV_TIMEOUT, stream.next())
            .await
            .expect("entry in time")
            .expect("stream open");
        assert_eq!(entry.line, "new");
    }
}
