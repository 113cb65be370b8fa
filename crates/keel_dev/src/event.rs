//! File change events and the queue that batches them.
//!
//! Events arrive on an `mpsc` channel from the watcher (or from a test).
//! The [`EventQueue`] coalesces them per path, so a burst of writes to one
//! file becomes a single change, and lets the engine peek at events that
//! arrive while a pass is running without starting a new pass.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::{Duration, Instant};

/// What happened to a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The file appeared.
    Created,
    /// The file's contents changed.
    Modified,
    /// The file disappeared.
    Deleted,
}

/// A single file change notification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// A creation event.
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Created,
        }
    }

    /// A modification event.
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Modified,
        }
    }

    /// A deletion event.
    pub fn deleted(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: ChangeKind::Deleted,
        }
    }
}

/// Result of waiting for a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// At least one change is pending and the debounce period has passed.
    Ready,
    /// Nothing arrived before the timeout.
    TimedOut,
    /// Every sender is gone and nothing is pending.
    Closed,
}

/// Creates a connected sender and queue.
pub fn channel() -> (Sender<ChangeEvent>, EventQueue) {
    let (tx, rx) = mpsc::channel();
    (tx, EventQueue::new(rx))
}

/// Pending file changes, coalesced per path.
pub struct EventQueue {
    rx: Receiver<ChangeEvent>,
    pending: BTreeMap<PathBuf, ChangeKind>,
    disconnected: bool,
}

impl EventQueue {
    /// Wraps the receiving end of an event channel.
    pub fn new(rx: Receiver<ChangeEvent>) -> Self {
        Self {
            rx,
            pending: BTreeMap::new(),
            disconnected: false,
        }
    }

    /// Moves every event already in the channel into the pending set
    /// without blocking. Returns the number of events received.
    pub fn poll(&mut self) -> usize {
        let mut received = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.push(event);
                    received += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        received
    }

    /// Adds an event to the pending set, merging it with any pending change
    /// to the same path.
    pub fn push(&mut self, event: ChangeEvent) {
        let merged = match (self.pending.get(&event.path), event.kind) {
            (_, ChangeKind::Deleted) => ChangeKind::Deleted,
            // Deleted and then recreated: the file is still there, with new contents.
            (Some(ChangeKind::Deleted), ChangeKind::Created) => ChangeKind::Modified,
            (Some(ChangeKind::Created), ChangeKind::Modified) => ChangeKind::Created,
            (_, kind) => kind,
        };
        self.pending.insert(event.path, merged);
    }

    /// Returns `true` if no change is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of pending changes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if a deletion of `path` is pending.
    pub fn is_deleted(&self, path: &Path) -> bool {
        self.pending.get(path) == Some(&ChangeKind::Deleted)
    }

    /// Returns `true` once every sender has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    /// Removes and returns every pending change, sorted by path.
    pub fn take_batch(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, kind)| ChangeEvent { path, kind })
            .collect()
    }

    /// Blocks until changes are pending and no new event has arrived for
    /// `debounce`, or until `timeout` passes with nothing pending.
    pub fn wait_batch(&mut self, debounce: Duration, timeout: Duration) -> Wait {
        self.poll();
        if self.pending.is_empty() {
            if self.disconnected {
                return Wait::Closed;
            }
            match self.rx.recv_timeout(timeout) {
                Ok(event) => self.push(event),
                Err(RecvTimeoutError::Timeout) => return Wait::TimedOut,
                Err(RecvTimeoutError::Disconnected) => {
                    self.disconnected = true;
                    return Wait::Closed;
                }
            }
        }

        let mut quiet_since = Instant::now();
        while !self.disconnected {
            let remaining = debounce.saturating_sub(quiet_since.elapsed());
            if remaining.is_zero() {
                break;
            }
            match self.rx.recv_timeout(remaining) {
                Ok(event) => {
                    self.push(event);
                    quiet_since = Instant::now();
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => self.disconnected = true,
            }
        }
        Wait::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bursts_coalesce_per_path() {
        let (tx, mut queue) = channel();
        tx.send(ChangeEvent::modified("/p/a.js")).unwrap();
        tx.send(ChangeEvent::modified("/p/a.js")).unwrap();
        tx.send(ChangeEvent::modified("/p/b.js")).unwrap();
        assert_eq!(queue.poll(), 3);
        assert_eq!(queue.len(), 2);
        let batch = queue.take_batch();
        assert_eq!(
            batch,
            vec![ChangeEvent::modified("/p/a.js"), ChangeEvent::modified("/p/b.js")]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn merge_rules() {
        let (_tx, mut queue) = channel();
        queue.push(ChangeEvent::created("/p/new.js"));
        queue.push(ChangeEvent::modified("/p/new.js"));
        queue.push(ChangeEvent::deleted("/p/gone.js"));
        queue.push(ChangeEvent::created("/p/gone.js"));
        queue.push(ChangeEvent::modified("/p/x.js"));
        queue.push(ChangeEvent::deleted("/p/x.js"));
        assert!(queue.is_deleted(Path::new("/p/x.js")));
        assert_eq!(
            queue.take_batch(),
            vec![
                ChangeEvent::modified("/p/gone.js"),
                ChangeEvent::created("/p/new.js"),
                ChangeEvent::deleted("/p/x.js"),
            ]
        );
    }

    #[test]
    fn wait_times_out_when_idle() {
        let (_tx, mut queue) = channel();
        let wait = queue.wait_batch(Duration::from_millis(1), Duration::from_millis(5));
        assert_eq!(wait, Wait::TimedOut);
    }

    #[test]
    fn wait_returns_pending_batch() {
        let (tx, mut queue) = channel();
        tx.send(ChangeEvent::modified("/p/a.js")).unwrap();
        let wait = queue.wait_batch(Duration::from_millis(5), Duration::from_secs(5));
        assert_eq!(wait, Wait::Ready);
        assert_eq!(queue.take_batch().len(), 1);
    }

    #[test]
    fn closed_after_senders_drop() {
        let (tx, mut queue) = channel();
        tx.send(ChangeEvent::modified("/p/a.js")).unwrap();
        drop(tx);
        // The last batch is still delivered.
        assert_eq!(
            queue.wait_batch(Duration::from_millis(1), Duration::from_secs(5)),
            Wait::Ready
        );
        queue.take_batch();
        assert_eq!(
            queue.wait_batch(Duration::from_millis(1), Duration::from_secs(5)),
            Wait::Closed
        );
    }
}
