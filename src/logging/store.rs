//! This module provides the in-memory store for client-side log entries.
//!
//! The `LogStore` keeps the ordered sequence of entries, assigns ids and
//! timestamps, and pushes a fresh snapshot to every observer whenever the
//! sequence changes.
use crate::types::{capture_stack, iso_timestamp, LogEntry, LogFilter, LogLevel, Metadata};
use chrono::Utc;
use parking_lot::{Mutex, ReentrantMutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, error, info, trace, warn};

/// Target used when mirroring entries to the diagnostic log.
pub const MIRROR_TARGET: &str = "client_log";

/// A callback receiving the full sequence after every change.
pub type Observer = Arc<dyn Fn(Vec<LogEntry>) + Send + Sync>;

/// Shared handle to the client-side log store.
///
/// Cloning is cheap; all clones refer to the same sequence.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<LogStoreInner>,
}

struct LogStoreInner {
    /// The entries and the id counter.
    state: Mutex<StoreState>,
    /// Registered observers, in registration order.
    observers: Mutex<Vec<(u64, Observer)>>,
    /// Source of observer ids.
    next_observer_id: AtomicU64,
    /// Serializes mutation and fan-out. Re-entrant so observers may call back
    /// into the store.
    dispatch: ReentrantMutex<()>,
    /// Maximum number of retained entries, `None` for unbounded.
    capacity: Option<usize>,
}

struct StoreState {
    entries: VecDeque<LogEntry>,
    counter: u64,
}

impl LogStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Creates a store that keeps at most `capacity` entries, evicting the
    /// oldest first. `None` or `Some(0)` means unbounded.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        let capacity = capacity.filter(|max| *max > 0);
        Self {
            inner: Arc::new(LogStoreInner {
                state: Mutex::new(StoreState {
                    entries: VecDeque::with_capacity(capacity.unwrap_or(0).min(1024)),
                    counter: 0,
                }),
                observers: Mutex::new(Vec::new()),
                next_observer_id: AtomicU64::new(1),
                dispatch: ReentrantMutex::new(()),
                capacity,
            }),
        }
    }

    /// Appends a new entry and notifies every observer.
    ///
    /// Returns the created entry. The entry is also mirrored to the
    /// diagnostic log as `[LEVEL] action: message`.
    pub fn submit(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        action: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> LogEntry {
        let _dispatch = self.inner.dispatch.lock();

        let entry = {
            let mut state = self.inner.state.lock();
            state.counter += 1;

            let now = Utc::now();
            let entry = LogEntry {
                id: format!("log-{}-{}", state.counter, now.timestamp_millis()),
                timestamp: iso_timestamp(now),
                level,
                message: message.into(),
                action: action.into(),
                metadata,
                stack: capture_stack(),
            };

            if let Some(capacity) = self.inner.capacity {
                while state.entries.len() >= capacity {
                    state.entries.pop_front();
                }
            }
            state.entries.push_back(entry.clone());
            entry
        };

        mirror(&entry);
        self.notify();
        entry
    }

    pub fn info(
        &self,
        message: impl Into<String>,
        action: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> LogEntry {
        self.submit(LogLevel::Info, message, action, metadata)
    }

    pub fn warn(
        &self,
        message: impl Into<String>,
        action: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> LogEntry {
        self.submit(LogLevel::Warn, message, action, metadata)
    }

    pub fn error(
        &self,
        message: impl Into<String>,
        action: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> LogEntry {
        self.submit(LogLevel::Error, message, action, metadata)
    }

    pub fn debug(
        &self,
        message: impl Into<String>,
        action: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> LogEntry {
        self.submit(LogLevel::Debug, message, action, metadata)
    }

    pub fn trace(
        &self,
        message: impl Into<String>,
        action: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> LogEntry {
        self.submit(LogLevel::Trace, message, action, metadata)
    }

    /// Registers an observer.
    ///
    /// The observer is called once right away with the current snapshot and
    /// then after every `submit` or `clear` until the returned subscription
    /// is cancelled.
    #[must_use = "dropping the subscription unregisters the observer"]
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Vec<LogEntry>) + Send + Sync + 'static,
    {
        let _dispatch = self.inner.dispatch.lock();

        let id = self.inner.next_observer_id.fetch_add(1, Ordering::Relaxed);
        let observer: Observer = Arc::new(observer);
        self.inner.observers.lock().push((id, observer.clone()));

        observer(self.snapshot());

        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    /// Empties the sequence, restarts id numbering and notifies observers
    /// with an empty snapshot.
    pub fn clear(&self) {
        let _dispatch = self.inner.dispatch.lock();
        {
            let mut state = self.inner.state.lock();
            state.entries.clear();
            state.counter = 0;
        }
        debug!(target: MIRROR_TARGET, "Client log cleared");
        self.notify();
    }

    /// Returns a copy of the current sequence, oldest first.
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.inner.state.lock().entries.iter().cloned().collect()
    }

    /// Returns the entries matching `filter`, oldest first.
    pub fn filtered(&self, filter: &LogFilter) -> Vec<LogEntry> {
        self.inner
            .state
            .lock()
            .entries
            .iter()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// The configured bound, `None` when unbounded.
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Number of currently registered observers.
    pub fn observer_count(&self) -> usize {
        self.inner.observers.lock().len()
    }

    /// Calls every live observer with the snapshot current at call time.
    ///
    /// Must be called with the dispatch lock held.
    fn notify(&self) {
        let ids: Vec<u64> = self
            .inner
            .observers
            .lock()
            .iter()
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            // An earlier observer may have cancelled this one.
            let observer = self
                .inner
                .observers
                .lock()
                .iter()
                .find(|(observer_id, _)| *observer_id == id)
                .map(|(_, observer)| observer.clone());

            if let Some(observer) = observer {
                observer(self.snapshot());
            }
        }
    }
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`LogStore::subscribe`].
///
/// Dropping the handle removes the observer, same as [`Subscription::unsubscribe`].
pub struct Subscription {
    store: Weak<LogStoreInner>,
    id: u64,
}

impl Subscription {
    /// Removes the observer. It receives no notification after this returns.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.store.upgrade() {
            let _dispatch = inner.dispatch.lock();
            inner
                .observers
                .lock()
                .retain(|(observer_id, _)| *observer_id != self.id);
        }
    }
}

/// Echoes an entry to the diagnostic log. Never fails.
fn mirror(entry: &LogEntry) {
    let metadata = entry
        .metadata
        .as_ref()
        .and_then(|metadata| serde_json::to_string(metadata).ok())
        .unwrap_or_default();
    let level = entry.level.as_str().to_uppercase();

    match entry.level {
        LogLevel::Info => info!(target: MIRROR_TARGET, "[{}] {}: {} {}", level, entry.action, entry.message, metadata),
        LogLevel::Warn => warn!(target: MIRROR_TARGET, "[{}] {}: {} {}", level, entry.action, entry.message, metadata),
        LogLevel::Error => error!(target: MIRROR_TARGET, "[{}] {}: {} {}", level, entry.action, entry.message, metadata),
        LogLevel::Debug => debug!(target: MIRROR_TARGET, "[{}] {}: {} {}", level, entry.action, entry.message, metadata),
        LogLevel::Trace => trace!(target: MIRROR_TARGET, "[{}] {}: {} {}", level, entry.action, entry.message, metadata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    fn recorder() -> (Arc<Mutex<Vec<Vec<LogEntry>>>>, impl Fn(Vec<LogEntry>) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |entries| sink.lock().push(entries))
    }

    fn meta(value: serde_json::Value) -> Option<Metadata> {
        value.as_object().cloned()
    }

    #[test]
    fn test_submit_preserves_order_and_metadata() {
        let store = LogStore::new();

        store.submit(LogLevel::Info, "A", "act1", None);
        store.submit(LogLevel::Error, "B", "act2", meta(json!({ "code": 7 })));

        let entries = store.snapshot();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].message, "A");
        assert_eq!(entries[0].action, "act1");
        assert_eq!(entries[1].message, "B");
        assert_eq!(entries[1].level, LogLevel::Error);
        assert_eq!(entries[1].metadata.as_ref().unwrap()["code"], json!(7));
    }

    #[test]
    fn test_length_tracks_submits_since_clear() {
        let store = LogStore::new();
        for i in 0..5 {
            store.info(format!("msg {}", i), "count", None);
        }
        assert_eq!(store.len(), 5);

        store.clear();
        assert!(store.is_empty());

        store.warn("again", "count", None);
        store.warn("again", "count", None);
        assert_eq!(store.snapshot().len(), 2);
    }

    #[test]
    fn test_ids_are_distinct_and_restart_after_clear() {
        let store = LogStore::new();
        let ids: HashSet<String> = (0..50)
            .map(|_| store.debug("x", "ids", None).id)
            .collect();
        assert_eq!(ids.len(), 50);

        store.clear();
        let first = store.info("after", "ids", None);
        assert!(first.id.starts_with("log-1-"));
    }

    #[test]
    fn test_level_wrappers() {
        let store = LogStore::new();
        let metadata = meta(json!({ "k": [1, "two", null], "nested": { "ok": true } }));

        let created = vec![
            (LogLevel::Info, store.info("m", "a", metadata.clone())),
            (LogLevel::Warn, store.warn("m", "a", metadata.clone())),
            (LogLevel::Error, store.error("m", "a", metadata.clone())),
            (LogLevel::Debug, store.debug("m", "a", metadata.clone())),
            (LogLevel::Trace, store.trace("m", "a", metadata.clone())),
        ];

        assert_eq!(store.len(), 5);
        for (level, entry) in created {
            assert_eq!(entry.level, level);
            assert_eq!(entry.message, "m");
            assert_eq!(entry.action, "a");
            assert_eq!(entry.metadata, metadata);
        }
    }

    #[test]
    fn test_subscribe_receives_current_snapshot_immediately() {
        let store = LogStore::new();
        store.info("before", "sub", None);

        let (seen, observer) = recorder();
        let _subscription = store.subscribe(observer);

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[0][0].message, "before");
    }

    #[test]
    fn test_observers_see_every_change() {
        let store = LogStore::new();
        let (seen, observer) = recorder();
        let _subscription = store.subscribe(observer);

        store.info("one", "obs", None);
        store.info("two", "obs", None);
        store.clear();

        let lengths: Vec<usize> = seen.lock().iter().map(Vec::len).collect();
        assert_eq!(lengths, vec![0, 1, 2, 0]);
    }

    #[test]
    fn test_clear_on_empty_store_still_notifies() {
        let store = LogStore::new();
        let (seen, observer) = recorder();
        let _subscription = store.subscribe(observer);

        store.clear();

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert!(seen[1].is_empty());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let store = LogStore::new();
        let (seen, observer) = recorder();
        let subscription = store.subscribe(observer);
        let (other_seen, other) = recorder();
        let _other = store.subscribe(other);

        subscription.unsubscribe();
        store.info("ignored", "unsub", None);
        store.clear();

        assert_eq!(seen.lock().len(), 1);
        assert_eq!(other_seen.lock().len(), 3);
        assert_eq!(store.observer_count(), 1);
    }

    #[test]
    fn test_dropping_subscription_unregisters() {
        let store = LogStore::new();
        let (seen, observer) = recorder();
        let subscription = store.subscribe(observer);
        assert_eq!(store.observer_count(), 1);

        drop(subscription);
        store.info("after drop", "drop", None);

        assert_eq!(store.observer_count(), 0);
        assert_eq!(seen.lock().len(), 1);
    }

    #[test]
    fn test_subscription_outliving_store() {
        let store = LogStore::new();
        let subscription = store.subscribe(|_| {});
        drop(store);
        subscription.unsubscribe();
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let store = LogStore::new();
        store.info("original", "copy", None);

        let mut first = store.snapshot();
        first[0].message = "changed".into();
        first.clear();

        let second = store.snapshot();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message, "original");
        assert_eq!(store.snapshot(), second);
    }

    #[test]
    fn test_capacity_evicts_oldest_first() {
        let store = LogStore::with_capacity(Some(3));
        for i in 1..=4 {
            store.info(format!("msg {}", i), "cap", None);
        }

        let entries = store.snapshot();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].message, "msg 2");
        assert_eq!(entries[2].message, "msg 4");
        assert_eq!(store.capacity(), Some(3));
        assert_eq!(LogStore::with_capacity(Some(0)).capacity(), None);
    }

    #[test]
    fn test_filtered_by_level_and_action() {
        let store = LogStore::new();
        store.info("a", "USER_OPERATION", None);
        store.error("b", "DB_QUERY", None);
        store.info("c", "DB_QUERY", None);

        assert_eq!(store.filtered(&LogFilter::All).len(), 3);
        assert_eq!(store.filtered(&LogFilter::Level(LogLevel::Info)).len(), 2);
        let db = store.filtered(&LogFilter::Action("DB_QUERY".into()));
        assert_eq!(db.len(), 2);
        assert_eq!(db[0].message, "b");
    }

    #[test]
    fn test_observer_may_submit_without_deadlock() {
        let store = LogStore::new();
        let inner = store.clone();
        let _subscription = store.subscribe(move |entries| {
            if entries.last().map(|e| e.action.as_str()) == Some("trigger") {
                inner.info("echo", "reply", None);
            }
        });

        store.info("go", "trigger", None);

        let actions: Vec<String> = store.snapshot().into_iter().map(|e| e.action).collect();
        assert_eq!(actions, vec!["trigger", "reply"]);
    }

    #[test]
    fn test_concurrent_submits_are_all_retained() {
        let store = LogStore::new();
        let (seen, observer) = recorder();
        let _subscription = store.subscribe(observer);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        store.info(format!("{}-{}", t, i), "threads", None);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 100);
        let lengths: Vec<usize> = seen.lock().iter().map(Vec::len).collect();
        assert!(lengths.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(lengths.last(), Some(&100));
    }
}
