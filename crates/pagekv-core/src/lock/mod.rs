//! Spin locks whose wait queues live in a key-value store.
//!
//! Lock state is a Flat List of requester ids under the lock identity
//! (`namespace:key`). The head of the list holds the lock; everyone else
//! polls until they reach the head or give up. Because the state lives in
//! the store, independent processes sharing that store coordinate through
//! it.
//!
//! Timeouts are fatal on the blocking entry points ([`SpinLock::lock`],
//! [`SpinRwLock::rlock`]): the waiter leaves the queue, then panics.
//! `try_*` variants return a `Timeout` error instead.

mod guard;

#[cfg(test)]
mod tests;

pub use guard::SpinLockGuard;

use crate::{
    config::LockConfig,
    error::InternalError,
    list::FlatList,
    obs::{MetricsEvent, MetricsSink, NoopSink},
    store::KeyValueStore,
};
use parking_lot::Mutex;
use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, warn};

/// Lock identity: `namespace:key`, or `key` alone without a namespace.
#[must_use]
pub fn lock_identity(namespace: Option<&str>, key: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{ns}:{key}"),
        _ => key.to_string(),
    }
}

///
/// SpinLock
///
/// Exclusive store-backed lock. Requester ids must be unique among
/// concurrent holders/waiters of one lock.
///
/// Queue mutations made through one handle are serialized in-process;
/// share a handle (it is `Sync`) rather than opening one per thread.
///

pub struct SpinLock {
    store: Arc<dyn KeyValueStore>,
    queue: FlatList<String>,
    config: LockConfig,
    sink: Arc<dyn MetricsSink>,
    mutate: Mutex<()>,
}

impl SpinLock {
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        namespace: Option<&str>,
        key: &str,
        config: LockConfig,
    ) -> Self {
        Self {
            store,
            queue: FlatList::new(lock_identity(namespace, key)),
            config,
            sink: Arc::new(NoopSink),
            mutate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Store key of the queue (`namespace:key`).
    #[must_use]
    pub fn identity(&self) -> &str {
        self.queue.key()
    }

    #[must_use]
    pub const fn config(&self) -> LockConfig {
        self.config
    }

    /// Block until `requester` holds the lock.
    ///
    /// # Panics
    /// When the configured timeout elapses first. The requester's queue
    /// position is released before panicking.
    pub fn lock(&self, requester: &str) -> Result<(), InternalError> {
        match self.try_lock(requester) {
            Err(err) if err.is_timeout() => panic!("{err}"),
            other => other,
        }
    }

    /// [`lock`](Self::lock), returning a `Timeout` error instead of panicking.
    pub fn try_lock(&self, requester: &str) -> Result<(), InternalError> {
        let started = Instant::now();
        let waiting = self.enqueue(requester)?;

        if !waiting {
            self.sink.record(MetricsEvent::LockWait { polls: 0 });
            return Ok(());
        }

        self.wait_for_head(requester, started, self.config.timeout)
    }

    /// Acquire and return a guard that unlocks on drop.
    pub fn guard(&self, requester: &str) -> Result<SpinLockGuard<'_>, InternalError> {
        self.lock(requester)?;

        Ok(SpinLockGuard::new(self, requester))
    }

    /// Leave the queue. Releasing a lock that is not held is a no-op.
    pub fn unlock(&self, requester: &str) -> Result<(), InternalError> {
        let _serial = self.mutate.lock();
        self.leave(requester)
    }

    /// Whether anyone holds or waits for the lock.
    pub fn is_locked(&self) -> Result<bool, InternalError> {
        Ok(!self.queue.is_empty(self.store.as_ref())?)
    }

    /// Current holder, if any.
    pub fn holder(&self) -> Result<Option<String>, InternalError> {
        self.queue.first(self.store.as_ref(), |_| true)
    }

    /// Queue contents, holder first.
    pub fn queued(&self) -> Result<Vec<String>, InternalError> {
        self.queue.get_all(self.store.as_ref())
    }

    // Append to the queue; returns whether the caller has to wait.
    fn enqueue(&self, requester: &str) -> Result<bool, InternalError> {
        let _serial = self.mutate.lock();
        let store = self.store.as_ref();

        self.queue.append(store, &requester.to_string())?;

        Ok(self.queue.count(store)? > 1)
    }

    fn is_head(&self, requester: &str) -> Result<bool, InternalError> {
        let _serial = self.mutate.lock();
        let head = self.queue.first(self.store.as_ref(), |_| true)?;

        Ok(head.as_deref() == Some(requester))
    }

    // Poll until `requester` heads the queue, leaving it on timeout.
    fn wait_for_head(
        &self,
        requester: &str,
        started: Instant,
        timeout: Duration,
    ) -> Result<(), InternalError> {
        let mut polls = 0u64;

        loop {
            if self.is_head(requester)? {
                debug!(
                    target: "pagekv::lock",
                    lock = %self.identity(),
                    requester,
                    polls,
                    "acquired after contention"
                );
                self.sink.record(MetricsEvent::LockWait { polls });
                return Ok(());
            }

            if started.elapsed() >= timeout {
                self.unlock(requester)?;
                return Err(self.timed_out(requester, "lock"));
            }

            thread::sleep(self.config.poll_interval);
            polls += 1;
        }
    }

    // Remove `requester`; drop vacated slots so newcomers queue at the tail,
    // and clear the bookkeeping entirely once the queue drains.
    fn leave(&self, requester: &str) -> Result<(), InternalError> {
        let store = self.store.as_ref();

        self.queue.remove(store, &requester.to_string())?;

        if self.queue.is_empty(store)? {
            self.queue.reset(store)
        } else {
            self.queue.discard_free(store)
        }
    }

    fn timed_out(&self, requester: &str, op: &str) -> InternalError {
        warn!(
            target: "pagekv::lock",
            lock = %self.identity(),
            requester,
            timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
            "{op} timed out"
        );
        self.sink.record(MetricsEvent::LockTimeout);

        InternalError::lock_timeout(format!(
            "spin {op} '{}' timed out after {:?} waiting for '{requester}'",
            self.identity(),
            self.config.timeout
        ))
    }
}

///
/// SpinRwLock
///
/// Store-backed shared/exclusive lock. Writers queue on an exclusive list
/// (one bucket); readers register in a read list (a second bucket).
///
/// - Readers wait only while the exclusive list is non-empty, so a queued
///   writer blocks new readers.
/// - A writer at the head of the exclusive list additionally waits for the
///   read list to drain before it returns.
/// - A reader registers, then re-checks the exclusive list and withdraws if
///   a writer slipped in, so a writer never waits on a reader that is
///   itself waiting.
///

pub struct SpinRwLock {
    exclusive: SpinLock,
    readers_store: Arc<dyn KeyValueStore>,
    readers: FlatList<String>,
    readers_mutate: Mutex<()>,
}

impl SpinRwLock {
    #[must_use]
    pub fn new(
        exclusive_store: Arc<dyn KeyValueStore>,
        readers_store: Arc<dyn KeyValueStore>,
        namespace: Option<&str>,
        key: &str,
        config: LockConfig,
    ) -> Self {
        Self {
            exclusive: SpinLock::new(exclusive_store, namespace, key, config),
            readers_store,
            readers: FlatList::new(lock_identity(namespace, key)),
            readers_mutate: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.exclusive = self.exclusive.with_sink(sink);
        self
    }

    #[must_use]
    pub fn identity(&self) -> &str {
        self.exclusive.identity()
    }

    /// Exclusive acquire.
    ///
    /// # Panics
    /// On timeout, after releasing the queue position.
    pub fn lock(&self, requester: &str) -> Result<(), InternalError> {
        match self.try_lock(requester) {
            Err(err) if err.is_timeout() => panic!("{err}"),
            other => other,
        }
    }

    pub fn try_lock(&self, requester: &str) -> Result<(), InternalError> {
        let started = Instant::now();
        let timeout = self.exclusive.config.timeout;

        self.exclusive.try_lock(requester)?;

        // Holding the queue head; now let active readers drain.
        loop {
            if self.readers.is_empty(self.readers_store.as_ref())? {
                return Ok(());
            }

            if started.elapsed() >= timeout {
                self.exclusive.unlock(requester)?;
                return Err(self.exclusive.timed_out(requester, "lock"));
            }

            thread::sleep(self.exclusive.config.poll_interval);
        }
    }

    pub fn unlock(&self, requester: &str) -> Result<(), InternalError> {
        self.exclusive.unlock(requester)
    }

    /// Shared acquire.
    ///
    /// # Panics
    /// On timeout. The requester is not left registered as a reader.
    pub fn rlock(&self, requester: &str) -> Result<(), InternalError> {
        match self.try_rlock(requester) {
            Err(err) if err.is_timeout() => panic!("{err}"),
            other => other,
        }
    }

    pub fn try_rlock(&self, requester: &str) -> Result<(), InternalError> {
        let started = Instant::now();
        let config = self.exclusive.config;
        let mut polls = 0u64;

        loop {
            if !self.exclusive.is_locked()? {
                self.register_reader(requester)?;

                // A writer may have queued between the check and the
                // registration; it waits for readers, so back off.
                if !self.exclusive.is_locked()? {
                    self.exclusive.sink.record(MetricsEvent::LockWait { polls });
                    return Ok(());
                }
                self.runlock(requester)?;
            }

            if started.elapsed() >= config.timeout {
                return Err(self.exclusive.timed_out(requester, "rlock"));
            }

            thread::sleep(config.poll_interval);
            polls += 1;
        }
    }

    pub fn runlock(&self, requester: &str) -> Result<(), InternalError> {
        let _serial = self.readers_mutate.lock();
        let store = self.readers_store.as_ref();

        self.readers.remove(store, &requester.to_string())?;
        if self.readers.is_empty(store)? {
            self.readers.reset(store)?;
        }

        Ok(())
    }

    fn register_reader(&self, requester: &str) -> Result<(), InternalError> {
        let _serial = self.readers_mutate.lock();
        self.readers
            .append(self.readers_store.as_ref(), &requester.to_string())?;

        Ok(())
    }

    /// Registered readers, in registration order.
    pub fn readers(&self) -> Result<Vec<String>, InternalError> {
        self.readers.get_all(self.readers_store.as_ref())
    }

    pub fn is_locked(&self) -> Result<bool, InternalError> {
        self.exclusive.is_locked()
    }

    pub fn holder(&self) -> Result<Option<String>, InternalError> {
        self.exclusive.holder()
    }
}
