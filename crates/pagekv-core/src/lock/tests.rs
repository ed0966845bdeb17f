use crate::{
    config::LockConfig,
    lock::{SpinLock, SpinRwLock, lock_identity},
    obs::{CounterSink, MetricsSink},
    store::{KeyValueStore, MemoryStore},
};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

fn fast() -> LockConfig {
    LockConfig::new(Duration::from_millis(1), Duration::from_secs(5))
}

fn short_timeout() -> LockConfig {
    LockConfig::new(Duration::from_millis(1), Duration::from_millis(40))
}

fn spin_lock(config: LockConfig) -> (Arc<MemoryStore>, Arc<SpinLock>) {
    let store = Arc::new(MemoryStore::new());
    let lock = SpinLock::new(store.clone(), Some("test"), "resource", config);

    (store, Arc::new(lock))
}

fn rw_lock(config: LockConfig) -> Arc<SpinRwLock> {
    let exclusive: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let readers: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    Arc::new(SpinRwLock::new(
        exclusive,
        readers,
        Some("test"),
        "resource",
        config,
    ))
}

// Spin until `lock` reports `n` queued requesters.
fn wait_for_queue_len(lock: &SpinLock, n: usize) {
    let started = Instant::now();
    while lock.queued().unwrap().len() != n {
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "queue never reached {n}"
        );
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn identity_joins_namespace_and_key() {
    assert_eq!(lock_identity(Some("site"), "pages"), "site:pages");
    assert_eq!(lock_identity(None, "pages"), "pages");
    assert_eq!(lock_identity(Some(""), "pages"), "pages");
}

#[test]
fn uncontended_lock_is_immediate() {
    let (store, lock) = spin_lock(fast());

    lock.lock("a").unwrap();
    assert!(lock.is_locked().unwrap());
    assert_eq!(lock.holder().unwrap().as_deref(), Some("a"));
    assert!(store.get("test:resource__idx__0").unwrap().is_some());

    lock.unlock("a").unwrap();
    assert!(!lock.is_locked().unwrap());
    assert_eq!(lock.holder().unwrap(), None);
}

#[test]
fn unlock_without_holding_is_a_noop() {
    let (_, lock) = spin_lock(fast());

    lock.unlock("nobody").unwrap();
    assert!(!lock.is_locked().unwrap());
}

#[test]
fn waiters_acquire_in_arrival_order() {
    const WAITERS: usize = 4;

    let (_, lock) = spin_lock(fast());
    let order = Arc::new(Mutex::new(Vec::new()));

    lock.lock("holder").unwrap();

    let mut handles = Vec::new();
    for n in 0..WAITERS {
        let waiter = lock.clone();
        let order = order.clone();
        handles.push(thread::spawn(move || {
            let id = format!("w{n}");
            waiter.lock(&id).unwrap();
            order.lock().push(id.clone());
            waiter.unlock(&id).unwrap();
        }));

        // pin arrival order before spawning the next waiter
        wait_for_queue_len(&lock, n + 2);
    }

    lock.unlock("holder").unwrap();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: Vec<String> = (0..WAITERS).map(|n| format!("w{n}")).collect();
    assert_eq!(*order.lock(), expected);
    assert!(!lock.is_locked().unwrap());
}

#[test]
fn holders_never_overlap() {
    let (_, lock) = spin_lock(fast());
    let inside = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..6)
        .map(|n| {
            let lock = lock.clone();
            let inside = inside.clone();
            let peak = peak.clone();
            thread::spawn(move || {
                let id = format!("t{n}");
                for _ in 0..3 {
                    let guard = lock.guard(&id).unwrap();
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(1));
                    inside.fetch_sub(1, Ordering::SeqCst);
                    drop(guard);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert!(!lock.is_locked().unwrap());
}

#[test]
fn try_lock_timeout_leaves_the_queue() {
    let sink = Arc::new(CounterSink::new());
    let lock = SpinLock::new(
        Arc::new(MemoryStore::new()),
        None,
        "resource",
        short_timeout(),
    )
    .with_sink(sink.clone() as Arc<dyn MetricsSink>);

    lock.lock("a").unwrap();
    let err = lock.try_lock("b").unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(lock.queued().unwrap(), vec!["a"]);
    assert_eq!(lock.holder().unwrap().as_deref(), Some("a"));
    assert_eq!(sink.report().lock_timeouts, 1);

    // the holder is unaffected and the lock is reusable afterwards
    lock.unlock("a").unwrap();
    lock.lock("b").unwrap();
    assert_eq!(lock.holder().unwrap().as_deref(), Some("b"));
}

#[test]
#[should_panic(expected = "timed out")]
fn blocking_lock_panics_on_timeout() {
    let (_, lock) = spin_lock(short_timeout());

    lock.lock("a").unwrap();
    let _ = lock.lock("b");
}

#[test]
fn guard_unlocks_on_drop() {
    let (_, lock) = spin_lock(fast());

    {
        let guard = lock.guard("a").unwrap();
        assert_eq!(guard.requester(), "a");
        assert!(lock.is_locked().unwrap());
    }

    assert!(!lock.is_locked().unwrap());

    let guard = lock.guard("b").unwrap();
    guard.release().unwrap();
    assert!(!lock.is_locked().unwrap());
}

#[test]
fn vacated_slots_are_not_reused_while_queued() {
    let (_, lock) = spin_lock(fast());

    lock.lock("a").unwrap();
    let waiter = {
        let lock = lock.clone();
        thread::spawn(move || {
            lock.lock("b").unwrap();
            lock.unlock("b").unwrap();
        })
    };
    wait_for_queue_len(&lock, 2);

    lock.unlock("a").unwrap();
    waiter.join().unwrap();

    assert!(lock.queued().unwrap().is_empty());
}

// ---- rw ----------------------------------------------------------------

#[test]
fn readers_share_the_lock() {
    let lock = rw_lock(fast());

    lock.rlock("r1").unwrap();
    lock.rlock("r2").unwrap();
    assert_eq!(lock.readers().unwrap(), vec!["r1", "r2"]);
    assert!(!lock.is_locked().unwrap());

    lock.runlock("r1").unwrap();
    lock.runlock("r2").unwrap();
    assert!(lock.readers().unwrap().is_empty());
}

#[test]
fn writer_blocks_new_readers() {
    let lock = rw_lock(short_timeout());

    lock.lock("w").unwrap();
    let err = lock.try_rlock("r").unwrap_err();

    assert!(err.is_timeout());
    assert!(lock.readers().unwrap().is_empty());
    assert_eq!(lock.holder().unwrap().as_deref(), Some("w"));
}

#[test]
fn writer_times_out_while_readers_remain() {
    let lock = rw_lock(short_timeout());

    lock.rlock("r").unwrap();
    let err = lock.try_lock("w").unwrap_err();

    assert!(err.is_timeout());
    assert!(!lock.is_locked().unwrap());
    assert_eq!(lock.readers().unwrap(), vec!["r"]);
}

#[test]
fn writer_proceeds_once_readers_drain() {
    let lock = rw_lock(fast());
    lock.rlock("r").unwrap();

    let writer = {
        let lock = lock.clone();
        thread::spawn(move || {
            lock.lock("w").unwrap();
            let readers = lock.readers().unwrap();
            lock.unlock("w").unwrap();
            readers
        })
    };

    thread::sleep(Duration::from_millis(20));
    lock.runlock("r").unwrap();

    assert!(writer.join().unwrap().is_empty());
    assert!(!lock.is_locked().unwrap());
}

#[test]
#[should_panic(expected = "timed out")]
fn blocking_rlock_panics_on_timeout() {
    let lock = rw_lock(short_timeout());

    lock.lock("w").unwrap();
    let _ = lock.rlock("r");
}
