use kernel_sync::{SpinLock, SyncOnceCell};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

#[test]
fn guard_releases_on_drop() {
    let lock = SpinLock::new(0u32);

    {
        let mut guard = lock.lock();
        *guard = 7;
    }

    // a second lock succeeds only if the first guard unlocked
    assert_eq!(*lock.lock(), 7);
}

#[test]
fn try_lock_fails_while_held() {
    let lock = SpinLock::new('x');

    let held = lock.try_lock();
    assert!(held.is_some());
    assert!(lock.try_lock().is_none());

    drop(held);
    assert!(lock.try_lock().is_some());
}

#[test]
fn get_mut_bypasses_locking() {
    let mut lock = SpinLock::new(vec![1, 2]);
    lock.get_mut().push(3);
    assert_eq!(lock.into_inner(), vec![1, 2, 3]);
}

#[test]
fn contended_counter_is_exact() {
    const THREADS: usize = 4;
    const ITERS: usize = 10_000;

    let lock = Arc::new(SpinLock::new(0usize));
    let inside = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            thread::spawn(move || {
                for _ in 0..ITERS {
                    let mut guard = lock.lock();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    *guard += 1;
                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(*lock.lock(), THREADS * ITERS);
}

#[test]
fn once_cell_starts_unset() {
    let cell: SyncOnceCell<u32> = SyncOnceCell::new();
    assert!(!cell.is_set());
    assert_eq!(cell.get(), None);
}

#[test]
fn once_cell_accepts_exactly_one_value() {
    let cell = SyncOnceCell::new();
    assert_eq!(cell.set(1), Ok(()));
    assert_eq!(cell.set(2), Err(2));
    assert_eq!(cell.get(), Some(&1));
    assert!(cell.is_set());
}

#[test]
fn once_cell_racing_setters_produce_one_winner() {
    let cell = Arc::new(SyncOnceCell::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cell = Arc::clone(&cell);
            thread::spawn(move || cell.set(i).is_ok())
        })
        .collect();

    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();

    assert_eq!(winners, 1);
    assert!(cell.get().is_some());
}

#[test]
fn once_cell_drops_its_value() {
    struct Counting(Arc<AtomicUsize>);

    impl Drop for Counting {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let drops = Arc::new(AtomicUsize::new(0));
    {
        let cell = SyncOnceCell::new();
        cell.set(Counting(Arc::clone(&drops))).ok();
    }
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn spinlock_is_sync_for_send_values() {
    fn takes_sync<S: Sync>(_: &S) {}
    let lock = SpinLock::new(0u8);
    takes_sync(&lock);
}
