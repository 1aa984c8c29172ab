use crossbeam_utils::thread;
use markable_set::ds_impl::ebr::{List, LockFreeSet};
use rand::prelude::*;

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;

const THREADS: usize = 8;

#[test_log::test]
fn sequential_scenario() {
    let set = LockFreeSet::new();

    assert!(set.add(5));
    assert!(set.add(3));
    assert!(!set.add(5));
    assert!(set.contains(&3));
    assert!(set.remove(&3));
    assert!(!set.contains(&3));
    assert!(!set.remove(&3));
    assert!(!set.is_empty());
}

#[test_log::test]
fn remove_without_add() {
    let set = LockFreeSet::new();
    assert!(!set.remove(&1));
    assert!(set.add(1));
    assert!(set.remove(&1));
    assert!(!set.remove(&1));
}

#[test_log::test]
fn emptiness_converges() {
    let set = LockFreeSet::new();
    for key in 1..=3 {
        assert!(set.add(key));
    }
    for key in 1..=3 {
        assert!(set.remove(&key));
    }
    assert!(set.is_empty());
    for key in 1..=3 {
        assert!(!set.contains(&key));
    }
}

#[test_log::test]
fn no_lost_updates() {
    const PER_THREAD: usize = 200;
    let set = &LockFreeSet::new();

    thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move |_| {
                let mut keys: Vec<usize> = (0..PER_THREAD).map(|k| k * THREADS + t).collect();
                keys.shuffle(&mut rand::thread_rng());
                for key in keys {
                    assert!(set.add(key));
                }
            });
        }
    })
    .unwrap();

    for key in 0..THREADS * PER_THREAD {
        assert!(set.contains(&key), "lost {key}");
        assert!(!set.add(key), "duplicated {key}");
    }
    assert!(!set.contains(&(THREADS * PER_THREAD)));
}

#[test_log::test]
fn concurrent_removal_succeeds_once() {
    const ROUNDS: usize = 200;
    let set = &LockFreeSet::new();
    let barrier = &Barrier::new(THREADS);

    for round in 0..ROUNDS {
        assert!(set.add(round));
        let removed = &AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(move |_| {
                    barrier.wait();
                    if set.remove(&round) {
                        removed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(removed.load(Ordering::Relaxed), 1);
        assert!(!set.contains(&round));
    }
    assert!(set.is_empty());
}

#[test_log::test]
fn concurrent_add_succeeds_once() {
    const ROUNDS: usize = 200;
    let set = &LockFreeSet::new();
    let barrier = &Barrier::new(THREADS);

    for round in 0..ROUNDS {
        let added = &AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(move |_| {
                    barrier.wait();
                    if set.add(round) {
                        added.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        })
        .unwrap();

        assert_eq!(added.load(Ordering::Relaxed), 1);
        assert!(set.contains(&round));
    }
}

/// Each thread owns a disjoint slice of the key space and mirrors its updates in a local model;
/// every return value must agree with the model and the final contents with the union of models.
#[test_log::test]
fn mixed_workload_matches_model() {
    const KEYS_PER_THREAD: usize = 64;
    const OPS: usize = 5000;
    let list = &List::new();

    let models: Vec<HashSet<usize>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                s.spawn(move |_| {
                    let mut rng = rand::thread_rng();
                    let mut model = HashSet::new();
                    for _ in 0..OPS {
                        let key = rng.gen_range(0..KEYS_PER_THREAD) * THREADS + t;
                        let guard = &crossbeam_ebr::pin();
                        match rng.gen_range(0..3) {
                            0 => assert_eq!(list.add(key, guard), model.insert(key)),
                            1 => assert_eq!(list.remove(&key, guard), model.remove(&key)),
                            _ => assert_eq!(list.contains(&key, guard), model.contains(&key)),
                        }
                    }
                    model
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    let guard = &crossbeam_ebr::pin();
    let expected: HashSet<usize> = models.into_iter().flatten().collect();
    for key in 0..KEYS_PER_THREAD * THREADS {
        assert_eq!(list.contains(&key, guard), expected.contains(&key));
    }
    // A miss scans the whole chain and unlinks whatever is still marked.
    assert!(!list.remove(&usize::MAX, guard));
    assert_eq!(list.is_empty(guard), expected.is_empty());
}
