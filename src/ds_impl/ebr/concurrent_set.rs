use crossbeam_ebr::Guard;

/// A set of unique keys shared between threads.
///
/// Every operation runs inside the critical section of `guard`, so callers may batch several
/// operations under one pin.
pub trait ConcurrentSet<K> {
    fn new() -> Self;
    fn add(&self, key: K, guard: &Guard) -> bool;
    fn remove(&self, key: &K, guard: &Guard) -> bool;
    fn contains(&self, key: &K, guard: &Guard) -> bool;
    fn is_empty(&self, guard: &Guard) -> bool;
}
