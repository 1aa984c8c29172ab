use super::list::List;
use crossbeam_ebr::pin;

/// A lock-free set that pins the default collector on every call.
///
/// Use [`List`] directly to run several operations under one guard.
pub struct LockFreeSet<K> {
    inner: List<K>,
}

impl<K> Default for LockFreeSet<K>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> LockFreeSet<K>
where
    K: Ord,
{
    pub fn new() -> Self {
        LockFreeSet { inner: List::new() }
    }

    /// Returns `false` if `key` was already present.
    #[inline]
    pub fn add(&self, key: K) -> bool {
        self.inner.add(key, &pin())
    }

    /// Returns `false` if `key` was not present.
    #[inline]
    pub fn remove(&self, key: &K) -> bool {
        self.inner.remove(key, &pin())
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains(key, &pin())
    }

    /// May return `false` for a short while after the last key was removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty(&pin())
    }
}
