use super::concurrent_set::ConcurrentSet;
use super::markable::MarkableRef;
use crossbeam_ebr::{unprotected, Guard, Owned, Shared};
use tracing::trace;

use std::cmp::Ordering::Equal;

struct Node<K> {
    key: K,
    /// Mark: the node is logically deleted.
    next: MarkableRef<Node<K>>,
}

impl<K> Node<K>
where
    K: Ord,
{
    /// Creates a new node, not linked to anything yet.
    #[inline]
    fn new(key: K) -> Self {
        Self {
            key,
            next: MarkableRef::null(),
        }
    }

    #[inline]
    fn holds(&self, key: &K) -> bool {
        self.key.cmp(key) == Equal
    }
}

/// A lock-free set of keys kept in an unsorted singly linked list.
///
/// The head sentinel is the `head` link itself and the tail sentinel is the null reference that
/// ends the chain; neither of them carries a key.
///
/// Unlinked nodes are retired to the collector of the guard that unlinked them, so every guard
/// used with one list must come from the same collector.
pub struct List<K> {
    head: MarkableRef<Node<K>>,
}

impl<K> Default for List<K>
where
    K: Ord,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Drop for List<K> {
    fn drop(&mut self) {
        unsafe {
            let guard = unprotected();
            let mut curr = self.head.reference(guard);

            while !curr.is_null() {
                let next = curr.deref().next.reference(guard);
                drop(curr.into_owned());
                curr = next;
            }
        }
    }
}

struct Cursor<'g, K> {
    prev: &'g MarkableRef<Node<K>>,
    // Null when the search reached the tail.
    curr: Shared<'g, Node<K>>,
    next: Shared<'g, Node<K>>,
}

impl<'g, K> Cursor<'g, K> {
    /// Whether `prev` is unmarked and still points to `curr`, and `curr` is unmarked.
    #[inline]
    fn is_valid(&self, guard: &'g Guard) -> bool {
        let (target, marked) = self.prev.get(guard);
        if marked || target != self.curr {
            return false;
        }
        match unsafe { self.curr.as_ref() } {
            None => true,
            Some(curr) => !curr.next.is_marked(guard),
        }
    }
}

impl<K> List<K>
where
    K: Ord,
{
    /// Creates an empty list: the head link points straight at the tail.
    pub fn new() -> Self {
        List {
            head: MarkableRef::null(),
        }
    }

    /// Scans from the head for the first node holding `key`, stopping at the tail otherwise.
    ///
    /// Logically deleted nodes met on the way are unlinked. Returns `Err(())` when a concurrent
    /// update invalidated the scan and it has to start over from the head.
    #[inline]
    fn find_inner<'g>(&'g self, key: &K, guard: &'g Guard) -> Result<Cursor<'g, K>, ()> {
        let mut cursor = Cursor {
            prev: &self.head,
            curr: self.head.reference(guard),
            next: Shared::null(),
        };

        loop {
            let mut curr_node = match unsafe { cursor.curr.as_ref() } {
                None => {
                    cursor.next = Shared::null();
                    return Ok(cursor);
                }
                Some(c) => c,
            };
            let (mut next, mut marked) = curr_node.next.get(guard);

            if cursor.prev.is_marked(guard) {
                return Err(());
            }

            while marked {
                if !cursor.prev.compare_and_set(cursor.curr, next, false, false, guard) {
                    return Err(());
                }
                trace!("unlinked a logically deleted node");
                unsafe { guard.defer_destroy(cursor.curr) };

                cursor.curr = cursor.prev.reference(guard);
                curr_node = match unsafe { cursor.curr.as_ref() } {
                    None => {
                        cursor.next = Shared::null();
                        return Ok(cursor);
                    }
                    Some(c) => c,
                };
                (next, marked) = curr_node.next.get(guard);
            }

            cursor.next = next;
            if curr_node.holds(key) {
                return Ok(cursor);
            }
            cursor.prev = &curr_node.next;
            cursor.curr = next;
        }
    }

    fn find<'g>(&'g self, key: &K, guard: &'g Guard) -> Cursor<'g, K> {
        loop {
            if let Ok(cursor) = self.find_inner(key, guard) {
                return cursor;
            }
        }
    }

    /// Inserts `key` right before the tail unless it is already present.
    pub fn add(&self, key: K, guard: &Guard) -> bool {
        let mut node = Owned::new(Node::new(key));

        loop {
            let cursor = self.find(&node.key, guard);
            if !cursor.is_valid(guard) {
                continue;
            }
            if let Some(curr) = unsafe { cursor.curr.as_ref() } {
                if curr.holds(&node.key) {
                    return false;
                }
            }

            node.next.set(cursor.curr, false);
            match cursor.prev.compare_and_link(cursor.curr, node, guard) {
                Ok(_) => return true,
                Err(n) => node = n,
            }
        }
    }

    /// Marks the node holding `key` as deleted and tries once to unlink it.
    ///
    /// If that unlink loses a race, a later `find` by any thread finishes the job.
    pub fn remove(&self, key: &K, guard: &Guard) -> bool {
        loop {
            let cursor = self.find(key, guard);
            if !cursor.is_valid(guard) {
                continue;
            }
            let curr_node = match unsafe { cursor.curr.as_ref() } {
                Some(c) if c.holds(key) => c,
                _ => return false,
            };

            if !curr_node.next.attempt_mark(cursor.next, true, guard) {
                continue;
            }

            if cursor.prev.compare_and_set(cursor.curr, cursor.next, false, false, guard) {
                unsafe { guard.defer_destroy(cursor.curr) };
            }
            return true;
        }
    }

    /// Walks the chain without helping, following links whether they are marked or not.
    ///
    /// A node holding `key` counts only while its own link is unmarked; a marked match is passed
    /// over. So `contains` never reports a key whose `remove` has already returned `true`, even
    /// if the node is still linked.
    pub fn contains(&self, key: &K, guard: &Guard) -> bool {
        let mut curr = self.head.reference(guard);

        while let Some(curr_node) = unsafe { curr.as_ref() } {
            let (next, marked) = curr_node.next.get(guard);
            if !marked && curr_node.holds(key) {
                return true;
            }
            curr = next;
        }
        false
    }

    /// Whether the head link points at the tail.
    ///
    /// Deleted nodes that are not unlinked yet still make the list look non-empty.
    pub fn is_empty(&self, guard: &Guard) -> bool {
        self.head.reference(guard).is_null()
    }
}

impl<K> ConcurrentSet<K> for List<K>
where
    K: Ord,
{
    fn new() -> Self {
        Self::new()
    }

    #[inline]
    fn add(&self, key: K, guard: &Guard) -> bool {
        self.add(key, guard)
    }
    #[inline]
    fn remove(&self, key: &K, guard: &Guard) -> bool {
        self.remove(key, guard)
    }
    #[inline]
    fn contains(&self, key: &K, guard: &Guard) -> bool {
        self.contains(key, guard)
    }
    #[inline]
    fn is_empty(&self, guard: &Guard) -> bool {
        self.is_empty(guard)
    }
}
