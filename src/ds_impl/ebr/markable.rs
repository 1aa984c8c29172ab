use crossbeam_ebr::{Atomic, Guard, Owned, Shared};

use std::sync::atomic::Ordering;

/// Tag bit carrying the mark.
const MARK: usize = 1;

#[inline]
fn tag_of(mark: bool) -> usize {
    if mark {
        MARK
    } else {
        0
    }
}

/// An atomic `(reference, mark)` pair.
///
/// The mark lives in the lowest tag bit of the pointer, so both components are read and replaced
/// by a single atomic instruction. `T` must be at least 2-byte aligned.
///
/// Every update reports failure through its return value; callers are expected to retry.
#[derive(Debug)]
pub struct MarkableRef<T> {
    link: Atomic<T>,
}

impl<T> Default for MarkableRef<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> MarkableRef<T> {
    /// Creates an unmarked null reference.
    pub fn null() -> Self {
        Self {
            link: Atomic::null(),
        }
    }

    pub fn new(reference: Shared<'_, T>, mark: bool) -> Self {
        Self {
            link: Atomic::from(reference.with_tag(tag_of(mark))),
        }
    }

    /// Returns the reference and the mark as one snapshot.
    #[inline]
    pub fn get<'g>(&self, guard: &'g Guard) -> (Shared<'g, T>, bool) {
        let link = self.link.load(Ordering::Acquire, guard);
        (link.with_tag(0), link.tag() & MARK != 0)
    }

    #[inline]
    pub fn reference<'g>(&self, guard: &'g Guard) -> Shared<'g, T> {
        self.get(guard).0
    }

    #[inline]
    pub fn is_marked(&self, guard: &Guard) -> bool {
        self.get(guard).1
    }

    /// Overwrites the pair unconditionally.
    ///
    /// Only meant for links that no other thread can observe yet, e.g. the link of a node that is
    /// about to be published.
    #[inline]
    pub fn set(&self, reference: Shared<'_, T>, mark: bool) {
        self.link.store(reference.with_tag(tag_of(mark)), Ordering::Relaxed);
    }

    /// Replaces `(expected_ref, expected_mark)` with `(new_ref, new_mark)`.
    ///
    /// Returns `false` and leaves the pair untouched if either component differs.
    #[inline]
    pub fn compare_and_set<'g>(
        &self,
        expected_ref: Shared<'g, T>,
        new_ref: Shared<'g, T>,
        expected_mark: bool,
        new_mark: bool,
        guard: &'g Guard,
    ) -> bool {
        self.link
            .compare_exchange(
                expected_ref.with_tag(tag_of(expected_mark)),
                new_ref.with_tag(tag_of(new_mark)),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .is_ok()
    }

    /// Publishes `new` in place of `(expected_ref, false)`, leaving the mark cleared.
    ///
    /// On failure the allocation is handed back so that the caller can retry with it.
    #[inline]
    pub fn compare_and_link<'g>(
        &self,
        expected_ref: Shared<'g, T>,
        new: Owned<T>,
        guard: &'g Guard,
    ) -> Result<Shared<'g, T>, Owned<T>> {
        self.link
            .compare_exchange(
                expected_ref.with_tag(0),
                new.with_tag(0),
                Ordering::AcqRel,
                Ordering::Acquire,
                guard,
            )
            .map_err(|e| e.new)
    }

    /// Sets the mark to `new_mark` iff the reference is still `expected_ref`.
    ///
    /// Fails if the reference moved or if the mark already equals `new_mark`, so two racing
    /// markers never both succeed.
    #[inline]
    pub fn attempt_mark<'g>(
        &self,
        expected_ref: Shared<'g, T>,
        new_mark: bool,
        guard: &'g Guard,
    ) -> bool {
        self.compare_and_set(expected_ref, expected_ref, !new_mark, new_mark, guard)
    }
}

#[cfg(test)]
mod tests {
    use super::MarkableRef;
    use crossbeam_ebr::{pin, Owned, Shared};

    #[test]
    fn get_returns_both_components() {
        let guard = &pin();
        let target = Owned::new(7usize).into_shared(guard);

        let unmarked = MarkableRef::new(target, false);
        assert_eq!(unmarked.get(guard), (target, false));

        let marked = MarkableRef::new(target, true);
        assert_eq!(marked.get(guard), (target, true));
        assert_eq!(marked.reference(guard), target);
        assert!(marked.is_marked(guard));

        let null = MarkableRef::<usize>::null();
        assert!(null.reference(guard).is_null());
        assert!(!null.is_marked(guard));

        unsafe { drop(target.into_owned()) };
    }

    #[test]
    fn compare_and_set_requires_both_components() {
        let guard = &pin();
        let a = Owned::new(1usize).into_shared(guard);
        let b = Owned::new(2usize).into_shared(guard);
        let link = MarkableRef::new(a, false);

        // wrong mark
        assert!(!link.compare_and_set(a, b, true, false, guard));
        assert_eq!(link.get(guard), (a, false));
        // wrong reference
        assert!(!link.compare_and_set(b, b, false, false, guard));
        assert_eq!(link.get(guard), (a, false));

        assert!(link.compare_and_set(a, b, false, true, guard));
        assert_eq!(link.get(guard), (b, true));

        unsafe {
            drop(a.into_owned());
            drop(b.into_owned());
        }
    }

    #[test]
    fn attempt_mark_is_one_shot() {
        let guard = &pin();
        let a = Owned::new(1usize).into_shared(guard);
        let b = Owned::new(2usize).into_shared(guard);
        let link = MarkableRef::new(a, false);

        assert!(!link.attempt_mark(b, true, guard));
        assert!(!link.is_marked(guard));

        assert!(link.attempt_mark(a, true, guard));
        assert_eq!(link.get(guard), (a, true));

        // already marked
        assert!(!link.attempt_mark(a, true, guard));
        assert_eq!(link.get(guard), (a, true));

        unsafe {
            drop(a.into_owned());
            drop(b.into_owned());
        }
    }

    #[test]
    fn compare_and_link_returns_allocation_on_failure() {
        let guard = &pin();
        let a = Owned::new(1usize).into_shared(guard);
        let link = MarkableRef::new(Shared::null(), false);

        let node = match link.compare_and_link(a, Owned::new(3), guard) {
            Ok(_) => panic!("linked against a stale reference"),
            Err(node) => node,
        };
        assert_eq!(*node, 3);

        let published = link.compare_and_link(Shared::null(), node, guard).unwrap();
        assert_eq!(link.get(guard), (published, false));

        unsafe {
            drop(a.into_owned());
            drop(published.into_owned());
        }
    }
}
