//! The core open-addressed table: storage, probing, find/insert/erase,
//! rehash. Set and map semantics are layered on top in `set.rs`/`map.rs` via
//! the [`TypePolicy`] parameter. See spec sections 4.4 through 4.8.
//!
//! Grounded on the teacher crate's `raw/mod.rs` (`RawInterner`) for the
//! overall shape — raw-pointer storage via `std::alloc`, a dummy zero-alloc
//! empty state, a `Drop` impl that frees on the way out — generalized from
//! its fixed `Bucket<T>` cacheline layout to this spec's separate
//! group-metadata and element arrays, and from its lock-free concurrent
//! probing to a plain single-threaded one.

use std::alloc::Layout;
use std::hash::{BuildHasher, Hash, Hasher};
use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};

use crate::alloc::RawAllocator;
use crate::bitmask::BitMask;
use crate::eq::KeyEqual;
use crate::group::{Group, DUMMY_GROUPS, N};
use crate::iter::RawIter;
use crate::mix::{mix, MixMode};
use crate::policy::TypePolicy;
use crate::prober::Prober;
use crate::size_policy::{capacity_for_groups, groups_for_capacity, home_group, max_load_for_groups, size_index};

/// The two parallel arrays backing a table: group metadata and element
/// storage. `elements` is null exactly when this is the shared dummy backing
/// (see spec section 4.6, invariant 5).
struct Arrays<V> {
    groups: NonNull<Group>,
    elements: *mut V,
    group_count: usize,
}

// All fields are plain Copy types regardless of `V`.
impl<V> Clone for Arrays<V> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<V> Copy for Arrays<V> {}

impl<V> Arrays<V> {
    fn dummy() -> Self {
        debug_assert_eq!(DUMMY_GROUPS.len(), crate::size_policy::MIN_GROUPS);
        Self {
            groups: NonNull::from(&DUMMY_GROUPS).cast(),
            elements: ptr::null_mut(),
            group_count: DUMMY_GROUPS.len(),
        }
    }
}

struct Location {
    group_idx: usize,
    pos: usize,
}

/// Element slots backing `group_count` groups: one per metadata slot except
/// the very last (group `group_count - 1`, position `N - 1`), which is
/// permanently the sentinel and never has elements read from or written to
/// it, so the element array is one cell shorter than `group_count * N`.
#[inline]
fn element_slot_count(group_count: usize) -> usize {
    group_count * N - 1
}

pub(crate) struct RawTable<P, S, M, E, A>
where
    P: TypePolicy,
    A: RawAllocator,
{
    arrays: Arrays<P::Value>,
    size: usize,
    hash_builder: S,
    eq: E,
    alloc: A,
    _marker: PhantomData<(P, M)>,
}

impl<P, S, M, E, A> RawTable<P, S, M, E, A>
where
    P: TypePolicy,
    A: RawAllocator,
{
    pub(crate) fn new_in(hash_builder: S, eq: E, alloc: A) -> Self {
        Self { arrays: Arrays::dummy(), size: 0, hash_builder, eq, alloc, _marker: PhantomData }
    }

    pub(crate) fn with_capacity_in(capacity: usize, hash_builder: S, eq: E, alloc: A) -> Self {
        let arrays = if capacity == 0 {
            Arrays::dummy()
        } else {
            unsafe { Self::allocate_arrays(groups_for_capacity(capacity), &alloc) }
        };
        Self { arrays, size: 0, hash_builder, eq, alloc, _marker: PhantomData }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    pub(crate) fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// The table's key-equality policy. See spec section 6's `key_eq`.
    #[inline]
    pub(crate) fn key_eq(&self) -> &E {
        &self.eq
    }

    /// The table's allocator. See spec section 6's `get_allocator`.
    #[inline]
    pub(crate) fn allocator(&self) -> &A {
        &self.alloc
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        if self.arrays.elements.is_null() {
            0
        } else {
            capacity_for_groups(self.arrays.group_count)
        }
    }

    /// `size / capacity`, or `0.0` for a dummy-backed table. See spec
    /// section 6's `load_factor`.
    #[inline]
    pub(crate) fn load_factor(&self) -> f64 {
        let cap = self.capacity();
        if cap == 0 {
            0.0
        } else {
            self.size as f64 / cap as f64
        }
    }

    /// The fixed threshold, as a fraction of capacity, above which an insert
    /// triggers a rehash. See spec section 6's `max_load_factor`.
    #[inline]
    pub(crate) fn max_load_factor(&self) -> f64 {
        crate::size_policy::MAX_LOAD_FACTOR
    }

    #[inline]
    fn is_dummy(&self) -> bool {
        self.arrays.elements.is_null()
    }

    #[inline]
    fn max_load(&self) -> usize {
        if self.is_dummy() {
            0
        } else {
            max_load_for_groups(self.arrays.group_count)
        }
    }

    #[inline]
    fn element_ptr(&self, group_idx: usize, pos: usize) -> *mut P::Value {
        unsafe { self.arrays.elements.add(group_idx * N + pos) }
    }

    fn raw_hash(&self, key: &P::Key) -> u64
    where
        S: BuildHasher,
        P::Key: Hash,
        M: MixMode,
    {
        let mut hasher = self.hash_builder.build_hasher();
        key.hash(&mut hasher);
        mix::<M>(hasher.finish())
    }

    /// Finds the slot holding a key equivalent to `key`, pruning probe
    /// chains early via the overflow byte (spec section 4.5 negative
    /// lookup).
    fn locate(&self, hash: u64, key: &P::Key) -> Option<Location>
    where
        E: KeyEqual<P::Key>,
    {
        if self.is_dummy() {
            return None;
        }
        let idx = size_index(self.arrays.group_count);
        let mut prober = Prober::new(home_group(hash, idx), self.arrays.group_count - 1);
        loop {
            let group = unsafe { &*self.arrays.groups.as_ptr().add(prober.pos()) };
            for pos in group.match_hash(hash) {
                let elem = unsafe { &*self.element_ptr(prober.pos(), pos) };
                if self.eq.key_eq(P::extract(elem), key) {
                    return Some(Location { group_idx: prober.pos(), pos });
                }
            }
            if group.is_not_overflowed(hash) {
                return None;
            }
            if !prober.next() {
                return None;
            }
        }
    }

    pub(crate) fn get(&self, key: &P::Key) -> Option<&P::Value>
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        let hash = self.raw_hash(key);
        self.locate(hash, key).map(|loc| unsafe { &*self.element_ptr(loc.group_idx, loc.pos) })
    }

    pub(crate) fn get_mut(&mut self, key: &P::Key) -> Option<&mut P::Value>
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        let hash = self.raw_hash(key);
        self.locate(hash, key).map(|loc| unsafe { &mut *self.element_ptr(loc.group_idx, loc.pos) })
    }

    pub(crate) fn contains(&self, key: &P::Key) -> bool
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        self.get(key).is_some()
    }

    /// Inserts `value`, keyed by `P::extract(&value)`. If an equivalent key
    /// was already present its value is replaced and returned; otherwise the
    /// table grows if needed and `None` is returned.
    pub(crate) fn insert(&mut self, value: P::Value) -> Option<P::Value>
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        let hash = self.raw_hash(P::extract(&value));
        if let Some(loc) = self.locate(hash, P::extract(&value)) {
            let ptr = self.element_ptr(loc.group_idx, loc.pos);
            return Some(unsafe { ptr::replace(ptr, value) });
        }
        self.reserve_for_insert();
        Self::insert_into(&mut self.arrays, hash, value);
        self.size += 1;
        None
    }

    /// Builds `value` eagerly via `make`, then inserts it only if no
    /// equivalent key is already present; on a hit the newly built value is
    /// simply dropped and the existing entry is left untouched. Returns a
    /// reference to whichever value now occupies the slot, plus whether an
    /// insertion actually happened. See spec section 6's `emplace`.
    pub(crate) fn emplace_with(&mut self, make: impl FnOnce() -> P::Value) -> (&mut P::Value, bool)
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        let value = make();
        let hash = self.raw_hash(P::extract(&value));
        if let Some(loc) = self.locate(hash, P::extract(&value)) {
            return (unsafe { &mut *self.element_ptr(loc.group_idx, loc.pos) }, false);
        }
        self.reserve_for_insert();
        let ptr = Self::insert_into(&mut self.arrays, hash, value);
        self.size += 1;
        (unsafe { &mut *ptr }, true)
    }

    /// Looks up `key` first and only calls `make` — which builds the rest of
    /// the value from the now-owned `key` — on a miss, so a caller with an
    /// expensive-to-construct mapped value never materializes it for an
    /// already-present key. See spec section 4.5 and section 6's
    /// `try_emplace`.
    pub(crate) fn try_emplace_with(
        &mut self,
        key: P::Key,
        make: impl FnOnce(P::Key) -> P::Value,
    ) -> (&mut P::Value, bool)
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        let hash = self.raw_hash(&key);
        if let Some(loc) = self.locate(hash, &key) {
            return (unsafe { &mut *self.element_ptr(loc.group_idx, loc.pos) }, false);
        }
        self.reserve_for_insert();
        let value = make(key);
        let ptr = Self::insert_into(&mut self.arrays, hash, value);
        self.size += 1;
        (unsafe { &mut *ptr }, true)
    }

    pub(crate) fn remove(&mut self, key: &P::Key) -> Option<P::Value>
    where
        S: BuildHasher,
        P::Key: Hash,
        E: KeyEqual<P::Key>,
        M: MixMode,
    {
        let hash = self.raw_hash(key);
        let loc = self.locate(hash, key)?;
        let group = unsafe { &mut *self.arrays.groups.as_ptr().add(loc.group_idx) };
        let ptr = self.element_ptr(loc.group_idx, loc.pos);
        let value = unsafe { ptr::read(ptr) };
        // Overflow bits are sticky: clearing them on erase would let a later
        // negative lookup stop one group early and miss a survivor further
        // along the same probe sequence.
        group.reset(loc.pos);
        self.size -= 1;
        Some(value)
    }

    pub(crate) fn clear(&mut self) {
        if self.is_dummy() {
            return;
        }
        for group_idx in 0..self.arrays.group_count {
            let group = unsafe { &mut *self.arrays.groups.as_ptr().add(group_idx) };
            for pos in group.match_really_occupied() {
                unsafe { ptr::drop_in_place(self.element_ptr(group_idx, pos)) };
            }
            group.clear_all(group_idx == self.arrays.group_count - 1);
        }
        self.size = 0;
    }

    pub(crate) fn iter(&self) -> RawIter<'_, P::Value> {
        unsafe { RawIter::new(self.arrays.groups.as_ptr(), self.arrays.elements, self.arrays.group_count) }
    }

    /// Consumes the table, yielding its elements by value.
    ///
    /// A type with a `Drop` impl can't be destructured by move, so this
    /// reads each field out through `ManuallyDrop` instead: `arrays` (a
    /// `Copy` bundle of raw pointers) and `alloc` transfer to the returned
    /// [`RawIntoIter`], which takes over responsibility for dropping
    /// elements and freeing storage, while `hash_builder` and `eq` are
    /// dropped in place since the iterator has no use for them. The same
    /// trick `Vec::into_iter` relies on.
    pub(crate) fn into_iter(self) -> RawIntoIter<P::Value, A> {
        let mut this = mem::ManuallyDrop::new(self);
        let arrays = this.arrays;
        let alloc = unsafe { ptr::read(&this.alloc) };
        unsafe {
            ptr::drop_in_place(&mut this.hash_builder);
            ptr::drop_in_place(&mut this.eq);
        }
        let mask = if arrays.elements.is_null() {
            BitMask::new(0)
        } else {
            unsafe { (*arrays.groups.as_ptr()).match_occupied() }
        };
        RawIntoIter { arrays, group_idx: 0, mask, alloc }
    }

    fn reserve_for_insert(&mut self)
    where
        S: BuildHasher,
        P::Key: Hash,
        M: MixMode,
    {
        if self.size + 1 > self.max_load() {
            self.grow_to(groups_for_capacity(self.size + 1));
        }
    }

    pub(crate) fn reserve(&mut self, additional: usize)
    where
        S: BuildHasher,
        P::Key: Hash,
        M: MixMode,
    {
        let needed = self.size + additional;
        if needed > self.max_load() {
            self.grow_to(groups_for_capacity(needed));
        }
    }

    /// Ensures capacity for at least `max(n, len())` elements, rehashing
    /// unconditionally if the resulting group count differs from the
    /// current one. Unlike [`Self::reserve`], which only grows when the
    /// requested headroom would not already fit, this always rebuilds the
    /// table's storage when asked to — matching the source library's
    /// `rehash(n)`, distinct from `reserve`. See spec section 4.7.
    pub(crate) fn rehash(&mut self, n: usize)
    where
        S: BuildHasher,
        P::Key: Hash,
        M: MixMode,
    {
        let target_groups = groups_for_capacity(n.max(self.size));
        if self.is_dummy() || target_groups != self.arrays.group_count {
            self.grow_to(target_groups);
        }
    }

    /// Swaps two tables' contents. If the allocator neither propagates on
    /// swap nor compares always-equal, the allocators themselves are left in
    /// place and only the data fields are exchanged — sound only if the two
    /// allocators being paired with each other's storage actually do compare
    /// equal, which is the caller's responsibility in that case, matching
    /// the source library's swap contract (spec section 4.8).
    pub(crate) fn swap(&mut self, other: &mut Self) {
        if A::PROPAGATE_ON_SWAP || A::IS_ALWAYS_EQUAL {
            mem::swap(self, other);
        } else {
            mem::swap(&mut self.arrays, &mut other.arrays);
            mem::swap(&mut self.size, &mut other.size);
            mem::swap(&mut self.hash_builder, &mut other.hash_builder);
            mem::swap(&mut self.eq, &mut other.eq);
        }
    }

    /// Probes for the first available slot starting at `hash`'s home group,
    /// marking every fully-occupied group it skips as overflowed for
    /// `hash`'s class (spec section 4.5).
    fn insert_into(arrays: &mut Arrays<P::Value>, hash: u64, value: P::Value) -> *mut P::Value {
        let idx = size_index(arrays.group_count);
        let mut prober = Prober::new(home_group(hash, idx), arrays.group_count - 1);
        loop {
            let group = unsafe { &mut *arrays.groups.as_ptr().add(prober.pos()) };
            if let Some(pos) = group.match_available().lowest_set_bit() {
                group.set(pos, hash);
                let ptr = unsafe { arrays.elements.add(prober.pos() * N + pos) };
                unsafe { ptr::write(ptr, value) };
                return ptr;
            }
            group.mark_overflow(hash);
            if !prober.next() {
                unreachable!("max load factor guarantees an available slot");
            }
        }
    }

    /// Grows to `new_group_count` groups, transferring live elements.
    ///
    /// If a key's `Hash` impl panics partway through, the elements already
    /// moved into the new arrays have had their source-group metadata reset
    /// to empty, so `self.size` is decremented by that count, the
    /// (now-incomplete) new arrays are discarded, and the old arrays — still
    /// holding every element not yet transferred — are restored. The table
    /// is left smaller but consistent and safe to keep using; it does not
    /// corrupt memory or double-free. See spec section 9 and
    /// `SPEC_FULL.md`'s resolution of the rehash exception-safety question.
    fn grow_to(&mut self, new_group_count: usize)
    where
        S: BuildHasher,
        P::Key: Hash,
        M: MixMode,
    {
        debug_assert!(new_group_count.is_power_of_two());
        let new_arrays = unsafe { Self::allocate_arrays(new_group_count, &self.alloc) };
        if self.is_dummy() {
            self.arrays = new_arrays;
            return;
        }
        let old_arrays = self.arrays;
        self.arrays = new_arrays;
        let mut num_moved = 0usize;
        let hash_builder = &self.hash_builder;
        let new_arrays_ref = &mut self.arrays;
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            Self::transfer_all(old_arrays, new_arrays_ref, hash_builder, &mut num_moved);
        }));
        match result {
            Ok(()) => unsafe { Self::deallocate_arrays(&old_arrays, &self.alloc) },
            Err(payload) => {
                self.size -= num_moved;
                unsafe {
                    Self::drop_live_elements(&self.arrays);
                    Self::deallocate_arrays(&self.arrays, &self.alloc);
                }
                self.arrays = old_arrays;
                std::panic::resume_unwind(payload);
            }
        }
    }

    fn transfer_all(
        old: Arrays<P::Value>,
        new: &mut Arrays<P::Value>,
        hash_builder: &S,
        num_moved: &mut usize,
    ) where
        S: BuildHasher,
        P::Key: Hash,
        M: MixMode,
    {
        for group_idx in 0..old.group_count {
            let group = unsafe { &mut *old.groups.as_ptr().add(group_idx) };
            for pos in group.match_really_occupied() {
                let elem_ptr = unsafe { old.elements.add(group_idx * N + pos) };
                let hash = {
                    let mut hasher = hash_builder.build_hasher();
                    P::extract(unsafe { &*elem_ptr }).hash(&mut hasher);
                    mix::<M>(hasher.finish())
                };
                let value = unsafe { ptr::read(elem_ptr) };
                Self::insert_into(new, hash, value);
                group.reset(pos);
                *num_moved += 1;
            }
        }
    }

    unsafe fn allocate_arrays(group_count: usize, alloc: &A) -> Arrays<P::Value> {
        debug_assert!(group_count.is_power_of_two());
        let groups_layout = Layout::array::<Group>(group_count).expect("capacity overflow");
        let groups_ptr = alloc.alloc(groups_layout);
        let groups_ptr = match NonNull::new(groups_ptr) {
            Some(p) => p.cast::<Group>(),
            None => std::alloc::handle_alloc_error(groups_layout),
        };
        ptr::write_bytes(groups_ptr.as_ptr(), 0, group_count);
        (*groups_ptr.as_ptr().add(group_count - 1)).set_sentinel();

        let elements = if mem::size_of::<P::Value>() == 0 {
            NonNull::<P::Value>::dangling().as_ptr()
        } else {
            let elements_layout =
                Layout::array::<P::Value>(element_slot_count(group_count)).expect("capacity overflow");
            let raw = alloc.alloc(elements_layout);
            if raw.is_null() {
                alloc.dealloc(groups_ptr.as_ptr().cast(), groups_layout);
                std::alloc::handle_alloc_error(elements_layout);
            }
            raw.cast::<P::Value>()
        };
        Arrays { groups: groups_ptr, elements, group_count }
    }

    /// Drops every live (non-sentinel) element currently addressable through
    /// `arrays`, without touching metadata or storage. Used both by ordinary
    /// `Drop`/`clear` and by the rehash rollback path, where the new arrays
    /// hold a partial, still-live set of already-transferred elements that
    /// must be destroyed before their backing storage is freed.
    unsafe fn drop_live_elements(arrays: &Arrays<P::Value>) {
        for group_idx in 0..arrays.group_count {
            let group = &*arrays.groups.as_ptr().add(group_idx);
            for pos in group.match_really_occupied() {
                ptr::drop_in_place(arrays.elements.add(group_idx * N + pos));
            }
        }
    }

    unsafe fn deallocate_arrays(arrays: &Arrays<P::Value>, alloc: &A) {
        if arrays.elements.is_null() {
            return;
        }
        let groups_layout = Layout::array::<Group>(arrays.group_count).unwrap();
        alloc.dealloc(arrays.groups.as_ptr().cast(), groups_layout);
        if mem::size_of::<P::Value>() != 0 {
            let elements_layout = Layout::array::<P::Value>(element_slot_count(arrays.group_count)).unwrap();
            alloc.dealloc(arrays.elements.cast(), elements_layout);
        }
    }
}

impl<P, S, M, E, A> Drop for RawTable<P, S, M, E, A>
where
    P: TypePolicy,
    A: RawAllocator,
{
    fn drop(&mut self) {
        if self.arrays.elements.is_null() {
            return;
        }
        unsafe {
            Self::drop_live_elements(&self.arrays);
            Self::deallocate_arrays(&self.arrays, &self.alloc);
        }
    }
}

impl<P, S, M, E, A> Clone for RawTable<P, S, M, E, A>
where
    P: TypePolicy,
    P::Value: Clone,
    S: Clone + BuildHasher,
    P::Key: Hash,
    M: MixMode,
    E: Clone + KeyEqual<P::Key>,
    A: RawAllocator,
{
    /// Rebuilds by re-inserting every element into a freshly sized table,
    /// rather than bulk-copying metadata and elements in place as the source
    /// library's copy constructor does. Simpler, and sound regardless of
    /// what the source and destination allocators are; see `DESIGN.md`.
    fn clone(&self) -> Self {
        let mut new_table =
            Self::with_capacity_in(self.size, self.hash_builder.clone(), self.eq.clone(), self.alloc.clone());
        for group_idx in 0..self.arrays.group_count {
            let group = unsafe { &*self.arrays.groups.as_ptr().add(group_idx) };
            for pos in group.match_really_occupied() {
                let value = unsafe { (*self.element_ptr(group_idx, pos)).clone() };
                let hash = new_table.raw_hash(P::extract(&value));
                Self::insert_into(&mut new_table.arrays, hash, value);
                new_table.size += 1;
            }
        }
        new_table
    }
}

/// Owned, order-unspecified iterator produced by [`RawTable::into_iter`].
/// Frees the table's storage when dropped, after dropping any elements the
/// consumer didn't pull out.
pub(crate) struct RawIntoIter<V, A: RawAllocator> {
    arrays: Arrays<V>,
    group_idx: usize,
    mask: BitMask,
    alloc: A,
}

impl<V, A: RawAllocator> RawIntoIter<V, A> {
    fn advance_group(&mut self) -> bool {
        self.group_idx += 1;
        if self.group_idx >= self.arrays.group_count {
            false
        } else {
            self.mask = unsafe { (*self.arrays.groups.as_ptr().add(self.group_idx)).match_occupied() };
            true
        }
    }
}

impl<V, A: RawAllocator> Iterator for RawIntoIter<V, A> {
    type Item = V;

    fn next(&mut self) -> Option<V> {
        if self.arrays.elements.is_null() {
            return None;
        }
        loop {
            if let Some(pos) = self.mask.lowest_set_bit() {
                self.mask = self.mask.remove_lowest();
                let group = unsafe { &*self.arrays.groups.as_ptr().add(self.group_idx) };
                if group.is_sentinel(pos) {
                    self.group_idx = self.arrays.group_count;
                    return None;
                }
                let ptr = unsafe { self.arrays.elements.add(self.group_idx * N + pos) };
                return Some(unsafe { ptr::read(ptr) });
            }
            if !self.advance_group() {
                return None;
            }
        }
    }
}

impl<V, A: RawAllocator> Drop for RawIntoIter<V, A> {
    fn drop(&mut self) {
        if self.arrays.elements.is_null() {
            return;
        }
        for _ in self.by_ref() {}
        unsafe {
            let groups_layout = Layout::array::<Group>(self.arrays.group_count).unwrap();
            self.alloc.dealloc(self.arrays.groups.as_ptr().cast(), groups_layout);
            if mem::size_of::<V>() != 0 {
                let elements_layout = Layout::array::<V>(element_slot_count(self.arrays.group_count)).unwrap();
                self.alloc.dealloc(self.arrays.elements.cast(), elements_layout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::Global;
    use crate::eq::DefaultEq;
    use crate::mix::Mix;
    use crate::policy::SetPolicy;
    use std::collections::hash_map::RandomState;

    type TestTable = RawTable<SetPolicy<u32>, RandomState, Mix, DefaultEq, Global>;

    fn new_table() -> TestTable {
        RawTable::new_in(RandomState::new(), DefaultEq, Global)
    }

    #[test]
    fn empty_table_finds_nothing() {
        let t = new_table();
        assert!(t.get(&1).is_none());
        assert!(t.is_empty());
        assert_eq!(t.capacity(), 0);
    }

    #[test]
    fn insert_then_find_round_trips() {
        let mut t = new_table();
        assert!(t.insert(42).is_none());
        assert_eq!(t.get(&42), Some(&42));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn duplicate_insert_replaces_and_reports_old() {
        let mut t = new_table();
        assert!(t.insert(7).is_none());
        assert_eq!(t.insert(7), Some(7));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn grows_past_one_group_without_losing_elements() {
        let mut t = new_table();
        for i in 0..500u32 {
            t.insert(i);
        }
        assert_eq!(t.len(), 500);
        for i in 0..500u32 {
            assert_eq!(t.get(&i), Some(&i), "missing {i}");
        }
    }

    #[test]
    fn remove_drops_element_and_preserves_others() {
        let mut t = new_table();
        for i in 0..50u32 {
            t.insert(i);
        }
        assert_eq!(t.remove(&25), Some(25));
        assert!(t.get(&25).is_none());
        for i in 0..50u32 {
            if i != 25 {
                assert_eq!(t.get(&i), Some(&i));
            }
        }
        assert_eq!(t.len(), 49);
    }

    #[test]
    fn clear_empties_table_but_keeps_capacity() {
        let mut t = new_table();
        for i in 0..50u32 {
            t.insert(i);
        }
        let cap_before = t.capacity();
        t.clear();
        assert_eq!(t.len(), 0);
        assert!(t.get(&0).is_none());
        assert_eq!(t.capacity(), cap_before);
    }

    #[test]
    fn iter_visits_every_inserted_element_exactly_once() {
        let mut t = new_table();
        for i in 0..200u32 {
            t.insert(i);
        }
        let mut seen: Vec<u32> = t.iter().map(|p| unsafe { *p }).collect();
        seen.sort_unstable();
        let expected: Vec<u32> = (0..200).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn iter_empty_table_begin_is_end() {
        let t = new_table();
        assert!(t.iter().next().is_none());
    }

    #[test]
    fn clone_produces_independent_equal_table() {
        let mut t = new_table();
        for i in 0..30u32 {
            t.insert(i);
        }
        let cloned = t.clone();
        t.insert(999);
        assert!(cloned.get(&999).is_none());
        for i in 0..30u32 {
            assert_eq!(cloned.get(&i), Some(&i));
        }
        assert_eq!(cloned.len(), 30);
    }

    #[test]
    fn into_iter_yields_every_element_and_frees_storage() {
        let mut t = new_table();
        for i in 0..300u32 {
            t.insert(i);
        }
        let mut seen: Vec<u32> = t.into_iter().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..300).collect::<Vec<_>>());
    }

    #[test]
    fn into_iter_partial_consumption_still_drops_remainder() {
        use std::cell::Cell;
        use std::rc::Rc;

        struct Counted(#[allow(dead_code)] u32, Rc<Cell<usize>>);
        impl Drop for Counted {
            fn drop(&mut self) {
                self.1.set(self.1.get() + 1);
            }
        }
        impl PartialEq for Counted {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0
            }
        }
        impl std::hash::Hash for Counted {
            fn hash<H: Hasher>(&self, state: &mut H) {
                self.0.hash(state);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut t: RawTable<SetPolicy<Counted>, RandomState, Mix, DefaultEq, Global> =
            RawTable::new_in(RandomState::new(), DefaultEq, Global);
        for i in 0..50u32 {
            t.insert(Counted(i, drops.clone()));
        }
        {
            let mut into_iter = t.into_iter();
            for _ in 0..10 {
                into_iter.next().unwrap();
            }
            assert_eq!(drops.get(), 10);
        }
        assert_eq!(drops.get(), 50);
    }

    #[test]
    fn erase_then_reinsert_is_found_via_overflowed_probe_chain() {
        // Forces several keys into the same home group via a constant
        // hasher, so overflow bits get set, then verifies a later key past
        // the overflow boundary is still reachable after an erase.
        use std::hash::BuildHasherDefault;
        #[derive(Default)]
        struct ConstHasher(u64);
        impl Hasher for ConstHasher {
            fn write(&mut self, bytes: &[u8]) {
                for &b in bytes {
                    self.0 = self.0.wrapping_add(b as u64);
                }
            }
            fn finish(&self) -> u64 {
                0
            }
        }
        type ConstTable =
            RawTable<SetPolicy<u32>, BuildHasherDefault<ConstHasher>, Mix, DefaultEq, Global>;
        let mut t: ConstTable = RawTable::new_in(BuildHasherDefault::default(), DefaultEq, Global);
        for i in 0..20u32 {
            t.insert(i);
        }
        t.remove(&5);
        for i in 0..20u32 {
            if i != 5 {
                assert_eq!(t.get(&i), Some(&i), "lost {i} after unrelated erase");
            }
        }
    }

    #[test]
    fn emplace_with_builds_only_once_and_only_on_miss() {
        let mut t = new_table();
        let (slot, inserted) = t.emplace_with(|| 5);
        assert_eq!(*slot, 5);
        assert!(inserted);

        let mut calls = 0;
        let (slot, inserted) = t.emplace_with(|| {
            calls += 1;
            5
        });
        assert_eq!(*slot, 5);
        assert!(!inserted);
        assert_eq!(calls, 1, "emplace_with always builds eagerly, even on a hit");
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn try_emplace_with_skips_the_builder_on_a_hit() {
        type MapTable = RawTable<crate::policy::MapPolicy<u32, u32>, RandomState, Mix, DefaultEq, Global>;
        let mut t: MapTable = RawTable::new_in(RandomState::new(), DefaultEq, Global);

        let (slot, inserted) = t.try_emplace_with(1, |k| (k, 100));
        assert_eq!(*slot, (1, 100));
        assert!(inserted);

        let mut builder_called = false;
        let (slot, inserted) = t.try_emplace_with(1, |k| {
            builder_called = true;
            (k, 999)
        });
        assert_eq!(*slot, (1, 100));
        assert!(!inserted);
        assert!(!builder_called, "try_emplace_with must not build the value on a hit");
    }

    #[test]
    fn rehash_grows_to_cover_a_larger_request_and_preserves_elements() {
        let mut t = new_table();
        for i in 0..10u32 {
            t.insert(i);
        }
        let cap_before = t.capacity();
        t.rehash(1000);
        assert!(t.capacity() > cap_before);
        assert_eq!(t.len(), 10);
        for i in 0..10u32 {
            assert_eq!(t.get(&i), Some(&i));
        }
    }

    #[test]
    fn load_factor_and_max_load_factor_report_sane_values() {
        let mut t = new_table();
        assert_eq!(t.load_factor(), 0.0);
        for i in 0..10u32 {
            t.insert(i);
        }
        assert!(t.load_factor() > 0.0 && t.load_factor() < 1.0);
        assert_eq!(t.max_load_factor(), 0.875);
    }

    #[test]
    fn key_eq_and_allocator_accessors_are_reachable() {
        let t = new_table();
        let _: &DefaultEq = t.key_eq();
        let _: &Global = t.allocator();
    }

    #[test]
    fn swap_exchanges_contents_between_two_tables() {
        let mut a = new_table();
        let mut b = new_table();
        for i in 0..10u32 {
            a.insert(i);
        }
        for i in 100..105u32 {
            b.insert(i);
        }
        a.swap(&mut b);
        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 10);
        for i in 100..105u32 {
            assert_eq!(a.get(&i), Some(&i));
        }
        for i in 0..10u32 {
            assert_eq!(b.get(&i), Some(&i));
        }
    }

    #[test]
    fn grow_to_panicking_hash_drops_already_transferred_elements_and_stays_consistent() {
        use std::cell::Cell;
        use std::panic::AssertUnwindSafe;
        use std::rc::Rc;

        struct PanickyKey {
            id: u32,
            hash_calls: Rc<Cell<usize>>,
            panic_at: usize,
            drops: Rc<Cell<usize>>,
        }
        impl Drop for PanickyKey {
            fn drop(&mut self) {
                self.drops.set(self.drops.get() + 1);
            }
        }
        impl PartialEq for PanickyKey {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }
        impl std::hash::Hash for PanickyKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                let n = self.hash_calls.get() + 1;
                self.hash_calls.set(n);
                if n == self.panic_at {
                    panic!("synthetic panic during rehash");
                }
                self.id.hash(state);
            }
        }

        let hash_calls = Rc::new(Cell::new(0));
        let drops = Rc::new(Cell::new(0));
        // 25 inserts fill a 2-group table to its max load (25 of 29
        // structural slots) with no rehash, each consuming exactly one
        // hash() call. The 26th insert computes its own hash (call 26),
        // triggers a rehash to 4 groups, and the rehash's transfer loop
        // recomputes a hash for each of the 25 prior elements in turn
        // (calls 27..51). Call 36 is the 10th of those, so the panic lands
        // after 9 elements have been fully moved into the new arrays.
        let panic_at = 36;

        let mut t: RawTable<SetPolicy<PanickyKey>, RandomState, Mix, DefaultEq, Global> =
            RawTable::new_in(RandomState::new(), DefaultEq, Global);
        for id in 0..25u32 {
            t.insert(PanickyKey { id, hash_calls: hash_calls.clone(), panic_at, drops: drops.clone() });
        }

        let last = PanickyKey { id: 25, hash_calls: hash_calls.clone(), panic_at, drops: drops.clone() };
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| t.insert(last)));
        assert!(result.is_err(), "expected the synthetic hash panic to propagate");

        // The table must still be internally consistent: every id iteration
        // yields is reachable by key, with no duplicates and no corruption.
        let surviving: Vec<u32> = t.iter().map(|p| unsafe { (*p).id }).collect();
        assert_eq!(surviving.len(), t.len());
        let mut uniq = surviving.clone();
        uniq.sort_unstable();
        uniq.dedup();
        assert_eq!(uniq.len(), surviving.len(), "duplicate key after rollback");
        for id in &surviving {
            let probe =
                PanickyKey { id: *id, hash_calls: Rc::new(Cell::new(0)), panic_at: usize::MAX, drops: Rc::new(Cell::new(0)) };
            assert!(t.get(&probe).is_some(), "surviving id {id} not reachable via get");
        }

        drop(t);
        assert_eq!(
            drops.get(),
            26,
            "every PanickyKey ever constructed (25 inserted + the 26th that never finished \
             inserting) must be dropped exactly once: no leak, no double drop"
        );
    }
}
