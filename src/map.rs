//! `HashMap<K, V, S, M, E, A>`: the core table configured to store `(K, V)`
//! pairs, keyed by `K`. See `set.rs` for the sibling configuration and the
//! shared grounding in the teacher crate's `Interner<T, S>`.

use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::iter::FromIterator;

use crate::alloc::{Global, RawAllocator};
use crate::eq::{DefaultEq, KeyEqual};
use crate::mix::{Mix, MixMode};
use crate::policy::MapPolicy;
use crate::raw::{RawIntoIter, RawTable};

/// Default hasher, matching the standard library's.
pub type DefaultHashBuilder = RandomState;

/// An open-addressed, SIMD-probed hash map.
pub struct HashMap<K, V, S = DefaultHashBuilder, M = Mix, E = DefaultEq, A = Global>
where
    A: RawAllocator,
{
    raw: RawTable<MapPolicy<K, V>, S, M, E, A>,
}

impl<K, V> HashMap<K, V, DefaultHashBuilder> {
    /// Creates an empty `HashMap`. Does not allocate until the first insert.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty `HashMap` that can hold at least `capacity` entries
    /// without reallocating.
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, DefaultHashBuilder::default())
    }
}

impl<K, V, S, M, E, A> HashMap<K, V, S, M, E, A>
where
    E: Default,
    A: RawAllocator + Default,
{
    /// Creates an empty `HashMap` using the given hash builder.
    ///
    /// Warning: `hash_builder` is normally randomly generated to resist
    /// collision-flooding attacks; setting it manually can expose a DoS
    /// vector.
    #[inline]
    pub fn with_hasher(hash_builder: S) -> Self {
        Self { raw: RawTable::new_in(hash_builder, E::default(), A::default()) }
    }

    /// Creates an empty `HashMap` with the given capacity and hash builder.
    #[inline]
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        Self { raw: RawTable::with_capacity_in(capacity, hash_builder, E::default(), A::default()) }
    }
}

impl<K, V, S, M, E, A> HashMap<K, V, S, M, E, A>
where
    A: RawAllocator,
{
    #[inline]
    pub fn hasher(&self) -> &S {
        self.raw.hasher()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.raw.capacity()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.raw.clear()
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter { inner: self.raw.iter() }
    }
}

impl<K, V, S, M, E, A> HashMap<K, V, S, M, E, A>
where
    K: Hash,
    S: BuildHasher,
    M: MixMode,
    E: KeyEqual<K>,
    A: RawAllocator,
{
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.raw.contains(key)
    }

    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.raw.get(key).map(|(_, v)| v)
    }

    #[inline]
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.raw.get_mut(key).map(|(_, v)| v)
    }

    /// Inserts a key-value pair, returning the previous value if the key was
    /// already present.
    #[inline]
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.raw.insert((key, value)).map(|(_, v)| v)
    }

    /// Removes a key, returning its value if it was present.
    #[inline]
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.raw.remove(key).map(|(_, v)| v)
    }

    #[inline]
    pub fn reserve(&mut self, additional: usize) {
        self.raw.reserve(additional)
    }

    /// Ensures capacity for at least `max(capacity, len())` entries,
    /// rehashing unconditionally if the resulting table size differs from
    /// the current one — unlike [`Self::reserve`], which only grows when
    /// needed.
    #[inline]
    pub fn rehash(&mut self, capacity: usize) {
        self.raw.rehash(capacity)
    }

    /// Builds the whole `(key, value)` pair via `make` and inserts it only if
    /// no equivalent key is already present; on a hit the newly built pair is
    /// dropped and the existing entry's value is returned untouched. Returns
    /// a reference to whichever value now occupies the slot, plus whether an
    /// insertion happened.
    #[inline]
    pub fn emplace_with(&mut self, make: impl FnOnce() -> (K, V)) -> (&mut V, bool) {
        let (slot, inserted) = self.raw.emplace_with(make);
        (&mut slot.1, inserted)
    }

    /// Looks up `key` first and only calls `make` — which builds the value
    /// from a borrow of the now-owned key — on a miss, so an expensive value
    /// is never constructed for an already-present key. Returns a reference
    /// to whichever value now occupies the slot, plus whether an insertion
    /// happened.
    #[inline]
    pub fn try_emplace_with(&mut self, key: K, make: impl FnOnce(&K) -> V) -> (&mut V, bool) {
        let (slot, inserted) = self.raw.try_emplace_with(key, |k| {
            let value = make(&k);
            (k, value)
        });
        (&mut slot.1, inserted)
    }
}

impl<K, V, S, M, E, A> HashMap<K, V, S, M, E, A>
where
    A: RawAllocator,
{
    /// The map's key-equality policy.
    #[inline]
    pub fn key_eq(&self) -> &E {
        self.raw.key_eq()
    }

    /// The map's allocator.
    #[inline]
    pub fn allocator(&self) -> &A {
        self.raw.allocator()
    }

    /// `len() / capacity()`, or `0.0` for an unallocated map.
    #[inline]
    pub fn load_factor(&self) -> f64 {
        self.raw.load_factor()
    }

    /// The fixed threshold, as a fraction of capacity, above which an
    /// insert triggers a rehash.
    #[inline]
    pub fn max_load_factor(&self) -> f64 {
        self.raw.max_load_factor()
    }
}

impl<K, V, S, M, E, A> HashMap<K, V, S, M, E, A>
where
    A: RawAllocator,
{
    /// Swaps the contents of two maps, including their hashers, equality
    /// policies, and (subject to the allocator's propagation policy,
    /// [`RawAllocator::PROPAGATE_ON_SWAP`]) their allocators.
    #[inline]
    pub fn swap(&mut self, other: &mut Self) {
        self.raw.swap(&mut other.raw)
    }
}

impl<K, V, S, M, E, A> Default for HashMap<K, V, S, M, E, A>
where
    S: Default,
    E: Default,
    A: RawAllocator + Default,
{
    #[inline]
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S, M, E, A> Clone for HashMap<K, V, S, M, E, A>
where
    K: Clone + Hash,
    V: Clone,
    S: Clone + BuildHasher,
    M: MixMode,
    E: Clone + KeyEqual<K>,
    A: RawAllocator,
{
    #[inline]
    fn clone(&self) -> Self {
        Self { raw: self.raw.clone() }
    }
}

impl<K, V, S, M, E, A> fmt::Debug for HashMap<K, V, S, M, E, A>
where
    K: fmt::Debug,
    V: fmt::Debug,
    A: RawAllocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S, M, E, A> Extend<(K, V)> for HashMap<K, V, S, M, E, A>
where
    K: Hash,
    S: BuildHasher,
    M: MixMode,
    E: KeyEqual<K>,
    A: RawAllocator,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S, M, E, A> FromIterator<(K, V)> for HashMap<K, V, S, M, E, A>
where
    K: Hash,
    S: BuildHasher + Default,
    M: MixMode,
    E: KeyEqual<K> + Default,
    A: RawAllocator + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::default();
        map.extend(iter);
        map
    }
}

/// Borrowing iterator over a [`HashMap`]'s entries, in unspecified order.
pub struct Iter<'a, K, V> {
    inner: crate::iter::RawIter<'a, (K, V)>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        self.inner.next().map(|ptr| {
            let (k, v) = unsafe { &*ptr };
            (k, v)
        })
    }
}

impl<'a, K, V, S, M, E, A> IntoIterator for &'a HashMap<K, V, S, M, E, A>
where
    A: RawAllocator,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    #[inline]
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

/// Owning iterator over a [`HashMap`]'s entries, in unspecified order.
pub struct IntoIter<K, V, A: RawAllocator> {
    inner: RawIntoIter<(K, V), A>,
}

impl<K, V, A: RawAllocator> Iterator for IntoIter<K, V, A> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        self.inner.next()
    }
}

impl<K, V, S, M, E, A: RawAllocator> IntoIterator for HashMap<K, V, S, M, E, A> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, A>;

    #[inline]
    fn into_iter(self) -> IntoIter<K, V, A> {
        IntoIter { inner: self.raw.into_iter() }
    }
}
