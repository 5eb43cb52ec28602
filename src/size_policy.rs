//! Maps capacity requests to power-of-two group counts, and hashes to home
//! group indices. See spec section 4.2.

use crate::group::N;

/// Smallest power-of-two group count, at least [`MIN_GROUPS`], whose
/// [`max_load_for_groups`] can hold `n` live elements without an immediate
/// follow-up rehash.
pub(crate) fn groups_for_capacity(n: usize) -> usize {
    let mut groups = MIN_GROUPS;
    while max_load_for_groups(groups) < n {
        groups *= 2;
    }
    groups
}

pub(crate) const MIN_GROUPS: usize = 2;

/// The table's fixed maximum load factor, as a fraction of structural
/// capacity. See spec section 6's public `max_load_factor` surface.
pub(crate) const MAX_LOAD_FACTOR: f64 = 0.875;

/// Live-element capacity a table with `groups` groups can hold structurally
/// (one slot in the final group is reserved for the sentinel).
#[inline]
pub(crate) fn capacity_for_groups(groups: usize) -> usize {
    groups * N - 1
}

/// Element count at which a table with `groups` groups triggers a rehash:
/// 7/8 of structural capacity. See spec section 4.7.
#[inline]
pub(crate) fn max_load_for_groups(groups: usize) -> usize {
    (capacity_for_groups(groups) * 7) / 8
}

/// `size_index` such that `home_group(hash) == hash >> size_index` selects
/// the top `log2(groups)` bits of the (mixed) hash.
#[inline]
pub(crate) fn size_index(groups: usize) -> u32 {
    debug_assert!(groups.is_power_of_two());
    usize::BITS - groups.trailing_zeros()
}

#[inline]
pub(crate) fn home_group(hash: u64, size_index: u32) -> usize {
    (hash >> size_index) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_needs_minimum_groups() {
        assert_eq!(groups_for_capacity(0), MIN_GROUPS);
    }

    #[test]
    fn max_load_covers_requested_size() {
        for n in [1usize, 5, 14, 15, 16, 100, 1000] {
            let groups = groups_for_capacity(n);
            assert!(groups.is_power_of_two());
            assert!(groups >= MIN_GROUPS);
            assert!(max_load_for_groups(groups) >= n, "n={n} groups={groups}");
        }
    }

    #[test]
    fn home_group_uses_top_bits() {
        let groups = 8usize; // size_index = 64 - 3 = 61
        let idx = size_index(groups);
        assert_eq!(idx, 61);
        let hash = 0b101u64 << 61;
        assert_eq!(home_group(hash, idx), 0b101);
    }

    #[test]
    fn groups_is_monotonic_in_n() {
        let mut last = 0;
        for n in 0..2000 {
            let g = groups_for_capacity(n);
            assert!(g >= last);
            last = g;
        }
    }
}
