//! The 16-byte metadata [`Group`]: 15 per-slot state bytes plus one overflow
//! byte, scanned in parallel by whichever backend `group/` selects for the
//! target.

mod generic;
#[cfg(all(target_arch = "aarch64", not(feature = "no-simd")))]
mod neon;
#[cfg(all(
    any(target_arch = "x86", target_arch = "x86_64"),
    not(feature = "no-simd")
))]
mod sse2;

use crate::bitmask::BitMask;

/// Slots per group. Byte 15 (index `N`) is the overflow byte, not a slot.
pub(crate) const N: usize = 15;
pub(crate) const WIDTH: usize = N + 1;

const EMPTY: u8 = 0;
const SENTINEL: u8 = 1;

/// 16-byte, 16-byte-aligned metadata block covering 15 slots plus an
/// overflow byte. See spec section 4.1.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct Group {
    bytes: [u8; WIDTH],
}

/// A single empty group with a trailing sentinel.
const DUMMY: Group = Group {
    bytes: [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 0],
};

/// Process-wide read-only backing for tables with no allocated storage.
/// [`crate::size_policy::MIN_GROUPS`] is 2, so a dummy-backed table's mask
/// can select either slot; both must independently look like a valid,
/// sentinel-terminated one-group table since a `find` on a freshly
/// constructed table can probe either before capacity forces a rehash.
pub(crate) static DUMMY_GROUPS: [Group; 2] = [DUMMY, DUMMY];

impl Group {
    /// Projects the low byte of `hash` into the range used for stored
    /// fragments: never 0 (empty) or 1 (sentinel).
    #[inline]
    pub(crate) fn reduce(hash: u64) -> u8 {
        let byte = hash as u8;
        match byte {
            EMPTY => 2,
            SENTINEL => 3,
            other => other,
        }
    }

    #[inline]
    pub(crate) fn set(&mut self, pos: usize, hash: u64) {
        debug_assert!(pos < N);
        self.bytes[pos] = Self::reduce(hash);
    }

    #[inline]
    pub(crate) fn set_sentinel(&mut self) {
        self.bytes[N - 1] = SENTINEL;
    }

    #[inline]
    pub(crate) fn is_sentinel(&self, pos: usize) -> bool {
        debug_assert!(pos < N);
        self.bytes[pos] == SENTINEL
    }

    #[inline]
    pub(crate) fn reset(&mut self, pos: usize) {
        debug_assert!(pos < N);
        self.bytes[pos] = EMPTY;
    }

    /// Resets every slot and the overflow byte to empty, then re-marks the
    /// sentinel if this is the table's final group.
    #[inline]
    pub(crate) fn clear_all(&mut self, is_last: bool) {
        self.bytes = [0; WIDTH];
        if is_last {
            self.set_sentinel();
        }
    }

    #[inline]
    fn match_value(&self, value: u8) -> BitMask {
        #[cfg(all(
            any(target_arch = "x86", target_arch = "x86_64"),
            not(feature = "no-simd")
        ))]
        {
            unsafe { sse2::match_byte(self.bytes.as_ptr(), value) }
        }
        #[cfg(all(target_arch = "aarch64", not(feature = "no-simd")))]
        {
            unsafe { neon::match_byte(self.bytes.as_ptr(), value) }
        }
        #[cfg(not(any(
            all(
                any(target_arch = "x86", target_arch = "x86_64"),
                not(feature = "no-simd")
            ),
            all(target_arch = "aarch64", not(feature = "no-simd"))
        )))]
        {
            generic::match_byte(&self.bytes, value)
        }
    }

    /// 15-bit mask of slots holding the reduced fragment of `hash`.
    #[inline]
    pub(crate) fn match_hash(&self, hash: u64) -> BitMask {
        self.match_value(Self::reduce(hash))
    }

    /// 15-bit mask of empty slots.
    #[inline]
    pub(crate) fn match_available(&self) -> BitMask {
        self.match_value(EMPTY)
    }

    /// 15-bit mask of non-empty slots (occupied by a fragment or the
    /// sentinel).
    #[inline]
    pub(crate) fn match_occupied(&self) -> BitMask {
        BitMask::new(!self.match_available().0)
    }

    /// [`Self::match_occupied`] with the sentinel slot, if present in this
    /// group, excluded. Only the last group in a table ever has one.
    #[inline]
    pub(crate) fn match_really_occupied(&self) -> BitMask {
        self.match_occupied() - self.match_value(SENTINEL)
    }

    #[inline]
    pub(crate) fn is_not_overflowed(&self, hash: u64) -> bool {
        self.overflow() & (1 << (hash % 8)) == 0
    }

    #[inline]
    pub(crate) fn mark_overflow(&mut self, hash: u64) {
        *self.overflow_mut() |= 1 << (hash % 8);
    }

    #[inline]
    fn overflow(&self) -> u8 {
        self.bytes[N]
    }

    #[inline]
    fn overflow_mut(&mut self) -> &mut u8 {
        &mut self.bytes[N]
    }
}
