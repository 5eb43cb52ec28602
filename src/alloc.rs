//! The allocator contract: raw allocate/deallocate plus the propagation
//! flags copy/move/swap need to decide whether to steal the other side's
//! arrays or rebuild element-by-element. See spec section 6.
//!
//! Rust's own `Allocator` trait is unstable, and the teacher crate itself
//! calls `std::alloc::{alloc_zeroed, dealloc}` directly rather than
//! threading a generic allocator parameter through `RawInterner` — this
//! trait follows the same shape, just made swappable.

use std::alloc::Layout;

pub trait RawAllocator: Clone {
    /// # Safety
    /// `layout` must have non-zero size. The returned pointer, if non-null,
    /// must be valid for reads/writes of `layout.size()` bytes and aligned
    /// to `layout.align()`, until passed back to [`Self::dealloc`] with an
    /// equal layout.
    unsafe fn alloc(&self, layout: Layout) -> *mut u8;

    /// # Safety
    /// `ptr` must have been returned by a prior [`Self::alloc`] call on an
    /// equal allocator with an equal `layout`, and not already freed.
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout);

    /// Whether all instances of this allocator type compare equal (so
    /// storage allocated by one can always be freed by another).
    const IS_ALWAYS_EQUAL: bool = false;
    const PROPAGATE_ON_COPY: bool = false;
    const PROPAGATE_ON_MOVE: bool = false;
    const PROPAGATE_ON_SWAP: bool = false;
}

/// The ordinary global heap allocator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

impl RawAllocator for Global {
    #[inline]
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        std::alloc::alloc(layout)
    }

    #[inline]
    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        std::alloc::dealloc(ptr, layout)
    }

    const IS_ALWAYS_EQUAL: bool = true;
    const PROPAGATE_ON_COPY: bool = true;
    const PROPAGATE_ON_MOVE: bool = true;
    const PROPAGATE_ON_SWAP: bool = true;
}
