//! Post-hash bit mixer applied to hashers that don't already avalanche.
//!
//! A hasher "avalanches" when every output bit depends on every input bit;
//! `FxHash`-style multiplicative hashers are fast but famously don't, which
//! shows up here as clustering in both the group-selection bits (the top of
//! the hash) and the reduced byte (the bottom). The mixer below — `xmx` — is
//! cheap enough to apply to any hasher that hasn't opted out via [`NoMix`].
//!
//! Stable Rust has no specialization, so the table can't inspect an
//! arbitrary `S: BuildHasher` and decide for itself whether it avalanches.
//! Instead the choice is a type parameter: [`Mix`] (the default) always
//! mixes, [`NoMix`] never does. A hasher the caller knows to already
//! avalanche (SipHash, aHash) can be paired with `NoMix` to skip the extra
//! multiply on every lookup and insert.

/// Selects whether [`RawTable`](crate::raw::RawTable) mixes hash output
/// before using it.
pub trait MixMode {
    const MIX: bool;
}

/// Default: always mix. Correct for any hasher, including non-avalanching
/// ones like `FxHash`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Mix;
impl MixMode for Mix {
    const MIX: bool = true;
}

/// Skip mixing. Only sound when the paired hasher is already avalanching.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMix;
impl MixMode for NoMix {
    const MIX: bool = false;
}

/// 64-bit variant of the xmx mixer.
#[inline]
pub(crate) fn mix64(x: u64) -> u64 {
    let mut z = x;
    z ^= z >> 23;
    z = z.wrapping_mul(0xff51_afd7_ed55_8ccd);
    z ^= z >> 23;
    z
}

/// 32-bit variant, used when `usize` is 32 bits wide.
#[inline]
pub(crate) fn mix32(x: u32) -> u32 {
    let mut x = x;
    x ^= x >> 18;
    x = x.wrapping_mul(0x56b5_aaad);
    x ^= x >> 16;
    x
}

/// Alternate multiplier set, kept for experimentation (see spec section 6).
#[allow(dead_code)]
#[inline]
pub(crate) fn mix64_alt(x: u64) -> u64 {
    let mut z = x;
    z ^= z >> 23;
    z = z.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z ^= z >> 23;
    z
}

#[allow(dead_code)]
#[inline]
pub(crate) fn mix32_alt(x: u32) -> u32 {
    let mut x = x;
    x ^= x >> 18;
    x = x.wrapping_mul(0x9E37_79B9);
    x ^= x >> 16;
    x
}

/// Mixes a raw `u64` hash the same way the table does on lookup/insert,
/// unless `M` is [`NoMix`].
///
/// On 32-bit targets the low 32 bits are mixed with [`mix32`] and the high
/// bits cleared, mirroring the source library's ignoring of the unused upper
/// half of `size_t` on those platforms.
#[inline]
pub(crate) fn mix<M: MixMode>(raw: u64) -> u64 {
    if !M::MIX {
        return raw;
    }
    if cfg!(target_pointer_width = "32") {
        mix32(raw as u32) as u64
    } else {
        mix64(raw)
    }
}
