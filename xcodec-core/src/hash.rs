//! Rolling fingerprint used to find segment boundaries in an input stream.
//!
//! # Algorithm
//!
//! A Horner-style polynomial hash over a fixed-width window:
//!
//! ```text
//! h(b[0..N]) = b[0]*M^(N-1) + b[1]*M^(N-2) + ... + b[N-1]*M^0   (mod 2^64)
//! ```
//!
//! with a fixed odd multiplier `M`. Sliding the window by one byte only
//! requires removing the leading term and re-applying Horner's step, which is
//! the one multiply-add per byte called for by `spec.md` §4.1:
//!
//! ```text
//! h' = (h - dropped*M^(N-1)) * M + added
//! ```
//!
//! `M^(N-1)` is precomputed once for the fixed `SEGMENT_LEN` window and never
//! recomputed per call. All arithmetic wraps modulo 2^64, which is exactly
//! what `u64` wrapping operations give us for free.

use crate::segment::SEGMENT_LEN;

/// Multiplier for the rolling hash. An odd 64-bit constant (Fibonacci hashing
/// constant) so it is invertible mod 2^64 and mixes bits well across a
/// 128-byte window.
const MULTIPLIER: u64 = 0x9E37_79B9_7F4A_7C15;

/// `MULTIPLIER ^ (SEGMENT_LEN - 1) mod 2^64`, the weight of the byte that
/// falls out of the window on each `roll`.
const DROP_WEIGHT: u64 = const_pow(MULTIPLIER, SEGMENT_LEN as u32 - 1);

const fn const_pow(base: u64, exp: u32) -> u64 {
    let mut result: u64 = 1;
    let mut b = base;
    let mut e = exp;
    while e > 0 {
        if e & 1 == 1 {
            result = result.wrapping_mul(b);
        }
        b = b.wrapping_mul(b);
        e >>= 1;
    }
    result
}

/// A 64-bit fingerprint over exactly [`SEGMENT_LEN`] bytes.
pub type Fingerprint = u64;

/// Hashes a full `SEGMENT_LEN`-byte window from scratch.
///
/// # Panics
///
/// Panics if `bytes.len() != SEGMENT_LEN`, since a fingerprint is only ever
/// defined over a complete segment.
#[must_use]
pub fn hash_segment(bytes: &[u8]) -> Fingerprint {
    debug_assert_eq!(bytes.len(), SEGMENT_LEN, "fingerprint requires a full segment");
    let mut h: u64 = 0;
    for &b in bytes {
        h = h.wrapping_mul(MULTIPLIER).wrapping_add(u64::from(b));
    }
    h
}

/// Rolls a fingerprint forward by one byte: `dropped` leaves the window at
/// its front, `added` joins it at the back. Returns the same value as
/// calling [`hash_segment`] on the shifted window.
#[must_use]
#[inline]
pub fn roll(old: Fingerprint, dropped: u8, added: u8) -> Fingerprint {
    let without_leading = old.wrapping_sub(u64::from(dropped).wrapping_mul(DROP_WEIGHT));
    without_leading.wrapping_mul(MULTIPLIER).wrapping_add(u64::from(added))
}

/// Incremental rolling-hash cursor over a sliding `SEGMENT_LEN`-byte window.
///
/// Mirrors the shape of a classic rolling-checksum API (`new`, `update`,
/// `roll`, `value`) so the encoder can keep one live cursor per connection
/// instead of recomputing `hash_segment` on every byte.
#[derive(Clone, Copy, Debug, Default)]
pub struct RollingHash {
    value: Fingerprint,
    len: usize,
}

impl RollingHash {
    /// Creates an empty rolling hash.
    #[must_use]
    pub const fn new() -> Self {
        Self { value: 0, len: 0 }
    }

    /// Resets to the empty state.
    pub fn reset(&mut self) {
        self.value = 0;
        self.len = 0;
    }

    /// Number of bytes folded in so far (saturates at [`SEGMENT_LEN`]).
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Folds in one more byte while the window is still filling.
    ///
    /// # Panics
    ///
    /// Panics if the window is already full; call [`Self::roll`] instead.
    pub fn push(&mut self, byte: u8) {
        assert!(self.len < SEGMENT_LEN, "window already full, use roll()");
        self.value = self.value.wrapping_mul(MULTIPLIER).wrapping_add(u64::from(byte));
        self.len += 1;
    }

    /// Slides a full window forward by one byte.
    ///
    /// # Panics
    ///
    /// Panics if the window is not yet full.
    pub fn roll(&mut self, dropped: u8, added: u8) {
        assert_eq!(self.len, SEGMENT_LEN, "window not yet full, use push()");
        self.value = roll(self.value, dropped, added);
    }

    /// Current fingerprint value.
    #[must_use]
    pub const fn value(&self) -> Fingerprint {
        self.value
    }
}
