//! The fixed-length, reference-counted byte block XCodec treats as an atomic
//! dictionary entry.
//!
//! Segments are shared between the dictionary cache, the backref window, and
//! in-flight output buffers (`spec.md` §9, "Reference-counted segments").
//! [`bytes::Bytes`] already gives us exactly that: an atomically
//! reference-counted, cheaply-sliceable byte buffer, the same type the
//! teacher codebase uses for body buffers in `proxy/forwarding.rs`. We only
//! add the invariant that a [`Segment`] is always exactly [`SEGMENT_LEN`]
//! bytes.

use bytes::Bytes;

/// Segment length in bytes. A design constant: changing it invalidates every
/// fingerprint computed under the old value.
pub const SEGMENT_LEN: usize = 128;

/// An immutable, reference-counted, exactly-[`SEGMENT_LEN`]-byte block.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segment(Bytes);

impl Segment {
    /// Wraps `bytes` as a segment.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() != SEGMENT_LEN`. Callers are expected to slice
    /// exactly one window's worth of input before constructing a `Segment`;
    /// this is an internal invariant, not a user-facing validation boundary.
    #[must_use]
    pub fn new(bytes: Bytes) -> Self {
        assert_eq!(bytes.len(), SEGMENT_LEN, "segment must be exactly {SEGMENT_LEN} bytes");
        Self(bytes)
    }

    /// Copies a `SEGMENT_LEN`-byte window out of `window` into a new segment.
    #[must_use]
    pub fn from_window(window: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(window))
    }

    /// Borrows the underlying bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bitwise equality against a raw window, without allocating a
    /// throwaway [`Segment`] for comparison.
    #[must_use]
    pub fn matches(&self, window: &[u8]) -> bool {
        self.0.as_ref() == window
    }
}

impl AsRef<[u8]> for Segment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
