//! Process-wide (or per-peer — the caller decides the scope) dictionary
//! cache mapping fingerprint to segment.
//!
//! `spec.md` §5 calls for "a lock-striped or single-mutex design"; rather
//! than hand-roll one, this wraps [`dashmap::DashMap`], a sharded concurrent
//! map that gives exactly that property out of the box, keyed by an
//! [`ahash::RandomState`] hasher for the fast, non-cryptographic hashing the
//! teacher codebase already reaches for elsewhere (`tcp/handler.rs`'s
//! `ahash::RandomState` for backend selection). Since the map key is already
//! a 64-bit hash value, `ahash` is used purely for its speed, not for
//! distribution quality on the key itself.

use std::sync::Arc;

use dashmap::DashMap;

use crate::hash::Fingerprint;
use crate::segment::Segment;

/// Outcome of inserting a segment under a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterOutcome {
    /// No prior entry existed; the segment is now cached under `f`.
    Inserted,
    /// An identical segment was already cached under `f`; no-op.
    AlreadyPresent,
    /// A *different* segment is already cached under `f` — first-writer-wins,
    /// so this insert was rejected. Caller decides what that means for it
    /// (see `spec.md` §4.2: demote-to-literal on encode, stream-fatal on
    /// decode).
    Collision,
}

/// A process-wide or per-peer mapping from fingerprint to segment.
///
/// Cheaply cloneable (an `Arc` handle to the same backing map), so a single
/// `DictionaryCache` can be shared across every [`crate::pipe::PipePair`]
/// that should see each other's learned segments, or constructed fresh per
/// pair for isolation in tests. `spec.md` §9: "Replace with a cache handle
/// passed into each pipe-pair constructor; composition over global state."
#[derive(Clone, Debug, Default)]
pub struct DictionaryCache {
    inner: Arc<DashMap<Fingerprint, Segment, ahash::RandomState>>,
}

impl DictionaryCache {
    /// Creates an empty, unbounded cache. The simplest correct eviction
    /// policy — never evict — per `spec.md` §9's open question.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(DashMap::with_hasher(ahash::RandomState::new())) }
    }

    /// Looks up the segment stored under `fingerprint`, if any.
    #[must_use]
    pub fn lookup(&self, fingerprint: Fingerprint) -> Option<Segment> {
        self.inner.get(&fingerprint).map(|entry| entry.value().clone())
    }

    /// Inserts `segment` under `fingerprint` if the slot is empty, compares
    /// bitwise if it is occupied. The check-and-insert happens under the
    /// shard's lock so it is atomic with respect to concurrent `enter`s on
    /// the same fingerprint (`spec.md` §5).
    pub fn enter(&self, fingerprint: Fingerprint, segment: Segment) -> EnterOutcome {
        match self.inner.entry(fingerprint) {
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(segment);
                EnterOutcome::Inserted
            }
            dashmap::mapref::entry::Entry::Occupied(slot) => {
                if slot.get().matches(segment.as_bytes()) {
                    EnterOutcome::AlreadyPresent
                } else {
                    EnterOutcome::Collision
                }
            }
        }
    }

    /// Number of distinct fingerprints currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
