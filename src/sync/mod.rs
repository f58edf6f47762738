//! Collective operations for the distributed makers.
//!
//! The makers synchronize three kinds of state across peers: per-node best
//! splits, histogram/statistic buffers, and row-direction bitmaps. All of
//! them reduce element-wise with an associative, commutative operator, so a
//! single [`Collective::allreduce`] over [`Reducible`] values covers them.
//!
//! [`LocalSync`] is the single-process implementation where every collective
//! is the identity; the makers always go through the trait so the
//! single-process and distributed paths share one code shape.

use thiserror::Error;

/// Failure of a collective operation. Aborts the current tree.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("allreduce failed: {0}")]
    AllReduce(String),

    #[error("broadcast failed: {0}")]
    Broadcast(String),

    #[error("peer payload malformed: {0}")]
    Codec(String),
}

// ============================================================================
// Reducible
// ============================================================================

/// Element-wise reduction used by [`Collective::allreduce`].
///
/// `reduce` must be associative and commutative: the order in which peer
/// contributions arrive is unspecified.
pub trait Reducible: Clone + Send {
    fn reduce(&mut self, other: &Self);
}

/// Bitmap words combine with bitwise OR.
impl Reducible for u64 {
    #[inline]
    fn reduce(&mut self, other: &Self) {
        *self |= *other;
    }
}

// ============================================================================
// Collective
// ============================================================================

/// A group of peers that can combine buffers and replicate bytes.
pub trait Collective: Send + Sync {
    /// Rank of this peer in `0..world_size()`.
    fn rank(&self) -> usize;

    /// Number of peers.
    fn world_size(&self) -> usize;

    /// Combine `buf` element-wise across peers; every peer ends up with the
    /// reduction of all contributions.
    fn allreduce<T: Reducible>(&self, buf: &mut [T]) -> Result<(), SyncError>;

    /// Replicate `buf` from `root` to every peer.
    fn broadcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> Result<(), SyncError>;
}

/// Single-process collective: one peer, every operation is the identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalSync;

impl Collective for LocalSync {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn allreduce<T: Reducible>(&self, _buf: &mut [T]) -> Result<(), SyncError> {
        Ok(())
    }

    fn broadcast_bytes(&self, _buf: &mut Vec<u8>, _root: usize) -> Result<(), SyncError> {
        Ok(())
    }
}

// ============================================================================
// BitMap
// ============================================================================

/// Dense bitmap over row ids, reduced across peers with bitwise OR.
#[derive(Clone, Debug, Default)]
pub struct BitMap {
    words: Vec<u64>,
}

impl BitMap {
    /// Resize to hold `n` bits and clear every bit.
    pub fn reset(&mut self, n: usize) {
        self.words.clear();
        self.words.resize(n.div_ceil(64), 0);
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        self.words[i / 64] |= 1u64 << (i % 64);
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        (self.words[i / 64] >> (i % 64)) & 1 == 1
    }

    /// Raw words, for the collective reduction.
    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitmap_set_get() {
        let mut bm = BitMap::default();
        bm.reset(130);
        assert!(!bm.get(0));
        bm.set(0);
        bm.set(64);
        bm.set(129);
        assert!(bm.get(0));
        assert!(bm.get(64));
        assert!(bm.get(129));
        assert!(!bm.get(128));
    }

    #[test]
    fn test_bitmap_reset_clears() {
        let mut bm = BitMap::default();
        bm.reset(10);
        bm.set(3);
        bm.reset(10);
        assert!(!bm.get(3));
    }

    #[test]
    fn test_word_or_reduce() {
        let mut a = 0b0110u64;
        a.reduce(&0b1010u64);
        assert_eq!(a, 0b1110);
    }

    #[test]
    fn test_local_sync_identity() {
        let sync = LocalSync;
        let mut buf = vec![1u64, 2, 3];
        sync.allreduce(&mut buf).unwrap();
        assert_eq!(buf, vec![1, 2, 3]);
        assert_eq!(sync.world_size(), 1);
    }
}
