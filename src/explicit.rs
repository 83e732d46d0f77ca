//! ## Explicit representation
//! Exact small-set storage for up to [`EXPLICIT_LIMIT`] distinct 64-bit hash
//! values, kept strictly ascending. Below the limit the reported cardinality is
//! exact, so small distinct counts carry no estimation error at all.
//!
//! The backing vector is allocated once at full capacity and never grows, so a
//! sketch in this regime owns exactly one fixed-size allocation.

use std::fmt::{Debug, Formatter};
use std::mem::size_of;

use crate::codec::{HllType, EXPLICIT_HEADER_SIZE, EXPLICIT_LIMIT};
use crate::representation::RepresentationTrait;

/// Explicit representation container
#[derive(PartialEq)]
pub struct Explicit {
    /// Strictly ascending distinct hash values, at most `EXPLICIT_LIMIT` of them.
    values: Vec<u64>,
}

/// Hand-written so the clone keeps the full `EXPLICIT_LIMIT` capacity; a
/// derived clone would allocate only `len` slots and grow on later inserts.
impl Clone for Explicit {
    fn clone(&self) -> Self {
        let mut values = Vec::with_capacity(EXPLICIT_LIMIT);
        values.extend_from_slice(&self.values);
        Self { values }
    }
}

impl Explicit {
    /// Create the representation holding a single hash value.
    #[inline]
    pub(crate) fn with_hash(hash: u64) -> Self {
        let mut values = Vec::with_capacity(EXPLICIT_LIMIT);
        values.push(hash);
        Self { values }
    }

    /// Adopt an already sorted, deduplicated value sequence (decoded wire payload).
    pub(crate) fn from_sorted(values: Vec<u64>) -> Self {
        debug_assert!(values.windows(2).all(|w| w[0] < w[1]));
        debug_assert!(!values.is_empty() && values.len() <= EXPLICIT_LIMIT);
        Self { values }
    }

    /// Insert a hash value at its sorted position.
    /// Returns true on success (including an already present value), false when
    /// the value is new but the representation is at capacity.
    #[inline]
    pub(crate) fn insert(&mut self, hash: u64) -> bool {
        match self.values.binary_search(&hash) {
            Ok(_) => true,
            Err(pos) => {
                if self.values.len() == EXPLICIT_LIMIT {
                    return false;
                }
                self.values.insert(pos, hash);
                true
            }
        }
    }

    /// Hash values stored in this representation, ascending.
    #[inline]
    pub fn values(&self) -> &[u64] {
        &self.values
    }

    /// Number of distinct hash values stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl RepresentationTrait for Explicit {
    /// Exact count of the stored distinct values.
    #[inline]
    fn estimate(&self) -> i64 {
        self.values.len() as i64
    }

    #[inline]
    fn max_serialized_size(&self) -> usize {
        EXPLICIT_HEADER_SIZE + self.values.len() * 8
    }

    /// Write the explicit wire form: `[tag][count:u8][count x u64]`, ascending.
    fn serialize(&self, dst: &mut [u8]) -> usize {
        dst[0] = HllType::Explicit as u8;
        dst[1] = self.values.len() as u8;
        let mut pos = EXPLICIT_HEADER_SIZE;
        for &value in &self.values {
            dst[pos..pos + 8].copy_from_slice(&value.to_le_bytes());
            pos += 8;
        }
        pos
    }

    /// Fixed size of the backing allocation, independent of fill level.
    #[inline]
    fn heap_size(&self) -> usize {
        self.values.capacity() * size_of::<u64>()
    }
}

impl Debug for Explicit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Explicit {{ len: {} }}", self.values.len())
    }
}
