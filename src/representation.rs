//! Representation state machine of the sketch.
//!
//! A sketch is backed by exactly one of three representations and moves through
//! them in one direction only: `Empty` to `Explicit` on the first value,
//! `Explicit` to `Dense` when the 161st distinct value arrives. Once dense, a
//! sketch never reverts, not even when merged with an empty or smaller sketch.
//!
//! Each variant owns its backing storage directly, so clone, move and drop
//! semantics fall out of the sum type: no two live sketches can share a
//! register array, and a moved-from sketch cannot be observed at all.

use enum_dispatch::enum_dispatch;

use crate::codec::{HllType, EMPTY_SIZE};
use crate::dense::Dense;
use crate::explicit::Explicit;

/// Operations every representation answers for itself. State transitions are
/// not part of the trait; they live in `HllSketch` where the variant is
/// replaced as a whole.
#[enum_dispatch(Representation)]
pub(crate) trait RepresentationTrait {
    /// Cardinality estimate of this representation.
    fn estimate(&self) -> i64;
    /// Upper bound of the serialized size in the current state.
    fn max_serialized_size(&self) -> usize;
    /// Write the wire form into `dst`, returning the number of bytes written.
    fn serialize(&self, dst: &mut [u8]) -> usize;
    /// Bytes owned outside the sketch object itself.
    fn heap_size(&self) -> usize;
}

/// Representation types backing an [`HllSketch`](crate::HllSketch).
///
/// `Dense` backs both the sparse and the full wire encodings; which one a
/// serialize call emits depends only on how many registers are non-zero.
#[enum_dispatch]
#[derive(Clone, Debug, PartialEq)]
pub enum Representation {
    Empty(Empty),
    Explicit(Explicit),
    Dense(Dense),
}

impl Representation {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Representation::Empty(_) => "Empty",
            Representation::Explicit(_) => "Explicit",
            Representation::Dense(_) => "Dense",
        }
    }
}

impl Default for Representation {
    fn default() -> Self {
        Representation::Empty(Empty)
    }
}

/// Empty representation container: no values observed, nothing allocated.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Empty;

impl RepresentationTrait for Empty {
    #[inline]
    fn estimate(&self) -> i64 {
        0
    }

    #[inline]
    fn max_serialized_size(&self) -> usize {
        EMPTY_SIZE
    }

    /// Write the empty wire form: the type tag alone.
    #[inline]
    fn serialize(&self, dst: &mut [u8]) -> usize {
        dst[0] = HllType::Empty as u8;
        EMPTY_SIZE
    }

    #[inline]
    fn heap_size(&self) -> usize {
        0
    }
}
