//! Legacy read-only access to serialized sketch bytes.
//!
//! An older bulk-load pipeline reads and writes the same wire layout as the
//! core codec but works over caller-provided buffers without taking ownership
//! and without materializing a sketch. [`SketchView`] is that non-owning
//! parse, [`encode_explicit`]/[`encode_sparse`]/[`encode_full`] are the
//! matching buffer builders. Both sides are implemented directly against the
//! wire layout in [`codec`](crate::codec) and share no state with the core
//! codec paths.

use std::collections::{BTreeMap, BTreeSet};

use byteorder::{ReadBytesExt, LE};

use crate::codec::{
    DecodeError, HllType, EXPLICIT_HEADER_SIZE, EXPLICIT_LIMIT, REGISTERS, SPARSE_ENTRY_SIZE,
    SPARSE_HEADER_SIZE, SPARSE_THRESHOLD,
};

/// Non-owning view over one serialized sketch.
///
/// Borrows the buffer for its lifetime; per-field accessors read from the
/// borrowed bytes instead of copying them out (the sparse mapping is the one
/// exception, collected into a map during parse for keyed lookup).
#[derive(Debug)]
pub struct SketchView<'a> {
    hll_type: HllType,
    /// Explicit payload bytes: count x 8-byte values.
    explicit: &'a [u8],
    /// Full payload bytes: the raw register array.
    full: Option<&'a [u8]>,
    sparse: BTreeMap<u16, u8>,
}

impl<'a> SketchView<'a> {
    /// Parse a serialized buffer into a view.
    ///
    /// Validates the structure (tag, announced lengths, sparse index bounds)
    /// but, unlike the core decoder, does not enforce value ordering: the old
    /// pipeline tolerated writers that emitted unsorted entries.
    pub fn parse(buf: &'a [u8]) -> Result<Self, DecodeError> {
        let mut rdr = buf;
        let tag = rdr.read_u8().map_err(|_| DecodeError::Truncated)?;
        let hll_type = HllType::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;

        let mut view = Self {
            hll_type,
            explicit: &[],
            full: None,
            sparse: BTreeMap::new(),
        };

        match hll_type {
            HllType::Empty => {
                if !rdr.is_empty() {
                    return Err(DecodeError::TrailingBytes);
                }
            }
            HllType::Explicit => {
                let count = usize::from(rdr.read_u8().map_err(|_| DecodeError::Truncated)?);
                if count > EXPLICIT_LIMIT {
                    return Err(DecodeError::CountOutOfRange(count));
                }
                if rdr.len() < count * 8 {
                    return Err(DecodeError::Truncated);
                }
                if rdr.len() > count * 8 {
                    return Err(DecodeError::TrailingBytes);
                }
                view.explicit = rdr;
            }
            HllType::Sparse => {
                let count = rdr.read_u32::<LE>().map_err(|_| DecodeError::Truncated)? as usize;
                for _ in 0..count {
                    let idx = rdr.read_u16::<LE>().map_err(|_| DecodeError::Truncated)?;
                    let value = rdr.read_u8().map_err(|_| DecodeError::Truncated)?;
                    if usize::from(idx) >= REGISTERS {
                        return Err(DecodeError::IndexOutOfRange(idx));
                    }
                    view.sparse.insert(idx, value);
                }
                if !rdr.is_empty() {
                    return Err(DecodeError::TrailingBytes);
                }
            }
            HllType::Full => {
                if rdr.len() < REGISTERS {
                    return Err(DecodeError::Truncated);
                }
                if rdr.len() > REGISTERS {
                    return Err(DecodeError::TrailingBytes);
                }
                view.full = Some(rdr);
            }
        }

        Ok(view)
    }

    /// Wire type of the parsed buffer.
    #[inline]
    pub fn hll_type(&self) -> HllType {
        self.hll_type
    }

    /// Number of values in an explicit buffer, zero for other types.
    #[inline]
    pub fn explicit_count(&self) -> usize {
        self.explicit.len() / 8
    }

    /// Explicit value at `index`, read from the borrowed bytes.
    pub fn explicit_value(&self, index: usize) -> Option<u64> {
        let bytes = self.explicit.get(index * 8..index * 8 + 8)?;
        Some(u64::from_le_bytes(bytes.try_into().ok()?))
    }

    /// Raw register bytes of a full buffer.
    #[inline]
    pub fn full_registers(&self) -> Option<&'a [u8]> {
        self.full
    }

    /// Register index to value mapping of a sparse buffer.
    #[inline]
    pub fn sparse_map(&self) -> &BTreeMap<u16, u8> {
        &self.sparse
    }
}

/// Build an explicit wire buffer from a sorted distinct value set.
///
/// The set must not exceed [`EXPLICIT_LIMIT`] values; larger sets belong in a
/// register encoding.
pub fn encode_explicit(values: &BTreeSet<u64>) -> Vec<u8> {
    assert!(values.len() <= EXPLICIT_LIMIT);
    let mut buf = Vec::with_capacity(EXPLICIT_HEADER_SIZE + values.len() * 8);
    buf.push(HllType::Explicit as u8);
    buf.push(values.len() as u8);
    for &value in values {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf
}

/// Build a sparse wire buffer from a register index to value mapping.
///
/// The mapping must hold at most [`SPARSE_THRESHOLD`] entries and only indices
/// inside the register array; anything else would not decode.
pub fn encode_sparse(registers: &BTreeMap<u16, u8>) -> Vec<u8> {
    assert!(registers.len() <= SPARSE_THRESHOLD);
    let mut buf = Vec::with_capacity(SPARSE_HEADER_SIZE + registers.len() * SPARSE_ENTRY_SIZE);
    buf.push(HllType::Sparse as u8);
    buf.extend_from_slice(&(registers.len() as u32).to_le_bytes());
    for (&idx, &value) in registers {
        assert!(usize::from(idx) < REGISTERS);
        buf.extend_from_slice(&idx.to_le_bytes());
        buf.push(value);
    }
    buf
}

/// Build a full wire buffer from a register index to value mapping; registers
/// absent from the mapping are written as zero. Indices must lie inside the
/// register array.
pub fn encode_full(registers: &BTreeMap<u16, u8>) -> Vec<u8> {
    let mut buf = vec![0u8; 1 + REGISTERS];
    buf[0] = HllType::Full as u8;
    for (&idx, &value) in registers {
        assert!(usize::from(idx) < REGISTERS);
        buf[1 + usize::from(idx)] = value;
    }
    buf
}
