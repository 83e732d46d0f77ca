//! Wire format of the sketch: type tags, field widths, size bounds, structural
//! validation and representation-aware decoding.
//!
//! The constants here are a persistence contract. Serialized sketches live in
//! column pages on disk, so existing tag values and field widths must never
//! change meaning; format evolution is additive via new tags only.

use std::fmt::{self, Display, Formatter};

use byteorder::{ReadBytesExt, LE};

use crate::dense::Dense;
use crate::explicit::Explicit;
use crate::representation::{Empty, Representation};

/// Number of hash bits used to select a register.
pub const PRECISION: u32 = 14;
/// Number of registers backing the dense representation.
pub const REGISTERS: usize = 1 << PRECISION;
/// Hash bits remaining after bucket selection; a sentinel bit at this position
/// bounds the rank computed from them.
pub(crate) const TAIL_BITS: u32 = 64 - PRECISION;
/// Largest rank a correct update can produce: all tail bits zero plus one.
pub(crate) const MAX_RANK: u8 = (TAIL_BITS + 1) as u8;
/// Maximum number of hash values held by the explicit representation.
pub const EXPLICIT_LIMIT: usize = 160;
/// Dense registers serialize as sparse entries while at most this many are non-zero.
pub const SPARSE_THRESHOLD: usize = 4096;
/// Serialized size of an empty sketch: the type tag alone.
pub const EMPTY_SIZE: usize = 1;
/// Upper bound of any serialized sketch: type tag plus all raw registers.
pub const MAX_SERIALIZED_SIZE: usize = 1 + REGISTERS;

/// Explicit header: tag plus one-byte value count.
pub(crate) const EXPLICIT_HEADER_SIZE: usize = 2;
/// Sparse header: tag plus four-byte entry count.
pub(crate) const SPARSE_HEADER_SIZE: usize = 5;
/// Serialized size of one sparse entry: register index plus rank.
pub(crate) const SPARSE_ENTRY_SIZE: usize = 3;

/// On-disk type tags.
///
/// `Sparse` and `Full` both decode into the dense in-memory representation;
/// the distinction exists only in the encoding.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HllType {
    Empty = 0,
    Explicit = 1,
    Sparse = 2,
    Full = 3,
}

impl HllType {
    /// Map a leading wire byte to its type tag.
    #[inline]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(HllType::Empty),
            1 => Some(HllType::Explicit),
            2 => Some(HllType::Sparse),
            3 => Some(HllType::Full),
            _ => None,
        }
    }
}

/// Reasons a serialized buffer is rejected by [`decode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Leading byte is not one of the four known type tags.
    UnknownTag(u8),
    /// Buffer ends before the payload announced by its header.
    Truncated,
    /// Buffer continues past the payload announced by its header.
    TrailingBytes,
    /// Explicit value count or sparse entry count exceeds its format limit.
    CountOutOfRange(usize),
    /// Explicit values or sparse indices are not strictly ascending.
    OutOfOrder,
    /// Sparse entry addresses a register outside the register array.
    IndexOutOfRange(u16),
    /// Register rank exceeds what a 64-bit hash can produce.
    RankOutOfRange(u8),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnknownTag(tag) => write!(f, "unknown type tag {tag}"),
            DecodeError::Truncated => f.write_str("buffer shorter than announced payload"),
            DecodeError::TrailingBytes => f.write_str("buffer longer than announced payload"),
            DecodeError::CountOutOfRange(count) => write!(f, "count {count} out of range"),
            DecodeError::OutOfOrder => f.write_str("values not strictly ascending"),
            DecodeError::IndexOutOfRange(idx) => write!(f, "register index {idx} out of range"),
            DecodeError::RankOutOfRange(rank) => write!(f, "register rank {rank} out of range"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Structural O(1) check of a serialized buffer.
///
/// Reads the type tag and the fixed-position header fields, and verifies the
/// buffer length against the size they announce. Payload contents are not
/// inspected; full validation happens in [`decode`].
pub fn is_valid(src: &[u8]) -> bool {
    let Some(&tag) = src.first() else {
        return false;
    };
    match HllType::from_tag(tag) {
        Some(HllType::Empty) => src.len() == EMPTY_SIZE,
        Some(HllType::Explicit) => {
            src.len() >= EXPLICIT_HEADER_SIZE
                && src.len() == EXPLICIT_HEADER_SIZE + usize::from(src[1]) * 8
        }
        Some(HllType::Sparse) => {
            if src.len() < SPARSE_HEADER_SIZE {
                return false;
            }
            let count = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;
            src.len() == SPARSE_HEADER_SIZE + count * SPARSE_ENTRY_SIZE
        }
        Some(HllType::Full) => src.len() == 1 + REGISTERS,
        None => false,
    }
}

/// Reconstruct an in-memory representation from untrusted serialized bytes.
///
/// All four wire forms are accepted. Beyond the structural checks of
/// [`is_valid`], payloads are fully validated: counts against format limits,
/// explicit values and sparse indices for strict ascending order, sparse
/// indices against the register array bounds, and ranks against the maximum a
/// 64-bit hash can produce. An explicit form with a zero count decodes to the
/// empty representation.
pub(crate) fn decode(src: &[u8]) -> Result<Representation, DecodeError> {
    let mut rdr = src;
    let tag = rdr.read_u8().map_err(|_| DecodeError::Truncated)?;
    let hll_type = HllType::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;
    match hll_type {
        HllType::Empty => {
            if !rdr.is_empty() {
                return Err(DecodeError::TrailingBytes);
            }
            Ok(Representation::Empty(Empty))
        }
        HllType::Explicit => {
            let count = usize::from(rdr.read_u8().map_err(|_| DecodeError::Truncated)?);
            if count > EXPLICIT_LIMIT {
                return Err(DecodeError::CountOutOfRange(count));
            }
            let mut values = Vec::with_capacity(EXPLICIT_LIMIT);
            for _ in 0..count {
                let value = rdr.read_u64::<LE>().map_err(|_| DecodeError::Truncated)?;
                if values.last().is_some_and(|&prev| prev >= value) {
                    return Err(DecodeError::OutOfOrder);
                }
                values.push(value);
            }
            if !rdr.is_empty() {
                return Err(DecodeError::TrailingBytes);
            }
            if values.is_empty() {
                return Ok(Representation::Empty(Empty));
            }
            Ok(Representation::Explicit(Explicit::from_sorted(values)))
        }
        HllType::Sparse => {
            let count = rdr.read_u32::<LE>().map_err(|_| DecodeError::Truncated)? as usize;
            if count > SPARSE_THRESHOLD {
                return Err(DecodeError::CountOutOfRange(count));
            }
            let mut dense = Dense::new();
            let mut prev: Option<u16> = None;
            for _ in 0..count {
                let idx = rdr.read_u16::<LE>().map_err(|_| DecodeError::Truncated)?;
                let rank = rdr.read_u8().map_err(|_| DecodeError::Truncated)?;
                if usize::from(idx) >= REGISTERS {
                    return Err(DecodeError::IndexOutOfRange(idx));
                }
                if prev.is_some_and(|p| p >= idx) {
                    return Err(DecodeError::OutOfOrder);
                }
                if rank > MAX_RANK {
                    return Err(DecodeError::RankOutOfRange(rank));
                }
                dense.set_register(usize::from(idx), rank);
                prev = Some(idx);
            }
            if !rdr.is_empty() {
                return Err(DecodeError::TrailingBytes);
            }
            Ok(Representation::Dense(dense))
        }
        HllType::Full => {
            if rdr.len() < REGISTERS {
                return Err(DecodeError::Truncated);
            }
            if rdr.len() > REGISTERS {
                return Err(DecodeError::TrailingBytes);
            }
            if let Some(&rank) = rdr.iter().find(|&&rank| rank > MAX_RANK) {
                return Err(DecodeError::RankOutOfRange(rank));
            }
            Ok(Representation::Dense(Dense::from_registers(rdr)))
        }
    }
}
