//! ## Dense representation
//! Full register array of the sketch: 16384 one-byte registers, each holding
//! the maximum rank observed among the hash values routed to its bucket.
//!
//! A hash value touches exactly one register: the low [`PRECISION`] bits select
//! the bucket and the rank is the number of trailing zero bits of the remaining
//! high bits, plus one. A sentinel bit is set above the usable tail bits so the
//! rank of an all-zero tail stays bounded.
//!
//! On the wire this single in-memory form backs two encodings: sparse
//! `(index, value)` entries while at most [`SPARSE_THRESHOLD`] registers are
//! non-zero, raw register bytes otherwise. The choice is made per serialize
//! call and is not tracked in memory.

use std::fmt::{Debug, Formatter};

use crate::codec::{
    HllType, PRECISION, REGISTERS, SPARSE_ENTRY_SIZE, SPARSE_HEADER_SIZE, SPARSE_THRESHOLD,
    TAIL_BITS,
};
use crate::representation::RepresentationTrait;

/// Dense representation container
#[derive(Clone, PartialEq)]
pub struct Dense {
    registers: Box<[u8; REGISTERS]>,
}

impl Dense {
    /// Create the representation with all registers at zero.
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            registers: Box::new([0; REGISTERS]),
        }
    }

    /// Materialize registers from explicit hash values being replayed through
    /// the update kernel (explicit-to-dense conversion).
    pub(crate) fn from_hashes(hashes: &[u64]) -> Self {
        let mut dense = Self::new();
        for &hash in hashes {
            dense.update(hash);
        }
        dense
    }

    /// Adopt a decoded full-form register payload.
    pub(crate) fn from_registers(registers: &[u8]) -> Self {
        let mut dense = Self::new();
        dense.registers.copy_from_slice(registers);
        dense
    }

    /// Register-update kernel: route the hash to its bucket and raise that
    /// register to the rank of the remaining bits if larger.
    #[inline]
    pub(crate) fn update(&mut self, hash: u64) {
        let idx = (hash % REGISTERS as u64) as usize;
        // sentinel bit bounds the rank when every tail bit is zero
        let tail = (hash >> PRECISION) | (1u64 << TAIL_BITS);
        let rank = tail.trailing_zeros() as u8 + 1;
        self.registers[idx] = self.registers[idx].max(rank);
    }

    /// Store a decoded register value directly (sparse-form decoding).
    #[inline]
    pub(crate) fn set_register(&mut self, idx: usize, rank: u8) {
        self.registers[idx] = rank;
    }

    /// Absorb another register array by elementwise maximum.
    pub(crate) fn merge(&mut self, other: &Dense) {
        for (lhs, &rhs) in self.registers.iter_mut().zip(other.registers.iter()) {
            *lhs = (*lhs).max(rhs);
        }
    }

    /// Raw register bytes.
    #[inline]
    pub fn registers(&self) -> &[u8] {
        &self.registers[..]
    }

    fn non_zero_registers(&self) -> usize {
        self.registers.iter().filter(|&&rank| rank != 0).count()
    }
}

impl RepresentationTrait for Dense {
    /// Classical HyperLogLog estimate with bias correction and a
    /// linear-counting fallback in the small-cardinality regime.
    fn estimate(&self) -> i64 {
        let mut harmonic_sum = 0.0f64;
        let mut zeros = 0usize;
        for &rank in self.registers.iter() {
            harmonic_sum += 1.0 / (1u64 << rank) as f64;
            if rank == 0 {
                zeros += 1;
            }
        }

        let m = REGISTERS as f64;
        let mut estimate = alpha(REGISTERS) * m * m / harmonic_sum;
        if estimate <= 2.5 * m && zeros > 0 {
            estimate = m * (m / zeros as f64).ln();
        }
        (estimate + 0.5) as i64
    }

    /// Worst case is the full form; the sparse form is always smaller.
    #[inline]
    fn max_serialized_size(&self) -> usize {
        1 + REGISTERS
    }

    /// Write the sparse form `[tag][count:u32][(index:u16, value:u8) x count]`
    /// while at most `SPARSE_THRESHOLD` registers are non-zero, the full form
    /// `[tag][16384 register bytes]` otherwise. Sparse entries are emitted in
    /// ascending index order.
    fn serialize(&self, dst: &mut [u8]) -> usize {
        let non_zero = self.non_zero_registers();
        if non_zero <= SPARSE_THRESHOLD {
            dst[0] = HllType::Sparse as u8;
            dst[1..SPARSE_HEADER_SIZE].copy_from_slice(&(non_zero as u32).to_le_bytes());
            let mut pos = SPARSE_HEADER_SIZE;
            for (idx, &rank) in self.registers.iter().enumerate() {
                if rank != 0 {
                    dst[pos..pos + 2].copy_from_slice(&(idx as u16).to_le_bytes());
                    dst[pos + 2] = rank;
                    pos += SPARSE_ENTRY_SIZE;
                }
            }
            pos
        } else {
            dst[0] = HllType::Full as u8;
            dst[1..1 + REGISTERS].copy_from_slice(&self.registers[..]);
            1 + REGISTERS
        }
    }

    #[inline]
    fn heap_size(&self) -> usize {
        REGISTERS
    }
}

impl Debug for Dense {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Dense {{ non_zero: {} }}", self.non_zero_registers())
    }
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize) -> f64 {
    0.7213 / (1.0 + 1.079 / (m as f64))
}
