//! `hll-sketch` is a mergeable HyperLogLog distinct-count sketch built for columnar
//! analytical storage: one sketch per column page or partition, updated row by row,
//! merged during the reduce phase of an aggregation, and persisted in a compact,
//! tagged binary form.
//!
//! # Representation design
//!
//! A sketch holds one of three in-memory representations and only ever moves
//! forward through them:
//!
//! ## Empty representation
//! No values observed, no heap allocation. Serializes to a single type byte.
//!
//! ## Explicit representation
//! Up to 160 distinct 64-bit hash values kept as a strictly ascending array.
//! In this regime the cardinality is exact, not estimated.
//!
//! ## Dense representation
//! 16384 one-byte registers, each tracking the maximum observed rank of the
//! hash values routed to its bucket. Entered once the 161st distinct value
//! arrives and never left. The estimate uses the classical HyperLogLog
//! bias-corrected harmonic mean with a linear-counting fallback in the
//! small-cardinality regime.
//!
//! # Binary encoding
//!
//! The serialized layout is a stability contract: persisted tag values and field
//! widths never change meaning. Multi-byte fields are little-endian.
//!
//! | Tag | Form     | Payload                                      | Max size |
//! |-----|----------|----------------------------------------------|----------|
//! | 0   | Empty    | none                                         | 1        |
//! | 1   | Explicit | count:u8, count x u64 values, ascending      | 1282     |
//! | 2   | Sparse   | count:u32, count x (index:u16, value:u8)     | 12293    |
//! | 3   | Full     | 16384 raw register bytes                     | 16385    |
//!
//! Sparse and Full are two encodings of the same dense in-memory registers,
//! chosen at serialize time by how many registers are non-zero: at most 4096
//! non-zero registers emits Sparse, more emits Full. The in-memory object never
//! tracks the distinction.
//!
//! # Example
//!
//! ```
//! use hll_sketch::HllSketch;
//!
//! let mut page = HllSketch::new();
//! for row in 0u64..1000 {
//!     page.insert(&row);
//! }
//!
//! let mut other = HllSketch::new();
//! for row in 500u64..1500 {
//!     other.insert(&row);
//! }
//!
//! page.merge(&other);
//! let estimate = page.estimate_cardinality();
//! assert!((estimate - 1500).abs() < 50);
//!
//! let bytes = page.to_bytes();
//! let restored = HllSketch::from_bytes(&bytes).unwrap();
//! assert_eq!(restored.estimate_cardinality(), estimate);
//! ```

pub mod codec;
mod dense;
mod explicit;
mod representation;
#[cfg(feature = "with_serde")]
mod serde;
pub mod sketch;
pub mod view;

pub use codec::{DecodeError, HllType};
pub use dense::Dense;
pub use explicit::Explicit;
pub use representation::{Empty, Representation};
pub use sketch::HllSketch;
