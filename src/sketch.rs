//! The sketch entity: per-row updates, partition merges, cardinality reads and
//! the binary codec entry points used by the storage layer.

use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::mem::size_of;

use wyhash::WyHash;

use crate::codec::{self, DecodeError, HllType, EMPTY_SIZE};
use crate::dense::Dense;
use crate::explicit::Explicit;
use crate::representation::{Empty, Representation, RepresentationTrait};

/// Approximate distinct-count sketch.
///
/// Feed it 64-bit hash values through [`update`](Self::update) (or hashable
/// items through [`insert`](Self::insert)), combine partition-local sketches
/// with [`merge`](Self::merge), then read the estimate or serialize.
///
/// A sketch is not internally synchronized; `&mut self` on every mutating
/// operation means partition-local accumulation is single-threaded by
/// construction and a shared reduce accumulator needs external exclusion.
#[derive(Clone, Default, PartialEq)]
pub struct HllSketch {
    repr: Representation,
}

impl HllSketch {
    /// Create an empty sketch. Allocates nothing.
    #[inline]
    pub fn new() -> Self {
        Self {
            repr: Representation::Empty(Empty),
        }
    }

    /// Create a sketch holding one hash value.
    #[inline]
    pub fn from_hash(hash: u64) -> Self {
        Self {
            repr: Representation::Explicit(Explicit::with_hash(hash)),
        }
    }

    /// Current backing representation.
    #[inline]
    pub fn representation(&self) -> &Representation {
        &self.repr
    }

    /// Hash an item with [`WyHash`] and add it to the sketch.
    ///
    /// Callers that hash values themselves (e.g. a SQL layer with its own hash
    /// function) should call [`update`](Self::update) with the 64-bit hash
    /// directly; the sketch assumes uniformly distributed hashes either way.
    #[inline]
    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        let mut hasher = WyHash::default();
        item.hash(&mut hasher);
        self.update(hasher.finish());
    }

    /// Add a hash value to the sketch.
    #[inline]
    pub fn update(&mut self, hash: u64) {
        match &mut self.repr {
            Representation::Empty(_) => {
                self.repr = Representation::Explicit(Explicit::with_hash(hash));
            }
            Representation::Explicit(set) => {
                if !set.insert(hash) {
                    // 161st distinct value: replay the explicit set through the
                    // register kernel, then apply the pending hash
                    let mut dense = Dense::from_hashes(set.values());
                    dense.update(hash);
                    self.repr = Representation::Dense(dense);
                }
            }
            Representation::Dense(dense) => dense.update(hash),
        }
    }

    /// Absorb another sketch, producing the same logical result as if every
    /// hash given to `other` had been given to `self` directly.
    ///
    /// `other` is only read. Merging never steps the representation backwards:
    /// a dense sketch stays dense regardless of what is merged into it.
    pub fn merge(&mut self, other: &Self) {
        match &other.repr {
            Representation::Empty(_) => {}
            Representation::Explicit(rhs) => match &self.repr {
                Representation::Empty(_) => {
                    self.repr = Representation::Explicit(rhs.clone());
                }
                _ => {
                    // explicit self converts mid-way if the capacity is exceeded
                    for &hash in rhs.values() {
                        self.update(hash);
                    }
                }
            },
            Representation::Dense(rhs) => match &mut self.repr {
                Representation::Empty(_) => {
                    self.repr = Representation::Dense(rhs.clone());
                }
                Representation::Explicit(lhs) => {
                    let mut dense = rhs.clone();
                    for &hash in lhs.values() {
                        dense.update(hash);
                    }
                    self.repr = Representation::Dense(dense);
                }
                Representation::Dense(lhs) => lhs.merge(rhs),
            },
        }
    }

    /// Approximate number of distinct hash values observed.
    ///
    /// Exact while the sketch is empty or explicit; estimated within the
    /// standard HyperLogLog error bound (about 0.81% at this register count)
    /// once dense.
    #[inline]
    pub fn estimate_cardinality(&self) -> i64 {
        self.repr.estimate()
    }

    /// Upper bound of [`serialize`](Self::serialize) output for the current
    /// representation.
    #[inline]
    pub fn max_serialized_size(&self) -> usize {
        self.repr.max_serialized_size()
    }

    /// Write the wire form into `dst` and return the number of bytes written.
    ///
    /// `dst` must hold at least [`max_serialized_size`](Self::max_serialized_size)
    /// bytes; this is a precondition, and an undersized buffer panics rather
    /// than returning an error.
    #[inline]
    pub fn serialize(&self, dst: &mut [u8]) -> usize {
        self.repr.serialize(dst)
    }

    /// Serialize into a freshly allocated, exactly sized buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.max_serialized_size()];
        let written = self.serialize(&mut buf);
        buf.truncate(written);
        buf
    }

    /// Reconstruct a sketch from untrusted serialized bytes.
    ///
    /// Accepts all four wire forms and fully validates the payload. This is
    /// the round-trip counterpart of [`serialize`](Self::serialize); the
    /// narrower [`deserialize`](Self::deserialize) keeps its historical
    /// empty-only contract.
    pub fn from_bytes(src: &[u8]) -> Result<Self, DecodeError> {
        codec::decode(src).map(|repr| Self { repr })
    }

    /// Reconstruct from serialized bytes, supporting only the empty form.
    ///
    /// Returns false for anything but a valid empty encoding; non-empty forms
    /// go through [`from_bytes`](Self::from_bytes) instead. On success the
    /// sketch is reset to the empty state.
    pub fn deserialize(&mut self, src: &[u8]) -> bool {
        if !codec::is_valid(src) {
            return false;
        }
        if src[0] != HllType::Empty as u8 {
            return false;
        }
        self.clear();
        true
    }

    /// Structural O(1) check whether `src` looks like a serialized sketch.
    ///
    /// Verifies the type tag and the lengths announced by fixed-position
    /// header fields; payload contents of non-empty forms are not validated.
    #[inline]
    pub fn is_valid(src: &[u8]) -> bool {
        codec::is_valid(src)
    }

    /// Canonical serialized form of an empty sketch.
    #[inline]
    pub fn empty_bytes() -> [u8; EMPTY_SIZE] {
        [HllType::Empty as u8]
    }

    /// Memory footprint: the object itself plus the backing allocation of the
    /// current representation.
    #[inline]
    pub fn memory_consumed(&self) -> usize {
        size_of::<Self>() + self.repr.heap_size()
    }

    /// Reset to the empty state, releasing any backing allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.repr = Representation::Empty(Empty);
    }
}

impl Debug for HllSketch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ representation: {}, estimate: {} }}",
            self.repr.name(),
            self.estimate_cardinality()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{EXPLICIT_LIMIT, REGISTERS, SPARSE_THRESHOLD};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    // distinct with overwhelming probability: u64 collisions within these
    // sample sizes are on the order of 1e-11
    fn distinct_hashes(n: usize, seed: u64) -> Vec<u64> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen::<u64>()).collect()
    }

    fn sketch_of(hashes: &[u64]) -> HllSketch {
        let mut sketch = HllSketch::new();
        for &h in hashes {
            sketch.update(h);
        }
        sketch
    }

    #[test_case(0 => "Empty"; "no values")]
    #[test_case(1 => "Explicit"; "single value")]
    #[test_case(EXPLICIT_LIMIT => "Explicit"; "at capacity")]
    #[test_case(EXPLICIT_LIMIT + 1 => "Dense"; "one over capacity")]
    #[test_case(1000 => "Dense"; "well past capacity")]
    fn test_representation_transitions(n: usize) -> &'static str {
        sketch_of(&distinct_hashes(n, 7)).representation().name()
    }

    #[test]
    fn test_exact_below_capacity_any_order() {
        let hashes = distinct_hashes(EXPLICIT_LIMIT, 11);
        let forward = sketch_of(&hashes);
        let mut reversed: Vec<u64> = hashes.clone();
        reversed.reverse();
        let backward = sketch_of(&reversed);

        assert_eq!(forward.estimate_cardinality(), EXPLICIT_LIMIT as i64);
        assert_eq!(backward.estimate_cardinality(), EXPLICIT_LIMIT as i64);
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_explicit_sorted_dedup_invariant() {
        let mut hashes = distinct_hashes(100, 13);
        // feed every value twice
        hashes.extend_from_slice(&hashes.clone());
        let sketch = sketch_of(&hashes);

        let Representation::Explicit(set) = sketch.representation() else {
            panic!("expected explicit representation");
        };
        assert_eq!(set.len(), 100);
        assert!(set.values().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_duplicates_at_capacity_do_not_convert() {
        let hashes = distinct_hashes(EXPLICIT_LIMIT, 17);
        let mut sketch = sketch_of(&hashes);
        for &h in &hashes {
            sketch.update(h);
        }
        assert!(matches!(
            sketch.representation(),
            Representation::Explicit(_)
        ));
        assert_eq!(sketch.estimate_cardinality(), EXPLICIT_LIMIT as i64);
    }

    #[test]
    fn test_conversion_happens_exactly_once_at_161() {
        let hashes = distinct_hashes(200, 19);
        let mut sketch = HllSketch::new();
        for (i, &h) in hashes.iter().enumerate() {
            sketch.update(h);
            let expected = if i < EXPLICIT_LIMIT { "Explicit" } else { "Dense" };
            assert_eq!(sketch.representation().name(), expected, "at value {}", i + 1);
        }

        // typical error at 16384 registers is well under 2%
        let estimate = sketch.estimate_cardinality();
        assert!((192..=208).contains(&estimate), "estimate = {estimate}");
    }

    #[test]
    fn test_merge_explicit_scenario() {
        let mut lhs = sketch_of(&[10, 20, 30]);
        assert_eq!(lhs.estimate_cardinality(), 3);

        let rhs = sketch_of(&[30, 40]);
        lhs.merge(&rhs);

        assert_eq!(lhs.estimate_cardinality(), 4);
        let Representation::Explicit(set) = lhs.representation() else {
            panic!("expected explicit representation");
        };
        assert_eq!(set.values(), &[10, 20, 30, 40]);
    }

    #[test_case(0, 0 => "Empty"; "empty empty")]
    #[test_case(0, 3 => "Explicit"; "empty explicit")]
    #[test_case(3, 0 => "Explicit"; "explicit empty")]
    #[test_case(80, 80 => "Explicit"; "explicit stays at cap")]
    #[test_case(100, 100 => "Dense"; "explicit overflow converts")]
    #[test_case(100, 200 => "Dense"; "explicit absorbs dense")]
    #[test_case(200, 100 => "Dense"; "dense absorbs explicit")]
    #[test_case(0, 300 => "Dense"; "empty absorbs dense")]
    #[test_case(300, 0 => "Dense"; "dense unchanged by empty")]
    fn test_merge_matrix(lhs_n: usize, rhs_n: usize) -> &'static str {
        // different seeds produce disjoint hash sets
        let mut lhs = sketch_of(&distinct_hashes(lhs_n, 23));
        let rhs = sketch_of(&distinct_hashes(rhs_n, 29));
        lhs.merge(&rhs);

        let total = (lhs_n + rhs_n) as i64;
        let estimate = lhs.estimate_cardinality();
        match lhs.representation() {
            Representation::Dense(_) => {
                let error = (estimate - total).abs() as f64 / total as f64;
                assert!(error < 0.03, "estimate = {estimate}, total = {total}");
            }
            _ => assert_eq!(estimate, total),
        }
        lhs.representation().name()
    }

    #[test]
    fn test_merge_explicit_converts_mid_way() {
        let lhs_hashes = distinct_hashes(150, 31);
        let rhs_hashes = distinct_hashes(150, 37);
        let mut lhs = sketch_of(&lhs_hashes);
        let rhs = sketch_of(&rhs_hashes);

        lhs.merge(&rhs);

        assert!(matches!(lhs.representation(), Representation::Dense(_)));
        let estimate = lhs.estimate_cardinality();
        assert!((288..=312).contains(&estimate), "estimate = {estimate}");
    }

    #[test]
    fn test_merge_commutative_on_registers() {
        let a_hashes = distinct_hashes(5000, 41);
        let b_hashes = distinct_hashes(3000, 43);

        let mut ab = sketch_of(&a_hashes);
        ab.merge(&sketch_of(&b_hashes));
        let mut ba = sketch_of(&b_hashes);
        ba.merge(&sketch_of(&a_hashes));

        assert_eq!(ab, ba);
        assert_eq!(ab.to_bytes(), ba.to_bytes());
    }

    #[test]
    fn test_merge_associative_close_to_union() {
        let all = distinct_hashes(30_000, 47);
        let (a, rest) = all.split_at(10_000);
        let (b, c) = rest.split_at(10_000);

        let mut merged = sketch_of(a);
        merged.merge(&sketch_of(b));
        merged.merge(&sketch_of(c));
        let union = sketch_of(&all);

        assert_eq!(merged, union);
        let estimate = merged.estimate_cardinality() as f64;
        let error = (estimate - 30_000.0).abs() / 30_000.0;
        assert!(error < 0.05, "relative error = {error}");
    }

    #[test]
    fn test_self_merge_is_idempotent() {
        for n in [0, 3, EXPLICIT_LIMIT, 1000] {
            let mut sketch = sketch_of(&distinct_hashes(n, 53));
            let before = sketch.clone();
            sketch.merge(&before);
            assert_eq!(sketch, before, "n = {n}");
        }
    }

    #[test]
    fn test_dense_never_reverts() {
        let mut sketch = sketch_of(&distinct_hashes(200, 59));
        assert!(matches!(sketch.representation(), Representation::Dense(_)));

        sketch.merge(&HllSketch::new());
        sketch.merge(&HllSketch::from_hash(1));
        sketch.update(2);
        assert!(matches!(sketch.representation(), Representation::Dense(_)));
        assert_eq!(sketch.max_serialized_size(), 1 + REGISTERS);
    }

    #[test]
    fn test_serialize_empty() {
        let sketch = HllSketch::new();
        assert_eq!(sketch.max_serialized_size(), 1);
        assert_eq!(sketch.to_bytes(), vec![0]);
        assert_eq!(HllSketch::empty_bytes(), [0]);
        assert!(HllSketch::is_valid(&HllSketch::empty_bytes()));
    }

    #[test]
    fn test_round_trip_explicit() {
        let sketch = sketch_of(&distinct_hashes(100, 61));
        let bytes = sketch.to_bytes();
        assert_eq!(bytes.len(), 2 + 100 * 8);
        assert_eq!(bytes[0], 1);
        assert!(HllSketch::is_valid(&bytes));

        let restored = HllSketch::from_bytes(&bytes).unwrap();
        assert_eq!(restored, sketch);
        assert_eq!(restored.estimate_cardinality(), 100);
    }

    #[test]
    fn test_round_trip_dense_sparse_form() {
        let sketch = sketch_of(&distinct_hashes(500, 67));
        let bytes = sketch.to_bytes();
        assert_eq!(bytes[0], 2);
        assert!(HllSketch::is_valid(&bytes));

        let restored = HllSketch::from_bytes(&bytes).unwrap();
        assert_eq!(restored, sketch);
        assert_eq!(
            restored.estimate_cardinality(),
            sketch.estimate_cardinality()
        );
    }

    #[test]
    fn test_round_trip_dense_full_form() {
        // enough distinct values to push non-zero registers past the sparse
        // threshold: 16384 * (1 - e^(-n/16384)) > 4096 from n ~ 4713
        let sketch = sketch_of(&distinct_hashes(8000, 71));
        let Representation::Dense(dense) = sketch.representation() else {
            panic!("expected dense representation");
        };
        let non_zero = dense.registers().iter().filter(|&&r| r != 0).count();
        assert!(non_zero > SPARSE_THRESHOLD, "non_zero = {non_zero}");

        let bytes = sketch.to_bytes();
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes.len(), 1 + REGISTERS);
        assert!(HllSketch::is_valid(&bytes));

        let restored = HllSketch::from_bytes(&bytes).unwrap();
        assert_eq!(restored, sketch);
    }

    #[test]
    fn test_deserialize_supports_only_empty() {
        let mut sketch = sketch_of(&[1, 2, 3]);
        assert!(!sketch.deserialize(&[])); // not valid at all
        assert!(!sketch.deserialize(&[4])); // unknown tag
        assert!(!sketch.deserialize(&sketch_of(&[5]).to_bytes())); // explicit form
        assert_eq!(sketch.estimate_cardinality(), 3); // rejected inputs leave state alone

        assert!(sketch.deserialize(&HllSketch::empty_bytes()));
        assert_eq!(sketch.estimate_cardinality(), 0);
        assert!(matches!(sketch.representation(), Representation::Empty(_)));
    }

    #[test]
    fn test_from_hash() {
        let sketch = HllSketch::from_hash(42);
        assert_eq!(sketch.estimate_cardinality(), 1);
        assert!(matches!(sketch.representation(), Representation::Explicit(_)));
    }

    #[test]
    fn test_insert_hashes_items() {
        let mut sketch = HllSketch::new();
        sketch.insert("distinct value 1");
        sketch.insert("distinct value 1");
        sketch.insert("distinct value 2");
        assert_eq!(sketch.estimate_cardinality(), 2);
    }

    #[test]
    fn test_memory_consumed_tracks_representation() {
        let mut sketch = HllSketch::new();
        let base = sketch.memory_consumed();

        sketch.update(1);
        assert_eq!(sketch.memory_consumed(), base + EXPLICIT_LIMIT * 8);

        for &h in &distinct_hashes(EXPLICIT_LIMIT + 1, 73) {
            sketch.update(h);
        }
        assert_eq!(sketch.memory_consumed(), base + REGISTERS);

        sketch.clear();
        assert_eq!(sketch.memory_consumed(), base);
        assert!(matches!(sketch.representation(), Representation::Empty(_)));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = sketch_of(&distinct_hashes(300, 79));
        let snapshot = original.clone();
        let expected = snapshot.estimate_cardinality();
        for &h in &distinct_hashes(500, 83) {
            original.update(h);
        }
        assert_eq!(snapshot.estimate_cardinality(), expected);
        assert_eq!(snapshot.to_bytes(), sketch_of(&distinct_hashes(300, 79)).to_bytes());
    }

    #[test]
    fn test_clone_keeps_explicit_allocation() {
        let original = sketch_of(&[1, 2, 3]);
        let mut clone = original.clone();
        assert_eq!(clone.memory_consumed(), original.memory_consumed());

        // merging an explicit sketch into an empty one goes through the same
        // clone path
        let mut merged = HllSketch::new();
        merged.merge(&original);
        assert_eq!(merged.memory_consumed(), original.memory_consumed());

        // the clone fills to capacity without reallocating
        for &h in &distinct_hashes(EXPLICIT_LIMIT - 3, 89) {
            clone.update(h);
        }
        assert!(matches!(clone.representation(), Representation::Explicit(_)));
        assert_eq!(clone.memory_consumed(), original.memory_consumed());
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(
            format!("{:?}", HllSketch::new()),
            "{ representation: Empty, estimate: 0 }"
        );
        assert_eq!(
            format!("{:?}", sketch_of(&[1, 2])),
            "{ representation: Explicit, estimate: 2 }"
        );
    }
}
