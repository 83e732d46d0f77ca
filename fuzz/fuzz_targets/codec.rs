#![no_main]

use hll_sketch::HllSketch;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let structurally_valid = HllSketch::is_valid(data);

    if let Ok(sketch) = HllSketch::from_bytes(data) {
        // anything the full decoder accepts must pass the structural check
        assert!(structurally_valid);
        assert!(sketch.estimate_cardinality() >= 0);

        let bytes = sketch.to_bytes();
        assert!(HllSketch::is_valid(&bytes));
        let again = HllSketch::from_bytes(&bytes).expect("re-encoded bytes must decode");
        assert_eq!(sketch, again);
    }
});
