#![no_main]

use hll_sketch::HllSketch;
use libfuzzer_sys::fuzz_target;
use wyhash::wyhash;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let split_index = wyhash(data, 0) as usize % data.len();
    let (first_half, second_half) = data.split_at(split_index);

    let mut sketch1 = HllSketch::new();
    for chunk in first_half.chunks(4) {
        sketch1.update(wyhash(chunk, 1));
        assert!(sketch1.estimate_cardinality() > 0);
        assert!(sketch1.memory_consumed() > 0);
    }

    let mut sketch2 = HllSketch::new();
    for chunk in second_half.chunks(4) {
        sketch2.update(wyhash(chunk, 1));
        assert!(sketch2.estimate_cardinality() > 0);
        assert!(sketch2.memory_consumed() > 0);
    }

    sketch1.merge(&sketch2);
    assert!(sketch1.estimate_cardinality() > 0);

    let mut buf = vec![0u8; sketch1.max_serialized_size()];
    let written = sketch1.serialize(&mut buf);
    assert!(HllSketch::is_valid(&buf[..written]));
    assert_eq!(HllSketch::from_bytes(&buf[..written]).unwrap(), sketch1);
});
