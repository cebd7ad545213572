#![no_main]
use libfuzzer_sys::fuzz_target;
use pglz_compression::decompress::decompress;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must either decode or be rejected; they must never
    // panic and never produce more than the declared raw size.
    for &rawsize in &[0usize, 1, 100, 4096, 1 << 20] {
        if let Ok(out) = decompress(data, rawsize, true) {
            assert!(out.len() == rawsize);
        }
        if let Ok(out) = decompress(data, rawsize, false) {
            assert!(out.len() <= rawsize);
        }
    }
});
