#![no_main]
use libfuzzer_sys::fuzz_target;
use pglz_compression::compress::compress;
use pglz_compression::decompress::decompress;
use pglz_compression::strategy::Strategy;

fuzz_target!(|data: &[u8]| {
    for strategy in &[Strategy::DEFAULT, Strategy::ALWAYS, Strategy::SKIP] {
        // Refusing to compress is fine; producing a stream that does not
        // come back byte-identical is not.
        if let Ok(compressed) = compress(data, strategy) {
            let decompressed = decompress(&compressed, data.len(), true)
                .expect("Failed to decompress our own output");
            assert!(
                data == decompressed.as_slice(),
                "Decompression result did not match the original input"
            );
        }
    }
});
