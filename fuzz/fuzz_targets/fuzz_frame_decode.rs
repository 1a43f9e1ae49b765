#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary byte streams must never panic the frame decoder; bad
    // frames surface as errors, partial ones as (None, offset).
    match bench_proto::decode(data) {
        Ok((_msg, consumed)) => {
            assert!(consumed <= data.len());
        }
        Err(_e) => {}
    }
});
