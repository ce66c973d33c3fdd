#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(doc) = serde_json::from_slice::<bson::Document>(data) {
        let _ = minq::driver::memory::parse_update(&doc);
    }
});
