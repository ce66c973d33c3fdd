#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(doc) = serde_json::from_slice::<bson::Document>(data) {
        // must reject bad filters without panicking
        let _ = minq::driver::memory::parse_filter(&doc);
        let _ = minq::driver::memory::parse_sort(&doc);
        let _ = minq::driver::memory::parse_projection(Some(&doc));
    }
});
