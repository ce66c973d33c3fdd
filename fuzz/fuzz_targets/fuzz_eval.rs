#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    let Ok(doc) = serde_json::from_slice::<bson::Document>(data) else { return };
    if let Ok(filter) = minq::driver::memory::parse_filter(&doc) {
        let docs = [
            bson::doc! { "a": 1, "b": 2, "name": "x" },
            bson::doc! { "a": 10, "b": -5, "name": "y", "nested": { "z": 3 } },
            bson::doc! { "active": true, "tags": ["p", "q"] },
        ];
        for d in &docs {
            let _ = minq::driver::memory::eval_filter(d, &filter);
        }
    }
});
