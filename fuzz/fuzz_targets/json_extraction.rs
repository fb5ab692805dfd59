#![no_main]

use libfuzzer_sys::fuzz_target;
use hub_types::{DataSample, ExtractSpec};

fuzz_target!(|data: (&str, &str)| {
    let (spec_str, body) = data;
    let Ok(spec) = ExtractSpec::parse(spec_str) else { return };
    let Ok(sample) = DataSample::json(1.0, body) else { return };

    // extraction must never panic, and a success always preserves the
    // source timestamp regardless of how deeply it had to dig.
    if let Ok(extracted) = spec.extract(&sample) {
        assert_eq!(extracted.timestamp(), 1.0);
    }
});
