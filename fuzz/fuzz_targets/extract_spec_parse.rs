#![no_main]

use libfuzzer_sys::fuzz_target;
use hub_types::ExtractSpec;

fuzz_target!(|data: &[u8]| {
    if let Ok(spec) = std::str::from_utf8(data) {
        if let Ok(parsed) = ExtractSpec::parse(spec) {
            // a spec that parses must always render back to a non-empty suffix
            assert!(!parsed.as_suffix().is_empty());
        }
    }
});
