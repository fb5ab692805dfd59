#![no_main]

use libfuzzer_sys::fuzz_target;
use hub_config::load_config_str;

fuzz_target!(|data: &str| {
    // must never panic on arbitrary input, valid or not
    let _ = load_config_str(data);
});
