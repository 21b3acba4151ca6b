#![no_main]

use libfuzzer_sys::fuzz_target;
use paper_scout::config::Config;

fuzz_target!(|data: &[u8]| {
    // Parse, then validate whatever parsed
    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(config) = Config::from_json(text) {
            let _ = config.validate();
            let _ = serde_json::to_string(&config);
        }
    }
});
