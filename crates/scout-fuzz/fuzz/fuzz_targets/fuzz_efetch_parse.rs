#![no_main]

use chrono::NaiveDate;
use libfuzzer_sys::fuzz_target;
use paper_scout::sources::parse_efetch;

fuzz_target!(|data: &[u8]| {
    // Malformed XML must be an error, never a panic
    if let (Ok(xml), Some(fallback)) = (std::str::from_utf8(data), NaiveDate::from_ymd_opt(2024, 1, 1)) {
        let _ = parse_efetch(xml, fallback);
    }
});
