#![no_main]

use libfuzzer_sys::fuzz_target;
use paper_scout::models::{DegradationPolicy, Source};
use paper_scout::query::{Expr, translate};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // Anything that parses must render and translate for every source
    if let Ok(expr) = Expr::parse(text) {
        let _ = expr.to_string();
        for source in Source::ALL {
            let _ = translate(&expr, source, DegradationPolicy::Union);
            let _ = translate(&expr, source, DegradationPolicy::Strict);
        }
    }
});
