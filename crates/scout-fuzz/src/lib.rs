//! Fuzzing library for paper-scout.
//!
//! Targets cover the inputs the pipeline does not control: interest
//! expressions and config files written by users, and the XML bodies
//! returned by PubMed and arXiv.
//!
//! # Usage
//!
//! ```bash
//! cd crates/scout-fuzz
//! cargo +nightly fuzz run fuzz_efetch_parse -- -max_total_time=60
//! ```

pub use paper_scout::{query, sources};
