//! Data models shared by all pipeline stages.
//!
//! Models serialize with `camelCase` field names so artifacts and the sink
//! hand-off file share one schema.

mod enums;
mod paper;
mod stats;
mod window;

pub use enums::{DegradationPolicy, FallbackPolicy, LlmProvider, Source, SourceFamily};
pub use paper::PaperRecord;
pub use stats::{JudgeStats, ResolutionStats, RunStats, SourceStats, SourceStatus};
pub use window::{SearchLimits, SearchWindow};
