//! Interest expressions and their per-source translations.
//!
//! An [`Expr`] is parsed once at configuration time. [`translate`] then
//! renders it for each source: boolean sources receive the tree unchanged,
//! OR-only sources receive the union of its positive terms plus a warning.

mod expr;
mod translate;

pub use expr::Expr;
pub use translate::{QueryPlan, SourceQuery, TranslationWarning, translate};
