//! Paper Scout
//!
//! Daily discovery of new publications for named interest groups. Each run
//! queries PubMed, arXiv and bioRxiv, resolves canonical DOIs (with fallback
//! links), merges cross-source duplicates and optionally asks an LLM to drop
//! irrelevant papers.
//!
//! # Features
//!
//! - **One expression, three dialects**: interest queries are parsed once and
//!   rendered per source, with explicit warnings when a source cannot express them
//! - **Fail-soft**: a failing or slow source never takes the run down
//! - **Fail-open filtering**: a flaky judge keeps papers rather than dropping them
//! - **Paced**: NCBI, arXiv and the judge each get their own call spacing
//!
//! # Example
//!
//! ```no_run
//! use paper_scout::{Config, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_file("paper-scout.json")?;
//!     let window = config.window(chrono::Local::now().date_naive())?;
//!     let pipeline = Pipeline::new(config)?;
//!
//!     for report in pipeline.run(window).await {
//!         println!("{}: {} papers", report.stats.group, report.papers.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod formatters;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod reconcile;
pub mod relevance;
pub mod resolver;
pub mod sources;
pub mod store;

pub use client::HttpClient;
pub use config::Config;
pub use error::{ClientError, ConfigError, QueryError, StoreError};
pub use pipeline::{Pipeline, RunReport};
