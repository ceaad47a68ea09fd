//! # livingreview
//!
//! Living literature review: multi-source ingestion, relevance filtering,
//! scoring and a persisted, queryable collection.
//!
//! ## Modules
//!
//! - [`crossref`], [`openalex`], [`semanticscholar`] - per-source clients and normalizers
//! - [`sources`] - the closed source set and the [`sources::RecordSource`] seam
//! - [`fanout`] - concurrent per-term querying with deadlines and throttling
//! - [`filter`] - negative-keyword exclusion and positive admission
//! - [`scoring`], [`dedup`] - relevance score, categories, gray literature, ranking
//! - [`collection`], [`storage`] - the durable record set and its key-value backend
//! - [`diagnostics`] - ingestion funnel and collection statistics
//! - [`pipeline`] - search and refresh flows
//! - [`export`] - CSV and RIS output
//!
//! ## Usage
//!
//! ```rust,no_run
//! use livingreview::{collection::Collection, config::ReviewConfig, pipeline::Pipeline};
//! use livingreview::{scoring::Scorer, storage::FileStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ReviewConfig::default();
//!     let pipeline = Pipeline::from_config(&config)?;
//!     let mut collection = Collection::load(FileStore::new()?, Scorer::from_config(&config))?;
//!     let report = pipeline.refresh(&mut collection, &config.refresh_terms()).await?;
//!     println!("{:?}: {} records stored", report.outcome(), collection.len());
//!     Ok(())
//! }
//! ```

pub mod collection;
pub mod config;
pub mod crossref;
pub mod dedup;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod fanout;
pub mod filter;
pub mod openalex;
pub mod pipeline;
pub mod record;
pub mod sanitize;
pub mod scoring;
pub mod semanticscholar;
pub mod sources;
pub mod storage;

pub use error::{ReviewError, Result};
