//! # sheetstore - spreadsheet ingestion into dynamic Postgres tables
//!
//! sheetstore turns untyped spreadsheets into one physical, all-`TEXT` table
//! per upload, registers each table in `meta_table`, and derives the
//! metadata later graph queries need: the regions present, the nested
//! segment hierarchy, and the covered year range.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheetstore::config::load_app_config;
//! use sheetstore::flows;
//! use sheetstore::store::Store;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_app_config(None)?;
//! let store = Store::connect(&config.database).await?;
//! store.init_schema().await?;
//!
//! let outcome = flows::upload_path(&store, &config.extract, "market.xlsx".as_ref()).await?;
//! println!("{}", serde_json::to_string_pretty(&outcome)?);
//!
//! store.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`ingest`]: name sanitization, workbook extraction, ZIP expansion
//! - [`store`]: the Postgres handle, table materialization, `COPY` loading
//!   and registry reads
//! - [`metadata`]: post-load derivation of regions, segment tree and years
//! - [`graph`]: per-segment yearly sums for one region
//! - [`flows`]: the upload pipeline tying the above together
//! - [`config`], [`error`], [`logging`]: ambient concerns
//!
//! ## Lifecycle of an upload
//!
//! ```text
//! bytes ─> extract ─> materialize (tx 1) ─> bulk_load (tx 2) ─> derive (UPDATE)
//!                         │                                        │
//!                    provisional entry ─────────────────────> enriched entry
//! ```
//!
//! A failure after materialization leaves a provisional entry behind; it is
//! reported, not cleaned up.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod flows;
pub mod graph;
pub mod ingest;
pub mod logging;
pub mod metadata;
pub mod store;
