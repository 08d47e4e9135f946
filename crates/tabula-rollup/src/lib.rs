//! # tabula-rollup
//!
//! Aggregation over related rows for rollup columns.
//!
//! The caller resolves the relation first; this crate only sees the related rows and the
//! column to aggregate. Aggregation never fails on data: values that do not fit a numeric
//! aggregation are skipped.
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{Column, ColumnType, RollupConfig, RollupFunction, Row};
//! use tabula_rollup::{calculate, RollupResult};
//!
//! let target = Column::new("t1", "Amount", ColumnType::Number);
//! let rows = vec![
//!     Row::new("a").with_cell("t1", 10),
//!     Row::new("b").with_cell("t1", 32),
//! ];
//! let config = RollupConfig {
//!     relation_column_id: "rel".into(),
//!     target_column_id: "t1".into(),
//!     function: RollupFunction::Sum,
//! };
//!
//! assert_eq!(calculate(&config, &rows, &target), RollupResult::Number(42.0));
//! ```

pub mod aggregate;
pub mod result;

pub use aggregate::{calculate, extract_values, unique_key, Extracted};
pub use result::RollupResult;
