//! # tabula-core
//!
//! Core data structures shared by the tabula formula and rollup engines.
//!
//! This crate provides:
//! - [`CellValue`] - The typed value stored per row/column pair, with coercion helpers
//! - [`Column`] and [`ColumnType`] - Column schema with type-specific configuration
//! - [`Row`] - A row's cells plus its cached `computed` values
//! - [`RollupConfig`] and [`RollupFunction`] - The configuration payload of rollup columns
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{CellValue, Column, ColumnType, Row};
//!
//! let price = Column::new("c1", "Price", ColumnType::Number);
//! let row = Row::new("r1").with_cell("c1", 12.5);
//!
//! assert_eq!(row.value_for(&price).to_number(), Some(12.5));
//! assert_eq!(CellValue::from("42").to_number(), Some(42.0));
//! ```

pub mod column;
pub mod date;
pub mod error;
pub mod row;
pub mod value;

// Re-exports for convenience
pub use column::{
    Column, ColumnConfig, ColumnType, FormulaConfig, RelationConfig, RollupConfig,
    RollupFunction, SelectConfig,
};
pub use error::{Error, Result};
pub use row::Row;
pub use value::{CellValue, Reference, ReferenceKind};
