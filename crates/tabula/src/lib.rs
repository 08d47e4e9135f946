//! # tabula
//!
//! Derived values for spreadsheet-like tables: formula columns and rollup columns.
//!
//! This crate ties the engines together:
//! - [`tabula_core`] - Cell values, columns, rows
//! - [`tabula_formula`] - The formula language and [`FormulaEngine`]
//! - [`tabula_rollup`] - Aggregation over related rows
//! - [`RowComputer`] - Computes every derived column of a row, resolving relations through a
//!   [`RelationResolver`]
//!
//! ## Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let tasks = Table::new(
//!     "tasks",
//!     vec![Column::new("hours", "Hours", ColumnType::Number)],
//!     vec![
//!         Row::new("t1").with_cell("hours", 3),
//!         Row::new("t2").with_cell("hours", 5),
//!     ],
//! );
//! let columns = vec![
//!     Column::new("tasks", "Tasks", ColumnType::Relation).with_config(ColumnConfig::Relation(
//!         RelationConfig {
//!             target_table_id: Some("tasks".into()),
//!         },
//!     )),
//!     Column::rollup(
//!         "hours",
//!         "Hours",
//!         RollupConfig {
//!             relation_column_id: "tasks".into(),
//!             target_column_id: "hours".into(),
//!             function: RollupFunction::Sum,
//!         },
//!     ),
//!     Column::formula("days", "Days", "round(prop(\"Hours\") / 8, 1)"),
//! ];
//! let mut row = Row::new("p1").with_cell(
//!     "tasks",
//!     CellValue::References(vec![Reference::relation("t1"), Reference::relation("t2")]),
//! );
//!
//! let tables = TableSet::new().with_table(tasks);
//! let outcome = RowComputer::new().apply(&mut row, &columns, &tables);
//!
//! assert!(outcome.is_ok());
//! assert_eq!(row.computed_value("hours"), Some(&CellValue::Number(8.0)));
//! assert_eq!(row.computed_value("days"), Some(&CellValue::Number(1.0)));
//! ```

pub mod compute;
pub mod error;
pub mod prelude;
pub mod relation;

// Re-export computation types
pub use compute::{ColumnError, ComputeOptions, ComputeOutcome, ComputeStats, RowComputer};
pub use error::{Error, Result};
pub use relation::{related_ids, NoRelations, RelatedRows, RelationResolver, Table, TableSet};

// Re-export core types
pub use tabula_core::{
    CellValue, Column, ColumnConfig, ColumnType, FormulaConfig, Reference, ReferenceKind,
    RelationConfig, RollupConfig, RollupFunction, Row, SelectConfig,
};

// Re-export formula types
pub use tabula_formula::{
    evaluate, parse_formula, EngineOptions, EvaluationContext, EvaluationOutcome,
    FormulaEngine, FormulaError, FormulaExpr, FormulaResult, ParseError, Validation,
};

// Re-export rollup types
pub use tabula_rollup::RollupResult;

// Re-export the member crates for everything not lifted above
pub use tabula_core;
pub use tabula_formula;
pub use tabula_rollup;
