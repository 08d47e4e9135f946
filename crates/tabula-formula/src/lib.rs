//! # tabula-formula
//!
//! Formula language for tabula's computed columns.
//!
//! This crate provides:
//! - Tokenizing and parsing (text → AST)
//! - Evaluation against a row (AST → [`CellValue`](tabula_core::CellValue))
//! - The built-in function library (math, text, logical, date)
//! - [`FormulaEngine`], which caches parsed ASTs across rows
//!
//! ## Example
//!
//! ```rust
//! use tabula_core::{CellValue, Column, ColumnType, Row};
//! use tabula_formula::FormulaEngine;
//!
//! let columns = vec![
//!     Column::new("c1", "Price", ColumnType::Number),
//!     Column::new("c2", "Quantity", ColumnType::Number),
//! ];
//! let row = Row::new("r1").with_cell("c1", 10).with_cell("c2", 3);
//!
//! let engine = FormulaEngine::new();
//! let total = engine
//!     .evaluate("prop(\"Price\") * prop(\"Quantity\")", &row, &columns)
//!     .unwrap();
//! assert_eq!(total, CellValue::Number(30.0));
//! ```

pub mod ast;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use engine::{EngineOptions, EvaluationOutcome, FormulaEngine, Validation};
pub use error::{FormulaError, FormulaResult, ParseError};
pub use evaluator::{evaluate, EvaluationContext, DEFAULT_MAX_DEPTH};
pub use functions::builtin_names;
pub use parser::{parse_formula, MAX_NESTING};
