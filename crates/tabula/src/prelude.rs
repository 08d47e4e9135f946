//! Prelude module - common imports for tabula users
//!
//! ```rust
//! use tabula::prelude::*;
//! ```

pub use crate::{
    // Cell types
    CellValue,
    Column,
    ColumnConfig,
    ColumnType,
    // Computation types
    ComputeOptions,
    ComputeOutcome,
    ComputeStats,
    // Formula types
    EngineOptions,
    // Error types
    Error,
    FormulaConfig,
    FormulaEngine,
    FormulaError,
    // Relation types
    NoRelations,
    Reference,
    RelatedRows,
    RelationConfig,
    RelationResolver,
    Result,
    RollupConfig,
    RollupFunction,
    RollupResult,
    Row,
    RowComputer,
    Table,
    TableSet,
};
