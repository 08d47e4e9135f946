//! Row computation
//!
//! Evaluates every formula and rollup column of a row and produces the values a host stores
//! in the row's `computed` map.
//!
//! Columns are computed in schema order. There is no dependency analysis: a derived column
//! sees the results of the derived columns before it in the same pass, and the cached
//! `computed` entries (possibly stale) of the ones after it.
//!
//! # Example
//!
//! ```rust
//! use tabula::prelude::*;
//!
//! let columns = vec![
//!     Column::new("c1", "Price", ColumnType::Number),
//!     Column::formula("c2", "Total", "prop(\"Price\") * 2"),
//! ];
//! let mut row = Row::new("r1").with_cell("c1", 21);
//!
//! let computer = RowComputer::new();
//! let outcome = computer.apply(&mut row, &columns, &NoRelations);
//! assert!(outcome.is_ok());
//! assert_eq!(row.computed_value("c2"), Some(&CellValue::Number(42.0)));
//! ```

use crate::error::{Error, Result};
use crate::relation::RelationResolver;
use chrono::{DateTime, Utc};
use tabula_core::{CellValue, Column, ColumnType, Row};
use tabula_formula::FormulaEngine;

/// Options for row computation
#[derive(Debug, Clone, Default)]
pub struct ComputeOptions {
    /// Leave rollup columns untouched
    pub skip_rollups: bool,
    /// Leave formula columns untouched
    pub skip_formulas: bool,
}

/// Statistics from computing one or more rows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComputeStats {
    /// Number of formula columns evaluated (including failures)
    pub formulas_evaluated: usize,
    /// Number of rollup columns calculated (including failures)
    pub rollups_calculated: usize,
    /// Number of derived columns that failed
    pub errors: usize,
    /// Number of derived columns skipped by the options
    pub skipped: usize,
}

impl ComputeStats {
    /// Add the counts of another run
    pub fn merge(&mut self, other: &ComputeStats) {
        self.formulas_evaluated += other.formulas_evaluated;
        self.rollups_calculated += other.rollups_calculated;
        self.errors += other.errors;
        self.skipped += other.skipped;
    }
}

/// A derived column that could not be computed
#[derive(Debug)]
pub struct ColumnError {
    pub column_id: String,
    pub error: Error,
}

/// Result of computing one row
#[derive(Debug, Default)]
pub struct ComputeOutcome {
    /// Computed values in schema order; failed columns hold null
    pub values: Vec<(String, CellValue)>,
    pub errors: Vec<ColumnError>,
    pub stats: ComputeStats,
}

impl ComputeOutcome {
    /// Computed value of a column
    pub fn value(&self, column_id: &str) -> Option<&CellValue> {
        self.values
            .iter()
            .find(|(id, _)| id == column_id)
            .map(|(_, v)| v)
    }

    /// Error of a column, if it failed
    pub fn error(&self, column_id: &str) -> Option<&Error> {
        self.errors
            .iter()
            .find(|e| e.column_id == column_id)
            .map(|e| &e.error)
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Computes the derived columns of rows
#[derive(Debug, Default)]
pub struct RowComputer {
    engine: FormulaEngine,
    options: ComputeOptions,
}

impl RowComputer {
    /// Create a computer with a default formula engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a configured engine (options, custom functions)
    pub fn with_engine(engine: FormulaEngine) -> Self {
        Self {
            engine,
            options: ComputeOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ComputeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn engine(&self) -> &FormulaEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FormulaEngine {
        &mut self.engine
    }

    pub fn options(&self) -> &ComputeOptions {
        &self.options
    }

    /// Compute the derived columns of `row` without modifying it
    pub fn compute<R>(&self, row: &Row, columns: &[Column], resolver: &R) -> ComputeOutcome
    where
        R: RelationResolver + ?Sized,
    {
        self.compute_at(row, columns, resolver, Utc::now())
    }

    /// [`compute`](Self::compute) with a fixed clock for `now()` and `today()`
    pub fn compute_at<R>(
        &self,
        row: &Row,
        columns: &[Column],
        resolver: &R,
        now: DateTime<Utc>,
    ) -> ComputeOutcome
    where
        R: RelationResolver + ?Sized,
    {
        let mut outcome = ComputeOutcome::default();
        let mut working = row.clone();

        for column in columns {
            let skip = match column.column_type {
                ColumnType::Formula => self.options.skip_formulas,
                ColumnType::Rollup => self.options.skip_rollups,
                _ => continue,
            };
            if skip {
                outcome.stats.skipped += 1;
                continue;
            }

            let result = if column.column_type == ColumnType::Formula {
                outcome.stats.formulas_evaluated += 1;
                self.compute_formula(column, &working, columns, now)
            } else {
                outcome.stats.rollups_calculated += 1;
                self.compute_rollup(column, &working, columns, resolver)
            };

            let value = match result {
                Ok(value) => value,
                Err(error) => {
                    tracing::warn!("Column {} failed on row {}: {error}", column.id, row.id);
                    outcome.stats.errors += 1;
                    outcome.errors.push(ColumnError {
                        column_id: column.id.clone(),
                        error,
                    });
                    CellValue::Null
                }
            };
            working.computed.insert(column.id.clone(), value.clone());
            outcome.values.push((column.id.clone(), value));
        }

        tracing::debug!(
            "Computed row {}: {} formulas, {} rollups, {} errors, {} skipped",
            row.id,
            outcome.stats.formulas_evaluated,
            outcome.stats.rollups_calculated,
            outcome.stats.errors,
            outcome.stats.skipped
        );
        outcome
    }

    /// Compute the derived columns of `row` and store them in its `computed` map
    pub fn apply<R>(&self, row: &mut Row, columns: &[Column], resolver: &R) -> ComputeOutcome
    where
        R: RelationResolver + ?Sized,
    {
        self.apply_at(row, columns, resolver, Utc::now())
    }

    /// [`apply`](Self::apply) with a fixed clock
    pub fn apply_at<R>(
        &self,
        row: &mut Row,
        columns: &[Column],
        resolver: &R,
        now: DateTime<Utc>,
    ) -> ComputeOutcome
    where
        R: RelationResolver + ?Sized,
    {
        let outcome = self.compute_at(row, columns, resolver, now);
        for (id, value) in &outcome.values {
            row.computed.insert(id.clone(), value.clone());
        }
        outcome
    }

    /// Apply to every row of a table, returning the combined statistics
    ///
    /// All rows share one clock reading so `now()` agrees across the batch.
    pub fn apply_all<R>(&self, rows: &mut [Row], columns: &[Column], resolver: &R) -> ComputeStats
    where
        R: RelationResolver + ?Sized,
    {
        let now = Utc::now();
        let mut stats = ComputeStats::default();
        for row in rows.iter_mut() {
            let outcome = self.apply_at(row, columns, resolver, now);
            stats.merge(&outcome.stats);
        }
        tracing::debug!(
            "Computed {} rows, engine cache holds {} formulas",
            rows.len(),
            self.engine.cache_len()
        );
        stats
    }

    fn compute_formula(
        &self,
        column: &Column,
        row: &Row,
        columns: &[Column],
        now: DateTime<Utc>,
    ) -> Result<CellValue> {
        let expression = column
            .formula_expression()
            .ok_or_else(|| Error::MissingConfig {
                column: column.id.clone(),
                kind: "formula",
            })?;
        Ok(self.engine.evaluate_at(expression, row, columns, now)?)
    }

    fn compute_rollup<R>(
        &self,
        column: &Column,
        row: &Row,
        columns: &[Column],
        resolver: &R,
    ) -> Result<CellValue>
    where
        R: RelationResolver + ?Sized,
    {
        let config = column.rollup_config().ok_or_else(|| Error::MissingConfig {
            column: column.id.clone(),
            kind: "rollup",
        })?;
        let relation_column = columns
            .iter()
            .find(|c| c.id == config.relation_column_id)
            .ok_or_else(|| Error::UnknownRelationColumn(config.relation_column_id.clone()))?;

        let related = resolver.resolve(row, relation_column)?;
        let target = related
            .column(&config.target_column_id)
            .ok_or_else(|| Error::UnknownTargetColumn(config.target_column_id.clone()))?;

        Ok(tabula_rollup::calculate(config, &related.rows, target).into_cell_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relation::{NoRelations, RelatedRows, Table, TableSet};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tabula_core::{
        ColumnConfig, Reference, RelationConfig, RollupConfig, RollupFunction,
    };

    fn project_columns() -> Vec<Column> {
        vec![
            Column::new("name", "Name", ColumnType::Text),
            Column::new("tasks", "Tasks", ColumnType::Relation).with_config(
                ColumnConfig::Relation(RelationConfig {
                    target_table_id: Some("tasks".to_string()),
                }),
            ),
            Column::rollup(
                "total",
                "Total Hours",
                RollupConfig {
                    relation_column_id: "tasks".to_string(),
                    target_column_id: "hours".to_string(),
                    function: RollupFunction::Sum,
                },
            ),
            Column::formula("label", "Label", "prop(\"Name\") + \": \" + prop(\"Total Hours\")"),
        ]
    }

    fn task_table() -> Table {
        Table::new(
            "tasks",
            vec![Column::new("hours", "Hours", ColumnType::Number)],
            vec![
                Row::new("t1").with_cell("hours", 3),
                Row::new("t2").with_cell("hours", 4.5),
            ],
        )
    }

    fn project_row() -> Row {
        Row::new("p1").with_cell("name", "Launch").with_cell(
            "tasks",
            CellValue::References(vec![Reference::relation("t1"), Reference::relation("t2")]),
        )
    }

    #[test]
    fn test_later_columns_see_earlier_results() {
        let tables = TableSet::new().with_table(task_table());
        let outcome = RowComputer::new().compute(&project_row(), &project_columns(), &tables);

        assert!(outcome.is_ok());
        assert_eq!(outcome.value("total"), Some(&CellValue::Number(7.5)));
        assert_eq!(
            outcome.value("label"),
            Some(&CellValue::text("Launch: 7.5"))
        );
        assert_eq!(
            outcome.stats,
            ComputeStats {
                formulas_evaluated: 1,
                rollups_calculated: 1,
                errors: 0,
                skipped: 0,
            }
        );
    }

    #[test]
    fn test_compute_leaves_row_untouched() {
        let tables = TableSet::new().with_table(task_table());
        let row = project_row();
        RowComputer::new().compute(&row, &project_columns(), &tables);
        assert!(row.computed.is_empty());
    }

    #[test]
    fn test_apply_writes_computed() {
        let tables = TableSet::new().with_table(task_table());
        let mut row = project_row();
        RowComputer::new().apply(&mut row, &project_columns(), &tables);
        assert_eq!(row.computed_value("total"), Some(&CellValue::Number(7.5)));
        assert!(row.computed_value("label").is_some());
    }

    #[test]
    fn test_failed_column_is_null_with_error() {
        let columns = vec![
            Column::formula("bad", "Bad", "prop(\"Missing\")"),
            Column::formula("ok", "Ok", "1 + 1"),
        ];
        let outcome = RowComputer::new().compute(&Row::new("r"), &columns, &NoRelations);

        assert_eq!(outcome.value("bad"), Some(&CellValue::Null));
        assert_eq!(outcome.value("ok"), Some(&CellValue::Number(2.0)));
        assert!(matches!(outcome.error("bad"), Some(Error::Formula(_))));
        assert_eq!(outcome.stats.errors, 1);
    }

    #[test]
    fn test_rollup_errors() {
        let no_config = Column::new("r", "R", ColumnType::Rollup);
        let outcome = RowComputer::new().compute(&Row::new("r"), &[no_config], &NoRelations);
        assert!(matches!(
            outcome.error("r"),
            Some(Error::MissingConfig { kind: "rollup", .. })
        ));

        let dangling = Column::rollup(
            "r",
            "R",
            RollupConfig {
                relation_column_id: "nope".to_string(),
                target_column_id: "hours".to_string(),
                function: RollupFunction::Count,
            },
        );
        let outcome = RowComputer::new().compute(&Row::new("r"), &[dangling], &NoRelations);
        assert!(matches!(
            outcome.error("r"),
            Some(Error::UnknownRelationColumn(_))
        ));

        let mut columns = project_columns();
        if let Some(ColumnConfig::Rollup(cfg)) = columns[2].config.as_mut() {
            cfg.target_column_id = "minutes".to_string();
        }
        let tables = TableSet::new().with_table(task_table());
        let outcome = RowComputer::new().compute(&project_row(), &columns, &tables);
        assert!(matches!(
            outcome.error("total"),
            Some(Error::UnknownTargetColumn(_))
        ));
    }

    #[test]
    fn test_skip_options() {
        let tables = TableSet::new().with_table(task_table());
        let computer = RowComputer::new().with_options(ComputeOptions {
            skip_rollups: true,
            skip_formulas: false,
        });
        let row = project_row().with_computed("total", 10);
        let outcome = computer.compute(&row, &project_columns(), &tables);

        assert_eq!(outcome.value("total"), None);
        assert_eq!(outcome.value("label"), Some(&CellValue::text("Launch: 10")));
        assert_eq!(outcome.stats.skipped, 1);
    }

    #[test]
    fn test_closure_resolver_and_fixed_clock() {
        let columns = vec![
            Column::new("rel", "Rel", ColumnType::Relation),
            Column::rollup(
                "n",
                "N",
                RollupConfig {
                    relation_column_id: "rel".to_string(),
                    target_column_id: "x".to_string(),
                    function: RollupFunction::Count,
                },
            ),
            Column::formula("y", "Year", "year(now())"),
        ];
        let resolver = |_: &Row, _: &Column| {
            Ok::<_, Error>(RelatedRows::new(
                vec![Row::new("a"), Row::new("b")],
                vec![Column::new("x", "X", ColumnType::Text)],
            ))
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let outcome = RowComputer::new().compute_at(&Row::new("r"), &columns, &resolver, now);

        assert_eq!(outcome.value("n"), Some(&CellValue::Number(2.0)));
        assert_eq!(outcome.value("y"), Some(&CellValue::Number(2024.0)));
    }

    #[test]
    fn test_apply_all_parses_once() {
        let columns = vec![
            Column::new("a", "A", ColumnType::Number),
            Column::formula("b", "B", "prop(\"A\") * 2"),
        ];
        let mut rows: Vec<Row> = (0..50)
            .map(|i| Row::new(format!("r{i}")).with_cell("a", i))
            .collect();
        let computer = RowComputer::new();
        let stats = computer.apply_all(&mut rows, &columns, &NoRelations);

        assert_eq!(stats.formulas_evaluated, 50);
        assert_eq!(computer.engine().parse_count(), 1);
        assert_eq!(rows[7].computed_value("b"), Some(&CellValue::Number(14.0)));
    }
}
