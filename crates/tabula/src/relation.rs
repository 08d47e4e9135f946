//! Relation resolution
//!
//! Rollups aggregate rows of another table. Finding those rows is the host's job; it plugs
//! in through [`RelationResolver`]. [`TableSet`] is an in-memory resolver for hosts that
//! already hold the tables (and for tests).

use crate::error::{Error, Result};
use std::collections::HashMap;
use tabula_core::{CellValue, Column, ColumnConfig, ReferenceKind, Row};

/// Rows reached through a relation, with the schema of their table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedRows {
    pub rows: Vec<Row>,
    pub columns: Vec<Column>,
}

impl RelatedRows {
    pub fn new(rows: Vec<Row>, columns: Vec<Column>) -> Self {
        Self { rows, columns }
    }

    /// Column of the related table by id
    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }
}

/// Supplies the rows related to `row` through `relation_column`
pub trait RelationResolver {
    fn resolve(&self, row: &Row, relation_column: &Column) -> Result<RelatedRows>;
}

impl<F> RelationResolver for F
where
    F: Fn(&Row, &Column) -> Result<RelatedRows>,
{
    fn resolve(&self, row: &Row, relation_column: &Column) -> Result<RelatedRows> {
        self(row, relation_column)
    }
}

/// Resolver for schemas without relations; every lookup fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRelations;

impl RelationResolver for NoRelations {
    fn resolve(&self, _row: &Row, relation_column: &Column) -> Result<RelatedRows> {
        Err(Error::relation(&relation_column.id, "no relation resolver configured"))
    }
}

/// Ids of the rows a relation cell points at
///
/// Relation references are used as-is; multi-select and plain text cells are read as row
/// ids. File references are ignored.
pub fn related_ids(value: &CellValue) -> Vec<String> {
    match value {
        CellValue::References(refs) => refs
            .iter()
            .filter(|r| r.kind == ReferenceKind::Relation)
            .map(|r| r.id.clone())
            .collect(),
        CellValue::MultiSelect(ids) => ids.clone(),
        CellValue::Text(id) if !id.trim().is_empty() => vec![id.trim().to_string()],
        _ => Vec::new(),
    }
}

/// A table held in memory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub id: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new<S: Into<String>>(id: S, columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            id: id.into(),
            columns,
            rows,
        }
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }
}

/// In-memory tables resolved by id
///
/// A relation column's `target_table_id` picks the table; relation columns without a
/// target resolve against the default table (the table the rows being computed live in).
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: HashMap<String, Table>,
    default_table: Option<String>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table, replacing any table with the same id
    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.id.clone(), table);
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.insert(table);
        self
    }

    /// Table used by relations that do not name a target table
    pub fn with_default_table<S: Into<String>>(mut self, id: S) -> Self {
        self.default_table = Some(id.into());
        self
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.get(id)
    }

    fn target_table(&self, relation_column: &Column) -> Result<&Table> {
        let configured = match &relation_column.config {
            Some(ColumnConfig::Relation(cfg)) => cfg.target_table_id.as_deref(),
            _ => None,
        };
        let id = configured
            .or(self.default_table.as_deref())
            .ok_or_else(|| Error::relation(&relation_column.id, "no target table"))?;
        self.tables
            .get(id)
            .ok_or_else(|| Error::relation(&relation_column.id, format!("unknown table {id}")))
    }
}

impl RelationResolver for TableSet {
    fn resolve(&self, row: &Row, relation_column: &Column) -> Result<RelatedRows> {
        let table = self.target_table(relation_column)?;
        let mut rows = Vec::new();
        for id in related_ids(row.cell(&relation_column.id)) {
            match table.row(&id) {
                Some(related) => rows.push(related.clone()),
                None => tracing::debug!(
                    "Row {} links to missing row {id} in table {}",
                    row.id,
                    table.id
                ),
            }
        }
        Ok(RelatedRows::new(rows, table.columns.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tabula_core::{ColumnType, Reference, RelationConfig};

    fn tasks() -> Table {
        Table::new(
            "tasks",
            vec![Column::new("hours", "Hours", ColumnType::Number)],
            vec![
                Row::new("t1").with_cell("hours", 3),
                Row::new("t2").with_cell("hours", 5),
            ],
        )
    }

    fn relation_column(target: Option<&str>) -> Column {
        Column::new("rel", "Tasks", ColumnType::Relation).with_config(ColumnConfig::Relation(
            RelationConfig {
                target_table_id: target.map(String::from),
            },
        ))
    }

    #[test]
    fn test_related_ids() {
        let refs = CellValue::References(vec![
            Reference::relation("a"),
            Reference::file("f", None),
            Reference::relation("b"),
        ]);
        assert_eq!(related_ids(&refs), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(related_ids(&CellValue::text(" c ")), vec!["c".to_string()]);
        assert!(related_ids(&CellValue::Null).is_empty());
    }

    #[test]
    fn test_table_set_resolves_and_skips_dangling() {
        let tables = TableSet::new().with_table(tasks());
        let row = Row::new("p1").with_cell(
            "rel",
            CellValue::References(vec![Reference::relation("t2"), Reference::relation("gone")]),
        );
        let related = tables.resolve(&row, &relation_column(Some("tasks"))).unwrap();
        assert_eq!(related.rows.len(), 1);
        assert_eq!(related.rows[0].id, "t2");
        assert!(related.column("hours").is_some());
    }

    #[test]
    fn test_table_set_default_table() {
        let row = Row::new("p1").with_cell("rel", CellValue::text("t1"));
        let column = relation_column(None);

        let without_default = TableSet::new().with_table(tasks());
        assert!(matches!(
            without_default.resolve(&row, &column),
            Err(Error::Relation { .. })
        ));

        let with_default = TableSet::new()
            .with_table(tasks())
            .with_default_table("tasks");
        assert_eq!(with_default.resolve(&row, &column).unwrap().rows.len(), 1);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver =
            |_: &Row, _: &Column| Ok::<_, Error>(RelatedRows::new(vec![Row::new("x")], vec![]));
        let related = resolver
            .resolve(&Row::new("r"), &relation_column(None))
            .unwrap();
        assert_eq!(related.rows[0].id, "x");
    }

    #[test]
    fn test_no_relations() {
        assert!(NoRelations
            .resolve(&Row::new("r"), &relation_column(None))
            .is_err());
    }
}
