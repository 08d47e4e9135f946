//! Row types

use crate::column::Column;
use crate::value::CellValue;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static NULL: CellValue = CellValue::Null;

/// A row of a table
///
/// `cells` has no required keys; absent entries read as null. `computed` holds the cached
/// outputs of formula/rollup columns, written by the host after evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: String,
    /// Raw cell values keyed by column id
    #[serde(default)]
    pub cells: HashMap<String, CellValue>,
    /// Cached derived values keyed by column id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub computed: HashMap<String, CellValue>,
}

impl Row {
    /// Create an empty row
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            cells: HashMap::new(),
            computed: HashMap::new(),
        }
    }

    /// Builder-style cell setter
    pub fn with_cell<K: Into<String>, V: Into<CellValue>>(mut self, column_id: K, value: V) -> Self {
        self.set_cell(column_id, value);
        self
    }

    /// Builder-style computed-value setter
    pub fn with_computed<K: Into<String>, V: Into<CellValue>>(
        mut self,
        column_id: K,
        value: V,
    ) -> Self {
        self.computed.insert(column_id.into(), value.into());
        self
    }

    /// Set a raw cell value
    pub fn set_cell<K: Into<String>, V: Into<CellValue>>(&mut self, column_id: K, value: V) {
        self.cells.insert(column_id.into(), value.into());
    }

    /// Raw cell value (null when absent)
    pub fn cell(&self, column_id: &str) -> &CellValue {
        self.cells.get(column_id).unwrap_or(&NULL)
    }

    /// Cached computed value, if any
    pub fn computed_value(&self, column_id: &str) -> Option<&CellValue> {
        self.computed.get(column_id)
    }

    /// Value of `column` in this row.
    ///
    /// Formula and rollup columns prefer the cached computed value over the raw cell.
    pub fn value_for(&self, column: &Column) -> &CellValue {
        if column.column_type.is_derived() {
            if let Some(v) = self.computed.get(&column.id) {
                return v;
            }
        }
        self.cell(&column.id)
    }
}
