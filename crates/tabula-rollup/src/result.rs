//! Rollup result type

use serde::{Deserialize, Serialize};
use tabula_core::{CellValue, Reference};

/// Outcome of a rollup aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RollupResult {
    /// Count, sum, statistic or percentage
    Number(f64),
    /// Statistic over zero numeric values
    Null,
    /// Values shown as-is (`showOriginal`, `showUnique`)
    Values(Vec<CellValue>),
}

impl RollupResult {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RollupResult::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RollupResult::Null)
    }

    /// Convert into a cell value for a row's `computed` map
    ///
    /// Value lists made only of references stay a reference list; any other list becomes
    /// multi-select text.
    pub fn into_cell_value(self) -> CellValue {
        match self {
            RollupResult::Number(n) => CellValue::Number(n),
            RollupResult::Null => CellValue::Null,
            RollupResult::Values(values) => {
                let all_references = !values.is_empty()
                    && values
                        .iter()
                        .all(|v| matches!(v, CellValue::References(_)));
                if all_references {
                    let refs: Vec<Reference> = values
                        .into_iter()
                        .flat_map(|v| match v {
                            CellValue::References(refs) => refs,
                            _ => Vec::new(),
                        })
                        .collect();
                    CellValue::References(refs)
                } else {
                    CellValue::MultiSelect(values.iter().map(CellValue::to_text).collect())
                }
            }
        }
    }
}

impl From<RollupResult> for CellValue {
    fn from(result: RollupResult) -> Self {
        result.into_cell_value()
    }
}
