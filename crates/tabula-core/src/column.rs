//! Column schema types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Column type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Number,
    Date,
    Boolean,
    Select,
    MultiSelect,
    Url,
    File,
    Formula,
    Relation,
    Rollup,
    CreatedTime,
    LastEditedTime,
}

impl ColumnType {
    /// Snake-case tag as used in stored schemas
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Number => "number",
            ColumnType::Date => "date",
            ColumnType::Boolean => "boolean",
            ColumnType::Select => "select",
            ColumnType::MultiSelect => "multi_select",
            ColumnType::Url => "url",
            ColumnType::File => "file",
            ColumnType::Formula => "formula",
            ColumnType::Relation => "relation",
            ColumnType::Rollup => "rollup",
            ColumnType::CreatedTime => "created_time",
            ColumnType::LastEditedTime => "last_edited_time",
        }
    }

    /// Whether values of this column are computed upstream (formula/rollup)
    pub fn is_derived(&self) -> bool {
        matches!(self, ColumnType::Formula | ColumnType::Rollup)
    }

    /// Whether values of this column are dates
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            ColumnType::Date | ColumnType::CreatedTime | ColumnType::LastEditedTime
        )
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let ty = match s {
            "text" => ColumnType::Text,
            "number" => ColumnType::Number,
            "date" => ColumnType::Date,
            "boolean" => ColumnType::Boolean,
            "select" => ColumnType::Select,
            "multi_select" => ColumnType::MultiSelect,
            "url" => ColumnType::Url,
            "file" => ColumnType::File,
            "formula" => ColumnType::Formula,
            "relation" => ColumnType::Relation,
            "rollup" => ColumnType::Rollup,
            "created_time" => ColumnType::CreatedTime,
            "last_edited_time" => ColumnType::LastEditedTime,
            other => return Err(Error::UnknownColumnType(other.to_string())),
        };
        Ok(ty)
    }
}

/// Aggregation applied by a rollup column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RollupFunction {
    Count,
    CountValues,
    CountNotEmpty,
    CountUnique,
    CountEmpty,
    Sum,
    Average,
    Min,
    Max,
    PercentEmpty,
    PercentNotEmpty,
    ShowOriginal,
    ShowUnique,
}

impl RollupFunction {
    /// Every aggregation, in display order
    pub const ALL: [RollupFunction; 13] = [
        RollupFunction::Count,
        RollupFunction::CountValues,
        RollupFunction::CountNotEmpty,
        RollupFunction::CountUnique,
        RollupFunction::CountEmpty,
        RollupFunction::Sum,
        RollupFunction::Average,
        RollupFunction::Min,
        RollupFunction::Max,
        RollupFunction::PercentEmpty,
        RollupFunction::PercentNotEmpty,
        RollupFunction::ShowOriginal,
        RollupFunction::ShowUnique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RollupFunction::Count => "count",
            RollupFunction::CountValues => "countValues",
            RollupFunction::CountNotEmpty => "countNotEmpty",
            RollupFunction::CountUnique => "countUnique",
            RollupFunction::CountEmpty => "countEmpty",
            RollupFunction::Sum => "sum",
            RollupFunction::Average => "average",
            RollupFunction::Min => "min",
            RollupFunction::Max => "max",
            RollupFunction::PercentEmpty => "percentEmpty",
            RollupFunction::PercentNotEmpty => "percentNotEmpty",
            RollupFunction::ShowOriginal => "showOriginal",
            RollupFunction::ShowUnique => "showUnique",
        }
    }
}

impl fmt::Display for RollupFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RollupFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RollupFunction::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::UnknownRollupFunction(s.to_string()))
    }
}

/// Configuration of a formula column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaConfig {
    /// Formula text, e.g. `prop("Price") * prop("Quantity")`
    pub expression: String,
}

/// Configuration of a rollup column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollupConfig {
    /// Relation column (in this table) whose related rows are aggregated
    pub relation_column_id: String,
    /// Column (in the related table) whose values are aggregated
    pub target_column_id: String,
    pub function: RollupFunction,
}

/// Configuration of a relation column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Table the relation points at (None = same table)
    #[serde(default)]
    pub target_table_id: Option<String>,
}

/// Configuration of a select/multi-select column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectConfig {
    #[serde(default)]
    pub options: Vec<String>,
}

/// Type-specific configuration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnConfig {
    Formula(FormulaConfig),
    Rollup(RollupConfig),
    Relation(RelationConfig),
    Select(SelectConfig),
}

/// Column schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Unique column id (key into a row's cells)
    pub id: String,
    /// Display name (what `prop("...")` refers to)
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ColumnConfig>,
}

impl Column {
    /// Create a new column without configuration
    pub fn new<I: Into<String>, N: Into<String>>(id: I, name: N, column_type: ColumnType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_type,
            config: None,
        }
    }

    /// Create a formula column
    pub fn formula<I: Into<String>, N: Into<String>, E: Into<String>>(
        id: I,
        name: N,
        expression: E,
    ) -> Self {
        Self::new(id, name, ColumnType::Formula).with_config(ColumnConfig::Formula(
            FormulaConfig {
                expression: expression.into(),
            },
        ))
    }

    /// Create a rollup column
    pub fn rollup<I: Into<String>, N: Into<String>>(id: I, name: N, config: RollupConfig) -> Self {
        Self::new(id, name, ColumnType::Rollup).with_config(ColumnConfig::Rollup(config))
    }

    /// Set the configuration payload
    pub fn with_config(mut self, config: ColumnConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Formula text, if this is a configured formula column
    pub fn formula_expression(&self) -> Option<&str> {
        match &self.config {
            Some(ColumnConfig::Formula(cfg)) => Some(&cfg.expression),
            _ => None,
        }
    }

    /// Rollup configuration, if this is a configured rollup column
    pub fn rollup_config(&self) -> Option<&RollupConfig> {
        match &self.config {
            Some(ColumnConfig::Rollup(cfg)) => Some(cfg),
            _ => None,
        }
    }
}
