//! Cell value types

use crate::date;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the value stored in a cell
///
/// This is the single value type flowing through both the formula and the rollup engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    /// Absent or null value
    Null,

    /// Text value
    Text(String),

    /// Numeric value
    Number(f64),

    /// Boolean value
    Boolean(bool),

    /// Date/timestamp (always UTC)
    Date(DateTime<Utc>),

    /// Ordered list of option labels (multi-select)
    MultiSelect(Vec<String>),

    /// Opaque structured references (files, related rows)
    References(Vec<Reference>),
}

/// What a [`Reference`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    File,
    Relation,
}

/// A structured reference to a file or a related row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: String,
    /// Display label (file name, related row title)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Reference {
    /// Reference to a related row
    pub fn relation<S: Into<String>>(id: S) -> Self {
        Self {
            kind: ReferenceKind::Relation,
            id: id.into(),
            name: None,
            url: None,
        }
    }

    /// Reference to a file
    pub fn file<S: Into<String>>(id: S, url: Option<String>) -> Self {
        Self {
            kind: ReferenceKind::File,
            id: id.into(),
            name: None,
            url,
        }
    }

    /// Set the display label
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Label used when the reference is shown as text
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

impl CellValue {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        CellValue::Text(s.into())
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Check if the value counts as empty.
    ///
    /// Null, whitespace-only text and empty lists are empty; everything else is not.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::MultiSelect(items) => items.is_empty(),
            CellValue::References(refs) => refs.is_empty(),
            _ => false,
        }
    }

    /// Coerce to a number.
    ///
    /// Text is trimmed and parsed, booleans become 0/1 and dates their epoch milliseconds.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Boolean(true) => Some(1.0),
            CellValue::Boolean(false) => Some(0.0),
            CellValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                s.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            CellValue::Date(d) => Some(date::timestamp_ms(d)),
            _ => None,
        }
    }

    /// Coerce to text
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Date(d) => date::to_iso_string(d),
            CellValue::MultiSelect(items) => items.join(", "),
            CellValue::References(refs) => refs
                .iter()
                .map(Reference::label)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Coerce to a boolean (truthiness)
    pub fn to_boolean(&self) -> bool {
        match self {
            CellValue::Null => false,
            CellValue::Boolean(b) => *b,
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Date(_) => true,
            CellValue::MultiSelect(items) => !items.is_empty(),
            CellValue::References(refs) => !refs.is_empty(),
        }
    }

    /// Coerce to a date
    pub fn to_date(&self) -> Option<DateTime<Utc>> {
        match self {
            CellValue::Date(d) => Some(*d),
            CellValue::Number(n) => date::from_timestamp_ms(*n),
            CellValue::Text(s) => date::parse_date(s),
            _ => None,
        }
    }

    /// Get the type name for messages
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Null => "null",
            CellValue::Text(_) => "text",
            CellValue::Number(_) => "number",
            CellValue::Boolean(_) => "boolean",
            CellValue::Date(_) => "date",
            CellValue::MultiSelect(_) => "multi_select",
            CellValue::References(_) => "references",
        }
    }
}

/// Shortest textual form of a number (`3`, `2.5`, `-0` prints as `0`)
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    format!("{}", n)
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Null
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Boolean(b)
    }
}

impl From<i32> for CellValue {
    fn from(n: i32) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::text(s)
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<DateTime<Utc>> for CellValue {
    fn from(d: DateTime<Utc>) -> Self {
        CellValue::Date(d)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(CellValue::Null)
    }
}
