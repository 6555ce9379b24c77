//! Axis and series selection.
//!
//! Selection is independent of ingestion except for one rule: every new schema resets it.

use crate::ingest::row::{Schema, TypedRow, Value};
use serde::{Serialize, Serializer};

/// Name of the synthetic row-index axis
pub const INDEX_AXIS: &str = "idx";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AxisColumn {
    /// 0-based row position; not a real header
    #[default]
    Index,
    Column(String),
}

impl AxisColumn {
    /// Identifier used in the read model (`"idx"` for the synthetic index)
    pub fn name(&self) -> &str {
        match self {
            AxisColumn::Index => INDEX_AXIS,
            AxisColumn::Column(name) => name,
        }
    }

    /// Human-readable label for lists and chart titles
    pub fn label(&self) -> &str {
        match self {
            AxisColumn::Index => "Index",
            AxisColumn::Column(name) => name,
        }
    }

    pub fn column(&self) -> Option<&str> {
        match self {
            AxisColumn::Index => None,
            AxisColumn::Column(name) => Some(name),
        }
    }

    /// Resolve a user-supplied axis name against `schema`. A real header wins, so a file with its
    /// own `idx` column can still chart against it; otherwise `idx` (or empty) is the row index.
    pub fn resolve(name: &str, schema: &Schema) -> Self {
        let trimmed = name.trim();
        if schema.contains(trimmed) {
            AxisColumn::Column(trimmed.to_string())
        } else if trimmed.is_empty() || trimmed == INDEX_AXIS {
            AxisColumn::Index
        } else {
            AxisColumn::Column(trimmed.to_string())
        }
    }
}

impl Serialize for AxisColumn {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    axis: AxisColumn,
    series: Vec<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Axis back to the row index, no series.
    pub fn reset(&mut self) {
        self.axis = AxisColumn::Index;
        self.series.clear();
    }

    pub fn axis(&self) -> &AxisColumn {
        &self.axis
    }

    /// Chosen series in toggle order. The order drives color assignment.
    pub fn series(&self) -> &[String] {
        &self.series
    }

    /// Changing the axis keeps the chosen series.
    pub fn set_axis(&mut self, axis: AxisColumn) {
        self.axis = axis;
    }

    /// Add the column if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle_series(&mut self, column: &str) -> bool {
        if let Some(pos) = self.series.iter().position(|c| c == column) {
            self.series.remove(pos);
            false
        } else {
            self.series.push(column.to_string());
            true
        }
    }

    pub fn is_selected(&self, column: &str) -> bool {
        self.series.iter().any(|c| c == column)
    }

    /// Columns that can be plotted as series: numeric-looking in the first row, and not the
    /// current axis column.
    pub fn series_candidates(&self, schema: &Schema, first_row: Option<&TypedRow>) -> Vec<String> {
        let Some(row) = first_row else {
            return Vec::new();
        };
        schema
            .headers()
            .iter()
            .filter(|h| self.axis.column() != Some(h.as_str()))
            .filter(|h| row.get(h).is_some_and(is_numeric_like))
            .cloned()
            .collect()
    }

    /// The synthetic index followed by every header.
    pub fn axis_candidates(schema: &Schema) -> Vec<AxisColumn> {
        std::iter::once(AxisColumn::Index)
            .chain(schema.headers().iter().cloned().map(AxisColumn::Column))
            .collect()
    }
}

/// A value counts as numeric if it is a number, or text that starts with one.
pub fn is_numeric_like(value: &Value) -> bool {
    numeric_value(value).is_some()
}

/// Lenient numeric reading used for eligibility and chart values.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => leading_number(s),
        Value::Null => None,
    }
}

/// Longest numeric prefix of `s` after leading whitespace: `"12px"` → 12, `"-3.5e2 kg"` → -350,
/// `"abc"` → None. `Infinity` prefixes are accepted with an optional sign.
pub fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            Some(f64::NEG_INFINITY)
        } else {
            Some(f64::INFINITY)
        };
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return None;
    }

    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}
