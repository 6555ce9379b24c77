//! Row shapes flowing through the ingestion pipeline.
//!
//! The parser delivers [`RawRow`]s: positional, optional string fields. They are typed against
//! the current [`Schema`] as soon as they arrive, producing header-keyed [`TypedRow`]s.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::sync::Arc;

/// Positional fields as delivered by the parser. `None` marks a field the parser could not
/// supply (e.g. an empty Excel cell).
pub type RawRow = Vec<Option<String>>;

/// A single typed field.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Display form used in lists and labels
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }
}

/// Format a number without a trailing `.0` for whole values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Parse a field as a finite number. Surrounding whitespace is ignored; empty input is not a number.
pub fn parse_number(field: &str) -> Option<f64> {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Coerce a raw field: absent → `Null`, numeric → `Number`, anything else (including `""`) → `Text`.
pub fn coerce_field(field: Option<&str>) -> Value {
    match field {
        None => Value::Null,
        Some(s) => match parse_number(s) {
            Some(n) => Value::Number(n),
            None => Value::Text(s.to_string()),
        },
    }
}

/// Ordered, unique column names for one file session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    headers: Vec<String>,
    index: HashMap<String, usize>,
}

impl Schema {
    /// Build a schema from announced headers. Blank names become `column_N` and repeated names
    /// get a numeric suffix so every header is addressable.
    pub fn new(headers: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(headers.len());
        let mut unique = Vec::with_capacity(headers.len());
        for (i, header) in headers.into_iter().enumerate() {
            let base = if header.trim().is_empty() {
                format!("column_{}", i + 1)
            } else {
                header
            };
            let mut name = base.clone();
            let mut n = 2;
            while index.contains_key(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            index.insert(name.clone(), i);
            unique.push(name);
        }
        Self {
            headers: unique,
            index,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// A row keyed by the headers of the schema it was typed against.
///
/// Fields beyond the header count are dropped; missing trailing fields are `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRow {
    schema: Arc<Schema>,
    values: Vec<Value>,
}

impl TypedRow {
    pub fn from_raw(raw: &RawRow, schema: &Arc<Schema>) -> Self {
        let values = (0..schema.len())
            .map(|i| coerce_field(raw.get(i).and_then(|f| f.as_deref())))
            .collect();
        Self {
            schema: Arc::clone(schema),
            values,
        }
    }

    /// Value for a column, `None` when the column is not part of this row's schema.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.schema.position(column).and_then(|i| self.values.get(i))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(header, value)` pairs in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.schema
            .headers()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for TypedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (header, value) in self.iter() {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(fields: &[Option<&str>]) -> RawRow {
        fields.iter().map(|f| f.map(str::to_string)).collect()
    }

    #[test]
    fn test_coerce_boundary() {
        assert_eq!(coerce_field(Some("")), Value::Text(String::new()));
        assert_eq!(coerce_field(Some("3.5")), Value::Number(3.5));
        assert_eq!(coerce_field(None), Value::Null);
        assert_eq!(coerce_field(Some(" 42 ")), Value::Number(42.0));
        assert_eq!(coerce_field(Some("1e3")), Value::Number(1000.0));
        assert_eq!(coerce_field(Some("-0.25")), Value::Number(-0.25));
        assert_eq!(coerce_field(Some("   ")), Value::Text("   ".to_string()));
        assert_eq!(coerce_field(Some("abc")), Value::Text("abc".to_string()));
        assert_eq!(coerce_field(Some("12abc")), Value::Text("12abc".to_string()));
    }

    #[test]
    fn test_non_finite_stays_text() {
        assert_eq!(coerce_field(Some("NaN")), Value::Text("NaN".to_string()));
        assert_eq!(coerce_field(Some("inf")), Value::Text("inf".to_string()));
    }

    #[test]
    fn test_short_row_maps_missing_to_null() {
        let schema = Arc::new(Schema::new(vec!["t".into(), "a".into(), "b".into()]));
        let row = TypedRow::from_raw(&raw(&[Some("1"), Some("x")]), &schema);
        assert_eq!(row.get("t"), Some(&Value::Number(1.0)));
        assert_eq!(row.get("a"), Some(&Value::Text("x".to_string())));
        assert_eq!(row.get("b"), Some(&Value::Null));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_extra_fields_dropped() {
        let schema = Arc::new(Schema::new(vec!["a".into()]));
        let row = TypedRow::from_raw(&raw(&[Some("1"), Some("2"), Some("3")]), &schema);
        assert_eq!(row.len(), 1);
    }

    #[test]
    fn test_row_without_schema_is_empty() {
        let schema = Arc::new(Schema::default());
        let row = TypedRow::from_raw(&raw(&[Some("1"), Some("2")]), &schema);
        assert!(row.is_empty());
        assert_eq!(row.iter().count(), 0);
    }

    #[test]
    fn test_schema_makes_headers_unique() {
        let schema = Schema::new(vec!["a".into(), "a".into(), "".into(), "a".into()]);
        assert_eq!(schema.headers(), &["a", "a_2", "column_3", "a_3"]);
        assert_eq!(schema.position("a_2"), Some(1));
    }

    #[test]
    fn test_typed_row_serializes_as_object() {
        let schema = Arc::new(Schema::new(vec!["a".into(), "b".into(), "c".into()]));
        let row = TypedRow::from_raw(&raw(&[Some("1.5"), Some("")]), &schema);
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"a":1.5,"b":"","c":null}"#);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(3.25), "3.25");
        assert_eq!(format_number(-7.0), "-7");
    }
}
