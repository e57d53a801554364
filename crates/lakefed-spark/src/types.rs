//! Remote value types
//!
//! What comes back from the warehouse before it is converted into host
//! blocks: typed cell values, ordered rows, and per-column result metadata.
//! Drivers produce these; the record reader consumes them.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single cell value from the warehouse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// 8-bit signed integer (TINYINT)
    Int8(i8),
    /// 16-bit signed integer (SMALLINT)
    Int16(i16),
    /// 32-bit signed integer (INT)
    Int32(i32),
    /// 64-bit signed integer (BIGINT)
    Int64(i64),
    /// 32-bit float (FLOAT)
    Float32(f32),
    /// 64-bit float (DOUBLE)
    Float64(f64),
    /// Arbitrary-precision decimal (DECIMAL)
    Decimal(Decimal),
    /// Text (STRING)
    String(String),
    /// Binary (BINARY)
    Bytes(Vec<u8>),
    /// Date without time (DATE)
    Date(NaiveDate),
    /// Timestamp without offset (TIMESTAMP_NTZ)
    DateTime(NaiveDateTime),
    /// Timestamp with offset (TIMESTAMP)
    DateTimeTz(DateTime<FixedOffset>),
}

impl Value {
    /// Check if the value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to read as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int8(n) => Some(*n != 0),
            Self::Int16(n) => Some(*n != 0),
            Self::Int32(n) => Some(*n != 0),
            Self::Int64(n) => Some(*n != 0),
            Self::String(s) => match s.to_lowercase().as_str() {
                "true" | "t" | "1" => Some(true),
                "false" | "f" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Try to read as an i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int8(n) => Some(i64::from(*n)),
            Self::Int16(n) => Some(i64::from(*n)),
            Self::Int32(n) => Some(i64::from(*n)),
            Self::Int64(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to read as an f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int8(n) => Some(f64::from(*n)),
            Self::Int16(n) => Some(f64::from(*n)),
            Self::Int32(n) => Some(f64::from(*n)),
            Self::Int64(n) => Some(*n as f64),
            Self::Float32(n) => Some(f64::from(*n)),
            Self::Float64(n) => Some(*n),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to borrow as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to read as a decimal
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Int8(n) => Some(Decimal::from(*n)),
            Self::Int16(n) => Some(Decimal::from(*n)),
            Self::Int32(n) => Some(Decimal::from(*n)),
            Self::Int64(n) => Some(Decimal::from(*n)),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to read as a date
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(d) => Some(*d),
            Self::DateTime(dt) => Some(dt.date()),
            Self::DateTimeTz(dt) => Some(dt.date_naive()),
            Self::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to read as a timestamp with offset
    pub fn as_datetime_tz(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            Self::DateTimeTz(dt) => Some(*dt),
            Self::DateTime(dt) => Some(dt.and_utc().fixed_offset()),
            Self::String(s) => DateTime::parse_from_rfc3339(s).ok(),
            _ => None,
        }
    }

    /// Render to a string, for any value with a scalar text form
    pub fn as_string(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int8(n) => Some(n.to_string()),
            Self::Int16(n) => Some(n.to_string()),
            Self::Int32(n) => Some(n.to_string()),
            Self::Int64(n) => Some(n.to_string()),
            Self::Float32(n) => Some(n.to_string()),
            Self::Float64(n) => Some(n.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::Date(d) => Some(d.to_string()),
            Self::DateTime(dt) => Some(dt.to_string()),
            Self::DateTimeTz(dt) => Some(dt.to_rfc3339()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::DateTimeTz(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Self::Null,
        }
    }
}

/// One result row as ordered column values
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Create a row; columns and values must align
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Column count
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the row has no columns
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names
    #[inline]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Value by column index
    #[inline]
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value by column name, case-insensitive
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .and_then(|idx| self.values.get(idx))
    }
}

/// Result metadata for one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name as the warehouse reports it
    pub name: String,
    /// Warehouse type name
    pub type_name: String,
    /// Precision for numeric types
    pub precision: Option<u32>,
    /// Scale for numeric types
    pub scale: Option<u32>,
}

impl ColumnInfo {
    /// Basic column metadata
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            precision: None,
            scale: None,
        }
    }
}

/// A complete query result from the warehouse
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    /// Result column metadata, in select order
    pub columns: Vec<ColumnInfo>,
    /// Result rows
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// Empty result
    pub fn empty() -> Self {
        Self::default()
    }

    /// Row count
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
