//! Query model shared between the host engine and connectors
//!
//! The host hands a connector three things per scan: the table it wants
//! ([`TableReference`]), what subset of it qualifies ([`Constraints`]), and
//! how results should be shaped (sort order, limit, or a full passthrough
//! query). Everything here is plain data; rendering into dialect SQL happens
//! in the connector crates.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fully qualified table coordinates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableReference {
    /// Catalog, when the warehouse distinguishes one
    pub catalog: Option<String>,
    /// Schema (database) name
    pub schema: String,
    /// Table name
    pub table: String,
}

impl TableReference {
    /// Create a schema-qualified reference without a catalog
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Create a fully qualified reference
    pub fn with_catalog(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            catalog: Some(catalog.into()),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for TableReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.catalog {
            Some(c) => write!(f, "{}.{}.{}", c, self.schema, self.table),
            None => write!(f, "{}.{}", self.schema, self.table),
        }
    }
}

/// Literal value in the constraint domain
///
/// Carries enough fidelity for dialect-correct literal rendering: decimals
/// keep their scale, temporal values keep their offset, binary stays raw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    /// SQL NULL
    Null,
    /// Boolean
    Boolean(bool),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit float
    Float64(f64),
    /// Arbitrary-precision decimal
    Decimal(Decimal),
    /// Text
    Varchar(String),
    /// Date without time
    Date(NaiveDate),
    /// Timestamp with offset
    TimestampTz(DateTime<FixedOffset>),
    /// Raw bytes
    Binary(Vec<u8>),
}

impl ScalarValue {
    /// Check if the value is NULL
    #[inline]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Host type name, for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean(_) => "BOOLEAN",
            Self::Int64(_) => "BIGINT",
            Self::Float64(_) => "DOUBLE",
            Self::Decimal(_) => "DECIMAL",
            Self::Varchar(_) => "VARCHAR",
            Self::Date(_) => "DATE",
            Self::TimestampTz(_) => "TIMESTAMPTZ",
            Self::Binary(_) => "VARBINARY",
        }
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int64(i64::from(v))
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float64(v)
    }
}

impl From<Decimal> for ScalarValue {
    fn from(v: Decimal) -> Self {
        Self::Decimal(v)
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Varchar(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Varchar(v.to_owned())
    }
}

impl From<NaiveDate> for ScalarValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<FixedOffset>> for ScalarValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::TimestampTz(v)
    }
}

impl From<Vec<u8>> for ScalarValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Binary(v)
    }
}

/// One endpoint of a range constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    /// No bound on this side
    Unbounded,
    /// Bound included in the range
    Inclusive(ScalarValue),
    /// Bound excluded from the range
    Exclusive(ScalarValue),
}

/// Contiguous range of values over one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower endpoint
    pub low: Bound,
    /// Upper endpoint
    pub high: Bound,
}

impl ValueRange {
    /// Range matching exactly one value
    pub fn equal(value: impl Into<ScalarValue>) -> Self {
        let v = value.into();
        Self {
            low: Bound::Inclusive(v.clone()),
            high: Bound::Inclusive(v),
        }
    }

    /// Range of everything above a value
    pub fn greater_than(value: impl Into<ScalarValue>) -> Self {
        Self {
            low: Bound::Exclusive(value.into()),
            high: Bound::Unbounded,
        }
    }

    /// Range of a value and everything above it
    pub fn at_least(value: impl Into<ScalarValue>) -> Self {
        Self {
            low: Bound::Inclusive(value.into()),
            high: Bound::Unbounded,
        }
    }

    /// Range of everything below a value
    pub fn less_than(value: impl Into<ScalarValue>) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Exclusive(value.into()),
        }
    }

    /// Range of a value and everything below it
    pub fn at_most(value: impl Into<ScalarValue>) -> Self {
        Self {
            low: Bound::Unbounded,
            high: Bound::Inclusive(value.into()),
        }
    }

    /// Closed range between two values
    pub fn between(low: impl Into<ScalarValue>, high: impl Into<ScalarValue>) -> Self {
        Self {
            low: Bound::Inclusive(low.into()),
            high: Bound::Inclusive(high.into()),
        }
    }

    /// The single value this range pins down, if both bounds agree
    pub fn single_value(&self) -> Option<&ScalarValue> {
        match (&self.low, &self.high) {
            (Bound::Inclusive(lo), Bound::Inclusive(hi)) if lo == hi => Some(lo),
            _ => None,
        }
    }

    /// True when neither side is bounded
    pub const fn is_unbounded(&self) -> bool {
        matches!(
            (&self.low, &self.high),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }
}

/// Per-column constraint summary
///
/// Either an ordered set of ranges or a discrete allow/deny list, each with
/// its own null-admission flag. This is the pushdown-friendly digest the
/// host computes; complex residuals travel as [`Expression`]s instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ValueSet {
    /// Ordered, non-overlapping ranges
    Ranges {
        /// Ranges in ascending order
        ranges: Vec<ValueRange>,
        /// Whether NULL qualifies
        null_allowed: bool,
    },
    /// Explicit value list
    Discrete {
        /// The listed values
        values: Vec<ScalarValue>,
        /// true: column must be one of the values; false: must not be
        allowed: bool,
        /// Whether NULL qualifies
        null_allowed: bool,
    },
}

impl ValueSet {
    /// Set matching exactly one value
    pub fn single(value: impl Into<ScalarValue>) -> Self {
        Self::Ranges {
            ranges: vec![ValueRange::equal(value)],
            null_allowed: false,
        }
    }

    /// Set matching nothing, not even NULL
    pub fn none() -> Self {
        Self::Discrete {
            values: Vec::new(),
            allowed: true,
            null_allowed: false,
        }
    }

    /// Set matching everything including NULL
    pub fn all() -> Self {
        Self::Ranges {
            ranges: vec![ValueRange {
                low: Bound::Unbounded,
                high: Bound::Unbounded,
            }],
            null_allowed: true,
        }
    }

    /// Set matching only NULL
    pub fn null_only() -> Self {
        Self::Discrete {
            values: Vec::new(),
            allowed: true,
            null_allowed: true,
        }
    }

    /// Set matching any of the listed values
    pub fn of(values: impl IntoIterator<Item = ScalarValue>) -> Self {
        Self::Discrete {
            values: values.into_iter().collect(),
            allowed: true,
            null_allowed: false,
        }
    }

    /// Whether NULL qualifies
    pub const fn null_allowed(&self) -> bool {
        match self {
            Self::Ranges { null_allowed, .. } | Self::Discrete { null_allowed, .. } => {
                *null_allowed
            }
        }
    }

    /// True when no value qualifies at all
    pub fn is_none(&self) -> bool {
        match self {
            Self::Ranges {
                ranges,
                null_allowed,
            } => ranges.is_empty() && !null_allowed,
            Self::Discrete {
                values,
                allowed,
                null_allowed,
            } => *allowed && values.is_empty() && !null_allowed,
        }
    }

    /// True when every value qualifies
    pub fn is_all(&self) -> bool {
        match self {
            Self::Ranges {
                ranges,
                null_allowed,
            } => *null_allowed && ranges.iter().any(ValueRange::is_unbounded),
            Self::Discrete {
                values,
                allowed,
                null_allowed,
            } => !*allowed && values.is_empty() && *null_allowed,
        }
    }

    /// The single value this set pins down, if any
    pub fn single_value(&self) -> Option<&ScalarValue> {
        match self {
            Self::Ranges {
                ranges,
                null_allowed: false,
            } if ranges.len() == 1 => ranges[0].single_value(),
            Self::Discrete {
                values,
                allowed: true,
                null_allowed: false,
            } if values.len() == 1 => Some(&values[0]),
            _ => None,
        }
    }
}

/// Sort direction for an ORDER BY field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    /// Ascending
    Asc,
    /// Descending
    Desc,
}

/// Null placement for an ORDER BY field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NullOrdering {
    /// NULLs sort before values
    NullsFirst,
    /// NULLs sort after values
    NullsLast,
}

/// One field of the requested sort order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    /// Column to sort by
    pub column: String,
    /// Direction
    pub direction: SortDirection,
    /// Null placement, always rendered explicitly
    pub null_ordering: NullOrdering,
}

impl SortField {
    /// Ascending sort with NULLs first
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
            null_ordering: NullOrdering::NullsFirst,
        }
    }

    /// Descending sort with NULLs last
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
            null_ordering: NullOrdering::NullsLast,
        }
    }

    /// Override the null placement
    pub fn with_null_ordering(mut self, null_ordering: NullOrdering) -> Self {
        self.null_ordering = null_ordering;
        self
    }
}

/// Complex predicate or projection expression pushed down by the host
///
/// Function names are the host's canonical vocabulary; connectors translate
/// them into dialect text and fall back to an upper-cased call for names
/// they do not recognize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Column reference by name
    Column(String),
    /// Literal value
    Literal(ScalarValue),
    /// Function or operator application
    Call {
        /// Canonical function name
        function: String,
        /// Arguments in host order
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Column reference
    pub fn column(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    /// Literal value
    pub fn literal(value: impl Into<ScalarValue>) -> Self {
        Self::Literal(value.into())
    }

    /// Function or operator application
    pub fn call(function: impl Into<String>, args: impl IntoIterator<Item = Expression>) -> Self {
        Self::Call {
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }
}

/// Raw query text supplied by the user, bypassing SQL generation entirely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassthroughQuery {
    /// The statement to run verbatim
    pub query: String,
    /// Positional argument text, when the host captured any
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl PassthroughQuery {
    /// Create a passthrough query with no arguments
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            arguments: Vec::new(),
        }
    }
}

/// Everything the host knows about which rows qualify and how to shape them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Constraints {
    /// Per-column constraint summaries, keyed by column name
    #[serde(default)]
    pub summary: BTreeMap<String, ValueSet>,
    /// Complex predicate conjuncts the summary cannot express
    #[serde(default)]
    pub expression: Vec<Expression>,
    /// Requested sort order
    #[serde(default)]
    pub order_by: Vec<SortField>,
    /// Row limit; zero or negative means unlimited
    #[serde(default)]
    pub limit: i64,
    /// Raw passthrough query, overriding everything else when present
    #[serde(default)]
    pub query_passthrough: Option<PassthroughQuery>,
}

impl Constraints {
    /// Unconstrained scan
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a per-column summary constraint
    pub fn with_summary(mut self, column: impl Into<String>, values: ValueSet) -> Self {
        self.summary.insert(column.into(), values);
        self
    }

    /// Add a complex predicate conjunct
    pub fn with_expression(mut self, expr: Expression) -> Self {
        self.expression.push(expr);
        self
    }

    /// Add a sort field
    pub fn with_order_by(mut self, field: SortField) -> Self {
        self.order_by.push(field);
        self
    }

    /// Set the row limit
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Set a passthrough query
    pub fn with_passthrough(mut self, query: PassthroughQuery) -> Self {
        self.query_passthrough = Some(query);
        self
    }

    /// Whether a limit was requested
    pub const fn has_limit(&self) -> bool {
        self.limit > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_reference_display() {
        let t = TableReference::new("sales", "orders");
        assert_eq!(t.to_string(), "sales.orders");

        let t = TableReference::with_catalog("main", "sales", "orders");
        assert_eq!(t.to_string(), "main.sales.orders");
    }

    #[test]
    fn test_scalar_from_impls() {
        assert_eq!(ScalarValue::from(42_i64), ScalarValue::Int64(42));
        assert_eq!(
            ScalarValue::from("hi"),
            ScalarValue::Varchar("hi".to_string())
        );
        assert!(ScalarValue::Null.is_null());
        assert!(!ScalarValue::Boolean(false).is_null());
    }

    #[test]
    fn test_range_single_value() {
        assert_eq!(
            ValueRange::equal(5_i64).single_value(),
            Some(&ScalarValue::Int64(5))
        );
        assert_eq!(ValueRange::greater_than(5_i64).single_value(), None);
        assert_eq!(ValueRange::between(1_i64, 2_i64).single_value(), None);
    }

    #[test]
    fn test_value_set_none_all() {
        assert!(ValueSet::none().is_none());
        assert!(!ValueSet::none().is_all());
        assert!(ValueSet::all().is_all());
        assert!(!ValueSet::all().is_none());
        assert!(ValueSet::null_only().null_allowed());
    }

    #[test]
    fn test_value_set_single_value() {
        assert_eq!(
            ValueSet::single(7_i64).single_value(),
            Some(&ScalarValue::Int64(7))
        );
        assert_eq!(
            ValueSet::of([ScalarValue::from("a")]).single_value(),
            Some(&ScalarValue::Varchar("a".to_string()))
        );
        assert_eq!(
            ValueSet::of([ScalarValue::from("a"), ScalarValue::from("b")]).single_value(),
            None
        );
    }

    #[test]
    fn test_constraints_builder() {
        let c = Constraints::new()
            .with_summary("id", ValueSet::single(1_i64))
            .with_order_by(SortField::asc("id"))
            .with_limit(10);

        assert_eq!(c.summary.len(), 1);
        assert_eq!(c.order_by.len(), 1);
        assert!(c.has_limit());
        assert!(!Constraints::new().has_limit());
    }

    #[test]
    fn test_expression_builders() {
        let e = Expression::call(
            "=",
            [Expression::column("id"), Expression::literal(3_i64)],
        );
        match e {
            Expression::Call { function, args } => {
                assert_eq!(function, "=");
                assert_eq!(args.len(), 2);
            }
            _ => panic!("expected call"),
        }
    }
}
