//! SQL dialect rules
//!
//! The [`Dialect`] trait is the capability seam between generic query
//! assembly and warehouse-specific text: quoting, literal escaping, cast
//! targets, and static capability answers all come from here. Builders and
//! translators borrow a `&dyn Dialect` instead of subclassing anything, so
//! a second warehouse means a second impl, not a parallel builder.

use lakefed_federation::DialectCapabilities;

/// Spark SQL reserved words that force identifier quoting
const SPARK_RESERVED_WORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION",
    "INTERSECT", "EXCEPT", "WITH", "CASE", "WHEN", "THEN", "ELSE", "END", "AND", "OR", "NOT",
    "IN", "EXISTS", "BETWEEN", "LIKE", "RLIKE", "REGEXP", "IS", "NULL", "TRUE", "FALSE",
    "DISTINCT", "ALL", "ANY", "SOME", "INNER", "LEFT", "RIGHT", "FULL", "OUTER", "JOIN", "ON",
    "USING", "CREATE", "DROP", "ALTER", "INSERT", "UPDATE", "DELETE", "MERGE", "TABLE", "VIEW",
    "DATABASE", "SCHEMA", "CATALOG", "PARTITION", "INDEX", "BY", "LOCATION", "OPTIONS",
    "TBLPROPERTIES",
];

/// Warehouse-specific SQL text rules
pub trait Dialect: Send + Sync {
    /// Dialect name, for logs
    fn name(&self) -> &str;

    /// The identifier quote character
    fn quote_char(&self) -> char;

    /// Reserved words that make an identifier unsafe unquoted
    fn reserved_words(&self) -> &'static [&'static str];

    /// Quote an identifier, doubling any embedded quote characters.
    ///
    /// Always quotes, so callers never have to decide whether an
    /// identifier is safe bare.
    fn quote_identifier(&self, raw: &str) -> String {
        let q = self.quote_char();
        let mut out = String::with_capacity(raw.len() + 2);
        out.push(q);
        for c in raw.chars() {
            if c == q {
                out.push(q);
            }
            out.push(c);
        }
        out.push(q);
        out
    }

    /// Whether an identifier would need quoting to be safe.
    ///
    /// Advisory only; [`quote_identifier`](Self::quote_identifier) quotes
    /// regardless.
    fn needs_quoting(&self, raw: &str) -> bool {
        raw.is_empty()
            || raw.chars().any(|c| c.is_whitespace() || c == '-' || c == '.')
            || raw.chars().next().is_some_and(|c| c.is_ascii_digit())
            || self
                .reserved_words()
                .iter()
                .any(|w| w.eq_ignore_ascii_case(raw))
    }

    /// Escape a string for embedding in a single-quoted literal
    fn escape_string_literal(&self, s: &str) -> String {
        s.replace('\\', "\\\\").replace('\'', "''")
    }

    /// Boolean literal text
    fn boolean_literal(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Map a host type name to this dialect's CAST target
    fn cast_type(&self, host_type: &str) -> &'static str;

    /// Static capabilities of this dialect
    fn capabilities(&self) -> DialectCapabilities;
}

/// Spark SQL dialect (Databricks-flavored)
#[derive(Debug, Clone, Copy, Default)]
pub struct SparkDialect;

impl Dialect for SparkDialect {
    fn name(&self) -> &str {
        "spark"
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn reserved_words(&self) -> &'static [&'static str] {
        SPARK_RESERVED_WORDS
    }

    fn cast_type(&self, host_type: &str) -> &'static str {
        match host_type.to_ascii_uppercase().as_str() {
            "TINYINT" => "TINYINT",
            "SMALLINT" => "SMALLINT",
            "INTEGER" | "INT" => "INT",
            "BIGINT" => "BIGINT",
            "FLOAT" => "FLOAT",
            "DOUBLE" => "DOUBLE",
            "DECIMAL" => "DECIMAL",
            "BOOLEAN" => "BOOLEAN",
            "STRING" | "VARCHAR" | "CHAR" => "STRING",
            "BINARY" => "BINARY",
            "DATE" => "DATE",
            "TIMESTAMP" => "TIMESTAMP",
            "ARRAY" => "ARRAY",
            "MAP" => "MAP",
            "STRUCT" => "STRUCT",
            other => {
                tracing::debug!(host_type = other, "no cast mapping, using STRING");
                "STRING"
            }
        }
    }

    fn capabilities(&self) -> DialectCapabilities {
        DialectCapabilities {
            supports_transactions: false,
            supports_limit: true,
            supports_top_n: true,
        }
    }
}
