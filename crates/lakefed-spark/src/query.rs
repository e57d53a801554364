//! Split-scoped SQL assembly for the Spark dialect.
//!
//! [`SplitQueryBuilder`] turns a table reference, an optional projected
//! schema, the host's pushed-down constraints, and one split's partition
//! coordinates into a single executable statement. Building is pure string
//! work: no driver calls, no error paths. A malformed constraint produces
//! best-effort SQL rather than a failure, so one bad predicate cannot sink
//! an otherwise valid split.

use std::sync::LazyLock;

use arrow_schema::Schema;
use lakefed_federation::model::{
    Bound, Constraints, NullOrdering, ScalarValue, SortDirection, SortField, TableReference,
    ValueRange, ValueSet,
};
use lakefed_federation::split::{PROP_PARTITION_ID, PROP_SPLIT_COUNT, PROP_SPLIT_PART};
use lakefed_federation::Split;
use regex::Regex;
use tracing::debug;

use crate::dialect::Dialect;
use crate::expr::ExpressionTranslator;
use crate::{ALL_PARTITIONS, HIVE_DEFAULT_PARTITION, PARTITION_COLUMN};

static INTEGER_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").unwrap());

static DECIMAL_VALUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d*\.\d+$").unwrap());

/// Builds one SQL statement per split.
///
/// Clause order is fixed: SELECT, FROM, WHERE, ORDER BY, LIMIT. A
/// pass-through query replaces all of them verbatim.
pub struct SplitQueryBuilder<'a> {
    dialect: &'a dyn Dialect,
    translator: ExpressionTranslator<'a>,
}

impl<'a> SplitQueryBuilder<'a> {
    /// Create a builder over the given dialect.
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self {
            dialect,
            translator: ExpressionTranslator::new(dialect),
        }
    }

    /// Assemble the statement for one split of a table scan.
    pub fn build_statement(
        &self,
        table: &TableReference,
        schema: Option<&Schema>,
        constraints: &Constraints,
        split: &Split,
    ) -> String {
        if let Some(passthrough) = &constraints.query_passthrough {
            debug!(query = %passthrough.query, "using pass-through query");
            return passthrough.query.clone();
        }

        let mut clauses = vec![self.select_clause(schema, split), self.from_clause(table)];

        let mut conjuncts = self.partition_conjuncts(split);
        for (column, values) in &constraints.summary {
            // Partition pruning already travels through the split bag.
            if column == PARTITION_COLUMN {
                continue;
            }
            if let Some(conjunct) = self.summary_conjunct(column, values) {
                conjuncts.push(conjunct);
            }
        }
        for expr in &constraints.expression {
            conjuncts.push(self.translator.translate(expr));
        }
        if !conjuncts.is_empty() {
            clauses.push(format!("WHERE {}", conjuncts.join(" AND ")));
        }

        if !constraints.order_by.is_empty() {
            clauses.push(self.order_by_clause(&constraints.order_by));
        }
        if constraints.has_limit() {
            clauses.push(format!("LIMIT {}", constraints.limit));
        }

        let sql = clauses.join(" ");
        debug!(%sql, "built split statement");
        sql
    }

    /// Projection list, minus columns whose values travel in the split.
    ///
    /// Split-derived columns are not real remote columns; their values are
    /// injected during extraction. When that leaves nothing to select, a
    /// bare `null` keeps the row cardinality intact.
    fn select_clause(&self, schema: Option<&Schema>, split: &Split) -> String {
        match schema {
            Some(schema) if !schema.fields().is_empty() => {
                let columns = schema
                    .fields()
                    .iter()
                    .filter(|field| !split.properties.contains_key(field.name().as_str()))
                    .map(|field| self.dialect.quote_identifier(field.name()))
                    .collect::<Vec<_>>()
                    .join(", ");
                if columns.is_empty() {
                    "SELECT null".to_string()
                } else {
                    format!("SELECT {}", columns)
                }
            }
            _ => "SELECT *".to_string(),
        }
    }

    fn from_clause(&self, table: &TableReference) -> String {
        let mut parts = Vec::new();
        if let Some(catalog) = &table.catalog {
            if !catalog.is_empty() {
                parts.push(self.dialect.quote_identifier(catalog));
            }
        }
        if !table.schema.is_empty() {
            parts.push(self.dialect.quote_identifier(&table.schema));
        }
        parts.push(self.dialect.quote_identifier(&table.table));
        format!("FROM {}", parts.join("."))
    }

    /// Partition predicates recovered from the split's property bag.
    ///
    /// Bookkeeping keys and the wildcard sentinel contribute nothing. A
    /// `partition_`-prefixed key constrains the column named by the rest of
    /// the key; a `col=value` key is a Hive-style coordinate.
    fn partition_conjuncts(&self, split: &Split) -> Vec<String> {
        let mut conjuncts = Vec::new();
        for (key, value) in &split.properties {
            if key == PROP_PARTITION_ID || key == PROP_SPLIT_PART || key == PROP_SPLIT_COUNT {
                continue;
            }
            if key == PARTITION_COLUMN && value == ALL_PARTITIONS {
                debug!("wildcard partition, no pruning predicate");
                continue;
            }
            if let Some(column) = key.strip_prefix("partition_") {
                if !value.is_empty() && value != ALL_PARTITIONS {
                    let conjunct =
                        self.partition_predicate(&self.dialect.quote_identifier(column), value);
                    debug!(%conjunct, "partition predicate");
                    conjuncts.push(conjunct);
                }
            } else if key.contains('=') && !key.starts_with("__") {
                if let Some((column, value)) = key.split_once('=') {
                    if value != ALL_PARTITIONS {
                        let conjunct =
                            self.partition_predicate(&self.dialect.quote_identifier(column), value);
                        debug!(%conjunct, "hive-style partition predicate");
                        conjuncts.push(conjunct);
                    }
                }
            }
        }
        conjuncts
    }

    /// Render one partition coordinate as a predicate.
    ///
    /// Numeric and boolean values stay unquoted; an empty value or the
    /// catalog's default-partition marker means the column is NULL for the
    /// whole partition.
    fn partition_predicate(&self, quoted_column: &str, value: &str) -> String {
        if value.is_empty() || value == HIVE_DEFAULT_PARTITION {
            return format!("{} IS NULL", quoted_column);
        }
        if INTEGER_VALUE.is_match(value) || DECIMAL_VALUE.is_match(value) {
            return format!("{} = {}", quoted_column, value);
        }
        if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
            return format!("{} = {}", quoted_column, value.to_ascii_lowercase());
        }
        format!(
            "{} = '{}'",
            quoted_column,
            self.dialect.escape_string_literal(value)
        )
    }

    /// Render one column's constraint summary, or nothing when every value
    /// qualifies.
    fn summary_conjunct(&self, column: &str, values: &ValueSet) -> Option<String> {
        if values.is_all() {
            return None;
        }
        let quoted = self.dialect.quote_identifier(column);
        if values.is_none() {
            return Some("FALSE".to_string());
        }
        match values {
            ValueSet::Discrete {
                values,
                allowed,
                null_allowed,
            } => Some(self.discrete_conjunct(&quoted, values, *allowed, *null_allowed)),
            ValueSet::Ranges {
                ranges,
                null_allowed,
            } => Some(self.ranges_conjunct(&quoted, ranges, *null_allowed)),
        }
    }

    fn discrete_conjunct(
        &self,
        quoted: &str,
        values: &[ScalarValue],
        allowed: bool,
        null_allowed: bool,
    ) -> String {
        if values.is_empty() {
            // is_all/is_none are handled by the caller, so an empty list
            // constrains nullability alone.
            return if null_allowed {
                format!("{} IS NULL", quoted)
            } else {
                format!("{} IS NOT NULL", quoted)
            };
        }
        let rendered: Vec<String> = values
            .iter()
            .map(|v| self.translator.format_literal(v))
            .collect();
        let predicate = match (allowed, rendered.len()) {
            (true, 1) => format!("{} = {}", quoted, rendered[0]),
            (true, _) => format!("{} IN ({})", quoted, rendered.join(", ")),
            (false, 1) => format!("{} != {}", quoted, rendered[0]),
            (false, _) => format!("{} NOT IN ({})", quoted, rendered.join(", ")),
        };
        if null_allowed {
            format!("({} OR {} IS NULL)", predicate, quoted)
        } else {
            predicate
        }
    }

    fn ranges_conjunct(&self, quoted: &str, ranges: &[ValueRange], null_allowed: bool) -> String {
        if ranges.is_empty() {
            // Not none, so NULL must be admitted.
            return format!("{} IS NULL", quoted);
        }
        if !null_allowed && ranges.iter().any(ValueRange::is_unbounded) {
            return format!("{} IS NOT NULL", quoted);
        }

        let mut disjuncts = Vec::new();
        if null_allowed {
            disjuncts.push(format!("{} IS NULL", quoted));
        }
        let mut singles = Vec::new();
        for range in ranges {
            if let Some(value) = range.single_value() {
                singles.push(self.translator.format_literal(value));
                continue;
            }
            if let Some(disjunct) = self.range_disjunct(quoted, range) {
                disjuncts.push(disjunct);
            }
        }
        match singles.len() {
            0 => {}
            1 => disjuncts.push(format!("{} = {}", quoted, singles[0])),
            _ => disjuncts.push(format!("{} IN ({})", quoted, singles.join(", "))),
        }

        if disjuncts.len() == 1 {
            disjuncts.remove(0)
        } else {
            format!("({})", disjuncts.join(" OR "))
        }
    }

    fn range_disjunct(&self, quoted: &str, range: &ValueRange) -> Option<String> {
        if let (Bound::Inclusive(low), Bound::Inclusive(high)) = (&range.low, &range.high) {
            return Some(format!(
                "{} BETWEEN {} AND {}",
                quoted,
                self.translator.format_literal(low),
                self.translator.format_literal(high)
            ));
        }
        let mut bounds = Vec::new();
        match &range.low {
            Bound::Inclusive(v) => {
                bounds.push(format!("{} >= {}", quoted, self.translator.format_literal(v)));
            }
            Bound::Exclusive(v) => {
                bounds.push(format!("{} > {}", quoted, self.translator.format_literal(v)));
            }
            Bound::Unbounded => {}
        }
        match &range.high {
            Bound::Inclusive(v) => {
                bounds.push(format!("{} <= {}", quoted, self.translator.format_literal(v)));
            }
            Bound::Exclusive(v) => {
                bounds.push(format!("{} < {}", quoted, self.translator.format_literal(v)));
            }
            Bound::Unbounded => {}
        }
        match bounds.len() {
            0 => None,
            1 => Some(bounds.remove(0)),
            _ => Some(format!("({})", bounds.join(" AND "))),
        }
    }

    fn order_by_clause(&self, fields: &[SortField]) -> String {
        let rendered = fields
            .iter()
            .map(|field| {
                let direction = match field.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                let nulls = match field.null_ordering {
                    NullOrdering::NullsFirst => "NULLS FIRST",
                    NullOrdering::NullsLast => "NULLS LAST",
                };
                format!(
                    "{} {} {}",
                    self.dialect.quote_identifier(&field.column),
                    direction,
                    nulls
                )
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("ORDER BY {}", rendered)
    }
}
