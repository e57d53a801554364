//! Expression translation
//!
//! Turns host expression trees into Spark SQL text. Translation is
//! best-effort and infallible: recognized functions get their dialect
//! rendering, unrecognized or wrong-arity calls fall back to
//! `UPPERCASED_NAME(arg, ...)`, and a malformed CASE collapses to a NULL
//! literal with a warning. A bad guess fails remotely with a message naming
//! the function, which beats refusing the pushdown here.

use lakefed_federation::{Expression, ScalarValue};
use tracing::{debug, warn};

use crate::dialect::Dialect;

/// Host function vocabulary this translator renders.
///
/// Advertised verbatim in the connector's capabilities; keep in sync with
/// [`ExpressionTranslator::translate_call`].
pub const SUPPORTED_FUNCTIONS: &[&str] = &[
    "equal",
    "not_equal",
    "less_than",
    "less_than_or_equal",
    "greater_than",
    "greater_than_or_equal",
    "and",
    "or",
    "not",
    "like",
    "not_like",
    "is_null",
    "is_not_null",
    "isnull",
    "isnotnull",
    "in",
    "not_in",
    "between",
    "not_between",
    "array",
    "cast",
    "date_add",
    "date_sub",
    "date_diff",
    "date_format",
    "year",
    "month",
    "day",
    "hour",
    "minute",
    "second",
    "regexp_like",
    "regexp_replace",
    "length",
    "substring",
    "upper",
    "lower",
    "trim",
    "ltrim",
    "rtrim",
    "concat",
    "coalesce",
    "nullif",
    "abs",
    "ceil",
    "ceiling",
    "floor",
    "round",
    "mod",
    "case",
    "count",
    "sum",
    "avg",
    "min",
    "max",
];

/// Translates host expressions into dialect SQL text
pub struct ExpressionTranslator<'a> {
    dialect: &'a dyn Dialect,
}

impl<'a> ExpressionTranslator<'a> {
    /// Create a translator over a dialect
    pub fn new(dialect: &'a dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Render an expression tree as SQL text
    pub fn translate(&self, expr: &Expression) -> String {
        match expr {
            Expression::Column(name) => self.dialect.quote_identifier(name),
            Expression::Literal(value) => self.format_literal(value),
            Expression::Call { function, args } => self.translate_call(function, args),
        }
    }

    /// Render a function call
    pub fn translate_call(&self, function: &str, args: &[Expression]) -> String {
        // CAST carries its target type as a string literal; resolve it
        // against the dialect before the argument is rendered as text.
        if function.trim_start_matches('$').eq_ignore_ascii_case("cast") {
            if let [value, Expression::Literal(ScalarValue::Varchar(target))] = args {
                return format!(
                    "CAST({} AS {})",
                    self.translate(value),
                    self.dialect.cast_type(target)
                );
            }
        }

        let rendered: Vec<String> = args.iter().map(|a| self.translate(a)).collect();
        self.render_call(function, &rendered)
    }

    /// Render a literal value as SQL text
    pub fn format_literal(&self, value: &ScalarValue) -> String {
        match value {
            ScalarValue::Null => "NULL".to_string(),
            ScalarValue::Boolean(b) => self.dialect.boolean_literal(*b).to_string(),
            ScalarValue::Int64(n) => n.to_string(),
            ScalarValue::Float64(n) => n.to_string(),
            ScalarValue::Decimal(d) => d.to_string(),
            ScalarValue::Varchar(s) => {
                format!("'{}'", self.dialect.escape_string_literal(s))
            }
            ScalarValue::Date(d) => format!("DATE '{d}'"),
            ScalarValue::TimestampTz(ts) => {
                format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.3f%:z"))
            }
            ScalarValue::Binary(bytes) => format_binary_literal(bytes),
        }
    }

    fn render_call(&self, function: &str, args: &[String]) -> String {
        let name = function.trim_start_matches('$').to_ascii_lowercase();
        match (name.as_str(), args) {
            ("equal" | "=", [a, b]) => format!("{a} = {b}"),
            ("not_equal" | "!=" | "<>", [a, b]) => format!("{a} != {b}"),
            ("less_than" | "<", [a, b]) => format!("{a} < {b}"),
            ("less_than_or_equal" | "<=", [a, b]) => format!("{a} <= {b}"),
            ("greater_than" | ">", [a, b]) => format!("{a} > {b}"),
            ("greater_than_or_equal" | ">=", [a, b]) => format!("{a} >= {b}"),
            ("and", [a, b]) => format!("({a} AND {b})"),
            ("or", [a, b]) => format!("({a} OR {b})"),
            ("not", [a]) => format!("NOT ({a})"),
            ("like", [a, b]) => format!("{a} LIKE {b}"),
            ("not_like", [a, b]) => format!("{a} NOT LIKE {b}"),
            ("is_null", [a]) => format!("{a} IS NULL"),
            ("is_not_null", [a]) => format!("{a} IS NOT NULL"),
            ("isnull", [a]) => format!("({a} IS NULL)"),
            ("isnotnull", [a]) => format!("({a} IS NOT NULL)"),
            ("in", [col, rest @ ..]) => format!("{col} IN ({})", rest.join(", ")),
            ("not_in", [col, rest @ ..]) => format!("{col} NOT IN ({})", rest.join(", ")),
            ("between", [v, lo, hi]) => format!("{v} BETWEEN {lo} AND {hi}"),
            ("not_between", [v, lo, hi]) => format!("{v} NOT BETWEEN {lo} AND {hi}"),
            ("array", elems) => format!("ARRAY({})", elems.join(", ")),
            ("date_add", [a, b]) => format!("DATE_ADD({a}, {b})"),
            ("date_sub", [a, b]) => format!("DATE_SUB({a}, {b})"),
            // Argument order is reversed between the host and Spark
            ("date_diff", [a, b]) => format!("DATEDIFF({b}, {a})"),
            ("date_format", [a, b]) => format!("DATE_FORMAT({a}, {b})"),
            ("year", [a]) => format!("YEAR({a})"),
            ("month", [a]) => format!("MONTH({a})"),
            ("day", [a]) => format!("DAY({a})"),
            ("hour", [a]) => format!("HOUR({a})"),
            ("minute", [a]) => format!("MINUTE({a})"),
            ("second", [a]) => format!("SECOND({a})"),
            ("regexp_like", [a, b]) => format!("({a} RLIKE {b})"),
            ("regexp_replace", [a, b, c]) => format!("REGEXP_REPLACE({a}, {b}, {c})"),
            ("length", [a]) => format!("LENGTH({a})"),
            ("substring", [a, b]) => format!("SUBSTRING({a}, {b})"),
            ("substring", [a, b, c]) => format!("SUBSTRING({a}, {b}, {c})"),
            ("upper", [a]) => format!("UPPER({a})"),
            ("lower", [a]) => format!("LOWER({a})"),
            ("trim", [a]) => format!("TRIM({a})"),
            ("ltrim", [a]) => format!("LTRIM({a})"),
            ("rtrim", [a]) => format!("RTRIM({a})"),
            ("concat", rest) if rest.len() >= 2 => format!("CONCAT({})", rest.join(", ")),
            ("coalesce", rest) if !rest.is_empty() => {
                format!("COALESCE({})", rest.join(", "))
            }
            ("nullif", [a, b]) => format!("NULLIF({a}, {b})"),
            ("abs", [a]) => format!("ABS({a})"),
            ("ceil" | "ceiling", [a]) => format!("CEIL({a})"),
            ("floor", [a]) => format!("FLOOR({a})"),
            ("round", [a]) => format!("ROUND({a})"),
            ("round", [a, b]) => format!("ROUND({a}, {b})"),
            ("mod", [a, b]) => format!("MOD({a}, {b})"),
            ("case", _) => render_case(args),
            ("count", [a]) => format!("COUNT({a})"),
            ("sum", [a]) => format!("SUM({a})"),
            ("avg", [a]) => format!("AVG({a})"),
            ("min", [a]) => format!("MIN({a})"),
            ("max", [a]) => format!("MAX({a})"),
            _ => {
                debug!(function = %name, "no dialect mapping, using generic call syntax");
                format!("{}({})", name.to_uppercase(), args.join(", "))
            }
        }
    }
}

/// CASE arguments alternate condition/result, with an optional trailing ELSE
fn render_case(args: &[String]) -> String {
    if args.len() < 3 {
        warn!(
            arg_count = args.len(),
            "CASE expression needs at least a condition, a result, and an alternative"
        );
        return "NULL".to_string();
    }

    let mut out = String::from("CASE");
    let mut i = 0;
    while i + 1 < args.len() {
        out.push_str(" WHEN ");
        out.push_str(&args[i]);
        out.push_str(" THEN ");
        out.push_str(&args[i + 1]);
        i += 2;
    }
    if args.len() % 2 == 1 {
        out.push_str(" ELSE ");
        out.push_str(&args[args.len() - 1]);
    }
    out.push_str(" END");
    out
}

fn format_binary_literal(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "NULL".to_string();
    }
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        out.push_str(&format!("{b:02X}"));
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SparkDialect;
    use chrono::{NaiveDate, TimeZone};
    use lakefed_federation::Expression as E;

    fn translate(expr: &Expression) -> String {
        let dialect = SparkDialect;
        ExpressionTranslator::new(&dialect).translate(expr)
    }

    #[test]
    fn test_comparison_operators() {
        let expr = E::call("equal", [E::column("id"), E::literal(5_i64)]);
        assert_eq!(translate(&expr), "`id` = 5");

        let expr = E::call(
            "greater_than_or_equal",
            [E::column("amount"), E::literal(1.5)],
        );
        assert_eq!(translate(&expr), "`amount` >= 1.5");

        let expr = E::call("$not_equal", [E::column("state"), E::literal("CA")]);
        assert_eq!(translate(&expr), "`state` != 'CA'");
    }

    #[test]
    fn test_boolean_connectives_parenthesize() {
        let expr = E::call(
            "and",
            [
                E::call("equal", [E::column("a"), E::literal(1_i64)]),
                E::call("or", [
                    E::call("is_null", [E::column("b")]),
                    E::call("equal", [E::column("c"), E::literal(2_i64)]),
                ]),
            ],
        );
        assert_eq!(
            translate(&expr),
            "(`a` = 1 AND (`b` IS NULL OR `c` = 2))"
        );

        let expr = E::call("not", [E::column("flag")]);
        assert_eq!(translate(&expr), "NOT (`flag`)");
    }

    #[test]
    fn test_null_checks_two_spellings() {
        assert_eq!(
            translate(&E::call("is_null", [E::column("x")])),
            "`x` IS NULL"
        );
        assert_eq!(
            translate(&E::call("isnull", [E::column("x")])),
            "(`x` IS NULL)"
        );
        assert_eq!(
            translate(&E::call("isnotnull", [E::column("x")])),
            "(`x` IS NOT NULL)"
        );
    }

    #[test]
    fn test_in_list() {
        let expr = E::call(
            "in",
            [
                E::column("state"),
                E::literal("CA"),
                E::literal("OR"),
                E::literal("WA"),
            ],
        );
        assert_eq!(translate(&expr), "`state` IN ('CA', 'OR', 'WA')");
    }

    #[test]
    fn test_between() {
        let expr = E::call(
            "between",
            [E::column("qty"), E::literal(1_i64), E::literal(10_i64)],
        );
        assert_eq!(translate(&expr), "`qty` BETWEEN 1 AND 10");
    }

    #[test]
    fn test_date_diff_reverses_arguments() {
        let expr = E::call(
            "date_diff",
            [E::column("start_date"), E::column("end_date")],
        );
        assert_eq!(translate(&expr), "DATEDIFF(`end_date`, `start_date`)");
    }

    #[test]
    fn test_regexp_like_renders_rlike() {
        let expr = E::call(
            "regexp_like",
            [E::column("name"), E::literal("^A.*")],
        );
        assert_eq!(translate(&expr), "(`name` RLIKE '^A.*')");
    }

    #[test]
    fn test_case_pairs_and_else() {
        let expr = E::call(
            "case",
            [
                E::literal("c1"),
                E::literal("t1"),
                E::literal("c2"),
                E::literal("t2"),
                E::literal("e"),
            ],
        );
        assert_eq!(
            translate(&expr),
            "CASE WHEN 'c1' THEN 't1' WHEN 'c2' THEN 't2' ELSE 'e' END"
        );
    }

    #[test]
    fn test_case_without_else() {
        let expr = E::call(
            "case",
            [
                E::literal("c1"),
                E::literal("t1"),
                E::literal("c2"),
                E::literal("t2"),
            ],
        );
        assert_eq!(
            translate(&expr),
            "CASE WHEN 'c1' THEN 't1' WHEN 'c2' THEN 't2' END"
        );
    }

    #[test]
    fn test_case_too_few_arguments_is_null() {
        let expr = E::call("case", [E::literal("c1"), E::literal("t1")]);
        assert_eq!(translate(&expr), "NULL");
    }

    #[test]
    fn test_unknown_function_uppercased() {
        let expr = E::call(
            "approx_percentile",
            [E::column("latency"), E::literal(0.99)],
        );
        assert_eq!(translate(&expr), "APPROX_PERCENTILE(`latency`, 0.99)");
    }

    #[test]
    fn test_wrong_arity_falls_back_to_generic() {
        let expr = E::call("year", [E::column("a"), E::column("b")]);
        assert_eq!(translate(&expr), "YEAR(`a`, `b`)");
    }

    #[test]
    fn test_string_literal_escaping() {
        assert_eq!(translate(&E::literal("O'Brien")), "'O''Brien'");
        assert_eq!(translate(&E::literal(r"path\file")), r"'path\\file'");
    }

    #[test]
    fn test_temporal_literals() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(
            translate(&E::Literal(lakefed_federation::ScalarValue::Date(date))),
            "DATE '2024-03-09'"
        );

        let ts = chrono::FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 12, 30, 0)
            .unwrap();
        assert_eq!(
            translate(&E::Literal(lakefed_federation::ScalarValue::TimestampTz(ts))),
            "TIMESTAMP '2024-03-09 12:30:00.000+00:00'"
        );
    }

    #[test]
    fn test_binary_literal() {
        assert_eq!(
            translate(&E::Literal(lakefed_federation::ScalarValue::Binary(vec![
                0xDE, 0xAD, 0x01
            ]))),
            "X'DEAD01'"
        );
        assert_eq!(
            translate(&E::Literal(lakefed_federation::ScalarValue::Binary(vec![]))),
            "NULL"
        );
    }

    #[test]
    fn test_boolean_and_null_literals() {
        assert_eq!(translate(&E::literal(true)), "TRUE");
        assert_eq!(
            translate(&E::Literal(lakefed_federation::ScalarValue::Null)),
            "NULL"
        );
    }

    #[test]
    fn test_cast_resolves_dialect_type() {
        let expr = E::call("cast", [E::column("id"), E::literal("VARCHAR")]);
        assert_eq!(translate(&expr), "CAST(`id` AS STRING)");

        let expr = E::call("cast", [E::column("id"), E::literal("integer")]);
        assert_eq!(translate(&expr), "CAST(`id` AS INT)");
    }

    #[test]
    fn test_array_constructor() {
        let expr = E::call(
            "array",
            [E::literal(1_i64), E::literal(2_i64), E::literal(3_i64)],
        );
        assert_eq!(translate(&expr), "ARRAY(1, 2, 3)");
    }

    #[test]
    fn test_vocabulary_has_no_blank_or_duplicate_names() {
        let mut seen = std::collections::BTreeSet::new();
        for name in SUPPORTED_FUNCTIONS {
            assert!(!name.is_empty());
            assert!(seen.insert(*name), "duplicate advertised function {name}");
        }
        assert!(SUPPORTED_FUNCTIONS.contains(&"date_diff"));
        assert!(SUPPORTED_FUNCTIONS.contains(&"case"));
    }
}
