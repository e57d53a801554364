//! Streaming split reads.
//!
//! [`RecordReader`] runs one split end to end: build the statement, execute
//! it on a live connection, and push the result rows into host blocks
//! through a [`BlockWriter`]. How each destination column is filled is
//! resolved once, when the schema binds, as a [`ColumnExtractor`] per
//! column; row processing then dispatches on that resolved tag instead of
//! re-inspecting types per row.
//!
//! A cell that cannot be extracted is set NULL, logged, and counted; the
//! rest of the row is delivered. Cancellation is polled at row boundaries
//! and stops the read with whatever was already produced.

use std::sync::Arc;
use std::time::Instant;

use arrow_schema::{DataType, Field, SchemaRef, TimeUnit};
use chrono::{NaiveDate, NaiveTime};
use lakefed_federation::model::{Constraints, TableReference};
use lakefed_federation::{BlockSink, BlockWriter, FederationError, RequestContext, Result, Split};
use metrics::{counter, histogram};
use tracing::{debug, error, info};

use crate::connection::WarehouseConnection;
use crate::dialect::Dialect;
use crate::query::SplitQueryBuilder;
use crate::stats::AtomicConnectorStats;
use crate::types::{Row, Value};

/// Per-column extraction plan, resolved at schema-bind time.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExtractor {
    /// The split's coordinate for this column, injected without reading
    /// the row
    PartitionValue(String),
    /// DECIMAL destination
    Decimal,
    /// DATE destination, carried as epoch milliseconds
    DateMillis,
    /// TIMESTAMP destination with a timezone
    TimestampTz,
    /// Any other destination, routed by its declared type
    Generic(DataType),
}

impl ColumnExtractor {
    /// Resolve the extractor for one destination field.
    ///
    /// A field whose name appears in the split's property bag is
    /// split-derived: its value never comes from the result set.
    pub fn for_field(field: &Field, split: &Split) -> Self {
        if let Some(value) = split.property(field.name()) {
            return Self::PartitionValue(value.to_string());
        }
        match field.data_type() {
            DataType::Decimal128(..) => Self::Decimal,
            DataType::Date64 => Self::DateMillis,
            DataType::Timestamp(TimeUnit::Millisecond, Some(_)) => Self::TimestampTz,
            other => Self::Generic(other.clone()),
        }
    }

    /// Write one cell into the block.
    ///
    /// NULL input sets NULL for every variant except the split-derived
    /// one, which ignores the row entirely.
    pub fn append(&self, writer: &mut BlockWriter, col: usize, value: &Value) -> Result<()> {
        match self {
            Self::PartitionValue(partition) => writer.append_str(col, partition),
            _ if value.is_null() => writer.append_null(col),
            Self::Decimal => match value.as_decimal() {
                Some(decimal) => writer.append_decimal(col, decimal),
                None => Err(cell_mismatch("decimal", value)),
            },
            Self::DateMillis => match value.as_date() {
                Some(date) => writer.append_date_millis(col, date_to_epoch_millis(date)),
                None => Err(cell_mismatch("date", value)),
            },
            Self::TimestampTz => match value.as_datetime_tz() {
                Some(ts) => writer.append_timestamp_millis(col, ts.timestamp_millis()),
                None => Err(cell_mismatch("timestamp", value)),
            },
            Self::Generic(data_type) => append_generic(writer, col, data_type, value),
        }
    }
}

fn append_generic(
    writer: &mut BlockWriter,
    col: usize,
    data_type: &DataType,
    value: &Value,
) -> Result<()> {
    match data_type {
        DataType::Boolean => match value.as_bool() {
            Some(v) => writer.append_bool(col, v),
            None => Err(cell_mismatch("boolean", value)),
        },
        DataType::Int8 => {
            let n = value.as_i64().ok_or_else(|| cell_mismatch("int8", value))?;
            let n = i8::try_from(n).map_err(|_| out_of_range("int8", n))?;
            writer.append_i8(col, n)
        }
        DataType::Int16 => {
            let n = value.as_i64().ok_or_else(|| cell_mismatch("int16", value))?;
            let n = i16::try_from(n).map_err(|_| out_of_range("int16", n))?;
            writer.append_i16(col, n)
        }
        DataType::Int32 => {
            let n = value.as_i64().ok_or_else(|| cell_mismatch("int32", value))?;
            let n = i32::try_from(n).map_err(|_| out_of_range("int32", n))?;
            writer.append_i32(col, n)
        }
        DataType::Int64 => match value.as_i64() {
            Some(n) => writer.append_i64(col, n),
            None => Err(cell_mismatch("int64", value)),
        },
        DataType::Float32 => match value.as_f64() {
            Some(f) => writer.append_f32(col, f as f32),
            None => Err(cell_mismatch("float32", value)),
        },
        DataType::Float64 => match value.as_f64() {
            Some(f) => writer.append_f64(col, f),
            None => Err(cell_mismatch("float64", value)),
        },
        DataType::Utf8 => match value.as_string() {
            Some(s) => writer.append_str(col, &s),
            None => Err(cell_mismatch("string", value)),
        },
        DataType::Binary => match value {
            Value::Bytes(bytes) => writer.append_bytes(col, bytes),
            _ => Err(cell_mismatch("binary", value)),
        },
        DataType::Timestamp(TimeUnit::Millisecond, None) => match value.as_datetime_tz() {
            Some(ts) => writer.append_timestamp_millis(col, ts.timestamp_millis()),
            None => Err(cell_mismatch("timestamp", value)),
        },
        other => Err(FederationError::internal(format!(
            "no extraction path for column type {}",
            other
        ))),
    }
}

fn cell_mismatch(wanted: &str, value: &Value) -> FederationError {
    FederationError::internal(format!(
        "cannot extract {} from a {} cell",
        wanted,
        value_kind(value)
    ))
}

fn out_of_range(wanted: &str, n: i64) -> FederationError {
    FederationError::internal(format!("value {} does not fit in {}", n, wanted))
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => "integer",
        Value::Float32(_) | Value::Float64(_) => "float",
        Value::Decimal(_) => "decimal",
        Value::String(_) => "string",
        Value::Bytes(_) => "binary",
        Value::Date(_) => "date",
        Value::DateTime(_) | Value::DateTimeTz(_) => "timestamp",
    }
}

fn date_to_epoch_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Streams one split's rows from the warehouse into host blocks.
pub struct RecordReader {
    dialect: Arc<dyn Dialect>,
    rows_per_block: usize,
    stats: Arc<AtomicConnectorStats>,
}

impl RecordReader {
    /// Create a reader that flushes a block every `rows_per_block` rows.
    pub fn new(
        dialect: Arc<dyn Dialect>,
        rows_per_block: usize,
        stats: Arc<AtomicConnectorStats>,
    ) -> Self {
        Self {
            dialect,
            rows_per_block,
            stats,
        }
    }

    /// Execute the split's statement and deliver its rows to the sink.
    ///
    /// Returns the number of rows delivered. A host that abandons the
    /// query stops the read at a row boundary; whatever was already
    /// written stays delivered.
    pub async fn read_split(
        &self,
        ctx: &RequestContext,
        connection: &dyn WarehouseConnection,
        table: &TableReference,
        schema: &SchemaRef,
        constraints: &Constraints,
        split: &Split,
        sink: &mut dyn BlockSink,
    ) -> Result<u64> {
        let sql = SplitQueryBuilder::new(self.dialect.as_ref()).build_statement(
            table,
            Some(schema.as_ref()),
            constraints,
            split,
        );
        debug!(query_id = %ctx.query_id, table = %table, "executing split statement");

        let started = Instant::now();
        let result = connection.execute_query(&sql, &[]).await?;
        histogram!("spark.query.duration_ms").record(started.elapsed().as_millis() as f64);

        let extractors: Vec<ColumnExtractor> = schema
            .fields()
            .iter()
            .map(|field| ColumnExtractor::for_field(field, split))
            .collect();
        let mut writer = BlockWriter::new(schema.clone())?;

        let mut rows_read = 0u64;
        for row in &result.rows {
            if !ctx.status.is_running() {
                info!(
                    query_id = %ctx.query_id,
                    rows = rows_read,
                    "host abandoned query, stopping split read"
                );
                break;
            }
            self.append_row(ctx, &mut writer, &extractors, schema, row)?;
            rows_read += 1;
            if writer.row_count() >= self.rows_per_block {
                sink.write(writer.finish()?)?;
            }
        }
        if !writer.is_empty() {
            sink.write(writer.finish()?)?;
        }

        self.stats.record_split_read(rows_read);
        counter!("spark.rows.read").increment(rows_read);
        info!(query_id = %ctx.query_id, rows = rows_read, "split read complete");
        Ok(rows_read)
    }

    fn append_row(
        &self,
        ctx: &RequestContext,
        writer: &mut BlockWriter,
        extractors: &[ColumnExtractor],
        schema: &SchemaRef,
        row: &Row,
    ) -> Result<()> {
        let null = Value::Null;
        for (col, extractor) in extractors.iter().enumerate() {
            let field = schema.field(col);
            let value = match extractor {
                ColumnExtractor::PartitionValue(_) => &null,
                _ => row.get_by_name(field.name()).unwrap_or(&null),
            };
            if let Err(err) = extractor.append(writer, col, value) {
                error!(
                    query_id = %ctx.query_id,
                    column = field.name().as_str(),
                    error = %err,
                    "cell extraction failed, setting NULL"
                );
                self.stats.record_cell_failure();
                counter!("spark.cells.failed").increment(1);
                writer.append_null(col)?;
            }
        }
        Ok(())
    }
}
