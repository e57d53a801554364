//! Columnar block writing
//!
//! Connectors hand rows to a [`BlockWriter`], which accumulates them in
//! Arrow builders matching the host-bound schema and emits
//! [`RecordBatch`]es through a [`BlockSink`]. Each column gets one typed
//! sink resolved at construction time; appending the wrong type is a bug
//! and reported as an internal error, never silently coerced.
//!
//! Supported column types: Boolean, Int8..Int64, Float32/64, Utf8, Binary,
//! Date64 (epoch millis), millisecond Timestamp with optional timezone,
//! and Decimal128. Anything else fails at writer construction.

use arrow_array::builder::{
    ArrayBuilder, BinaryBuilder, BooleanBuilder, Date64Builder, Decimal128Builder, Float32Builder,
    Float64Builder, Int16Builder, Int32Builder, Int64Builder, Int8Builder, StringBuilder,
    TimestampMillisecondBuilder,
};
use arrow_array::RecordBatch;
use arrow_schema::{DataType, Field, SchemaRef, TimeUnit};
use rust_decimal::Decimal;

use crate::error::{FederationError, Result};

/// Consumer of finished record batches
pub trait BlockSink {
    /// Accept one batch
    fn write(&mut self, batch: RecordBatch) -> Result<()>;
}

/// Sink that collects batches in memory, for tests and small results
#[derive(Debug, Default)]
pub struct VecSink {
    /// Collected batches
    pub batches: Vec<RecordBatch>,
}

impl VecSink {
    /// Empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all collected batches
    pub fn row_count(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

impl BlockSink for VecSink {
    fn write(&mut self, batch: RecordBatch) -> Result<()> {
        self.batches.push(batch);
        Ok(())
    }
}

enum ColumnSink {
    Boolean(BooleanBuilder),
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
    DateMillis(Date64Builder),
    TimestampMillis(TimestampMillisecondBuilder),
    Decimal {
        builder: Decimal128Builder,
        scale: i8,
    },
}

impl ColumnSink {
    fn for_field(field: &Field) -> Result<Self> {
        let sink = match field.data_type() {
            DataType::Boolean => Self::Boolean(BooleanBuilder::new()),
            DataType::Int8 => Self::Int8(Int8Builder::new()),
            DataType::Int16 => Self::Int16(Int16Builder::new()),
            DataType::Int32 => Self::Int32(Int32Builder::new()),
            DataType::Int64 => Self::Int64(Int64Builder::new()),
            DataType::Float32 => Self::Float32(Float32Builder::new()),
            DataType::Float64 => Self::Float64(Float64Builder::new()),
            DataType::Utf8 => Self::Utf8(StringBuilder::new()),
            DataType::Binary => Self::Binary(BinaryBuilder::new()),
            DataType::Date64 => Self::DateMillis(Date64Builder::new()),
            DataType::Timestamp(TimeUnit::Millisecond, tz) => {
                let builder = match tz {
                    Some(tz) => TimestampMillisecondBuilder::new().with_timezone(tz.clone()),
                    None => TimestampMillisecondBuilder::new(),
                };
                Self::TimestampMillis(builder)
            }
            DataType::Decimal128(precision, scale) => {
                if *scale < 0 {
                    return Err(FederationError::invalid_input(format!(
                        "column {} has negative decimal scale {scale}",
                        field.name()
                    )));
                }
                let builder = Decimal128Builder::new()
                    .with_precision_and_scale(*precision, *scale)
                    .map_err(|e| {
                        FederationError::invalid_input(format!(
                            "column {}: {e}",
                            field.name()
                        ))
                    })?;
                Self::Decimal {
                    builder,
                    scale: *scale,
                }
            }
            other => {
                return Err(FederationError::invalid_input(format!(
                    "unsupported block column type {other} for column {}",
                    field.name()
                )))
            }
        };
        Ok(sink)
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Int8(_) => "int8",
            Self::Int16(_) => "int16",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Utf8(_) => "utf8",
            Self::Binary(_) => "binary",
            Self::DateMillis(_) => "date64",
            Self::TimestampMillis(_) => "timestamp-ms",
            Self::Decimal { .. } => "decimal128",
        }
    }

    fn as_builder(&mut self) -> &mut dyn ArrayBuilder {
        match self {
            Self::Boolean(b) => b,
            Self::Int8(b) => b,
            Self::Int16(b) => b,
            Self::Int32(b) => b,
            Self::Int64(b) => b,
            Self::Float32(b) => b,
            Self::Float64(b) => b,
            Self::Utf8(b) => b,
            Self::Binary(b) => b,
            Self::DateMillis(b) => b,
            Self::TimestampMillis(b) => b,
            Self::Decimal { builder, .. } => builder,
        }
    }

    fn append_null(&mut self) {
        match self {
            Self::Boolean(b) => b.append_null(),
            Self::Int8(b) => b.append_null(),
            Self::Int16(b) => b.append_null(),
            Self::Int32(b) => b.append_null(),
            Self::Int64(b) => b.append_null(),
            Self::Float32(b) => b.append_null(),
            Self::Float64(b) => b.append_null(),
            Self::Utf8(b) => b.append_null(),
            Self::Binary(b) => b.append_null(),
            Self::DateMillis(b) => b.append_null(),
            Self::TimestampMillis(b) => b.append_null(),
            Self::Decimal { builder, .. } => builder.append_null(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Boolean(b) => b.len(),
            Self::Int8(b) => b.len(),
            Self::Int16(b) => b.len(),
            Self::Int32(b) => b.len(),
            Self::Int64(b) => b.len(),
            Self::Float32(b) => b.len(),
            Self::Float64(b) => b.len(),
            Self::Utf8(b) => b.len(),
            Self::Binary(b) => b.len(),
            Self::DateMillis(b) => b.len(),
            Self::TimestampMillis(b) => b.len(),
            Self::Decimal { builder, .. } => builder.len(),
        }
    }
}

/// Accumulates rows for one schema and emits Arrow record batches
pub struct BlockWriter {
    schema: SchemaRef,
    sinks: Vec<ColumnSink>,
}

impl BlockWriter {
    /// Create a writer for the given schema.
    ///
    /// Fails up front when the schema contains a column type blocks cannot
    /// carry, so readers never discover it mid-stream.
    pub fn new(schema: SchemaRef) -> Result<Self> {
        let sinks = schema
            .fields()
            .iter()
            .map(|f| ColumnSink::for_field(f))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { schema, sinks })
    }

    /// The schema this writer produces
    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.sinks.len()
    }

    /// Rows accumulated since the last [`finish`](Self::finish)
    pub fn row_count(&self) -> usize {
        self.sinks.first().map_or(0, ColumnSink::len)
    }

    /// Whether no rows are accumulated
    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    fn sink_mut(&mut self, col: usize) -> Result<&mut ColumnSink> {
        let count = self.sinks.len();
        self.sinks.get_mut(col).ok_or_else(|| {
            FederationError::internal(format!(
                "column index {col} out of range for {count}-column block"
            ))
        })
    }

    fn type_mismatch(col: usize, wanted: &str, sink: &ColumnSink) -> FederationError {
        FederationError::internal(format!(
            "column {col} holds {} values, cannot append {wanted}",
            sink.kind_name()
        ))
    }

    /// Append a NULL to a column
    pub fn append_null(&mut self, col: usize) -> Result<()> {
        self.sink_mut(col)?.append_null();
        Ok(())
    }

    /// Append a boolean
    pub fn append_bool(&mut self, col: usize, value: bool) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Boolean(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "boolean", other)),
        }
    }

    /// Append an 8-bit integer
    pub fn append_i8(&mut self, col: usize, value: i8) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Int8(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "int8", other)),
        }
    }

    /// Append a 16-bit integer
    pub fn append_i16(&mut self, col: usize, value: i16) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Int16(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "int16", other)),
        }
    }

    /// Append a 32-bit integer
    pub fn append_i32(&mut self, col: usize, value: i32) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Int32(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "int32", other)),
        }
    }

    /// Append a 64-bit integer
    pub fn append_i64(&mut self, col: usize, value: i64) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Int64(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "int64", other)),
        }
    }

    /// Append a 32-bit float
    pub fn append_f32(&mut self, col: usize, value: f32) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Float32(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "float32", other)),
        }
    }

    /// Append a 64-bit float
    pub fn append_f64(&mut self, col: usize, value: f64) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Float64(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "float64", other)),
        }
    }

    /// Append a string
    pub fn append_str(&mut self, col: usize, value: &str) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Utf8(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "string", other)),
        }
    }

    /// Append raw bytes
    pub fn append_bytes(&mut self, col: usize, value: &[u8]) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Binary(b) => {
                b.append_value(value);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "bytes", other)),
        }
    }

    /// Append a date as epoch milliseconds
    pub fn append_date_millis(&mut self, col: usize, millis: i64) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::DateMillis(b) => {
                b.append_value(millis);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "date", other)),
        }
    }

    /// Append a timestamp as epoch milliseconds
    pub fn append_timestamp_millis(&mut self, col: usize, millis: i64) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::TimestampMillis(b) => {
                b.append_value(millis);
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "timestamp", other)),
        }
    }

    /// Append a decimal, rescaled to the column's declared scale
    pub fn append_decimal(&mut self, col: usize, value: Decimal) -> Result<()> {
        match self.sink_mut(col)? {
            ColumnSink::Decimal { builder, scale } => {
                let mut scaled = value;
                scaled.rescale(*scale as u32);
                builder.append_value(scaled.mantissa());
                Ok(())
            }
            other => Err(Self::type_mismatch(col, "decimal", other)),
        }
    }

    /// Finish the accumulated rows into a batch and reset for more
    pub fn finish(&mut self) -> Result<RecordBatch> {
        let arrays = self
            .sinks
            .iter_mut()
            .map(|s| s.as_builder().finish())
            .collect::<Vec<_>>();
        RecordBatch::try_new(self.schema.clone(), arrays)
            .map_err(|e| FederationError::internal(format!("block assembly failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{Array, Decimal128Array, Int64Array, StringArray};
    use arrow_schema::Schema;
    use std::sync::Arc;

    fn test_schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("name", DataType::Utf8, true),
            Field::new("amount", DataType::Int64, true),
            Field::new("price", DataType::Decimal128(10, 2), true),
        ]))
    }

    #[test]
    fn test_write_rows_and_finish() {
        let mut writer = BlockWriter::new(test_schema()).unwrap();

        writer.append_str(0, "alice").unwrap();
        writer.append_i64(1, 7).unwrap();
        writer
            .append_decimal(2, Decimal::new(12345, 2)) // 123.45
            .unwrap();

        writer.append_null(0).unwrap();
        writer.append_null(1).unwrap();
        writer.append_null(2).unwrap();

        assert_eq!(writer.row_count(), 2);
        let batch = writer.finish().unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(writer.row_count(), 0);

        let names = batch
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(names.value(0), "alice");
        assert!(names.is_null(1));

        let amounts = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int64Array>()
            .unwrap();
        assert_eq!(amounts.value(0), 7);

        let prices = batch
            .column(2)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(prices.value(0), 12345);
    }

    #[test]
    fn test_decimal_rescaled_to_column_scale() {
        let mut writer = BlockWriter::new(test_schema()).unwrap();
        // 1.5 at scale 1 becomes mantissa 150 at scale 2
        writer.append_decimal(2, Decimal::new(15, 1)).unwrap();
        writer.append_null(0).unwrap();
        writer.append_null(1).unwrap();

        let batch = writer.finish().unwrap();
        let prices = batch
            .column(2)
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .unwrap();
        assert_eq!(prices.value(0), 150);
    }

    #[test]
    fn test_type_mismatch_is_an_error() {
        let mut writer = BlockWriter::new(test_schema()).unwrap();
        assert!(writer.append_i64(0, 1).is_err());
        assert!(writer.append_str(1, "nope").is_err());
        assert!(writer.append_bool(9, true).is_err());
    }

    #[test]
    fn test_unsupported_column_type_rejected_up_front() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "d",
            DataType::Duration(TimeUnit::Second),
            true,
        )]));
        assert!(BlockWriter::new(schema).is_err());
    }

    #[test]
    fn test_timestamp_with_timezone() {
        let schema = Arc::new(Schema::new(vec![Field::new(
            "ts",
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            true,
        )]));
        let mut writer = BlockWriter::new(schema).unwrap();
        writer.append_timestamp_millis(0, 1_700_000_000_000).unwrap();
        let batch = writer.finish().unwrap();
        assert_eq!(batch.num_rows(), 1);
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink = VecSink::new();
        let mut writer = BlockWriter::new(test_schema()).unwrap();
        writer.append_str(0, "a").unwrap();
        writer.append_i64(1, 1).unwrap();
        writer.append_null(2).unwrap();
        let batch = writer.finish().unwrap();
        sink.write(batch).unwrap();
        assert_eq!(sink.row_count(), 1);
    }
}
