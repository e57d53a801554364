//! Metadata discovery and split planning.
//!
//! [`MetadataCoordinator`] answers the host's catalog questions: what can
//! be pushed down, which schemas and tables exist, how a table is
//! partitioned, and which work units cover a scan. Partition discovery degrades instead of
//! failing: zero partition rows, or a discovery query failure that is not
//! an authentication problem, produce a single wildcard partition so the
//! table still scans as one unit.
//!
//! [`SplitPlanner`] is the per-scan state machine behind split emission.
//! It moves strictly forward: `NoPartitions` until discovery runs,
//! `PartitionsDiscovered` once descriptors are loaded, `SplitsEmitted`
//! while batches leave under the cap, and `SplitsExhausted` at the end.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use lakefed_federation::model::{Constraints, TableReference};
use lakefed_federation::{
    ContinuationToken, DataSourceCapabilities, ErrorKind, FederationError, FilterPushdownSubtype,
    QueryStatus, RequestContext, Result, SpillLocation, Split,
};
use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::SparkConnectorConfig;
use crate::connection::WarehouseConnection;
use crate::dialect::Dialect;
use crate::expr::SUPPORTED_FUNCTIONS;
use crate::stats::AtomicConnectorStats;
use crate::types::Value;
use crate::{ALL_PARTITIONS, MAX_SPLITS_PER_BATCH, PARTITION_COLUMN};

/// Parameterized partition discovery over the warehouse catalog.
pub const GET_PARTITIONS_SQL: &str = "SELECT DISTINCT partition_id as partition_name \
     FROM system.information_schema.table_partitions \
     WHERE table_catalog = ? AND table_schema = ? AND table_name = ?";

/// Paged table listing over the warehouse catalog.
pub const LIST_TABLES_PAGED_SQL: &str = "SELECT table_name as TABLE_NAME, table_schema as TABLE_SCHEM \
     FROM system.information_schema.tables \
     WHERE table_schema = ? \
     ORDER BY table_name \
     LIMIT ? OFFSET ?";

/// Unpaged table listing over the warehouse catalog.
pub const LIST_TABLES_SQL: &str = "SELECT table_name as TABLE_NAME, table_schema as TABLE_SCHEM \
     FROM system.information_schema.tables \
     WHERE table_schema = ? \
     ORDER BY table_name";

/// Schema listing over the warehouse catalog.
pub const LIST_SCHEMAS_SQL: &str = "SELECT schema_name as TABLE_SCHEM \
     FROM system.information_schema.schemata \
     ORDER BY schema_name";

/// One page of a table listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableListPage {
    /// Tables on this page
    pub tables: Vec<TableReference>,
    /// Offset token for the next page, absent at the end of the list
    pub next_token: Option<String>,
}

/// One batch of splits for a scan.
#[derive(Debug)]
pub struct SplitBatch {
    /// Emitted splits
    pub splits: Vec<Split>,
    /// Resume token, present only when the cap stopped emission early
    pub continuation: Option<String>,
}

impl SplitBatch {
    /// True when every split of the scan has been handed out.
    pub fn is_complete(&self) -> bool {
        self.continuation.is_none()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Split planner state machine
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of one table scan's split planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    /// Discovery has not run
    NoPartitions,
    /// Partition descriptors are loaded
    PartitionsDiscovered,
    /// A capped batch left; more splits remain
    SplitsEmitted,
    /// Every split has been handed out
    SplitsExhausted,
}

/// Turns partition descriptors into capped split batches.
#[derive(Debug)]
pub struct SplitPlanner {
    state: PlannerState,
    partitions: Vec<String>,
}

impl SplitPlanner {
    /// Planner with no partitions discovered yet.
    pub fn new() -> Self {
        Self {
            state: PlannerState::NoPartitions,
            partitions: Vec::new(),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlannerState {
        self.state
    }

    /// Discovered partition descriptors.
    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    /// Load discovered partitions.
    ///
    /// An empty discovery still yields one work unit: the wildcard
    /// partition covering the whole table.
    pub fn discovered(&mut self, partitions: Vec<String>) {
        self.partitions = if partitions.is_empty() {
            vec![ALL_PARTITIONS.to_string()]
        } else {
            partitions
        };
        self.state = PlannerState::PartitionsDiscovered;
    }

    /// Emit the next batch of splits, at most `max_splits` of them.
    ///
    /// A continuation token resumes emission at the encoded partition
    /// index. When the cap stops emission early the returned batch carries
    /// the token for the next index; a complete batch carries none. A host
    /// that abandons the query stops emission at a partition boundary, with
    /// a token for the first unemitted index.
    pub fn emit(
        &mut self,
        status: &QueryStatus,
        continuation: Option<&str>,
        spill: &SpillLocation,
        max_splits: usize,
    ) -> Result<SplitBatch> {
        match self.state {
            PlannerState::NoPartitions => {
                return Err(FederationError::invalid_input(
                    "splits requested before partition discovery",
                ));
            }
            PlannerState::SplitsExhausted => {
                return Ok(SplitBatch {
                    splits: Vec::new(),
                    continuation: None,
                });
            }
            PlannerState::PartitionsDiscovered | PlannerState::SplitsEmitted => {}
        }

        let start = ContinuationToken::parse(continuation)?;
        let mut splits = Vec::new();
        for (index, partition) in self.partitions.iter().enumerate().skip(start) {
            if !status.is_running() {
                debug!(emitted = splits.len(), "query no longer running, stopping split emission");
                self.state = PlannerState::SplitsEmitted;
                return Ok(SplitBatch {
                    splits,
                    continuation: Some(ContinuationToken::next(index)),
                });
            }
            splits.push(
                Split::builder(split_spill(spill, index))
                    .add_property(PARTITION_COLUMN, partition.clone())
                    .build(),
            );
            if splits.len() >= max_splits && index + 1 < self.partitions.len() {
                self.state = PlannerState::SplitsEmitted;
                return Ok(SplitBatch {
                    splits,
                    continuation: Some(ContinuationToken::next(index + 1)),
                });
            }
        }
        self.state = PlannerState::SplitsExhausted;
        Ok(SplitBatch {
            splits,
            continuation: None,
        })
    }
}

impl Default for SplitPlanner {
    fn default() -> Self {
        Self::new()
    }
}

fn split_spill(spill: &SpillLocation, index: usize) -> SpillLocation {
    SpillLocation::new(spill.bucket.clone(), format!("{}/{}", spill.key, index))
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Catalog discovery and split planning for one connector deployment.
pub struct MetadataCoordinator {
    config: SparkConnectorConfig,
    dialect: Arc<dyn Dialect>,
    stats: Arc<AtomicConnectorStats>,
}

impl MetadataCoordinator {
    /// Create a coordinator over the given dialect.
    pub fn new(
        config: SparkConnectorConfig,
        dialect: Arc<dyn Dialect>,
        stats: Arc<AtomicConnectorStats>,
    ) -> Self {
        Self {
            config,
            dialect,
            stats,
        }
    }

    /// Pushdowns this connector honors.
    ///
    /// The advertised function vocabulary is exactly what the expression
    /// translator renders; the limit and top-N flags come from the dialect.
    pub fn capabilities(&self) -> DataSourceCapabilities {
        let dialect = self.dialect.capabilities();
        DataSourceCapabilities {
            filter_pushdown: vec![
                FilterPushdownSubtype::SortedRangeSet,
                FilterPushdownSubtype::NullableComparison,
            ],
            supported_functions: SUPPORTED_FUNCTIONS
                .iter()
                .map(ToString::to_string)
                .collect(),
            limit_pushdown: dialect.supports_limit,
            top_n_pushdown: dialect.supports_top_n,
            query_passthrough: true,
        }
    }

    /// Schema of the partition block: one string column holding the
    /// partition descriptor.
    pub fn partition_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(vec![Field::new(
            PARTITION_COLUMN,
            DataType::Utf8,
            false,
        )]))
    }

    /// List the schemas visible through the connection.
    ///
    /// When the catalog query fails, listing falls back to driver
    /// introspection (`SHOW DATABASES`) instead of failing the call.
    pub async fn list_schemas(
        &self,
        ctx: &RequestContext,
        connection: &dyn WarehouseConnection,
    ) -> Result<Vec<String>> {
        let schemas: Vec<String> = match connection.execute_query(LIST_SCHEMAS_SQL, &[]).await {
            Ok(result) => result
                .rows
                .iter()
                .filter_map(|row| row.get_by_name("TABLE_SCHEM").and_then(Value::as_str))
                .map(ToString::to_string)
                .collect(),
            Err(err) => {
                warn!(
                    query_id = %ctx.query_id,
                    error = %err,
                    "catalog schema listing failed, falling back to driver introspection"
                );
                let result = connection.execute_query("SHOW DATABASES", &[]).await?;
                // Column naming differs across engine versions; take the
                // first cell of each row.
                result
                    .rows
                    .iter()
                    .filter_map(|row| row.get(0).and_then(Value::as_str))
                    .map(ToString::to_string)
                    .collect()
            }
        };
        debug!(query_id = %ctx.query_id, count = schemas.len(), "listed schemas");
        counter!("spark.schemas.listed").increment(schemas.len() as u64);
        Ok(schemas)
    }

    /// List tables in a schema, one page at a time.
    ///
    /// The token is the opaque offset of the page; absent means the start.
    /// When the catalog query fails, listing falls back to driver
    /// introspection (`SHOW TABLES`) instead of failing the call.
    pub async fn list_tables(
        &self,
        ctx: &RequestContext,
        connection: &dyn WarehouseConnection,
        schema_name: &str,
        token: Option<&str>,
        page_size: Option<usize>,
    ) -> Result<TableListPage> {
        let offset = ContinuationToken::parse(token)?;
        let page = match page_size {
            Some(size) => {
                self.list_tables_paged(ctx, connection, schema_name, offset, size)
                    .await?
            }
            None => TableListPage {
                tables: self.list_all_tables(ctx, connection, schema_name).await?,
                next_token: None,
            },
        };
        self.stats.record_table_page(page.tables.len() as u64);
        counter!("spark.tables.listed").increment(page.tables.len() as u64);
        Ok(page)
    }

    async fn list_tables_paged(
        &self,
        ctx: &RequestContext,
        connection: &dyn WarehouseConnection,
        schema_name: &str,
        offset: usize,
        size: usize,
    ) -> Result<TableListPage> {
        let params = [
            Value::String(schema_name.to_string()),
            Value::Int64(size as i64),
            Value::Int64(offset as i64),
        ];
        let tables = match connection.execute_query(LIST_TABLES_PAGED_SQL, &params).await {
            Ok(result) => tables_from_catalog_rows(&result.rows, schema_name),
            Err(err) => {
                warn!(
                    query_id = %ctx.query_id,
                    schema = schema_name,
                    error = %err,
                    "catalog table listing failed, falling back to driver introspection"
                );
                self.show_tables(connection, schema_name)
                    .await?
                    .into_iter()
                    .skip(offset)
                    .take(size)
                    .collect()
            }
        };
        debug!(
            query_id = %ctx.query_id,
            schema = schema_name,
            offset,
            count = tables.len(),
            "listed table page"
        );
        let next_token = if tables.is_empty() || tables.len() < size {
            None
        } else {
            Some(ContinuationToken::next(offset + size))
        };
        Ok(TableListPage { tables, next_token })
    }

    async fn list_all_tables(
        &self,
        ctx: &RequestContext,
        connection: &dyn WarehouseConnection,
        schema_name: &str,
    ) -> Result<Vec<TableReference>> {
        let params = [Value::String(schema_name.to_string())];
        match connection.execute_query(LIST_TABLES_SQL, &params).await {
            Ok(result) => Ok(tables_from_catalog_rows(&result.rows, schema_name)),
            Err(err) => {
                warn!(
                    query_id = %ctx.query_id,
                    schema = schema_name,
                    error = %err,
                    "catalog table listing failed, falling back to driver introspection"
                );
                self.show_tables(connection, schema_name).await
            }
        }
    }

    async fn show_tables(
        &self,
        connection: &dyn WarehouseConnection,
        schema_name: &str,
    ) -> Result<Vec<TableReference>> {
        let sql = format!("SHOW TABLES IN {}", self.dialect.quote_identifier(schema_name));
        let result = connection.execute_query(&sql, &[]).await?;
        Ok(result
            .rows
            .iter()
            .filter_map(|row| {
                row.get_by_name("tableName").and_then(Value::as_str).map(|table| {
                    let schema = row
                        .get_by_name("database")
                        .and_then(Value::as_str)
                        .unwrap_or(schema_name);
                    TableReference::new(schema, table)
                })
            })
            .collect())
    }

    /// Discover the partitions of a table.
    ///
    /// Zero rows, and any discovery failure other than bad credentials,
    /// yield the single wildcard partition.
    pub async fn get_partitions(
        &self,
        ctx: &RequestContext,
        connection: &dyn WarehouseConnection,
        table: &TableReference,
    ) -> Result<Vec<String>> {
        if !ctx.status.is_running() {
            info!(query_id = %ctx.query_id, "query no longer running, skipping partition discovery");
            return Ok(Vec::new());
        }
        let catalog = self.effective_catalog(ctx, table);
        let params = [
            Value::String(catalog),
            Value::String(table.schema.clone()),
            Value::String(table.table.clone()),
        ];
        let discovered = match connection.execute_query(GET_PARTITIONS_SQL, &params).await {
            Ok(result) => Some(
                result
                    .rows
                    .iter()
                    .filter_map(|row| row.get_by_name(PARTITION_COLUMN).and_then(Value::as_str))
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            ),
            Err(err) if err.kind() == ErrorKind::InvalidCredentials => return Err(err),
            Err(err) => {
                warn!(
                    query_id = %ctx.query_id,
                    table = %table,
                    error = %err,
                    "partition discovery failed, scanning as one partition"
                );
                None
            }
        };

        let partitions = match discovered {
            Some(partitions) if !partitions.is_empty() => partitions,
            Some(_) => {
                info!(
                    query_id = %ctx.query_id,
                    table = %table,
                    "no partitions found, scanning as one partition"
                );
                vec![ALL_PARTITIONS.to_string()]
            }
            None => vec![ALL_PARTITIONS.to_string()],
        };

        self.stats.record_partitions(partitions.len() as u64);
        counter!("spark.partitions.discovered").increment(partitions.len() as u64);
        debug!(
            query_id = %ctx.query_id,
            table = %table,
            count = partitions.len(),
            "partition discovery complete"
        );
        Ok(partitions)
    }

    /// Plan the splits of a scan, resuming from a continuation token.
    ///
    /// A pass-through request yields exactly one split with no partition
    /// coordinate, since the statement text already scopes the work.
    pub fn get_splits(
        &self,
        ctx: &RequestContext,
        constraints: &Constraints,
        partitions: &[String],
        continuation: Option<&str>,
        spill: &SpillLocation,
    ) -> Result<SplitBatch> {
        if constraints.query_passthrough.is_some() {
            info!(query_id = %ctx.query_id, "pass-through split requested");
            let batch = SplitBatch {
                splits: vec![Split::builder(split_spill(spill, 0)).build()],
                continuation: None,
            };
            self.stats.record_splits(1);
            counter!("spark.splits.emitted").increment(1);
            return Ok(batch);
        }

        let mut planner = SplitPlanner::new();
        planner.discovered(partitions.to_vec());
        let batch = planner.emit(&ctx.status, continuation, spill, MAX_SPLITS_PER_BATCH)?;
        self.stats.record_splits(batch.splits.len() as u64);
        counter!("spark.splits.emitted").increment(batch.splits.len() as u64);
        info!(
            query_id = %ctx.query_id,
            splits = batch.splits.len(),
            complete = batch.is_complete(),
            "splits generated"
        );
        Ok(batch)
    }

    fn effective_catalog(&self, ctx: &RequestContext, table: &TableReference) -> String {
        if let Some(catalog) = &table.catalog {
            if !catalog.is_empty() {
                return catalog.clone();
            }
        }
        self.config
            .remote_catalog(&ctx.catalog)
            .unwrap_or(&ctx.catalog)
            .to_string()
    }
}

fn tables_from_catalog_rows(
    rows: &[crate::types::Row],
    default_schema: &str,
) -> Vec<TableReference> {
    rows.iter()
        .filter_map(|row| {
            row.get_by_name("TABLE_NAME").and_then(Value::as_str).map(|table| {
                let schema = row
                    .get_by_name("TABLE_SCHEM")
                    .and_then(Value::as_str)
                    .unwrap_or(default_schema);
                TableReference::new(schema, table)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SparkDialect;
    use crate::types::{QueryResult, Row};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    fn spill() -> SpillLocation {
        SpillLocation::new("bucket", "results/q1")
    }

    fn coordinator() -> MetadataCoordinator {
        MetadataCoordinator::new(
            SparkConnectorConfig::default(),
            Arc::new(SparkDialect),
            Arc::new(AtomicConnectorStats::default()),
        )
    }

    struct StubConnection {
        results: Mutex<VecDeque<Result<QueryResult>>>,
        statements: Mutex<Vec<String>>,
    }

    impl StubConnection {
        fn new(results: Vec<Result<QueryResult>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                statements: Mutex::new(Vec::new()),
            }
        }

        fn statements(&self) -> Vec<String> {
            self.statements.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WarehouseConnection for StubConnection {
        async fn execute_query(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
            self.statements.lock().unwrap().push(sql.to_string());
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(QueryResult::empty()))
        }

        async fn is_valid(&self, _timeout: Duration) -> Result<bool> {
            Ok(true)
        }
    }

    fn table_result(names: &[&str]) -> QueryResult {
        QueryResult {
            columns: Vec::new(),
            rows: names
                .iter()
                .map(|name| {
                    Row::new(
                        vec!["TABLE_NAME".to_string(), "TABLE_SCHEM".to_string()],
                        vec![
                            Value::String((*name).to_string()),
                            Value::String("sales".to_string()),
                        ],
                    )
                })
                .collect(),
        }
    }

    fn partition_result(names: &[&str]) -> QueryResult {
        QueryResult {
            columns: Vec::new(),
            rows: names
                .iter()
                .map(|name| {
                    Row::new(
                        vec![PARTITION_COLUMN.to_string()],
                        vec![Value::String((*name).to_string())],
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_planner_walks_forward() {
        let status = QueryStatus::running();
        let mut planner = SplitPlanner::new();
        assert_eq!(planner.state(), PlannerState::NoPartitions);

        planner.discovered(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(planner.state(), PlannerState::PartitionsDiscovered);

        let batch = planner.emit(&status, None, &spill(), 10).unwrap();
        assert_eq!(batch.splits.len(), 2);
        assert!(batch.is_complete());
        assert_eq!(planner.state(), PlannerState::SplitsExhausted);

        let rest = planner.emit(&status, None, &spill(), 10).unwrap();
        assert!(rest.splits.is_empty());
        assert!(rest.is_complete());
    }

    #[test]
    fn test_planner_rejects_emission_before_discovery() {
        let mut planner = SplitPlanner::new();
        let err = planner
            .emit(&QueryStatus::running(), None, &spill(), 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_planner_synthesizes_wildcard_for_empty_discovery() {
        let mut planner = SplitPlanner::new();
        planner.discovered(Vec::new());
        let batch = planner
            .emit(&QueryStatus::running(), None, &spill(), 10)
            .unwrap();
        assert_eq!(batch.splits.len(), 1);
        assert_eq!(
            batch.splits[0].property(PARTITION_COLUMN),
            Some(ALL_PARTITIONS)
        );
    }

    #[test]
    fn test_planner_caps_and_resumes() {
        let status = QueryStatus::running();
        let partitions: Vec<String> = (0..4).map(|i| format!("p{}", i)).collect();
        let mut planner = SplitPlanner::new();
        planner.discovered(partitions);

        let first = planner.emit(&status, None, &spill(), 3).unwrap();
        assert_eq!(first.splits.len(), 3);
        assert_eq!(first.continuation.as_deref(), Some("3"));
        assert_eq!(planner.state(), PlannerState::SplitsEmitted);

        let second = planner
            .emit(&status, first.continuation.as_deref(), &spill(), 3)
            .unwrap();
        assert_eq!(second.splits.len(), 1);
        assert!(second.is_complete());
        assert_eq!(second.splits[0].property(PARTITION_COLUMN), Some("p3"));
        assert_eq!(planner.state(), PlannerState::SplitsExhausted);
    }

    #[test]
    fn test_planner_no_token_when_cap_lands_on_last_partition() {
        let mut planner = SplitPlanner::new();
        planner.discovered(vec!["a".to_string(), "b".to_string()]);
        let batch = planner
            .emit(&QueryStatus::running(), None, &spill(), 2)
            .unwrap();
        assert_eq!(batch.splits.len(), 2);
        assert!(batch.is_complete());
    }

    #[test]
    fn test_planner_stops_on_cancellation() {
        let status = QueryStatus::running();
        let mut planner = SplitPlanner::new();
        planner.discovered(vec!["a".to_string(), "b".to_string(), "c".to_string()]);

        status.cancel();
        let batch = planner.emit(&status, None, &spill(), 10).unwrap();
        assert!(batch.splits.is_empty());
        assert_eq!(batch.continuation.as_deref(), Some("0"));
        assert_eq!(planner.state(), PlannerState::SplitsEmitted);
    }

    #[test]
    fn test_planner_rejects_malformed_token() {
        let mut planner = SplitPlanner::new();
        planner.discovered(vec!["a".to_string()]);
        let err = planner
            .emit(&QueryStatus::running(), Some("not-a-number"), &spill(), 10)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_capabilities_advertise_translator_vocabulary() {
        let caps = coordinator().capabilities();
        assert_eq!(caps.filter_pushdown.len(), 2);
        assert_eq!(caps.supported_functions.len(), SUPPORTED_FUNCTIONS.len());
        assert!(caps.limit_pushdown);
        assert!(caps.top_n_pushdown);
        assert!(caps.query_passthrough);
    }

    #[test]
    fn test_partition_schema_single_string_column() {
        let schema = coordinator().partition_schema();
        assert_eq!(schema.fields().len(), 1);
        assert_eq!(schema.field(0).name(), PARTITION_COLUMN);
        assert_eq!(schema.field(0).data_type(), &DataType::Utf8);
    }

    #[tokio::test]
    async fn test_list_tables_pages_through_five_tables() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let connection = StubConnection::new(vec![
            Ok(table_result(&["t1", "t2"])),
            Ok(table_result(&["t3", "t4"])),
            Ok(table_result(&["t5"])),
        ]);

        let page1 = coordinator
            .list_tables(&ctx, &connection, "sales", None, Some(2))
            .await
            .unwrap();
        assert_eq!(page1.tables.len(), 2);
        assert_eq!(page1.next_token.as_deref(), Some("2"));

        let page2 = coordinator
            .list_tables(&ctx, &connection, "sales", page1.next_token.as_deref(), Some(2))
            .await
            .unwrap();
        assert_eq!(page2.tables.len(), 2);
        assert_eq!(page2.next_token.as_deref(), Some("4"));

        let page3 = coordinator
            .list_tables(&ctx, &connection, "sales", page2.next_token.as_deref(), Some(2))
            .await
            .unwrap();
        assert_eq!(page3.tables.len(), 1);
        assert_eq!(page3.next_token, None);
        assert_eq!(
            page3.tables[0],
            TableReference::new("sales", "t5")
        );
    }

    #[tokio::test]
    async fn test_list_tables_falls_back_to_show_tables() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let fallback_rows = QueryResult {
            columns: Vec::new(),
            rows: vec![Row::new(
                vec!["database".to_string(), "tableName".to_string()],
                vec![
                    Value::String("sales".to_string()),
                    Value::String("orders".to_string()),
                ],
            )],
        };
        let connection = StubConnection::new(vec![
            Err(FederationError::internal("catalog unavailable")),
            Ok(fallback_rows),
        ]);

        let page = coordinator
            .list_tables(&ctx, &connection, "sales", None, Some(10))
            .await
            .unwrap();
        assert_eq!(page.tables, vec![TableReference::new("sales", "orders")]);
        assert_eq!(page.next_token, None);
        let statements = connection.statements();
        assert_eq!(statements.len(), 2);
        assert!(statements[1].starts_with("SHOW TABLES IN `sales`"));
    }

    #[tokio::test]
    async fn test_get_partitions_returns_discovered_names() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let connection = StubConnection::new(vec![Ok(partition_result(&[
            "2023-01", "2023-02", "  ", "2023-03",
        ]))]);

        let partitions = coordinator
            .get_partitions(&ctx, &connection, &TableReference::new("sales", "orders"))
            .await
            .unwrap();
        assert_eq!(partitions, vec!["2023-01", "2023-02", "2023-03"]);
    }

    #[tokio::test]
    async fn test_get_partitions_zero_rows_yields_wildcard() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let connection = StubConnection::new(vec![Ok(partition_result(&[]))]);

        let partitions = coordinator
            .get_partitions(&ctx, &connection, &TableReference::new("sales", "orders"))
            .await
            .unwrap();
        assert_eq!(partitions, vec![ALL_PARTITIONS.to_string()]);
    }

    #[tokio::test]
    async fn test_get_partitions_failure_yields_wildcard() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let connection = StubConnection::new(vec![Err(FederationError::throttled(
            "Too many requests",
        ))]);

        let partitions = coordinator
            .get_partitions(&ctx, &connection, &TableReference::new("sales", "orders"))
            .await
            .unwrap();
        assert_eq!(partitions, vec![ALL_PARTITIONS.to_string()]);
    }

    #[tokio::test]
    async fn test_get_partitions_credential_failure_propagates() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let connection = StubConnection::new(vec![Err(
            FederationError::invalid_credentials("Token expired"),
        )]);

        let err = coordinator
            .get_partitions(&ctx, &connection, &TableReference::new("sales", "orders"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[test]
    fn test_get_splits_passthrough_single_bare_split() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let constraints = Constraints::new().with_passthrough(
            lakefed_federation::model::PassthroughQuery::new("SELECT 1"),
        );

        let batch = coordinator
            .get_splits(&ctx, &constraints, &["a".to_string()], None, &spill())
            .unwrap();
        assert_eq!(batch.splits.len(), 1);
        assert!(batch.is_complete());
        assert_eq!(batch.splits[0].property(PARTITION_COLUMN), None);
    }

    #[test]
    fn test_get_splits_emits_one_split_per_partition() {
        let ctx = RequestContext::new("lakehouse");
        let coordinator = coordinator();
        let partitions = vec!["2023-01".to_string(), "2023-02".to_string()];

        let batch = coordinator
            .get_splits(&ctx, &Constraints::new(), &partitions, None, &spill())
            .unwrap();
        assert_eq!(batch.splits.len(), 2);
        assert!(batch.is_complete());
        assert_eq!(
            batch.splits[0].property(PARTITION_COLUMN),
            Some("2023-01")
        );
        assert_eq!(batch.splits[1].spill.key, "results/q1/1");
    }
}
