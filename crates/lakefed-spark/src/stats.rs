//! Connector statistics.
//!
//! One atomic counter set is shared by every handler working a request;
//! nothing here is global. Callers emit `metrics` macros at the same event
//! sites, so the counters stay cheap to read in tests and health probes.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time connector statistics
#[derive(Debug, Clone, Default)]
pub struct ConnectorStats {
    /// Connections opened successfully
    pub connections_opened: u64,
    /// Connection attempts that failed
    pub connections_failed: u64,
    /// Retried attempts across all operations
    pub retries: u64,
    /// Tables returned across all listing pages
    pub tables_listed: u64,
    /// Partitions discovered, wildcard partitions included
    pub partitions_discovered: u64,
    /// Splits handed to the host
    pub splits_emitted: u64,
    /// Splits read to completion
    pub splits_read: u64,
    /// Rows delivered to the host
    pub rows_read: u64,
    /// Cells dropped after an extraction failure
    pub cells_failed: u64,
    /// Average rows per completed split
    pub avg_rows_per_split: f64,
}

/// Atomic connector statistics shared across request handlers
#[derive(Debug, Default)]
#[allow(missing_docs)]
pub struct AtomicConnectorStats {
    pub connections_opened: AtomicU64,
    pub connections_failed: AtomicU64,
    pub retries: AtomicU64,
    pub tables_listed: AtomicU64,
    pub partitions_discovered: AtomicU64,
    pub splits_emitted: AtomicU64,
    pub splits_read: AtomicU64,
    pub rows_read: AtomicU64,
    pub cells_failed: AtomicU64,
}

impl AtomicConnectorStats {
    /// Record the outcome of one connection attempt
    pub fn record_connection(&self, success: bool) {
        if success {
            self.connections_opened.fetch_add(1, Ordering::Relaxed);
        } else {
            self.connections_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one retried attempt
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one page of a table listing
    pub fn record_table_page(&self, tables: u64) {
        self.tables_listed.fetch_add(tables, Ordering::Relaxed);
    }

    /// Record a partition discovery round
    pub fn record_partitions(&self, partitions: u64) {
        self.partitions_discovered
            .fetch_add(partitions, Ordering::Relaxed);
    }

    /// Record splits handed to the host
    pub fn record_splits(&self, splits: u64) {
        self.splits_emitted.fetch_add(splits, Ordering::Relaxed);
    }

    /// Record a completed split read
    pub fn record_split_read(&self, rows: u64) {
        self.splits_read.fetch_add(1, Ordering::Relaxed);
        self.rows_read.fetch_add(rows, Ordering::Relaxed);
    }

    /// Record one dropped cell
    pub fn record_cell_failure(&self) {
        self.cells_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot
    pub fn snapshot(&self) -> ConnectorStats {
        let splits_read = self.splits_read.load(Ordering::Relaxed);
        let rows_read = self.rows_read.load(Ordering::Relaxed);
        let avg = if splits_read > 0 {
            rows_read as f64 / splits_read as f64
        } else {
            0.0
        };

        ConnectorStats {
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            tables_listed: self.tables_listed.load(Ordering::Relaxed),
            partitions_discovered: self.partitions_discovered.load(Ordering::Relaxed),
            splits_emitted: self.splits_emitted.load(Ordering::Relaxed),
            splits_read,
            rows_read,
            cells_failed: self.cells_failed.load(Ordering::Relaxed),
            avg_rows_per_split: avg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_recorded_events() {
        let stats = AtomicConnectorStats::default();
        stats.record_connection(true);
        stats.record_connection(false);
        stats.record_retry();
        stats.record_table_page(5);
        stats.record_partitions(3);
        stats.record_splits(3);
        stats.record_split_read(100);
        stats.record_split_read(50);
        stats.record_cell_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.connections_opened, 1);
        assert_eq!(snapshot.connections_failed, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.tables_listed, 5);
        assert_eq!(snapshot.partitions_discovered, 3);
        assert_eq!(snapshot.splits_emitted, 3);
        assert_eq!(snapshot.splits_read, 2);
        assert_eq!(snapshot.rows_read, 150);
        assert_eq!(snapshot.cells_failed, 1);
        assert!((snapshot.avg_rows_per_split - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_is_zero_before_any_split() {
        let snapshot = AtomicConnectorStats::default().snapshot();
        assert_eq!(snapshot.avg_rows_per_split, 0.0);
    }
}
