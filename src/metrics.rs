//! Metrics instrumentation for the ingestion daemon.
//!
//! Counters only; the Prometheus exporter is wired (optionally) in `main`.

use metrics::counter;

/// Metric names as constants for consistency.
pub mod names {
    pub const BLOCKS_SCANNED: &str = "tron_blocks_scanned_total";
    pub const HEAD_BLOCKS_PUBLISHED: &str = "tron_head_blocks_published_total";
    pub const TRANSACTIONS_PUBLISHED: &str = "tron_transactions_published_total";
    pub const TASKS_ENQUEUED: &str = "tron_tasks_enqueued_total";
    pub const TASKS_RETRIED: &str = "tron_tasks_retried_total";
    pub const TASKS_DEAD: &str = "tron_tasks_dead_total";
    pub const BLOCKS_PROCESSED: &str = "tron_blocks_processed_total";
    pub const PROCESSED_ENTRIES_SWEPT: &str = "tron_processed_entries_swept_total";
}

pub fn record_block_scanned() {
    counter!(names::BLOCKS_SCANNED).increment(1);
}

// Transactions themselves are counted by the publisher on append.
pub fn record_head_published() {
    counter!(names::HEAD_BLOCKS_PUBLISHED).increment(1);
}

pub fn record_transactions_published(count: usize) {
    counter!(names::TRANSACTIONS_PUBLISHED).increment(count as u64);
}

pub fn record_tasks_enqueued(queue: &'static str, count: usize) {
    counter!(names::TASKS_ENQUEUED, "queue" => queue).increment(count as u64);
}

pub fn record_task_retried(queue: &'static str) {
    counter!(names::TASKS_RETRIED, "queue" => queue).increment(1);
}

pub fn record_task_dead(queue: &'static str) {
    counter!(names::TASKS_DEAD, "queue" => queue).increment(1);
}

pub fn record_block_processed() {
    counter!(names::BLOCKS_PROCESSED).increment(1);
}

pub fn record_entries_swept(count: usize) {
    counter!(names::PROCESSED_ENTRIES_SWEPT).increment(count as u64);
}
