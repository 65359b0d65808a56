//! Block worker scenarios: idempotence and failure semantics.

mod common;

use std::sync::Arc;

use tron_events::error::Error;
use tron_events::queue::{Task, TaskHandler};
use tron_events::worker::BlockProcessor;

use common::{FakeChain, MemoryCursor, RecordingSink, transaction};

struct Harness {
    chain: Arc<FakeChain>,
    sink: Arc<RecordingSink>,
    cursor: Arc<MemoryCursor>,
    processor: BlockProcessor,
}

fn harness() -> Harness {
    let chain = Arc::new(FakeChain::new());
    let sink = Arc::new(RecordingSink::new());
    let cursor = Arc::new(MemoryCursor::new());
    let processor = BlockProcessor::new(chain.clone(), sink.clone(), cursor.clone());

    Harness {
        chain,
        sink,
        cursor,
        processor,
    }
}

#[tokio::test]
async fn processes_a_block_once() {
    let harness = harness();
    harness
        .chain
        .insert_block(200, vec![transaction("tx_a", 200), transaction("tx_b", 200)]);

    harness
        .processor
        .handle(&Task::block_process(200))
        .await
        .unwrap();

    assert_eq!(harness.sink.published_ids(), vec!["tx_a", "tx_b"]);
    assert_eq!(harness.cursor.processed_blocks(), vec![200]);
}

#[tokio::test]
async fn concurrent_duplicates_publish_at_least_once() {
    let harness = harness();
    harness
        .chain
        .insert_block(200, vec![transaction("tx_a", 200), transaction("tx_b", 200)]);

    let task = Task::block_process(200);
    let (first, second) = tokio::join!(
        harness.processor.handle(&task),
        harness.processor.handle(&task),
    );
    first.unwrap();
    second.unwrap();

    // At-least-once: both racers may publish, neither may crash, and the
    // block must end up marked processed.
    let published = harness.sink.published_ids();
    assert!(!published.is_empty());
    assert_eq!(published.len() % 2, 0);
    assert!(published.contains(&"tx_a".to_string()));
    assert_eq!(harness.cursor.processed_blocks(), vec![200]);
}

#[tokio::test]
async fn already_processed_block_is_skipped() {
    let harness = harness();
    harness.chain.insert_block(200, vec![transaction("tx_a", 200)]);
    harness.cursor.mark_processed_at(200, 1_700_000_000);

    harness
        .processor
        .handle(&Task::block_process(200))
        .await
        .unwrap();

    assert!(harness.sink.published().is_empty());
}

#[tokio::test]
async fn missing_block_fails_transiently() {
    let harness = harness();

    let err = harness
        .processor
        .handle(&Task::block_process(404))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BlockNotFound(404)));
    assert!(!err.is_permanent());
    assert!(harness.cursor.processed_blocks().is_empty());
}

#[tokio::test]
async fn malformed_payload_fails_permanently() {
    let harness = harness();
    let task = Task {
        task_type: "block:process".to_string(),
        payload: serde_json::json!({ "height": 200 }),
        retried: 0,
        max_retry: 5,
    };

    let err = harness.processor.handle(&task).await.unwrap_err();
    assert!(err.is_permanent());
    assert!(harness.sink.published().is_empty());
}

#[tokio::test]
async fn retention_cleanup_evicts_only_expired_markers() {
    use std::time::Duration;
    use tron_events::cursor::ProcessedBlocks;

    let cursor = MemoryCursor::new();
    let eight_days_ago = chrono::Utc::now().timestamp() - 8 * 24 * 60 * 60;
    cursor.mark_processed_at(100, eight_days_ago);
    cursor.mark_processed(200).await.unwrap();

    let removed = cursor
        .cleanup_old_entries(Duration::from_secs(7 * 24 * 60 * 60))
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert_eq!(cursor.processed_blocks(), vec![200]);
}
