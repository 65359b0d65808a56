//! Subscriber SDK scenarios, driven through an in-memory group stream.
//!
//! The fake models the consumer-group contract the run loop relies on:
//! reading `>` delivers never-delivered entries and moves them onto the
//! consumer's pending list; reading an explicit id yields pending entries
//! after that id; ACK retires a pending entry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tron_events::error::{Error, Result};
use tron_events::subscriber::{
    Event, GroupStream, HandlerError, HandlerErrorPolicy, StateStore, Subscriber, SubscriberConfig,
};

fn entry(id: &str) -> Event {
    Event {
        id: id.to_string(),
        fields: HashMap::from([("payload".to_string(), format!("{{\"tx\":\"{id}\"}}"))]),
    }
}

/// Orders stream ids like the fabric does (`ms-seq`).
fn id_value(id: &str) -> (u64, u64) {
    let (ms, seq) = id.split_once('-').unwrap_or((id, "0"));
    (ms.parse().unwrap_or(0), seq.parse().unwrap_or(0))
}

#[derive(Default)]
struct StreamState {
    /// Delivered to this consumer but not yet acknowledged.
    pending: Vec<Event>,
    /// Never delivered to anyone in the group.
    undelivered: Vec<Event>,
    acked: Vec<String>,
    group_created: bool,
}

#[derive(Clone, Default)]
struct FakeGroupStream {
    state: Arc<Mutex<StreamState>>,
}

impl FakeGroupStream {
    fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry already delivered in a previous run (in the
    /// pending list, unacknowledged).
    fn seed_pending(&self, id: &str) {
        self.state.lock().unwrap().pending.push(entry(id));
    }

    /// Seeds an entry the group has never seen.
    fn seed_undelivered(&self, id: &str) {
        self.state.lock().unwrap().undelivered.push(entry(id));
    }

    fn acked(&self) -> Vec<String> {
        self.state.lock().unwrap().acked.clone()
    }

    fn group_created(&self) -> bool {
        self.state.lock().unwrap().group_created
    }
}

#[async_trait]
impl GroupStream for FakeGroupStream {
    async fn create_group(&mut self) -> Result<()> {
        self.state.lock().unwrap().group_created = true;
        Ok(())
    }

    async fn read(&mut self, read_id: &str, count: usize) -> Result<Vec<Event>> {
        // A real group read blocks; yield so the loop stays cooperative.
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        if read_id == ">" {
            let take = state.undelivered.len().min(count);
            let batch: Vec<Event> = state.undelivered.drain(..take).collect();
            state.pending.extend(batch.iter().cloned());
            Ok(batch)
        } else {
            let after = id_value(read_id);
            Ok(state
                .pending
                .iter()
                .filter(|event| id_value(&event.id) > after)
                .take(count)
                .cloned()
                .collect())
        }
    }

    async fn ack(&mut self, entry_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.pending.retain(|event| event.id != entry_id);
        state.acked.push(entry_id.to_string());
        Ok(())
    }
}

/// Checkpoint store recording every save.
#[derive(Default)]
struct MemoryStateStore {
    checkpoint: Mutex<Option<String>>,
    saves: Mutex<Vec<String>>,
}

impl MemoryStateStore {
    fn new() -> Self {
        Self::default()
    }

    fn with_checkpoint(id: &str) -> Self {
        let store = Self::default();
        *store.checkpoint.lock().unwrap() = Some(id.to_string());
        store
    }

    fn current(&self) -> Option<String> {
        self.checkpoint.lock().unwrap().clone()
    }

    fn saves(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save_last_processed_id(
        &self,
        _group: &str,
        _consumer: &str,
        last_id: &str,
    ) -> Result<()> {
        *self.checkpoint.lock().unwrap() = Some(last_id.to_string());
        self.saves.lock().unwrap().push(last_id.to_string());
        Ok(())
    }

    async fn get_last_processed_id(&self, _group: &str, _consumer: &str) -> Result<Option<String>> {
        Ok(self.current())
    }
}

struct Harness {
    stream: FakeGroupStream,
    store: Arc<MemoryStateStore>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn new(store: MemoryStateStore) -> Self {
        Self {
            stream: FakeGroupStream::new(),
            store: Arc::new(store),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    /// Spawns `run()` with a handler that records every delivered id and
    /// fails once on `fail_once_on`. Returns the cancellation token and
    /// the join handle.
    fn spawn(
        &self,
        policy: HandlerErrorPolicy,
        fail_once_on: Option<&str>,
    ) -> (CancellationToken, tokio::task::JoinHandle<Result<()>>) {
        let config = SubscriberConfig::new("redis://unused", "grp", "consumer-1")
            .state_store(self.store.clone())
            .on_handler_error(policy);
        let mut subscriber = Subscriber::with_stream(config, self.stream.clone());

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let seen = self.seen.clone();
        let fail_once_on = fail_once_on.map(str::to_string);
        let failed = Arc::new(Mutex::new(false));

        let handle = tokio::spawn(async move {
            subscriber
                .run(run_cancel, move |event| {
                    let seen = seen.clone();
                    let fail_once_on = fail_once_on.clone();
                    let failed = failed.clone();
                    async move {
                        seen.lock().unwrap().push(event.id.clone());
                        if fail_once_on.as_deref() == Some(event.id.as_str()) {
                            let mut failed = failed.lock().unwrap();
                            if !*failed {
                                *failed = true;
                                return Err("handler failure".into());
                            }
                        }
                        Ok::<(), HandlerError>(())
                    }
                })
                .await
        });
        (cancel, handle)
    }

    /// Polls until the handler has seen `count` deliveries.
    async fn wait_for_deliveries(&self, count: usize) {
        let seen = self.seen.clone();
        tokio::time::timeout(Duration::from_secs(5), async move {
            while seen.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("handler never saw the expected deliveries");
    }
}

#[tokio::test]
async fn drains_pending_then_switches_to_live() {
    let harness = Harness::new(MemoryStateStore::new());
    harness.stream.seed_pending("1-0");
    harness.stream.seed_pending("2-0");
    harness.stream.seed_undelivered("4-0");

    let (cancel, run) = harness.spawn(HandlerErrorPolicy::AckAndLog, None);
    harness.wait_for_deliveries(3).await;
    cancel.cancel();
    let result = run.await.unwrap();
    assert!(matches!(result, Err(Error::Shutdown)));

    assert!(harness.stream.group_created());
    // Catch-up drains the pending list in order, then the live phase
    // delivers the new entry.
    assert_eq!(harness.seen(), vec!["1-0", "2-0", "4-0"]);
    assert_eq!(harness.stream.acked(), vec!["1-0", "2-0", "4-0"]);
    // The checkpoint advanced per entry, in both phases.
    assert_eq!(harness.store.saves(), vec!["1-0", "2-0", "4-0"]);
    assert_eq!(harness.store.current().as_deref(), Some("4-0"));
}

#[tokio::test]
async fn resumes_from_checkpoint_and_redelivers_unacked_entry() {
    // A previous run handled 1-0 and 2-0, checkpointed 2-0, then crashed
    // after handling 3-0 but before acknowledging it.
    let harness = Harness::new(MemoryStateStore::with_checkpoint("2-0"));
    harness.stream.seed_pending("3-0");

    let (cancel, run) = harness.spawn(HandlerErrorPolicy::AckAndLog, None);
    harness.wait_for_deliveries(1).await;
    // Give the loop room to (incorrectly) deliver anything earlier.
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    run.await.unwrap().unwrap_err();

    // Exactly the unacknowledged entry is redelivered, nothing earlier.
    assert_eq!(harness.seen(), vec!["3-0"]);
    assert_eq!(harness.stream.acked(), vec!["3-0"]);
    assert_eq!(harness.store.current().as_deref(), Some("3-0"));
}

#[tokio::test]
async fn nack_and_retry_redrains_the_failed_entry() {
    let harness = Harness::new(MemoryStateStore::new());
    harness.stream.seed_pending("1-0");
    harness.stream.seed_pending("2-0");

    let (cancel, run) = harness.spawn(HandlerErrorPolicy::NackAndRetry, Some("2-0"));
    harness.wait_for_deliveries(3).await;
    cancel.cancel();
    run.await.unwrap().unwrap_err();

    // 2-0 fails once, stays pending, and is redelivered by the re-drain
    // from the head of the pending list.
    assert_eq!(harness.seen(), vec!["1-0", "2-0", "2-0"]);
    assert_eq!(harness.stream.acked(), vec!["1-0", "2-0"]);
    // No checkpoint advance for the failed delivery.
    assert_eq!(harness.store.saves(), vec!["1-0", "2-0"]);
    assert_eq!(harness.store.current().as_deref(), Some("2-0"));
}

#[tokio::test]
async fn ack_and_log_acknowledges_failed_entries() {
    let harness = Harness::new(MemoryStateStore::new());
    harness.stream.seed_pending("1-0");
    harness.stream.seed_pending("2-0");

    let (cancel, run) = harness.spawn(HandlerErrorPolicy::AckAndLog, Some("1-0"));
    harness.wait_for_deliveries(2).await;
    cancel.cancel();
    run.await.unwrap().unwrap_err();

    // The failed entry is delivered once, still ACKed, and the
    // checkpoint moves past it.
    assert_eq!(harness.seen(), vec!["1-0", "2-0"]);
    assert_eq!(harness.stream.acked(), vec!["1-0", "2-0"]);
    assert_eq!(harness.store.current().as_deref(), Some("2-0"));
}
