// Integration tests for the lease lock protocol
// Drives LockManager through MemoryStore and RocksDbStore with a manual clock

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use leasehold_lock::{
    AcquireOptions, Clock, KvStore, LeaseHandle, LockError, LockManager, LockManagerConfig, ManualClock,
    ManualSleeper, MemoryStore, RocksDbStore, StoreError,
};
use leasehold_store::{Condition, Record, WriteOutcome};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use serde_json::json;
use tempfile::TempDir;

const START: i64 = 1_700_000_000;

fn manager(
    store: Arc<dyn KvStore>,
    clock: Arc<ManualClock>,
    sleeper: Arc<ManualSleeper>,
    worker: &str,
) -> LockManager {
    LockManager::builder(store)
        .config(
            LockManagerConfig::default()
                .with_namespace("jobs")
                .with_worker_id(worker),
        )
        .clock(clock)
        .sleeper(sleeper)
        .build()
        .unwrap()
}

struct Cluster {
    store: Arc<dyn KvStore>,
    clock: Arc<ManualClock>,
    sleeper: Arc<ManualSleeper>,
}

impl Cluster {
    fn over(store: Arc<dyn KvStore>) -> Self {
        let clock = Arc::new(ManualClock::new(START));
        let sleeper = Arc::new(ManualSleeper::new(clock.clone()));
        Self {
            store,
            clock,
            sleeper,
        }
    }

    fn in_memory() -> Self {
        Self::over(Arc::new(MemoryStore::new()))
    }

    fn worker(&self, id: &str) -> LockManager {
        manager(
            self.store.clone(),
            self.clock.clone(),
            self.sleeper.clone(),
            id,
        )
    }
}

/// Memory store that counts conditional deletes
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    deletes: AtomicU32,
}

impl CountingStore {
    fn deletes(&self) -> u32 {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KvStore for CountingStore {
    async fn read(&self, key: &str, consistent: bool) -> Result<Option<Record>, StoreError> {
        self.inner.read(key, consistent).await
    }

    async fn conditional_put(
        &self,
        key: &str,
        record: Record,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        self.inner.conditional_put(key, record, condition).await
    }

    async fn conditional_delete(
        &self,
        key: &str,
        condition: Condition,
    ) -> Result<WriteOutcome, StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.conditional_delete(key, condition).await
    }
}

fn counted() -> (Arc<CountingStore>, LockManager) {
    let store = Arc::new(CountingStore::default());
    let cluster = Cluster::over(store.clone());
    let worker = cluster.worker("w");
    (store, worker)
}

async fn takeover_scenario(cluster: &Cluster) {
    let original = cluster.worker("worker-1");
    let other = cluster.worker("worker-2");

    let t1 = original.acquire("job-1", Some(5)).await.unwrap();
    let err = other.acquire("job-1", Some(5)).await.unwrap_err();
    assert!(matches!(err, LockError::Acquisition { .. }));

    cluster.clock.advance(6);
    let t2 = other.acquire("job-1", Some(5)).await.unwrap();
    assert_ne!(t1.token(), t2.token());

    let err = original.extend(&t1, None).await.unwrap_err();
    assert!(matches!(err, LockError::Extend { ref key, .. } if key == "job-1"));

    let before = other.lease_info("job-1").await.unwrap().unwrap();
    assert!(!original.release(&t1).await.unwrap());
    let after = other.lease_info("job-1").await.unwrap().unwrap();

    assert_eq!(before, after);
    assert_eq!(after.token, t2.token());
    assert_eq!(after.owner, "worker-2");
}

#[tokio::test]
async fn test_takeover_scenario_in_memory() {
    takeover_scenario(&Cluster::in_memory()).await;
}

#[tokio::test]
async fn test_takeover_scenario_rocksdb() {
    let tmp_dir = TempDir::new().unwrap();
    let store = Arc::new(RocksDbStore::open(tmp_dir.path()).unwrap());
    takeover_scenario(&Cluster::over(store)).await;
}

#[tokio::test]
async fn test_expired_record_always_superseded_with_fresh_token() {
    let cluster = Cluster::in_memory();
    let owners: Vec<_> = (0..4).map(|i| cluster.worker(&format!("w{i}"))).collect();

    let mut previous_token = owners[0].acquire("job", Some(1)).await.unwrap().token().to_string();
    for owner in owners.iter().cycle().skip(1).take(7) {
        cluster.clock.advance(1);
        let handle = owner.acquire("job", Some(1)).await.unwrap();
        assert_ne!(handle.token(), previous_token);
        previous_token = handle.token().to_string();
    }
}

#[tokio::test]
async fn test_lock_and_value_with_same_key_are_independent() {
    let cluster = Cluster::in_memory();
    let worker = cluster.worker("w");
    let cache = worker.value_cache();

    cache.store("shared", json!("payload"), None).await.unwrap();
    let handle = worker.acquire("shared", Some(30)).await.unwrap();

    assert_eq!(
        cache.fetch("shared", None, false).await.unwrap(),
        Some(json!("payload"))
    );
    assert!(handle.release().await.unwrap());
    assert_eq!(
        cache.fetch("shared", None, false).await.unwrap(),
        Some(json!("payload"))
    );
    assert!(cluster.store.read("jobs/v/shared", true).await.unwrap().is_some());
    assert!(cluster.store.read("jobs/l/shared", true).await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_zero_ttl() {
    let cluster = Cluster::in_memory();
    let cache = cluster.worker("w").value_cache();

    cache.store("k", json!(42), Some(0)).await.unwrap();
    cluster.clock.advance(1);

    assert_eq!(
        cache.fetch("k", Some(json!("default")), false).await.unwrap(),
        Some(json!("default"))
    );
    assert_eq!(cache.fetch("k", None, true).await.unwrap(), Some(json!(42)));
}

#[tokio::test]
async fn test_retry_makes_exactly_max_attempts() {
    let cluster = Cluster::in_memory();
    let holder = cluster.worker("holder");
    let waiter = cluster.worker("waiter");

    holder.acquire("job", Some(3600)).await.unwrap();
    let options = AcquireOptions::default()
        .with_max_attempts(3)
        .with_retry_interval(Duration::from_secs(1));

    let err = waiter.acquire_with_retry("job", &options).await.unwrap_err();
    assert!(err.is_contention());
    assert_eq!(cluster.sleeper.calls(), 2);
}

#[tokio::test]
async fn test_with_lease_releases_after_success() {
    let cluster = Cluster::in_memory();
    let worker = cluster.worker("w");
    let calls = AtomicU32::new(0);

    let result: Result<&str, LockError> = worker
        .with_lease("job", &AcquireOptions::default(), |handle| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                assert!(handle.is_held().await?);
                Ok("done")
            }
        })
        .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!worker.is_locked("job").await.unwrap());
}

#[tokio::test]
async fn test_with_lease_releases_exactly_once_per_exit_path() {
    let (store, worker) = counted();
    let ok: Result<u32, LockError> = worker
        .with_lease("job", &AcquireOptions::default(), |_handle| async { Ok(7) })
        .await;
    assert_eq!(ok.unwrap(), 7);
    assert_eq!(store.deletes(), 1);

    let (store, worker) = counted();
    let failed: Result<(), JobError> = worker
        .with_lease("job", &AcquireOptions::default(), |_handle| async {
            Err(JobError::Failed("boom".to_string()))
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(store.deletes(), 1);

    let (store, worker) = counted();
    let joined = tokio::spawn(async move {
        worker
            .with_lease("job", &AcquireOptions::default(), |_handle| async {
                if true {
                    panic!("body panicked");
                }
                Ok::<(), LockError>(())
            })
            .await
    })
    .await;
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(store.deletes(), 1);
}

#[tokio::test]
async fn test_with_lease_contention_never_releases() {
    let (store, worker) = counted();
    let clock = Arc::new(ManualClock::new(START));
    let holder = manager(
        store.clone(),
        clock.clone(),
        Arc::new(ManualSleeper::new(clock)),
        "holder",
    );
    holder.acquire("job", Some(60)).await.unwrap();

    let result: Result<(), LockError> = worker
        .with_lease("job", &AcquireOptions::default(), |_handle| async { Ok(()) })
        .await;
    assert!(result.unwrap_err().is_contention());
    assert_eq!(store.deletes(), 0);
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error("job failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Lock(#[from] LockError),
}

#[tokio::test]
async fn test_with_lease_releases_after_body_error() {
    let cluster = Cluster::in_memory();
    let worker = cluster.worker("w");

    let result: Result<(), JobError> = worker
        .with_lease("job", &AcquireOptions::default(), |_handle| async {
            Err(JobError::Failed("boom".to_string()))
        })
        .await;

    assert!(matches!(result, Err(JobError::Failed(ref msg)) if msg == "boom"));
    assert!(worker.lease_info("job").await.unwrap().is_none());
}

#[tokio::test]
async fn test_with_lease_keeps_body_error_when_lease_was_lost() {
    let cluster = Cluster::in_memory();
    let worker = cluster.worker("w");
    let thief = cluster.worker("thief");

    let result: Result<(), JobError> = worker
        .with_lease("job", &AcquireOptions::default().with_ttl(5), |_handle| {
            let clock = cluster.clock.clone();
            let thief = thief.clone();
            async move {
                clock.advance(10);
                thief.acquire("job", Some(60)).await?;
                Err(JobError::Failed("too slow".to_string()))
            }
        })
        .await;

    assert!(matches!(result, Err(JobError::Failed(_))));
    // release found the thief's token and left it alone
    assert_eq!(
        thief.lease_info("job").await.unwrap().unwrap().owner,
        "thief"
    );
}

#[tokio::test]
async fn test_with_lease_releases_on_panic() {
    let cluster = Cluster::in_memory();
    let worker = cluster.worker("w");

    let scoped = worker.clone();
    let joined = tokio::spawn(async move {
        scoped
            .with_lease("job", &AcquireOptions::default(), |_handle| async {
                if true {
                    panic!("body panicked");
                }
                Ok::<(), LockError>(())
            })
            .await
    })
    .await;

    assert!(joined.unwrap_err().is_panic());
    assert!(worker.lease_info("job").await.unwrap().is_none());
}

#[tokio::test]
async fn test_with_lease_contention_skips_body() {
    let cluster = Cluster::in_memory();
    let holder = cluster.worker("holder");
    let worker = cluster.worker("w");
    holder.acquire("job", Some(60)).await.unwrap();

    let ran = AtomicU32::new(0);
    let result: Result<(), LockError> = worker
        .with_lease("job", &AcquireOptions::default(), |_handle| {
            ran.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;

    assert!(result.unwrap_err().is_contention());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(
        holder.lease_info("job").await.unwrap().unwrap().owner,
        "holder"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquirers_single_winner() {
    let cluster = Cluster::in_memory();
    let mut tasks = Vec::new();
    for i in 0..32 {
        let worker = cluster.worker(&format!("worker-{i}"));
        tasks.push(tokio::spawn(async move {
            worker.acquire("hot", Some(30)).await.is_ok()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

proptest! {
    // Replays random acquire / release / clock moves against a model of the
    // current holder: an acquire succeeds iff nobody else holds a valid lease,
    // and a release succeeds iff the releasing worker's latest token is on
    // the record.
    #[test]
    fn prop_acquire_and_release_follow_holder_model(
        steps in prop::collection::vec((0usize..3, 0u8..3, 1u64..5), 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let cluster = Cluster::in_memory();
            let workers: Vec<_> = (0..3).map(|i| cluster.worker(&format!("w{i}"))).collect();
            let mut latest: Vec<Option<LeaseHandle>> = vec![None, None, None];
            // (holder index, expiry) of the record in the store
            let mut holder: Option<(usize, i64)> = None;

            for (who, action, amount) in steps {
                let now = cluster.clock.now();
                match action {
                    0 => {
                        let expected = holder.is_none_or(|(owner, expiry)| owner == who || expiry <= now);
                        let result = workers[who].acquire("k", Some(amount)).await;
                        prop_assert_eq!(result.is_ok(), expected);
                        if let Ok(handle) = result {
                            latest[who] = Some(handle);
                            holder = Some((who, now + amount as i64));
                        }
                    }
                    1 => {
                        if let Some(handle) = latest[who].take() {
                            let expected = holder.is_some_and(|(owner, _)| owner == who);
                            let released = workers[who].release(&handle).await.unwrap();
                            prop_assert_eq!(released, expected);
                            if released {
                                holder = None;
                            }
                        }
                    }
                    _ => cluster.clock.advance(amount as i64),
                }
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
