//! Occupancy reconciler passes against the in-memory store

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use spotwatch_common::auth::PresenceAuthenticator;
use spotwatch_common::reconciler::{PassOutcome, PassSummary, Reconciler};
use spotwatch_common::registry::{SensorRegistry, SpotRegistry};
use spotwatch_common::store::{MemoryStore, Namespace, Store, StorePath};
use spotwatch_common::{Error, OccupancyTable, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("test payload must be an object")
}

struct Harness {
    store: Arc<MemoryStore>,
    sensors: SensorRegistry,
    spots: SpotRegistry,
    reconciler: Reconciler,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    Harness {
        sensors: SensorRegistry::new(store.clone(), Arc::new(PresenceAuthenticator)),
        spots: SpotRegistry::new(store.clone()),
        reconciler: Reconciler::new(store.clone(), Arc::new(OccupancyTable::default())),
        store,
    }
}

async fn completed(reconciler: &Reconciler) -> PassSummary {
    match reconciler.run_pass().await {
        PassOutcome::Completed(summary) => summary,
        other => panic!("expected a completed pass, got {:?}", other),
    }
}

async fn add_sensor(h: &Harness, id: &str, sensor_type: &str, value: Value, spot: &str) {
    h.sensors
        .create(&obj(json!({"id": id, "type": sensor_type, "value": value, "spot": spot})))
        .await
        .unwrap();
}

async fn set_value(h: &Harness, id: &str, value: Value) {
    h.sensors
        .update(id, &obj(json!({"key": "k", "value": value})))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_occupied_reading_marks_spot_taken() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(true), "a").await;
    assert!(h.spots.is_free("a").await.unwrap());

    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.spots_scanned, 1);
    assert_eq!(summary.marked_occupied, 1);
    assert!(!h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_spot_frees_when_reading_clears() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(true), "a").await;
    completed(&h.reconciler).await;

    set_value(&h, "s1", json!(false)).await;
    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.marked_free, 1);
    assert!(h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_second_pass_performs_no_writes() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(true), "a").await;
    add_sensor(&h, "s2", "ultrasonic", json!(false), "b").await;
    h.spots.create("empty").await.unwrap();

    let first = completed(&h.reconciler).await;
    assert_eq!(first.writes, 1);

    let writes = h.store.write_count();
    let second = completed(&h.reconciler).await;

    assert_eq!(second.writes, 0);
    assert_eq!(h.store.write_count(), writes);
}

#[tokio::test]
async fn test_spot_without_contributors_converges_free() {
    let h = harness();
    let mut spot = h.spots.create("a").await.unwrap();
    spot.free = false;
    h.spots.save(&spot).await.unwrap();

    completed(&h.reconciler).await;

    assert!(h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_unknown_type_never_contributes() {
    let h = harness();
    add_sensor(&h, "s1", "infrared", json!(true), "a").await;

    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.marked_occupied, 0);
    assert!(h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_any_occupied_member_marks_spot() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(false), "a").await;
    add_sensor(&h, "s2", "infrared", json!(true), "a").await;
    add_sensor(&h, "s3", "ultrasonic", json!("occupied"), "a").await;

    completed(&h.reconciler).await;

    assert!(!h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_missing_member_is_skipped_not_fatal() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(true), "a").await;
    let mut spot = h.spots.get("a").await.unwrap();
    spot.sensors.insert("0-ghost");
    h.spots.save(&spot).await.unwrap();

    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.sensors_skipped, 1);
    assert!(!h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_malformed_sensor_is_skipped() {
    let h = harness();
    add_sensor(&h, "s2", "ultrasonic", json!(true), "a").await;
    let mut spot = h.spots.get("a").await.unwrap();
    spot.sensors.insert("s1");
    h.spots.save(&spot).await.unwrap();
    h.store
        .set(&StorePath::sensor("s1").unwrap(), json!({"id": "s1", "value": true}))
        .await
        .unwrap();

    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.sensors_skipped, 1);
    assert!(!h.spots.is_free("a").await.unwrap());
}

#[tokio::test]
async fn test_bad_spot_record_does_not_abort_pass() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(true), "b").await;
    h.store
        .set(&StorePath::spot("a").unwrap(), json!({"sensors": ["s1"]}))
        .await
        .unwrap();

    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.spots_scanned, 2);
    assert_eq!(summary.spot_failures, 1);
    assert!(!h.spots.is_free("b").await.unwrap());
}

#[tokio::test]
async fn test_drift_is_reported_not_repaired() {
    let h = harness();
    add_sensor(&h, "s1", "ultrasonic", json!(false), "a").await;
    let mut stale = h.spots.create("b").await.unwrap();
    stale.sensors.insert("s1");
    h.spots.save(&stale).await.unwrap();

    let summary = completed(&h.reconciler).await;

    assert_eq!(summary.drifted_members, 1);
    assert!(h.spots.get("b").await.unwrap().sensors.contains("s1"));
}

#[tokio::test]
async fn test_last_summary_recorded() {
    let h = harness();
    assert!(h.reconciler.last_summary().await.is_none());

    add_sensor(&h, "s1", "ultrasonic", json!(true), "a").await;
    let summary = completed(&h.reconciler).await;

    let last = h.reconciler.last_summary().await.unwrap();
    assert_eq!(last, summary);
    assert!(last.finished_at.is_some());
}

#[tokio::test]
async fn test_spawned_reconciler_converges() {
    let store = Arc::new(MemoryStore::new());
    let sensors = SensorRegistry::new(store.clone(), Arc::new(PresenceAuthenticator));
    let spots = SpotRegistry::new(store.clone());
    sensors
        .create(&obj(json!({"id": "s1", "type": "ultrasonic", "value": true, "spot": "a"})))
        .await
        .unwrap();

    let reconciler = Arc::new(Reconciler::new(store.clone(), Arc::new(OccupancyTable::default())));
    let handle = reconciler.clone().spawn(std::time::Duration::from_millis(20));

    for _ in 0..50 {
        if !spots.is_free("a").await.unwrap() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    handle.abort();

    assert!(!spots.is_free("a").await.unwrap());
}

/// Memory store that can hold a pass at a chosen call or fail listing
#[derive(Default)]
struct ControlledStore {
    inner: MemoryStore,
    hold_next_sensor_read: AtomicBool,
    hold_next_list: AtomicBool,
    fail_list: AtomicBool,
    paused: Notify,
    resume: Notify,
}

impl ControlledStore {
    async fn hold(&self) {
        self.paused.notify_one();
        self.resume.notified().await;
    }
}

#[async_trait]
impl Store for ControlledStore {
    async fn get(&self, path: &StorePath) -> Result<Option<Value>> {
        if path.namespace() == Namespace::Sensors
            && self.hold_next_sensor_read.swap(false, Ordering::SeqCst)
        {
            self.hold().await;
        }
        self.inner.get(path).await
    }

    async fn set(&self, path: &StorePath, record: Value) -> Result<()> {
        self.inner.set(path, record).await
    }

    async fn delete(&self, path: &StorePath) -> Result<()> {
        self.inner.delete(path).await
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<(String, Value)>> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Error::Store("down".to_string()));
        }
        if self.hold_next_list.swap(false, Ordering::SeqCst) {
            self.hold().await;
        }
        self.inner.list(namespace).await
    }

    fn backend(&self) -> &'static str {
        "controlled"
    }
}

fn controlled() -> (Arc<ControlledStore>, SensorRegistry, SpotRegistry, Arc<Reconciler>) {
    let store = Arc::new(ControlledStore::default());
    let sensors = SensorRegistry::new(store.clone(), Arc::new(PresenceAuthenticator));
    let spots = SpotRegistry::new(store.clone());
    let reconciler = Arc::new(Reconciler::new(
        store.clone(),
        Arc::new(OccupancyTable::default()),
    ));
    (store, sensors, spots, reconciler)
}

#[tokio::test]
async fn test_link_during_pass_survives_write_back() {
    let (store, sensors, spots, reconciler) = controlled();
    sensors
        .create(&obj(json!({"id": "s1", "type": "ultrasonic", "value": true, "spot": "a"})))
        .await
        .unwrap();
    sensors
        .create(&obj(json!({"id": "s2", "type": "ultrasonic", "value": false, "spot": "b"})))
        .await
        .unwrap();

    store.hold_next_sensor_read.store(true, Ordering::SeqCst);
    let pass = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.run_pass().await }
    });
    store.paused.notified().await;

    // The pass has already read spot "a" without s2
    sensors
        .link_spot("s2", &obj(json!({"key": "k", "spot": "a"})))
        .await
        .unwrap();
    store.resume.notify_one();

    let summary = match pass.await.unwrap() {
        PassOutcome::Completed(summary) => summary,
        other => panic!("expected a completed pass, got {:?}", other),
    };
    assert_eq!(summary.marked_occupied, 1);

    let a = spots.get("a").await.unwrap();
    assert!(!a.free);
    assert!(a.sensors.contains("s1"));
    assert!(a.sensors.contains("s2"));
    assert_eq!(sensors.get("s2").await.unwrap().spot.as_deref(), Some("a"));
    assert!(!spots.get("b").await.unwrap().sensors.contains("s2"));
}

#[tokio::test]
async fn test_overlapping_pass_is_skipped() {
    let (store, sensors, _spots, reconciler) = controlled();
    sensors
        .create(&obj(json!({"id": "s1", "type": "ultrasonic", "value": true, "spot": "a"})))
        .await
        .unwrap();

    store.hold_next_list.store(true, Ordering::SeqCst);
    let first = tokio::spawn({
        let reconciler = reconciler.clone();
        async move { reconciler.run_pass().await }
    });
    store.paused.notified().await;

    assert_eq!(reconciler.run_pass().await, PassOutcome::Skipped);

    store.resume.notify_one();
    assert!(matches!(first.await.unwrap(), PassOutcome::Completed(_)));

    // Guard released once the first pass ends
    assert!(matches!(reconciler.run_pass().await, PassOutcome::Completed(_)));
}

#[tokio::test]
async fn test_list_failure_aborts_and_releases_guard() {
    let (store, sensors, spots, reconciler) = controlled();
    sensors
        .create(&obj(json!({"id": "s1", "type": "ultrasonic", "value": true, "spot": "a"})))
        .await
        .unwrap();
    store.fail_list.store(true, Ordering::SeqCst);

    for _ in 0..2 {
        match reconciler.run_pass().await {
            PassOutcome::Aborted(reason) => assert!(reason.contains("down")),
            other => panic!("expected an aborted pass, got {:?}", other),
        }
    }
    assert!(reconciler.last_summary().await.is_none());
    assert!(spots.is_free("a").await.unwrap());

    store.fail_list.store(false, Ordering::SeqCst);
    let summary = completed(&reconciler).await;
    assert_eq!(summary.marked_occupied, 1);
}
