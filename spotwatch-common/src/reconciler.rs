//! Occupancy reconciler
//!
//! Periodically recomputes every spot's `free` flag from the latest readings
//! of its member sensors and writes a spot back only when the flag changes,
//! so a pass over an already consistent store performs no writes.
//!
//! The write-back re-reads the spot and changes only `free`, so a member
//! linked while the pass was scanning is kept. The re-read and the write are
//! still two store calls; a link landing between them can be overwritten.
//!
//! Members are scanned in lexicographic id order and the first sensor whose
//! reading is in its type's occupied set marks the spot occupied. Sensors of
//! unknown type never contribute.
//!
//! Failure handling:
//! - unreadable sensor: logged, skipped
//! - failure inside one spot: logged, that spot abandoned
//! - failure listing spots: the whole pass is abandoned until the next tick

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::models::{Sensor, Spot};
use crate::occupancy::OccupancyTable;
use crate::registry::SharedStore;
use crate::store::{Namespace, StorePath};
use crate::Result;

/// Counters for one completed pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassSummary {
    pub spots_scanned: usize,
    pub marked_occupied: usize,
    pub marked_free: usize,
    pub sensors_skipped: usize,
    pub spot_failures: usize,
    /// Members whose own `spot` names a different spot
    pub drifted_members: usize,
    pub writes: usize,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Completed(PassSummary),
    /// Another pass was still running
    Skipped,
    /// The spot list could not be read
    Aborted(String),
}

pub struct Reconciler {
    store: SharedStore,
    table: Arc<OccupancyTable>,
    running: AtomicBool,
    last_summary: RwLock<Option<PassSummary>>,
}

/// Clears the running flag however the pass ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum SpotResult {
    Unchanged,
    MarkedOccupied,
    MarkedFree,
}

impl Reconciler {
    pub fn new(store: SharedStore, table: Arc<OccupancyTable>) -> Self {
        Self {
            store,
            table,
            running: AtomicBool::new(false),
            last_summary: RwLock::new(None),
        }
    }

    pub fn occupancy(&self) -> &OccupancyTable {
        &self.table
    }

    /// Summary of the most recent completed pass
    pub async fn last_summary(&self) -> Option<PassSummary> {
        self.last_summary.read().await.clone()
    }

    /// Run passes every `period` on a background task
    pub fn spawn(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        info!("Starting occupancy reconciler (interval: {}s)", period.as_secs());

        tokio::spawn(async move {
            let mut timer = interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                timer.tick().await;
                match self.run_pass().await {
                    PassOutcome::Completed(summary) => debug!(
                        spots = summary.spots_scanned,
                        occupied = summary.marked_occupied,
                        freed = summary.marked_free,
                        "Reconciliation pass complete"
                    ),
                    PassOutcome::Skipped => warn!("Reconciliation pass still running, tick skipped"),
                    PassOutcome::Aborted(_) => {}
                }
            }
        })
    }

    /// One full scan over every spot
    pub async fn run_pass(&self) -> PassOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return PassOutcome::Skipped;
        }
        let _guard = RunGuard(&self.running);

        let spots = match self.store.list(Namespace::Spots).await {
            Ok(spots) => spots,
            Err(e) => {
                error!("Reconciliation aborted, could not list spots: {}", e);
                return PassOutcome::Aborted(e.to_string());
            }
        };

        let mut summary = PassSummary::default();
        for (spot_id, record) in spots {
            summary.spots_scanned += 1;

            let spot = match Spot::from_record(&spot_id, record) {
                Ok(spot) => spot,
                Err(e) => {
                    warn!(spot_id = %spot_id, "Unreadable spot record: {}", e);
                    summary.spot_failures += 1;
                    continue;
                }
            };

            match self.reconcile_spot(spot, &mut summary).await {
                Ok(SpotResult::MarkedOccupied) => {
                    summary.marked_occupied += 1;
                    summary.writes += 1;
                }
                Ok(SpotResult::MarkedFree) => {
                    summary.marked_free += 1;
                    summary.writes += 1;
                }
                Ok(SpotResult::Unchanged) => {}
                Err(e) => {
                    warn!(spot_id = %spot_id, "Reconciliation failed for spot: {}", e);
                    summary.spot_failures += 1;
                }
            }
        }

        summary.finished_at = Some(Utc::now());
        *self.last_summary.write().await = Some(summary.clone());
        PassOutcome::Completed(summary)
    }

    async fn reconcile_spot(&self, spot: Spot, summary: &mut PassSummary) -> Result<SpotResult> {
        let path = StorePath::spot(&spot.id)?;

        for sensor_id in spot.sensors.sensor_ids() {
            let sensor = match self.load_sensor(sensor_id).await {
                Ok(Some(sensor)) => sensor,
                Ok(None) => {
                    warn!(spot_id = %spot.id, sensor_id = %sensor_id, "Member sensor missing");
                    summary.sensors_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(spot_id = %spot.id, sensor_id = %sensor_id, "Skipping sensor: {}", e);
                    summary.sensors_skipped += 1;
                    continue;
                }
            };

            if sensor.spot.as_deref() != Some(spot.id.as_str()) {
                warn!(
                    spot_id = %spot.id,
                    sensor_id = %sensor_id,
                    linked_to = ?sensor.spot,
                    "Member sensor is linked to a different spot"
                );
                summary.drifted_members += 1;
            }

            match self.table.is_occupied(&sensor.sensor_type, &sensor.value) {
                None => {
                    debug!(sensor_id = %sensor_id, sensor_type = %sensor.sensor_type, "Unknown sensor type, ignored");
                }
                Some(false) => {}
                Some(true) => {
                    debug!(spot_id = %spot.id, sensor_id = %sensor_id, "Spot occupied");
                    if !spot.free || !self.write_free(&path, false).await? {
                        return Ok(SpotResult::Unchanged);
                    }
                    info!(spot_id = %spot.id, sensor_id = %sensor_id, "Spot marked occupied");
                    return Ok(SpotResult::MarkedOccupied);
                }
            }
        }

        if spot.free || !self.write_free(&path, true).await? {
            return Ok(SpotResult::Unchanged);
        }
        info!(spot_id = %spot.id, "Spot marked free");
        Ok(SpotResult::MarkedFree)
    }

    /// Set only the `free` flag on a freshly read copy of the spot
    ///
    /// Members linked since the pass read the spot survive the write.
    /// Returns whether anything was written.
    async fn write_free(&self, path: &StorePath, free: bool) -> Result<bool> {
        let Some(record) = self.store.get(path).await? else {
            warn!(spot_id = %path.id(), "Spot vanished during reconciliation");
            return Ok(false);
        };
        let mut fresh = Spot::from_record(path.id(), record)?;
        if fresh.free == free {
            return Ok(false);
        }
        fresh.free = free;
        self.store.set(path, fresh.to_value()?).await?;
        Ok(true)
    }

    async fn load_sensor(&self, id: &str) -> Result<Option<Sensor>> {
        match self.store.get(&StorePath::sensor(id)?).await? {
            Some(value) => Ok(Some(Sensor::from_value(value)?)),
            None => Ok(None),
        }
    }
}
