// Shared in-memory store of recent data points
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::domain::data_point::DataPoint;

/// Append-ordered buffer of data points, bounded by retention pruning.
/// One writer (the polling worker) appends and prunes while any number of
/// readers query; readers get cloned-out snapshots and never see the buffer
/// mid-mutation.
#[derive(Clone, Default)]
pub struct TelemetryBuffer {
    points: Arc<RwLock<VecDeque<DataPoint>>>,
}

impl TelemetryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<DataPoint>> {
        self.points.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<DataPoint>> {
        self.points.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, point: DataPoint) {
        self.write().push_back(point);
    }

    pub fn latest(&self) -> Option<DataPoint> {
        self.read().back().cloned()
    }

    /// Points from the last `seconds` seconds, oldest first. Scans from the
    /// newest entry backwards, so the cost is proportional to the window,
    /// not the whole buffer.
    pub fn within(&self, seconds: u64) -> Vec<DataPoint> {
        self.within_at(Utc::now().timestamp(), seconds)
    }

    fn within_at(&self, now: i64, seconds: u64) -> Vec<DataPoint> {
        let threshold = now - seconds as i64;
        let mut recent: Vec<DataPoint> = self
            .read()
            .iter()
            .rev()
            .take_while(|point| point.timestamp >= threshold)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    /// Drops every point older than the retention horizon.
    pub fn prune(&self, retention_seconds: u64) {
        self.prune_at(Utc::now().timestamp(), retention_seconds);
    }

    fn prune_at(&self, now: i64, retention_seconds: u64) {
        let threshold = now - retention_seconds as i64;
        let mut points = self.write();
        while points.front().is_some_and(|point| point.timestamp < threshold) {
            points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
