//! In-memory store of the latest telemetry value per car and metric.
//!
//! The cache is fed by the MQTT ingress and read by HTTP handlers. It knows
//! nothing about either: values are stored as the raw strings they arrived as
//! and interpretation is left to the reader.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Identifier of one tracked car, as stored in the TeslaMate database.
pub type CarId = i16;

type Metrics = HashMap<String, String>;

/// Shared handle to the car status cache.
///
/// Cloning is cheap; all clones see the same data. Per-car metric maps are
/// created on first write and never removed.
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    inner: Arc<RwLock<HashMap<CarId, Metrics>>>,
}

impl StatusCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the value of `metric` for `car`.
    pub fn set(&self, car: CarId, metric: impl Into<String>, value: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .entry(car)
            .or_default()
            .insert(metric.into(), value.into());
    }

    /// Returns the current value of `metric` for `car`, if one was ever set.
    pub fn get(&self, car: CarId, metric: &str) -> Option<String> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(&car)?.get(metric).cloned()
    }

    /// Returns a copy of every metric known for `car`.
    ///
    /// The returned map is detached from the cache: mutating it has no effect
    /// on later reads. `None` means nothing was ever written for this car.
    pub fn get_all_for_car(&self, car: CarId) -> Option<HashMap<String, String>> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        guard.get(&car).cloned()
    }

    /// Car ids with at least one cached metric, in ascending order.
    pub fn cars(&self) -> Vec<CarId> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let mut cars: Vec<CarId> = guard.keys().copied().collect();
        cars.sort_unstable();
        cars
    }
}
