// src/store/mod.rs — Durable record store

pub mod schema;
pub mod store;

pub use store::{EvalMetricRow, ExperimentRow, ExperimentSnapshot, ModelRunRow, RunWithMetrics, Store};

use std::sync::{Arc, Mutex, MutexGuard};

/// The engine shares one connection; the mutex serializes writes, each of
/// which targets a distinct row.
pub type SharedStore = Arc<Mutex<Store>>;

pub fn shared(store: Store) -> SharedStore {
    Arc::new(Mutex::new(store))
}

/// Lock the shared store, surfacing poisoning instead of unwrapping.
pub fn lock(store: &SharedStore) -> anyhow::Result<MutexGuard<'_, Store>> {
    store
        .lock()
        .map_err(|_| anyhow::anyhow!("store mutex poisoned"))
}
