#![allow(dead_code)]

use std::sync::Arc;

use dagrun::dag::{InMemoryTaskStore, TaskStore};
use dagrun::operator::OperatorSettings;
use dagrun::tracker::GraphTracker;

pub use dagrun_test_utils::builders;
pub use dagrun_test_utils::{ManualEngine, init_tracing, with_timeout};

/// Tracker over `store` driven by a fresh `ManualEngine`.
pub fn manual_tracker(
    store: InMemoryTaskStore,
    settings: OperatorSettings,
) -> (GraphTracker, Arc<ManualEngine>) {
    let store: Arc<dyn TaskStore> = Arc::new(store);
    let engine = Arc::new(ManualEngine::new(Arc::clone(&store)));
    let tracker = GraphTracker::new(store, engine.clone(), Arc::new(settings));
    (tracker, engine)
}
